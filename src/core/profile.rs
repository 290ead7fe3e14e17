use serde_json::{Map, Value};

use super::types::{MaritalClass, OccupationClass, PersonProfile};

/// Flat employee share of statutory social-security contributions. Civil
/// servants pay none.
const EMPLOYEE_SOCIAL_SECURITY_RATE: f64 = 0.20;

/// Simplified stepped marginal rate, not the progressive statutory formula.
/// Thresholds are inclusive upper bounds on annual gross income.
pub fn marginal_tax_rate(annual_gross_income: f64) -> f64 {
    if annual_gross_income <= 11_604.0 {
        0.0
    } else if annual_gross_income <= 20_000.0 {
        0.14
    } else if annual_gross_income <= 30_000.0 {
        0.24
    } else if annual_gross_income <= 50_000.0 {
        0.30
    } else if annual_gross_income <= 70_000.0 {
        0.35
    } else if annual_gross_income <= 100_000.0 {
        0.40
    } else {
        0.42
    }
}

pub fn classify_occupation(status: &str) -> OccupationClass {
    match status {
        "Angestellt" => OccupationClass::PrivateEmployee,
        "Beamter" => OccupationClass::CivilServant,
        "Selbständig" | "Freiberufler" => OccupationClass::SelfEmployed,
        // Unknown labels fail open to the private-employee default.
        _ => OccupationClass::PrivateEmployee,
    }
}

pub fn classify_marital(family: &str) -> MaritalClass {
    if family.contains("verheiratet") {
        MaritalClass::Married
    } else {
        MaritalClass::Single
    }
}

/// Coarse estimate: the wizard only reports "mit Kindern", never a count or
/// birth years, so children are assumed born 2008 or later.
fn estimate_children(marital: MaritalClass, family: &str) -> (u32, u32) {
    if family.contains("Kinder") {
        let from_2008 = match marital {
            MaritalClass::Married => 2,
            MaritalClass::Single => 1,
        };
        (0, from_2008)
    } else {
        (0, 0)
    }
}

/// Monthly income as submitted by the form. Missing, unparseable, negative,
/// or non-finite values all collapse to zero.
pub fn parse_monthly_income(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if parsed.is_finite() { parsed.max(0.0) } else { 0.0 }
}

fn form_str<'a>(form: &'a Map<String, Value>, key: &str) -> &'a str {
    form.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Translate the raw key-value form into the normalized profile the vehicle
/// calculators consume. Downstream code never sees the free-text values.
pub fn profile_from_form(form: &Map<String, Value>) -> PersonProfile {
    let monthly_income = parse_monthly_income(form.get("av_income"));
    let annual_gross_income = monthly_income * 12.0;

    let occupation = classify_occupation(form_str(form, "av_status"));
    let family = form_str(form, "av_family");
    let marital = classify_marital(family);
    let (children_pre_2008, children_from_2008) = estimate_children(marital, family);

    let social_security_rate = if occupation == OccupationClass::CivilServant {
        0.0
    } else {
        EMPLOYEE_SOCIAL_SECURITY_RATE
    };

    PersonProfile {
        occupation,
        marital,
        annual_gross_income,
        subsidized_eligible: occupation.subsidized_eligible(),
        children_pre_2008,
        children_from_2008,
        marginal_tax_rate: marginal_tax_rate(annual_gross_income),
        social_security_rate,
        prior_pension_contributions: 0.0,
    }
}
