use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OccupationClass {
    PrivateEmployee,
    PublicEmployee,
    CivilServant,
    SelfEmployed,
}

impl OccupationClass {
    /// Statutory occupation restriction for the subsidized personal pension.
    pub fn subsidized_eligible(self) -> bool {
        matches!(
            self,
            OccupationClass::PrivateEmployee
                | OccupationClass::PublicEmployee
                | OccupationClass::CivilServant
        )
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MaritalClass {
    Single,
    Married,
}

/// Statutory parameters for one fiscal year. Constructed once and passed by
/// reference into every calculation; nothing mutates it.
#[derive(Debug, Clone, Copy)]
pub struct Constants {
    pub pension_assessment_ceiling: f64,
    pub deferral_ss_free_ceiling: f64,
    pub deferral_ss_free_share: f64,
    pub deferral_tax_free_ceiling: f64,
    pub deferral_tax_free_share: f64,
    pub allowance_base: f64,
    pub allowance_child_pre_2008: f64,
    pub allowance_child_from_2008: f64,
    pub subsidized_max_contribution: f64,
    pub subsidized_min_contribution: f64,
    pub basic_limit_single: f64,
    pub basic_limit_married: f64,
    pub basic_savings_rate_cap: f64,
}

impl Constants {
    pub fn year_2025() -> Self {
        Self {
            pension_assessment_ceiling: 96_600.0,
            // Absolute deferral ceilings are 4% / 8% of the assessment ceiling.
            deferral_ss_free_ceiling: 3_864.0,
            deferral_ss_free_share: 0.04,
            deferral_tax_free_ceiling: 7_728.0,
            deferral_tax_free_share: 0.08,
            allowance_base: 175.0,
            allowance_child_pre_2008: 185.0,
            allowance_child_from_2008: 300.0,
            subsidized_max_contribution: 2_100.0,
            subsidized_min_contribution: 60.0,
            basic_limit_single: 29_344.0,
            basic_limit_married: 58_688.0,
            basic_savings_rate_cap: 0.20,
        }
    }
}

/// Normalized view of one submission, derived from the raw form values and
/// discarded after the response is built.
#[derive(Debug, Clone, Copy)]
pub struct PersonProfile {
    pub occupation: OccupationClass,
    pub marital: MaritalClass,
    pub annual_gross_income: f64,
    pub subsidized_eligible: bool,
    pub children_pre_2008: u32,
    pub children_from_2008: u32,
    pub marginal_tax_rate: f64,
    pub social_security_rate: f64,
    pub prior_pension_contributions: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleResult {
    pub max_contribution: f64,
    pub funding_advantage: f64,
    #[serde(skip)]
    pub own_cost: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub own_cost: f64,
    pub funding_advantage: f64,
    pub funding_ratio: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingResult {
    pub employer_deferral: VehicleResult,
    pub subsidized_pension: VehicleResult,
    pub basic_pension: VehicleResult,
    pub aggregate: AggregateResult,
}
