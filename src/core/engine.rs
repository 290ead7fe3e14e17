use super::types::{
    AggregateResult, Constants, FundingResult, MaritalClass, OccupationClass, PersonProfile,
    VehicleResult,
};

/// Share of gross income the subsidized pension demands as the theoretical
/// minimum own contribution.
const SUBSIDIZED_MIN_CONTRIBUTION_SHARE: f64 = 0.04;

#[derive(Debug, Clone, Copy)]
struct VehicleOutcome {
    max_contribution: f64,
    funding_advantage: f64,
    own_cost: f64,
}

impl VehicleOutcome {
    const ZERO: VehicleOutcome = VehicleOutcome {
        max_contribution: 0.0,
        funding_advantage: 0.0,
        own_cost: 0.0,
    };

    fn rounded(self) -> VehicleResult {
        VehicleResult {
            max_contribution: self.max_contribution.round(),
            funding_advantage: self.funding_advantage.round(),
            own_cost: self.own_cost.round(),
        }
    }
}

/// Run all three vehicle calculators and aggregate their outcomes. Pure and
/// total: every input combination yields a result, degenerate cases collapse
/// to zero-valued vehicles rather than errors.
pub fn run_funding_model(profile: &PersonProfile, constants: &Constants) -> FundingResult {
    let employer_deferral = employer_deferral(profile, constants).rounded();
    let subsidized_pension = subsidized_pension(profile, constants).rounded();
    let basic_pension = basic_pension(profile, constants).rounded();
    let aggregate = aggregate([employer_deferral, subsidized_pension, basic_pension]);

    FundingResult {
        employer_deferral,
        subsidized_pension,
        basic_pension,
        aggregate,
    }
}

fn employer_deferral(profile: &PersonProfile, constants: &Constants) -> VehicleOutcome {
    // Salary deferral rides on an employment contract; the self-employed
    // cannot use this vehicle at all.
    if profile.occupation == OccupationClass::SelfEmployed {
        return VehicleOutcome::ZERO;
    }

    let ss_free_ceiling = constants
        .deferral_ss_free_ceiling
        .min(constants.deferral_ss_free_share * profile.annual_gross_income);
    let tax_free_ceiling = constants
        .deferral_tax_free_ceiling
        .min(constants.deferral_tax_free_share * profile.annual_gross_income);

    // The social-security-free amount fills its ceiling completely; whatever
    // headroom remains up to the tax-free ceiling is tax-free only.
    let ss_free_amount = ss_free_ceiling;
    let tax_free_only_amount = (tax_free_ceiling - ss_free_amount).max(0.0);

    let tax_saving = (ss_free_amount + tax_free_only_amount) * profile.marginal_tax_rate;
    let social_security_saving = if profile.occupation == OccupationClass::CivilServant {
        0.0
    } else {
        ss_free_amount * profile.social_security_rate
    };

    let contribution = ss_free_amount + tax_free_only_amount;
    VehicleOutcome {
        max_contribution: contribution,
        funding_advantage: tax_saving + social_security_saving,
        own_cost: contribution,
    }
}

fn subsidized_pension(profile: &PersonProfile, constants: &Constants) -> VehicleOutcome {
    if !profile.subsidized_eligible {
        return VehicleOutcome::ZERO;
    }

    let allowance = constants.allowance_base
        + f64::from(profile.children_pre_2008) * constants.allowance_child_pre_2008
        + f64::from(profile.children_from_2008) * constants.allowance_child_from_2008;

    // Allowances offset the required own contribution, but the statutory
    // floor applies regardless; they also consume headroom under the cap.
    let required_minimum = (SUBSIDIZED_MIN_CONTRIBUTION_SHARE * profile.annual_gross_income
        - allowance)
        .max(constants.subsidized_min_contribution);
    let contribution_ceiling = (constants.subsidized_max_contribution - allowance).max(0.0);
    let own_contribution = required_minimum.max(0.0).min(contribution_ceiling);

    // Only relief beyond the allowance value counts as additional benefit;
    // the allowance itself must not be double-counted.
    let gross_relief = (own_contribution + allowance) * profile.marginal_tax_rate;
    let tax_bonus = (gross_relief - allowance).max(0.0);

    VehicleOutcome {
        max_contribution: own_contribution,
        funding_advantage: allowance + tax_bonus,
        own_cost: own_contribution,
    }
}

fn basic_pension(profile: &PersonProfile, constants: &Constants) -> VehicleOutcome {
    let income_limit = match profile.marital {
        MaritalClass::Single => constants.basic_limit_single,
        MaritalClass::Married => constants.basic_limit_married,
    };

    let deductible_headroom = (income_limit - profile.prior_pension_contributions).max(0.0);
    let income_ceiling = profile.annual_gross_income * constants.basic_savings_rate_cap;
    let contribution = deductible_headroom.min(income_ceiling);

    // A straight deduction at the marginal rate, no allowance arithmetic.
    VehicleOutcome {
        max_contribution: contribution,
        funding_advantage: contribution * profile.marginal_tax_rate,
        own_cost: contribution,
    }
}

fn aggregate(vehicles: [VehicleResult; 3]) -> AggregateResult {
    let own_cost: f64 = vehicles.iter().map(|v| v.own_cost).sum();
    let funding_advantage: f64 = vehicles.iter().map(|v| v.funding_advantage).sum();
    let funding_ratio = if own_cost > 0.0 {
        (funding_advantage / own_cost * 100.0 * 10.0).round() / 10.0
    } else {
        0.0
    };

    AggregateResult {
        own_cost,
        funding_advantage,
        funding_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::profile::marginal_tax_rate;
    use proptest::prelude::{Just, Strategy, prop_assert, prop_assert_eq, prop_oneof, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn salaried_profile(annual_gross_income: f64) -> PersonProfile {
        PersonProfile {
            occupation: OccupationClass::PrivateEmployee,
            marital: MaritalClass::Single,
            annual_gross_income,
            subsidized_eligible: true,
            children_pre_2008: 0,
            children_from_2008: 0,
            marginal_tax_rate: marginal_tax_rate(annual_gross_income),
            social_security_rate: 0.20,
            prior_pension_contributions: 0.0,
        }
    }

    fn occupation_strategy() -> impl Strategy<Value = OccupationClass> {
        prop_oneof![
            Just(OccupationClass::PrivateEmployee),
            Just(OccupationClass::PublicEmployee),
            Just(OccupationClass::CivilServant),
            Just(OccupationClass::SelfEmployed),
        ]
    }

    fn profile_strategy() -> impl Strategy<Value = PersonProfile> {
        (
            occupation_strategy(),
            prop_oneof![Just(MaritalClass::Single), Just(MaritalClass::Married)],
            0.0f64..250_000.0,
            0u32..4,
            0u32..4,
            0.0f64..40_000.0,
        )
            .prop_map(
                |(occupation, marital, income, pre, from, prior)| PersonProfile {
                    occupation,
                    marital,
                    annual_gross_income: income,
                    subsidized_eligible: occupation.subsidized_eligible(),
                    children_pre_2008: pre,
                    children_from_2008: from,
                    marginal_tax_rate: marginal_tax_rate(income),
                    social_security_rate: if occupation == OccupationClass::CivilServant {
                        0.0
                    } else {
                        0.20
                    },
                    prior_pension_contributions: prior,
                },
            )
    }

    #[test]
    fn salaried_scenario_matches_reference_figures() {
        // 3000/month: income-capped deferral, base allowance only, basic
        // pension bound by the 20% savings-rate ceiling.
        let constants = Constants::year_2025();
        let profile = salaried_profile(36_000.0);
        assert_approx(profile.marginal_tax_rate, 0.30);

        let result = run_funding_model(&profile, &constants);

        // Deferral: ss-free min(3864, 1440) = 1440, tax-free-only 1440.
        assert_approx(result.employer_deferral.max_contribution, 2_880.0);
        assert_approx(result.employer_deferral.funding_advantage, 1_152.0);

        // Subsidized: allowance 175, contribution max(1440-175, 60) = 1265.
        assert_approx(result.subsidized_pension.max_contribution, 1_265.0);
        assert_approx(result.subsidized_pension.funding_advantage, 432.0);

        // Basic: min(29344, 7200) = 7200, straight 30% deduction.
        assert_approx(result.basic_pension.max_contribution, 7_200.0);
        assert_approx(result.basic_pension.funding_advantage, 2_160.0);

        assert_approx(result.aggregate.own_cost, 11_345.0);
        assert_approx(result.aggregate.funding_advantage, 3_744.0);
        assert_approx(result.aggregate.funding_ratio, 33.0);
    }

    #[test]
    fn self_employed_get_no_employer_deferral() {
        let constants = Constants::year_2025();
        let mut profile = salaried_profile(80_000.0);
        profile.occupation = OccupationClass::SelfEmployed;
        profile.subsidized_eligible = false;

        let result = run_funding_model(&profile, &constants);

        assert_approx(result.employer_deferral.max_contribution, 0.0);
        assert_approx(result.employer_deferral.funding_advantage, 0.0);
        assert_approx(result.subsidized_pension.funding_advantage, 0.0);
        assert!(result.basic_pension.funding_advantage > 0.0);
    }

    #[test]
    fn civil_servants_save_no_social_security() {
        let constants = Constants::year_2025();
        let mut profile = salaried_profile(60_000.0);
        profile.occupation = OccupationClass::CivilServant;
        profile.social_security_rate = 0.0;

        let outcome = employer_deferral(&profile, &constants);
        let expected_tax_only =
            (2_400.0 + (4_800.0 - 2_400.0)) * profile.marginal_tax_rate;
        assert_approx(outcome.funding_advantage, expected_tax_only);
    }

    #[test]
    fn zero_income_produces_zero_aggregate_without_division_fault() {
        let constants = Constants::year_2025();
        let mut profile = salaried_profile(0.0);
        // Zero income still triggers the statutory minimum contribution on
        // the subsidized vehicle; neutralize it to model an empty request.
        profile.subsidized_eligible = false;

        let result = run_funding_model(&profile, &constants);

        assert_approx(result.employer_deferral.own_cost, 0.0);
        assert_approx(result.basic_pension.own_cost, 0.0);
        assert_approx(result.aggregate.funding_ratio, 0.0);
    }

    #[test]
    fn funding_ratio_is_zero_when_own_cost_is_zero() {
        let zero = VehicleResult {
            max_contribution: 0.0,
            funding_advantage: 0.0,
            own_cost: 0.0,
        };
        let free_money = VehicleResult {
            max_contribution: 0.0,
            funding_advantage: 175.0,
            own_cost: 0.0,
        };

        let result = aggregate([zero, free_money, zero]);
        assert_approx(result.funding_ratio, 0.0);
        assert_approx(result.funding_advantage, 175.0);
    }

    #[test]
    fn allowances_scale_linearly_with_child_counts() {
        // At a zero marginal rate the subsidized advantage is exactly the
        // allowance total, which makes the linearity directly observable.
        let constants = Constants::year_2025();
        for pre in 0..3u32 {
            for from in 0..3u32 {
                let mut profile = salaried_profile(10_000.0);
                profile.children_pre_2008 = pre;
                profile.children_from_2008 = from;
                assert_approx(profile.marginal_tax_rate, 0.0);

                let outcome = subsidized_pension(&profile, &constants);
                let expected = 175.0 + 185.0 * f64::from(pre) + 300.0 * f64::from(from);
                assert_approx(outcome.funding_advantage, expected);
            }
        }
    }

    #[test]
    fn subsidized_allowance_can_exhaust_the_contribution_cap() {
        let constants = Constants::year_2025();
        let mut profile = salaried_profile(50_000.0);
        profile.children_from_2008 = 7; // allowance 2275 > cap 2100

        let outcome = subsidized_pension(&profile, &constants);
        assert_approx(outcome.own_cost, 0.0);
        assert!(outcome.funding_advantage >= 2_275.0 - EPS);
    }

    #[test]
    fn prior_contributions_reduce_basic_pension_headroom() {
        let constants = Constants::year_2025();
        let mut profile = salaried_profile(200_000.0);
        profile.prior_pension_contributions = 20_000.0;

        let outcome = basic_pension(&profile, &constants);
        // Headroom 9344 binds before the income ceiling 40000.
        assert_approx(outcome.max_contribution, 9_344.0);

        profile.prior_pension_contributions = 40_000.0;
        let exhausted = basic_pension(&profile, &constants);
        assert_approx(exhausted.max_contribution, 0.0);
        assert_approx(exhausted.funding_advantage, 0.0);
    }

    #[test]
    fn married_basic_pension_limit_is_double_the_single_limit() {
        let constants = Constants::year_2025();
        let mut profile = salaried_profile(200_000.0);
        let single = basic_pension(&profile, &constants);
        profile.marital = MaritalClass::Married;
        let married = basic_pension(&profile, &constants);

        assert_approx(single.max_contribution, 29_344.0);
        assert_approx(married.max_contribution, 40_000.0);
    }

    proptest! {
        #[test]
        fn every_figure_is_non_negative(profile in profile_strategy()) {
            let constants = Constants::year_2025();
            let result = run_funding_model(&profile, &constants);

            for vehicle in [
                result.employer_deferral,
                result.subsidized_pension,
                result.basic_pension,
            ] {
                prop_assert!(vehicle.max_contribution >= 0.0);
                prop_assert!(vehicle.funding_advantage >= 0.0);
                prop_assert!(vehicle.own_cost >= 0.0);
            }
            prop_assert!(result.aggregate.own_cost >= 0.0);
            prop_assert!(result.aggregate.funding_advantage >= 0.0);
            prop_assert!(result.aggregate.funding_ratio >= 0.0);
        }

        #[test]
        fn inapplicable_vehicles_collapse_to_zero(profile in profile_strategy()) {
            let constants = Constants::year_2025();
            let result = run_funding_model(&profile, &constants);

            if profile.occupation == OccupationClass::SelfEmployed {
                prop_assert_eq!(result.employer_deferral.max_contribution, 0.0);
                prop_assert_eq!(result.employer_deferral.funding_advantage, 0.0);
                prop_assert_eq!(result.employer_deferral.own_cost, 0.0);
            }
            if !profile.subsidized_eligible {
                prop_assert_eq!(result.subsidized_pension.max_contribution, 0.0);
                prop_assert_eq!(result.subsidized_pension.funding_advantage, 0.0);
                prop_assert_eq!(result.subsidized_pension.own_cost, 0.0);
            }
        }

        #[test]
        fn aggregate_is_the_sum_of_the_rounded_vehicles(profile in profile_strategy()) {
            let constants = Constants::year_2025();
            let result = run_funding_model(&profile, &constants);

            let cost_sum = result.employer_deferral.own_cost
                + result.subsidized_pension.own_cost
                + result.basic_pension.own_cost;
            let advantage_sum = result.employer_deferral.funding_advantage
                + result.subsidized_pension.funding_advantage
                + result.basic_pension.funding_advantage;

            prop_assert_eq!(result.aggregate.own_cost, cost_sum);
            prop_assert_eq!(result.aggregate.funding_advantage, advantage_sum);
        }

        #[test]
        fn deferral_ceilings_are_never_exceeded(profile in profile_strategy()) {
            let constants = Constants::year_2025();
            let outcome = employer_deferral(&profile, &constants);
            let income = profile.annual_gross_income;

            let tax_free_cap = 7_728.0f64.min(0.08 * income);

            // The ss-free slice fills its cap; the tax-free-only remainder
            // never pushes the total past the tax-free cap.
            prop_assert!(outcome.max_contribution <= tax_free_cap + EPS);
            prop_assert!(outcome.own_cost <= tax_free_cap + EPS);
        }

        #[test]
        fn subsidized_contribution_stays_inside_the_cap(profile in profile_strategy()) {
            let constants = Constants::year_2025();
            let outcome = subsidized_pension(&profile, &constants);

            let allowance = 175.0
                + 185.0 * f64::from(profile.children_pre_2008)
                + 300.0 * f64::from(profile.children_from_2008);
            let ceiling = (2_100.0 - allowance).max(0.0);

            prop_assert!(outcome.own_cost >= 0.0);
            prop_assert!(outcome.own_cost <= ceiling + EPS);
        }
    }
}
