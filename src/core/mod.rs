mod engine;
mod profile;
mod types;

pub use engine::run_funding_model;
pub use profile::{
    classify_marital, classify_occupation, marginal_tax_rate, parse_monthly_income,
    profile_from_form,
};
pub use types::{
    AggregateResult, Constants, FundingResult, MaritalClass, OccupationClass, PersonProfile,
    VehicleResult,
};
