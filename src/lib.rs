pub mod api;
pub mod auth;
pub mod core;
pub mod leads;
pub mod telemetry;
