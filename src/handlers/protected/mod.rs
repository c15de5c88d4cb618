pub mod analytics;
pub mod auth;
pub mod currencies;
pub mod imports;
pub mod leads;
pub mod projects;
pub mod units;
mod utils;
