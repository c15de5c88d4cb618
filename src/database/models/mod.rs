pub mod audit_log;
pub mod currency;
pub mod lead;
pub mod organization;
pub mod project;
pub mod unit;
pub mod user;

pub use audit_log::AuditLog;
pub use currency::Currency;
pub use lead::{Lead, LeadStage};
pub use organization::Organization;
pub use project::{Project, ProjectStatus};
pub use unit::{Unit, UnitStatus, UnitType};
pub use user::{User, UserRole};
