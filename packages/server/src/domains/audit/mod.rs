pub mod activities;
pub mod models;

pub use activities::record;
pub use models::AuditLog;
