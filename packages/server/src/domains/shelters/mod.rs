pub mod activities;
pub mod models;

pub use models::{Shelter, StaffApplication, StaffApplicationStatus};
