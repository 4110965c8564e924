pub mod activities;
pub mod models;

pub use models::{Application, ApplicationStatus, ApplicationStatusUpdate};
