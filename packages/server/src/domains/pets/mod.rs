pub mod activities;
pub mod machines;
pub mod models;

pub use models::{Pet, PetStatus};
