pub mod activities;
pub mod models;

pub use models::{sign_payload, verify_signature, Webhook};
