// Common types and utilities shared across the application

pub mod auth;
pub mod crypto;
pub mod entity_ids;
pub mod errors;
pub mod id;

pub use auth::{Actor, AuthError, Capability, HasAuthContext, Role};
pub use crypto::{CipherError, FieldCipher};
pub use entity_ids::*;
pub use errors::{CoreError, CoreResult, UniqueViolation};
pub use id::Id;
