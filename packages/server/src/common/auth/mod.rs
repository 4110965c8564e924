//! Authorization for shelter staff, adopters and admins
//!
//! Provides a fluent API for authorization checks in activity code:
//!
//! ```ignore
//! use crate::common::auth::{Actor, Capability};
//!
//! actor
//!     .can(Capability::ShelterStaff(shelter_id))
//!     .check(deps)
//!     .await?;
//! ```
//!
//! Staff access is resolved in exactly one place,
//! [`resolve_effective_shelter_access`], so activities never re-derive it.

mod builder;
mod capability;
mod errors;

pub use builder::{resolve_effective_shelter_access, Actor, CapabilityBuilder, HasAuthContext};
pub use capability::{Capability, Role};
pub use errors::AuthError;
