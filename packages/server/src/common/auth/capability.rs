use crate::common::entity_ids::{ShelterId, UserId};

/// Capabilities an operation can demand from its actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Staff work inside one shelter: intake, review, transfers, vet requests.
    ShelterStaff(ShelterId),

    /// Acting on something the given user owns (own application, own webhooks).
    OwnResource(UserId),

    /// Platform administration
    Admin,
}

impl Capability {
    /// Short rule name used in denial messages.
    pub fn rule(&self) -> String {
        match self {
            Capability::ShelterStaff(id) => format!("shelter_staff:{}", id),
            Capability::OwnResource(id) => format!("owner:{}", id),
            Capability::Admin => "admin".to_string(),
        }
    }
}

/// Platform role, stored on the user row and carried in the session claims.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::Type, Default,
)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Adopter,
    Staff,
    Admin,
}
