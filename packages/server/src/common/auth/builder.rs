use super::{AuthError, Capability, Role};
use crate::common::entity_ids::{ShelterId, UserId};
use crate::kernel::store::EntityStore;

/// Entry point for authorization checks
///
/// Usage:
/// ```ignore
/// actor
///     .can(Capability::ShelterStaff(pet.shelter_id))
///     .check(deps)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    /// Shelters the session token already vouches for (staff claim).
    pub shelter_claims: Vec<ShelterId>,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id,
            role,
            shelter_claims: Vec::new(),
        }
    }

    pub fn adopter(user_id: UserId) -> Self {
        Self::new(user_id, Role::Adopter)
    }

    pub fn staff(user_id: UserId) -> Self {
        Self::new(user_id, Role::Staff)
    }

    pub fn admin(user_id: UserId) -> Self {
        Self::new(user_id, Role::Admin)
    }

    /// Attach a shelter claim taken from a validated session token.
    pub fn with_shelter_claim(mut self, shelter_id: ShelterId) -> Self {
        self.shelter_claims.push(shelter_id);
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Specify what capability the actor needs
    pub fn can(&self, capability: Capability) -> CapabilityBuilder<'_> {
        CapabilityBuilder {
            actor: self,
            capability,
        }
    }
}

/// Builder after specifying capability
pub struct CapabilityBuilder<'a> {
    actor: &'a Actor,
    capability: Capability,
}

impl CapabilityBuilder<'_> {
    /// Perform the authorization check
    pub async fn check<D>(self, deps: &D) -> Result<(), AuthError>
    where
        D: HasAuthContext + ?Sized,
    {
        let allowed = match self.capability {
            Capability::Admin => self.actor.is_admin(),
            Capability::OwnResource(owner) => self.actor.user_id == owner || self.actor.is_admin(),
            Capability::ShelterStaff(shelter_id) => {
                resolve_effective_shelter_access(self.actor, shelter_id, deps.entity_store())
                    .await?
            }
        };

        if allowed {
            return Ok(());
        }

        Err(match self.capability {
            Capability::Admin => AuthError::AdminRequired,
            Capability::ShelterStaff(id) => AuthError::NotShelterStaff(id.to_string()),
            other => AuthError::PermissionDenied(other.rule()),
        })
    }
}

/// Trait for dependencies that can perform auth checks
pub trait HasAuthContext: Send + Sync {
    fn entity_store(&self) -> &dyn EntityStore;
}

/// Single source of truth for "may this actor act as staff of this shelter".
///
/// Admins always may. Otherwise the session's shelter claim is enough, and
/// failing that an approved staff application for the shelter is looked up.
pub async fn resolve_effective_shelter_access(
    actor: &Actor,
    shelter_id: ShelterId,
    store: &dyn EntityStore,
) -> Result<bool, AuthError> {
    if actor.is_admin() {
        return Ok(true);
    }

    if actor.role == Role::Staff && actor.shelter_claims.contains(&shelter_id) {
        return Ok(true);
    }

    let approved = store
        .has_approved_staff_membership(actor.user_id, shelter_id)
        .await?;
    Ok(approved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::shelters::models::StaffApplication;
    use crate::kernel::store::ShelterStore;
    use crate::kernel::MemoryStore;

    struct TestDeps {
        store: MemoryStore,
    }

    impl HasAuthContext for TestDeps {
        fn entity_store(&self) -> &dyn EntityStore {
            &self.store
        }
    }

    fn deps() -> TestDeps {
        TestDeps {
            store: MemoryStore::new(),
        }
    }

    #[tokio::test]
    async fn admin_passes_every_check() {
        let deps = deps();
        let admin = Actor::admin(UserId::new());

        assert!(admin.can(Capability::Admin).check(&deps).await.is_ok());
        assert!(admin
            .can(Capability::ShelterStaff(ShelterId::new()))
            .check(&deps)
            .await
            .is_ok());
        assert!(admin
            .can(Capability::OwnResource(UserId::new()))
            .check(&deps)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn shelter_claim_grants_staff_access() {
        let deps = deps();
        let shelter_id = ShelterId::new();
        let staff = Actor::staff(UserId::new()).with_shelter_claim(shelter_id);

        let result = staff
            .can(Capability::ShelterStaff(shelter_id))
            .check(&deps)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn approved_staff_application_grants_access() {
        let deps = deps();
        let shelter_id = ShelterId::new();
        let user_id = UserId::new();
        let membership = StaffApplication::approved(user_id, shelter_id);
        deps.store.insert_staff_application(&membership).await.unwrap();

        let actor = Actor::staff(user_id);
        assert!(resolve_effective_shelter_access(&actor, shelter_id, &deps.store)
            .await
            .unwrap());
        assert!(!resolve_effective_shelter_access(&actor, ShelterId::new(), &deps.store)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn adopter_cannot_act_as_staff_or_on_others_resources() {
        let deps = deps();
        let adopter = Actor::adopter(UserId::new());

        let staff_result = adopter
            .can(Capability::ShelterStaff(ShelterId::new()))
            .check(&deps)
            .await;
        assert!(matches!(staff_result, Err(AuthError::NotShelterStaff(_))));

        let owner_result = adopter
            .can(Capability::OwnResource(UserId::new()))
            .check(&deps)
            .await;
        assert!(matches!(owner_result, Err(AuthError::PermissionDenied(_))));

        assert!(adopter
            .can(Capability::OwnResource(adopter.user_id))
            .check(&deps)
            .await
            .is_ok());
    }
}
