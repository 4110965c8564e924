//! Test fixtures for creating users, shelters and pets.

use adoption_core::common::{Actor, Role, ShelterId};
use adoption_core::domains::applications::activities::{submit_application, SubmitApplicationInput};
use adoption_core::domains::applications::Application;
use adoption_core::domains::pets::{Pet, PetStatus};
use adoption_core::domains::shelters::activities::{add_staff_member, create_shelter};
use adoption_core::domains::shelters::Shelter;
use adoption_core::domains::users::User;
use adoption_core::kernel::store::{PetStore, ShelterStore, UserStore};
use uuid::Uuid;

use super::TestHarness;

/// Create a user with a unique email.
pub async fn create_user(ctx: &TestHarness, name: &str, role: Role) -> User {
    let email = format!("{}-{}@example.test", name.to_lowercase(), Uuid::new_v4());
    ctx.store
        .insert_user(&User::new(email, name, role))
        .await
        .expect("Failed to create user")
}

/// A shelter owned (and staffed) by `owner`.
pub async fn create_shelter_for(ctx: &TestHarness, owner: &User, name: &str) -> Shelter {
    create_shelter(&Actor::staff(owner.id), name, 40, &ctx.deps)
        .await
        .expect("Failed to create shelter")
}

/// Put a pet straight into the store in the given status.
pub async fn create_pet(ctx: &TestHarness, shelter_id: ShelterId, status: PetStatus) -> Pet {
    let pet = Pet::intake(shelter_id, "Biscuit", "dog").with_status(status);
    ctx.store
        .insert_pet(&pet)
        .await
        .expect("Failed to create pet")
}

/// Staff member added to an existing shelter by its owner.
pub async fn add_staff(ctx: &TestHarness, shelter: &Shelter, name: &str) -> User {
    let user = create_user(ctx, name, Role::Staff).await;
    add_staff_member(&Actor::staff(shelter.owner_id), shelter.id, user.id, &ctx.deps)
        .await
        .expect("Failed to add staff member");
    user
}

pub async fn set_occupancy(ctx: &TestHarness, shelter_id: ShelterId, value: i32) {
    ctx.store
        .set_shelter_occupancy(shelter_id, value)
        .await
        .expect("Failed to set occupancy");
}

/// One shelter with its owner, an adopter and a pet.
pub struct World {
    pub owner: User,
    pub adopter: User,
    pub shelter: Shelter,
    pub pet: Pet,
}

impl World {
    pub async fn seed(ctx: &TestHarness, pet_status: PetStatus) -> Self {
        let owner = create_user(ctx, "Olive", Role::Staff).await;
        let adopter = create_user(ctx, "Avery", Role::Adopter).await;
        let shelter = create_shelter_for(ctx, &owner, "North Paws").await;
        let pet = create_pet(ctx, shelter.id, pet_status).await;

        Self {
            owner,
            adopter,
            shelter,
            pet,
        }
    }

    pub fn staff(&self) -> Actor {
        Actor::staff(self.owner.id)
    }

    pub fn adopter(&self) -> Actor {
        Actor::adopter(self.adopter.id)
    }

    /// Submit an application from the world's adopter for its pet.
    pub async fn submit(&self, ctx: &TestHarness) -> Application {
        submit_application(
            &self.adopter(),
            SubmitApplicationInput {
                pet_id: self.pet.id,
                message: Some("We have a fenced yard.".to_string()),
            },
            &ctx.deps,
        )
        .await
        .expect("Failed to submit application")
    }

    pub async fn reload_pet(&self, ctx: &TestHarness) -> Pet {
        ctx.store
            .find_pet(self.pet.id)
            .await
            .expect("Failed to load pet")
            .expect("Pet missing")
    }

    pub async fn reload_shelter(&self, ctx: &TestHarness) -> Shelter {
        ctx.store
            .find_shelter(self.shelter.id)
            .await
            .expect("Failed to load shelter")
            .expect("Shelter missing")
    }
}
