//! Pet actions - intake, status changes and deactivation

mod intake;
mod status;

pub use intake::{deactivate_pet, intake_pet, IntakePetInput};
pub use status::{apply_pet_transition, update_pet_status};
pub(crate) use status::{announce_pet_transition, write_pet_transition};
