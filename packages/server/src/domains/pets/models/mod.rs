pub mod pet;

pub use pet::{Pet, PetStatus};
