pub mod foster;
pub mod foster_assignment;

pub use foster::Foster;
pub use foster_assignment::{FosterAssignment, FosterAssignmentStatus};
