pub mod shelter;
pub mod staff_application;

pub use shelter::Shelter;
pub use staff_application::{StaffApplication, StaffApplicationStatus};
