//! Application actions - submission, guarded review and withdrawal

mod guard;
mod notify;
mod review;
mod submit;
mod withdraw;

pub use guard::apply_if_version;
pub use review::{update_application_status, ReviewInput};
pub use submit::{read_application_message, submit_application, SubmitApplicationInput};
pub use withdraw::withdraw_application;
