pub mod email_outbox;
pub mod templates;

pub use email_outbox::{EmailOutbox, EmailStatus};
pub use templates::EmailTemplate;
