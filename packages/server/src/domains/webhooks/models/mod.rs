pub mod signing;
pub mod webhook;

pub use signing::{generate_secret, sign_payload, verify_signature, EVENT_HEADER, SIGNATURE_HEADER};
pub use webhook::{is_known_event, Webhook, KNOWN_EVENTS};
