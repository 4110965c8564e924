//! Audit actions

mod record;

pub use record::record;
