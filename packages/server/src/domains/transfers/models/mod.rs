pub mod transfer_request;

pub use transfer_request::{TransferRequest, TransferStatus};
