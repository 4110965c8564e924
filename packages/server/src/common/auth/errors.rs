use thiserror::Error;

/// Authorization errors for shelter and adopter operations
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Admin access required")]
    AdminRequired,

    #[error("Not a staff member of shelter {0}")]
    NotShelterStaff(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}
