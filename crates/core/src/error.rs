use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    /// Guest lookups never say whether a code expired, was revoked or never
    /// existed.
    #[error("No booklet matches this access code")]
    UnknownAccessCode,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Store temporarily unavailable: {0}")]
    Transient(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transient(msg) => Self::Transient(msg),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::Backend(msg) => Self::Internal(msg),
        }
    }
}
