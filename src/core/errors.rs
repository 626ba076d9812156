use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub title: String,
    pub description: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ChiaTienError {
    /// Referenced user is not part of the current roster
    #[error("User {0} is not a participant of this split")]
    InvalidParticipant(String),

    /// Finalizing a split with nobody sharing the cost
    #[error("At least one participant must be selected")]
    NoParticipantsSelected,

    /// Finalizing a split without a payer
    #[error("No payer selected")]
    NoPayer,

    /// Equal-split amounts are computed, not typed in
    #[error("Participant amounts are derived in equal mode")]
    AmountsAreDerived,

    /// Expense total must be positive
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    /// Manual expenses need a description
    #[error("Description is required")]
    MissingDescription,

    /// Receipt expenses need at least one line item
    #[error("At least one receipt item must be selected")]
    NoItemsSelected,

    /// Receipt line item index out of range
    #[error("Receipt item {0} not found")]
    ItemNotFound(usize),

    /// Item toggled on a draft that was not started from a receipt
    #[error("Draft has no receipt")]
    NotAReceipt,

    /// Generic input validation error with detailed field information
    #[error("Invalid input for field `{0}`: {1:?}")]
    InvalidInput(String, FieldError),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Username {0} already taken")]
    UsernameTaken(String),

    #[error("Not signed in")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Server error: {0}")]
    ServerError(String),

    /// Response body could not be decoded
    #[error("Server returned invalid response: {0}")]
    InvalidResponse(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl ChiaTienError {
    pub fn invalid_input(field: &str, title: &str, description: impl Into<String>) -> Self {
        ChiaTienError::InvalidInput(
            field.to_string(),
            FieldError {
                field: field.to_string(),
                title: title.to_string(),
                description: description.into(),
            },
        )
    }
}
