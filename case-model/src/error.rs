use thiserror::Error;

/// Rejection of a malformed payload before any state mutation.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Payload for collection '{collection}' must be a JSON object")]
    NotAnObject { collection: &'static str },

    #[error("Invalid payload for collection '{collection}': {reason}")]
    InvalidPayload {
        collection: &'static str,
        reason: String,
    },

    #[error("Missing required field '{field}' in collection '{collection}'")]
    MissingField {
        collection: &'static str,
        field: &'static str,
    },
}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;
