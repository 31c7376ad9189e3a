use thiserror::Error;

use crate::record::Field;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A user-supplied field is missing, non-numeric or out of range.
    #[error("invalid input: {field} {reason}")]
    Validation { field: Field, reason: String },

    #[error("dataset could not be loaded: {0}")]
    DatasetLoad(String),

    #[error("training failed: {0}")]
    Training(String),

    #[error("model is not trained yet")]
    NotTrained,

    #[error("prediction failed: {0}")]
    Inference(String),

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn validation(field: Field, reason: impl Into<String>) -> Self {
        Error::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// The offending field of a validation failure.
    pub fn field(&self) -> Option<Field> {
        match self {
            Error::Validation { field, .. } => Some(*field),
            _ => None,
        }
    }
}
