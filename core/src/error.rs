//! Error taxonomy shared by the codec, analyzer and pipeline

use thiserror::Error;

/// Errors raised by the core library.
///
/// A missing payload is not represented here: extraction reports it as
/// [`crate::codec::Extraction::NotFound`].
#[derive(Error, Debug)]
pub enum StegoError {
    #[error("Payload needs {needed_bits} bits but image holds {available_bits}")]
    CapacityExceeded {
        needed_bits: usize,
        available_bits: usize,
    },

    #[error("Payload contains the terminator sequence")]
    TerminatorInPayload,

    #[error("Malformed image: {0}")]
    MalformedImage(String),

    #[error("External service '{service}' unavailable: {reason}")]
    ExternalServiceUnavailable { service: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StegoResult<T> = Result<T, StegoError>;

impl StegoError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedImage(reason.into())
    }

    pub fn unavailable(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExternalServiceUnavailable {
            service: service.into(),
            reason: reason.into(),
        }
    }
}
