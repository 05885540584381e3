//! # Relay Error Types
//!
//! Error taxonomy for the relay. Every variant maps onto the host status code
//! that is reported when the error has to cross the relay boundary.

use relay_types::{Medium, Status};
use thiserror::Error;

/// Relay operation errors
#[derive(Error, Debug)]
pub enum RelayError {
    /// Pool or descriptor allocation failed; the operation was rolled back
    #[error("Resource exhaustion: {0}")]
    ResourceExhaustion(String),

    /// Open, close or request on the lower binding failed
    #[error("Downstream failure: {0}")]
    Downstream(Status),

    /// The upper-edge instance could not be initialized
    #[error("Upstream attach failure: {0}")]
    UpstreamAttach(Status),

    /// Protocol registration with the host was refused
    #[error("Registration failure: {0}")]
    Registration(Status),

    /// A control request is already in flight or queued on this adapter
    #[error("Adapter busy: a control request is already outstanding")]
    Busy,

    /// The upper edge offered no medium the lower binding can be exported as
    #[error("Unsupported medium: {0}")]
    UnsupportedMedium(Medium),

    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Host status reported for this error
    pub fn status(&self) -> Status {
        match self {
            RelayError::ResourceExhaustion(_) => Status::Resources,
            RelayError::Downstream(status)
            | RelayError::UpstreamAttach(status)
            | RelayError::Registration(status) => *status,
            RelayError::UnsupportedMedium(_) => Status::UnsupportedMedia,
            RelayError::Busy | RelayError::Config(_) | RelayError::Io(_) => Status::Failure,
        }
    }
}

/// Result type alias for relay operations
pub type RelayResult<T> = std::result::Result<T, RelayError>;
