use std::sync::Arc;

use thiserror::Error;

use crate::UploaderState;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while sampling a decision or uploading events.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The weight vector length does not match the declared number of actions.
    #[error("the number of weights ({actual}) must equal the number of actions ({expected})")]
    ActionCountMismatch { expected: usize, actual: usize },

    /// A weight is negative or not a finite number.
    #[error("weight at index {index} must be a non-negative finite number, got {weight}")]
    InvalidWeight { index: usize, weight: f64 },

    /// All weights are zero, so there is no distribution to draw from.
    #[error("at least one weight must be positive")]
    ZeroTotalWeight,

    /// Experimental unit duration must be strictly positive.
    #[error("experimental unit duration must be positive, got {0} seconds")]
    InvalidExperimentalUnitDuration(i64),

    /// The uploader is not in a state that allows the requested operation.
    #[error("uploader is {0:?}, expected it to be ready")]
    InvalidState(UploaderState),

    #[error("invalid join server address")]
    InvalidJoinServerAddress(#[source] url::ParseError),

    #[error("invalid settings locator")]
    InvalidSettingsLocator(#[source] url::ParseError),

    /// The overflow store connection descriptor cannot be used.
    #[error("invalid overflow store connection string: {0}")]
    InvalidConnectionString(String),

    /// The server rejected our credentials.
    #[error("unauthorized, application token is likely invalid")]
    Unauthorized,

    /// A batch could not be sent and the overflow store write failed as well.
    #[error("failed to write batch to the overflow store after send failure ({send_error})")]
    OverflowWriteFailed {
        send_error: Box<Error>,
        #[source]
        store_error: Box<Error>,
    },

    #[error("flush thread panicked")]
    FlushThreadPanicked,

    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    #[error(transparent)]
    Io(Arc<std::io::Error>),

    #[error(transparent)]
    Serialization(Arc<serde_json::Error>),

    #[error(transparent)]
    Network(Arc<reqwest::Error>),
}

impl Error {
    /// Returns `true` for errors caused by an invalid argument passed by the caller.
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            Error::ActionCountMismatch { .. }
                | Error::InvalidWeight { .. }
                | Error::ZeroTotalWeight
                | Error::InvalidExperimentalUnitDuration(_)
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(Arc::new(value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        // Urls may carry tokens in query parameters.
        Error::Network(Arc::new(value.without_url()))
    }
}
