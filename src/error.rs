//! Error types for the AION chat client.
//!
//! One error type covers every failure the conversation controller can meet:
//! rejected submissions, provider selection mistakes, connection and stream
//! failures, and the client, URL and serialization errors around them.

use std::error;
use std::fmt;
use std::sync::Arc;

use crate::stream::SessionState;

/// The main error type for the AION client.
#[derive(Clone, Debug)]
pub enum Error {
    /// A provider name outside the supported set was selected.
    InvalidProvider {
        /// The rejected provider name.
        name: String,
    },

    /// The request could not be sent or the response could not be opened.
    ConnectionFailed {
        /// Human-readable error message.
        message: String,
        /// HTTP status code, when the backend answered with a non-success status.
        status_code: Option<u16>,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Reading the response body failed after streaming began.
    StreamInterrupted {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The user submitted blank input.
    EmptySubmission,

    /// An assistant turn is already in progress.
    TurnInProgress,

    /// No assistant turn is in progress.
    NoTurnInProgress,

    /// A stream session attempted an illegal state transition.
    InvalidTransition {
        /// State the session was in.
        from: SessionState,
        /// State the session attempted to enter.
        to: SessionState,
    },

    /// Streaming was stopped by the user.
    Aborted {
        /// Human-readable error message.
        message: String,
    },

    /// Invalid or missing configuration.
    Configuration {
        /// Human-readable error message.
        message: String,
    },

    /// Error during JSON serialization or deserialization.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// HTTP client error.
    HttpClient {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// A URL parsing or manipulation error.
    Url {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<url::ParseError>,
    },
}

impl Error {
    /// Creates a new invalid provider error.
    pub fn invalid_provider(name: impl Into<String>) -> Self {
        Error::InvalidProvider { name: name.into() }
    }

    /// Creates a new connection failure.
    pub fn connection_failed(
        message: impl Into<String>,
        status_code: Option<u16>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::ConnectionFailed {
            message: message.into(),
            status_code,
            source: source.map(Arc::from),
        }
    }

    /// Creates a new stream interruption error.
    pub fn stream_interrupted(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::StreamInterrupted {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new invalid transition error.
    pub fn invalid_transition(from: SessionState, to: SessionState) -> Self {
        Error::InvalidTransition { from, to }
    }

    /// Creates a new abort error.
    pub fn aborted(message: impl Into<String>) -> Self {
        Error::Aborted {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Returns true if this error is an invalid provider selection.
    pub fn is_invalid_provider(&self) -> bool {
        matches!(self, Error::InvalidProvider { .. })
    }

    /// Returns true if this error is a connection failure.
    pub fn is_connection_failed(&self) -> bool {
        matches!(self, Error::ConnectionFailed { .. })
    }

    /// Returns true if this error is a mid-stream interruption.
    pub fn is_stream_interrupted(&self) -> bool {
        matches!(self, Error::StreamInterrupted { .. })
    }

    /// Returns true if this error is a blank submission.
    pub fn is_empty_submission(&self) -> bool {
        matches!(self, Error::EmptySubmission)
    }

    /// Returns true if this error rejected work because a turn is in progress.
    pub fn is_turn_in_progress(&self) -> bool {
        matches!(self, Error::TurnInProgress)
    }

    /// Returns true if this error is a user abort.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Aborted { .. })
    }

    /// Returns the status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::ConnectionFailed { status_code, .. } => *status_code,
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidProvider { name } => {
                write!(
                    f,
                    "Invalid provider: {name} (expected local-model or cloud-model)"
                )
            }
            Error::ConnectionFailed {
                message,
                status_code,
                ..
            } => {
                if let Some(status_code) = status_code {
                    write!(f, "Connection failed: {message} (status {status_code})")
                } else {
                    write!(f, "Connection failed: {message}")
                }
            }
            Error::StreamInterrupted { message, .. } => {
                write!(f, "Stream interrupted: {message}")
            }
            Error::EmptySubmission => write!(f, "Empty submission"),
            Error::TurnInProgress => {
                write!(f, "An assistant turn is already in progress")
            }
            Error::NoTurnInProgress => write!(f, "No assistant turn is in progress"),
            Error::InvalidTransition { from, to } => {
                write!(f, "Invalid stream transition: {from} -> {to}")
            }
            Error::Aborted { message } => write!(f, "Aborted: {message}"),
            Error::Configuration { message } => {
                write!(f, "Configuration error: {message}")
            }
            Error::Serialization { message, .. } => {
                write!(f, "Serialization error: {message}")
            }
            Error::HttpClient { message, .. } => {
                write!(f, "HTTP client error: {message}")
            }
            Error::Url { message, .. } => write!(f, "URL error: {message}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::ConnectionFailed { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::StreamInterrupted { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Serialization { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::HttpClient { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

/// A specialized Result type for AION operations.
pub type Result<T> = std::result::Result<T, Error>;
