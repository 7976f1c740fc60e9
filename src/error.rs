use std::time::Duration;
use thiserror::Error;

/// Error type for every request and stream operation.
#[derive(Error, Debug)]
pub enum Error {
    /// The request body was rejected as malformed (400).
    #[error("invalid request format: {0}")]
    InvalidFormat(String),

    /// Invalid or missing API key (401).
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    /// The account has run out of balance (402).
    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    /// The request parameters were rejected (422).
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Rate limited by the API. Check `retry_after` for suggested wait time.
    #[error("rate limit exceeded: {message}")]
    RateLimited {
        retry_after: Option<Duration>,
        message: String,
    },

    /// Server error (5xx status codes other than 503).
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The API is temporarily overloaded (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Any other non-success status.
    #[error("unexpected HTTP status {status}: {message}")]
    Api { status: u16, message: String },

    /// Request or connection timeout before a response arrived.
    #[error("timeout")]
    Timeout,

    /// HTTP/network error.
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding of a request or decoding of a response body.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// The event stream broke while reading. Cancellation and timeouts
    /// mid-stream also land here.
    #[error("stream read: {0}")]
    Stream(#[source] std::io::Error),

    /// An event payload could not be decoded into the stream's item type.
    #[error("decode {payload:?}: {message}")]
    Decode { payload: String, message: String },

    /// No API key was configured.
    #[error("missing API key")]
    MissingApiKey,

    /// Invalid configuration.
    #[error("config: {0}")]
    Config(String),
}

impl Error {
    /// Map a non-success status and its body to an error.
    pub fn from_status(
        status: u16,
        message: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        let message = message.into();
        match status {
            400 => Error::InvalidFormat(message),
            401 => Error::Unauthorized(message),
            402 => Error::InsufficientBalance(message),
            422 => Error::InvalidParameters(message),
            429 => Error::RateLimited {
                retry_after,
                message,
            },
            503 => Error::ServiceUnavailable(message),
            500..=599 => Error::Server { status, message },
            _ => Error::Api { status, message },
        }
    }

    /// Returns true if the stream ended because its byte source failed.
    #[inline]
    pub fn is_stream(&self) -> bool {
        matches!(self, Error::Stream(_))
    }

    /// Returns true if an event payload could not be decoded.
    #[inline]
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode { .. })
    }

    /// Status code for errors that came from an HTTP response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::InvalidFormat(_) => Some(400),
            Error::Unauthorized(_) => Some(401),
            Error::InsufficientBalance(_) => Some(402),
            Error::InvalidParameters(_) => Some(422),
            Error::RateLimited { .. } => Some(429),
            Error::ServiceUnavailable(_) => Some(503),
            Error::Server { status, .. } | Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
