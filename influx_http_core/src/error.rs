/*!
 * Error taxonomy for the transport.
 *
 * Three families, matching where a failure can originate:
 * - `Configuration` — bad endpoint string or proxy, raised at construction.
 * - `Transport` — the HTTP client could not complete the round trip.
 * - `HttpStatus` — the server answered with a non-2xx status.
 */
use std::fmt;

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/**
 * Outcome of one HTTP call after classification.
 *
 * `Ok(body)` is a 2xx response; `Err` is either a transport-level failure
 * or a non-2xx status. The reaper and the synchronous paths share this shape.
 */
pub type RequestOutcome = Result<String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed endpoint string, missing database, or unusable proxy URL.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Connection, DNS, timeout or I/O failure reported by the HTTP client.
    #[error("request error: ({code}) {message}")]
    Transport {
        code: TransportCode,
        message: String,
    },

    /// The server answered with a status outside 200..300.
    #[error("request failed: ({status}) {reason}")]
    HttpStatus { status: u16, reason: String },
}

impl Error {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn transport(code: TransportCode, message: impl Into<String>) -> Self {
        Self::Transport {
            code,
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/**
 * Coarse classification of client-side failures.
 *
 * `code()` gives a stable number that appears in the error message, so logs
 * from different releases stay comparable.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCode {
    Connection,
    HostNotFound,
    Timeout,
    Io,
    Other,
}

impl TransportCode {
    pub fn code(self) -> u8 {
        match self {
            Self::Connection => 1,
            Self::HostNotFound => 2,
            Self::Timeout => 3,
            Self::Io => 4,
            Self::Other => 255,
        }
    }
}

impl fmt::Display for TransportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
