//! Harness-local error type wrapping driver errors.
//!
//! `sqlx` and `reqwest` are dependencies of this crate only, so their error
//! types are wrapped here instead of in `tsunagi-core`. [`HarnessError`]
//! converts into [`ConnectionError`] / [`TsunagiError`] at the points where
//! the core error contract applies.

use tsunagi_core::error::{ConnectionError, TsunagiError};

/// Errors raised by the SQL backend and the simulator client.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Database driver error (pool setup, query execution, decoding).
    #[error("sql driver error: {0}")]
    Sql(#[from] sqlx::Error),

    /// HTTP transport error (connect, timeout, body read).
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Simulator answered with a non-success HTTP status.
    #[error("simulator returned status {status}: {body}")]
    SimulatorStatus { status: u16, body: String },

    /// Simulator response could not be mapped to an execution record.
    #[error("simulator response decode failed: {reason}")]
    Decode { reason: String },
}

impl From<HarnessError> for ConnectionError {
    fn from(err: HarnessError) -> Self {
        match err {
            HarnessError::Sql(e) => ConnectionError::Query {
                reason: e.to_string(),
            },
            other => ConnectionError::Simulator {
                reason: other.to_string(),
            },
        }
    }
}

impl From<HarnessError> for TsunagiError {
    fn from(err: HarnessError) -> Self {
        TsunagiError::Connection(err.into())
    }
}
