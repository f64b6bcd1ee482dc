//! Outcome and error types for timeout-guarded races.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timeout applied to a fetch that does not set one.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(3_000);

/// User agent sent by fetches unless configured otherwise.
pub const DEFAULT_USER_AGENT: &str = concat!("tricks/", env!("CARGO_PKG_VERSION"));

/// Settled result of a race between a primary operation and a timer.
///
/// Produced at most once per race. A primary-operation failure is not an
/// outcome; it surfaces as [`RaceError::Failed`].
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub enum RaceOutcome<T> {
    /// The primary operation completed first.
    Success(T),
    /// The timer elapsed strictly before the primary operation completed.
    Timeout { limit: Duration },
}

impl<T> RaceOutcome<T> {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    #[must_use]
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Timeout { .. } => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RaceOutcome<U> {
        match self {
            Self::Success(value) => RaceOutcome::Success(f(value)),
            Self::Timeout { limit } => RaceOutcome::Timeout { limit },
        }
    }

    /// Fold a timeout into the error channel.
    pub fn into_result<E>(self) -> Result<T, RaceError<E>> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Timeout { limit } => Err(RaceError::TimedOut { limit }),
        }
    }
}

/// Why a race did not produce a value.
///
/// Timeout and operation failure stay distinct so retry logic can treat them
/// differently.
#[derive(Debug, Error)]
pub enum RaceError<E> {
    #[error("timed out after {}ms", .limit.as_millis())]
    TimedOut { limit: Duration },
    #[error("{0}")]
    Failed(E),
    #[error("primary operation panicked: {message}")]
    Panicked { message: String },
    #[error("primary operation was cancelled before it settled")]
    Aborted,
}

impl<E> RaceError<E> {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// The primary operation's own error, if that is what ended the race.
    #[must_use]
    pub fn into_failure(self) -> Option<E> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn map_failure<F>(self, f: impl FnOnce(E) -> F) -> RaceError<F> {
        match self {
            Self::TimedOut { limit } => RaceError::TimedOut { limit },
            Self::Failed(err) => RaceError::Failed(f(err)),
            Self::Panicked { message } => RaceError::Panicked { message },
            Self::Aborted => RaceError::Aborted,
        }
    }
}

/// Error value produced by a standalone timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Timed out!")]
pub struct TimedOut {
    pub after: Duration,
}

/// What happens to the primary operation when the timer wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoserPolicy {
    /// Leave the primary task running in the background. Its side effects
    /// continue and its eventual result is discarded.
    #[default]
    Detach,
    /// Abort the primary task once the timer has won.
    Abort,
}

impl LoserPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Detach => "detach",
            Self::Abort => "abort",
        }
    }
}
