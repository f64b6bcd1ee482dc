//! Timeout-guarded races for tricks.
//!
//! A primary async operation and a timer run concurrently; whichever settles
//! first decides the result. Timeout and operation failure are reported as
//! different [`RaceError`] variants so callers can retry them differently.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`race`](crate::race()) | Timer, generic race, loser handling |
//! | [`fetch`](crate::fetch_with_timeout) | HTTP GET raced against a timeout |
//!
//! # Usage
//!
//! ```ignore
//! use std::time::Duration;
//! use tricks_race::{RaceError, race_with_timeout};
//!
//! let value = race_with_timeout(load_profile(id), Duration::from_millis(1000)).await;
//! match value {
//!     Ok(profile) => render(profile),
//!     Err(RaceError::TimedOut { .. }) => retry_later(),
//!     Err(other) => report(other),
//! }
//! ```
//!
//! # Cancellation
//!
//! By default the losing primary operation is not cancelled: it keeps running
//! in the background and its result is dropped. Pass [`LoserPolicy::Abort`] to
//! [`race()`] or [`fetch_with_timeout`] to abort it instead.

mod fetch;
mod race;

pub use fetch::{FetchError, FetchRequest, FetchResponse, build_client, fetch_with_timeout};
pub use race::{DEFAULT_TIMER_DELAY, race, race_with_timeout, timer};
pub use tricks_types::{
    DEFAULT_FETCH_TIMEOUT, DEFAULT_USER_AGENT, LoserPolicy, RaceError, RaceOutcome, TimedOut,
};
