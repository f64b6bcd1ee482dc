//! Core domain types for tricks.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies:
//!
//! - **`range`**: validated range descriptors and the lazy sequence they produce
//! - **`race`**: settled outcomes, errors and loser policy for timeout-guarded races

mod race;
mod range;

pub use race::{
    DEFAULT_FETCH_TIMEOUT, DEFAULT_USER_AGENT, LoserPolicy, RaceError, RaceOutcome, TimedOut,
};
pub use range::{LazyRange, RangeError, RangeSpec, range};
