//! Lazy integer ranges.
//!
//! A [`RangeSpec`] describes `start, start+1, …, start+count-1`. Nothing is
//! materialized: [`LazyRange`] computes each element inside `next` and keeps
//! only its cursor between calls.
//!
//! Validation happens once, at construction. A negative count or a range
//! whose last element would not fit in `i64` is rejected before a single
//! element is produced, so iteration itself is infallible and never overflows.

use std::iter::FusedIterator;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a range could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("range count must not be negative, got {count}")]
    NegativeCount { count: i64 },
    #[error("range of {count} elements starting at {start} overflows i64")]
    Overflow { start: i64, count: u64 },
}

/// Immutable descriptor of a bounded arithmetic progression with step 1.
///
/// Deserialization runs the same validation as [`RangeSpec::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRangeSpec", into = "RawRangeSpec")]
pub struct RangeSpec {
    start: i64,
    count: u64,
}

#[derive(Serialize, Deserialize)]
struct RawRangeSpec {
    start: i64,
    count: i64,
}

impl RangeSpec {
    pub fn new(start: i64, count: i64) -> Result<Self, RangeError> {
        let Ok(count) = u64::try_from(count) else {
            return Err(RangeError::NegativeCount { count });
        };

        if count > 0 && start.checked_add_unsigned(count - 1).is_none() {
            return Err(RangeError::Overflow { start, count });
        }

        Ok(Self { start, count })
    }

    #[must_use]
    pub const fn start(&self) -> i64 {
        self.start
    }

    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Last element of the range, `None` when empty.
    #[must_use]
    pub fn last(&self) -> Option<i64> {
        self.count
            .checked_sub(1)
            .and_then(|offset| self.start.checked_add_unsigned(offset))
    }

    /// A fresh sequence over this range.
    ///
    /// Each call starts again at `start`; sequences never share a cursor.
    pub fn iter(&self) -> LazyRange {
        LazyRange {
            next: self.start,
            remaining: self.count,
        }
    }
}

impl TryFrom<RawRangeSpec> for RangeSpec {
    type Error = RangeError;

    fn try_from(raw: RawRangeSpec) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.count)
    }
}

impl From<RangeSpec> for RawRangeSpec {
    fn from(spec: RangeSpec) -> Self {
        // `RangeSpec::new` only accepts non-negative i64 counts.
        Self {
            start: spec.start,
            count: spec.count as i64,
        }
    }
}

impl IntoIterator for RangeSpec {
    type Item = i64;
    type IntoIter = LazyRange;

    fn into_iter(self) -> LazyRange {
        self.iter()
    }
}

impl IntoIterator for &RangeSpec {
    type Item = i64;
    type IntoIter = LazyRange;

    fn into_iter(self) -> LazyRange {
        self.iter()
    }
}

/// Build a lazy sequence of `count` integers starting at `start`.
///
/// ```
/// let years: Vec<i64> = tricks_types::range(13, 7).unwrap().collect();
/// assert_eq!(years, [13, 14, 15, 16, 17, 18, 19]);
/// ```
///
/// A negative count fails fast instead of yielding an empty sequence:
///
/// ```
/// use tricks_types::{RangeError, range};
///
/// assert_eq!(range(0, -1).unwrap_err(), RangeError::NegativeCount { count: -1 });
/// ```
pub fn range(start: i64, count: i64) -> Result<LazyRange, RangeError> {
    RangeSpec::new(start, count).map(|spec| spec.iter())
}

/// A single pass over a [`RangeSpec`].
///
/// Once exhausted it keeps returning `None`. It is deliberately not `Clone`,
/// so a consumed sequence cannot be replayed:
///
/// ```compile_fail
/// let years = tricks_types::range(13, 7).unwrap();
/// let replay = years.clone();
/// ```
#[derive(Debug)]
#[must_use = "ranges are lazy and do nothing unless consumed"]
pub struct LazyRange {
    next: i64,
    remaining: u64,
}

impl LazyRange {
    /// Elements not yet produced.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

impl Iterator for LazyRange {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        if self.remaining == 0 {
            return None;
        }

        let value = self.next;
        self.remaining -= 1;
        // The cursor stops on the last element; stepping past it could overflow.
        if self.remaining > 0 {
            self.next += 1;
        }
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }

    fn nth(&mut self, n: usize) -> Option<i64> {
        let skip = n as u64;
        if skip >= self.remaining {
            self.remaining = 0;
            return None;
        }

        self.next += skip as i64;
        self.remaining -= skip;
        self.next()
    }
}

impl FusedIterator for LazyRange {}
