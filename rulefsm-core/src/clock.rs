//! Simulation clock values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point on the host's discrete-event clock, in whole seconds.
///
/// `Timestamp::NEVER` sorts after every real time and is used both as
/// "no dwell obligation" and as "no wake-up needed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// The clock origin.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Sentinel for "never".
    pub const NEVER: Timestamp = Timestamp(i64::MAX);

    pub fn new(seconds: i64) -> Self {
        Self(seconds)
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    pub fn is_never(&self) -> bool {
        *self == Self::NEVER
    }

    /// Seconds elapsed from `earlier` to `self`.
    pub fn seconds_since(&self, earlier: Timestamp) -> f64 {
        if self.is_never() || earlier.is_never() {
            return f64::INFINITY;
        }
        self.0.saturating_sub(earlier.0) as f64
    }

    /// Adds a real-valued duration, rounding up to the next whole second.
    ///
    /// Non-positive or non-finite durations yield `NEVER`, meaning "no hold".
    pub fn after(&self, seconds: f64) -> Timestamp {
        if self.is_never() || !seconds.is_finite() || seconds <= 0.0 {
            return Self::NEVER;
        }
        let whole = seconds.ceil();
        if whole >= i64::MAX as f64 {
            return Self::NEVER;
        }
        self.0
            .checked_add(whole as i64)
            .map(Timestamp)
            .unwrap_or(Self::NEVER)
    }

    /// Rounds up to the scheduler granularity.
    pub fn soften(&self, granularity: i64) -> Timestamp {
        if self.is_never() || granularity <= 1 {
            return *self;
        }
        let rem = self.0.rem_euclid(granularity);
        if rem == 0 {
            *self
        } else {
            self.0
                .checked_add(granularity - rem)
                .map(Timestamp)
                .unwrap_or(Self::NEVER)
        }
    }
}

impl From<i64> for Timestamp {
    fn from(seconds: i64) -> Self {
        Self(seconds)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_never() {
            write!(f, "NEVER")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
