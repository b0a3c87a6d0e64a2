//! Wrap-safe tick arithmetic for key-event timestamps.
//!
//! Key transitions are stamped with a 16-bit tick counter (one tick per
//! millisecond) that wraps around roughly once a minute. Every comparison
//! therefore goes through a wrapping subtraction whose result is interpreted
//! as a signed quantity; the intervals the core works with (a few hundred
//! milliseconds) are far below half the counter range, so the interpretation
//! is unambiguous.

use embassy_time::{Duration, Instant};

/// A 16-bit wrapping timestamp, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tick(u16);

impl Tick {
    /// The zero timestamp, used as the initial "previous pass" marker.
    pub const ZERO: Self = Self(0);

    /// Current timestamp, derived from the monotonic clock.
    #[must_use]
    pub fn now() -> Self {
        Self::from_instant(Instant::now())
    }

    /// Truncates a monotonic instant down to the 16-bit tick counter.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_instant(at: Instant) -> Self {
        Self(at.as_millis() as u16)
    }

    /// Builds a timestamp from a raw tick count.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw tick count.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Ticks elapsed between `earlier` and `self`, modulo the counter width.
    #[must_use]
    pub const fn since(self, earlier: Self) -> u16 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Whether `self` is at or past `other`, under signed wrap interpretation.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn at_or_after(self, other: Self) -> bool {
        self.0.wrapping_sub(other.0) as i16 >= 0
    }

    /// Whether `self` is strictly past `other`, under signed wrap interpretation.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn after(self, other: Self) -> bool {
        self.0.wrapping_sub(other.0) as i16 > 0
    }
}

/// Number of ticks spanned by the given duration.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn ticks(duration: Duration) -> u16 {
    duration.as_millis() as u16
}
