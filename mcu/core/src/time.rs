//! Tick values and wraparound-safe comparisons

use core::fmt;

/// A value of the free-running hardware tick counter.
///
/// The counter wraps at 32 bits, so two values are only ordered relative to
/// each other while they are less than half the range apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ticks(pub u32);

impl Ticks {
    /// Tick zero
    pub const ZERO: Self = Self(0);

    /// Half of the 32-bit range; the furthest two comparable values can be apart
    pub const HALF_RANGE: u32 = 0x8000_0000;

    /// Create a tick value
    pub const fn new(ticks: u32) -> Self {
        Self(ticks)
    }

    /// Get the raw counter value
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// True if `self` comes strictly before `other` on the wrapping timeline
    pub const fn is_before(self, other: Ticks) -> bool {
        (self.0.wrapping_sub(other.0) as i32) < 0
    }

    /// Move forward by `ticks`, wrapping at 32 bits
    pub const fn wrapping_add(self, ticks: u32) -> Self {
        Self(self.0.wrapping_add(ticks))
    }

    /// Ticks from `earlier` to `self`
    pub const fn wrapping_since(self, earlier: Ticks) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }
}

impl From<u32> for Ticks {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ticks", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Ticks {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}ticks", self.0);
    }
}

/// True if millisecond count `a` comes strictly before `b`.
///
/// The coarse millisecond clock is 16 bits wide, so deadlines on it must stay
/// within about 32 seconds of the current count.
pub const fn millis_is_before(a: u16, b: u16) -> bool {
    (a.wrapping_sub(b) as i16) < 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_before_plain() {
        assert!(Ticks(10).is_before(Ticks(11)));
        assert!(!Ticks(11).is_before(Ticks(10)));
        assert!(!Ticks(10).is_before(Ticks(10)));
    }

    #[test]
    fn test_is_before_across_wrap() {
        let late = Ticks(u32::MAX - 5);
        let wrapped = late.wrapping_add(10);
        assert_eq!(wrapped, Ticks(4));
        assert!(late.is_before(wrapped));
        assert!(!wrapped.is_before(late));
    }

    #[test]
    fn test_half_range_boundary() {
        let base = Ticks(1000);
        // Anything less than half the range ahead is "after"
        assert!(base.is_before(base.wrapping_add(Ticks::HALF_RANGE - 1)));
        // Exactly half the range ahead reads as "before"
        assert!(base.wrapping_add(Ticks::HALF_RANGE).is_before(base));
    }

    #[test]
    fn test_wrapping_since() {
        assert_eq!(Ticks(3).wrapping_since(Ticks(u32::MAX)), 4);
    }

    #[test]
    fn test_millis_is_before() {
        assert!(millis_is_before(65535, 0));
        assert!(!millis_is_before(0, 65535));
        assert!(millis_is_before(99, 100));
        assert!(!millis_is_before(100, 100));
    }
}
