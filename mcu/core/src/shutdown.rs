//! Shutdown vocabulary: reason codes, states, the report and the unwind token

use core::fmt::{self, Write};

/// Numeric shutdown reason.
///
/// Codes index an external static string table; the scheduler's own reasons
/// sit below [`ShutdownReason::USER_BASE`] and carry a built-in description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ShutdownReason(pub u16);

impl ShutdownReason {
    /// No reason recorded
    pub const NONE: Self = Self(0);
    /// A timer was added with a wake time before the queue head
    pub const TIMER_TOO_CLOSE: Self = Self(1);
    /// The sentinel timer was dispatched
    pub const SENTINEL_FIRED: Self = Self(2);
    /// `clear_shutdown` was called while not shut down
    pub const CLEAR_NOT_SHUTDOWN: Self = Self(3);
    /// A timer that is already queued was added again
    pub const TIMER_ALREADY_SCHEDULED: Self = Self(4);

    /// First code available to drivers
    pub const USER_BASE: Self = Self(0x100);

    /// Create a reason from a raw code
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Driver reason `offset` codes above [`ShutdownReason::USER_BASE`]
    pub const fn user(offset: u16) -> Self {
        Self(Self::USER_BASE.0 + offset)
    }

    /// Get the raw code
    pub const fn code(self) -> u16 {
        self.0
    }

    /// Text for the scheduler's own reasons
    pub const fn description(self) -> Option<&'static str> {
        match self.0 {
            1 => Some("Timer too close"),
            2 => Some("sentinel timer called"),
            3 => Some("Shutdown cleared when not shutdown"),
            4 => Some("Timer already scheduled"),
            _ => None,
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(text) => write!(f, "{} ({})", text, self.0),
            None => write!(f, "reason {}", self.0),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ShutdownReason {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "ShutdownReason({})", self.0);
    }
}

/// Emergency-stop state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownState {
    /// Running normally
    #[default]
    Normal,
    /// A shutdown was triggered and its handlers have not finished
    ShuttingDown,
    /// Handlers ran; waiting for an external clear
    Complete,
}

#[cfg(feature = "defmt")]
impl defmt::Format for ShutdownState {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            ShutdownState::Normal => defmt::write!(fmt, "Normal"),
            ShutdownState::ShuttingDown => defmt::write!(fmt, "ShuttingDown"),
            ShutdownState::Complete => defmt::write!(fmt, "Complete"),
        }
    }
}

/// Control-flow token for the non-local transfer to the main loop's recovery
/// point.
///
/// Obtain one from the scheduler's `trigger_shutdown`, `try_shutdown` or
/// `checkpoint`, which record the shutdown and disable the timer interrupt
/// first. Code holding one must stop its work and hand the token up with `?`
/// until the main loop catches it.
#[must_use = "a shutdown must be propagated to the main loop"]
#[derive(Debug, PartialEq, Eq)]
pub struct Shutdown {
    _private: (),
}

impl Shutdown {
    /// Raw constructor for the scheduler crate.
    ///
    /// Records nothing: a token made here without a recorded shutdown makes
    /// the main loop run the handlers with [`ShutdownReason::NONE`].
    #[doc(hidden)]
    pub const fn unwind() -> Self {
        Self { _private: () }
    }
}

impl fmt::Display for Shutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shutdown in progress")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Shutdown {}

/// Result of any operation that may abort to the recovery point
pub type Flow<T = ()> = Result<T, Shutdown>;

/// Longest line [`ShutdownReport::to_line`] produces
pub const REPORT_LINE_LEN: usize = 48;

/// The one diagnostic emitted per completed shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Tick counter sampled when recovery started
    pub clock: crate::Ticks,
    /// Reason recorded by the first trigger
    pub reason: ShutdownReason,
}

impl ShutdownReport {
    /// Render the report into a fixed buffer for a byte-oriented channel
    pub fn to_line(&self) -> heapless::String<REPORT_LINE_LEN> {
        let mut line = heapless::String::new();
        // 48 bytes fit the longest u32 and u16 renderings
        let _ = write!(line, "{}", self);
        line
    }
}

impl fmt::Display for ShutdownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shutdown clock={} static_string_id={}",
            self.clock.0, self.reason.0
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ShutdownReport {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "shutdown clock={} static_string_id={}",
            self.clock.0,
            self.reason.0
        );
    }
}
