//! Timer callback results

/// What a timer callback wants the dispatcher to do with its timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerResult {
    /// Keep the timer scheduled at its (possibly updated) wake time
    Reschedule,
    /// Drop the timer from the queue
    Done,
}

impl TimerResult {
    /// Check if the timer stays scheduled
    pub const fn is_reschedule(self) -> bool {
        matches!(self, Self::Reschedule)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TimerResult {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Reschedule => defmt::write!(fmt, "Reschedule"),
            Self::Done => defmt::write!(fmt, "Done"),
        }
    }
}
