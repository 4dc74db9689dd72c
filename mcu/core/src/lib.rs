#![no_std]
#![forbid(unsafe_code)]

//! # mcu core
//!
//! Shared vocabulary for the mcu timer scheduler: wraparound-safe tick values,
//! timer callback results, shutdown reason codes and the unwind token, and the
//! [`Port`] trait a board implements to drive the scheduler.

use core::fmt;

pub mod port;
pub mod shutdown;
pub mod time;
pub mod timer;

pub use port::*;
pub use shutdown::*;
pub use time::*;
pub use timer::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type for recoverable (startup-time) operations
pub type McuResult<T> = Result<T, McuError>;

/// Errors that are reported through normal returns.
///
/// Anything fatal at run time goes through [`Shutdown`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McuError {
    /// Every timer slot in the registry is already handed out
    TimerSlotsExhausted,
    /// A handler list (init, task or shutdown) is full
    HandlerTableFull,
}

impl fmt::Display for McuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            McuError::TimerSlotsExhausted => write!(f, "No free timer slots"),
            McuError::HandlerTableFull => write!(f, "Handler table is full"),
        }
    }
}

#[cfg(feature = "std")]
extern crate std;

#[cfg(feature = "std")]
impl std::error::Error for McuError {}

#[cfg(feature = "defmt")]
impl defmt::Format for McuError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            McuError::TimerSlotsExhausted => defmt::write!(fmt, "TimerSlotsExhausted"),
            McuError::HandlerTableFull => defmt::write!(fmt, "HandlerTableFull"),
        }
    }
}
