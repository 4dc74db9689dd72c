//! Host port for the mcu scheduler
//!
//! Stands in for the board on Linux/Unix: a simulated tick counter with a
//! compare register and an interrupt-enable line ([`SimPort`]), and a
//! background thread that moves simulated time forward in real time
//! ([`ticker`]). Critical sections come from `critical-section`'s `std`
//! implementation, so the ticker thread plays the timer interrupt.

pub mod sim;
pub mod ticker;

pub use sim::SimPort;
pub use ticker::{start_ticker, stop_ticker, TickerError};
