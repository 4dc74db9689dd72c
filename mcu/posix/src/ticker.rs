//! Real-time ticker for POSIX
//!
//! A dedicated thread moves a [`SimPort`]'s counter forward at a fixed rate,
//! playing the timer interrupt for the scheduler. Sleeps to absolute
//! deadlines on the monotonic clock so the simulated time does not drift.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use mcu_core::Port;
use mcu_sched::Scheduler;
use parking_lot::{const_mutex, Mutex};
use thiserror::Error;

use crate::SimPort;

/// Highest supported tick rate in Hz
pub const MAX_TICK_RATE_HZ: u32 = 10_000;

const NSEC_PER_SEC: u64 = 1_000_000_000;
const USEC_PER_SEC: u32 = 1_000_000;

static TICKER_RUNNING: AtomicBool = AtomicBool::new(false);
static TICKER_THREAD: Mutex<Option<JoinHandle<()>>> = const_mutex(None);

/// Errors from starting or stopping the ticker
#[derive(Error, Debug)]
pub enum TickerError {
    #[error("tick rate must be between 1 and 10000 Hz, got {0}")]
    InvalidRate(u32),
    #[error("ticker is already running")]
    AlreadyRunning,
    #[error("ticker is not running")]
    NotRunning,
    #[error("failed to spawn ticker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("ticker thread panicked")]
    Panicked,
}

/// Wall-clock period of one tick at `rate_hz`
pub fn tick_period(rate_hz: u32) -> Duration {
    Duration::from_nanos(NSEC_PER_SEC / u64::from(rate_hz))
}

/// Simulated ticks the port advances per real tick at `rate_hz`
pub fn ticks_per_tick(port: &SimPort, rate_hz: u32) -> u32 {
    port.ticks_from_us(USEC_PER_SEC / rate_hz)
}

/// Check if the ticker thread is running
pub fn is_running() -> bool {
    TICKER_RUNNING.load(Ordering::SeqCst)
}

/// Start the ticker thread.
///
/// Every `1 / rate_hz` seconds of wall time the thread advances `port` by the
/// same span of simulated time, firing whatever timers fall due.
pub fn start_ticker(
    sched: &'static Scheduler,
    port: &'static SimPort,
    rate_hz: u32,
) -> Result<(), TickerError> {
    if rate_hz == 0 || rate_hz > MAX_TICK_RATE_HZ {
        return Err(TickerError::InvalidRate(rate_hz));
    }
    if TICKER_RUNNING.swap(true, Ordering::SeqCst) {
        return Err(TickerError::AlreadyRunning);
    }

    let period = tick_period(rate_hz);
    let step = ticks_per_tick(port, rate_hz);
    let spawned = thread::Builder::new()
        .name("mcu-ticker".into())
        .spawn(move || ticker_thread(sched, port, period, step));
    let handle = match spawned {
        Ok(handle) => handle,
        Err(err) => {
            TICKER_RUNNING.store(false, Ordering::SeqCst);
            return Err(err.into());
        }
    };

    log::debug!("ticker started at {} Hz, {} ticks per tick", rate_hz, step);
    *TICKER_THREAD.lock() = Some(handle);
    Ok(())
}

/// Stop the ticker thread and wait for it to finish
pub fn stop_ticker() -> Result<(), TickerError> {
    if !TICKER_RUNNING.swap(false, Ordering::SeqCst) {
        return Err(TickerError::NotRunning);
    }
    // Release the lock before joining
    let handle = TICKER_THREAD.lock().take();
    if let Some(handle) = handle {
        handle.join().map_err(|_| TickerError::Panicked)?;
    }
    log::debug!("ticker stopped");
    Ok(())
}

fn ticker_thread(sched: &'static Scheduler, port: &'static SimPort, period: Duration, step: u32) {
    let mut next_tick = Instant::now();

    while TICKER_RUNNING.load(Ordering::Relaxed) {
        next_tick += period;

        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        }

        port.advance(sched, step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_period() {
        assert_eq!(tick_period(100), Duration::from_millis(10));
        assert_eq!(tick_period(1000), Duration::from_micros(1000));
    }

    #[test]
    fn test_ticks_per_tick_uses_port_rate() {
        let port = SimPort::new(16);
        assert_eq!(ticks_per_tick(&port, 1000), 16_000);
        assert_eq!(ticks_per_tick(&port, 100), 160_000);
    }

    // The only test touching the global ticker; the rest of the suite stays
    // off it so parallel tests do not race on the running flag
    #[test]
    fn test_ticker_lifecycle() {
        static PORT: SimPort = SimPort::new(1);
        static SCHED: Scheduler = Scheduler::new(&PORT);

        assert!(matches!(
            start_ticker(&SCHED, &PORT, 0),
            Err(TickerError::InvalidRate(0))
        ));
        assert!(matches!(stop_ticker(), Err(TickerError::NotRunning)));

        SCHED.start();
        start_ticker(&SCHED, &PORT, 1000).unwrap();
        assert!(is_running());
        assert!(matches!(
            start_ticker(&SCHED, &PORT, 1000),
            Err(TickerError::AlreadyRunning)
        ));

        // Let it run for ~100ms
        thread::sleep(Duration::from_millis(100));
        stop_ticker().unwrap();
        assert!(!is_running());

        let millis = SCHED.millis();
        // Allow generous tolerance for scheduling jitter
        assert!((50..=150).contains(&millis), "expected ~100 heartbeats, got {}", millis);
    }
}
