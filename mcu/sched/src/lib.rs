#![no_std]
#![forbid(unsafe_code)]

//! # mcu scheduler
//!
//! The interrupt-driven half of the firmware's cooperative scheduler:
//!
//! - an ordered timer queue anchored by a 1 ms heartbeat and bounded by a
//!   sentinel, so traversal never needs an end-of-list check,
//! - the dispatcher the timer interrupt calls at every armed wake time,
//! - a coarse millisecond clock with a periodic-check helper,
//! - the emergency-stop state machine and its handler lists.
//!
//! All shared state is guarded by `critical_section`; there is exactly one
//! asynchronous writer (the timer interrupt), so that is the only lock.
//!
//! Timers live in a fixed registry inside the [`Scheduler`]. A driver claims
//! a slot once at startup with [`Scheduler::register_timer`] and keeps the
//! returned [`TimerId`] for the life of the program.

use core::cell::{Cell, RefCell};

use critical_section::Mutex;

pub mod config;
pub mod heartbeat;
mod queue;
pub mod registry;
pub mod shutdown;
pub mod timer;

pub use config::*;
pub use mcu_core::*;
pub use queue::{PendingTimer, TimerFn, TimerId};
pub use registry::{InitFn, ShutdownFn, TaskFn};
pub use timer::TimerEvent;

use queue::TimerQueue;
use registry::HandlerRegistry;
use shutdown::ShutdownStatus;

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod tests;

/// Timer slots in the registry, including the heartbeat, sentinel and
/// deleted-marker timers
pub const MAX_TIMERS: usize = 32;

/// Capacity of each handler list (init, task, shutdown)
pub const MAX_HANDLERS: usize = 16;

/// The scheduler: timer queue, coarse clock, shutdown state and handler lists.
///
/// Construct it in a `static` with the board's [`Port`]:
///
/// ```ignore
/// static SCHED: Scheduler = Scheduler::new(&BOARD);
/// ```
pub struct Scheduler {
    port: &'static dyn Port,
    config: SchedConfig,
    queue: Mutex<RefCell<TimerQueue>>,
    millis: Mutex<Cell<u16>>,
    heartbeat_ticks: Mutex<Cell<u32>>,
    shutdown: Mutex<Cell<ShutdownStatus>>,
    handlers: Mutex<RefCell<HandlerRegistry>>,
}

impl Scheduler {
    /// Create a scheduler with the default configuration
    pub const fn new(port: &'static dyn Port) -> Self {
        Self::with_config(port, SchedConfig::DEFAULT)
    }

    /// Create a scheduler with an explicit configuration
    pub const fn with_config(port: &'static dyn Port, config: SchedConfig) -> Self {
        Self {
            port,
            config,
            queue: Mutex::new(RefCell::new(TimerQueue::new())),
            millis: Mutex::new(Cell::new(0)),
            heartbeat_ticks: Mutex::new(Cell::new(0)),
            shutdown: Mutex::new(Cell::new(ShutdownStatus::NORMAL)),
            handlers: Mutex::new(RefCell::new(HandlerRegistry::new())),
        }
    }

    /// The configuration this scheduler was built with
    pub fn config(&self) -> &SchedConfig {
        &self.config
    }

    /// The board port
    pub fn port(&self) -> &'static dyn Port {
        self.port
    }

    /// Start the clock.
    ///
    /// Converts the heartbeat period to ticks, drops anything left on the
    /// queue, schedules the heartbeat one period from now and arms the timer
    /// interrupt. Drivers add their timers after this.
    pub fn start(&self) {
        let period = self.port.ticks_from_us(self.config.heartbeat_us);
        let first = self.port.read_time().wrapping_add(period);
        let wake = critical_section::with(|cs| {
            self.heartbeat_ticks.borrow(cs).set(period);
            let mut queue = self.queue.borrow_ref_mut(cs);
            queue.restart(first);
            queue.head_wake()
        });
        log::debug!(
            "{}: clock started, heartbeat every {} ticks",
            self.config.name,
            period
        );
        self.port.arm_timer(wake);
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Scheduler {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "Scheduler{{millis: {}, state: {}}}",
            self.millis(),
            self.shutdown_state()
        );
    }
}
