#![no_std]
#![forbid(unsafe_code)]

//! # Main loop
//!
//! The cooperative half of the scheduler. Runs the init handlers once, then
//! every background task in registration order, pass after pass. Timer
//! callbacks preempt it from the timer interrupt.
//!
//! The loop is also the shutdown recovery point. A [`Shutdown`] token
//! returned by a task, an init handler, or left pending by the interrupt ends
//! the current pass; [`Scheduler::run_shutdown`] runs and the loop carries on
//! with the next pass. A shutdown handler that forces another shutdown
//! restarts the handler list from the top.

use mcu_sched::{Flow, Scheduler, Shutdown};

pub use mcu_sched;

/// The cooperative task loop
pub struct MainLoop<'a> {
    sched: &'a Scheduler,
}

impl<'a> MainLoop<'a> {
    /// Create a loop driving `sched`
    pub const fn new(sched: &'a Scheduler) -> Self {
        Self { sched }
    }

    /// The scheduler this loop drives
    pub fn scheduler(&self) -> &'a Scheduler {
        self.sched
    }

    /// Start the clock and run every init handler once.
    ///
    /// A shutdown raised during init skips the remaining handlers.
    pub fn start(&self) {
        self.sched.start();
        if let Err(shutdown) = self.run_init() {
            self.recover(shutdown);
        }
        log::info!("{}: starting", self.sched.config().name);
    }

    fn run_init(&self) -> Flow {
        for init in self.sched.init_handlers().iter() {
            init(self.sched)?;
        }
        Ok(())
    }

    /// Run every task once, then the idle callback.
    ///
    /// Returns early, after recovering, if a task or the timer interrupt
    /// shut the machine down.
    pub fn run_pass(&self) {
        if let Err(shutdown) = self.run_tasks() {
            self.recover(shutdown);
            return;
        }
        if let Some(idle) = self.sched.config().idle_callback {
            idle();
        }
    }

    fn run_tasks(&self) -> Flow {
        for task in self.sched.task_handlers().iter() {
            self.sched.checkpoint()?;
            task(self.sched)?;
        }
        self.sched.checkpoint()
    }

    fn recover(&self, _shutdown: Shutdown) {
        log::debug!("{}: unwound to recovery point", self.sched.config().name);
        // A handler that shuts down again lands back here
        while let Err(_again) = self.sched.run_shutdown() {
            log::debug!("{}: restarting shutdown handlers", self.sched.config().name);
        }
    }

    /// Loop forever
    pub fn run(&self) -> ! {
        loop {
            self.run_pass();
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MainLoop<'_> {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "MainLoop{{sched: {}}}", self.sched);
    }
}
