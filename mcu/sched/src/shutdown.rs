//! The emergency-stop state machine.
//!
//! ```text
//!            trigger                 run_shutdown              clear
//!  Normal ----------> ShuttingDown -------------> Complete ----------> Normal
//!                          ^                         |
//!                          +------- trigger ---------+
//! ```
//!
//! A trigger disables the timer interrupt, records the reason if the machine
//! was running normally, and marks an unwind as pending. The caller gets a
//! [`Shutdown`] token to hand up to the main loop, which runs
//! [`Scheduler::run_shutdown`] at its recovery point. Until then every
//! dispatch, timer add and [`Scheduler::checkpoint`] returns the token again,
//! so nothing between the trigger and the recovery point makes progress.

use mcu_core::{Flow, Shutdown, ShutdownReason, ShutdownReport, ShutdownState};

use crate::Scheduler;

#[derive(Debug, Clone, Copy)]
pub(crate) struct ShutdownStatus {
    pub(crate) state: ShutdownState,
    pub(crate) reason: ShutdownReason,
    pub(crate) unwind_pending: bool,
}

impl ShutdownStatus {
    pub(crate) const NORMAL: Self = Self {
        state: ShutdownState::Normal,
        reason: ShutdownReason::NONE,
        unwind_pending: false,
    };
}

impl Scheduler {
    fn shutdown_status(&self) -> ShutdownStatus {
        critical_section::with(|cs| self.shutdown.borrow(cs).get())
    }

    fn update_shutdown<R>(&self, f: impl FnOnce(&mut ShutdownStatus) -> R) -> R {
        critical_section::with(|cs| {
            let cell = self.shutdown.borrow(cs);
            let mut status = cell.get();
            let out = f(&mut status);
            cell.set(status);
            out
        })
    }

    /// True unless the machine is running normally
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_status().state != ShutdownState::Normal
    }

    /// Reason recorded by the first trigger since the last clear
    pub fn shutdown_reason(&self) -> ShutdownReason {
        self.shutdown_status().reason
    }

    /// Current state of the shutdown state machine
    pub fn shutdown_state(&self) -> ShutdownState {
        self.shutdown_status().state
    }

    /// True between a trigger and the recovery point picking it up
    pub fn unwind_pending(&self) -> bool {
        self.shutdown_status().unwind_pending
    }

    /// Bail out if a shutdown is waiting for the recovery point.
    ///
    /// A trigger from the timer interrupt cannot stop a task mid-step. While
    /// the unwind is pending only `checkpoint`, [`Scheduler::add_timer`] and
    /// [`Scheduler::dispatch`] return the token; [`Scheduler::remove_timer`],
    /// the query methods and plain task code keep running. Tasks call this
    /// between steps that would otherwise keep driving hardware.
    pub fn checkpoint(&self) -> Flow {
        if self.unwind_pending() {
            Err(Shutdown::unwind())
        } else {
            Ok(())
        }
    }

    /// Force an emergency stop.
    ///
    /// Callable from task or interrupt context. There is no re-entrancy
    /// guard: every call requests a fresh pass of the shutdown handlers.
    pub fn trigger_shutdown(&self, reason: ShutdownReason) -> Shutdown {
        self.port.irq_disable();
        let first = self.update_shutdown(|status| {
            let first = status.state == ShutdownState::Normal;
            if first {
                status.reason = reason;
            }
            status.state = ShutdownState::ShuttingDown;
            status.unwind_pending = true;
            first
        });
        if first {
            log::error!("{}: shutdown: {}", self.config.name, reason);
        } else {
            log::warn!(
                "{}: shutdown requested again: {}",
                self.config.name,
                reason
            );
        }
        Shutdown::unwind()
    }

    /// Shut down unless shutdown handlers are already running
    pub fn try_shutdown(&self, reason: ShutdownReason) -> Flow {
        if self.shutdown_state() == ShutdownState::ShuttingDown {
            return Ok(());
        }
        Err(self.trigger_shutdown(reason))
    }

    /// Leave the shutdown state.
    ///
    /// Clearing while running normally is itself fatal. Clearing while the
    /// handlers are still running is ignored.
    pub fn clear_shutdown(&self) -> Flow {
        match self.shutdown_state() {
            ShutdownState::Normal => {
                Err(self.trigger_shutdown(ShutdownReason::CLEAR_NOT_SHUTDOWN))
            }
            ShutdownState::ShuttingDown => {
                log::warn!("{}: clear ignored, shutdown in progress", self.config.name);
                Ok(())
            }
            ShutdownState::Complete => {
                self.update_shutdown(|status| status.state = ShutdownState::Normal);
                log::info!("{}: shutdown cleared", self.config.name);
                Ok(())
            }
        }
    }

    /// The recovery point's work: stop all driver timers, run every shutdown
    /// handler in registration order, re-arm and re-enable the timer
    /// interrupt and send the report.
    ///
    /// Handlers run with the timer interrupt still disabled. If one of them
    /// forces another shutdown the rest of the list is skipped, no report is
    /// sent and the token is returned with the unwind still pending.
    pub fn run_shutdown(&self) -> Flow {
        let clock = self.port.read_time();
        let reason = self.update_shutdown(|status| {
            status.state = ShutdownState::ShuttingDown;
            status.unwind_pending = false;
            status.reason
        });

        self.discard_user_timers();
        let handlers = self.shutdown_handlers();
        log::debug!(
            "{}: running {} shutdown handlers",
            self.config.name,
            handlers.len()
        );
        for handler in handlers.iter() {
            if let Err(again) = handler(self) {
                log::warn!("{}: shutdown re-triggered by a handler", self.config.name);
                return Err(again);
            }
        }

        let completed = self.update_shutdown(|status| {
            if status.unwind_pending {
                return false;
            }
            status.state = ShutdownState::Complete;
            true
        });
        if !completed {
            log::warn!("{}: shutdown re-triggered by a handler", self.config.name);
            return Err(Shutdown::unwind());
        }

        // The compare register may still hold the wake time of a discarded
        // timer
        self.port.arm_timer(self.head_wake());
        self.port.irq_enable();
        let report = ShutdownReport { clock, reason };
        log::info!("{}: {}", self.config.name, report);
        self.port.report(&report);
        Ok(())
    }
}
