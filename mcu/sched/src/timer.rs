//! Timer registration, queue management and the interrupt-time dispatcher

use mcu_core::{Flow, McuError, McuResult, Shutdown, Ticks, TimerResult};

use crate::queue::{PendingTimer, TimerFn, TimerId};
use crate::{Scheduler, MAX_TIMERS};

/// What a timer callback sees while it runs
pub struct TimerEvent<'a> {
    id: TimerId,
    wake_time: Ticks,
    sched: &'a Scheduler,
}

impl<'a> TimerEvent<'a> {
    /// The timer being run
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// The wake time the timer fired at, or the new one if already changed
    pub fn wake_time(&self) -> Ticks {
        self.wake_time
    }

    /// Set the wake time used if the callback returns `Reschedule`
    pub fn set_wake_time(&mut self, wake: Ticks) {
        self.wake_time = wake;
    }

    /// Push the wake time forward by `ticks`
    pub fn advance(&mut self, ticks: u32) {
        self.wake_time = self.wake_time.wrapping_add(ticks);
    }

    /// The scheduler running this timer
    pub fn scheduler(&self) -> &'a Scheduler {
        self.sched
    }
}

impl Scheduler {
    /// Claim a timer slot for `func`.
    ///
    /// Slots are never returned; drivers claim theirs once during startup.
    pub fn register_timer(&self, func: TimerFn) -> McuResult<TimerId> {
        critical_section::with(|cs| self.queue.borrow_ref_mut(cs).allocate(func))
            .ok_or(McuError::TimerSlotsExhausted)
    }

    /// Schedule `id` to run at `wake`.
    ///
    /// `wake` must not be before the current head of the queue, and the timer
    /// must not already be queued. Either violation shuts the machine down
    /// and leaves the queue untouched.
    pub fn add_timer(&self, id: TimerId, wake: Ticks) -> Flow {
        critical_section::with(|cs| {
            if self.shutdown.borrow(cs).get().unwind_pending {
                return Err(Shutdown::unwind());
            }
            let added = self.queue.borrow_ref_mut(cs).add(id, wake);
            match added {
                Ok(()) => {
                    log::trace!("timer {} added at {}", id.index(), wake);
                    Ok(())
                }
                Err(violation) => {
                    log::error!(
                        "timer {} rejected at {} ({:?}, head at {})",
                        id.index(),
                        wake,
                        violation,
                        self.head_wake()
                    );
                    Err(self.trigger_shutdown(violation.reason()))
                }
            }
        })
    }

    /// Take `id` off the queue; a no-op if it is not queued
    pub fn remove_timer(&self, id: TimerId) {
        if critical_section::with(|cs| self.queue.borrow_ref_mut(cs).remove(id)) {
            log::trace!("timer {} removed", id.index());
        }
    }

    /// Check if `id` is currently queued
    pub fn is_scheduled(&self, id: TimerId) -> bool {
        critical_section::with(|cs| self.queue.borrow_ref(cs).is_linked(id))
    }

    /// Wake time of `id`, whether queued or not
    pub fn timer_wake_time(&self, id: TimerId) -> Ticks {
        critical_section::with(|cs| self.queue.borrow_ref(cs).wake_time(id))
    }

    /// Wake time of the entry at the head of the queue
    pub fn head_wake(&self) -> Ticks {
        critical_section::with(|cs| self.queue.borrow_ref(cs).head_wake())
    }

    /// The queue in dispatch order, ending with the sentinel
    pub fn pending(&self) -> heapless::Vec<PendingTimer, MAX_TIMERS> {
        critical_section::with(|cs| self.queue.borrow_ref(cs).snapshot())
    }

    /// Run the timer at the head of the queue.
    ///
    /// Called from the timer interrupt at the armed wake time. Returns the
    /// wake time to arm next. The whole call, callback included, runs inside
    /// one critical section.
    pub fn dispatch(&self) -> Flow<Ticks> {
        critical_section::with(|cs| {
            if self.shutdown.borrow(cs).get().unwind_pending {
                return Err(Shutdown::unwind());
            }
            let (id, func, wake_time) = self.queue.borrow_ref(cs).head_entry();
            let mut event = TimerEvent {
                id,
                wake_time,
                sched: self,
            };
            let result = func(&mut event)?;
            let next = self
                .queue
                .borrow_ref_mut(cs)
                .complete(id, result, event.wake_time);
            Ok(next)
        })
    }

    /// Timer interrupt body: dispatch, then re-arm the hardware
    pub fn timer_irq(&self) -> Flow<Ticks> {
        let next = self.dispatch()?;
        self.port.arm_timer(next);
        Ok(next)
    }

    pub(crate) fn follow_heartbeat(&self, heartbeat_wake: Ticks) {
        critical_section::with(|cs| {
            self.queue
                .borrow_ref_mut(cs)
                .follow_heartbeat(heartbeat_wake)
        });
    }

    pub(crate) fn discard_user_timers(&self) {
        critical_section::with(|cs| self.queue.borrow_ref_mut(cs).discard_user_timers());
    }
}
