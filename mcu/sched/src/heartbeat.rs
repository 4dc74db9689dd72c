//! The heartbeat timer and the coarse millisecond clock built on it.
//!
//! The heartbeat is always queued and always due within one period, which
//! keeps the queue non-empty and keeps the sentinel's wake time valid.

use mcu_core::{millis_is_before, Flow, TimerResult};

use crate::timer::TimerEvent;
use crate::Scheduler;

pub(crate) fn heartbeat_event(event: &mut TimerEvent<'_>) -> Flow<TimerResult> {
    let sched = event.scheduler();
    let period = sched.tick_millis();
    sched.port().timer_periodic();
    event.advance(period);
    sched.follow_heartbeat(event.wake_time());
    Ok(TimerResult::Reschedule)
}

impl Scheduler {
    /// Count one heartbeat; returns the heartbeat period in ticks
    fn tick_millis(&self) -> u32 {
        critical_section::with(|cs| {
            let millis = self.millis.borrow(cs);
            millis.set(millis.get().wrapping_add(1));
            self.heartbeat_ticks.borrow(cs).get()
        })
    }

    /// Heartbeats since start, wrapping at 16 bits
    pub fn millis(&self) -> u16 {
        critical_section::with(|cs| self.millis.borrow(cs).get())
    }

    /// Heartbeat period in ticks (zero before [`Scheduler::start`])
    pub fn heartbeat_ticks(&self) -> u32 {
        critical_section::with(|cs| self.heartbeat_ticks.borrow(cs).get())
    }

    /// Check whether a recurring event of `period` milliseconds is due.
    ///
    /// `next` is the caller's own deadline on the millisecond clock. Returns
    /// false without touching it until the clock reaches it; then moves it to
    /// `period` past the current count and returns true.
    pub fn check_periodic(&self, period: u16, next: &mut u16) -> bool {
        let now = self.millis();
        if millis_is_before(now, *next) {
            return false;
        }
        *next = now.wrapping_add(period);
        true
    }
}
