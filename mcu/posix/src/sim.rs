//! Simulated timer peripheral

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use mcu_core::{Port, ShutdownReport, Ticks};
use mcu_sched::Scheduler;
use parking_lot::{const_mutex, Mutex};

/// A free-running 32-bit tick counter with one compare register.
///
/// Time only moves through [`SimPort::advance`] (or [`SimPort::set_time`]),
/// which fires the scheduler's timer interrupt at every armed wake time it
/// passes while the interrupt line is enabled.
pub struct SimPort {
    now: AtomicU32,
    ticks_per_us: u32,
    irq_enabled: AtomicBool,
    armed: AtomicU32,
    armed_valid: AtomicBool,
    periodic: AtomicU32,
    reports: Mutex<Vec<ShutdownReport>>,
}

impl SimPort {
    pub const fn new(ticks_per_us: u32) -> Self {
        Self {
            now: AtomicU32::new(0),
            ticks_per_us,
            irq_enabled: AtomicBool::new(true),
            armed: AtomicU32::new(0),
            armed_valid: AtomicBool::new(false),
            periodic: AtomicU32::new(0),
            reports: const_mutex(Vec::new()),
        }
    }

    /// Current simulated time
    pub fn now(&self) -> Ticks {
        Ticks(self.now.load(Ordering::SeqCst))
    }

    /// Jump the counter without firing anything
    pub fn set_time(&self, now: Ticks) {
        self.now.store(now.0, Ordering::SeqCst);
    }

    pub fn ticks_per_us(&self) -> u32 {
        self.ticks_per_us
    }

    /// State of the timer interrupt line
    pub fn irq_enabled(&self) -> bool {
        self.irq_enabled.load(Ordering::SeqCst)
    }

    /// The compare value, if the timer has been armed
    pub fn armed(&self) -> Option<Ticks> {
        self.armed_valid
            .load(Ordering::SeqCst)
            .then(|| Ticks(self.armed.load(Ordering::SeqCst)))
    }

    /// Heartbeats seen by the board hook
    pub fn periodic_calls(&self) -> u32 {
        self.periodic.load(Ordering::SeqCst)
    }

    /// Shutdown reports sent so far
    pub fn reports(&self) -> Vec<ShutdownReport> {
        self.reports.lock().clone()
    }

    /// Drain the report sink
    pub fn take_reports(&self) -> Vec<ShutdownReport> {
        std::mem::take(&mut *self.reports.lock())
    }

    /// Move time forward by `ticks`, running the timer interrupt at every
    /// armed wake time inside the window. Returns the number of interrupts.
    ///
    /// A wake time armed in the past fires at the current time. Firing stops
    /// for the rest of the window once the interrupt line is disabled.
    pub fn advance(&self, sched: &Scheduler, ticks: u32) -> usize {
        let target = self.now().wrapping_add(ticks);
        let mut fired = 0;
        while self.irq_enabled() {
            let Some(wake) = self.armed() else {
                break;
            };
            if target.is_before(wake) {
                break;
            }
            if self.now().is_before(wake) {
                self.set_time(wake);
            }
            fired += 1;
            if sched.timer_irq().is_err() {
                log::debug!("timer interrupt unwound at {}", self.now());
                break;
            }
        }
        self.set_time(target);
        fired
    }
}

impl Port for SimPort {
    fn read_time(&self) -> Ticks {
        self.now()
    }

    fn ticks_from_us(&self, us: u32) -> u32 {
        us.wrapping_mul(self.ticks_per_us)
    }

    fn irq_disable(&self) {
        self.irq_enabled.store(false, Ordering::SeqCst);
    }

    fn irq_enable(&self) {
        self.irq_enabled.store(true, Ordering::SeqCst);
    }

    fn arm_timer(&self, wake: Ticks) {
        self.armed.store(wake.0, Ordering::SeqCst);
        self.armed_valid.store(true, Ordering::SeqCst);
    }

    fn timer_periodic(&self) {
        self.periodic.fetch_add(1, Ordering::Relaxed);
    }

    fn report(&self, report: &ShutdownReport) {
        log::warn!("{}", report.to_line());
        self.reports.lock().push(*report);
    }
}
