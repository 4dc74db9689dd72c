use std::boxed::Box;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::vec::Vec;

use crate::{Port, SchedConfig, Scheduler, ShutdownReport, Ticks};


/// Port with a hand-cranked clock; one tick per microsecond
pub(crate) struct TestPort {
    now: AtomicU32,
    irq_enabled: AtomicBool,
    armed: AtomicU32,
    periodic: AtomicU32,
    reports: Mutex<Vec<ShutdownReport>>,
}

impl TestPort {
    fn new(now: u32) -> Self {
        Self {
            now: AtomicU32::new(now),
            irq_enabled: AtomicBool::new(true),
            armed: AtomicU32::new(0),
            periodic: AtomicU32::new(0),
            reports: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_time(&self, now: u32) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub(crate) fn irq_enabled(&self) -> bool {
        self.irq_enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn armed(&self) -> Ticks {
        Ticks(self.armed.load(Ordering::SeqCst))
    }

    pub(crate) fn periodic_calls(&self) -> u32 {
        self.periodic.load(Ordering::SeqCst)
    }

    pub(crate) fn reports(&self) -> Vec<ShutdownReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl Port for TestPort {
    fn read_time(&self) -> Ticks {
        Ticks(self.now.load(Ordering::SeqCst))
    }

    fn ticks_from_us(&self, us: u32) -> u32 {
        us
    }

    fn irq_disable(&self) {
        self.irq_enabled.store(false, Ordering::SeqCst);
    }

    fn irq_enable(&self) {
        self.irq_enabled.store(true, Ordering::SeqCst);
    }

    fn arm_timer(&self, wake: Ticks) {
        self.armed.store(wake.0, Ordering::SeqCst);
    }

    fn timer_periodic(&self) {
        self.periodic.fetch_add(1, Ordering::SeqCst);
    }

    fn report(&self, report: &ShutdownReport) {
        self.reports.lock().unwrap().push(*report);
    }
}

/// A started scheduler whose heartbeat is due at tick 1000
pub(crate) fn started() -> (&'static TestPort, Scheduler) {
    let port: &'static TestPort = Box::leak(Box::new(TestPort::new(0)));
    let sched = Scheduler::with_config(port, SchedConfig::builder().name("test").build());
    sched.start();
    (port, sched)
}

/// Dispatch until the head is due after `until`, like a board's
/// "dispatch everything that is due" interrupt loop
pub(crate) fn run_until(port: &TestPort, sched: &Scheduler, until: u32) -> usize {
    let mut fired = 0;
    loop {
        let wake = sched.head_wake();
        if Ticks(until).is_before(wake) {
            port.set_time(until);
            return fired;
        }
        port.set_time(wake.0);
        fired += 1;
        if sched.timer_irq().is_err() {
            return fired;
        }
    }
}
