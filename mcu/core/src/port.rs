//! Board port abstraction

use crate::{ShutdownReport, Ticks};

/// Hardware services the scheduler needs from a board.
///
/// The interrupt save/restore used around queue mutations is not part of
/// this trait; it comes from the `critical-section` implementation linked
/// into the firmware. `irq_disable`/`irq_enable` gate the timer interrupt
/// itself and are only used by the shutdown path.
pub trait Port: Sync {
    /// Read the free-running tick counter
    fn read_time(&self) -> Ticks;

    /// Convert microseconds to ticks
    fn ticks_from_us(&self, us: u32) -> u32;

    /// Disable the timer interrupt
    fn irq_disable(&self);

    /// Enable the timer interrupt
    fn irq_enable(&self);

    /// Arm the timer interrupt to fire at `wake`
    fn arm_timer(&self, wake: Ticks);

    /// Called once per heartbeat (every millisecond)
    fn timer_periodic(&self) {}

    /// Send the shutdown diagnostic to the host
    fn report(&self, report: &ShutdownReport);
}
