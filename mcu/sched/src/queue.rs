//! The timer queue: a singly-linked chain threaded through a fixed slot array.
//!
//! Slot 0 is the heartbeat, slot 1 the sentinel and slot 2 the deleted
//! marker; drivers get the rest. The chain starts at `head`, is ordered by
//! wake time (equal times in insertion order) and always ends at the
//! sentinel, whose wake time is half the tick range past the heartbeat's.
//! Every other entry therefore sorts before it and an insertion scan stops
//! without an end-of-list check.
//!
//! Nothing here takes a lock; the [`Scheduler`](crate::Scheduler) wraps the
//! queue in a critical section.

use mcu_core::{Flow, ShutdownReason, Ticks, TimerResult};

use crate::timer::TimerEvent;
use crate::MAX_TIMERS;

/// Timer callback.
///
/// Runs in timer-interrupt context and must not block. It may move its own
/// wake time through the [`TimerEvent`] and then ask to be rescheduled, or
/// report [`TimerResult::Done`] to leave the queue.
pub type TimerFn = fn(&mut TimerEvent<'_>) -> Flow<TimerResult>;

/// Handle to a timer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u8);

impl TimerId {
    pub(crate) const HEARTBEAT: Self = Self(0);
    pub(crate) const SENTINEL: Self = Self(1);
    pub(crate) const DELETED: Self = Self(2);
    const FIRST_USER: usize = 3;

    /// Slot index in the registry
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Check if this is one of the scheduler's own timers
    pub const fn is_builtin(self) -> bool {
        (self.0 as usize) < Self::FIRST_USER
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TimerId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "TimerId({})", self.0);
    }
}

/// One entry of a [`Scheduler::pending`](crate::Scheduler::pending) snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimer {
    pub id: TimerId,
    pub wake_time: Ticks,
}

#[derive(Clone, Copy)]
struct TimerSlot {
    wake_time: Ticks,
    func: TimerFn,
    next: TimerId,
    linked: bool,
}

impl TimerSlot {
    const VACANT: Self = Self {
        wake_time: Ticks::ZERO,
        func: vacant_event,
        next: TimerId::SENTINEL,
        linked: false,
    };
}

/// Why an add was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Violation {
    TooClose,
    AlreadyScheduled,
}

impl Violation {
    pub(crate) const fn reason(self) -> ShutdownReason {
        match self {
            Violation::TooClose => ShutdownReason::TIMER_TOO_CLOSE,
            Violation::AlreadyScheduled => ShutdownReason::TIMER_ALREADY_SCHEDULED,
        }
    }
}

pub(crate) struct TimerQueue {
    slots: [TimerSlot; MAX_TIMERS],
    allocated: usize,
    head: TimerId,
}

impl TimerQueue {
    pub(crate) const fn new() -> Self {
        let mut slots = [TimerSlot::VACANT; MAX_TIMERS];
        slots[TimerId::HEARTBEAT.index()] = TimerSlot {
            wake_time: Ticks::ZERO,
            func: crate::heartbeat::heartbeat_event,
            next: TimerId::SENTINEL,
            linked: true,
        };
        slots[TimerId::SENTINEL.index()] = TimerSlot {
            wake_time: Ticks(Ticks::HALF_RANGE),
            func: sentinel_event,
            next: TimerId::SENTINEL,
            linked: true,
        };
        slots[TimerId::DELETED.index()] = TimerSlot {
            wake_time: Ticks::ZERO,
            func: deleted_event,
            next: TimerId::HEARTBEAT,
            linked: false,
        };
        Self {
            slots,
            allocated: TimerId::FIRST_USER,
            head: TimerId::HEARTBEAT,
        }
    }

    pub(crate) fn allocate(&mut self, func: TimerFn) -> Option<TimerId> {
        if self.allocated >= MAX_TIMERS {
            return None;
        }
        let id = TimerId(self.allocated as u8);
        self.allocated += 1;
        self.slots[id.index()] = TimerSlot {
            func,
            ..TimerSlot::VACANT
        };
        Some(id)
    }

    fn slot(&self, id: TimerId) -> &TimerSlot {
        &self.slots[id.index()]
    }

    fn slot_mut(&mut self, id: TimerId) -> &mut TimerSlot {
        &mut self.slots[id.index()]
    }

    pub(crate) fn head(&self) -> TimerId {
        self.head
    }

    pub(crate) fn head_wake(&self) -> Ticks {
        self.slot(self.head).wake_time
    }

    /// The entry the next interrupt will run
    pub(crate) fn head_entry(&self) -> (TimerId, TimerFn, Ticks) {
        let slot = self.slot(self.head);
        (self.head, slot.func, slot.wake_time)
    }

    pub(crate) fn wake_time(&self, id: TimerId) -> Ticks {
        self.slot(id).wake_time
    }

    pub(crate) fn is_linked(&self, id: TimerId) -> bool {
        self.slot(id).linked
    }

    /// Link `id` after the first entry not due before `wake`.
    ///
    /// The scan starts after the head, so the head never moves here.
    fn insert(&mut self, id: TimerId, wake: Ticks) {
        let mut prev = self.head;
        loop {
            let pos = self.slot(prev).next;
            // The sentinel ends every scan, even for a wake time outside the
            // comparable window
            if pos == TimerId::SENTINEL || wake.is_before(self.slot(pos).wake_time) {
                let slot = self.slot_mut(id);
                slot.wake_time = wake;
                slot.next = pos;
                slot.linked = true;
                self.slot_mut(prev).next = id;
                return;
            }
            prev = pos;
        }
    }

    /// Schedule `id` at `wake`; refuses without touching the chain if `wake`
    /// is before the head or the timer is already queued.
    pub(crate) fn add(&mut self, id: TimerId, wake: Ticks) -> Result<(), Violation> {
        if wake.is_before(self.head_wake()) {
            return Err(Violation::TooClose);
        }
        if self.slot(id).linked {
            return Err(Violation::AlreadyScheduled);
        }
        self.insert(id, wake);
        Ok(())
    }

    /// Unlink `id` if it is queued. Returns false if there was nothing to
    /// unlink.
    ///
    /// The head is never unlinked in place: the deleted marker takes over its
    /// wake time and successor, and the next dispatch splices the marker out.
    pub(crate) fn remove(&mut self, id: TimerId) -> bool {
        if id.is_builtin() || !self.slot(id).linked {
            return false;
        }
        if self.head == id {
            let removed = *self.slot(id);
            let marker = self.slot_mut(TimerId::DELETED);
            marker.wake_time = removed.wake_time;
            marker.next = removed.next;
            self.head = TimerId::DELETED;
        } else {
            let mut pos = self.head;
            while pos != TimerId::SENTINEL {
                let next = self.slot(pos).next;
                if next == id {
                    self.slot_mut(pos).next = self.slot(id).next;
                    break;
                }
                pos = next;
            }
        }
        self.slot_mut(id).linked = false;
        true
    }

    /// Fix up the chain after the head's callback returned `result` with its
    /// wake time now `updated`. Returns the wake time to arm next.
    pub(crate) fn complete(&mut self, id: TimerId, result: TimerResult, updated: Ticks) -> Ticks {
        if self.head != id {
            // The callback removed its own timer; the deleted marker now
            // heads the queue and carries the old successor
            return self.head_wake();
        }
        self.slot_mut(id).wake_time = updated;
        let next = self.slot(id).next;
        match result {
            TimerResult::Done => {
                self.head = next;
                self.slot_mut(id).linked = false;
            }
            TimerResult::Reschedule if !updated.is_before(self.slot(next).wake_time) => {
                self.head = next;
                self.insert(id, updated);
            }
            TimerResult::Reschedule => {}
        }
        self.head_wake()
    }

    /// Keep the sentinel half the tick range past the heartbeat
    pub(crate) fn follow_heartbeat(&mut self, heartbeat_wake: Ticks) {
        self.slot_mut(TimerId::SENTINEL).wake_time = heartbeat_wake.wrapping_add(Ticks::HALF_RANGE);
    }

    /// Reset to just the heartbeat and sentinel, heartbeat due at `first`
    pub(crate) fn restart(&mut self, first: Ticks) {
        self.unlink_user_timers();
        let heartbeat = self.slot_mut(TimerId::HEARTBEAT);
        heartbeat.wake_time = first;
        heartbeat.next = TimerId::SENTINEL;
        self.follow_heartbeat(first);
        self.head = TimerId::HEARTBEAT;
    }

    /// Drop every driver timer on emergency stop.
    ///
    /// The deleted marker becomes the head so an interrupt that is already
    /// due still finds a valid entry; it hands over to the heartbeat on the
    /// next dispatch.
    pub(crate) fn discard_user_timers(&mut self) {
        self.unlink_user_timers();
        let heartbeat_wake = self.slot(TimerId::HEARTBEAT).wake_time;
        let marker = self.slot_mut(TimerId::DELETED);
        marker.wake_time = heartbeat_wake;
        marker.next = TimerId::HEARTBEAT;
        self.slot_mut(TimerId::HEARTBEAT).next = TimerId::SENTINEL;
        self.head = TimerId::DELETED;
    }

    fn unlink_user_timers(&mut self) {
        for slot in &mut self.slots[TimerId::FIRST_USER..self.allocated] {
            slot.linked = false;
        }
    }

    /// Walk the chain from the head through the sentinel
    pub(crate) fn snapshot(&self) -> heapless::Vec<PendingTimer, MAX_TIMERS> {
        let mut out = heapless::Vec::new();
        let mut pos = self.head;
        loop {
            let entry = PendingTimer {
                id: pos,
                wake_time: self.slot(pos).wake_time,
            };
            if out.push(entry).is_err() || pos == TimerId::SENTINEL {
                break;
            }
            pos = self.slot(pos).next;
        }
        out
    }
}

// The sentinel must never reach the head of the queue
fn sentinel_event(event: &mut TimerEvent<'_>) -> Flow<TimerResult> {
    Err(event
        .scheduler()
        .trigger_shutdown(ShutdownReason::SENTINEL_FIRED))
}

fn deleted_event(_event: &mut TimerEvent<'_>) -> Flow<TimerResult> {
    Ok(TimerResult::Done)
}

fn vacant_event(_event: &mut TimerEvent<'_>) -> Flow<TimerResult> {
    Ok(TimerResult::Done)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_event: &mut TimerEvent<'_>) -> Flow<TimerResult> {
        Ok(TimerResult::Done)
    }

    fn started(first: u32) -> TimerQueue {
        let mut queue = TimerQueue::new();
        queue.restart(Ticks(first));
        queue
    }

    fn order(queue: &TimerQueue) -> std::vec::Vec<TimerId> {
        queue.snapshot().iter().map(|p| p.id).collect()
    }

    #[test]
    fn test_new_queue_is_heartbeat_then_sentinel() {
        let queue = started(1000);
        assert_eq!(order(&queue), [TimerId::HEARTBEAT, TimerId::SENTINEL]);
        assert_eq!(queue.wake_time(TimerId::SENTINEL), Ticks(1000 + Ticks::HALF_RANGE));
    }

    #[test]
    fn test_insert_keeps_order_and_fifo_ties() {
        let mut queue = started(1000);
        let a = queue.allocate(noop).unwrap();
        let b = queue.allocate(noop).unwrap();
        let c = queue.allocate(noop).unwrap();

        queue.add(a, Ticks(5000)).unwrap();
        queue.add(b, Ticks(3000)).unwrap();
        queue.add(c, Ticks(5000)).unwrap();

        assert_eq!(order(&queue), [TimerId::HEARTBEAT, b, a, c, TimerId::SENTINEL]);
    }

    #[test]
    fn test_add_equal_to_head_goes_after_it() {
        let mut queue = started(1000);
        let a = queue.allocate(noop).unwrap();
        queue.add(a, Ticks(1000)).unwrap();
        assert_eq!(order(&queue), [TimerId::HEARTBEAT, a, TimerId::SENTINEL]);
    }

    #[test]
    fn test_add_before_head_is_refused_untouched() {
        let mut queue = started(1000);
        let a = queue.allocate(noop).unwrap();
        assert_eq!(queue.add(a, Ticks(999)), Err(Violation::TooClose));
        assert_eq!(order(&queue), [TimerId::HEARTBEAT, TimerId::SENTINEL]);
        assert!(!queue.is_linked(a));
    }

    #[test]
    fn test_double_add_is_refused() {
        let mut queue = started(1000);
        let a = queue.allocate(noop).unwrap();
        queue.add(a, Ticks(2000)).unwrap();
        assert_eq!(queue.add(a, Ticks(3000)), Err(Violation::AlreadyScheduled));
        assert_eq!(queue.wake_time(a), Ticks(2000));
    }

    #[test]
    fn test_remove_middle_and_absent() {
        let mut queue = started(1000);
        let a = queue.allocate(noop).unwrap();
        let b = queue.allocate(noop).unwrap();
        queue.add(a, Ticks(2000)).unwrap();
        queue.add(b, Ticks(3000)).unwrap();

        assert!(queue.remove(a));
        assert_eq!(order(&queue), [TimerId::HEARTBEAT, b, TimerId::SENTINEL]);

        // Second removal is a no-op
        assert!(!queue.remove(a));
        assert_eq!(order(&queue), [TimerId::HEARTBEAT, b, TimerId::SENTINEL]);
    }

    #[test]
    fn test_remove_head_swaps_in_marker() {
        let mut queue = started(1000);
        let a = queue.allocate(noop).unwrap();
        queue.add(a, Ticks(2000)).unwrap();
        // Dispatch the heartbeat far enough that `a` becomes the head
        let next = queue.complete(TimerId::HEARTBEAT, TimerResult::Reschedule, Ticks(2500));
        assert_eq!(next, Ticks(2000));
        assert_eq!(queue.head(), a);

        assert!(queue.remove(a));
        assert_eq!(queue.head(), TimerId::DELETED);
        assert_eq!(queue.head_wake(), Ticks(2000));
        assert_eq!(
            order(&queue),
            [TimerId::DELETED, TimerId::HEARTBEAT, TimerId::SENTINEL]
        );

        // The marker reports done and hands over to the real successor
        let next = queue.complete(TimerId::DELETED, TimerResult::Done, Ticks(2000));
        assert_eq!(next, Ticks(2500));
        assert_eq!(order(&queue), [TimerId::HEARTBEAT, TimerId::SENTINEL]);
    }

    #[test]
    fn test_complete_fast_path_keeps_head() {
        let mut queue = started(1000);
        let a = queue.allocate(noop).unwrap();
        queue.add(a, Ticks(5000)).unwrap();
        let next = queue.complete(TimerId::HEARTBEAT, TimerResult::Reschedule, Ticks(2000));
        assert_eq!(next, Ticks(2000));
        assert_eq!(queue.head(), TimerId::HEARTBEAT);
    }

    #[test]
    fn test_complete_reschedule_equal_moves_behind() {
        let mut queue = started(1000);
        let a = queue.allocate(noop).unwrap();
        queue.add(a, Ticks(2000)).unwrap();
        let next = queue.complete(TimerId::HEARTBEAT, TimerResult::Reschedule, Ticks(2000));
        assert_eq!(next, Ticks(2000));
        assert_eq!(order(&queue), [a, TimerId::HEARTBEAT, TimerId::SENTINEL]);
    }

    #[test]
    fn test_discard_user_timers() {
        let mut queue = started(1000);
        let a = queue.allocate(noop).unwrap();
        let b = queue.allocate(noop).unwrap();
        queue.add(a, Ticks(2000)).unwrap();
        queue.add(b, Ticks(3000)).unwrap();

        queue.discard_user_timers();
        assert_eq!(
            order(&queue),
            [TimerId::DELETED, TimerId::HEARTBEAT, TimerId::SENTINEL]
        );
        assert_eq!(queue.head_wake(), Ticks(1000));
        assert!(!queue.is_linked(a));
        assert!(!queue.is_linked(b));
    }

    #[test]
    fn test_allocate_until_full() {
        let mut queue = TimerQueue::new();
        for _ in TimerId::FIRST_USER..MAX_TIMERS {
            assert!(queue.allocate(noop).is_some());
        }
        assert!(queue.allocate(noop).is_none());
    }
}
