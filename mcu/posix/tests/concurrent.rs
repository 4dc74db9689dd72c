//! Task-context queue changes racing a thread that plays the timer interrupt

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;

use mcu_posix::SimPort;
use mcu_sched::{Flow, Scheduler, ShutdownState, TimerEvent, TimerResult};

static FIRED: AtomicU32 = AtomicU32::new(0);

fn count(event: &mut TimerEvent<'_>) -> Flow<TimerResult> {
    FIRED.fetch_add(1, Ordering::Relaxed);
    event.advance(250);
    Ok(TimerResult::Reschedule)
}

#[test]
fn test_remove_and_add_while_interrupts_fire() {
    let port: &'static SimPort = Box::leak(Box::new(SimPort::new(1)));
    let sched = Scheduler::new(port);
    sched.start();
    let ids: Vec<_> = (0..6).map(|_| sched.register_timer(count).unwrap()).collect();
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            while !done.load(Ordering::Relaxed) {
                port.advance(&sched, 97);
            }
        });

        for round in 0..5_000u32 {
            let id = ids[round as usize % ids.len()];
            if sched.is_scheduled(id) {
                sched.remove_timer(id);
            } else {
                // Read the head and add in one critical section so the
                // interrupt cannot move the head in between
                critical_section::with(|_| {
                    let wake = sched.head_wake().wrapping_add(round % 700);
                    sched.add_timer(id, wake)
                })
                .unwrap();
            }
        }
        while sched.millis() < 10 {
            thread::yield_now();
        }
        done.store(true, Ordering::Relaxed);
    });

    assert_eq!(sched.shutdown_state(), ShutdownState::Normal);
    assert!(sched.millis() > 0);
    assert!(FIRED.load(Ordering::Relaxed) > 0);

    for id in &ids {
        sched.remove_timer(*id);
    }
    let pending = sched.pending();
    assert!(pending.iter().all(|p| p.id.is_builtin()));
}
