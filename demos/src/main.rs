//! Blinky on the simulated host port
//!
//! A timer toggles a pretend LED, a background task logs the coarse clock
//! once a second, and a shutdown handler switches the LED off. Ctrl-C (or
//! `--fault-at-ms`) shuts the machine down; the demo then prints the report
//! and exits.

use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use clap::Parser;
use mcu_posix::SimPort;
use mcu_run::MainLoop;
use mcu_sched::{
    Flow, Port, SchedConfig, Scheduler, ShutdownReason, Ticks, TimerEvent, TimerId, TimerResult,
};

const USER_ABORT: ShutdownReason = ShutdownReason::user(0);

static PORT: SimPort = SimPort::new(1);
static SCHED: Scheduler = Scheduler::with_config(
    &PORT,
    SchedConfig::builder()
        .name("blinky")
        .heartbeat_us(1000)
        .idle_callback(idle)
        .build(),
);

static BLINK: OnceLock<TimerId> = OnceLock::new();
static BLINK_TICKS: AtomicU32 = AtomicU32::new(0);
static LED: AtomicBool = AtomicBool::new(false);
static TOGGLES: AtomicU32 = AtomicU32::new(0);
static FAULT_AT_MS: AtomicU16 = AtomicU16::new(0);
static ABORT: AtomicBool = AtomicBool::new(false);

#[derive(Parser, Debug)]
#[command(author, version, about = "Blink an LED on the simulated mcu scheduler")]
struct Opts {
    /// LED toggle interval in milliseconds
    #[arg(long, default_value_t = 250)]
    blink_ms: u32,

    /// Ticker rate of the simulated timer interrupt in Hz
    #[arg(long, default_value_t = 1000)]
    tick_hz: u32,

    /// Schedule a timer in the past at this many milliseconds (0 = never)
    #[arg(long, default_value_t = 0)]
    fault_at_ms: u16,

    /// Stop after this many milliseconds without shutting down (0 = run until Ctrl-C)
    #[arg(long, default_value_t = 0)]
    run_ms: u64,
}

fn idle() {
    thread::sleep(Duration::from_micros(500));
}

fn blink_event(event: &mut TimerEvent<'_>) -> Flow<TimerResult> {
    let on = !LED.fetch_xor(true, Ordering::Relaxed);
    TOGGLES.fetch_add(1, Ordering::Relaxed);
    log::trace!("led {}", if on { "on" } else { "off" });
    event.advance(BLINK_TICKS.load(Ordering::Relaxed));
    Ok(TimerResult::Reschedule)
}

fn start_blink(sched: &Scheduler) -> Flow {
    let Some(&id) = BLINK.get() else {
        return Ok(());
    };
    let wake = sched.head_wake().wrapping_add(BLINK_TICKS.load(Ordering::Relaxed));
    sched.add_timer(id, wake)
}

fn status_task(sched: &Scheduler) -> Flow {
    static NEXT: AtomicU16 = AtomicU16::new(1000);
    let mut next = NEXT.load(Ordering::Relaxed);
    if sched.check_periodic(1000, &mut next) {
        log::info!(
            "millis={} toggles={} led={}",
            sched.millis(),
            TOGGLES.load(Ordering::Relaxed),
            LED.load(Ordering::Relaxed)
        );
    }
    NEXT.store(next, Ordering::Relaxed);
    Ok(())
}

fn fault_task(sched: &Scheduler) -> Flow {
    let at = FAULT_AT_MS.load(Ordering::Relaxed);
    if at == 0 || sched.is_shutdown() || sched.millis() < at {
        return Ok(());
    }
    let Some(&id) = BLINK.get() else {
        return Ok(());
    };
    FAULT_AT_MS.store(0, Ordering::Relaxed);
    log::warn!("injecting a timer in the past");
    sched.remove_timer(id);
    sched.add_timer(id, Ticks(sched.head_wake().raw().wrapping_sub(1)))
}

fn abort_task(sched: &Scheduler) -> Flow {
    if ABORT.swap(false, Ordering::Relaxed) {
        sched.try_shutdown(USER_ABORT)?;
    }
    Ok(())
}

fn led_off(_sched: &Scheduler) -> Flow {
    LED.store(false, Ordering::Relaxed);
    log::info!("led forced off");
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let opts = Opts::parse();

    BLINK_TICKS.store(
        PORT.ticks_from_us(opts.blink_ms.saturating_mul(1000)),
        Ordering::Relaxed,
    );
    FAULT_AT_MS.store(opts.fault_at_ms, Ordering::Relaxed);
    ctrlc::set_handler(|| ABORT.store(true, Ordering::Relaxed))?;

    let blink = SCHED.register_timer(blink_event)?;
    let _ = BLINK.set(blink);
    SCHED.register_init(start_blink)?;
    SCHED.register_task(status_task)?;
    SCHED.register_task(fault_task)?;
    SCHED.register_task(abort_task)?;
    SCHED.register_shutdown(led_off)?;

    let main_loop = MainLoop::new(&SCHED);
    main_loop.start();
    mcu_posix::start_ticker(&SCHED, &PORT, opts.tick_hz)?;

    let deadline = (opts.run_ms > 0).then(|| Duration::from_millis(opts.run_ms));
    let started = std::time::Instant::now();
    while PORT.reports().is_empty() {
        if deadline.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
        main_loop.run_pass();
    }

    mcu_posix::stop_ticker()?;
    for report in PORT.take_reports() {
        let why = report.reason.description().unwrap_or("user shutdown");
        println!("{} ({})", report, why);
    }
    Ok(())
}
