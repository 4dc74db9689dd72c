use mcu_core::{
    millis_is_before, McuError, ShutdownReason, ShutdownReport, ShutdownState, Ticks, TimerResult,
};

#[test]
fn test_report_renders_clock_and_reason_code() {
    let report = ShutdownReport {
        clock: Ticks(u32::MAX),
        reason: ShutdownReason::user(0xFEFF),
    };
    let line = report.to_line();
    assert_eq!(line.as_str(), "shutdown clock=4294967295 static_string_id=65535");
    assert_eq!(report.to_string(), line.as_str());
}

#[test]
fn test_reason_display() {
    assert_eq!(
        ShutdownReason::TIMER_TOO_CLOSE.to_string(),
        "Timer too close (1)"
    );
    assert_eq!(ShutdownReason::user(5).to_string(), "reason 261");
    assert_eq!(ShutdownReason::user(5).code(), 0x105);
}

#[test]
fn test_ordering_is_relative_to_each_other() {
    // Every wake time less than half the range ahead sorts after `now`
    let now = Ticks(0xFFFF_FF00);
    for ahead in [1u32, 0x100, 0x7FFF_FFFF] {
        let later = now.wrapping_add(ahead);
        assert!(now.is_before(later));
        assert!(!later.is_before(now));
    }
    assert!(millis_is_before(u16::MAX, 0));
}

#[test]
fn test_defaults() {
    assert_eq!(ShutdownState::default(), ShutdownState::Normal);
    assert_eq!(ShutdownReason::default(), ShutdownReason::NONE);
    assert!(TimerResult::Reschedule.is_reschedule());
    assert!(!TimerResult::Done.is_reschedule());
}

#[test]
fn test_error_display() {
    assert_eq!(
        McuError::TimerSlotsExhausted.to_string(),
        "No free timer slots"
    );
}
