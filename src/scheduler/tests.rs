use super::*;

fn executor() -> ScheduledCommandExecutor<&'static str> {
    ScheduledCommandExecutor::from_config(&SyncConfig::default())
}

/// Drive the executor the way the session driver does: sleep to the coarse
/// wake, then poll once per frame.
fn run_until_fired<A>(exec: &mut ScheduledCommandExecutor<A>, start: f64) -> Option<Fired<A>> {
    let frame = 16.0;
    let mut now = start;
    for _ in 0..10_000 {
        if let Some(wake) = exec.next_wake() {
            now = now.max(wake);
        } else {
            now += frame;
        }
        if let Some(fired) = exec.poll(now) {
            return Some(fired);
        }
    }
    None
}

#[test]
fn test_far_deadline_starts_coarse() {
    let mut exec = executor();
    let outcome = exec.schedule(1300.0, "play", 1000.0);

    match outcome {
        ScheduleOutcome::Deferred { phase, .. } => {
            assert_eq!(phase, SchedulePhase::Coarse { wake_at: 1280.0 });
        }
        other => panic!("expected deferred, got {other:?}"),
    }
    assert_eq!(exec.next_wake(), Some(1280.0));
    assert!(!exec.needs_frames());
}

#[test]
fn test_near_deadline_starts_fine() {
    let mut exec = executor();
    let outcome = exec.schedule(1080.0, "seek", 1000.0);

    assert!(matches!(
        outcome,
        ScheduleOutcome::Deferred {
            phase: SchedulePhase::Fine,
            ..
        }
    ));
    assert_eq!(exec.next_wake(), None);
    assert!(exec.needs_frames());
}

#[test]
fn test_coarse_wake_fires_inside_pre_buffer() {
    let mut exec = executor();
    exec.schedule(1300.0, "play", 1000.0);

    assert!(exec.poll(1200.0).is_none());
    assert!(exec.poll(1279.0).is_none());
    assert_eq!(exec.next_wake(), Some(1280.0));

    // The coarse lead lands inside the pre-buffer, so the wake itself fires.
    let fired = exec.poll(1280.0).unwrap();
    assert_eq!(fired.action, "play");
    assert!((fired.deadline - 1300.0).abs() < f64::EPSILON);
    assert!(!exec.is_pending());
}

#[test]
fn test_fine_phase_waits_for_pre_buffer() {
    let mut exec = executor();
    exec.schedule(1080.0, "seek", 1000.0);

    assert!(exec.poll(1016.0).is_none());
    assert!(exec.poll(1048.0).is_none());
    assert_eq!(exec.poll(1050.0).map(|f| f.action), Some("seek"));
}

#[test]
fn test_fires_within_accuracy_window() {
    for delay in [35.0, 99.0, 101.0, 300.0, 1234.5, 5000.0] {
        let mut exec = executor();
        let start = 10_000.0;
        let deadline = start + delay;
        exec.schedule(deadline, "play", start);

        let fired = run_until_fired(&mut exec, start).unwrap();
        let error = (fired.fired_at - deadline).abs();
        assert!(
            error <= 50.0,
            "delay {delay}: fired at {} for deadline {deadline}",
            fired.fired_at
        );
    }
}

#[test]
fn test_past_deadline_is_late() {
    let mut exec = executor();
    match exec.schedule(900.0, "play", 1000.0) {
        ScheduleOutcome::Late { action, late_by_ms } => {
            assert_eq!(action, "play");
            assert!((late_by_ms - 100.0).abs() < f64::EPSILON);
        }
        other => panic!("expected late, got {other:?}"),
    }
    assert!(!exec.is_pending());
}

#[test]
fn test_deadline_inside_pre_buffer_is_due() {
    let mut exec = executor();
    let outcome = exec.schedule(1020.0, "pause", 1000.0);
    assert!(matches!(outcome, ScheduleOutcome::Due { action: "pause" }));
    assert!(!exec.is_pending());
}

#[test]
fn test_reschedule_cancels_previous() {
    let mut exec = executor();
    exec.schedule(2000.0, "play", 1000.0);
    let first = exec.pending_handle().unwrap();

    exec.schedule(1500.0, "pause", 1100.0);
    let second = exec.pending_handle().unwrap();

    assert_ne!(first, second);
    assert_eq!(exec.cancelled(), 1);
    assert_eq!(exec.pending_action(), Some(&"pause"));

    let fired = run_until_fired(&mut exec, 1100.0).unwrap();
    assert_eq!(fired.action, "pause");

    // The superseded play never fires.
    assert!(run_until_fired(&mut exec, 2100.0).is_none());
}

#[test]
fn test_cancel() {
    let mut exec = executor();
    assert!(!exec.cancel());

    exec.schedule(2000.0, "play", 1000.0);
    assert!(exec.cancel());
    assert!(!exec.is_pending());
    assert_eq!(exec.next_wake(), None);
    assert!(exec.poll(5000.0).is_none());
}

#[test]
fn test_custom_tuning() {
    let mut exec: ScheduledCommandExecutor<u8> = ScheduledCommandExecutor::new(
        Duration::from_millis(500),
        Duration::from_millis(50),
        Duration::from_millis(10),
    );

    // 400ms is under the raised coarse threshold.
    exec.schedule(400.0, 1, 0.0);
    assert!(exec.needs_frames());

    exec.schedule(1000.0, 2, 0.0);
    assert_eq!(exec.next_wake(), Some(950.0));
    assert!(exec.poll(950.0).is_none());
    assert_eq!(exec.poll(990.0).map(|f| f.action), Some(2));
}
