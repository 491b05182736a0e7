//! End-to-end tests for the control engine, using recording fakes in place of
//! the OS input layer.

use cadence_clicker::engine::{
    ClickKind, ControlError, ControlEvent, Controller, ControllerOptions, FailsafeMonitor,
    FailsafeRegion, IntervalParts, Notice, PanicCause, Phase, RequestSource, RunEnd, RunId,
    SessionRequest,
};
use cadence_clicker::input::{ClickSink, CursorSource, InjectionError, MouseButton, Position};
use cadence_clicker::stats::create_shared_log;
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Records every primitive click and can simulate slow or failing injection.
#[derive(Default)]
struct RecordingSink {
    clicks: Mutex<Vec<(MouseButton, Option<Position>, Instant)>>,
    press_time: Duration,
    fail_after: Option<usize>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingSink {
    fn slow(press_time: Duration) -> Self {
        Self {
            press_time,
            ..Self::default()
        }
    }

    fn count(&self) -> usize {
        self.clicks.lock().len()
    }
}

impl ClickSink for RecordingSink {
    fn click(&self, button: MouseButton, at: Option<Position>) -> Result<(), InjectionError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.press_time.is_zero() {
            thread::sleep(self.press_time);
        }
        let result = {
            let mut clicks = self.clicks.lock();
            if self.fail_after.is_some_and(|n| clicks.len() >= n) {
                Err(InjectionError::Rejected("accessibility revoked".to_string()))
            } else {
                clicks.push((button, at, Instant::now()));
                Ok(())
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Cursor parked wherever the test puts it.
struct FixedCursor(Mutex<Position>);

impl CursorSource for FixedCursor {
    fn position(&self) -> Result<Position, InjectionError> {
        Ok(*self.0.lock())
    }
}

fn wait_for_phase(controller: &Controller, phase: Phase, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while controller.phase() != phase {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {phase}, still {}",
            controller.phase()
        );
        thread::sleep(Duration::from_millis(2));
    }
}

fn next_run_end(events: &Receiver<ControlEvent>) -> (RunId, RunEnd, u64) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let timeout = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(timeout) {
            Ok(ControlEvent::RunEnded { run, end, clicks }) => return (run, end, clicks),
            Ok(_) => continue,
            Err(e) => panic!("no run ending received: {e}"),
        }
    }
}

#[test]
fn test_limited_run_clicks_exactly_limit() {
    let sink = Arc::new(RecordingSink::default());
    let controller = Controller::new(sink.clone());
    let events = controller.subscribe();

    let request = SessionRequest::new(IntervalParts::from_millis(100)).click_limit(Some(5));
    controller.start_request(&request).unwrap();

    let (run, end, clicks) = next_run_end(&events);
    assert_eq!(run, RunId(1));
    assert_eq!(end, RunEnd::Completed);
    assert_eq!(clicks, 5);

    wait_for_phase(&controller, Phase::Idle, Duration::from_secs(2));
    assert_eq!(controller.clicks_issued(), 5);
    let clicks = sink.clicks.lock();
    assert_eq!(clicks.len(), 5);
    assert!(clicks
        .iter()
        .all(|(button, at, _)| *button == MouseButton::Left && at.is_none()));
    drop(clicks);

    controller.shutdown();
}

#[test]
fn test_double_click_counts_once_per_pair() {
    let sink = Arc::new(RecordingSink::default());
    let controller = Controller::with_options(
        sink.clone(),
        ControllerOptions {
            double_click_gap: Duration::from_millis(5),
            activity: None,
        },
    );
    let events = controller.subscribe();

    let request = SessionRequest::new(IntervalParts::from_millis(20))
        .kind(ClickKind::Double)
        .target(Some(Position::new(100, 200)))
        .click_limit(Some(4));
    controller.start_request(&request).unwrap();

    let (_, end, clicks) = next_run_end(&events);
    assert_eq!(end, RunEnd::Completed);
    assert_eq!(clicks, 4);
    assert_eq!(sink.count(), 8);
    assert!(sink
        .clicks
        .lock()
        .iter()
        .all(|(_, at, _)| *at == Some(Position::new(100, 200))));

    controller.shutdown();
}

#[test]
fn test_click_progress_is_monotonic_and_bounded() {
    let sink = Arc::new(RecordingSink::default());
    let controller = Controller::new(sink);
    let events = controller.subscribe();

    let request = SessionRequest::new(IntervalParts::from_millis(5)).click_limit(Some(10));
    controller.start_request(&request).unwrap();

    let mut progress = Vec::new();
    loop {
        match events.recv_timeout(Duration::from_secs(5)).unwrap() {
            ControlEvent::ClickIssued {
                total, remaining, ..
            } => progress.push((total, remaining)),
            ControlEvent::RunEnded { .. } => break,
            _ => {}
        }
    }

    assert_eq!(progress.len(), 10);
    assert!(progress.windows(2).all(|w| w[0].0 < w[1].0));
    assert!(progress
        .iter()
        .all(|(total, remaining)| *remaining == Some(10 - total)));
    assert_eq!(controller.clicks_issued(), 10);

    controller.shutdown();
}

#[test]
fn test_panic_mid_run_stops_all_clicks() {
    let sink = Arc::new(RecordingSink::default());
    let controller = Controller::new(sink.clone());
    let events = controller.subscribe();

    let request = SessionRequest::new(IntervalParts::new(0, 1, 0));
    controller.start_request(&request).unwrap();

    thread::sleep(Duration::from_millis(2500));
    controller.panic(PanicCause::Ui).unwrap();
    let at_panic = sink.count();

    wait_for_phase(&controller, Phase::PanicStopped, Duration::from_secs(1));
    let (_, end, clicks) = next_run_end(&events);
    assert_eq!(end, RunEnd::Panicked(PanicCause::Ui));
    assert!((2..=3).contains(&clicks), "got {clicks} clicks");

    thread::sleep(Duration::from_millis(1500));
    assert_eq!(sink.count(), at_panic);
    assert_eq!(controller.phase(), Phase::PanicStopped);

    controller.shutdown();
}

#[test]
fn test_panic_during_countdown_never_clicks() {
    let sink = Arc::new(RecordingSink::default());
    let controller = Controller::new(sink.clone());
    let events = controller.subscribe();

    let request = SessionRequest::new(IntervalParts::from_millis(10))
        .start_delay(Duration::from_secs(3));
    controller.start_request(&request).unwrap();
    assert_eq!(controller.phase(), Phase::Counting);

    match events.recv_timeout(Duration::from_secs(2)).unwrap() {
        ControlEvent::PhaseChanged { to, .. } => assert_eq!(to, Phase::Counting),
        other => panic!("unexpected first event {other:?}"),
    }
    match events.recv_timeout(Duration::from_secs(2)).unwrap() {
        ControlEvent::Countdown { remaining_secs, .. } => assert_eq!(remaining_secs, 3),
        other => panic!("expected countdown, got {other:?}"),
    }

    controller.handle_hotkey(cadence_clicker::input::HotkeyEvent::Panic).unwrap();
    let (_, end, clicks) = next_run_end(&events);
    assert_eq!(end, RunEnd::Panicked(PanicCause::Hotkey));
    assert_eq!(clicks, 0);
    assert_eq!(controller.phase(), Phase::PanicStopped);
    assert_eq!(sink.count(), 0);

    controller.shutdown();
}

#[test]
fn test_zero_interval_rejected_without_state_change() {
    let sink = Arc::new(RecordingSink::default());
    let controller = Controller::new(sink.clone());

    let request = SessionRequest::new(IntervalParts::new(0, 0, 0));
    let err = controller.start_request(&request).unwrap_err();
    assert!(matches!(err, ControlError::Invalid(_)));

    thread::sleep(Duration::from_millis(50));
    assert_eq!(controller.phase(), Phase::Idle);
    assert_eq!(controller.snapshot().run, None);
    assert_eq!(sink.count(), 0);

    controller.shutdown();
}

#[test]
fn test_rapid_toggles_never_run_two_schedulers() {
    let sink = Arc::new(RecordingSink::slow(Duration::from_millis(3)));
    let controller = Controller::new(sink.clone());

    let config = SessionRequest::new(IntervalParts::from_millis(1))
        .validate()
        .unwrap();
    controller.stage(config).unwrap();

    for _ in 0..20 {
        controller.toggle(RequestSource::Hotkey).unwrap();
        controller.toggle(RequestSource::Ui).unwrap();
        thread::sleep(Duration::from_millis(5));
    }

    controller.stop(RequestSource::Ui).unwrap();
    wait_for_phase(&controller, Phase::Idle, Duration::from_secs(2));
    controller.shutdown();

    assert_eq!(sink.max_in_flight.load(Ordering::SeqCst), 1);
}

#[test]
fn test_start_while_stopping_is_busy() {
    let sink = Arc::new(RecordingSink::slow(Duration::from_millis(300)));
    let controller = Controller::new(sink.clone());

    let request = SessionRequest::new(IntervalParts::from_millis(10));
    controller.start_request(&request).unwrap();

    // Wait until the first press is in flight
    let deadline = Instant::now() + Duration::from_secs(2);
    while sink.in_flight.load(Ordering::SeqCst) == 0 {
        assert!(Instant::now() < deadline);
        thread::sleep(Duration::from_millis(1));
    }

    controller.stop(RequestSource::Ui).unwrap();
    let err = controller.start_request(&request).unwrap_err();
    assert_eq!(err, ControlError::Busy(Phase::Stopping));

    // A second toggle while stopping is ignored
    controller.toggle(RequestSource::Hotkey).unwrap();
    wait_for_phase(&controller, Phase::Idle, Duration::from_secs(2));
    assert_eq!(controller.snapshot().run, Some(RunId(1)));
    assert_eq!(sink.count(), 1);

    controller.shutdown();
}

#[test]
fn test_deadline_schedule_does_not_drift() {
    // Each press costs 5ms; a "sleep interval after click" loop would take 50 * 25ms
    let sink = Arc::new(RecordingSink::slow(Duration::from_millis(5)));
    let controller = Controller::new(sink.clone());
    let events = controller.subscribe();

    let request = SessionRequest::new(IntervalParts::from_millis(20)).click_limit(Some(50));
    let start = Instant::now();
    controller.start_request(&request).unwrap();
    let (_, end, _) = next_run_end(&events);
    let elapsed = start.elapsed();

    assert_eq!(end, RunEnd::Completed);
    // First click at t=0, last at 49 intervals
    assert!(elapsed >= Duration::from_millis(980), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1200), "{elapsed:?}");

    controller.shutdown();
}

#[test]
fn test_failsafe_corner_panics_run() {
    let sink = Arc::new(RecordingSink::default());
    let controller = Controller::new(sink.clone());
    let events = controller.subscribe();
    let cursor = Arc::new(FixedCursor(Mutex::new(Position::new(800, 600))));

    let monitor = FailsafeMonitor::spawn(
        controller.clone(),
        cursor.clone(),
        FailsafeRegion::default(),
        Duration::from_millis(10),
    );

    let request = SessionRequest::new(IntervalParts::from_millis(50));
    controller.start_request(&request).unwrap();
    thread::sleep(Duration::from_millis(120));
    assert_eq!(controller.phase(), Phase::Running);

    *cursor.0.lock() = Position::new(1, 0);
    let (_, end, _) = next_run_end(&events);
    assert_eq!(end, RunEnd::Panicked(PanicCause::Failsafe));
    assert_eq!(controller.phase(), Phase::PanicStopped);

    // Cursor still parked: a fresh run trips again right away
    let run = controller.start_request(&request).unwrap();
    assert_eq!(run, RunId(2));
    let (ended, end, _) = next_run_end(&events);
    assert_eq!(ended, RunId(2));
    assert_eq!(end, RunEnd::Panicked(PanicCause::Failsafe));

    monitor.stop();
    controller.shutdown();
}

#[test]
fn test_injection_failure_returns_to_idle_with_notice() {
    let sink = Arc::new(RecordingSink {
        fail_after: Some(3),
        ..RecordingSink::default()
    });
    let activity = create_shared_log();
    let controller = Controller::with_options(
        sink.clone(),
        ControllerOptions {
            activity: Some(activity.clone()),
            ..ControllerOptions::default()
        },
    );
    let events = controller.subscribe();

    controller
        .start_request(&SessionRequest::new(IntervalParts::from_millis(5)))
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut notices = Vec::new();
    let mut ended = None;
    while ended.is_none() {
        let timeout = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(timeout).unwrap() {
            ControlEvent::Notice(notice) => notices.push(notice),
            ControlEvent::RunEnded { end, clicks, .. } => ended = Some((end, clicks)),
            _ => {}
        }
    }

    let (end, clicks) = ended.unwrap();
    assert!(matches!(end, RunEnd::Failed(InjectionError::Rejected(_))));
    assert_eq!(clicks, 3);
    assert_eq!(notices.len(), 1);
    assert!(matches!(notices[0], Notice::InjectionFailed(_)));
    assert_eq!(controller.phase(), Phase::Idle);

    let stats = activity.stats();
    assert_eq!(stats.runs_started, 1);
    assert_eq!(stats.injection_failures, 1);
    assert_eq!(stats.clicks_issued, 3);

    controller.shutdown();
}

#[test]
fn test_explicit_start_from_panic_stopped() {
    let sink = Arc::new(RecordingSink::default());
    let controller = Controller::new(sink.clone());

    let slow = SessionRequest::new(IntervalParts::new(0, 5, 0));
    controller.start_request(&slow).unwrap();
    controller.panic(PanicCause::Ui).unwrap();
    wait_for_phase(&controller, Phase::PanicStopped, Duration::from_secs(1));

    let run = controller
        .start_request(&SessionRequest::new(IntervalParts::from_millis(5)).click_limit(Some(3)))
        .unwrap();
    assert_eq!(run, RunId(2));

    wait_for_phase(&controller, Phase::Idle, Duration::from_secs(2));
    let state = controller.snapshot();
    assert_eq!(state.run, Some(RunId(2)));
    assert_eq!(state.clicks_issued, 3);
    assert_eq!(state.remaining(), Some(0));

    controller.shutdown();
}

#[test]
fn test_panic_beats_completion_of_last_click() {
    let sink = Arc::new(RecordingSink::slow(Duration::from_millis(300)));
    let activity = create_shared_log();
    let controller = Controller::with_options(
        sink.clone(),
        ControllerOptions {
            activity: Some(activity.clone()),
            ..ControllerOptions::default()
        },
    );
    let events = controller.subscribe();

    let request = SessionRequest::new(IntervalParts::from_millis(10)).click_limit(Some(1));
    controller.start_request(&request).unwrap();

    // Panic while the only press of the run is still inside the sink
    let deadline = Instant::now() + Duration::from_secs(2);
    while sink.in_flight.load(Ordering::SeqCst) == 0 {
        assert!(Instant::now() < deadline, "press never started");
        thread::sleep(Duration::from_millis(1));
    }
    controller.panic(PanicCause::Hotkey).unwrap();

    let (_, end, clicks) = next_run_end(&events);
    assert_eq!(end, RunEnd::Panicked(PanicCause::Hotkey));
    assert_eq!(clicks, 1);
    wait_for_phase(&controller, Phase::PanicStopped, Duration::from_secs(1));

    thread::sleep(Duration::from_millis(50));
    assert_eq!(controller.phase(), Phase::PanicStopped);
    assert_eq!(sink.count(), 1);
    let stats = activity.stats();
    assert_eq!(stats.panic_stops, 1);
    assert_eq!(stats.runs_completed, 0);

    controller.shutdown();
}

#[test]
fn test_failsafe_trips_during_countdown() {
    let sink = Arc::new(RecordingSink::default());
    let controller = Controller::new(sink.clone());
    let events = controller.subscribe();
    let cursor = Arc::new(FixedCursor(Mutex::new(Position::new(0, 0))));

    let monitor = FailsafeMonitor::spawn(
        controller.clone(),
        cursor,
        FailsafeRegion::default(),
        Duration::from_millis(10),
    );

    let request = SessionRequest::new(IntervalParts::from_millis(10))
        .start_delay(Duration::from_secs(3));
    controller.start_request(&request).unwrap();

    let (_, end, clicks) = next_run_end(&events);
    assert_eq!(end, RunEnd::Panicked(PanicCause::Failsafe));
    assert_eq!(clicks, 0);
    assert_eq!(controller.phase(), Phase::PanicStopped);
    assert_eq!(sink.count(), 0);

    monitor.stop();
    controller.shutdown();
}

#[test]
fn test_failsafe_ignores_corner_while_idle() {
    let sink = Arc::new(RecordingSink::default());
    let controller = Controller::new(sink.clone());
    let events = controller.subscribe();
    let cursor = Arc::new(FixedCursor(Mutex::new(Position::new(0, 0))));

    let monitor = FailsafeMonitor::spawn(
        controller.clone(),
        cursor,
        FailsafeRegion::default(),
        Duration::from_millis(5),
    );

    thread::sleep(Duration::from_millis(100));
    assert_eq!(controller.phase(), Phase::Idle);
    assert!(events.try_recv().is_err());

    monitor.stop();
    controller.shutdown();
}
