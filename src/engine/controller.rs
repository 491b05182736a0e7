//! Run/stop/panic state machine.
//!
//! A single control thread owns [`RunState`]. Every request (terminal front
//! end, hotkeys, failsafe, scheduler reports) is a message on a queue; panics
//! have their own queue which is always drained first. The handle returned to
//! callers is a cheap clone that only sends messages and reads snapshots.

use crate::engine::scheduler::{ClickScheduler, Progress, RunOutcome, DEFAULT_DOUBLE_CLICK_GAP};
use crate::engine::session::{ConfigInvalid, SessionConfig, SessionRequest};
use crate::engine::signal::{Halt, RunSignal};
use crate::engine::state::{
    ControlEvent, Notice, PanicCause, Phase, RequestSource, RunEnd, RunId, RunState,
};
use crate::input::sink::ClickSink;
use crate::input::types::HotkeyEvent;
use crate::stats::SharedActivityLog;
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Errors returned synchronously by [`Controller`] requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    Invalid(ConfigInvalid),
    /// A run is counting down, running, or still winding down.
    Busy(Phase),
    ShutDown,
}

impl std::fmt::Display for ControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlError::Invalid(e) => write!(f, "Invalid session: {e}"),
            ControlError::Busy(phase) => write!(f, "Cannot start while {phase}"),
            ControlError::ShutDown => write!(f, "Controller has shut down"),
        }
    }
}

impl std::error::Error for ControlError {}

impl From<ConfigInvalid> for ControlError {
    fn from(e: ConfigInvalid) -> Self {
        ControlError::Invalid(e)
    }
}

/// Knobs that apply to every run rather than to one session.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub double_click_gap: Duration,
    pub activity: Option<SharedActivityLog>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            double_click_gap: DEFAULT_DOUBLE_CLICK_GAP,
            activity: None,
        }
    }
}

enum Request {
    Start {
        config: Arc<SessionConfig>,
        reply: Sender<Result<RunId, ControlError>>,
    },
    Stage(Arc<SessionConfig>),
    Toggle(RequestSource),
    Stop(RequestSource),
    Acknowledge,
    Notice(Notice),
    Shutdown,
}

enum WorkerReport {
    Progress(Progress),
    Finished(RunOutcome),
}

struct Shared {
    state: Mutex<RunState>,
    /// Signal of the run currently owning a scheduler, for the panic fast path.
    active_signal: Mutex<Option<RunSignal>>,
    subscribers: Mutex<Vec<Sender<ControlEvent>>>,
    control_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn publish(&self, event: ControlEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Handle to the control thread.
#[derive(Clone)]
pub struct Controller {
    shared: Arc<Shared>,
    requests: Sender<Request>,
    panics: Sender<PanicCause>,
}

impl Controller {
    pub fn new(sink: Arc<dyn ClickSink>) -> Self {
        Self::with_options(sink, ControllerOptions::default())
    }

    pub fn with_options(sink: Arc<dyn ClickSink>, options: ControllerOptions) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(RunState::default()),
            active_signal: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            control_thread: Mutex::new(None),
        });

        let (requests_tx, requests_rx) = unbounded();
        let (panics_tx, panics_rx) = unbounded();
        let (reports_tx, reports_rx) = unbounded();

        let control = ControlLoop {
            shared: shared.clone(),
            sink,
            options,
            reports: reports_tx,
            staged: None,
            next_run: 1,
            worker: None,
            panic_latch: None,
        };
        let handle = thread::spawn(move || control.run(requests_rx, panics_rx, reports_rx));
        *shared.control_thread.lock() = Some(handle);

        Self {
            shared,
            requests: requests_tx,
            panics: panics_tx,
        }
    }

    /// Start a run with an already validated config.
    ///
    /// From `PanicStopped` this acknowledges the panic first.
    pub fn start(&self, config: SessionConfig) -> Result<RunId, ControlError> {
        let (reply, response) = bounded(1);
        self.send(Request::Start {
            config: Arc::new(config),
            reply,
        })?;
        response.recv().map_err(|_| ControlError::ShutDown)?
    }

    /// Validate `request` and start it. Invalid input never reaches the queue.
    pub fn start_request(&self, request: &SessionRequest) -> Result<RunId, ControlError> {
        let config = request.validate()?;
        self.start(config)
    }

    /// Remember the session a toggle from `Idle` should start.
    pub fn stage(&self, config: SessionConfig) -> Result<(), ControlError> {
        self.send(Request::Stage(Arc::new(config)))
    }

    /// Start the staged session if idle, stop if active, acknowledge if panic-stopped.
    pub fn toggle(&self, source: RequestSource) -> Result<(), ControlError> {
        self.send(Request::Toggle(source))
    }

    /// Graceful stop. No-op unless counting or running.
    pub fn stop(&self, source: RequestSource) -> Result<(), ControlError> {
        self.send(Request::Stop(source))
    }

    /// Halt the active run immediately.
    ///
    /// The run's signal is tripped from the calling thread before the request
    /// is queued, so no click starts after this returns.
    pub fn panic(&self, cause: PanicCause) -> Result<(), ControlError> {
        if let Some(signal) = self.shared.active_signal.lock().as_ref() {
            signal.request_panic(cause);
        }
        self.panics.send(cause).map_err(|_| ControlError::ShutDown)
    }

    /// Leave `PanicStopped` for `Idle`.
    pub fn acknowledge(&self) -> Result<(), ControlError> {
        self.send(Request::Acknowledge)
    }

    pub fn handle_hotkey(&self, event: HotkeyEvent) -> Result<(), ControlError> {
        debug!(?event, "Hotkey received");
        match event {
            HotkeyEvent::Toggle => self.toggle(RequestSource::Hotkey),
            HotkeyEvent::Panic => self.panic(PanicCause::Hotkey),
        }
    }

    /// Publish a notice to subscribers through the control thread.
    pub fn report_notice(&self, notice: Notice) -> Result<(), ControlError> {
        self.send(Request::Notice(notice))
    }

    pub fn snapshot(&self) -> RunState {
        self.shared.state.lock().clone()
    }

    pub fn phase(&self) -> Phase {
        self.shared.state.lock().phase
    }

    pub fn clicks_issued(&self) -> u64 {
        self.shared.state.lock().clicks_issued
    }

    /// Stream of every event published from now on.
    pub fn subscribe(&self) -> Receiver<ControlEvent> {
        let (tx, rx) = unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    /// Stop any active run and wait for the control thread to exit.
    pub fn shutdown(&self) {
        let _ = self.requests.send(Request::Shutdown);
        let handle = self.shared.control_thread.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Control thread panicked during shutdown");
            }
        }
    }

    fn send(&self, request: Request) -> Result<(), ControlError> {
        self.requests
            .send(request)
            .map_err(|_| ControlError::ShutDown)
    }
}

struct ControlLoop {
    shared: Arc<Shared>,
    sink: Arc<dyn ClickSink>,
    options: ControllerOptions,
    reports: Sender<(RunId, WorkerReport)>,
    staged: Option<Arc<SessionConfig>>,
    next_run: u64,
    worker: Option<(RunId, JoinHandle<()>)>,
    panic_latch: Option<(RunId, PanicCause)>,
}

impl ControlLoop {
    fn run(
        mut self,
        requests: Receiver<Request>,
        panics: Receiver<PanicCause>,
        reports: Receiver<(RunId, WorkerReport)>,
    ) {
        debug!("Control thread started");
        let mut running = true;
        while running {
            self.drain_panics(&panics);

            select! {
                recv(panics) -> msg => match msg {
                    Ok(cause) => self.on_panic(cause),
                    Err(_) => running = false,
                },
                recv(requests) -> msg => match msg {
                    Ok(Request::Shutdown) | Err(_) => running = false,
                    Ok(request) => {
                        self.drain_panics(&panics);
                        self.on_request(request);
                    }
                },
                recv(reports) -> msg => {
                    if let Ok((run, report)) = msg {
                        self.drain_panics(&panics);
                        self.on_report(run, report);
                    }
                },
            }
        }

        self.teardown(&reports);
        debug!("Control thread exited");
    }

    fn drain_panics(&mut self, panics: &Receiver<PanicCause>) {
        while let Ok(cause) = panics.try_recv() {
            self.on_panic(cause);
        }
    }

    fn on_request(&mut self, request: Request) {
        match request {
            Request::Start { config, reply } => {
                let result = self.try_start(config);
                let _ = reply.send(result);
            }
            Request::Stage(config) => {
                self.staged = Some(config);
            }
            Request::Toggle(source) => self.on_toggle(source),
            Request::Stop(source) => {
                if matches!(self.phase(), Phase::Counting | Phase::Running) {
                    self.begin_stop(source);
                }
            }
            Request::Acknowledge => self.acknowledge(),
            Request::Notice(notice) => self.shared.publish(ControlEvent::Notice(notice)),
            Request::Shutdown => {}
        }
    }

    fn on_toggle(&mut self, source: RequestSource) {
        match self.phase() {
            Phase::Idle => match self.staged.clone() {
                Some(config) => {
                    self.launch(config);
                }
                None => self
                    .shared
                    .publish(ControlEvent::Notice(Notice::NothingStaged)),
            },
            Phase::Counting | Phase::Running => self.begin_stop(source),
            Phase::Stopping => debug!(?source, "Toggle ignored while stopping"),
            Phase::PanicStopped => self.acknowledge(),
        }
    }

    fn on_panic(&mut self, cause: PanicCause) {
        let phase = self.phase();
        if !phase.is_active() {
            debug!(%cause, %phase, "Panic ignored, nothing running");
            return;
        }

        // Blocks until any in-flight press returns; no press starts afterwards
        if let Some(signal) = self.shared.active_signal.lock().as_ref() {
            signal.request_panic(cause);
        }
        warn!(%cause, "Panic stop");
        if let Some(run) = self.current_run() {
            self.panic_latch = Some((run, cause));
        }
        self.transition(Phase::PanicStopped);
    }

    fn on_report(&mut self, run: RunId, report: WorkerReport) {
        match report {
            WorkerReport::Progress(progress) => self.on_progress(run, progress),
            WorkerReport::Finished(outcome) => self.on_finished(run, outcome),
        }
    }

    fn on_progress(&mut self, run: RunId, progress: Progress) {
        if self.current_run() != Some(run) {
            return;
        }
        match progress {
            Progress::Countdown { remaining_secs } => {
                if self.phase() == Phase::Counting {
                    self.shared.publish(ControlEvent::Countdown {
                        run,
                        remaining_secs,
                    });
                }
            }
            Progress::Started => {
                if self.phase() == Phase::Counting {
                    self.transition(Phase::Running);
                }
            }
            Progress::Clicked { total } => {
                let remaining = {
                    let mut state = self.shared.state.lock();
                    state.clicks_issued = total;
                    state.remaining()
                };
                self.shared.publish(ControlEvent::ClickIssued {
                    run,
                    total,
                    remaining,
                });
            }
        }
    }

    fn on_finished(&mut self, run: RunId, outcome: RunOutcome) {
        if let Some((worker_run, _)) = &self.worker {
            if *worker_run == run {
                self.join_worker();
            }
        }

        // A panic handled by the control thread already decided this run's phase
        let latched = match self.panic_latch {
            Some((latched_run, cause)) if latched_run == run => {
                self.panic_latch = None;
                Some(cause)
            }
            _ => None,
        };
        // A panic already on the signal outranks whatever the worker reported
        let signalled = if latched.is_none() && self.current_run() == Some(run) {
            match self.shared.active_signal.lock().as_ref().and_then(|s| s.halted()) {
                Some(Halt::Panic(cause)) => Some(cause),
                _ => None,
            }
        } else {
            None
        };
        let end = match latched.or(signalled) {
            Some(cause) => RunEnd::Panicked(cause),
            None => outcome.end,
        };
        let clicks = outcome.clicks_issued;

        if let Some(activity) = &self.options.activity {
            activity.record_run_ended(&end, clicks);
        }
        info!(%run, %end, clicks, "Run ended");

        if self.current_run() == Some(run) {
            self.shared.state.lock().clicks_issued = clicks;
            *self.shared.active_signal.lock() = None;

            if latched.is_none() {
                match &end {
                    RunEnd::Completed | RunEnd::Stopped => self.transition(Phase::Idle),
                    RunEnd::Panicked(_) => self.transition(Phase::PanicStopped),
                    RunEnd::Failed(e) => {
                        self.transition(Phase::Idle);
                        self.shared
                            .publish(ControlEvent::Notice(Notice::InjectionFailed(e.clone())));
                    }
                }
            }
        }

        self.shared
            .publish(ControlEvent::RunEnded { run, end, clicks });
    }

    fn try_start(&mut self, config: Arc<SessionConfig>) -> Result<RunId, ControlError> {
        let phase = self.phase();
        if !phase.accepts_start() {
            return Err(ControlError::Busy(phase));
        }
        if phase == Phase::PanicStopped {
            self.acknowledge();
        }
        self.staged = Some(config.clone());
        Ok(self.launch(config))
    }

    fn launch(&mut self, config: Arc<SessionConfig>) -> RunId {
        // The previous worker has reported or been panicked; make sure it is gone
        self.join_worker();

        let run = RunId(self.next_run);
        self.next_run += 1;

        let signal = RunSignal::new();
        *self.shared.active_signal.lock() = Some(signal.clone());

        let to = if config.start_delay().is_some() {
            Phase::Counting
        } else {
            Phase::Running
        };
        let from = {
            let mut state = self.shared.state.lock();
            let from = state.phase;
            state.phase = to;
            state.clicks_issued = 0;
            state.active_config = Some(config.clone());
            state.run = Some(run);
            from
        };
        self.shared.publish(ControlEvent::PhaseChanged {
            run: Some(run),
            from,
            to,
        });

        if let Some(activity) = &self.options.activity {
            activity.record_run_started();
        }
        info!(%run, session = %config.summary(), "Run started");

        let scheduler = ClickScheduler::new(config, self.sink.clone(), signal)
            .with_double_click_gap(self.options.double_click_gap);
        let reports = self.reports.clone();
        let handle = thread::spawn(move || {
            let outcome = scheduler.run(|progress| {
                let _ = reports.send((run, WorkerReport::Progress(progress)));
            });
            let _ = reports.send((run, WorkerReport::Finished(outcome)));
        });
        self.worker = Some((run, handle));

        run
    }

    fn begin_stop(&mut self, source: RequestSource) {
        if let Some(signal) = self.shared.active_signal.lock().as_ref() {
            signal.request_stop();
        }
        debug!(?source, "Stop requested");
        self.transition(Phase::Stopping);
    }

    fn acknowledge(&mut self) {
        if self.phase() == Phase::PanicStopped {
            self.transition(Phase::Idle);
        }
    }

    fn transition(&mut self, to: Phase) {
        let (from, run) = {
            let mut state = self.shared.state.lock();
            let from = state.phase;
            if from == to {
                return;
            }
            state.phase = to;
            (from, state.run)
        };
        debug!(%from, %to, "Phase changed");
        self.shared
            .publish(ControlEvent::PhaseChanged { run, from, to });
    }

    fn join_worker(&mut self) {
        if let Some((run, handle)) = self.worker.take() {
            if handle.join().is_err() {
                warn!(%run, "Scheduler thread panicked");
            }
        }
    }

    fn teardown(&mut self, reports: &Receiver<(RunId, WorkerReport)>) {
        if let Some(signal) = self.shared.active_signal.lock().take() {
            signal.request_stop();
        }
        self.join_worker();

        // Account for the last run if it finished while we were shutting down
        while let Ok((run, report)) = reports.try_recv() {
            if let WorkerReport::Finished(outcome) = report {
                self.on_finished(run, outcome);
            }
        }
    }

    fn phase(&self) -> Phase {
        self.shared.state.lock().phase
    }

    fn current_run(&self) -> Option<RunId> {
        self.shared.state.lock().run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::session::IntervalParts;
    use crate::input::sink::InjectionError;
    use crate::input::types::{MouseButton, Position};
    use std::time::Instant;

    #[derive(Default)]
    struct CountingSink {
        presses: Mutex<u64>,
    }

    impl ClickSink for CountingSink {
        fn click(&self, _button: MouseButton, _at: Option<Position>) -> Result<(), InjectionError> {
            *self.presses.lock() += 1;
            Ok(())
        }
    }

    fn wait_for_phase(controller: &Controller, phase: Phase) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while controller.phase() != phase {
            assert!(Instant::now() < deadline, "timed out waiting for {phase}");
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn slow_session() -> SessionConfig {
        SessionRequest::new(IntervalParts::new(0, 10, 0))
            .validate()
            .unwrap()
    }

    #[test]
    fn test_start_rejected_while_running() {
        let controller = Controller::new(Arc::new(CountingSink::default()));
        let run = controller.start(slow_session()).unwrap();
        assert_eq!(run, RunId(1));

        let err = controller.start(slow_session()).unwrap_err();
        assert_eq!(err, ControlError::Busy(Phase::Running));

        controller.stop(RequestSource::Ui).unwrap();
        wait_for_phase(&controller, Phase::Idle);
        controller.shutdown();
    }

    #[test]
    fn test_invalid_request_never_queued() {
        let controller = Controller::new(Arc::new(CountingSink::default()));
        let err = controller
            .start_request(&SessionRequest::new(IntervalParts::default()))
            .unwrap_err();
        assert_eq!(err, ControlError::Invalid(ConfigInvalid::ZeroInterval));
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(controller.snapshot().run, None);
        controller.shutdown();
    }

    #[test]
    fn test_panic_in_idle_is_noop() {
        let controller = Controller::new(Arc::new(CountingSink::default()));
        let events = controller.subscribe();
        controller.panic(PanicCause::Ui).unwrap();
        controller.acknowledge().unwrap();
        controller.shutdown();

        assert_eq!(controller.phase(), Phase::Idle);
        assert!(events.try_iter().next().is_none());
    }

    #[test]
    fn test_toggle_without_staged_session_notifies() {
        let controller = Controller::new(Arc::new(CountingSink::default()));
        let events = controller.subscribe();
        controller.toggle(RequestSource::Hotkey).unwrap();

        let event = events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event, ControlEvent::Notice(Notice::NothingStaged));
        assert_eq!(controller.phase(), Phase::Idle);
        controller.shutdown();
    }

    #[test]
    fn test_toggle_in_panic_stopped_only_acknowledges() {
        let controller = Controller::new(Arc::new(CountingSink::default()));
        controller.start(slow_session()).unwrap();
        controller.panic(PanicCause::Hotkey).unwrap();
        wait_for_phase(&controller, Phase::PanicStopped);

        controller.toggle(RequestSource::Hotkey).unwrap();
        wait_for_phase(&controller, Phase::Idle);
        assert_eq!(controller.snapshot().run, Some(RunId(1)));
        controller.shutdown();
    }

    #[test]
    fn test_shutdown_refuses_later_requests() {
        let controller = Controller::new(Arc::new(CountingSink::default()));
        controller.shutdown();
        assert_eq!(
            controller.start(slow_session()),
            Err(ControlError::ShutDown)
        );
    }
}
