//! Lifecycle adapter between a service manager and a [`Worker`]

use crate::error::{BotError, Result};
use crate::logging::LogHandle;
use crate::service::ServiceDescriptor;
use crate::worker::Worker;
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default time allowed for a worker to stop
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time the service manager is told to allow for startup
pub const DEFAULT_START_WAIT_HINT: Duration = Duration::from_secs(10);

/// Adapter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No worker constructed yet
    Uninitialized,
    /// Worker constructed, not started
    Configured,
    /// Worker started
    Started,
    /// Worker start was attempted and failed
    FailedToStart,
    /// Worker stopped and released
    Stopped,
    /// Worker could not be constructed
    FailedToConfigure,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Configured => "configured",
            LifecycleState::Started => "started",
            LifecycleState::FailedToStart => "failed to start",
            LifecycleState::Stopped => "stopped",
            LifecycleState::FailedToConfigure => "failed to configure",
        };
        f.write_str(name)
    }
}

/// Result of a stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Worker confirmed shutdown within the timeout
    Stopped,
    /// Worker did not confirm shutdown in time
    TimedOut,
    /// Worker reported an error or panicked while stopping
    Failed,
    /// A previous stop already released the worker
    AlreadyStopped,
    /// There was never a worker to stop
    NotConfigured,
}

/// Drives a single worker through configure, start and stop
pub struct LifecycleAdapter<W: Worker> {
    descriptor: ServiceDescriptor,
    log: LogHandle,
    state: LifecycleState,
    worker: Option<W>,
    stop_timeout: Duration,
    start_wait_hint: Duration,
}

impl<W: Worker> LifecycleAdapter<W> {
    /// Create an adapter with no worker
    pub fn new(descriptor: ServiceDescriptor, log: LogHandle) -> Self {
        Self {
            descriptor,
            log,
            state: LifecycleState::Uninitialized,
            worker: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            start_wait_hint: DEFAULT_START_WAIT_HINT,
        }
    }

    /// Set how long `on_stop` waits for the worker
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Set the startup budget; slower starts are logged
    pub fn with_start_wait_hint(mut self, hint: Duration) -> Self {
        self.start_wait_hint = hint;
        self
    }

    /// Static service metadata
    pub fn describe(&self) -> ServiceDescriptor {
        self.descriptor
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }

    pub fn start_wait_hint(&self) -> Duration {
        self.start_wait_hint
    }

    /// The configured worker, until it is stopped
    pub fn worker(&self) -> Option<&W> {
        self.worker.as_ref()
    }

    /// Construct the worker for `identity`
    ///
    /// The factory must only build the worker; it is not started here.
    pub fn configure<F>(&mut self, identity: &str, factory: F) -> Result<&W>
    where
        F: FnOnce(&str) -> anyhow::Result<W>,
    {
        if self.state != LifecycleState::Uninitialized {
            return Err(BotError::InvalidTransition {
                action: "configure",
                state: self.state.to_string(),
            });
        }

        if identity.trim().is_empty() {
            self.state = LifecycleState::FailedToConfigure;
            let err = BotError::Configuration("worker identity must not be empty".to_string());
            self.log.in_scope(|| error!("{}", err));
            return Err(err);
        }

        match factory(identity) {
            Ok(worker) => {
                self.log.in_scope(|| {
                    info!(identity = %worker.identity(), "Worker configured");
                });
                self.state = LifecycleState::Configured;
                Ok(&*self.worker.insert(worker))
            }
            Err(e) => {
                self.state = LifecycleState::FailedToConfigure;
                let err = BotError::Configuration(format!(
                    "cannot construct worker for '{}': {:#}",
                    identity, e
                ));
                self.log.in_scope(|| error!("{}", err));
                Err(err)
            }
        }
    }

    /// Start the worker; called once by the service manager
    pub fn on_start(&mut self) -> Result<()> {
        let log = self.log.clone();
        log.in_scope(|| self.start_inner())
    }

    fn start_inner(&mut self) -> Result<()> {
        if self.state != LifecycleState::Configured {
            warn!(state = %self.state, "Start requested in wrong state");
            return Err(BotError::InvalidTransition {
                action: "start",
                state: self.state.to_string(),
            });
        }

        let Some(worker) = self.worker.as_mut() else {
            return Err(BotError::InvalidTransition {
                action: "start",
                state: self.state.to_string(),
            });
        };

        let identity = worker.identity().to_string();
        debug!(identity = %identity, "Start requested");

        let began = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| worker.start()));
        let elapsed = began.elapsed();

        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(BotError::start_failure(&identity, e)),
            Err(payload) => Some(BotError::start_failure(
                &identity,
                format!("panicked: {}", panic_message(payload.as_ref())),
            )),
        };

        if let Some(err) = failure {
            self.state = LifecycleState::FailedToStart;
            error!("{}", err);
            return Err(err);
        }

        if elapsed > self.start_wait_hint {
            warn!(
                identity = %identity,
                elapsed_ms = elapsed.as_millis() as u64,
                "Worker start exceeded the startup budget"
            );
        }

        self.state = LifecycleState::Started;
        info!(identity = %identity, "Worker started");
        Ok(())
    }

    /// Stop the worker and release it
    ///
    /// Never fails: errors, panics and timeouts are logged and reported in
    /// the returned outcome. Waits at most the stop timeout.
    pub fn on_stop(&mut self) -> StopOutcome {
        let log = self.log.clone();
        log.in_scope(|| self.stop_inner())
    }

    fn stop_inner(&mut self) -> StopOutcome {
        match self.state {
            LifecycleState::Stopped => {
                info!("Stop requested, worker already stopped");
                return StopOutcome::AlreadyStopped;
            }
            LifecycleState::Uninitialized | LifecycleState::FailedToConfigure => {
                info!(state = %self.state, "Stop requested, no worker to stop");
                return StopOutcome::NotConfigured;
            }
            LifecycleState::Configured
            | LifecycleState::Started
            | LifecycleState::FailedToStart => {}
        }

        self.state = LifecycleState::Stopped;
        let Some(mut worker) = self.worker.take() else {
            return StopOutcome::NotConfigured;
        };

        let identity = worker.identity().to_string();
        debug!(identity = %identity, timeout_ms = self.stop_timeout.as_millis() as u64, "Stop requested");

        let (done_tx, done_rx) = bounded::<anyhow::Result<()>>(1);
        let stop_log = self.log.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-stop", identity.trim_start_matches('@')))
            .spawn(move || {
                let result = stop_log.in_scope(|| worker.stop());
                let _ = done_tx.send(result);
            });

        if let Err(e) = spawned {
            error!("{}", BotError::stop_failure(&identity, e));
            return StopOutcome::Failed;
        }

        match done_rx.recv_timeout(self.stop_timeout) {
            Ok(Ok(())) => {
                info!(identity = %identity, "Worker stopped");
                StopOutcome::Stopped
            }
            Ok(Err(e)) => {
                error!("{}", BotError::stop_failure(&identity, e));
                StopOutcome::Failed
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "{}",
                    BotError::stop_failure(
                        &identity,
                        format!("no confirmation within {:?}", self.stop_timeout)
                    )
                );
                StopOutcome::TimedOut
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!("{}", BotError::stop_failure(&identity, "stop panicked"));
                StopOutcome::Failed
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
pub(crate) mod test_workers {
    use crate::worker::Worker;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Counts lifecycle calls
    #[derive(Clone, Default)]
    pub struct Calls {
        pub starts: Arc<AtomicUsize>,
        pub stops: Arc<AtomicUsize>,
    }

    impl Calls {
        pub fn starts(&self) -> usize {
            self.starts.load(Ordering::SeqCst)
        }

        pub fn stops(&self) -> usize {
            self.stops.load(Ordering::SeqCst)
        }
    }

    /// Worker with configurable failure modes
    pub struct ScriptedWorker {
        pub identity: String,
        pub calls: Calls,
        pub fail_start: bool,
        pub panic_on_stop: bool,
        pub stop_delay: Duration,
    }

    impl ScriptedWorker {
        pub fn new(identity: &str, calls: Calls) -> Self {
            Self {
                identity: identity.to_string(),
                calls,
                fail_start: false,
                panic_on_stop: false,
                stop_delay: Duration::ZERO,
            }
        }
    }

    impl Worker for ScriptedWorker {
        fn identity(&self) -> &str {
            &self.identity
        }

        fn start(&mut self) -> anyhow::Result<()> {
            self.calls.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                anyhow::bail!("feed unavailable");
            }
            Ok(())
        }

        fn stop(&mut self) -> anyhow::Result<()> {
            self.calls.stops.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.stop_delay);
            if self.panic_on_stop {
                panic!("stop blew up");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_workers::{Calls, ScriptedWorker};
    use super::*;
    use crate::logging::test_support::CapturedLogs;

    fn adapter(logs: &CapturedLogs) -> LifecycleAdapter<ScriptedWorker> {
        LifecycleAdapter::new(
            ServiceDescriptor::default(),
            LogHandle::with_writer("debug", logs.clone()),
        )
        .with_stop_timeout(Duration::from_secs(5))
    }

    #[test]
    fn test_configure_binds_identity_without_starting() {
        let logs = CapturedLogs::default();
        let calls = Calls::default();
        let mut adapter = adapter(&logs);

        for identity in ["@randomartsbot", "x", "  padded  "] {
            let mut fresh = LifecycleAdapter::new(
                ServiceDescriptor::default(),
                LogHandle::with_writer("info", logs.clone()),
            );
            let worker = fresh
                .configure(identity, |id| Ok(ScriptedWorker::new(id, calls.clone())))
                .unwrap();
            assert_eq!(worker.identity(), identity);
            assert_eq!(fresh.state(), LifecycleState::Configured);
        }

        adapter
            .configure("@handle", |id| Ok(ScriptedWorker::new(id, calls.clone())))
            .unwrap();
        assert_eq!(calls.starts(), 0);
        assert_eq!(calls.stops(), 0);
    }

    #[test]
    fn test_empty_identity_is_configuration_error() {
        let logs = CapturedLogs::default();
        let calls = Calls::default();
        let factory_ran = std::cell::Cell::new(false);

        for identity in ["", "   "] {
            let mut adapter = adapter(&logs);
            let err = adapter
                .configure(identity, |id| {
                    factory_ran.set(true);
                    Ok(ScriptedWorker::new(id, calls.clone()))
                })
                .err()
                .unwrap();

            assert!(matches!(err, BotError::Configuration(_)));
            assert_eq!(adapter.state(), LifecycleState::FailedToConfigure);
            assert!(adapter.on_start().is_err());
        }

        assert!(!factory_ran.get());
        assert_eq!(calls.starts(), 0);
    }

    #[test]
    fn test_factory_error_is_configuration_error() {
        let logs = CapturedLogs::default();
        let mut adapter = adapter(&logs);

        let err = adapter
            .configure("@handle", |_| Err(anyhow::anyhow!("missing api token")))
            .err()
            .unwrap();

        assert!(matches!(err, BotError::Configuration(_)));
        assert!(err.to_string().contains("missing api token"));
        assert_eq!(adapter.on_stop(), StopOutcome::NotConfigured);
    }

    #[test]
    fn test_configure_twice_is_rejected() {
        let logs = CapturedLogs::default();
        let calls = Calls::default();
        let mut adapter = adapter(&logs);

        adapter
            .configure("@one", |id| Ok(ScriptedWorker::new(id, calls.clone())))
            .unwrap();
        let err = adapter
            .configure("@two", |id| Ok(ScriptedWorker::new(id, calls.clone())))
            .err()
            .unwrap();

        assert!(matches!(err, BotError::InvalidTransition { .. }));
        assert_eq!(adapter.worker().unwrap().identity(), "@one");
    }

    #[test]
    fn test_stop_before_start_is_safe() {
        let logs = CapturedLogs::default();
        let calls = Calls::default();
        let mut adapter = adapter(&logs);
        adapter
            .configure("@handle", |id| Ok(ScriptedWorker::new(id, calls.clone())))
            .unwrap();

        assert_eq!(adapter.on_stop(), StopOutcome::Stopped);
        assert_eq!(adapter.state(), LifecycleState::Stopped);
        assert_eq!(calls.starts(), 0);
        assert_eq!(calls.stops(), 1);

        // never started after stop
        assert!(adapter.on_start().is_err());
        assert_eq!(calls.starts(), 0);
    }

    #[test]
    fn test_stop_twice_is_noop() {
        let logs = CapturedLogs::default();
        let calls = Calls::default();
        let mut adapter = adapter(&logs);
        adapter
            .configure("@handle", |id| Ok(ScriptedWorker::new(id, calls.clone())))
            .unwrap();
        adapter.on_start().unwrap();

        assert_eq!(adapter.on_stop(), StopOutcome::Stopped);
        assert_eq!(adapter.on_stop(), StopOutcome::AlreadyStopped);
        assert_eq!(calls.stops(), 1);
        assert!(adapter.worker().is_none());
    }

    #[test]
    fn test_start_only_once() {
        let logs = CapturedLogs::default();
        let calls = Calls::default();
        let mut adapter = adapter(&logs);
        adapter
            .configure("@handle", |id| Ok(ScriptedWorker::new(id, calls.clone())))
            .unwrap();

        adapter.on_start().unwrap();
        let err = adapter.on_start().unwrap_err();

        assert!(matches!(err, BotError::InvalidTransition { .. }));
        assert_eq!(calls.starts(), 1);
    }

    #[test]
    fn test_describe_is_stable_across_states() {
        let logs = CapturedLogs::default();
        let calls = Calls::default();
        let mut adapter = adapter(&logs);
        let expected = ServiceDescriptor::default();

        assert_eq!(adapter.describe(), expected);
        adapter
            .configure("@handle", |id| Ok(ScriptedWorker::new(id, calls.clone())))
            .unwrap();
        assert_eq!(adapter.describe(), expected);
        adapter.on_start().unwrap();
        assert_eq!(adapter.describe(), expected);
        adapter.on_stop();
        assert_eq!(adapter.describe(), expected);

        assert_eq!(expected.service_name, "RandomArtsBot");
        assert_eq!(expected.display_name, "RandomArtsBot");
        assert_eq!(expected.description, "F Random Arts Bot");
    }

    #[test]
    fn test_start_failure_is_reported() {
        let logs = CapturedLogs::default();
        let calls = Calls::default();
        let mut adapter = adapter(&logs);
        adapter
            .configure("@handle", |id| {
                let mut worker = ScriptedWorker::new(id, calls.clone());
                worker.fail_start = true;
                Ok(worker)
            })
            .unwrap();

        let err = adapter.on_start().unwrap_err();

        assert!(matches!(err, BotError::StartFailure { .. }));
        assert_eq!(adapter.state(), LifecycleState::FailedToStart);
        assert!(logs.contents().contains("feed unavailable"));
        assert_eq!(logs.count("Worker started"), 0);

        // the half-started worker is still stopped on shutdown
        assert_eq!(adapter.on_stop(), StopOutcome::Stopped);
        assert_eq!(calls.stops(), 1);
    }

    #[test]
    fn test_slow_stop_times_out() {
        let logs = CapturedLogs::default();
        let calls = Calls::default();
        let mut adapter = adapter(&logs).with_stop_timeout(Duration::from_millis(50));
        adapter
            .configure("@handle", |id| {
                let mut worker = ScriptedWorker::new(id, calls.clone());
                worker.stop_delay = Duration::from_millis(500);
                Ok(worker)
            })
            .unwrap();
        adapter.on_start().unwrap();

        let began = Instant::now();
        let outcome = adapter.on_stop();

        assert_eq!(outcome, StopOutcome::TimedOut);
        assert!(began.elapsed() < Duration::from_millis(400));
        assert_eq!(adapter.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_panicking_stop_is_absorbed() {
        let logs = CapturedLogs::default();
        let calls = Calls::default();
        let mut adapter = adapter(&logs);
        adapter
            .configure("@handle", |id| {
                let mut worker = ScriptedWorker::new(id, calls.clone());
                worker.panic_on_stop = true;
                Ok(worker)
            })
            .unwrap();
        adapter.on_start().unwrap();

        assert_eq!(adapter.on_stop(), StopOutcome::Failed);
        assert_eq!(adapter.on_stop(), StopOutcome::AlreadyStopped);
    }

    #[test]
    fn test_full_lifecycle_logs_one_start_and_one_stop() {
        let logs = CapturedLogs::default();
        let calls = Calls::default();
        let mut adapter = adapter(&logs).with_stop_timeout(Duration::from_secs(2));

        adapter
            .configure("@handle", |id| Ok(ScriptedWorker::new(id, calls.clone())))
            .unwrap();
        adapter.on_start().unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let began = Instant::now();
        assert_eq!(adapter.on_stop(), StopOutcome::Stopped);
        assert!(began.elapsed() < Duration::from_secs(2));

        assert_eq!(logs.count("Worker started"), 1);
        assert_eq!(logs.count("Worker stopped"), 1);
        assert_eq!(calls.starts(), 1);
        assert_eq!(calls.stops(), 1);
    }
}
