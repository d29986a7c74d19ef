//! Service registration and the hosts that drive a configured service

use crate::error::{BotError, Result, EXIT_OK};
use crate::logging::LogHandle;
use crate::service::adapter::{
    LifecycleAdapter, StopOutcome, DEFAULT_START_WAIT_HINT, DEFAULT_STOP_TIMEOUT,
};
use crate::service::ServiceDescriptor;
use crate::worker::Worker;
use std::time::Duration;
use tracing::{error, info, warn};

/// Extra time reported to a service manager on top of the worker stop timeout
const STOP_HINT_SLACK: Duration = Duration::from_secs(5);

/// Everything needed to register one worker with a service host
pub struct ServiceRegistration<W: Worker> {
    pub descriptor: ServiceDescriptor,
    pub identity: String,
    pub construct: Box<dyn FnOnce(&str) -> anyhow::Result<W>>,
    pub stop_timeout: Duration,
    pub start_wait_hint: Duration,
}

impl<W: Worker> ServiceRegistration<W> {
    /// Registration with default metadata and timeouts
    pub fn new<F>(identity: impl Into<String>, construct: F) -> Self
    where
        F: FnOnce(&str) -> anyhow::Result<W> + 'static,
    {
        Self {
            descriptor: ServiceDescriptor::default(),
            identity: identity.into(),
            construct: Box::new(construct),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            start_wait_hint: DEFAULT_START_WAIT_HINT,
        }
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_start_wait_hint(mut self, hint: Duration) -> Self {
        self.start_wait_hint = hint;
        self
    }
}

/// A configured service as seen by a host
pub trait ManagedService: Send {
    fn descriptor(&self) -> ServiceDescriptor;

    /// Start the worker; errors go back to the service manager
    fn start(&mut self) -> Result<()>;

    /// Stop the worker; never fails
    fn stop(&mut self) -> StopOutcome;

    fn start_wait_hint(&self) -> Duration;

    fn stop_timeout(&self) -> Duration;
}

impl<W: Worker> ManagedService for LifecycleAdapter<W> {
    fn descriptor(&self) -> ServiceDescriptor {
        self.describe()
    }

    fn start(&mut self) -> Result<()> {
        self.on_start()
    }

    fn stop(&mut self) -> StopOutcome {
        self.on_stop()
    }

    fn start_wait_hint(&self) -> Duration {
        LifecycleAdapter::start_wait_hint(self)
    }

    fn stop_timeout(&self) -> Duration {
        LifecycleAdapter::stop_timeout(self)
    }
}

/// Something that can run a configured service until it is told to stop
pub trait ServiceHost {
    /// Run the service to completion
    ///
    /// Returns an error when the service failed to start or the host could
    /// not run it at all.
    fn run(self, service: Box<dyn ManagedService>) -> Result<()>;
}

/// Configure the worker and hand it to `host`
///
/// Returns the process exit code. A configuration failure returns before
/// the host is touched.
pub fn launch<H, W>(host: H, registration: ServiceRegistration<W>, log: &LogHandle) -> i32
where
    H: ServiceHost,
    W: Worker,
{
    let mut adapter = LifecycleAdapter::new(registration.descriptor, log.clone())
        .with_stop_timeout(registration.stop_timeout)
        .with_start_wait_hint(registration.start_wait_hint);

    if let Err(e) = adapter.configure(&registration.identity, registration.construct) {
        log.in_scope(|| error!("Not registering {}: {}", registration.descriptor.service_name, e));
        return e.exit_code();
    }

    log.in_scope(|| info!("Registering {}", registration.descriptor));

    match log.in_scope(|| host.run(Box::new(adapter))) {
        Ok(()) => EXIT_OK,
        Err(e) => {
            log.in_scope(|| error!("Service exited with error: {}", e));
            e.exit_code()
        }
    }
}

/// Lifecycle state reported to a service manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    StartPending,
    Running,
    StopPending,
    /// `exit_code` is 0 for a clean stop
    Stopped { exit_code: i32 },
}

/// Sink for status changes, such as the Windows SCM status handle
pub trait StatusReporter {
    fn report(&mut self, status: HostStatus, wait_hint: Duration) -> Result<()>;
}

/// Start `service`, wait for a stop request, then stop it, reporting each step
///
/// Once the worker has been started it is stopped on every path, including
/// a failed status report, and `Stopped` is reported last. Returns the exit
/// code reported with `Stopped`.
pub fn drive_service(
    service: &mut dyn ManagedService,
    reporter: &mut dyn StatusReporter,
    wait_for_stop: impl FnOnce(),
) -> Result<i32> {
    reporter.report(HostStatus::StartPending, service.start_wait_hint())?;

    if let Err(e) = service.start() {
        error!("Failed to start worker: {}", e);
        service.stop();
        reporter.report(
            HostStatus::Stopped {
                exit_code: e.exit_code(),
            },
            Duration::ZERO,
        )?;
        return Ok(e.exit_code());
    }

    if let Err(e) = reporter.report(HostStatus::Running, Duration::ZERO) {
        return Err(abandon(service, reporter, e));
    }

    wait_for_stop();

    let stop_hint = service.stop_timeout() + STOP_HINT_SLACK;
    if let Err(e) = reporter.report(HostStatus::StopPending, stop_hint) {
        return Err(abandon(service, reporter, e));
    }

    let outcome = service.stop();
    if outcome != StopOutcome::Stopped {
        warn!("Stop finished with {:?}", outcome);
    }

    reporter.report(HostStatus::Stopped { exit_code: EXIT_OK }, Duration::ZERO)?;
    Ok(EXIT_OK)
}

/// Stop a started worker after the service manager stopped listening
fn abandon(
    service: &mut dyn ManagedService,
    reporter: &mut dyn StatusReporter,
    cause: BotError,
) -> BotError {
    error!("Status report failed, stopping worker: {}", cause);
    service.stop();
    let stopped = HostStatus::Stopped {
        exit_code: cause.exit_code(),
    };
    if let Err(e) = reporter.report(stopped, Duration::ZERO) {
        warn!("Could not report stop: {}", e);
    }
    cause
}

/// Host error helper
pub(crate) fn host_error(context: &str, cause: impl std::fmt::Display) -> BotError {
    BotError::Host(format!("{}: {}", context, cause))
}
