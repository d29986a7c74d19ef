//! Windows Service runner implementation

use crate::error::{BotError, Result, EXIT_START_FAILURE};
use crate::logging::LogHandle;
use crate::service::host::{
    drive_service, host_error, HostStatus, ManagedService, ServiceHost, StatusReporter,
};
use crossbeam_channel::bounded;
use parking_lot::Mutex;
use std::ffi::OsString;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;
use tracing::{error, info};
use windows_service::{
    define_windows_service,
    service::{
        ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceState, ServiceStatus,
        ServiceType,
    },
    service_control_handler::{self, ServiceControlHandlerResult, ServiceStatusHandle},
    service_dispatcher,
};

const SERVICE_TYPE: ServiceType = ServiceType::OWN_PROCESS;

/// Service handed from `run` to the dispatcher thread
struct PendingService {
    service: Box<dyn ManagedService>,
    log: LogHandle,
}

static PENDING: Mutex<Option<PendingService>> = parking_lot::const_mutex(None);
static EXIT_CODE: AtomicI32 = AtomicI32::new(0);

/// Runs a service under the Windows Service Control Manager
pub struct WindowsServiceHost {
    log: LogHandle,
}

impl WindowsServiceHost {
    pub fn new(log: LogHandle) -> Self {
        Self { log }
    }
}

impl ServiceHost for WindowsServiceHost {
    /// Blocks until the SCM has stopped the service
    fn run(self, service: Box<dyn ManagedService>) -> Result<()> {
        let service_name = service.descriptor().service_name;
        *PENDING.lock() = Some(PendingService {
            service,
            log: self.log,
        });

        service_dispatcher::start(service_name, ffi_service_main)
            .map_err(|e| host_error("service dispatcher failed", e))?;

        match EXIT_CODE.load(Ordering::SeqCst) {
            0 => Ok(()),
            EXIT_START_FAILURE => Err(BotError::start_failure(
                service_name,
                "see service log for details",
            )),
            code => Err(BotError::Host(format!("service exited with code {}", code))),
        }
    }
}

// Generate the Windows service entry point
define_windows_service!(ffi_service_main, service_main);

/// Service main function called by the Windows Service Control Manager
fn service_main(_arguments: Vec<OsString>) {
    let Some(PendingService { mut service, log }) = PENDING.lock().take() else {
        EXIT_CODE.store(crate::error::EXIT_HOST_FAILURE, Ordering::SeqCst);
        return;
    };

    let code = log.in_scope(|| match run_service_main(service.as_mut()) {
        Ok(code) => code,
        Err(e) => {
            error!("Service error: {}", e);
            e.exit_code()
        }
    });
    EXIT_CODE.store(code, Ordering::SeqCst);
}

fn run_service_main(service: &mut dyn ManagedService) -> Result<i32> {
    let descriptor = service.descriptor();
    info!("Starting {} service", descriptor.display_name);

    let (stop_tx, stop_rx) = bounded::<()>(1);

    let status_handle = service_control_handler::register(
        descriptor.service_name,
        move |control_event| -> ServiceControlHandlerResult {
            match control_event {
                ServiceControl::Stop | ServiceControl::Shutdown => {
                    info!("Received stop/shutdown signal");
                    let _ = stop_tx.try_send(());
                    ServiceControlHandlerResult::NoError
                }
                ServiceControl::Interrogate => ServiceControlHandlerResult::NoError,
                _ => ServiceControlHandlerResult::NotImplemented,
            }
        },
    )
    .map_err(|e| host_error("cannot register control handler", e))?;

    let mut reporter = ScmReporter(status_handle);
    let code = drive_service(service, &mut reporter, || {
        let _ = stop_rx.recv();
    })?;

    info!("Service stopped");
    Ok(code)
}

/// Reports status to the SCM through the registered handle
struct ScmReporter(ServiceStatusHandle);

impl StatusReporter for ScmReporter {
    fn report(&mut self, status: HostStatus, wait_hint: Duration) -> Result<()> {
        let (current_state, controls_accepted, exit_code) = match status {
            HostStatus::StartPending => (ServiceState::StartPending, ServiceControlAccept::empty(), 0),
            HostStatus::Running => (
                ServiceState::Running,
                ServiceControlAccept::STOP | ServiceControlAccept::SHUTDOWN,
                0,
            ),
            HostStatus::StopPending => (ServiceState::StopPending, ServiceControlAccept::empty(), 0),
            HostStatus::Stopped { exit_code } => {
                (ServiceState::Stopped, ServiceControlAccept::empty(), exit_code)
            }
        };
        report(&self.0, current_state, controls_accepted, exit_code as u32, wait_hint)
    }
}

fn report(
    status_handle: &ServiceStatusHandle,
    current_state: ServiceState,
    controls_accepted: ServiceControlAccept,
    exit_code: u32,
    wait_hint: Duration,
) -> Result<()> {
    let exit_code = if exit_code == 0 {
        ServiceExitCode::Win32(0)
    } else {
        ServiceExitCode::ServiceSpecific(exit_code)
    };

    status_handle
        .set_service_status(ServiceStatus {
            service_type: SERVICE_TYPE,
            current_state,
            controls_accepted,
            exit_code,
            checkpoint: 0,
            wait_hint,
            process_id: None,
        })
        .map_err(|e| host_error("cannot report service status", e))
}
