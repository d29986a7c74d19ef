//! Install and uninstall the Windows service

use crate::error::Result;
use crate::service::host::host_error;
use crate::service::ServiceDescriptor;
use std::ffi::OsString;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;
use windows_service::{
    service::{
        ServiceAccess, ServiceErrorControl, ServiceInfo, ServiceStartType, ServiceState,
        ServiceType,
    },
    service_manager::{ServiceManager, ServiceManagerAccess},
};

/// How long uninstall waits for a running service to stop
const UNINSTALL_STOP_WAIT: Duration = Duration::from_secs(30);

/// Register `executable` as an auto-start service running as LocalSystem
pub fn install_service(
    descriptor: &ServiceDescriptor,
    executable: PathBuf,
    launch_arguments: Vec<OsString>,
) -> Result<()> {
    let manager = ServiceManager::local_computer(
        None::<&str>,
        ServiceManagerAccess::CONNECT | ServiceManagerAccess::CREATE_SERVICE,
    )
    .map_err(|e| host_error("cannot connect to service manager", e))?;

    let info = ServiceInfo {
        name: OsString::from(descriptor.service_name),
        display_name: OsString::from(descriptor.display_name),
        service_type: ServiceType::OWN_PROCESS,
        start_type: ServiceStartType::AutoStart,
        error_control: ServiceErrorControl::Normal,
        executable_path: executable,
        launch_arguments,
        dependencies: vec![],
        // None = LocalSystem
        account_name: None,
        account_password: None,
    };

    let service = manager
        .create_service(&info, ServiceAccess::CHANGE_CONFIG)
        .map_err(|e| host_error("cannot create service", e))?;
    service
        .set_description(descriptor.description)
        .map_err(|e| host_error("cannot set service description", e))?;

    info!("Installed service {}", descriptor.service_name);
    Ok(())
}

/// Stop the service if it is running and remove it
pub fn uninstall_service(descriptor: &ServiceDescriptor) -> Result<()> {
    let manager = ServiceManager::local_computer(None::<&str>, ServiceManagerAccess::CONNECT)
        .map_err(|e| host_error("cannot connect to service manager", e))?;

    let service = manager
        .open_service(
            descriptor.service_name,
            ServiceAccess::QUERY_STATUS | ServiceAccess::STOP | ServiceAccess::DELETE,
        )
        .map_err(|e| host_error("cannot open service", e))?;

    let status = service
        .query_status()
        .map_err(|e| host_error("cannot query service status", e))?;
    if status.current_state != ServiceState::Stopped {
        info!("Stopping service {}", descriptor.service_name);
        service
            .stop()
            .map_err(|e| host_error("cannot stop service", e))?;

        let began = Instant::now();
        while began.elapsed() < UNINSTALL_STOP_WAIT {
            let status = service
                .query_status()
                .map_err(|e| host_error("cannot query service status", e))?;
            if status.current_state == ServiceState::Stopped {
                break;
            }
            thread::sleep(Duration::from_millis(250));
        }
    }

    service
        .delete()
        .map_err(|e| host_error("cannot delete service", e))?;

    info!("Uninstalled service {}", descriptor.service_name);
    Ok(())
}
