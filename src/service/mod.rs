//! Service lifecycle support for random-arts-bot
//!
//! The bot runs either as a foreground console process or as a background
//! service managed by the Windows Service Control Manager. Both are driven
//! through the same [`LifecycleAdapter`].

mod adapter;
pub mod config;
mod console;
mod host;

#[cfg(all(windows, feature = "service"))]
mod install;
#[cfg(all(windows, feature = "service"))]
mod runner;

pub use adapter::{LifecycleAdapter, LifecycleState, StopOutcome};
pub use console::ConsoleHost;
pub use host::{
    drive_service, launch, HostStatus, ManagedService, ServiceHost, ServiceRegistration,
    StatusReporter,
};

#[cfg(all(windows, feature = "service"))]
pub use install::{install_service, uninstall_service};
#[cfg(all(windows, feature = "service"))]
pub use runner::WindowsServiceHost;

/// Service name used for registration
pub const SERVICE_NAME: &str = "RandomArtsBot";

/// Service display name shown in services.msc
pub const SERVICE_DISPLAY_NAME: &str = "RandomArtsBot";

/// Service description
pub const SERVICE_DESCRIPTION: &str = "F Random Arts Bot";

/// Identity the bot runs under when none is configured
pub const DEFAULT_IDENTITY: &str = "@randomartsbot";

/// Static metadata reported to the service manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub service_name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
}

impl Default for ServiceDescriptor {
    fn default() -> Self {
        Self {
            service_name: SERVICE_NAME,
            display_name: SERVICE_DISPLAY_NAME,
            description: SERVICE_DESCRIPTION,
        }
    }
}

impl std::fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.display_name, self.service_name, self.description
        )
    }
}
