//! Foreground host: runs the service until Ctrl+C

use crate::error::Result;
use crate::service::host::{host_error, ManagedService, ServiceHost};
use crate::service::StopOutcome;
use crossbeam_channel::{bounded, Receiver};
use tracing::{info, warn};

/// Runs a service in the current process until a shutdown signal arrives
pub struct ConsoleHost {
    shutdown: Option<Receiver<()>>,
}

impl ConsoleHost {
    /// Host that stops on Ctrl+C
    pub fn new() -> Self {
        Self { shutdown: None }
    }

    /// Host that stops when `shutdown` receives a message or disconnects
    pub fn with_shutdown(shutdown: Receiver<()>) -> Self {
        Self {
            shutdown: Some(shutdown),
        }
    }
}

impl Default for ConsoleHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceHost for ConsoleHost {
    fn run(self, mut service: Box<dyn ManagedService>) -> Result<()> {
        let shutdown = match self.shutdown {
            Some(rx) => rx,
            None => {
                let (tx, rx) = bounded::<()>(1);
                ctrlc::set_handler(move || {
                    let _ = tx.try_send(());
                })
                .map_err(|e| host_error("cannot install Ctrl+C handler", e))?;
                rx
            }
        };

        let descriptor = service.descriptor();
        info!("Running {} in the foreground", descriptor.display_name);

        if let Err(e) = service.start() {
            // release whatever the failed start left behind
            service.stop();
            return Err(e);
        }

        println!(
            "{} running. Press Ctrl+C to stop.",
            descriptor.display_name
        );

        // a dropped sender counts as a shutdown request too
        let _ = shutdown.recv();
        info!("Received shutdown signal, stopping...");

        let outcome = service.stop();
        if outcome != StopOutcome::Stopped {
            warn!("Stop finished with {:?}", outcome);
        }

        println!("Stopped.");
        Ok(())
    }
}
