//! Random Arts Bot Windows Service executable
//!
//! This binary is designed to be run by the Windows Service Control Manager.
//! Do not run this directly - use the service installer instead.
//!
//! To install the service:
//!   random-arts-bot install
//!
//! To start the service:
//!   net start RandomArtsBot
//!   or: sc start RandomArtsBot
//!
//! To stop the service:
//!   net stop RandomArtsBot
//!   or: sc stop RandomArtsBot
//!
//! To uninstall the service:
//!   random-arts-bot uninstall

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, warn};

use random_arts_bot::bot::bot_registration;
use random_arts_bot::error::BotError;
use random_arts_bot::logging::LogHandle;
use random_arts_bot::service::config::ServiceConfig;
use random_arts_bot::service::{launch, WindowsServiceHost};

/// Launch arguments recorded at install time
#[derive(Parser, Debug)]
#[command(name = "random-arts-bot-service")]
struct ServiceArgs {
    /// Configuration file (default: search standard locations)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = ServiceArgs::parse();

    let (config, config_error) = match &args.config {
        Some(path) => ServiceConfig::load(path),
        None => ServiceConfig::load_default(),
    }
    .map_or_else(|e| (ServiceConfig::default(), Some(e)), |config| (config, None));

    let log = LogHandle::init(&config.to_log_config());

    let problems = config_error
        .map(BotError::from)
        .into_iter()
        .chain(log.fallback_error());
    for problem in problems {
        if problem.is_fatal() {
            log.in_scope(|| error!("{}", problem));
            return exit_code(problem.exit_code());
        }
        log.in_scope(|| warn!("{}", problem));
    }

    log.info("Starting RandomArtsBot service");
    let code = launch(
        WindowsServiceHost::new(log.clone()),
        bot_registration(&config, &log),
        &log,
    );
    exit_code(code)
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
