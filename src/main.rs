//! random-arts-bot CLI

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use random_arts_bot::bot::bot_registration;
use random_arts_bot::config::{Args, Command};
use random_arts_bot::error::{BotError, EXIT_HOST_FAILURE};
use random_arts_bot::logging::{LogConfig, LogHandle};
use random_arts_bot::service::config::{ConfigError, ServiceConfig, CONFIG_FILE_NAME};
use random_arts_bot::service::{launch, ConsoleHost, ServiceDescriptor};

fn main() -> ExitCode {
    let args = Args::parse();

    let (config, config_error) = match load_config(&args) {
        Ok(config) => (config, None),
        Err(e) => (ServiceConfig::default(), Some(e)),
    };

    // Initialize logging
    let log = init_logging(&args, &config);

    let command = args.command.clone().unwrap_or_default();

    let problems = config_error
        .map(BotError::from)
        .into_iter()
        .chain(log.fallback_error());
    for problem in problems {
        if command.is_blocked_by(&problem) {
            log.in_scope(|| error!("{}", problem));
            return exit_code(problem.exit_code());
        }
        log.in_scope(|| warn!("{}; continuing with console logging or defaults", problem));
    }

    // Execute command
    let result = match command {
        Command::Run => Ok(cmd_run(&config, &log)),
        Command::Describe => cmd_describe(),
        Command::InitConfig { path, force } => cmd_init_config(path, force),
        Command::Install => cmd_install(args.config.as_deref(), &log),
        Command::Uninstall => cmd_uninstall(&log),
    };

    match result {
        Ok(code) => exit_code(code),
        Err(e) => {
            log.in_scope(|| error!("{:#}", e));
            exit_code(EXIT_HOST_FAILURE)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn load_config(args: &Args) -> std::result::Result<ServiceConfig, ConfigError> {
    match &args.config {
        Some(path) => ServiceConfig::load(path),
        None => ServiceConfig::load_default(),
    }
}

fn init_logging(args: &Args, config: &ServiceConfig) -> LogHandle {
    let mut log_config: LogConfig = config.to_log_config();

    if let Some(level) = args.log_level() {
        log_config.level = level.to_string();
    }
    if let Some(file) = &args.log {
        log_config.file = Some(file.clone());
    }

    LogHandle::init(&log_config)
}

/// Run the bot in the foreground
fn cmd_run(config: &ServiceConfig, log: &LogHandle) -> i32 {
    log.info("Starting RandomArtsBot console app");
    launch(ConsoleHost::new(), bot_registration(config, log), log)
}

/// Print service metadata
fn cmd_describe() -> Result<i32> {
    let descriptor = ServiceDescriptor::default();
    println!("Service name:  {}", descriptor.service_name);
    println!("Display name:  {}", descriptor.display_name);
    println!("Description:   {}", descriptor.description);
    Ok(0)
}

/// Write a sample configuration file
fn cmd_init_config(path: Option<PathBuf>, force: bool) -> Result<i32> {
    let path = match path {
        Some(path) => path,
        None => std::env::current_exe()
            .context("cannot locate executable")?
            .with_file_name(CONFIG_FILE_NAME),
    };

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists, use --force to overwrite",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    std::fs::write(&path, ServiceConfig::sample_config())
        .with_context(|| format!("cannot write {}", path.display()))?;

    println!("Wrote sample configuration to {}", path.display());
    Ok(0)
}

/// Install the Windows service
#[cfg(all(windows, feature = "service"))]
fn cmd_install(config: Option<&std::path::Path>, log: &LogHandle) -> Result<i32> {
    use std::ffi::OsString;

    let executable = std::env::current_exe()
        .context("cannot locate executable")?
        .with_file_name("random-arts-bot-service.exe");
    if !executable.exists() {
        anyhow::bail!("service binary not found at {}", executable.display());
    }

    let mut launch_arguments = Vec::new();
    if let Some(config) = config {
        let config = std::fs::canonicalize(config)
            .with_context(|| format!("cannot resolve {}", config.display()))?;
        launch_arguments.push(OsString::from("--config"));
        launch_arguments.push(config.into_os_string());
    }

    let descriptor = ServiceDescriptor::default();
    log.in_scope(|| {
        random_arts_bot::service::install_service(&descriptor, executable, launch_arguments)
    })?;
    log.in_scope(|| info!("Start it with: sc start {}", descriptor.service_name));
    Ok(0)
}

/// Uninstall the Windows service
#[cfg(all(windows, feature = "service"))]
fn cmd_uninstall(log: &LogHandle) -> Result<i32> {
    let descriptor = ServiceDescriptor::default();
    log.in_scope(|| random_arts_bot::service::uninstall_service(&descriptor))?;
    Ok(0)
}

#[cfg(not(all(windows, feature = "service")))]
fn cmd_install(_config: Option<&std::path::Path>, log: &LogHandle) -> Result<i32> {
    log.in_scope(|| info!("Service install requires Windows and the 'service' feature"));
    Ok(EXIT_HOST_FAILURE)
}

#[cfg(not(all(windows, feature = "service")))]
fn cmd_uninstall(log: &LogHandle) -> Result<i32> {
    log.in_scope(|| info!("Service uninstall requires Windows and the 'service' feature"));
    Ok(EXIT_HOST_FAILURE)
}
