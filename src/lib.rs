//! random-arts-bot - Random Arts Bot service shell
//!
//! Runs the bot worker as a foreground console process or as a Windows
//! service, wiring service-manager start/stop events to the worker.

pub mod bot;
pub mod config;
pub mod error;
pub mod logging;
pub mod service;
pub mod worker;

pub use error::{BotError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
