//! Logging setup
//!
//! Logging is carried by an explicit [`LogHandle`] that owns a `tracing`
//! dispatcher. The adapter and the bot log through the handle they were
//! given rather than through whatever global subscriber happens to be set.
//! [`LogHandle::init`] additionally installs its dispatcher as the process
//! default exactly once, so library code logging through plain macros is not
//! lost.

use crate::error::BotError;
use std::path::PathBuf;
#[cfg(test)]
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::level_filters::LevelFilter;
use tracing::{warn, Dispatch};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Logger settings
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive (trace, debug, info, warn, error or a full EnvFilter string)
    pub level: String,
    /// Log file path (None = stderr)
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Handle to a configured logger
#[derive(Clone)]
pub struct LogHandle {
    #[cfg(test)]
    id: u64,
    dispatch: Dispatch,
    fallback: Option<String>,
}

static INSTALLED: OnceLock<LogHandle> = OnceLock::new();
#[cfg(test)]
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl LogHandle {
    /// Initialize process logging
    ///
    /// Never fails: problems with the requested configuration fall back to
    /// stderr at `info` and are reported through the returned handle's
    /// [`LogHandle::fallback_error`], which the caller logs. Only the
    /// first call builds a logger; later calls, from any thread, get a clone
    /// of that same handle.
    pub fn init(config: &LogConfig) -> LogHandle {
        INSTALLED
            .get_or_init(|| {
                let handle = Self::build(config);
                if tracing::dispatcher::set_global_default(handle.dispatch.clone()).is_err() {
                    handle.in_scope(|| warn!("A global logger was already set, keeping it"));
                }
                handle
            })
            .clone()
    }

    /// Build a handle without installing it process-wide
    pub fn build(config: &LogConfig) -> LogHandle {
        let mut problems = Vec::new();

        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| level_filter(&config.level))
            .unwrap_or_else(|reason| {
                problems.push(reason);
                EnvFilter::new("info")
            });

        if let Some(path) = &config.file {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path);

            match file {
                Ok(file) if problems.is_empty() => {
                    return Self::new(dispatch_for(filter, Arc::new(file), false), None);
                }
                Ok(file) => {
                    return Self::new(
                        dispatch_for(filter, Arc::new(file), false),
                        Some(problems.join("; ")),
                    );
                }
                Err(e) => {
                    problems.push(format!("cannot open log file {:?}: {}", path, e));
                }
            }
        }

        let fallback = if problems.is_empty() {
            None
        } else {
            Some(problems.join("; "))
        };
        Self::new(dispatch_for(filter, std::io::stderr, true), fallback)
    }

    /// Build a handle writing to an arbitrary sink
    ///
    /// The level is taken as given; `RUST_LOG` is not consulted. An unusable
    /// level falls back to `info` like [`LogHandle::build`] does.
    pub fn with_writer<W>(level: &str, writer: W) -> LogHandle
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        match level_filter(level) {
            Ok(filter) => Self::new(dispatch_for(filter, writer, false), None),
            Err(reason) => Self::new(
                dispatch_for(EnvFilter::new("info"), writer, false),
                Some(reason),
            ),
        }
    }

    fn new(dispatch: Dispatch, fallback: Option<String>) -> Self {
        Self {
            #[cfg(test)]
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            dispatch,
            fallback,
        }
    }

    /// Run `f` with this handle as the active logger on the current thread
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Log an informational message
    pub fn info(&self, message: &str) {
        self.in_scope(|| tracing::info!("{}", message));
    }

    /// Why the requested configuration was not used, if it wasn't
    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    /// The fallback as an error, for callers deciding whether to go on
    pub fn fallback_error(&self) -> Option<BotError> {
        self.fallback
            .as_ref()
            .map(|reason| BotError::LoggingInit(reason.clone()))
    }
}

impl std::fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogHandle")
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

/// Parse a level or directive list, rejecting directives without a level
///
/// `EnvFilter` reads a bare word such as `infoo` as a target name, which
/// would silently filter out every ordinary event.
fn level_filter(level: &str) -> Result<EnvFilter, String> {
    let directives: Vec<&str> = level
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .collect();
    let has_level = |directive: &&str| {
        let level_part = directive.rsplit_once('=').map_or(*directive, |(_, l)| l);
        level_part.parse::<LevelFilter>().is_ok()
    };
    if directives.is_empty() || !directives.iter().all(has_level) {
        return Err(format!("unknown log level '{}'", level));
    }

    EnvFilter::try_new(level).map_err(|e| format!("invalid log level '{}': {}", level, e))
}

fn dispatch_for<W>(filter: EnvFilter, writer: W, ansi: bool) -> Dispatch
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(false),
    );
    Dispatch::new(subscriber)
}

#[cfg(test)]
pub(crate) mod test_support {
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;
    use tracing_subscriber::fmt::MakeWriter;

    /// In-memory log sink shared between a handle and the test
    #[derive(Clone, Default)]
    pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }

        pub fn count(&self, needle: &str) -> usize {
            self.contents().matches(needle).count()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }
}
