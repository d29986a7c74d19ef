//! The bot worker
//!
//! A [`Bot`] owns one background thread that runs a [`BotJob`] cycle every
//! interval until it is stopped. What a cycle does (generating and posting
//! art) lives behind the job; the default [`IdleJob`] only records that a
//! cycle happened.

use crate::error::BotError;
use crate::logging::LogHandle;
use crate::service::config::ServiceConfig;
use crate::service::ServiceRegistration;
use crate::worker::Worker;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One scheduled unit of bot work
pub trait BotJob: Send + 'static {
    /// Run cycle number `cycle` (starting at 1) for `handle`
    fn run_cycle(&mut self, handle: &str, cycle: u64) -> anyhow::Result<()>;
}

impl<F> BotJob for F
where
    F: FnMut(&str, u64) -> anyhow::Result<()> + Send + 'static,
{
    fn run_cycle(&mut self, handle: &str, cycle: u64) -> anyhow::Result<()> {
        self(handle, cycle)
    }
}

/// Job that does nothing but log
pub struct IdleJob;

impl BotJob for IdleJob {
    fn run_cycle(&mut self, handle: &str, cycle: u64) -> anyhow::Result<()> {
        debug!(handle, cycle, "No job configured, idling");
        Ok(())
    }
}

/// Running thread and the channel that stops it
struct BotThread {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Worker that runs scheduled cycles for one account handle
pub struct Bot {
    handle: String,
    interval: Duration,
    job: Option<Box<dyn BotJob>>,
    log: Option<LogHandle>,
    cycles: Arc<AtomicU64>,
    thread: Option<BotThread>,
}

impl Bot {
    /// Create a bot; nothing runs until [`Worker::start`]
    pub fn new(handle: impl Into<String>, interval: Duration) -> Self {
        Self {
            handle: handle.into(),
            interval,
            job: Some(Box::new(IdleJob)),
            log: None,
            cycles: Arc::new(AtomicU64::new(0)),
            thread: None,
        }
    }

    /// Replace the job run each cycle
    pub fn with_job(mut self, job: impl BotJob) -> Self {
        self.job = Some(Box::new(job));
        self
    }

    /// Log through `log` on the bot thread
    pub fn with_log(mut self, log: LogHandle) -> Self {
        self.log = Some(log);
        self
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of completed cycles, successful or not
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|t| !t.handle.is_finished())
            .unwrap_or(false)
    }
}

impl Worker for Bot {
    fn identity(&self) -> &str {
        &self.handle
    }

    fn start(&mut self) -> anyhow::Result<()> {
        if self.thread.is_some() {
            return Err(BotError::AlreadyRunning.into());
        }
        let Some(mut job) = self.job.take() else {
            anyhow::bail!("bot {} has already run and cannot be restarted", self.handle);
        };

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = self.handle.clone();
        let interval = self.interval;
        let cycles = self.cycles.clone();
        let log = self.log.clone();

        let thread_name = format!("bot-{}", self.handle.trim_start_matches('@'));
        let join = thread::Builder::new().name(thread_name).spawn(move || {
            let mut run = move || {
                info!(handle = %handle, interval_secs = interval.as_secs(), "Bot loop running");
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let cycle = cycles.fetch_add(1, Ordering::SeqCst) + 1;
                            if let Err(e) = job.run_cycle(&handle, cycle) {
                                warn!(handle = %handle, cycle, "Bot cycle failed: {:#}", e);
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!(handle = %handle, "Bot loop exited");
            };

            match log {
                Some(log) => log.in_scope(run),
                None => run(),
            }
        })?;

        self.thread = Some(BotThread {
            stop_tx,
            handle: join,
        });
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        let _ = thread.stop_tx.send(());
        thread
            .handle
            .join()
            .map_err(|_| anyhow::anyhow!("bot {} thread panicked", self.handle))
    }
}

impl Drop for Bot {
    fn drop(&mut self) {
        let _ = Worker::stop(self);
    }
}

/// Service registration for a bot built from `config`
pub fn bot_registration(config: &ServiceConfig, log: &LogHandle) -> ServiceRegistration<Bot> {
    let interval = config.cycle_interval();
    let bot_log = log.clone();

    ServiceRegistration::new(config.identity.clone(), move |identity: &str| {
        Ok(Bot::new(identity, interval).with_log(bot_log))
    })
    .with_stop_timeout(config.stop_timeout())
    .with_start_wait_hint(config.start_wait_hint())
}
