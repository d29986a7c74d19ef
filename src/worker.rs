//! Worker capability driven by the service lifecycle

/// A long-lived unit of background work bound to one identity
///
/// The service adapter constructs one worker per process, calls [`start`]
/// once and [`stop`] once. Implementations must:
///
/// - return from `start` quickly, handing long-running work to their own
///   threads
/// - block in `stop` until their background work has quiesced
/// - accept `stop` without a preceding `start`, and repeated `stop` calls
///
/// [`start`]: Worker::start
/// [`stop`]: Worker::stop
pub trait Worker: Send + 'static {
    /// Identity this worker was constructed for (e.g. an account handle)
    fn identity(&self) -> &str;

    /// Begin background activity
    fn start(&mut self) -> anyhow::Result<()>;

    /// Halt background activity and wait for it to finish
    fn stop(&mut self) -> anyhow::Result<()>;
}

impl<W: Worker + ?Sized> Worker for Box<W> {
    fn identity(&self) -> &str {
        (**self).identity()
    }

    fn start(&mut self) -> anyhow::Result<()> {
        (**self).start()
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        (**self).stop()
    }
}
