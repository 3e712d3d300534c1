use thiserror::Error;

/// All failure modes surfaced by the public API.
///
/// Errors that arise inside the long-running worker threads are not returned
/// anywhere; they are logged and absorbed according to the recovery policy of
/// the affected step (see the module docs of [`crate::rotator`]).
#[derive(Debug, Error)]
pub enum RotatorError {
    /// The settings were rejected before any thread was spawned.
    #[error("invalid settings: {0}")]
    Settings(String),

    /// The directory watch could not be established.
    #[error("directory watch failed: {0}")]
    Watch(#[from] notify::Error),

    /// Plumbing I/O failure.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// The archive timestamp could not be formatted.
    #[error("timestamp formatting failed: {0}")]
    Stamp(#[from] time::error::Format),

    /// A worker thread terminated before signalling readiness.
    #[error("worker thread failed to initialize")]
    WorkerInit,
}
