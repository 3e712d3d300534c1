//! Lifecycle of the two long-running workers and the state they share.
//!
//! The observer thread owns the directory watch and is the only ingress for
//! sentinel events; the compression worker drains triggers raised by the
//! rotation engine. Both run until [`Rotator::shutdown`] (or drop) stops
//! them: the observer is interrupted at its blocking read, pending triggers
//! are drained under a bounded deadline, then the worker is interrupted at
//! its wait.

mod append;
mod archive;
mod chain;
mod handler;
mod observer;
mod shared;
mod worker;

use std::sync::atomic::Ordering;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, Sender};
use log::{info, warn};
use notify::{raw_watcher, RecursiveMode, Watcher};

use crate::error::RotatorError;
use crate::settings::Settings;

use self::shared::Shared;

/// How long shutdown waits for queued compression triggers to drain.
const DRAIN_DEADLINE: Duration = Duration::from_secs(5);

/// Handle to a running rotation daemon.
///
/// Created with [`Rotator::start`]; dropping the handle shuts the daemon
/// down in an orderly fashion.
pub struct Rotator {
    shared: Arc<Shared>,
    observer: Option<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
    worker_stop: Sender<()>,
}

impl Rotator {
    /// Validates `settings`, spawns the observer and the compression worker,
    /// and returns once both are up and the directory watch is established.
    ///
    /// # Errors
    ///
    /// `RotatorError::Settings` when validation fails,
    /// `RotatorError::Watch` when the watch cannot be established,
    /// `RotatorError::Io` / `RotatorError::WorkerInit` when a thread cannot
    /// be spawned.
    pub fn start(settings: Settings) -> Result<Self, RotatorError> {
        settings.validate()?;
        let shared = Arc::new(Shared::new(settings));

        let observer = spawn_observer(&shared)?;

        let (worker_stop, worker_stop_rx) = bounded::<()>(1);
        let (ready_tx, ready_rx) = mpsc::channel();
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("bakrotd-zipper".to_owned())
            .spawn(move || {
                ready_tx.send(()).ok();
                worker::worker_loop(&worker_shared, &worker_stop_rx);
            });
        let worker = match worker {
            Ok(handle) => handle,
            Err(e) => {
                stop_observer(&shared, observer);
                return Err(e.into());
            }
        };
        if ready_rx.recv().is_err() {
            stop_observer(&shared, observer);
            return Err(RotatorError::WorkerInit);
        }

        info!(
            "ready: watching {:?} for families {:?}",
            shared.settings.watch_dir, shared.settings.families
        );
        Ok(Self {
            shared,
            observer: Some(observer),
            worker: Some(worker),
            worker_stop,
        })
    }

    /// Stops both workers and waits for them.
    ///
    /// Pending compression triggers are given [`DRAIN_DEADLINE`] to finish;
    /// whatever is still queued afterwards is abandoned with a warning.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.observer.is_none() && self.worker.is_none() {
            return;
        }

        self.shared.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.observer.take() {
            handle.join().ok();
        }

        let deadline = Instant::now() + DRAIN_DEADLINE;
        while self.has_pending_triggers() {
            if Instant::now() >= deadline {
                warn!("shutdown deadline reached with compression triggers still pending");
                break;
            }
            thread::sleep(Duration::from_millis(50));
        }

        self.worker_stop.send(()).ok();
        if let Some(handle) = self.worker.take() {
            handle.join().ok();
        }
        info!("shut down");
    }

    fn has_pending_triggers(&self) -> bool {
        !self.shared.trigger_rx.is_empty()
            || self.shared.lock_triggers().iter().any(|slot| slot.pending)
    }
}

impl Drop for Rotator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawns the observer thread and waits until its watch is established.
///
/// The watch handle lives on the observer's stack so it is torn down exactly
/// when the loop exits.
fn spawn_observer(shared: &Arc<Shared>) -> Result<JoinHandle<()>, RotatorError> {
    let (ready_tx, ready_rx) = mpsc::channel();
    let observer_shared = Arc::clone(shared);
    let handle = thread::Builder::new()
        .name("bakrotd-observer".to_owned())
        .spawn(move || {
            let (event_tx, event_rx) = mpsc::channel();
            let mut watcher = match raw_watcher(event_tx) {
                Ok(watcher) => watcher,
                Err(e) => {
                    ready_tx.send(Err(RotatorError::Watch(e))).ok();
                    return;
                }
            };
            if let Err(e) = watcher.watch(
                &observer_shared.settings.watch_dir,
                RecursiveMode::NonRecursive,
            ) {
                ready_tx.send(Err(RotatorError::Watch(e))).ok();
                return;
            }
            ready_tx.send(Ok(())).ok();
            observer::observer_loop(&observer_shared, &event_rx);
        })?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(e)) => {
            handle.join().ok();
            Err(e)
        }
        Err(_) => {
            handle.join().ok();
            Err(RotatorError::WorkerInit)
        }
    }
}

fn stop_observer(shared: &Shared, handle: JoinHandle<()>) {
    shared.shutdown.store(true, Ordering::SeqCst);
    handle.join().ok();
}
