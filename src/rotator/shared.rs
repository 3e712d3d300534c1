use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Mutex, MutexGuard, TryLockError};

use crossbeam::channel::{bounded, Receiver, Sender};

use crate::classify::FamilyId;
use crate::settings::Settings;

/// Per-family compression trigger state.
///
/// `terminal_fname` is captured when the trigger is raised and stays valid
/// until the worker picks it up: the terminal index is fixed by the settings,
/// and the worker excludes rotation for the whole cycle.
#[derive(Debug, Default)]
pub(crate) struct FamilyTrigger {
    pub pending: bool,
    pub terminal_fname: PathBuf,
}

/// Everything the observer and the compression worker share.
///
/// One value, owned by the [`Rotator`](crate::Rotator) handle and passed to
/// both threads behind an `Arc`; there are no process globals.
pub(crate) struct Shared {
    pub settings: Settings,

    /// Trigger flags, one slot per family. Guarded by its own short-lived
    /// lock so that raising and draining triggers never contends with the
    /// rotation lock.
    triggers: Mutex<Vec<FamilyTrigger>>,

    /// True from the moment the worker takes a trigger until it has finished
    /// cleanup and re-home. Read lock-free by the sentinel handler to choose
    /// between the rotation and the append path.
    pub compression_running: AtomicBool,

    /// Serializes every multi-file rename/remove on the generation chains:
    /// each rotation, and the worker's whole compression cycle.
    rotation_lock: Mutex<()>,

    /// Excludes the observer's dispatch from the worker's brief re-home
    /// window, which would otherwise race on `.log.0`.
    observer_gate: Mutex<()>,

    /// Counting wakeup signal for the worker, capacity = number of families.
    /// A full channel means enough wakeups are queued for the worker to see
    /// every pending flag; the flags themselves are authoritative.
    pub trigger_tx: Sender<()>,
    pub trigger_rx: Receiver<()>,

    /// Raised by the coordinator to interrupt the observer's wait loop.
    pub shutdown: AtomicBool,
}

impl Shared {
    pub fn new(settings: Settings) -> Self {
        let family_count = settings.families.len();
        let (trigger_tx, trigger_rx) = bounded(family_count);
        let mut triggers = Vec::with_capacity(family_count);
        triggers.resize_with(family_count, FamilyTrigger::default);
        Self {
            settings,
            triggers: Mutex::new(triggers),
            compression_running: AtomicBool::new(false),
            rotation_lock: Mutex::new(()),
            observer_gate: Mutex::new(()),
            trigger_tx,
            trigger_rx,
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn family_name(&self, family: FamilyId) -> &str {
        &self.settings.families[family.index()]
    }

    /// `<watch_dir>/<family>.log.<idx>`
    pub fn generation_path(&self, family: FamilyId, idx: u32) -> PathBuf {
        self.settings
            .watch_dir
            .join(format!("{}.log.{}", self.family_name(family), idx))
    }

    pub fn sentinel_path(&self, name: &str) -> PathBuf {
        self.settings.watch_dir.join(name)
    }

    // A poisoned lock means another thread panicked mid-operation; the
    // filesystem protocol below is re-entrant enough to carry on, so the
    // poison marker is ignored rather than propagated.

    pub fn lock_rotation(&self) -> MutexGuard<'_, ()> {
        self.rotation_lock
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    pub fn try_lock_rotation(&self) -> Option<MutexGuard<'_, ()>> {
        match self.rotation_lock.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(e)) => Some(e.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    pub fn lock_gate(&self) -> MutexGuard<'_, ()> {
        self.observer_gate
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    pub fn lock_triggers(&self) -> MutexGuard<'_, Vec<FamilyTrigger>> {
        self.triggers.lock().unwrap_or_else(|e| e.into_inner())
    }
}
