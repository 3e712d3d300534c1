//! The rotation engine: shifts a family's numbered generation chain and
//! raises compression triggers when the terminal index fills.

use std::fs;
use std::io::ErrorKind;
use std::sync::MutexGuard;

use log::{debug, error, warn};

use crate::classify::FamilyId;

use super::shared::Shared;

/// Shifts the generation chain of `family` one step up to make room at
/// index 0, and raises a compression trigger when a generation lands on the
/// terminal index.
///
/// A no-op when `.log.0` does not exist, since index 0 is then already free
/// for the incoming promotion. Renames run in descending index order so no
/// two files ever claim the same index. The caller proves it holds the
/// rotation lock by passing its guard.
pub(crate) fn shift_generations(
    shared: &Shared,
    family: FamilyId,
    _rotation: &MutexGuard<'_, ()>,
) {
    if !shared.generation_path(family, 0).exists() {
        return;
    }
    let max = shared.settings.max_files;

    // A surviving terminal generation can only be left over from a cycle
    // that never reached the worker (e.g. a crash before shutdown drain);
    // removing it keeps the chain free of duplicate indices.
    let terminal = shared.generation_path(family, max);
    match fs::remove_file(&terminal) {
        Ok(()) => warn!("removed stale terminal generation {:?}", terminal),
        Err(ref e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => error!("cannot remove {:?}: {}", terminal, e),
    }

    let mut promoted_to_terminal = false;
    for idx in (0..max).rev() {
        let from = shared.generation_path(family, idx);
        let to = shared.generation_path(family, idx + 1);
        match fs::rename(&from, &to) {
            Ok(()) => {
                debug!("rotated {:?} -> {:?}", from, to);
                if idx + 1 == max {
                    promoted_to_terminal = true;
                }
            }
            Err(ref e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => error!("rename {:?} -> {:?} failed: {}", from, to, e),
        }
    }

    if promoted_to_terminal {
        raise_trigger(shared, family, terminal);
    }
}

fn raise_trigger(shared: &Shared, family: FamilyId, terminal: std::path::PathBuf) {
    {
        let mut triggers = shared.lock_triggers();
        let slot = &mut triggers[family.index()];
        slot.pending = true;
        slot.terminal_fname = terminal;
    }
    // The channel is the wakeup, the flag is the work item: when the channel
    // is already full the worker has enough wakeups queued to find this flag.
    if shared.trigger_tx.try_send(()).is_ok() {
        debug!(
            "compression trigger raised for {}",
            shared.family_name(family)
        );
    }
}

/// Folds any `.log.0` that accumulated during a compression cycle back into
/// the chain by renaming it to `.log.1`, for every family.
///
/// Skipped for a family whose `.log.1` still exists: that chain was not
/// compressed this cycle and is already coherent with its `.log.0` as the
/// newest generation; renaming over `.log.1` would destroy it.
pub(crate) fn rehome_fresh_generations(shared: &Shared, _rotation: &MutexGuard<'_, ()>) {
    for idx in 0..shared.settings.families.len() {
        let family = FamilyId(idx);
        let log0 = shared.generation_path(family, 0);
        if !log0.exists() {
            continue;
        }
        let log1 = shared.generation_path(family, 1);
        if log1.exists() {
            debug!("leaving {:?} in place, {:?} exists", log0, log1);
            continue;
        }
        match fs::rename(&log0, &log1) {
            Ok(()) => debug!("re-homed {:?} -> {:?}", log0, log1),
            Err(ref e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => error!("rename {:?} -> {:?} failed: {}", log0, log1, e),
        }
    }
}
