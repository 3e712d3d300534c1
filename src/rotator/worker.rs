//! The single compression worker.

use std::mem;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use crossbeam::channel::Receiver;
use crossbeam::select;
use log::{debug, error, info};

use crate::classify::FamilyId;

use super::shared::Shared;
use super::{archive, chain};

/// Waits for compression triggers and runs one archive cycle per wakeup
/// until told to stop.
pub(crate) fn worker_loop(shared: &Shared, stop: &Receiver<()>) {
    // The one retained archive per family, replaced on every successful
    // cycle.
    let mut current_archives: Vec<Option<PathBuf>> = vec![None; shared.settings.families.len()];

    loop {
        select! {
            recv(shared.trigger_rx) -> msg => {
                if msg.is_err() {
                    break;
                }
                run_cycle(shared, &mut current_archives);
            }
            recv(stop) -> _ => break,
        }
    }
    info!("compression worker stopped");
}

/// One full compression cycle: pick a pending family, archive its aged
/// generations, retire what the archive replaced, re-home `.log.0`.
fn run_cycle(shared: &Shared, current_archives: &mut [Option<PathBuf>]) {
    // The whole cycle excludes rotation; sentinel intake continues on the
    // append path while the flag is up. The trigger is claimed only under
    // this lock: until then the pending flag keeps the sentinel handler off
    // the family's chain, so the terminal generation cannot be rotated away
    // between trigger and pickup.
    let rotation = shared.lock_rotation();

    let (family, terminal) = {
        let mut triggers = shared.lock_triggers();
        match triggers.iter_mut().enumerate().find(|(_, slot)| slot.pending) {
            Some((idx, slot)) => {
                slot.pending = false;
                (FamilyId(idx), mem::take(&mut slot.terminal_fname))
            }
            None => {
                // Coalesced triggers: an earlier wakeup already served this
                // one.
                debug!("worker woke with no pending trigger");
                return;
            }
        }
    };
    debug!("compression cycle triggered by {:?}", terminal);

    shared.compression_running.store(true, Ordering::SeqCst);

    match archive::archive_generations(shared, family) {
        Ok(Some(new_archive)) => {
            let slot = &mut current_archives[family.index()];
            if shared.settings.delete_obsolete_archives {
                if let Some(prior) = slot.take() {
                    // Two cycles within one second resolve to the same name;
                    // the rename already replaced the file then.
                    if prior != new_archive {
                        archive::retire_prior_archive(&prior);
                    }
                }
            }
            *slot = Some(new_archive);
            if shared.settings.delete_obsolete_logs {
                archive::retire_generations(shared, family);
            }
        }
        Ok(None) => {}
        Err(e) => {
            // Originals and the prior archive stay put; the next full
            // rotation cycle raises a fresh trigger and retries.
            error!("archiving {} failed: {}", shared.family_name(family), e);
        }
    }

    {
        let _gate = shared.lock_gate();
        chain::rehome_fresh_generations(shared, &rotation);
    }

    shared.compression_running.store(false, Ordering::SeqCst);
    drop(rotation);
}
