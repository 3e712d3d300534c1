//! Consumes classified sentinel events: promotion + rotation in the normal
//! case, append when the compression worker owns the chain.

use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;

use log::{debug, error};

use crate::classify::FamilyId;

use super::shared::Shared;
use super::{append, chain};

/// Handles one sentinel arrival.
///
/// On return the sentinel no longer exists under its original name unless an
/// I/O error was logged, in which case the file remains and a later event
/// retries. Exactly one of two paths executes: the rotation path (shift the
/// chain, promote the sentinel to `.log.0`), or the append path (fold the
/// sentinel into the existing `.log.0`) while the worker is busy.
pub(crate) fn handle_sentinel(shared: &Shared, family: FamilyId, name: &str) {
    let sentinel = shared.sentinel_path(name);
    if !sentinel.exists() {
        // Routine for the moved-from half of our own promotion renames,
        // and covers producers retracting a file before we get to it.
        debug!("sentinel {:?} is already gone, dropping event", sentinel);
        return;
    }

    if shared.compression_running.load(Ordering::SeqCst) || trigger_pending(shared, family) {
        // The chain is either being compressed right now or queued for it;
        // either way its numbered files must not move.
        append_path(shared, family, &sentinel);
        return;
    }
    rotation_path(shared, family, &sentinel);
}

/// A family whose trigger has been raised but not yet picked up still owns a
/// terminal generation that the worker expects to archive; rotating now
/// would evict it.
fn trigger_pending(shared: &Shared, family: FamilyId) -> bool {
    shared.lock_triggers()[family.index()].pending
}

fn rotation_path(shared: &Shared, family: FamilyId, sentinel: &Path) {
    match shared.try_lock_rotation() {
        Some(rotation) => {
            chain::shift_generations(shared, family, &rotation);
            let log0 = shared.generation_path(family, 0);
            match fs::rename(sentinel, &log0) {
                Ok(()) => debug!("promoted {:?} to {:?}", sentinel, log0),
                Err(e) => error!("rename {:?} -> {:?} failed: {}", sentinel, log0, e),
            }
        }
        None => {
            // The worker entered a cycle between our flag read and now; fall
            // back to the strategy its re-home step expects.
            append_path(shared, family, sentinel);
        }
    }
}

fn append_path(shared: &Shared, family: FamilyId, sentinel: &Path) {
    let log0 = shared.generation_path(family, 0);
    if !log0.exists() {
        match fs::rename(sentinel, &log0) {
            Ok(()) => debug!("created {:?} from {:?}", log0, sentinel),
            Err(e) => error!("rename {:?} -> {:?} failed: {}", sentinel, log0, e),
        }
        return;
    }
    if let Err(e) = append::fold_sentinel_into(sentinel, &log0) {
        error!("append of {:?} onto {:?} failed: {}", sentinel, log0, e);
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::Ordering;

    use crate::classify::FamilyId;
    use crate::settings::Settings;

    use super::super::shared::Shared;
    use super::handle_sentinel;

    const FAMILY: FamilyId = FamilyId(0);

    fn shared_in(dir: &Path) -> Shared {
        Shared::new(Settings::new(dir, vec!["trc".to_owned()]).max_files(3))
    }

    fn drop_sentinel(dir: &Path, name: &str, bytes: &[u8]) {
        fs::write(dir.join(name), bytes).unwrap();
    }

    #[test]
    fn first_sentinel_becomes_log0() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared_in(dir.path());
        drop_sentinel(dir.path(), "trc.111.bak", b"alpha");

        handle_sentinel(&shared, FAMILY, "trc.111.bak");

        assert!(!dir.path().join("trc.111.bak").exists());
        assert_eq!(fs::read(dir.path().join("trc.log.0")).unwrap(), b"alpha");
        assert!(!dir.path().join("trc.log.1").exists());
        assert!(shared.trigger_rx.is_empty());
    }

    #[test]
    fn successive_sentinels_build_a_chain() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared_in(dir.path());
        for (name, bytes) in &[("trc.1.bak", b"a"), ("trc.2.bak", b"b"), ("trc.3.bak", b"c")] {
            drop_sentinel(dir.path(), name, *bytes);
            handle_sentinel(&shared, FAMILY, name);
        }

        assert_eq!(fs::read(dir.path().join("trc.log.0")).unwrap(), b"c");
        assert_eq!(fs::read(dir.path().join("trc.log.1")).unwrap(), b"b");
        assert_eq!(fs::read(dir.path().join("trc.log.2")).unwrap(), b"a");
        assert!(shared.trigger_rx.is_empty());
    }

    #[test]
    fn fourth_sentinel_fills_terminal_and_triggers() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared_in(dir.path());
        for name in &["trc.1.bak", "trc.2.bak", "trc.3.bak", "trc.4.bak"] {
            drop_sentinel(dir.path(), name, name.as_bytes());
            handle_sentinel(&shared, FAMILY, name);
        }

        assert_eq!(fs::read(dir.path().join("trc.log.3")).unwrap(), b"trc.1.bak");
        assert!(shared.trigger_rx.try_recv().is_ok());
        assert!(shared.lock_triggers()[0].pending);
    }

    #[test]
    fn pending_trigger_diverts_to_append() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared_in(dir.path());
        for name in &["trc.1.bak", "trc.2.bak", "trc.3.bak", "trc.4.bak"] {
            drop_sentinel(dir.path(), name, name.as_bytes());
            handle_sentinel(&shared, FAMILY, name);
        }
        // Trigger is pending but the worker has not picked it up yet; the
        // next sentinel must leave the numbered files alone.
        drop_sentinel(dir.path(), "trc.5.bak", b"|five");
        handle_sentinel(&shared, FAMILY, "trc.5.bak");

        assert_eq!(
            fs::read(dir.path().join("trc.log.0")).unwrap(),
            b"trc.4.bak|five"
        );
        assert_eq!(fs::read(dir.path().join("trc.log.3")).unwrap(), b"trc.1.bak");
    }

    #[test]
    fn compression_running_diverts_to_append() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared_in(dir.path());
        fs::write(dir.path().join("trc.log.0"), b"base").unwrap();
        shared.compression_running.store(true, Ordering::SeqCst);

        drop_sentinel(dir.path(), "trc.9.bak", b"+more");
        handle_sentinel(&shared, FAMILY, "trc.9.bak");

        assert_eq!(fs::read(dir.path().join("trc.log.0")).unwrap(), b"base+more");
        assert!(!dir.path().join("trc.log.1").exists());
    }

    #[test]
    fn compression_running_without_log0_renames() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared_in(dir.path());
        shared.compression_running.store(true, Ordering::SeqCst);

        drop_sentinel(dir.path(), "trc.9.bak", b"fresh");
        handle_sentinel(&shared, FAMILY, "trc.9.bak");

        assert_eq!(fs::read(dir.path().join("trc.log.0")).unwrap(), b"fresh");
    }

    #[test]
    fn missing_sentinel_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared_in(dir.path());

        handle_sentinel(&shared, FAMILY, "trc.404.bak");

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
