//! The sentinel observer: sole ingress for directory events.

use std::sync::atomic::Ordering;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use log::{debug, error, info};
use notify::op::Op;
use notify::RawEvent;

use crate::classify::{classify, Classification};

use super::handler;
use super::shared::Shared;

/// How often the blocking event read wakes to check for shutdown.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Reads raw watch events until shutdown and routes sentinels to the
/// handler.
///
/// Dispatch happens under the observer gate so the worker's re-home window
/// can never interleave with an in-progress sentinel handling. The caller
/// owns the watch handle and keeps it alive for exactly as long as this loop
/// runs.
pub(crate) fn observer_loop(shared: &Shared, events: &Receiver<RawEvent>) {
    while !shared.shutdown.load(Ordering::SeqCst) {
        let event = match events.recv_timeout(SHUTDOWN_POLL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                error!("directory watch lost, observer exiting");
                break;
            }
        };

        let (path, op) = match (event.path, event.op) {
            (Some(path), Ok(op)) => (path, op),
            (_, Err(e)) => {
                error!("watch event error: {}", e);
                continue;
            }
            _ => continue,
        };
        // Only freshly created files and files moved into the directory can
        // be sentinels.
        if !op.intersects(Op::CREATE | Op::RENAME) {
            continue;
        }
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_owned(),
            None => continue,
        };

        match classify(&name, &shared.settings.families) {
            Classification::Sentinel(family) => {
                debug!("sentinel event: {}", name);
                let _gate = shared.lock_gate();
                handler::handle_sentinel(shared, family, &name);
            }
            Classification::Ignore => {}
        }
    }
    info!("observer stopped");
}
