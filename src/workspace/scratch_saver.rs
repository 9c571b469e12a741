//! ScratchSaver - debounced background persistence of temp projects
//!
//! Receives save signals over a channel and coalesces every signal inside the
//! debounce window into one write, so lifecycle operations never wait on disk.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info};

use crate::host::{ScratchRecord, ScratchStore};
use crate::workspace::state::ProjectStore;

/// Start the saver actor and return the sender used to request a save.
///
/// Each `()` sent means "temp projects may have changed". Signals arriving
/// inside the debounce window restart the timer, so a burst of mutations costs
/// one write. The write itself goes through the `ScratchStore`, which does its
/// file I/O off the runtime threads.
///
/// When the channel closes during a debounce window the pending save is still
/// performed. A closed channel with nothing pending exits without writing.
pub fn spawn_scratch_saver(
    store: Arc<RwLock<ProjectStore>>,
    scratch: Arc<dyn ScratchStore>,
    debounce: Duration,
) -> mpsc::Sender<()> {
    let (tx, mut rx) = mpsc::channel::<()>(32);

    tokio::spawn(async move {
        loop {
            // wait for the first signal of a burst
            if rx.recv().await.is_none() {
                info!("ScratchSaver: channel closed");
                return;
            }

            // debounce window
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(debounce) => {
                        // quiet for a full window
                        break;
                    }
                    result = rx.recv() => {
                        match result {
                            Some(()) => {
                                // restart the timer
                                continue;
                            }
                            None => {
                                // owner dropped mid-window: flush what it asked for
                                do_save(&store, scratch.as_ref()).await;
                                info!("ScratchSaver: channel closed during debounce, final save done");
                                return;
                            }
                        }
                    }
                }
            }

            do_save(&store, scratch.as_ref()).await;
        }
    });

    tx
}

/// Snapshot temp entries under a short read lock, then write.
///
/// The lock is released before the write, so mutations are never blocked on
/// disk. A failed write is logged; the next signal retries with fresh state.
async fn do_save(store: &Arc<RwLock<ProjectStore>>, scratch: &dyn ScratchStore) {
    // only temp entries are persisted; committed ones live in the workspace
    let records: Vec<ScratchRecord> = {
        let store = store.read().await;
        store
            .list_temp()
            .into_iter()
            .map(|e| ScratchRecord {
                file_path: e.file_path,
                project_type: e.project_type,
            })
            .collect()
    };

    let count = records.len();
    match scratch.save_scratch_project_list(records).await {
        Ok(()) => debug!(projects = count, "ScratchSaver: scratch list saved"),
        Err(e) => error!("ScratchSaver: failed to write scratch list: {}", e),
    }
}
