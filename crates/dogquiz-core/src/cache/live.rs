//! Live queries over the record store
//!
//! A live query re-runs after every change event that touches one of its
//! tables and pushes the new result into a `watch` channel. The background
//! task ends when the last receiver is dropped.

use super::RecordStore;
use crate::error::StorageError;
use crate::event::Table;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

/// Start a live query; the receiver holds the current result immediately
///
/// Must be called from within a tokio runtime.
pub fn observe<T, F>(
    store: &Arc<RecordStore>,
    tables: &[Table],
    query: F,
) -> Result<watch::Receiver<T>, StorageError>
where
    T: Send + Sync + 'static,
    F: Fn(&RecordStore) -> Result<T, StorageError> + Send + 'static,
{
    // Subscribe before the first read so no write slips between them
    let mut events = store.events().subscribe();
    let initial = query(store.as_ref())?;
    let (tx, rx) = watch::channel(initial);

    let store = Arc::clone(store);
    let tables = tables.to_vec();

    tokio::spawn(async move {
        loop {
            let stale = tokio::select! {
                _ = tx.closed() => break,
                event = events.recv() => match event {
                    Ok(event) => tables.iter().any(|t| event.touches(*t)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Live query lagged, recomputing");
                        true
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };

            if !stale {
                continue;
            }

            match query(store.as_ref()) {
                Ok(value) => {
                    if tx.send(value).is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "Live query failed, keeping previous result"),
            }
        }
        debug!("Live query stopped");
    });

    Ok(rx)
}
