use std::sync::Arc;
use std::time::Duration;

use mockd_errors::StoreError;
use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, warn};

use super::debounce::{Burst, MutationEvent, Next, next_burst};
use super::service::PersistStatus;
use super::{Store, check_environments_duplicates, check_routes_duplicates};
use crate::models::{EnvironmentsCollection, sanitize};

/// Recompute route duplicates of every touched environment, then port
/// duplicates of the whole collection.
pub(crate) fn reconcile_duplicates(environments: &RwLock<EnvironmentsCollection>, burst: &Burst) {
    let mut environments = environments.write();
    let mut recomputed = 0;
    for environment in environments.iter_mut() {
        if burst.lagged || burst.environments.contains(&environment.uuid) {
            check_routes_duplicates(environment);
            recomputed += 1;
        }
    }
    check_environments_duplicates(&mut environments);
    debug!(
        "duplicates recomputed after {} events (seq {}, {} environments)",
        burst.events, burst.last_seq, recomputed
    );
}

pub(crate) async fn duplicates_consumer(
    environments: Arc<RwLock<EnvironmentsCollection>>,
    mut events: broadcast::Receiver<MutationEvent>,
    mut shutdown: broadcast::Receiver<()>,
    window: Duration,
    reconciled: watch::Sender<u64>,
) {
    loop {
        let (burst, stop) = match next_burst("duplicates", &mut events, &mut shutdown, window).await {
            Next::Fire(burst) => (burst, false),
            Next::FireAndStop(burst) => (burst, true),
            Next::Stop => break,
        };
        reconcile_duplicates(&environments, &burst);
        reconciled.send_modify(|done| *done = (*done).max(burst.last_seq));
        if stop {
            break;
        }
    }
    debug!("duplicates consumer stopped");
}

pub(crate) struct PersistenceTask {
    pub environments: Arc<RwLock<EnvironmentsCollection>>,
    pub store: Arc<dyn Store>,
    pub key: String,
    pub retries: u32,
    pub backoff: Duration,
}

impl PersistenceTask {
    /// Write a sanitized snapshot, retrying with linear backoff.
    pub(crate) async fn write_snapshot(&self) -> Result<(), Arc<StoreError>> {
        let snapshot = sanitize(&self.environments.read());
        let mut attempt = 0;
        loop {
            match self.store.set(&self.key, &snapshot).await {
                Ok(()) => {
                    debug!("persisted {} environments under {}", snapshot.len(), self.key);
                    return Ok(());
                }
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!("persisting environments failed (attempt {attempt}): {e}");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(e) => {
                    error!("persisting environments failed after {} attempts: {e}", attempt + 1);
                    return Err(Arc::new(e));
                }
            }
        }
    }
}

pub(crate) async fn persistence_consumer(
    task: PersistenceTask,
    mut events: broadcast::Receiver<MutationEvent>,
    mut shutdown: broadcast::Receiver<()>,
    window: Duration,
    persisted: watch::Sender<PersistStatus>,
) {
    loop {
        let (burst, stop) = match next_burst("persistence", &mut events, &mut shutdown, window).await {
            Next::Fire(burst) => (burst, false),
            Next::FireAndStop(burst) => (burst, true),
            Next::Stop => break,
        };
        let result = task.write_snapshot().await;
        persisted.send_modify(|status| {
            if burst.last_seq >= status.seq {
                *status = PersistStatus {
                    seq: burst.last_seq,
                    result,
                };
            }
        });
        if stop {
            break;
        }
    }
    debug!("persistence consumer stopped");
}
