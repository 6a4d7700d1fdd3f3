use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use mockd_crypto::MockdCrypto;
use mockd_errors::{ServiceError, StoreError};
use parking_lot::RwLock;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::debounce::MutationEvent;
use super::{
    Alerts, ServerRuntime, Store, check_environments_duplicates, check_routes_duplicates,
    current_schema_version, migrate_collection, reconcile,
};
use crate::models::{Environment, EnvironmentsCollection, find_environment_index};

/// Store key of the environments collection.
pub const STORE_KEY: &str = "environments";

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub store_key: String,
    /// Quiet period before duplicates are recomputed.
    pub duplicates_window: Duration,
    /// Quiet period before the collection is written to the store.
    pub persist_window: Duration,
    /// Extra attempts after a failed write.
    pub persist_retries: u32,
    /// Linear backoff unit between write attempts.
    pub persist_backoff: Duration,
    pub event_capacity: usize,
    /// Passphrase the export checksum key is derived from.
    pub export_passphrase: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            store_key: STORE_KEY.into(),
            duplicates_window: Duration::from_millis(100),
            persist_window: Duration::from_millis(1000),
            persist_retries: 2,
            persist_backoff: Duration::from_millis(250),
            event_capacity: 1024,
            export_passphrase: "mockd-export".into(),
        }
    }
}

/// Outcome of the latest write, tagged with the last event it covers.
#[derive(Debug, Clone)]
pub struct PersistStatus {
    pub seq: u64,
    pub result: Result<(), Arc<StoreError>>,
}

impl Default for PersistStatus {
    fn default() -> Self {
        Self { seq: 0, result: Ok(()) }
    }
}

/// Handle on the deferred work a mutation scheduled.
#[derive(Debug, Clone)]
pub struct MutationReceipt {
    seq: u64,
    reconciled: watch::Receiver<u64>,
    persisted: watch::Receiver<PersistStatus>,
}

impl MutationReceipt {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Resolves once duplicate flags reflect this mutation.
    pub async fn reconciled(&self) -> Result<(), ServiceError> {
        let seq = self.seq;
        let mut rx = self.reconciled.clone();
        rx.wait_for(|done| *done >= seq)
            .await
            .map(|_| ())
            .map_err(|_| ServiceError::PipelineStopped)
    }

    /// Resolves once a snapshot including this mutation was written, or the
    /// write covering it failed for good.
    pub async fn persisted(&self) -> Result<(), ServiceError> {
        let seq = self.seq;
        let mut rx = self.persisted.clone();
        let result = {
            let status = rx
                .wait_for(|status| status.seq >= seq)
                .await
                .map_err(|_| ServiceError::PipelineStopped)?;
            status.result.clone()
        };
        result.map_err(ServiceError::PersistenceFailed)
    }
}

/// Value returned synchronously by a mutation plus its receipt.
#[derive(Debug)]
pub struct Mutation<T> {
    pub output: T,
    pub receipt: MutationReceipt,
}

/// Owner of the environments collection.
///
/// Mutations apply synchronously under a write lock and publish a
/// [`MutationEvent`]; two background consumers debounce those events to
/// recompute duplicates and persist the collection.
pub struct EnvironmentsService {
    pub(crate) environments: Arc<RwLock<EnvironmentsCollection>>,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) runtime: Arc<dyn ServerRuntime>,
    pub(crate) alerts: Arc<dyn Alerts>,
    pub(crate) crypto: MockdCrypto,
    config: ServiceConfig,
    sequence: AtomicU64,
    events: broadcast::Sender<MutationEvent>,
    reconciled: watch::Receiver<u64>,
    persisted: watch::Receiver<PersistStatus>,
    // channel to broadcast shutdown
    shutdown_tx: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl EnvironmentsService {
    /// Create an empty service and spawn its consumers. Must run inside a
    /// tokio runtime.
    pub fn start(
        config: ServiceConfig,
        store: Arc<dyn Store>,
        runtime: Arc<dyn ServerRuntime>,
        alerts: Arc<dyn Alerts>,
    ) -> Self {
        let environments = Arc::new(RwLock::new(EnvironmentsCollection::new()));
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (shutdown_tx, _) = broadcast::channel(1);
        let (reconciled_tx, reconciled) = watch::channel(0u64);
        let (persisted_tx, persisted) = watch::channel(PersistStatus::default());

        let duplicates = tokio::spawn(reconcile::duplicates_consumer(
            environments.clone(),
            events.subscribe(),
            shutdown_tx.subscribe(),
            config.duplicates_window,
            reconciled_tx,
        ));
        let persistence = tokio::spawn(reconcile::persistence_consumer(
            reconcile::PersistenceTask {
                environments: environments.clone(),
                store: store.clone(),
                key: config.store_key.clone(),
                retries: config.persist_retries,
                backoff: config.persist_backoff,
            },
            events.subscribe(),
            shutdown_tx.subscribe(),
            config.persist_window,
            persisted_tx,
        ));

        Self {
            environments,
            store,
            runtime,
            alerts,
            crypto: MockdCrypto::new(&config.export_passphrase),
            config,
            sequence: AtomicU64::new(0),
            events,
            reconciled,
            persisted,
            shutdown_tx,
            handles: Mutex::new(vec![duplicates, persistence]),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Replace the collection with the migrated content of the store.
    /// Returns how many environments were loaded.
    pub async fn load(&self) -> Result<Mutation<usize>, ServiceError> {
        let raws = self.store.get(&self.config.store_key).await?.unwrap_or_default();
        let mut loaded = migrate_collection(raws);
        for environment in loaded.iter_mut() {
            check_routes_duplicates(environment);
        }
        check_environments_duplicates(&mut loaded);

        let count = loaded.len();
        let mut environments = self.environments.write();
        *environments = loaded;
        let receipt = self.emit(None);
        drop(environments);
        info!(
            schema = current_schema_version(),
            "loaded {count} environments from store key {}", self.config.store_key
        );
        Ok(Mutation { output: count, receipt })
    }

    /// Publish a mutation event. Callers hold the collection write lock so
    /// sequence numbers follow the order mutations were applied in.
    pub(crate) fn emit(&self, environment: Option<Uuid>) -> MutationReceipt {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        if self.events.send(MutationEvent { seq, environment }).is_err() {
            warn!("no reconciliation consumer listening, event {seq} dropped");
        }
        MutationReceipt {
            seq,
            reconciled: self.reconciled.clone(),
            persisted: self.persisted.clone(),
        }
    }

    /// Schedule reconciliation after a change made outside the mutation API.
    pub fn notify_changed(&self, environment: Option<Uuid>) -> MutationReceipt {
        let _environments = self.environments.write();
        self.emit(environment)
    }

    /// Receiver of every mutation event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<MutationEvent> {
        self.events.subscribe()
    }

    /// Deep copy of the collection, including runtime state.
    pub fn snapshot(&self) -> EnvironmentsCollection {
        self.environments.read().clone()
    }

    pub fn len(&self) -> usize {
        self.environments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.read().is_empty()
    }

    pub fn environment(&self, uuid: &Uuid) -> Option<Environment> {
        self.environments.read().iter().find(|e| e.uuid == *uuid).cloned()
    }

    pub fn environment_at(&self, index: usize) -> Option<Environment> {
        self.environments.read().get(index).cloned()
    }

    pub fn find_environment_index(&self, uuid: &Uuid) -> Option<usize> {
        find_environment_index(&self.environments.read(), uuid)
    }

    /// `None` when either the environment or the route is unknown.
    pub fn find_route_index(&self, environment: &Uuid, route: &Uuid) -> Option<usize> {
        let environments = self.environments.read();
        environments
            .iter()
            .find(|e| e.uuid == *environment)
            .and_then(|e| e.find_route_index(route))
    }

    /// Flush pending work and stop both consumers.
    pub async fn shutdown(&self) {
        info!("environments service shutting down");
        // ignore errors if the consumers already exited
        let _ = self.shutdown_tx.send(());

        let mut handles = self.handles.lock().await;
        while let Some(h) = handles.pop() {
            if let Err(e) = h.await {
                error!("reconciliation task join error: {:?}", e);
            }
        }
        info!("environments service stopped");
    }
}
