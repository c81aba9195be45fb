//! Manager-side engine wiring: registry, conflation manager, worker pool,
//! statistics timer and inbound consumer under one shutdown signal.

use hubsync_types::{ConfigError, ManagerConfig, StatisticsSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::conflation::{BundleRegistry, ConflationManager};
use crate::dispatcher::WorkerPool;
use crate::error::EngineResult;
use crate::handlers::register_default_handlers;
use crate::statistics::Statistics;
use crate::storage::StatusStore;
use crate::transport::{run_consumer, BundleReceiver};

const DEFAULT_WORKER_POOL_SIZE: usize = 10;
const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for [`SyncEngine`].
pub struct SyncEngineBuilder {
    registry: BundleRegistry,
    store: Option<Arc<dyn StatusStore>>,
    worker_pool_size: usize,
    handler_timeout: Duration,
    statistics_interval: Option<Duration>,
}

impl Default for SyncEngineBuilder {
    fn default() -> Self {
        Self {
            registry: BundleRegistry::new(),
            store: None,
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
            statistics_interval: None,
        }
    }
}

impl SyncEngineBuilder {
    pub fn registry(mut self, registry: BundleRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register the built-in bundle kinds.
    pub fn with_default_handlers(mut self) -> Result<Self, ConfigError> {
        register_default_handlers(&mut self.registry)?;
        Ok(self)
    }

    pub fn store(mut self, store: Arc<dyn StatusStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size;
        self
    }

    pub fn handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Snapshot log period; `None` disables the timer.
    pub fn statistics_interval(mut self, interval: Option<Duration>) -> Self {
        self.statistics_interval = interval;
        self
    }

    pub fn build(self) -> EngineResult<SyncEngine> {
        if self.registry.is_empty() {
            return Err(ConfigError::MissingRegistration {
                message: "no bundle type registered".to_string(),
            }
            .into());
        }
        let Some(store) = self.store else {
            return Err(ConfigError::validation("store", "no status store configured").into());
        };
        if self.worker_pool_size == 0 {
            return Err(ConfigError::validation("worker_pool_size", "must be at least 1").into());
        }

        let statistics =
            Arc::new(Statistics::new(self.registry.bundle_types(), self.statistics_interval));
        let manager = Arc::new(ConflationManager::new(self.registry, Arc::clone(&statistics)));
        let pool =
            WorkerPool::new(Arc::clone(&manager), store, self.worker_pool_size, self.handler_timeout);
        let (shutdown_tx, _) = watch::channel(false);

        Ok(SyncEngine { manager, pool, statistics, shutdown_tx, tasks: Vec::new() })
    }
}

/// Running (or ready to run) manager engine.
pub struct SyncEngine {
    manager: Arc<ConflationManager>,
    pool: WorkerPool,
    statistics: Arc<Statistics>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncEngine {
    pub fn builder() -> SyncEngineBuilder {
        SyncEngineBuilder::default()
    }

    /// Engine with the built-in handlers, sized from `config`.
    pub fn from_config(config: &ManagerConfig, store: Arc<dyn StatusStore>) -> EngineResult<Self> {
        config.validate()?;
        Self::builder()
            .with_default_handlers()?
            .store(store)
            .worker_pool_size(config.worker_pool_size)
            .handler_timeout(config.handler_timeout())
            .statistics_interval(config.statistics_interval()?)
            .build()
    }

    pub fn manager(&self) -> &Arc<ConflationManager> {
        &self.manager
    }

    pub fn statistics(&self) -> &Arc<Statistics> {
        &self.statistics
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        self.statistics.snapshot()
    }

    /// Receiver that flips to `true` when the engine shuts down.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Spawn workers, the statistics timer and a consumer draining `receiver`.
    pub fn start<R>(&mut self, receiver: R)
    where
        R: BundleReceiver + 'static,
    {
        let shutdown_rx = self.shutdown_tx.subscribe();

        self.tasks.extend(self.pool.start(&shutdown_rx));
        if let Some(timer) = self.statistics.start(shutdown_rx.clone()) {
            self.tasks.push(timer);
        }
        self.tasks.push(tokio::spawn(run_consumer(Arc::clone(&self.manager), receiver, shutdown_rx)));

        tracing::info!(
            "Sync engine started: {} bundle types, {} workers",
            self.manager.registry().len(),
            self.pool.size()
        );
    }

    /// Signal every task to stop and wait for them. In-flight handler calls
    /// finish (bounded by the handler deadline) before their worker exits.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            if let Err(err) = task.await {
                tracing::warn!("Engine task ended abnormally: {}", err);
            }
        }
        tracing::info!("Sync engine stopped");
    }
}
