//! Shared, lock-serialized router handle
//!
//! [`Router`] mutates its table on every call, so concurrent callers go
//! through [`SharedRouter`], which serializes all operations (including
//! export and import) behind one async mutex and optionally mirrors the
//! table into a [`QTableStore`]. Store writes happen while the lock is held,
//! so the stored rows always follow the order of in-memory changes.
//!
//! With write-through on (`persist_on_update` plus a store), the store holds
//! exactly the states the table holds that have been updated: updated states
//! are upserted and evicted states are deleted.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::backend::Backend;
use super::codec::{ImportReport, PersistedEntry, PersistedTable};
use super::encoder;
use super::router::{Router, RouterConfig};
use super::store::QTableStore;
use super::types::{Route, RouteDecision, RouterStats};
use crate::config::Config;
use crate::error::Result;

/// Cloneable handle to a router shared between tasks
#[derive(Clone)]
pub struct SharedRouter {
    router: Arc<Mutex<Router>>,
    store: Option<Arc<QTableStore>>,
    persist_on_update: bool,
}

impl SharedRouter {
    /// Wrap an existing router
    pub fn new(mut router: Router) -> Self {
        router.track_evictions();
        Self {
            router: Arc::new(Mutex::new(router)),
            store: None,
            persist_on_update: false,
        }
    }

    /// Build a router from configuration, connecting and loading the store
    /// when `storage.database_path` is set
    pub async fn open(config: &Config) -> Result<Self> {
        let mut builder = SharedRouterBuilder::new()
            .config(config.router_config())
            .persist_on_update(config.storage.persist_on_update);

        if let Some(path) = &config.storage.database_path {
            let store = QTableStore::connect(path).await?;
            store.init().await?;
            builder = builder.store(Arc::new(store));
        }

        let shared = builder.build()?;
        shared.load_table().await?;
        Ok(shared)
    }

    /// Set the store used for load/save
    pub fn with_store(mut self, store: Arc<QTableStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Write each updated state through to the store
    pub fn with_persist_on_update(mut self, persist: bool) -> Self {
        self.persist_on_update = persist;
        self
    }

    /// See [`Router::route`]; a stored state evicted to make room is deleted
    /// from the store under write-through
    pub async fn route(&self, context: &str, explore: bool) -> Result<RouteDecision> {
        let mut router = self.router.lock().await;
        let decision = router.route(context, explore);
        self.forget_evicted(&mut *router).await?;
        Ok(decision)
    }

    /// See [`Router::update`]; store failures are returned after the
    /// in-memory update has been applied
    pub async fn update(
        &self,
        context: &str,
        action: &str,
        reward: f64,
        next_context: Option<&str>,
    ) -> Result<f64> {
        self.apply(context, |router| {
            router.update(context, action, reward, next_context)
        })
        .await
    }

    /// See [`Router::update_route`]
    pub async fn update_route(
        &self,
        context: &str,
        route: Route,
        reward: f64,
        next_context: Option<&str>,
    ) -> Result<f64> {
        self.apply(context, |router| {
            router.update_route(context, route, reward, next_context)
        })
        .await
    }

    pub async fn stats(&self) -> RouterStats {
        self.router.lock().await.stats()
    }

    /// Reset the router and clear the attached store
    pub async fn reset(&self) -> Result<()> {
        let mut router = self.router.lock().await;
        router.reset();
        router.take_evicted();

        if let Some(store) = &self.store {
            store.clear_all().await?;
        }
        Ok(())
    }

    pub async fn export(&self) -> PersistedTable {
        self.router.lock().await.export()
    }

    /// See [`Router::import`]; under write-through the store is replaced
    /// with the installed table
    pub async fn import(&self, data: PersistedTable) -> Result<ImportReport> {
        let mut router = self.router.lock().await;
        let report = router.import(data);
        router.take_evicted();

        if let Some(store) = self.write_through() {
            store.save_table(&router.export()).await?;
        }
        Ok(report)
    }

    /// Load the stored table into the router
    ///
    /// Under write-through, stored states trimmed to fit `max_states` are
    /// deleted from the store.
    pub async fn load_table(&self) -> Result<ImportReport> {
        let Some(store) = &self.store else {
            return Ok(ImportReport::default());
        };

        let mut router = self.router.lock().await;
        let data = store.load_table().await?;
        let report = router.import(data);
        self.forget_evicted(&mut *router).await?;

        info!(imported = report.imported, "Loaded Q-table from store");
        Ok(report)
    }

    /// Save the router's current table to the store
    pub async fn save_table(&self) -> Result<()> {
        if let Some(store) = &self.store {
            let router = self.router.lock().await;
            store.save_table(&router.export()).await?;
        }
        Ok(())
    }

    fn write_through(&self) -> Option<&QTableStore> {
        self.store.as_deref().filter(|_| self.persist_on_update)
    }

    /// Drain the router's evicted keys, deleting them from the store under
    /// write-through
    async fn forget_evicted(&self, router: &mut Router) -> Result<()> {
        let evicted = router.take_evicted();
        if evicted.is_empty() {
            return Ok(());
        }

        if let Some(store) = self.write_through() {
            let keys: Vec<String> = evicted.iter().map(ToString::to_string).collect();
            store.delete_entries(&keys).await?;
            debug!(evicted = keys.len(), "Deleted evicted states from store");
        }
        Ok(())
    }

    /// Run an update and persist its effects, all under the lock
    async fn apply<F>(&self, context: &str, update: F) -> Result<f64>
    where
        F: FnOnce(&mut Router) -> f64,
    {
        let mut router = self.router.lock().await;
        let before = router.stats().update_count;
        let td_error = update(&mut *router);
        let applied = router.stats().update_count > before;

        self.forget_evicted(&mut *router).await?;

        let Some(store) = self.write_through().filter(|_| applied) else {
            return Ok(td_error);
        };
        if let Some(entry) = router.peek(context) {
            let state_key = encoder::encode(context).to_string();
            let entry = PersistedEntry {
                q_values: entry.q_values.clone(),
                visits: entry.visits,
            };
            store.save_entry(&state_key, &entry).await?;
            debug!(state_key = %state_key, "Persisted updated state");
        }

        Ok(td_error)
    }
}

/// Builder for SharedRouter
pub struct SharedRouterBuilder {
    config: RouterConfig,
    seed: Option<u64>,
    backend: Option<Box<dyn Backend>>,
    store: Option<Arc<QTableStore>>,
    persist_on_update: bool,
}

impl Default for SharedRouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedRouterBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: RouterConfig::default(),
            seed: None,
            backend: None,
            store: None,
            persist_on_update: false,
        }
    }

    /// Set router configuration
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Fix the random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the numeric backend
    pub fn backend(mut self, backend: impl Backend + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    /// Set Q-table store
    pub fn store(mut self, store: Arc<QTableStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Write each updated state through to the store
    pub fn persist_on_update(mut self, persist: bool) -> Self {
        self.persist_on_update = persist;
        self
    }

    /// Build the shared router
    pub fn build(self) -> Result<SharedRouter> {
        let mut router = match self.seed {
            Some(seed) => Router::with_seed(self.config, seed)?,
            None => Router::new(self.config)?,
        };
        if let Some(backend) = self.backend {
            router = router.with_boxed_backend(backend);
        }

        let mut shared = SharedRouter::new(router).with_persist_on_update(self.persist_on_update);
        shared.store = self.store;
        Ok(shared)
    }
}
