//! The facade type tying providers, the mount table, the factory and the
//! preloader together.

use std::path::Path;
use std::sync::Arc;

use resource_factory::{Factory, FactoryConfig as FactoryBackendConfig, ReloadCallback};
use resource_preloader::{HintProviderMap, LoadQueue, Preloader, PreloaderStatus, RootOutcome};
use resource_providers::MountTable;
use tracing::{info, warn};

use crate::config::ResourceSystemConfig;
use crate::error::RuntimeResult;
use crate::reload_bus::{ReloadBus, ReloadSender};

/// A fully wired resource system: mounts, typed cache, and the preload
/// scheduler, behind one handle.
pub struct ResourceSystem {
    factory: Arc<Factory>,
    config: ResourceSystemConfig,
    reload_bus: ReloadBus,
    reload_sender: ReloadSender,
    hint_providers: HintProviderMap,
}

impl ResourceSystem {
    /// Build a system around an already-populated mount table.
    #[must_use]
    pub fn new(mounts: MountTable, config: ResourceSystemConfig) -> Self {
        let factory = Arc::new(Factory::new(
            mounts,
            FactoryBackendConfig {
                max_resources: config.factory.max_resources,
                reload_support: config.factory.reload_support,
            },
        ));
        let (reload_sender, reload_bus) = ReloadBus::new();
        Self {
            factory,
            config,
            reload_bus,
            reload_sender,
            hint_providers: HintProviderMap::new(),
        }
    }

    /// Construct a system with an empty mount table and remount any persisted
    /// entries from `mounts.mounts_file`, if configured.
    ///
    /// # Errors
    /// Propagates a provider failure while remounting a persisted entry.
    pub async fn bootstrap(config: ResourceSystemConfig) -> RuntimeResult<Self> {
        let mut mounts = MountTable::new();
        if config.factory.live_update_mounts_on_start {
            if let Some(path) = &config.mounts.mounts_file {
                mounts.load_mounts(path).await?;
            }
        }
        Ok(Self::new(mounts, config))
    }

    /// Shared handle to the underlying factory, for callers that need
    /// direct `Get`/`Release`/`Reload` access.
    #[must_use]
    pub fn factory(&self) -> &Arc<Factory> {
        &self.factory
    }

    /// A cloneable handle producers can use to request a reload without
    /// holding a reference to the whole system.
    #[must_use]
    pub fn reload_sender(&self) -> ReloadSender {
        self.reload_sender.clone()
    }

    /// Register a hint provider for `ext`, used by the preloader to
    /// discover child paths before a resource of that type is created.
    pub fn register_hint_provider(&mut self, ext: impl Into<String>, provider: Arc<dyn resource_preloader::PreloadHintProvider>) {
        self.hint_providers.insert(ext.into(), provider);
    }

    /// Register a reload callback, forwarded to the factory.
    pub async fn add_reload_callback(&self, callback: ReloadCallback) {
        self.factory.add_reload_callback(callback).await;
    }

    /// Drain the reload bus and reload every queued path, logging and
    /// continuing past individual failures.
    pub async fn process_reload_messages(&mut self) {
        for path in self.reload_bus.drain() {
            if let Err(e) = self.factory.reload(&path).await {
                warn!(path, error = %e, "failed to process queued reload");
            } else {
                info!(path, "processed queued reload");
            }
        }
    }

    /// Start a preload tree rooted at `names`, running it to completion
    /// (or until `complete_cb` rejects it) using this system's
    /// configured queue mode and time budget.
    ///
    /// # Errors
    /// Propagates a pool-exhaustion or provider failure.
    pub async fn preload(
        &self,
        names: impl IntoIterator<Item = String>,
        mut complete_cb: impl FnMut(&[RootOutcome]) -> bool,
    ) -> RuntimeResult<PreloaderStatus> {
        let queue = if self.config.preloader.threaded_queue {
            LoadQueue::threaded()
        } else {
            LoadQueue::synchronous()
        };
        let mut preloader = Preloader::new(names, queue)?;
        let budget = std::time::Duration::from_micros(self.config.preloader.time_budget_us);
        loop {
            let status = preloader
                .update_with_budget(&self.factory, &self.hint_providers, &mut complete_cb, budget)
                .await?;
            if status != PreloaderStatus::Pending {
                return Ok(status);
            }
        }
    }

    /// Persist every `persist=true` mount to disk.
    ///
    /// # Errors
    /// Propagates the underlying I/O failure.
    pub async fn save_mounts(&self, path: &Path) -> RuntimeResult<()> {
        // Mounts live inside the factory; expose through a thin pass-
        // through so callers don't need a `resource-providers` import
        // just to persist them.
        self.factory.save_mounts(path).await?;
        Ok(())
    }

    /// Log every leaked (refcount > 0) resource, then drop the factory handle.
    pub async fn shutdown(self) {
        self.factory.log_leaks_on_shutdown().await;
    }
}
