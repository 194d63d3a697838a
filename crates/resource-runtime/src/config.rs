//! `serde`-derived configuration structs.

use serde::{Deserialize, Serialize};

/// Mirrors the original's `NewFactoryParams`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactoryConfig {
    /// Hard ceiling on simultaneously cached resources.
    pub max_resources: usize,
    /// Enables reload bookkeeping (`RELOAD_SUPPORT`).
    pub reload_support: bool,
    /// Remounts `liveupdate.mounts` persisted entries at startup
    /// (`LIVE_UPDATE_MOUNTS_ON_START`).
    pub live_update_mounts_on_start: bool,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            max_resources: 1024,
            reload_support: false,
            live_update_mounts_on_start: true,
        }
    }
}

/// Configuration for the mount table's startup behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountTableConfig {
    /// Path to the persisted mount file.
    pub mounts_file: Option<std::path::PathBuf>,
}

impl Default for MountTableConfig {
    fn default() -> Self {
        Self { mounts_file: None }
    }
}

/// Configuration for a [`resource_preloader::Preloader`] driven through
/// [`crate::ResourceSystem`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PreloaderConfig {
    /// Whether to use the threaded (multi-slot) load queue instead of
    /// the synchronous single-slot one.
    pub threaded_queue: bool,
    /// Per-tick scheduling time budget, in microseconds.
    pub time_budget_us: u64,
}

impl Default for PreloaderConfig {
    fn default() -> Self {
        Self {
            threaded_queue: true,
            time_budget_us: 3_000,
        }
    }
}

/// Top-level configuration for a whole [`crate::ResourceSystem`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSystemConfig {
    /// Factory settings.
    pub factory: FactoryConfig,
    /// Mount table settings.
    pub mounts: MountTableConfig,
    /// Preloader settings.
    pub preloader: PreloaderConfig,
}
