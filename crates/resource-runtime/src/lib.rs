//! Facade crate wiring providers, the mount table, the typed factory, and the
//! preloader into a single resource system.

#![warn(missing_docs)]

mod config;
mod error;
mod reload_bus;
mod system;

pub use config::{FactoryConfig, MountTableConfig, PreloaderConfig, ResourceSystemConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use reload_bus::{ReloadBus, ReloadSender};
pub use system::ResourceSystem;
