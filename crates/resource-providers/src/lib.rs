//! Archive provider interface, built-in providers, and the per-factory mount
//! table for the resource runtime.

#![warn(missing_docs)]

pub mod bundle_provider;
pub mod error;
pub mod file_provider;
pub mod http_provider;
pub mod mount;
pub mod mutable_provider;
pub mod provider;
pub mod registry;
pub mod uri;
pub mod zip_provider;

pub use bundle_provider::BundleArchiveProvider;
pub use error::{ProviderError, ProviderResult};
pub use file_provider::FileProvider;
pub use http_provider::HttpProvider;
pub use mount::{hash_path, MountEntry, MountTable};
pub use mutable_provider::MutableArchiveProvider;
pub use provider::{PathKey, Provider};
pub use registry::MountedProvider;
pub use uri::MountUri;
pub use zip_provider::ZipProvider;
