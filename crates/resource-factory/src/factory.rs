//! The resource factory: typed cache, type table, and the `Get` critical
//! section.

use crate::descriptor::{Descriptor, ResourceRef};
use crate::error::{FactoryError, FactoryResult};
use crate::handler::{LoadContext, PostCreateStatus, RecreateOutcome, ResourceTypeHandler, TypeEntry};
use resource_providers::{MountTable, PathKey};
use resource_util::{canonicalize, path_hash64};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Sentinel meaning "load the whole file".
const PRELOAD_SIZE_FULL_FILE: usize = usize::MAX;

/// Invalid version sentinel the monotonic 16-bit version counter must
/// never produce.
const INVALID_VERSION: u16 = 0;

/// Callback invoked once per reload.
pub type ReloadCallback = Arc<dyn Fn(ReloadEvent<'_>) + Send + Sync>;

/// Payload handed to registered reload callbacks.
pub struct ReloadEvent<'a> {
    /// Canonical path that was reloaded.
    pub filename: &'a str,
    /// Path-hash of `filename`.
    pub path_hash: u64,
    /// The resource after `recreate` ran.
    pub resource: &'a (dyn Any + Send + Sync),
}

struct Inner {
    mounts: MountTable,
    types: HashMap<String, TypeEntry>,
    cache: HashMap<u64, Descriptor>,
    path_stack: Vec<(u64, String)>,
    reload_callbacks: Vec<ReloadCallback>,
}

/// Construction parameters.
pub struct FactoryConfig {
    /// Hard ceiling on the number of simultaneously cached resources.
    pub max_resources: usize,
    /// Whether reload support (filename bookkeeping, `@resource` bus) is
    /// enabled.
    pub reload_support: bool,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            max_resources: 1024,
            reload_support: false,
        }
    }
}

/// Owns the typed resource cache, registered types, and the mount table it
/// loads bytes through.
pub struct Factory {
    inner: Mutex<Inner>,
    version_counter: AtomicU16,
    config: FactoryConfig,
}

impl Factory {
    /// Build a factory around an already-populated mount table.
    #[must_use]
    pub fn new(mounts: MountTable, config: FactoryConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                mounts,
                types: HashMap::new(),
                cache: HashMap::new(),
                path_stack: Vec::new(),
                reload_callbacks: Vec::new(),
            }),
            version_counter: AtomicU16::new(1),
            config,
        }
    }

    /// Register a type handler for `ext`.
    ///
    /// # Errors
    /// Returns [`FactoryError::Inval`] if `ext` contains a `.`, and
    /// [`FactoryError::AlreadyRegistered`] if `ext` already has a handler.
    pub async fn register_type(
        &self,
        ext: impl Into<String>,
        handler: Arc<dyn ResourceTypeHandler>,
    ) -> FactoryResult<()> {
        let ext = ext.into();
        if ext.contains('.') {
            return Err(FactoryError::Inval(format!(
                "extension must not contain '.': {ext}"
            )));
        }
        let mut inner = self.inner.lock().await;
        if inner.types.contains_key(&ext) {
            return Err(FactoryError::AlreadyRegistered(ext));
        }
        inner.types.insert(ext.clone(), TypeEntry { handler });
        Ok(())
    }

    /// Look up a path's cache entry without loading it, bumping its refcount
    /// on a hit.
    ///
    /// # Errors
    /// Returns [`FactoryError::Inval`] if `path` fails canonicalization.
    pub async fn try_get_cached(&self, path: &str) -> FactoryResult<Option<ResourceRef>> {
        let canonical = canonicalize(path).map_err(|e| FactoryError::Inval(e.to_string()))?;
        let hash = path_hash64(&canonical);
        let mut inner = self.inner.lock().await;
        if let Some(descriptor) = inner.cache.get_mut(&hash) {
            descriptor.refcount += 1;
            return Ok(Some(ResourceRef { hash }));
        }
        Ok(None)
    }

    /// Register a callback invoked after every successful `Reload`.
    pub async fn add_reload_callback(&self, callback: ReloadCallback) {
        self.inner.lock().await.reload_callbacks.push(callback);
    }

    fn next_version(&self) -> u16 {
        loop {
            let v = self.version_counter.fetch_add(1, Ordering::Relaxed);
            if v != INVALID_VERSION {
                return v;
            }
        }
    }

    /// The canonical `Get` flow.
    ///
    /// # Errors
    /// See [`FactoryError`] variants: missing extension, unknown type,
    /// resource loop, not found, out of resources, or a propagated type
    /// callback / provider failure.
    pub async fn get(&self, path: &str) -> FactoryResult<ResourceRef> {
        let canonical = canonicalize(path).map_err(|e| FactoryError::Inval(e.to_string()))?;
        let hash = path_hash64(&canonical);

        let mut inner = self.inner.lock().await;

        if let Some(descriptor) = inner.cache.get_mut(&hash) {
            descriptor.refcount += 1;
            return Ok(ResourceRef { hash });
        }

        if inner.path_stack.iter().any(|(h, _)| *h == hash) {
            let chain = inner
                .path_stack
                .iter()
                .map(|(_, p)| p.clone())
                .chain(std::iter::once(canonical.clone()))
                .collect();
            return Err(FactoryError::ResourceLoopError(chain));
        }

        let ext = extension_of(&canonical).ok_or(FactoryError::MissingFileExtension)?;
        let handler = inner
            .types
            .get(ext)
            .map(|entry| entry.handler.clone())
            .ok_or_else(|| FactoryError::UnknownResourceType(ext.to_string()))?;

        if inner.cache.len() >= self.config.max_resources {
            return Err(FactoryError::OutOfResources(self.config.max_resources));
        }

        inner.path_stack.push((hash, canonical.clone()));
        let result = self.load_and_create(&mut inner, &canonical, hash, handler.as_ref()).await;
        inner.path_stack.pop();

        let resource = result?;
        let version = self.next_version();
        inner.cache.insert(
            hash,
            Descriptor {
                resource,
                resource_size: 0,
                version,
                refcount: 1,
                type_ext: ext.to_string(),
                reload_filename: self.config.reload_support.then(|| canonical.clone()),
            },
        );

        if let Some(descriptor) = inner.cache.get(&hash) {
            if let PostCreateStatus::Pending = handler.post_create(descriptor.resource.as_ref())? {
                // Spin until the post-create step settles, mirroring the
                // original's synchronous-Get pump.
                loop {
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                    if let PostCreateStatus::Done = handler.post_create(descriptor.resource.as_ref())? {
                        break;
                    }
                }
            }
        }

        Ok(ResourceRef { hash })
    }

    async fn load_and_create(
        &self,
        inner: &mut Inner,
        canonical: &str,
        hash: u64,
        handler: &dyn ResourceTypeHandler,
    ) -> FactoryResult<crate::handler::Resource> {
        let key = PathKey { hash, path: canonical };
        let file_size = inner.mounts.get_resource_size(key).await?;

        let (buffer, is_partial) = if handler.is_streaming() && handler.preload_chunk_size() > 0 {
            let chunk = (handler.preload_chunk_size() as u64).min(file_size);
            let bytes = inner.mounts.read_resource_partial(key, 0, chunk).await?;
            (bytes, chunk < file_size)
        } else {
            let bytes = inner.mounts.read_resource(key).await?;
            (bytes, false)
        };

        let ctx = LoadContext {
            filename: canonical,
            buffer: &buffer,
            file_size,
            is_partial,
        };

        let preload_data = handler.preload(&ctx)?;
        handler.create(&ctx, preload_data)
    }

    /// Load raw bytes via the mount table without touching the cache or type
    /// table.
    ///
    /// # Errors
    /// Returns [`FactoryError::ResourceNotFound`] if no mount serves the path.
    pub async fn get_raw(&self, path: &str) -> FactoryResult<Vec<u8>> {
        let canonical = canonicalize(path).map_err(|e| FactoryError::Inval(e.to_string()))?;
        let hash = path_hash64(&canonical);
        let inner = self.inner.lock().await;
        let key = PathKey { hash, path: &canonical };
        inner.mounts.read_resource(key).await.map_err(|e| match e {
            resource_providers::ProviderError::NotFound => FactoryError::ResourceNotFound,
            other => other.into(),
        })
    }

    /// Inject a resource from a caller-supplied buffer, skipping the mount
    /// lookup but otherwise following the full create path.
    ///
    /// # Errors
    /// Propagates type callback failures; returns
    /// [`FactoryError::UnknownResourceType`] if `path`'s extension has no
    /// handler.
    pub async fn create_resource_partial(&self, path: &str, buffer: &[u8]) -> FactoryResult<ResourceRef> {
        let canonical = canonicalize(path).map_err(|e| FactoryError::Inval(e.to_string()))?;
        let hash = path_hash64(&canonical);
        let ext = extension_of(&canonical).ok_or(FactoryError::MissingFileExtension)?;

        let mut inner = self.inner.lock().await;
        let handler = inner
            .types
            .get(ext)
            .map(|entry| entry.handler.clone())
            .ok_or_else(|| FactoryError::UnknownResourceType(ext.to_string()))?;

        let ctx = LoadContext {
            filename: &canonical,
            buffer,
            file_size: buffer.len() as u64,
            is_partial: false,
        };
        let preload_data = handler.preload(&ctx)?;
        let resource = handler.create(&ctx, preload_data)?;
        let version = self.next_version();

        inner.cache.insert(
            hash,
            Descriptor {
                resource,
                resource_size: 0,
                version,
                refcount: 1,
                type_ext: ext.to_string(),
                reload_filename: None,
            },
        );
        Ok(ResourceRef { hash })
    }

    /// Decrement the refcount for `handle`; at zero, destroy the resource and
    /// remove it from the cache.
    pub async fn release(&self, handle: ResourceRef) {
        let mut inner = self.inner.lock().await;
        let Some(descriptor) = inner.cache.get_mut(&handle.hash) else {
            return;
        };
        descriptor.refcount = descriptor.refcount.saturating_sub(1);
        if descriptor.refcount == 0 {
            let descriptor = inner.cache.remove(&handle.hash).expect("just looked up");
            if let Some(entry) = inner.types.get(&descriptor.type_ext) {
                entry.handler.destroy(descriptor.resource);
            }
        }
    }

    /// Reload the resource at `path`: reread its bytes via the mounts, call
    /// `recreate`, then fire every registered reload callback in order.
    ///
    /// # Errors
    /// Returns [`FactoryError::ResourceNotFound`] if `path` is not currently
    /// cached, [`FactoryError::NotSupported`] if the type has no `recreate`,
    /// or propagates mount/type callback failures.
    pub async fn reload(&self, path: &str) -> FactoryResult<()> {
        let canonical = canonicalize(path).map_err(|e| FactoryError::Inval(e.to_string()))?;
        let hash = path_hash64(&canonical);

        let mut inner = self.inner.lock().await;
        if !inner.cache.contains_key(&hash) {
            return Err(FactoryError::ResourceNotFound);
        }

        let key = PathKey { hash, path: &canonical };
        let buffer = inner.mounts.read_resource(key).await?;
        let file_size = buffer.len() as u64;
        let ctx = LoadContext {
            filename: &canonical,
            buffer: &buffer,
            file_size,
            is_partial: false,
        };

        let type_ext = inner.cache.get(&hash).expect("checked above").type_ext.clone();
        let handler = inner
            .types
            .get(&type_ext)
            .map(|e| e.handler.clone())
            .ok_or_else(|| FactoryError::UnknownResourceType(type_ext.clone()))?;

        let outcome = {
            let descriptor = inner.cache.get(&hash).expect("checked above");
            handler.recreate(&ctx, descriptor.resource.as_ref())?
        };

        let version = self.next_version();
        match outcome {
            RecreateOutcome::Replaced(new_resource) => {
                let descriptor = inner.cache.get_mut(&hash).expect("checked above");
                let previous = std::mem::replace(&mut descriptor.resource, new_resource);
                descriptor.version = version;
                handler.destroy(previous);
            }
            RecreateOutcome::KeptExisting => {
                inner.cache.get_mut(&hash).expect("checked above").version = version;
            }
        }

        let callbacks = inner.reload_callbacks.clone();
        let descriptor = inner.cache.get(&hash).expect("checked above");
        for callback in &callbacks {
            callback(ReloadEvent {
                filename: &canonical,
                path_hash: hash,
                resource: descriptor.resource.as_ref(),
            });
        }

        info!(path = %canonical, "resource reloaded");
        Ok(())
    }

    /// Replace a cached resource's payload in place without rereading from a
    /// mount.
    ///
    /// # Errors
    /// Returns [`FactoryError::ResourceNotFound`] if `handle` is not cached,
    /// or propagates the type's `recreate` failure.
    pub async fn set_resource(&self, handle: ResourceRef, buffer: &[u8]) -> FactoryResult<()> {
        let mut inner = self.inner.lock().await;
        let type_ext = inner
            .cache
            .get(&handle.hash)
            .map(|d| d.type_ext.clone())
            .ok_or(FactoryError::ResourceNotFound)?;
        let handler = inner
            .types
            .get(&type_ext)
            .map(|e| e.handler.clone())
            .ok_or_else(|| FactoryError::UnknownResourceType(type_ext))?;

        let ctx = LoadContext {
            filename: "",
            buffer,
            file_size: buffer.len() as u64,
            is_partial: false,
        };
        let outcome = {
            let descriptor = inner.cache.get(&handle.hash).expect("checked above");
            handler.recreate(&ctx, descriptor.resource.as_ref())?
        };
        let version = self.next_version();
        match outcome {
            RecreateOutcome::Replaced(new_resource) => {
                let descriptor = inner.cache.get_mut(&handle.hash).expect("checked above");
                let previous = std::mem::replace(&mut descriptor.resource, new_resource);
                descriptor.version = version;
                handler.destroy(previous);
            }
            RecreateOutcome::KeptExisting => {
                inner.cache.get_mut(&handle.hash).expect("checked above").version = version;
            }
        }
        Ok(())
    }

    /// Walk dependencies via the mount table.
    pub async fn dependencies(&self, mut callback: impl FnMut(u64, &[u8], bool)) {
        let inner = self.inner.lock().await;
        inner.mounts.get_dependencies(&mut callback).await;
    }

    /// Current refcount and version for a cached resource, for tests and
    /// diagnostics.
    pub async fn stats(&self, handle: ResourceRef) -> Option<(u32, u16)> {
        let inner = self.inner.lock().await;
        inner
            .cache
            .get(&handle.hash)
            .map(|d| (d.refcount, d.version))
    }

    /// Number of resources leaked (refcount > 0) at teardown time, logging
    /// each one.
    pub async fn log_leaks_on_shutdown(&self) {
        let inner = self.inner.lock().await;
        for (hash, descriptor) in &inner.cache {
            warn!(
                hash,
                refcount = descriptor.refcount,
                filename = descriptor.reload_filename.as_deref().unwrap_or("<unknown>"),
                "resource leaked at factory shutdown"
            );
        }
    }

    /// Mount `uri` under `name`, delegating to the owned mount table.
    ///
    /// # Errors
    /// Propagates the chosen provider's mount failure.
    pub async fn add_mount(
        &self,
        name: impl Into<String>,
        uri: &str,
        priority: i32,
        persist: bool,
    ) -> resource_providers::ProviderResult<()> {
        let mut inner = self.inner.lock().await;
        inner.mounts.add_mount(name, uri, priority, persist).await
    }

    /// Unmount the entry named `name`.
    ///
    /// # Errors
    /// Returns [`resource_providers::ProviderError::NotFound`] if no
    /// such mount exists.
    pub async fn remove_mount(&self, name: &str) -> resource_providers::ProviderResult<()> {
        let mut inner = self.inner.lock().await;
        inner.mounts.remove_mount(name).await
    }

    /// Persist every `persist = true` mount to `path`.
    ///
    /// # Errors
    /// Propagates the underlying I/O failure.
    pub async fn save_mounts(&self, path: &std::path::Path) -> resource_providers::ProviderResult<()> {
        let inner = self.inner.lock().await;
        inner.mounts.save_mounts(path).await
    }

    /// Load and remount persisted entries from `path`.
    ///
    /// # Errors
    /// Propagates I/O, version-mismatch, and provider mount errors.
    pub async fn load_mounts(&self, path: &std::path::Path) -> resource_providers::ProviderResult<()> {
        let mut inner = self.inner.lock().await;
        inner.mounts.load_mounts(path).await
    }
}

impl Drop for Factory {
    /// Catches leaks even when a caller drops the factory without an
    /// explicit [`Self::log_leaks_on_shutdown`] call.
    fn drop(&mut self) {
        let Ok(inner) = self.inner.try_lock() else {
            return;
        };
        for (hash, descriptor) in &inner.cache {
            if descriptor.refcount > 0 {
                warn!(
                    hash,
                    refcount = descriptor.refcount,
                    filename = descriptor.reload_filename.as_deref().unwrap_or("<unknown>"),
                    "resource leaked at factory shutdown"
                );
            }
        }
    }
}

fn extension_of(path: &str) -> Option<&str> {
    path.rsplit('/').next().and_then(|name| {
        let dot = name.rfind('.')?;
        if dot + 1 == name.len() {
            None
        } else {
            Some(&name[dot + 1..])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Resource;
    use resource_providers::MountTable;

    struct EchoHandler;

    impl ResourceTypeHandler for EchoHandler {
        fn create(&self, ctx: &LoadContext<'_>, _preload_data: Option<Resource>) -> FactoryResult<Resource> {
            Ok(Box::new(ctx.buffer.to_vec()))
        }

        fn destroy(&self, _resource: Resource) {}
    }

    fn test_mounts() -> MountTable {
        MountTable::new()
    }

    #[tokio::test]
    async fn get_missing_extension_is_inval_path() {
        let factory = Factory::new(test_mounts(), FactoryConfig::default());
        factory
            .register_type("txt", Arc::new(EchoHandler))
            .await
            .unwrap();
        let err = factory.get("/no_extension").await.unwrap_err();
        assert!(matches!(err, FactoryError::MissingFileExtension));
    }

    #[tokio::test]
    async fn register_type_rejects_dotted_extension() {
        let factory = Factory::new(test_mounts(), FactoryConfig::default());
        let err = factory
            .register_type("t.xt", Arc::new(EchoHandler))
            .await
            .unwrap_err();
        assert!(matches!(err, FactoryError::Inval(_)));
    }

    #[tokio::test]
    async fn register_type_rejects_duplicate() {
        let factory = Factory::new(test_mounts(), FactoryConfig::default());
        factory
            .register_type("txt", Arc::new(EchoHandler))
            .await
            .unwrap();
        let err = factory
            .register_type("txt", Arc::new(EchoHandler))
            .await
            .unwrap_err();
        assert!(matches!(err, FactoryError::AlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn get_unknown_type_errors() {
        let factory = Factory::new(test_mounts(), FactoryConfig::default());
        let err = factory.get("/thing.bin").await.unwrap_err();
        assert!(matches!(err, FactoryError::UnknownResourceType(_)));
    }

    #[tokio::test]
    async fn create_resource_partial_then_release() {
        let factory = Factory::new(test_mounts(), FactoryConfig::default());
        factory
            .register_type("txt", Arc::new(EchoHandler))
            .await
            .unwrap();
        let handle = factory
            .create_resource_partial("/synthetic.txt", b"hello")
            .await
            .unwrap();
        let (refcount, _version) = factory.stats(handle).await.unwrap();
        assert_eq!(refcount, 1);
        factory.release(handle).await;
        assert!(factory.stats(handle).await.is_none());
    }

    #[tokio::test]
    async fn get_returns_cache_hit_and_bumps_refcount() {
        let mut mounts = test_mounts();
        let hash = path_hash64("/a.txt");
        mounts.add_file(hash, b"payload".to_vec()).unwrap();
        let factory = Factory::new(mounts, FactoryConfig::default());
        factory
            .register_type("txt", Arc::new(EchoHandler))
            .await
            .unwrap();

        let first = factory.get("/a.txt").await.unwrap();
        let second = factory.get("/a.txt").await.unwrap();
        assert_eq!(first.path_hash(), second.path_hash());
        let (refcount, _) = factory.stats(first).await.unwrap();
        assert_eq!(refcount, 2);
    }

    struct KeepInPlaceHandler;

    impl ResourceTypeHandler for KeepInPlaceHandler {
        fn create(&self, ctx: &LoadContext<'_>, _preload_data: Option<Resource>) -> FactoryResult<Resource> {
            Ok(Box::new(ctx.buffer.to_vec()))
        }

        fn destroy(&self, _resource: Resource) {}

        fn recreate(
            &self,
            _ctx: &LoadContext<'_>,
            _previous: &(dyn std::any::Any + Send + Sync),
        ) -> FactoryResult<RecreateOutcome> {
            Ok(RecreateOutcome::KeptExisting)
        }
    }

    #[tokio::test]
    async fn reload_bumps_version_even_when_kept_existing() {
        let mut mounts = test_mounts();
        let hash = path_hash64("/a.txt");
        mounts.add_file(hash, b"payload".to_vec()).unwrap();
        let factory = Factory::new(mounts, FactoryConfig::default());
        factory
            .register_type("txt", Arc::new(KeepInPlaceHandler))
            .await
            .unwrap();

        let handle = factory.get("/a.txt").await.unwrap();
        let (_, version_before) = factory.stats(handle).await.unwrap();

        factory.reload("/a.txt").await.unwrap();

        let (_, version_after) = factory.stats(handle).await.unwrap();
        assert!(version_after > version_before);
    }

    #[tokio::test]
    async fn set_resource_bumps_version_even_when_kept_existing() {
        let mut mounts = test_mounts();
        let hash = path_hash64("/a.txt");
        mounts.add_file(hash, b"payload".to_vec()).unwrap();
        let factory = Factory::new(mounts, FactoryConfig::default());
        factory
            .register_type("txt", Arc::new(KeepInPlaceHandler))
            .await
            .unwrap();

        let handle = factory.get("/a.txt").await.unwrap();
        let (_, version_before) = factory.stats(handle).await.unwrap();

        factory.set_resource(handle, b"new payload").await.unwrap();

        let (_, version_after) = factory.stats(handle).await.unwrap();
        assert!(version_after > version_before);
    }
}
