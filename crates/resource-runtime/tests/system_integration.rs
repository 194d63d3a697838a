//! End-to-end exercise of a wired [`ResourceSystem`]: mount a temp
//! directory, register a resource type, fetch, reload, and preload.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use resource_factory::{FactoryError, LoadContext, PostCreateStatus, Resource, ResourceTypeHandler};
use resource_providers::MountTable;
use resource_runtime::{ResourceSystemConfig, ResourceSystem};

struct TextHandler {
    destroy_count: Arc<AtomicUsize>,
}

struct TextResource(String);

impl ResourceTypeHandler for TextHandler {
    fn create(&self, ctx: &LoadContext<'_>, _preload_data: Option<Resource>) -> Result<Resource, FactoryError> {
        let text = String::from_utf8_lossy(ctx.buffer).into_owned();
        Ok(Box::new(TextResource(text)))
    }

    fn post_create(&self, _resource: &(dyn Any + Send + Sync)) -> Result<PostCreateStatus, FactoryError> {
        Ok(PostCreateStatus::Done)
    }

    fn destroy(&self, _resource: Resource) {
        self.destroy_count.fetch_add(1, Ordering::SeqCst);
    }
}

async fn mounted_system(dir: &std::path::Path) -> ResourceSystem {
    let mut mounts = MountTable::new();
    let uri = format!("file://{}", dir.display());
    mounts.add_mount("root", &uri, 0, false).await.unwrap();
    ResourceSystem::new(mounts, ResourceSystemConfig::default())
}

#[tokio::test]
async fn get_reload_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("greeting.txt"), b"hello").unwrap();

    let system = mounted_system(dir.path()).await;
    let destroy_count = Arc::new(AtomicUsize::new(0));
    system
        .factory()
        .register_type(
            "txt",
            Arc::new(TextHandler {
                destroy_count: Arc::clone(&destroy_count),
            }),
        )
        .await
        .unwrap();

    let handle = system.factory().get("/greeting.txt").await.unwrap();
    system.factory().release(handle).await;
    assert_eq!(destroy_count.load(Ordering::SeqCst), 1);

    std::fs::write(dir.path().join("greeting.txt"), b"hello again").unwrap();
    let handle = system.factory().get("/greeting.txt").await.unwrap();
    system.factory().reload("/greeting.txt").await.unwrap();
    system.factory().release(handle).await;
}

#[tokio::test]
async fn unknown_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("unknown.bin"), b"x").unwrap();
    let system = mounted_system(dir.path()).await;

    let err = system.factory().get("/unknown.bin").await.unwrap_err();
    assert!(matches!(err, FactoryError::UnknownResourceType(_)));
}

#[tokio::test]
async fn reload_bus_roundtrip_reloads_factory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("greeting.txt"), b"hello").unwrap();

    let mut system = mounted_system(dir.path()).await;
    let destroy_count = Arc::new(AtomicUsize::new(0));
    system
        .factory()
        .register_type(
            "txt",
            Arc::new(TextHandler {
                destroy_count: Arc::clone(&destroy_count),
            }),
        )
        .await
        .unwrap();

    let handle = system.factory().get("/greeting.txt").await.unwrap();
    let sender = system.reload_sender();
    sender.request_reload("/greeting.txt");
    system.process_reload_messages().await;
    system.factory().release(handle).await;
}
