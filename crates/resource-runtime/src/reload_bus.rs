//! Reload request channel.
//!
//! The original's `@resource` socket accepts a DDF-encoded `Reload` message
//! carrying a list of paths; DDF parsing is out of scope here, so this
//! models only the behavioral effect the socket exists for: a bounded,
//! single-consumer channel of reload requests drained by the system's own
//! update call.

use tokio::sync::mpsc;
use tracing::warn;

const RELOAD_CHANNEL_CAPACITY: usize = 256;

/// Sending half; clone freely to let multiple producers request
/// reloads.
#[derive(Clone)]
pub struct ReloadSender(mpsc::Sender<String>);

impl ReloadSender {
    /// Queue a reload request for `path`. Drops the request and logs a
    /// warning if the channel is full.
    pub fn request_reload(&self, path: impl Into<String>) {
        let path = path.into();
        if let Err(e) = self.0.try_send(path) {
            warn!(error = %e, "reload bus full, dropping request");
        }
    }
}

/// Receiving half, owned by whoever drives [`crate::ResourceSystem`]'s
/// update loop.
pub struct ReloadBus {
    receiver: mpsc::Receiver<String>,
}

impl ReloadBus {
    /// Build a bus and its sender handle.
    #[must_use]
    pub fn new() -> (ReloadSender, Self) {
        let (tx, rx) = mpsc::channel(RELOAD_CHANNEL_CAPACITY);
        (ReloadSender(tx), Self { receiver: rx })
    }

    /// Drain every currently queued path without blocking.
    pub fn drain(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(path) = self.receiver.try_recv() {
            out.push(path);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_queued_paths_in_order() {
        let (tx, mut bus) = ReloadBus::new();
        tx.request_reload("/a.texturec");
        tx.request_reload("/b.texturec");
        assert_eq!(bus.drain(), vec!["/a.texturec", "/b.texturec"]);
        assert!(bus.drain().is_empty());
    }
}
