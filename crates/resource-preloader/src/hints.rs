//! Dependency discovery for preload scheduling.
//!
//! A type's `preload` callback normally registers child paths by calling
//! `PreloadHint(hint_info, name)` from wherever it runs, which may be off the
//! main update thread; the preloader stages those into a lock-protected array
//! and drains it between scheduling passes. This port keeps that two-phase
//! push/drain shape but resolves the dependency list synchronously, once per
//! node, by asking the type for its child paths up front rather than
//! threading a live callback through the factory's `preload` step.

use parking_lot::Mutex;

use crate::request::NodeIx;

/// Declares which child resource paths a type's preload step would
/// request, given the raw bytes it would otherwise parse during
/// `preload`.
pub trait PreloadHintProvider: Send + Sync {
    /// Child paths to schedule before this node can be created. Default
    /// is leaf behavior: no dependencies.
    fn child_paths(&self, _filename: &str, _buffer: &[u8]) -> Vec<String> {
        Vec::new()
    }
}

/// A leaf type with no declared dependencies.
pub struct NoHints;

impl PreloadHintProvider for NoHints {}

/// Staged `(parent, child path)` pairs awaiting the next drain pass.
#[derive(Default)]
pub struct HintStage {
    pending: Mutex<Vec<(NodeIx, String)>>,
}

impl HintStage {
    /// Build an empty stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a child path under `parent`. Safe to call from any
    /// context; the actual tree insertion happens on the next drain.
    pub fn push(&self, parent: NodeIx, path: impl Into<String>) {
        self.pending.lock().push((parent, path.into()));
    }

    /// Register several child paths under `parent` at once.
    pub fn push_all(&self, parent: NodeIx, paths: impl IntoIterator<Item = String>) {
        let mut guard = self.pending.lock();
        guard.extend(paths.into_iter().map(|p| (parent, p)));
    }

    /// Drain everything staged so far.
    pub fn drain(&self) -> Vec<(NodeIx, String)> {
        std::mem::take(&mut *self.pending.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::NodePool;

    #[test]
    fn push_then_drain_returns_in_order() {
        let mut pool = NodePool::new();
        let root = pool.insert(None, "/root".into(), 1).unwrap();
        let stage = HintStage::new();
        stage.push(root, "/a.texturec");
        stage.push(root, "/b.texturec");
        let drained = stage.drain();
        assert_eq!(drained.len(), 2);
        assert!(stage.drain().is_empty());
    }
}
