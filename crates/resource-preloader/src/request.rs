//! Fixed arena of preload-request nodes. Node links are `Option<NodeIx>`
//! indices into the pool rather than pointers, per the arena-plus-indices
//! redesign: bounds-checked iteration, no node ever escapes the pool's
//! lifetime.

use std::num::NonZeroU16;

/// Hard cap on simultaneously in-flight preload nodes across one tree.
pub const MAX_REQUESTS: usize = 1024;

/// Index into the node pool. Always `< MAX_REQUESTS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIx(NonZeroU16);

impl NodeIx {
    fn from_slot(slot: usize) -> Self {
        // Slot 0 is the permanent root; store pool indices offset by one
        // so `NonZeroU16` can represent every valid slot.
        Self(NonZeroU16::new((slot + 1) as u16).expect("slot + 1 is never zero"))
    }

    fn slot(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// Outcome of a node's load/create attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeResult {
    /// Still in flight.
    Pending,
    /// Loaded and created successfully.
    Ok,
    /// A cycle was detected among this node's ancestors.
    ResourceLoopError,
    /// The load or create step failed.
    Error,
}

/// One node in a preload dependency tree.
pub struct PreloadNode {
    /// Canonical path requested for this node.
    pub path: String,
    /// Path-hash of `path`.
    pub path_hash: u64,
    pub(crate) parent: Option<NodeIx>,
    pub(crate) first_child: Option<NodeIx>,
    pub(crate) next_sibling: Option<NodeIx>,
    /// Number of children not yet resolved (`Ok` or terminal error).
    pub(crate) pending_children: u32,
    /// Current result/status.
    pub result: NodeResult,
    /// Whether this node is one of the tree's persisted roots.
    pub is_persisted_root: bool,
    /// Resource handle once loaded, `None` until `result != Pending`.
    pub resource: Option<resource_factory::ResourceRef>,
    /// Loaded bytes parked in the block allocator while children are still
    /// resolving.
    pub(crate) parked_buffer: Option<crate::block_allocator::BlockHandle>,
    /// Whether child hints have already been discovered for this node.
    pub(crate) children_discovered: bool,
}

/// Fixed pool of preload nodes with a free list.
pub struct NodePool {
    slots: Vec<Option<PreloadNode>>,
    free_list: Vec<usize>,
    capacity: usize,
}

impl NodePool {
    /// Build a pool with up to `MAX_REQUESTS` slots.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            capacity: MAX_REQUESTS,
        }
    }

    /// Allocate a node for `path`/`path_hash` under `parent`, rejecting a
    /// sibling with the same hash already present. Returns `None` if the pool
    /// is exhausted, and the existing sibling index if one matches.
    pub fn insert(
        &mut self,
        parent: Option<NodeIx>,
        path: String,
        path_hash: u64,
    ) -> Result<NodeIx, Option<NodeIx>> {
        if let Some(parent_ix) = parent {
            let mut cursor = self.slots[parent_ix.slot()]
                .as_ref()
                .and_then(|n| n.first_child);
            while let Some(ix) = cursor {
                let sibling = self.slots[ix.slot()].as_ref().expect("live index");
                if sibling.path_hash == path_hash {
                    return Err(Some(ix));
                }
                cursor = sibling.next_sibling;
            }
        }

        let slot = if let Some(slot) = self.free_list.pop() {
            slot
        } else if self.slots.len() < self.capacity {
            self.slots.push(None);
            self.slots.len() - 1
        } else {
            return Err(None);
        };

        let node = PreloadNode {
            path,
            path_hash,
            parent,
            first_child: None,
            next_sibling: None,
            pending_children: 0,
            result: NodeResult::Pending,
            is_persisted_root: false,
            resource: None,
            parked_buffer: None,
            children_discovered: false,
        };
        let ix = NodeIx::from_slot(slot);
        self.slots[slot] = Some(node);

        if let Some(parent_ix) = parent {
            let parent_node = self.slots[parent_ix.slot()].as_mut().expect("live index");
            let old_head = parent_node.first_child.replace(ix);
            self.slots[ix.slot()].as_mut().expect("just inserted").next_sibling = old_head;
            self.slots[parent_ix.slot()]
                .as_mut()
                .expect("live index")
                .pending_children += 1;
        }

        Ok(ix)
    }

    /// Release a node back to the free list. Callers must have already
    /// detached it from its parent's child list if needed.
    pub fn release(&mut self, ix: NodeIx) {
        self.slots[ix.slot()] = None;
        self.free_list.push(ix.slot());
    }

    /// Borrow a node.
    #[must_use]
    pub fn get(&self, ix: NodeIx) -> &PreloadNode {
        self.slots[ix.slot()].as_ref().expect("live index")
    }

    /// Mutably borrow a node.
    pub fn get_mut(&mut self, ix: NodeIx) -> &mut PreloadNode {
        self.slots[ix.slot()].as_mut().expect("live index")
    }

    /// Children indices of `ix`, in insertion order (most-recent-first,
    /// since insertion pushes at the head of the sibling list).
    pub fn children(&self, ix: NodeIx) -> Vec<NodeIx> {
        let mut out = Vec::new();
        let mut cursor = self.slots[ix.slot()].as_ref().and_then(|n| n.first_child);
        while let Some(child) = cursor {
            out.push(child);
            cursor = self.slots[child.slot()].as_ref().and_then(|n| n.next_sibling);
        }
        out
    }

    /// Ancestor path-hashes of `ix`, nearest first, for cycle detection.
    pub fn ancestor_hashes(&self, ix: NodeIx) -> Vec<u64> {
        let mut out = Vec::new();
        let mut cursor = self.slots[ix.slot()].as_ref().and_then(|n| n.parent);
        while let Some(parent_ix) = cursor {
            let node = self.slots[parent_ix.slot()].as_ref().expect("live index");
            out.push(node.path_hash);
            cursor = node.parent;
        }
        out
    }

    /// Decrement a node's pending-child count, returning the new count.
    pub fn child_resolved(&mut self, parent: NodeIx) -> u32 {
        let node = self.slots[parent.slot()].as_mut().expect("live index");
        node.pending_children = node.pending_children.saturating_sub(1);
        node.pending_children
    }

    /// Number of live nodes currently allocated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether the pool currently holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for NodePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_root_then_child() {
        let mut pool = NodePool::new();
        let root = pool.insert(None, "/root.collectionc".into(), 1).unwrap();
        let child = pool.insert(Some(root), "/child.texturec".into(), 2).unwrap();
        assert_eq!(pool.children(root), vec![child]);
        assert_eq!(pool.get(root).pending_children, 1);
    }

    #[test]
    fn duplicate_sibling_hash_returns_existing() {
        let mut pool = NodePool::new();
        let root = pool.insert(None, "/root.collectionc".into(), 1).unwrap();
        let child = pool.insert(Some(root), "/child.texturec".into(), 2).unwrap();
        let dup = pool.insert(Some(root), "/child.texturec".into(), 2);
        assert_eq!(dup, Err(Some(child)));
    }

    #[test]
    fn ancestor_hashes_walk_to_root() {
        let mut pool = NodePool::new();
        let root = pool.insert(None, "/a".into(), 1).unwrap();
        let mid = pool.insert(Some(root), "/b".into(), 2).unwrap();
        let leaf = pool.insert(Some(mid), "/c".into(), 3).unwrap();
        assert_eq!(pool.ancestor_hashes(leaf), vec![2, 1]);
    }

    #[test]
    fn pool_exhaustion_reports_none() {
        let mut pool = NodePool::new();
        for i in 0..MAX_REQUESTS {
            pool.insert(None, format!("/r{i}"), i as u64).unwrap();
        }
        assert_eq!(pool.insert(None, "/overflow".into(), 9999), Err(None));
    }

    #[test]
    fn release_then_reinsert_reuses_slot() {
        let mut pool = NodePool::new();
        let root = pool.insert(None, "/a".into(), 1).unwrap();
        pool.release(root);
        assert_eq!(pool.len(), 0);
        let again = pool.insert(None, "/b".into(), 2).unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(again, root);
    }
}
