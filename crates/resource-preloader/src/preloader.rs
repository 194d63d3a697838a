//! Depth-first preload scheduler.
//!
//! `Factory::get`/`Factory::create_resource_partial` already run a type's
//! `preload`, `create`, and any `Pending` `post_create` step to completion
//! before returning, so this scheduler doesn't keep its own staged
//! post-create list the way the original preloader does — there is nothing
//! left to pump once a node's create call resolves. What it still owns is
//! exactly the tree-shaped part: dependency discovery via
//! [`crate::hints::PreloadHintProvider`], cycle detection, in-tree duplicate
//! avoidance, the small-block arena for buffers awaiting their children, and
//! the persisted-root lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use resource_factory::{Factory, FactoryError, ResourceRef};
use resource_util::{canonicalize, path_hash64};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::block_allocator::BlockAllocator;
use crate::error::{PreloaderError, PreloaderResult};
use crate::hints::{HintStage, PreloadHintProvider};
use crate::queue::LoadQueue;
use crate::request::{NodeIx, NodePool, NodeResult};

/// Registered hint providers, keyed by file extension (without the
/// leading `.`), mirroring the factory's own per-extension type table.
pub type HintProviderMap = HashMap<String, Arc<dyn PreloadHintProvider>>;

/// Final state of one of the tree's persisted roots, handed to the completion
/// callback.
pub struct RootOutcome {
    /// The root's requested path.
    pub path: String,
    /// Terminal result.
    pub result: NodeResult,
    /// The created resource, if `result == NodeResult::Ok`.
    pub resource: Option<ResourceRef>,
}

/// Overall status after an `update` call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloaderStatus {
    /// At least one root is still pending.
    Pending,
    /// Every root reached a terminal state and the completion callback
    /// accepted the result.
    Done,
    /// The completion callback rejected the result.
    NotLoaded,
}

/// How close to the deadline before the empty-rounds stop condition starts
/// counting, mirroring the original's near-time-limit check.
const NEAR_DEADLINE: Duration = Duration::from_millis(1);

enum LoadOutcome {
    Discovered(NodeIx, Result<Vec<u8>, FactoryError>),
}

/// One preload tree: a forest of persisted roots plus their
/// hint-discovered descendants.
pub struct Preloader {
    pool: NodePool,
    roots: Vec<NodeIx>,
    hints: HintStage,
    allocator: BlockAllocator,
    queue: LoadQueue,
    in_flight: HashMap<NodeIx, JoinHandle<Result<Vec<u8>, FactoryError>>>,
    in_progress_hashes: HashMap<u64, NodeIx>,
    completion_fired: bool,
}

impl Preloader {
    /// Build a tree whose persisted roots are `names`.
    ///
    /// # Errors
    /// Returns [`PreloaderError::PoolExhausted`] if `names` alone exceeds the
    /// pool capacity.
    pub fn new(names: impl IntoIterator<Item = String>, queue: LoadQueue) -> PreloaderResult<Self> {
        let mut pool = NodePool::new();
        let mut roots = Vec::new();
        for name in names {
            let canonical = canonicalize(&name).unwrap_or(name);
            let hash = path_hash64(&canonical);
            let ix = pool
                .insert(None, canonical, hash)
                .map_err(|_| PreloaderError::PoolExhausted(crate::request::MAX_REQUESTS))?;
            pool.get_mut(ix).is_persisted_root = true;
            roots.push(ix);
        }
        Ok(Self {
            pool,
            roots,
            hints: HintStage::new(),
            allocator: BlockAllocator::default_sized(),
            queue,
            in_flight: HashMap::new(),
            in_progress_hashes: HashMap::new(),
            completion_fired: false,
        })
    }

    /// Run scheduling rounds until every root is terminal, the completion
    /// callback rejects, or `time_budget` elapses.
    ///
    /// # Errors
    /// Propagates factory/provider failures encountered while resolving a
    /// non-root node that has no recovery path (root failures are reported
    /// through `status` instead of as an `Err`).
    pub async fn update(
        &mut self,
        factory: &Arc<Factory>,
        hint_providers: &HintProviderMap,
        mut complete_cb: impl FnMut(&[RootOutcome]) -> bool,
    ) -> PreloaderResult<PreloaderStatus> {
        self.update_with_budget(factory, hint_providers, &mut complete_cb, Duration::from_millis(16))
            .await
    }

    /// Same as [`Self::update`] with an explicit time budget, mirroring the
    /// original's `UpdatePreloader(complete_cb, ctx, time_budget_us)`.
    pub async fn update_with_budget(
        &mut self,
        factory: &Arc<Factory>,
        hint_providers: &HintProviderMap,
        complete_cb: &mut impl FnMut(&[RootOutcome]) -> bool,
        time_budget: Duration,
    ) -> PreloaderResult<PreloaderStatus> {
        let deadline = Instant::now() + time_budget;
        let mut empty_rounds = 0u32;

        loop {
            self.drain_hints();

            let mut progressed = self.poll_in_flight(factory, hint_providers).await;
            progressed |= self.advance_ready_nodes(factory, hint_providers).await?;

            if self.all_roots_terminal() {
                return Ok(self.fire_completion_if_needed(complete_cb));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(PreloaderStatus::Pending);
            }

            // Only start counting empty rounds once close to running out of
            // budget; otherwise keep sleeping and retrying for the full
            // duration, since there's still time for in-flight work to land.
            if remaining <= NEAR_DEADLINE {
                if !progressed {
                    empty_rounds += 1;
                } else {
                    empty_rounds = 0;
                }
                if empty_rounds >= 3 && self.in_flight.is_empty() {
                    // No in-flight work and nothing left to try: stuck for
                    // this tick, come back next update.
                    return Ok(PreloaderStatus::Pending);
                }
            }
            if !progressed {
                tokio::time::sleep(Duration::from_millis(1).min(remaining)).await;
            }
        }
    }

    fn drain_hints(&mut self) {
        for (parent, path) in self.hints.drain() {
            let canonical = canonicalize(&path).unwrap_or(path);
            let hash = path_hash64(&canonical);
            match self.pool.insert(Some(parent), canonical, hash) {
                Ok(_) | Err(Some(_)) => {}
                Err(None) => warn!("preload node pool exhausted while draining hints"),
            }
        }
    }

    async fn poll_in_flight(&mut self, factory: &Arc<Factory>, hint_providers: &HintProviderMap) -> bool {
        let finished: Vec<NodeIx> = self
            .in_flight
            .iter()
            .filter(|(_, h)| h.is_finished())
            .map(|(ix, _)| *ix)
            .collect();
        if finished.is_empty() {
            return false;
        }
        for ix in finished {
            let handle = self.in_flight.remove(&ix).expect("just observed finished");
            let outcome = match handle.await {
                Ok(result) => LoadOutcome::Discovered(ix, result),
                Err(join_err) => LoadOutcome::Discovered(ix, Err(FactoryError::Inval(join_err.to_string()))),
            };
            self.handle_load_outcome(outcome, factory, hint_providers).await;
        }
        true
    }

    async fn handle_load_outcome(
        &mut self,
        outcome: LoadOutcome,
        factory: &Arc<Factory>,
        hint_providers: &HintProviderMap,
    ) {
        let LoadOutcome::Discovered(ix, result) = outcome;
        let path_hash = self.pool.get(ix).path_hash;
        self.in_progress_hashes.remove(&path_hash);

        let buffer = match result {
            Ok(buf) => buf,
            Err(e) => {
                debug!(node = ?ix, error = %e, "preload node failed to load");
                self.pool.get_mut(ix).result = NodeResult::Error;
                self.resolve_parent(ix);
                return;
            }
        };

        let path = self.pool.get(ix).path.clone();
        let ext = extension_of(&path).unwrap_or_default();
        let children = hint_providers
            .get(ext)
            .map(|provider| provider.child_paths(&path, &buffer))
            .unwrap_or_default();

        self.queue.release(buffer.len() as u64);
        self.pool.get_mut(ix).children_discovered = true;

        if children.is_empty() {
            let outcome = factory.create_resource_partial(&path, &buffer).await;
            self.finish_node(ix, outcome);
            return;
        }

        self.hints.push_all(ix, children);
        let mut handle = self.allocator.alloc(buffer.len());
        handle.as_mut_slice(&mut self.allocator).copy_from_slice(&buffer);
        self.pool.get_mut(ix).parked_buffer = Some(handle);
    }

    async fn advance_ready_nodes(
        &mut self,
        factory: &Arc<Factory>,
        hint_providers: &HintProviderMap,
    ) -> PreloaderResult<bool> {
        let mut progressed = false;
        for ix in self.pending_nodes_depth_first() {
            let node = self.pool.get(ix);
            if node.result != NodeResult::Pending || self.in_flight.contains_key(&ix) {
                continue;
            }

            if let Some(handle) = &node.parked_buffer {
                if node.pending_children == 0 {
                    let bytes = handle.as_slice(&self.allocator).to_vec();
                    let path = node.path.clone();
                    let outcome = factory.create_resource_partial(&path, &bytes).await;
                    let handle = self.pool.get_mut(ix).parked_buffer.take().expect("checked above");
                    self.allocator.free(handle);
                    self.finish_node(ix, outcome);
                    progressed = true;
                }
                continue;
            }

            if node.children_discovered {
                // Discovered but has no parked buffer and isn't resolved
                // yet: children are still in flight elsewhere.
                continue;
            }

            if self.pool.ancestor_hashes(ix).contains(&node.path_hash) {
                warn!(path = %node.path, "resource loop detected while preloading");
                self.pool.get_mut(ix).result = NodeResult::ResourceLoopError;
                self.resolve_parent(ix);
                progressed = true;
                continue;
            }

            if let Some(&other) = self.in_progress_hashes.get(&node.path_hash) {
                if other != ix {
                    continue;
                }
            }

            if let Some(existing) = factory.try_get_cached(&node.path).await? {
                self.pool.get_mut(ix).resource = Some(existing);
                self.pool.get_mut(ix).result = NodeResult::Ok;
                self.pool.get_mut(ix).children_discovered = true;
                self.resolve_parent(ix);
                progressed = true;
                continue;
            }

            self.in_progress_hashes.insert(node.path_hash, ix);
            let _ = hint_providers;
            let path = node.path.clone();
            let factory = Arc::clone(factory);
            let queue = self.queue.clone();
            let handle = tokio::spawn(async move { queue.load(&factory, &path).await });
            self.in_flight.insert(ix, handle);
            progressed = true;
        }
        Ok(progressed)
    }

    fn finish_node(&mut self, ix: NodeIx, outcome: resource_factory::FactoryResult<ResourceRef>) {
        match outcome {
            Ok(resource) => {
                self.pool.get_mut(ix).resource = Some(resource);
                self.pool.get_mut(ix).result = NodeResult::Ok;
            }
            Err(e) => {
                debug!(node = ?ix, error = %e, "preload node failed to create");
                self.pool.get_mut(ix).result = NodeResult::Error;
            }
        }
        self.resolve_parent(ix);
    }

    /// Count a just-resolved node against its parent's pending-children total.
    /// Non-root children aren't tracked as held references here at all —
    /// ownership of their `ResourceRef` is expected to pass to the parent's
    /// typed resource at `create` time.
    fn resolve_parent(&mut self, ix: NodeIx) {
        let Some(parent_ix) = self.pool.get(ix).parent else {
            return;
        };
        self.pool.child_resolved(parent_ix);
    }

    fn pending_nodes_depth_first(&self) -> Vec<NodeIx> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeIx> = self.roots.iter().rev().copied().collect();
        while let Some(ix) = stack.pop() {
            out.push(ix);
            let mut children = self.pool.children(ix);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    fn all_roots_terminal(&self) -> bool {
        self.roots
            .iter()
            .all(|ix| self.pool.get(*ix).result != NodeResult::Pending)
    }

    fn fire_completion_if_needed(&mut self, complete_cb: &mut impl FnMut(&[RootOutcome]) -> bool) -> PreloaderStatus {
        if self.completion_fired {
            return PreloaderStatus::Done;
        }
        self.completion_fired = true;
        let outcomes: Vec<RootOutcome> = self
            .roots
            .iter()
            .map(|ix| {
                let node = self.pool.get(*ix);
                RootOutcome {
                    path: node.path.clone(),
                    result: node.result,
                    resource: node.resource,
                }
            })
            .collect();
        if complete_cb(&outcomes) {
            PreloaderStatus::Done
        } else {
            PreloaderStatus::NotLoaded
        }
    }

    /// Release every persisted root's resource reference.
    pub async fn release_roots(&mut self, factory: &Factory) {
        for ix in &self.roots {
            if let Some(resource) = self.pool.get(*ix).resource {
                factory.release(resource).await;
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
