//! Cached resource descriptors.

use crate::handler::Resource;

/// A cached resource and its bookkeeping.
pub struct Descriptor {
    pub(crate) resource: Resource,
    pub(crate) resource_size: u64,
    pub(crate) version: u16,
    pub(crate) refcount: u32,
    pub(crate) type_ext: String,
    /// Original filename, present only when reload support is enabled for this
    /// resource.
    pub(crate) reload_filename: Option<String>,
}

/// An opaque handle to a cached resource, returned by `Get` and consumed
/// by `Release`/`Reload`/`SetResource`.
///
/// The original engine hands callers a raw resource pointer and maintains
/// a reverse `pointer → hash` map so `Release` is O(1) without the
/// caller knowing the path. Exposing a stable raw pointer to callers
/// would require unsafe pinning in Rust for no real benefit here, since
/// the path-hash is already O(1) to look up — so this handle carries the
/// hash directly instead of a synthesized pointer identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub(crate) hash: u64,
}

impl ResourceRef {
    /// The path-hash this handle refers to.
    #[must_use]
    pub const fn path_hash(self) -> u64 {
        self.hash
    }
}
