//! Bundle archive (`.arci`/`.arcd`) format and live-update archive
//! mutation for the resource runtime.
//!
//! An archive pairs a sorted-hash index ([`index::ArchiveIndex`]) with a
//! payload data file ([`data::ArchiveData`]); [`container::Archive`] ties
//! the two together and adds the insert/publish flow that live-update
//! mounts use to append resources pushed from a server at runtime.

#![warn(missing_docs)]

pub mod container;
pub mod data;
pub mod error;
pub mod format;
pub mod index;

pub use container::Archive;
pub use data::{read_entry, ArchiveData};
pub use error::{ArchiveError, ArchiveResult};
pub use format::{entry_flags, ArchiveEntry, IndexHeader, LiveUpdateHeader, HASH_SLOT_SIZE, INDEX_VERSION, NOT_COMPRESSED};
pub use index::ArchiveIndex;
