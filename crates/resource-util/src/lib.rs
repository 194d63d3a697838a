//! Canonical path normalization, digest helpers and the pluggable decrypt
//! hook shared by every layer of the resource runtime.
//!
//! This crate mirrors the "Util" component of the resource subsystem: it
//! owns nothing stateful except the process-wide decrypt hook, and every
//! other crate in the workspace depends on it for path hashing and digest
//! comparisons.

#![warn(missing_docs)]

pub mod digest;
pub mod error;
pub mod hash;
pub mod path;
pub mod xtea;

pub use digest::{compute_digest, DigestCompare, HashAlgorithm};
pub use error::{UtilError, UtilResult};
pub use hash::path_hash64;
pub use path::canonicalize;
pub use xtea::{decrypt_buffer, register_decrypt_fn, DecryptFn};
