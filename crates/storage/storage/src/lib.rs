//! Storage contract for stash.
//!
//! Every backend implements [`StorageBackend`] over the shared [`Metadata`]
//! and [`Expiry`] model. The helpers in this crate are backend-agnostic:
//!
//! - [`fingerprint`] hashes, sizes and sniffs a byte stream in one pass
//! - [`archive`] lists the members of tar, gzip, bzip2 and zip uploads
//! - [`serve`] turns a stored object into a ranged HTTP response
//! - [`migrate`] copies a whole key space between two backends
//! - [`testing`] is the conformance suite backends run in their tests

pub mod archive;
pub mod backend;
pub mod error;
pub mod fingerprint;
pub mod io;
pub mod key;
pub mod metadata;
pub mod migrate;
pub mod serve;
pub mod testing;

pub use backend::{KeyStream, PutOptions, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use io::{LimitExceeded, LimitedReader, ObjectReader};
pub use key::StorageKey;
pub use metadata::{Expiry, Metadata};
pub use migrate::{MigrationReport, migrate};
