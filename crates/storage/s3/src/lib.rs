//! S3-compatible object storage backend for stash.
//!
//! Objects live under `prefix + key` in a single bucket. Metadata travels
//! as object user-metadata, so rewriting it is a copy-in-place. Archive
//! member listing is skipped on this backend: it would mean reading every
//! archive upload a second time.

pub mod auth;
pub mod backend;
pub mod config;
mod error;
mod mapping;

pub use backend::S3Backend;
pub use config::S3Config;
