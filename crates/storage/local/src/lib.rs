//! Local filesystem backend for stash.
//!
//! Each object is a file named after its key under the files directory,
//! with a JSON sidecar of the same name under a separate metadata
//! directory. Writes land in a hidden temporary file and are renamed into
//! place only once both the bytes and the sidecar are complete.

pub mod backend;
pub mod config;
mod sidecar;

pub use backend::LocalBackend;
pub use config::LocalConfig;
