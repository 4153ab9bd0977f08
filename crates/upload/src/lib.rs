//! Upload processing for stash.
//!
//! [`Uploader::process`] turns a client byte stream and an optional
//! filename into a stored object under a fresh key:
//!
//! 1. split the filename into a slugified barename and an extension,
//!    sniffing the extension from content when none was given
//! 2. pick a random barename when asked to, or when none was derivable
//! 3. resolve collisions against the backend (overwrite with a matching
//!    delete key, otherwise retry with a new name)
//! 4. reject reserved names, clamp the expiry, generate a delete key
//! 5. hand the stream to the backend
//!
//! Collision resolution is check-then-act. Two concurrent uploads racing
//! for the same name can both see it free, and the later `put` replaces
//! the earlier object.

pub mod error;
pub mod expiry;
pub mod manage;
pub mod naming;
pub mod pipeline;
pub mod policy;

pub use error::UploadError;
pub use manage::delete_with_key;
pub use pipeline::{Upload, UploadRequest, Uploader};
pub use policy::UploadPolicy;
