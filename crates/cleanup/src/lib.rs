//! Expiry enforcement for stash.
//!
//! Expired objects are removed two ways. Reads go through [`lazy`], which
//! deletes an expired object on the spot and reports it as missing. The
//! [`sweep`] walks the whole key space and deletes everything expired,
//! either once or on an interval via [`Sweeper`].

pub mod error;
pub mod lazy;
pub mod sweep;
pub mod sweeper;

pub use error::CleanupError;
pub use lazy::{get_live, head_live, serve_live};
pub use sweep::{SweepReport, sweep, sweep_at};
pub use sweeper::Sweeper;
