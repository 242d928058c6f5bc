//! Core engine of the slipstream content synchronizer.
//!
//! Given an installation directory and a remote release feed, this crate
//! resolves the current release, downloads its packaged archive, and
//! reconciles the directory to match the archive exactly: changed files
//! are replaced, byte-identical files are left untouched, and entries no
//! longer shipped by the release are pruned, with a fixed set of
//! user-data roots exempt from deletion.
//!
//! The presentation layer lives elsewhere; it consumes the session's
//! event channel and feeds back a single stop request.

pub mod checksum;
mod config;
mod error;
pub mod fetch;
pub mod prune;
pub mod reconcile;
mod session;

/// Session configuration: release feed, target directory, preserved
/// roots, timeouts.
pub use config::{DEFAULT_PRESERVED_ROOTS, SyncConfig};
/// Failure taxonomy shared by all stages.
pub use error::SyncError;
/// Opaque remote version token.
pub use fetch::VersionId;
/// Orchestrator, its control handle, and the event/outcome types.
pub use session::{EventSink, Outcome, SessionHandle, UpdateEvent, UpdateSession};
