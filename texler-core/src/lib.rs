//! # texler-core: Project model for the Texler editor engine
//!
//! Synchronous, I/O-free data model shared by the sync engine and its
//! drivers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   hydrate    ┌──────────────────┐
//! │ ProjectDetails   │ ───────────► │ ProjectState     │
//! │ (remote catalog) │              │ files / tabs /   │
//! └──────────────────┘              │ main / version   │
//!                                   └────────┬─────────┘
//!                                            │ snapshot()
//!                                            ▼
//!                                   ┌──────────────────┐
//!                                   │ CompilationSnap. │ ──► compile request
//!                                   └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`catalog`]: Workspace / project payloads from the remote store
//! - [`file`]: File records and their remote-sync status
//! - [`project`]: The project state store
//! - [`snapshot`]: Compile request view of a project
//! - [`artifact`]: Hex decoding of rendered artifacts
//! - [`error`]: Validation errors

pub mod artifact;
pub mod catalog;
pub mod error;
pub mod file;
pub mod project;
pub mod snapshot;

// Re-exports for convenience
pub use artifact::{decode_hex, encode_hex, Artifact, ArtifactError};
pub use catalog::{
    ProjectDetails, ProjectId, ProjectSummary, RemoteFile, WorkspaceId, WorkspaceSummary,
};
pub use error::ValidationError;
pub use file::{FileRecord, SyncStatus};
pub use project::ProjectState;
pub use snapshot::CompilationSnapshot;
