//! # texler-sync: Sync engine for the Texler editor
//!
//! Keeps an in-memory multi-file LaTeX project in step with the workspace
//! API and drives the typesetting service for previews.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐ hydrate ┌──────────────┐ edits ┌──────────────────────┐
//! │ Catalog    │ ──────► │ ProjectState │ ────► │ PersistenceScheduler │ ──► PUT file
//! │ Client     │         │  (Session)   │       └──────────────────────┘
//! └────────────┘         └──────┬───────┘
//!                               │ version / active path
//!                               ▼
//!                        ┌──────────────┐       ┌──────────────────────┐
//!                        │ CompileTrig. │ ────► │ CompileOrchestrator  │ ──► POST /compile
//!                        └──────────────┘       └──────────┬───────────┘
//!                                                          ▼
//!                                                   PreviewSurface
//! ```
//!
//! ## Modules
//!
//! - [`engine`]: Facade tying everything together
//! - [`catalog`]: Cached workspace catalog
//! - [`persistence`]: Per-path debounced saves
//! - [`compile`]: Compile requests, outcomes and the debounced trigger
//! - [`preview`]: Preview surfaces and the scoped display handle
//! - [`credentials`]: Bearer credential gate
//! - [`remote`] / [`http`]: Remote API trait and its HTTP client
//! - [`config`]: Engine configuration
//! - [`error`]: Error taxonomy

pub mod catalog;
pub mod compile;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
pub mod http;
pub mod persistence;
pub mod preview;
pub mod remote;
pub mod session;

// Re-exports for convenience
pub use catalog::CatalogClient;
pub use compile::{ArtifactInfo, CompileOrchestrator, CompileOutcome, CompileTrigger};
pub use config::EngineConfig;
pub use credentials::{AuthState, CredentialGate};
pub use engine::Engine;
pub use error::{ApiError, CompileError, SyncError};
pub use http::HttpRemote;
pub use persistence::{PendingWrite, PersistenceScheduler};
pub use preview::{MemorySurface, PreviewError, PreviewHandle, PreviewId, PreviewSurface};
pub use remote::{CompileResponse, Diagnostic, RemoteApi};
pub use session::{EngineEvent, Session, WriteTarget};
