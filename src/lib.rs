//! Idempotent loader for nested sports documents.
//!
//! Season schedules, game-line snapshots, event odds snapshots and rosters are
//! walked into normalized records, their shared entities resolved to stable
//! identities, and the facts written to a relational sink. Re-running a load over
//! the same documents leaves every table as it was.
//!
//! # Modules
//!
//! - [`source`] - Document source trait and the JSON directory source
//! - [`model`] - Typed document models and normalized rows
//! - [`walker`] - Document -> normalized record decomposition
//! - [`cache`] / [`resolver`] - Natural key -> identity resolution
//! - [`writer`] - Fact rows and their conflict policies
//! - [`coordinator`] - Run state machine, transaction and summary
//! - [`sink`] - Relational sink trait with Postgres and in-memory implementations
//! - [`config`] / [`error`]

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod resolver;
pub mod sink;
pub mod source;
pub mod walker;
pub mod writer;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use config::Config;
pub use coordinator::{LoadPlan, RunCoordinator, RunFailed, RunState, RunSummary};
pub use error::{LoadError, SinkError, SourceError};
pub use sink::{MemorySink, PgSink, Sink};
pub use source::{Document, DocumentFilter, DocumentKind, DocumentSource, JsonDirSource};
