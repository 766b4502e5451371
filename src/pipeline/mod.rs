//! Compile pipeline for luac-batch
//!
//! Turns every Lua source file under a resource tree into a compiled
//! artifact, rewrites the resource manifest to point at the artifacts, and
//! rolls the tree back from a snapshot when anything fails.
//!
//! # Overview
//!
//! The pipeline consists of:
//! - **Discovery**: Walk the resource tree and find sources and the manifest
//! - **Backup**: Snapshot the tree before any mutation (optional)
//! - **Compile**: Run a [`CompileBackend`] over every source on a bounded pool
//! - **Manifest**: Rewrite source references to artifact references
//! - **Rollback**: Restore the snapshot if any stage fails
//!
//! # Example
//!
//! ```ignore
//! use luac_batch::config::load_config;
//! use luac_batch::pipeline::{CompileContext, Pipeline};
//!
//! let config = load_config(None)?;
//! let context = CompileContext::new(config, "resources/race".into());
//! let summary = Pipeline::new(context).run()?;
//! println!("{}", summary.summary());
//! ```

pub mod backend;
pub mod backup;
pub mod context;
pub mod controller;
pub mod discovery;
pub mod error;
pub mod job;
pub mod manifest;
pub mod orchestrator;
pub mod progress;
pub mod result;

pub use backend::{create_backend, BackendError, BackendInitError, CompileBackend};
pub use backup::{backup, restore, BackupError, BackupRecord, RestoreError};
pub use context::*;
pub use controller::*;
pub use discovery::*;
pub use error::*;
pub use job::*;
pub use manifest::*;
pub use orchestrator::*;
pub use result::*;
