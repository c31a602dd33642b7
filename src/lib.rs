//! # Envy - Env-File Synchronization with Remote Parameter Stores
//!
//! Envy keeps local `KEY=VALUE` files and a remote parameter or secret
//! store in sync, in both directions, across the named environments of
//! a project.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use envy::config::Project;
//! use envy::sync::{PushOptions, SyncEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), envy::error::EnvyError> {
//!     let (project, _path) = Project::discover(".")?;
//!     let engine = SyncEngine::new(project)?;
//!     let summary = engine.push(&PushOptions::default()).await?;
//!     println!("Pushed {} variables", summary.pushed);
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]

pub mod cache;
pub mod config;
pub mod diff;
pub mod envfile;
pub mod error;
pub mod logging;
pub mod parallel;
pub mod remote;
pub mod retry;
pub mod sync;
pub mod update_check;
pub mod validation;

// Re-export commonly used types and functions
pub use cache::{Cache, CacheStatsSnapshot};
pub use config::{Environment, Project};
pub use diff::{diff, DiffResult};
pub use envfile::{EnvFile, StreamingParser, Variable};
pub use error::{EnvyError, EnvyResult, ErrorKind};
pub use remote::{KeyType, RemoteKey, RemoteStore};
pub use sync::{PullOptions, PushOptions, SyncEngine};
pub use validation::{validate, RuleSet, ValidationOutcome};

// vim: ts=4
