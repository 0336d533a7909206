//! # filemesh - Multi-backend file synchronisation mesh
//!
//! A mesh of storage backends (local disk, in-memory, and whatever else
//! implements the [`storage::Store`] verb contract) kept in sync by
//! periodic passes that compare sidecar-recorded fingerprint history and
//! push, pull, or fork a conflict sibling per file.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use filemesh::clock::SystemClock;
//! use filemesh::mesh::Mesh;
//! use filemesh::storage::LocalStore;
//! use filemesh::sync::sync;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let local = Arc::new(LocalStore::new("./mirror".into())?);
//!     let mesh = Mesh::new(local);
//!     sync(&mesh, "", 0, None, &SystemClock).await?;
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(dead_code)]

pub mod cipher;
pub mod clock;
pub mod conflict;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod keyhash;
pub mod logging;
pub mod mesh;
pub mod metadata;
pub mod path;
pub mod progress;
pub mod storage;
pub mod sync;
pub mod watcher;
pub mod zombie;

pub use error::{SyncError, SyncResult};
pub use mesh::Mesh;

// vim: ts=4
