//! Storage Verb Contract (C1) — the uniform operation set every backend
//! implements, plus the decorator layers (C12) built on top of it.
//!
//! Grounded on `original_source/fs.go`'s `FS` interface; the trait below is
//! its direct translation, with `async fn` verbs since every implementation
//! may block on network I/O.

pub mod access;
pub mod local;
pub mod memory;
pub mod mon;
pub mod quota;
pub mod sub;
pub mod trash;

use async_trait::async_trait;
use std::any::Any;
use std::time::SystemTime;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::error::{SyncError, SyncResult};
use crate::path::FileInfo;

pub use access::Access;
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use mon::{Mon, Op, Progress};
pub use quota::Quota;
pub use sub::Sub;
pub use trash::Trash;

/// Options controlling [`Store::read_dir`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadDirOpts {
	pub include_hidden: bool,
}

/// Backend capability/limit summary (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Props {
	pub quota: u64,
	pub free: u64,
	pub min_file_size: u64,
	pub max_file_size: u64,
	pub max_retention: Option<SystemTime>,
}

impl Default for Props {
	fn default() -> Self {
		Props {
			quota: u64::MAX,
			free: u64::MAX,
			min_file_size: 0,
			max_file_size: u64::MAX,
			max_retention: None,
		}
	}
}

/// A boxed reader/writer, so the trait stays object-safe across backends.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Change-notification channel returned by [`Store::watch`]. A backend with
/// no native notification mechanism never constructs one of these.
pub type WatchReceiver = mpsc::Receiver<String>;

/// Uniform operations every backend (local mirror or attached remote) must
/// implement. See spec.md §4.1 for the full verb contract.
#[async_trait]
pub trait Store: Send + Sync {
	/// List the immediate children of `path` (no recursion).
	async fn read_dir(&self, path: &str, opts: ReadDirOpts) -> SyncResult<Vec<FileInfo>>;

	/// Metadata for a single path.
	async fn stat(&self, name: &str) -> SyncResult<FileInfo>;

	/// Stream the full contents of `name` into `writer`.
	async fn pull(&self, name: &str, writer: BoxedWriter) -> SyncResult<()>;

	/// Create-or-replace `name` with the bytes read from `reader`.
	async fn push(&self, name: &str, reader: BoxedReader) -> SyncResult<()>;

	/// Delete `name`. Absent afterwards, whether or not it existed before.
	async fn remove(&self, name: &str) -> SyncResult<()>;

	/// Ensure `name` and its ancestors exist as directories.
	async fn mkdir_all(&self, name: &str) -> SyncResult<()>;

	/// Rename `old` to `new`, atomically when the backend supports it.
	async fn rename(&self, old: &str, new: &str) -> SyncResult<()>;

	/// Set `name`'s mod-time to now.
	async fn touch(&self, name: &str) -> SyncResult<()>;

	/// Backend capability/limit summary.
	async fn props(&self) -> SyncResult<Props>;

	/// React to changes under `name`. Most backends have no native
	/// change-notification mechanism and return `NotSupported`, matching
	/// every `Watch` in the original bar the ones that never got past a
	/// `return nil` stub (spec.md §4.1).
	async fn watch(&self, _name: &str) -> SyncResult<WatchReceiver> {
		Err(SyncError::NotSupported { verb: "watch" })
	}

	/// Release backend resources. A no-op for backends that hold none.
	async fn close(&self) -> SyncResult<()>;

	/// Downcast support for construction-time decorator coalescing (e.g.
	/// `Sub(Local)`, spec.md §4.10) — never used for dynamic dispatch.
	fn as_any(&self) -> &dyn Any;
}


// vim: ts=4
