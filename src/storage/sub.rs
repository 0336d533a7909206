//! Subtree decorator (C12), grounded on `original_source/fs_sub.go`.
//!
//! Rebases every verb onto a fixed subdirectory of the wrapped store, so a
//! mesh component can be handed a view of just one corner of a backend.

use async_trait::async_trait;
use std::sync::Arc;

use super::{BoxedReader, BoxedWriter, LocalStore, Props, ReadDirOpts, Store, WatchReceiver};
use crate::error::SyncResult;
use crate::path::{self, FileInfo};

pub struct Sub {
	inner: Arc<dyn Store>,
	dir: String,
}

impl Sub {
	/// Wrap `inner`, rebasing all paths under `dir`. Two cases collapse at
	/// construction time instead of adding a layer of indirection
	/// (spec.md §4.10, §9 "Cyclic-rename decorator dispatch"): nesting
	/// `Sub(Sub(x, a), b)` combines into a single `Sub` over `x` with the
	/// joined path, and `Sub(Local, dir)` collapses into a single
	/// deeper-rooted `Local` rather than double-wrapping.
	pub fn new(inner: Arc<dyn Store>, dir: impl Into<String>) -> Arc<dyn Store> {
		let dir = dir.into();

		if let Some(local) = inner.as_any().downcast_ref::<LocalStore>() {
			return Arc::new(local.sub(&dir));
		}
		if let Some(sub) = inner.as_any().downcast_ref::<Sub>() {
			return Sub::new(sub.inner.clone(), path::join(&sub.dir, &dir));
		}

		Arc::new(Sub { inner, dir })
	}

	/// Combine this subtree's directory with a nested one, for callers that
	/// hold a `Sub` directly and want to descend further without adding a
	/// layer of indirection.
	pub fn nested(&self, dir: &str) -> Arc<dyn Store> {
		Sub::new(self.inner.clone(), path::join(&self.dir, dir))
	}

	fn rebase(&self, name: &str) -> String {
		path::join(&self.dir, name)
	}
}

#[async_trait]
impl Store for Sub {
	async fn read_dir(&self, dir: &str, opts: ReadDirOpts) -> SyncResult<Vec<FileInfo>> {
		self.inner.read_dir(&self.rebase(dir), opts).await
	}

	async fn stat(&self, name: &str) -> SyncResult<FileInfo> {
		self.inner.stat(&self.rebase(name)).await
	}

	async fn pull(&self, name: &str, writer: BoxedWriter) -> SyncResult<()> {
		self.inner.pull(&self.rebase(name), writer).await
	}

	async fn push(&self, name: &str, reader: BoxedReader) -> SyncResult<()> {
		self.inner.push(&self.rebase(name), reader).await
	}

	async fn remove(&self, name: &str) -> SyncResult<()> {
		self.inner.remove(&self.rebase(name)).await
	}

	async fn mkdir_all(&self, name: &str) -> SyncResult<()> {
		self.inner.mkdir_all(&self.rebase(name)).await
	}

	async fn rename(&self, old: &str, new: &str) -> SyncResult<()> {
		self.inner.rename(&self.rebase(old), &self.rebase(new)).await
	}

	async fn touch(&self, name: &str) -> SyncResult<()> {
		self.inner.touch(&self.rebase(name)).await
	}

	async fn props(&self) -> SyncResult<Props> {
		self.inner.props().await
	}

	async fn watch(&self, name: &str) -> SyncResult<WatchReceiver> {
		self.inner.watch(&self.rebase(name)).await
	}

	async fn close(&self) -> SyncResult<()> {
		Ok(())
	}

	fn as_any(&self) -> &dyn std::any::Any {
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::storage::memory::MemoryStore;

	#[tokio::test]
	async fn rebases_paths_under_dir() {
		let backing = Arc::new(MemoryStore::new());
		backing.write_bytes("project/a.txt", b"hi").await.unwrap();

		let sub: Arc<dyn Store> = Sub::new(backing.clone(), "project");
		let info = sub.stat("a.txt").await.unwrap();
		assert_eq!(info.size, 2);
	}

	#[tokio::test]
	async fn nested_combines_directories() {
		let backing = Arc::new(MemoryStore::new());
		backing.write_bytes("a/b/c.txt", b"hey").await.unwrap();

		let sub = Sub { inner: backing.clone(), dir: "a".to_string() };
		let deeper = sub.nested("b");
		let info = deeper.stat("c.txt").await.unwrap();
		assert_eq!(info.size, 3);
	}

	#[tokio::test]
	async fn sub_of_local_collapses_into_a_deeper_local() {
		let tmp = tempfile::tempdir().unwrap();
		let local: Arc<dyn Store> = Arc::new(LocalStore::new(tmp.path()).unwrap());

		let sub = Sub::new(local, "project");
		assert!(sub.as_any().downcast_ref::<LocalStore>().is_some());

		sub.push("a.txt", Box::new(std::io::Cursor::new(b"hi".to_vec()))).await.unwrap();
		assert!(tmp.path().join("project/a.txt").exists());
	}

	#[tokio::test]
	async fn nested_subs_collapse_into_one() {
		let backing = Arc::new(MemoryStore::new());
		backing.write_bytes("a/b/c.txt", b"hey").await.unwrap();

		let outer = Sub::new(backing.clone(), "a");
		let inner = Sub::new(outer, "b");
		assert!(inner.as_any().downcast_ref::<Sub>().is_some());

		let info = inner.stat("c.txt").await.unwrap();
		assert_eq!(info.size, 3);
	}
}

// vim: ts=4
