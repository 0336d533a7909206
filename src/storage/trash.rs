//! Soft-delete decorator (C12). The original's `fs_trash.go` file existed
//! but carried no implementation; this one is built from spec.md §4.10:
//! `remove(name)` becomes `rename(name, folder/name)`, except for removes
//! that already target something inside the trash folder itself (those
//! fall through to a real delete, or the trash would never shrink).

use async_trait::async_trait;
use std::sync::Arc;

use super::{BoxedReader, BoxedWriter, Props, ReadDirOpts, Store, WatchReceiver};
use crate::error::SyncResult;
use crate::path::{self, FileInfo};

pub struct Trash {
	inner: Arc<dyn Store>,
	folder: String,
}

impl Trash {
	pub fn new(inner: Arc<dyn Store>, folder: impl Into<String>) -> Self {
		Trash { inner, folder: folder.into() }
	}

	fn is_in_trash(&self, name: &str) -> bool {
		name == self.folder || name.starts_with(&format!("{}/", self.folder))
	}
}

#[async_trait]
impl Store for Trash {
	async fn read_dir(&self, dir: &str, opts: ReadDirOpts) -> SyncResult<Vec<FileInfo>> {
		self.inner.read_dir(dir, opts).await
	}

	async fn stat(&self, name: &str) -> SyncResult<FileInfo> {
		self.inner.stat(name).await
	}

	async fn pull(&self, name: &str, writer: BoxedWriter) -> SyncResult<()> {
		self.inner.pull(name, writer).await
	}

	async fn push(&self, name: &str, reader: BoxedReader) -> SyncResult<()> {
		self.inner.push(name, reader).await
	}

	async fn remove(&self, name: &str) -> SyncResult<()> {
		if self.is_in_trash(name) {
			return self.inner.remove(name).await;
		}
		let destination = path::join(&self.folder, name);
		self.inner.mkdir_all(&self.folder).await?;
		self.inner.rename(name, &destination).await
	}

	async fn mkdir_all(&self, name: &str) -> SyncResult<()> {
		self.inner.mkdir_all(name).await
	}

	async fn rename(&self, old: &str, new: &str) -> SyncResult<()> {
		self.inner.rename(old, new).await
	}

	async fn touch(&self, name: &str) -> SyncResult<()> {
		self.inner.touch(name).await
	}

	async fn props(&self) -> SyncResult<Props> {
		self.inner.props().await
	}

	async fn watch(&self, name: &str) -> SyncResult<WatchReceiver> {
		self.inner.watch(name).await
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
	async fn remove_moves_file_into_trash_folder() {
		let backing = Arc::new(MemoryStore::new());
		backing.write_bytes("doc.txt", b"content").await.unwrap();
		let trash = Trash::new(backing.clone(), ".trash");

		trash.remove("doc.txt").await.unwrap();

		assert!(!backing.exists("doc.txt"));
		assert!(backing.exists(".trash/doc.txt"));
	}

	#[tokio::test]
	async fn remove_inside_trash_deletes_for_real() {
		let backing = Arc::new(MemoryStore::new());
		backing.write_bytes(".trash/doc.txt", b"content").await.unwrap();
		let trash = Trash::new(backing.clone(), ".trash");

		trash.remove(".trash/doc.txt").await.unwrap();

		assert!(!backing.exists(".trash/doc.txt"));
		assert!(!backing.exists(".trash/.trash/doc.txt"));
	}
}

// vim: ts=4
