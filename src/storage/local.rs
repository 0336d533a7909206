//! Filesystem-backed [`Store`], grounded on `original_source/fs_local.go`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::{BoxedReader, BoxedWriter, Props, ReadDirOpts, Store};
use crate::error::{SyncError, SyncResult};
use crate::path::{self, FileInfo};

/// Backs the mesh's local mirror (and, in principle, any filesystem-shaped
/// remote) by a real directory on disk.
pub struct LocalStore {
	mount: PathBuf,
}

impl LocalStore {
	pub fn new(mount: impl Into<PathBuf>) -> SyncResult<Self> {
		let mount = mount.into();
		let mount = mount.canonicalize().unwrap_or(mount);
		Ok(LocalStore { mount })
	}

	fn real_path(&self, name: &str) -> PathBuf {
		let mut p = self.mount.clone();
		for part in name.split('/').filter(|s| !s.is_empty()) {
			p.push(part);
		}
		p
	}

	/// A `LocalStore` rooted deeper under `dir`, for `Sub::new`'s
	/// construction-time `Sub(Local)` collapse (spec.md §4.10).
	pub(crate) fn sub(&self, dir: &str) -> LocalStore {
		LocalStore { mount: self.real_path(dir) }
	}

	fn mod_time_secs(meta: &std::fs::Metadata) -> u64 {
		meta.modified()
			.ok()
			.and_then(|t| t.duration_since(UNIX_EPOCH).ok())
			.map(|d| d.as_secs())
			.unwrap_or(0)
	}
}

#[async_trait]
impl Store for LocalStore {
	async fn read_dir(&self, dir: &str, opts: ReadDirOpts) -> SyncResult<Vec<FileInfo>> {
		let real = self.real_path(dir);
		let mut entries = tokio::fs::read_dir(&real).await?;
		let mut out = Vec::new();
		while let Some(entry) = entries.next_entry().await? {
			let name = entry.file_name().to_string_lossy().into_owned();
			if !opts.include_hidden && name.starts_with('.') {
				continue;
			}
			let meta = entry.metadata().await?;
			out.push(FileInfo {
				name,
				size: meta.len(),
				is_dir: meta.is_dir(),
				mod_time: Self::mod_time_secs(&meta),
			});
		}
		Ok(out)
	}

	async fn stat(&self, name: &str) -> SyncResult<FileInfo> {
		let real = self.real_path(name);
		let meta = tokio::fs::metadata(&real).await?;
		let (_, base) = path::split(name);
		Ok(FileInfo {
			name: base.to_string(),
			size: meta.len(),
			is_dir: meta.is_dir(),
			mod_time: Self::mod_time_secs(&meta),
		})
	}

	async fn pull(&self, name: &str, mut writer: BoxedWriter) -> SyncResult<()> {
		let real = self.real_path(name);
		let mut file = tokio::fs::File::open(&real).await?;
		tokio::io::copy(&mut file, &mut writer).await.map_err(SyncError::from)?;
		writer.flush().await.map_err(SyncError::from)?;
		Ok(())
	}

	async fn push(&self, name: &str, mut reader: BoxedReader) -> SyncResult<()> {
		let real = self.real_path(name);
		if let Some(parent) = real.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		let mut file = tokio::fs::File::create(&real).await?;
		let mut buf = Vec::new();
		reader.read_to_end(&mut buf).await.map_err(SyncError::from)?;
		file.write_all(&buf).await?;
		file.flush().await?;
		Ok(())
	}

	async fn remove(&self, name: &str) -> SyncResult<()> {
		let real = self.real_path(name);
		match tokio::fs::metadata(&real).await {
			Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(&real).await?,
			Ok(_) => tokio::fs::remove_file(&real).await?,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
			Err(e) => return Err(e.into()),
		}
		Ok(())
	}

	async fn mkdir_all(&self, name: &str) -> SyncResult<()> {
		let real = self.real_path(name);
		tokio::fs::create_dir_all(&real).await?;
		Ok(())
	}

	async fn rename(&self, old: &str, new: &str) -> SyncResult<()> {
		let old_real = self.real_path(old);
		let new_real = self.real_path(new);
		if let Some(parent) = new_real.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		tokio::fs::rename(&old_real, &new_real).await?;
		Ok(())
	}

	async fn touch(&self, name: &str) -> SyncResult<()> {
		let real = self.real_path(name);
		let now = filetime::FileTime::now();
		filetime::set_file_times(&real, now, now)
			.map_err(|e| SyncError::Io(e.to_string()))?;
		Ok(())
	}

	async fn props(&self) -> SyncResult<Props> {
		Ok(Props::default())
	}

	async fn close(&self) -> SyncResult<()> {
		Ok(())
	}

	fn as_any(&self) -> &dyn std::any::Any {
		self
	}
}

/// True when `name`'s basename starts with `.` — used by backends (this one
/// included) that need to decide visibility without a full `Store` handle.
pub fn is_unix_hidden(path: &Path) -> bool {
	path.file_name().map(|n| n.to_string_lossy().starts_with('.')).unwrap_or(false)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::storage::ReadDirOpts;
	use tempfile::TempDir;
	use tokio::io::AsyncReadExt as _;

	#[tokio::test]
	async fn push_then_pull_round_trips_on_disk() {
		let tmp = TempDir::new().unwrap();
		let store = LocalStore::new(tmp.path()).unwrap();

		store.push("a/b.txt", Box::new(std::io::Cursor::new(b"hello".to_vec()))).await.unwrap();

		let info = store.stat("a/b.txt").await.unwrap();
		assert_eq!(info.size, 5);

		let (client, mut server) = tokio::io::duplex(64);
		let store_ref = &store;
		let (pull_result, mut buf) = tokio::join!(
			async move { store_ref.pull("a/b.txt", Box::new(client)).await },
			async move {
				let mut buf = Vec::new();
				server.read_to_end(&mut buf).await.unwrap();
				buf
			}
		);
		pull_result.unwrap();
		assert_eq!(std::mem::take(&mut buf), b"hello");
	}

	#[tokio::test]
	async fn read_dir_filters_hidden_by_default() {
		let tmp = TempDir::new().unwrap();
		let store = LocalStore::new(tmp.path()).unwrap();
		store.push("visible.txt", Box::new(std::io::Cursor::new(b"x".to_vec()))).await.unwrap();
		store.push(".hidden", Box::new(std::io::Cursor::new(b"y".to_vec()))).await.unwrap();

		let listed = store.read_dir("", ReadDirOpts::default()).await.unwrap();
		assert_eq!(listed.len(), 1);
		assert_eq!(listed[0].name, "visible.txt");
	}

	#[tokio::test]
	async fn remove_missing_is_not_an_error() {
		let tmp = TempDir::new().unwrap();
		let store = LocalStore::new(tmp.path()).unwrap();
		assert!(store.remove("missing").await.is_ok());
	}
}

// vim: ts=4
