//! In-memory [`Store`] used by every scenario test in spec.md §8 and by
//! unit tests of every layer built on top of the verb contract. The
//! original sync engine has no equivalent (it always talks to a real or
//! subprocess-backed filesystem); this is the crate's test double.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::{BoxedReader, BoxedWriter, Props, ReadDirOpts, Store};
use crate::error::{SyncError, SyncResult};
use crate::path::{self, FileInfo};

#[derive(Debug, Clone)]
struct Entry {
	data: Vec<u8>,
	mod_time: u64,
}

/// A flat in-memory filesystem keyed by full virtual path. Directories are
/// implicit: any prefix of a stored file's path that ends before a `/` is a
/// directory for listing purposes.
pub struct MemoryStore {
	files: Mutex<BTreeMap<String, Entry>>,
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryStore {
	pub fn new() -> Self {
		MemoryStore { files: Mutex::new(BTreeMap::new()) }
	}

	/// Test convenience: write bytes directly, without going through an
	/// `AsyncRead` adapter.
	pub async fn write_bytes(&self, name: &str, data: &[u8]) -> SyncResult<()> {
		let name = path::normalize(name)?;
		let mut files = self.files.lock().unwrap();
		let mod_time = path::now_secs();
		files.insert(name, Entry { data: data.to_vec(), mod_time });
		Ok(())
	}

	/// Test convenience: write bytes with an explicit mod-time, so tests can
	/// control ordering deterministically.
	pub async fn write_bytes_at(&self, name: &str, data: &[u8], mod_time: u64) -> SyncResult<()> {
		let name = path::normalize(name)?;
		let mut files = self.files.lock().unwrap();
		files.insert(name, Entry { data: data.to_vec(), mod_time });
		Ok(())
	}

	pub async fn read_bytes(&self, name: &str) -> SyncResult<Vec<u8>> {
		let name = path::normalize(name)?;
		let files = self.files.lock().unwrap();
		files
			.get(&name)
			.map(|e| e.data.clone())
			.ok_or_else(|| SyncError::NotFound { path: name })
	}

	pub fn exists(&self, name: &str) -> bool {
		let files = self.files.lock().unwrap();
		files.contains_key(name)
	}
}

#[async_trait]
impl Store for MemoryStore {
	async fn read_dir(&self, dir: &str, opts: ReadDirOpts) -> SyncResult<Vec<FileInfo>> {
		let dir = path::normalize(dir)?;
		let files = self.files.lock().unwrap();
		let prefix = if dir.is_empty() { String::new() } else { format!("{}/", dir) };

		let mut seen_dirs = std::collections::BTreeSet::new();
		let mut out = Vec::new();
		for (name, entry) in files.iter() {
			let rest = match name.strip_prefix(prefix.as_str()) {
				Some(r) if !r.is_empty() => r,
				_ => continue,
			};
			match rest.find('/') {
				Some(idx) => {
					let sub = &rest[..idx];
					if seen_dirs.insert(sub.to_string())
						&& (opts.include_hidden || !sub.starts_with('.'))
					{
						out.push(FileInfo::dir(sub));
					}
				}
				None => {
					if opts.include_hidden || !rest.starts_with('.') {
						out.push(FileInfo::file(rest, entry.data.len() as u64, entry.mod_time));
					}
				}
			}
		}
		Ok(out)
	}

	async fn stat(&self, name: &str) -> SyncResult<FileInfo> {
		let name = path::normalize(name)?;
		let files = self.files.lock().unwrap();
		files
			.get(&name)
			.map(|e| FileInfo::file(name.clone(), e.data.len() as u64, e.mod_time))
			.ok_or(SyncError::NotFound { path: name })
	}

	async fn pull(&self, name: &str, mut writer: BoxedWriter) -> SyncResult<()> {
		let data = self.read_bytes(name).await?;
		writer.write_all(&data).await.map_err(|e| SyncError::Io(e.to_string()))?;
		writer.flush().await.map_err(|e| SyncError::Io(e.to_string()))?;
		Ok(())
	}

	async fn push(&self, name: &str, mut reader: BoxedReader) -> SyncResult<()> {
		let mut buf = Vec::new();
		reader.read_to_end(&mut buf).await.map_err(|e| SyncError::Io(e.to_string()))?;
		self.write_bytes(name, &buf).await
	}

	async fn remove(&self, name: &str) -> SyncResult<()> {
		let name = path::normalize(name)?;
		let mut files = self.files.lock().unwrap();
		files.remove(&name);
		Ok(())
	}

	async fn mkdir_all(&self, _name: &str) -> SyncResult<()> {
		// Directories are implicit; nothing to materialise.
		Ok(())
	}

	async fn rename(&self, old: &str, new: &str) -> SyncResult<()> {
		let old = path::normalize(old)?;
		let new = path::normalize(new)?;
		let mut files = self.files.lock().unwrap();
		let entry = files.remove(&old).ok_or(SyncError::NotFound { path: old })?;
		files.insert(new, entry);
		Ok(())
	}

	async fn touch(&self, name: &str) -> SyncResult<()> {
		let name = path::normalize(name)?;
		let mut files = self.files.lock().unwrap();
		let entry = files.get_mut(&name).ok_or(SyncError::NotFound { path: name })?;
		entry.mod_time = path::now_secs();
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

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn rename_moves_entry() {
		let store = MemoryStore::new();
		store.write_bytes("a", b"x").await.unwrap();
		store.rename("a", "b").await.unwrap();
		assert!(!store.exists("a"));
		assert_eq!(store.read_bytes("b").await.unwrap(), b"x");
	}

	#[tokio::test]
	async fn stat_missing_is_not_found() {
		let store = MemoryStore::new();
		assert!(matches!(store.stat("missing").await, Err(SyncError::NotFound { .. })));
	}

	#[tokio::test]
	async fn read_dir_lists_subdirectory_names_once() {
		let store = MemoryStore::new();
		store.write_bytes("a/x", b"1").await.unwrap();
		store.write_bytes("a/y", b"2").await.unwrap();
		let top = store.read_dir("", ReadDirOpts::default()).await.unwrap();
		assert_eq!(top.len(), 1);
		assert!(top[0].is_dir);
		assert_eq!(top[0].name, "a");
	}
}

// vim: ts=4
