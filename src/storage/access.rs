//! Group-based access decorator (C12), grounded on
//! `original_source/store/fs_access.go`.
//!
//! Wraps a store so only files whose sidecar `group` attribute is in the
//! allowed set are visible at all: `read_dir` filters them out, and every
//! other verb returns [`SyncError::Permission`] for a name outside the
//! allowed groups. Group lookups go through the metadata sidecar, so a TTL
//! cache avoids re-reading it on every call in a hot loop.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{BoxedReader, BoxedWriter, Props, ReadDirOpts, Store, WatchReceiver};
use crate::error::{SyncError, SyncResult};
use crate::metadata;
use crate::path::{self, FileInfo};

struct CachedGroup {
	group: String,
	at: Instant,
}

pub struct Access {
	inner: Arc<dyn Store>,
	groups: Vec<String>,
	cache: Mutex<HashMap<String, CachedGroup>>,
	ttl: Duration,
}

impl Access {
	pub fn new(inner: Arc<dyn Store>, groups: Vec<String>, ttl: Duration) -> Self {
		Access { inner, groups, cache: Mutex::new(HashMap::new()), ttl }
	}

	async fn group_of(&self, name: &str) -> String {
		if let Some(cached) = self.cache.lock().unwrap().get(name) {
			if cached.at.elapsed() < self.ttl {
				return cached.group.clone();
			}
		}
		let group = metadata::get_meta(self.inner.as_ref(), name)
			.await
			.map(|attr| attr.group)
			.unwrap_or_default();
		self.cache.lock().unwrap().insert(name.to_string(), CachedGroup { group: group.clone(), at: Instant::now() });
		group
	}

	async fn is_accessible(&self, name: &str) -> bool {
		let group = self.group_of(name).await;
		self.groups.iter().any(|g| g == &group)
	}
}

#[async_trait]
impl Store for Access {
	async fn read_dir(&self, dir: &str, opts: ReadDirOpts) -> SyncResult<Vec<FileInfo>> {
		let listed = self.inner.read_dir(dir, opts).await?;
		let mut out = Vec::new();
		for entry in listed {
			let full = path::join(dir, &entry.name);
			if self.is_accessible(&full).await {
				out.push(entry);
			}
		}
		Ok(out)
	}

	async fn stat(&self, name: &str) -> SyncResult<FileInfo> {
		if !self.is_accessible(name).await {
			return Err(SyncError::Permission { path: name.to_string() });
		}
		self.inner.stat(name).await
	}

	async fn pull(&self, name: &str, writer: BoxedWriter) -> SyncResult<()> {
		if !self.is_accessible(name).await {
			return Err(SyncError::Permission { path: name.to_string() });
		}
		self.inner.pull(name, writer).await
	}

	async fn push(&self, name: &str, reader: BoxedReader) -> SyncResult<()> {
		if self.inner.stat(name).await.is_ok() && !self.is_accessible(name).await {
			return Err(SyncError::Permission { path: name.to_string() });
		}
		self.inner.push(name, reader).await
	}

	async fn remove(&self, name: &str) -> SyncResult<()> {
		if !self.is_accessible(name).await {
			return Err(SyncError::Permission { path: name.to_string() });
		}
		self.inner.remove(name).await
	}

	async fn mkdir_all(&self, name: &str) -> SyncResult<()> {
		self.inner.mkdir_all(name).await
	}

	async fn rename(&self, old: &str, new: &str) -> SyncResult<()> {
		if !self.is_accessible(old).await {
			return Err(SyncError::Permission { path: old.to_string() });
		}
		self.inner.rename(old, new).await
	}

	async fn touch(&self, name: &str) -> SyncResult<()> {
		if !self.is_accessible(name).await {
			return Err(SyncError::Permission { path: name.to_string() });
		}
		self.inner.touch(name).await
	}

	async fn props(&self) -> SyncResult<Props> {
		Ok(Props::default())
	}

	async fn watch(&self, name: &str) -> SyncResult<WatchReceiver> {
		if !self.is_accessible(name).await {
			return Err(SyncError::Permission { path: name.to_string() });
		}
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
	use crate::metadata::Attr;
	use crate::storage::memory::MemoryStore;

	#[tokio::test]
	async fn denies_reads_outside_allowed_groups() {
		let backing = Arc::new(MemoryStore::new());
		backing.write_bytes("secret.txt", b"x").await.unwrap();
		metadata::set_meta(backing.as_ref(), "secret.txt", &Attr { group: "vault".into(), ..Attr::default() })
			.await
			.unwrap();

		let access = Access::new(backing.clone(), vec!["team".to_string()], Duration::from_secs(60));
		assert!(matches!(access.stat("secret.txt").await, Err(SyncError::Permission { .. })));
	}

	#[tokio::test]
	async fn allows_reads_within_allowed_groups() {
		let backing = Arc::new(MemoryStore::new());
		backing.write_bytes("shared.txt", b"x").await.unwrap();
		metadata::set_meta(backing.as_ref(), "shared.txt", &Attr { group: "team".into(), ..Attr::default() })
			.await
			.unwrap();

		let access = Access::new(backing.clone(), vec!["team".to_string()], Duration::from_secs(60));
		assert!(access.stat("shared.txt").await.is_ok());
	}
}

// vim: ts=4
