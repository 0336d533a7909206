//! Zombie detection (C7), grounded on `original_source/fs/fs_meta.go`'s
//! `GetZombies`/`PurgeZombies`.
//!
//! A zombie is a sidecar whose data file is absent — the remnant of a
//! deletion that removed the data file but (by the time this runs) hasn't
//! yet had its tombstone sidecar cleaned up. The sync engine reads zombies
//! to infer deletion intent across replicas (spec.md §4.6); [`conflict`]
//! reads them to fold a deleted conflict sibling's fingerprint history
//! into the surviving one.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{MultiError, SyncResult};
use crate::metadata::{self, data_name_of};
use crate::path;
use crate::storage::{ReadDirOpts, Store};

/// Data-file names under `dir` whose sidecar exists but whose data file
/// does not.
pub async fn get_zombies(store: Arc<dyn Store>, dir: &str) -> SyncResult<Vec<String>> {
	let entries = store.read_dir(dir, ReadDirOpts { include_hidden: true }).await?;
	let mut live: BTreeMap<String, bool> = BTreeMap::new();
	for entry in entries {
		if let Some(data_name) = data_name_of(&entry.name) {
			live.entry(data_name.to_string()).or_insert(false);
		} else {
			live.insert(entry.name.clone(), true);
		}
	}
	Ok(live.into_iter().filter(|(_, has_data)| !has_data).map(|(name, _)| name).collect())
}

/// Remove every zombie sidecar under `dir`.
pub async fn purge_zombies(store: Arc<dyn Store>, dir: &str) -> SyncResult<()> {
	let zombies = get_zombies(store.clone(), dir).await?;
	let mut errors = MultiError::new();
	for zombie in zombies {
		let full = path::join(dir, &zombie);
		errors.absorb(metadata::remove_meta(store.as_ref(), &full).await);
	}
	errors.into_result()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::metadata::Attr;
	use crate::storage::memory::MemoryStore;

	#[tokio::test]
	async fn reports_data_missing_sidecars() {
		let store = Arc::new(MemoryStore::new());
		store.write_bytes("live.txt", b"x").await.unwrap();
		metadata::set_meta(store.as_ref(), "live.txt", &Attr::default()).await.unwrap();
		metadata::set_meta(store.as_ref(), "ghost.txt", &Attr::default()).await.unwrap();

		let zombies = get_zombies(store.clone(), "").await.unwrap();
		assert_eq!(zombies, vec!["ghost.txt".to_string()]);
	}

	#[tokio::test]
	async fn purge_removes_zombie_sidecars_only() {
		let store = Arc::new(MemoryStore::new());
		store.write_bytes("live.txt", b"x").await.unwrap();
		metadata::set_meta(store.as_ref(), "live.txt", &Attr::default()).await.unwrap();
		metadata::set_meta(store.as_ref(), "ghost.txt", &Attr::default()).await.unwrap();

		purge_zombies(store.clone(), "").await.unwrap();

		assert!(store.exists(&metadata::meta_name("live.txt")));
		assert!(!store.exists(&metadata::meta_name("ghost.txt")));
	}
}

// vim: ts=4
