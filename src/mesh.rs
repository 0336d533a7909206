//! Mesh model (C8), grounded on `original_source/model.go` and
//! `original_source/mesh/mesh_config.go`.
//!
//! A [`Mesh`] owns the local mirror, the attached remotes, and the group
//! keys that gate access to them. Reconfiguration (`from_config`) and
//! sync passes (`crate::sync::sync`) both take the mesh lock, so the two
//! never interleave a partial view of `remotes`/`keys`.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::cipher::Cipher;
use crate::config::{MeshConfig, StoreConfig};
use crate::error::{SyncError, SyncResult};
use crate::keyhash;
use crate::storage::{LocalStore, MemoryStore, Store};

/// An attached remote: its backend handle and the group that scopes its
/// access. `group` is file-scoped ACL data, not a secret.
#[derive(Clone)]
pub struct Remote {
	pub store: Arc<dyn Store>,
	pub group: String,
}

/// Guarded state: everything [`crate::sync::sync`] takes a point-in-time
/// snapshot of under the mesh lock before a pass.
#[derive(Default)]
pub struct MeshState {
	pub keys: BTreeMap<String, Cipher>,
	pub remotes: BTreeMap<String, Remote>,
	pub remotes_state: BTreeMap<String, String>,
	pub last_sync: BTreeMap<String, u64>,
}

pub struct Mesh {
	pub local: Arc<dyn Store>,
	state: Mutex<MeshState>,
	zombie: std::sync::atomic::AtomicBool,
}

fn build_store(cfg: &StoreConfig) -> SyncResult<Arc<dyn Store>> {
	Ok(match cfg {
		StoreConfig::Local { mount } => Arc::new(LocalStore::new(mount.clone())?),
		StoreConfig::Memory => Arc::new(MemoryStore::new()),
		StoreConfig::S3 { .. }
		| StoreConfig::Sftp { .. }
		| StoreConfig::Ftp { .. }
		| StoreConfig::Smb { .. }
		| StoreConfig::AzureFiles { .. }
		| StoreConfig::Http { .. }
		| StoreConfig::Kafka { .. } => return Err(SyncError::NotSupported { verb: "remote wire protocol" }),
	})
}

impl Mesh {
	pub fn new(local: Arc<dyn Store>) -> Self {
		Mesh { local, state: Mutex::new(MeshState::default()), zombie: std::sync::atomic::AtomicBool::new(false) }
	}

	/// Build (or reconfigure) a mesh from `config`. Per-remote handshake
	/// failures are recorded in `remotes_state`, never surfaced as an
	/// error from this function — the mesh as a whole always comes up
	/// (spec.md §4.7).
	pub async fn from_config(local: Arc<dyn Store>, config: &MeshConfig) -> SyncResult<Self> {
		let mesh = Mesh::new(local);
		mesh.reconfigure(config).await;
		Ok(mesh)
	}

	pub async fn reconfigure(&self, config: &MeshConfig) {
		let mut state = self.state.lock().await;
		state.keys.clear();
		state.remotes.clear();
		state.remotes_state.clear();

		for (group, key) in &config.groups {
			state.keys.insert(group.clone(), Cipher::from_group_key(key.as_bytes()));
		}

		for remote_cfg in &config.remotes {
			let store = match build_store(&remote_cfg.store) {
				Ok(s) => s,
				Err(e) => {
					state.remotes_state.insert(remote_cfg.name.clone(), e.to_string());
					continue;
				}
			};

			let Some(group_key) = config.groups.get(&remote_cfg.group) else {
				state.remotes_state.insert(remote_cfg.name.clone(), "Invalid Encryption Key".to_string());
				continue;
			};

			match keyhash::is_valid_key_hash(store.as_ref(), group_key).await {
				Ok(true) => {
					state.remotes.insert(remote_cfg.name.clone(), Remote { store, group: remote_cfg.group.clone() });
					state.remotes_state.insert(remote_cfg.name.clone(), String::new());
				}
				Ok(false) => {
					tracing::warn!("[mesh] remote {} rejected: invalid encryption key", remote_cfg.name);
					state.remotes_state.insert(remote_cfg.name.clone(), "Invalid Encryption Key".to_string());
				}
				Err(e) => {
					tracing::warn!("[mesh] remote {} handshake failed: {}", remote_cfg.name, e);
					state.remotes_state.insert(remote_cfg.name.clone(), e.to_string());
				}
			}
		}
	}

	/// Point-in-time copy of `remotes` and `keys`, taken under the mesh
	/// lock so a sync pass never observes a reconfiguration half-applied
	/// (spec.md §4.8, §9 "Mesh sharing").
	pub async fn snapshot(&self) -> (BTreeMap<String, Remote>, BTreeMap<String, Cipher>) {
		let state = self.state.lock().await;
		(state.remotes.clone(), state.keys.clone())
	}

	/// Attach `store` as remote `name` directly, bypassing the key-hash
	/// handshake. For tests and callers that already hold a concrete
	/// backend handle they want to keep addressing (config-driven attach
	/// goes through [`Mesh::reconfigure`] instead).
	pub async fn attach_remote(&self, name: &str, store: Arc<dyn Store>, group: &str) {
		let mut state = self.state.lock().await;
		state.remotes.insert(name.to_string(), Remote { store, group: group.to_string() });
		state.remotes_state.insert(name.to_string(), String::new());
	}

	pub async fn set_group_key(&self, group: &str, key: &str) {
		self.state.lock().await.keys.insert(group.to_string(), Cipher::from_group_key(key.as_bytes()));
	}

	pub async fn remote_names(&self) -> Vec<String> {
		self.state.lock().await.remotes.keys().cloned().collect()
	}

	pub async fn remote_store(&self, name: &str) -> Option<Arc<dyn Store>> {
		self.state.lock().await.remotes.get(name).map(|r| r.store.clone())
	}

	pub async fn remote_group(&self, name: &str) -> Option<String> {
		self.state.lock().await.remotes.get(name).map(|r| r.group.clone())
	}

	pub async fn remotes_state(&self) -> BTreeMap<String, String> {
		self.state.lock().await.remotes_state.clone()
	}

	pub async fn set_last_sync(&self, name: &str, at: u64) {
		self.state.lock().await.last_sync.insert(name.to_string(), at);
	}

	pub async fn last_sync(&self, name: &str) -> Option<u64> {
		self.state.lock().await.last_sync.get(name).copied()
	}

	pub fn is_zombie(&self) -> bool {
		self.zombie.load(std::sync::atomic::Ordering::SeqCst)
	}

	/// Retire the mesh: watchers must stop their ticker and close their
	/// progress channel on the next tick (spec.md §4.9).
	pub fn retire(&self) {
		self.zombie.store(true, std::sync::atomic::Ordering::SeqCst);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::storage::MemoryStore;

	#[tokio::test]
	async fn from_config_attaches_remotes_with_matching_group_key() {
		let mut groups = BTreeMap::new();
		groups.insert("team".to_string(), "secret".to_string());
		let config = MeshConfig {
			remotes: vec![crate::config::RemoteConfig {
				name: "scratch".into(),
				group: "team".into(),
				store: crate::config::StoreConfig::Memory,
			}],
			groups,
		};

		let mesh = Mesh::from_config(Arc::new(MemoryStore::new()), &config).await.unwrap();
		assert_eq!(mesh.remote_names().await, vec!["scratch".to_string()]);
		assert_eq!(mesh.remotes_state().await.get("scratch"), Some(&String::new()));
	}

	#[tokio::test]
	async fn from_config_records_unknown_group_without_failing() {
		let config = MeshConfig {
			remotes: vec![crate::config::RemoteConfig {
				name: "scratch".into(),
				group: "unknown".into(),
				store: crate::config::StoreConfig::Memory,
			}],
			groups: BTreeMap::new(),
		};

		let mesh = Mesh::from_config(Arc::new(MemoryStore::new()), &config).await.unwrap();
		assert!(mesh.remote_names().await.is_empty());
		assert_eq!(mesh.remotes_state().await.get("scratch"), Some(&"Invalid Encryption Key".to_string()));
	}
}

// vim: ts=4
