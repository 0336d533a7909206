//! Mesh configuration (part of C8), grounded on
//! `original_source/mesh/mesh_config.go` and
//! `original_source/store/fs_config.go`.
//!
//! A [`MeshConfig`] is a human-editable document: an ordered list of
//! [`RemoteConfig`] (one backend variant each, plus the group it belongs
//! to) and a `groups` map from group label to its key string. Only the two
//! backend kinds this crate actually implements are represented — concrete
//! wire protocols for S3/SFTP/SMB/... are out of scope (spec.md §1).

use std::collections::BTreeMap;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::cipher::Cipher;
use crate::error::{SyncError, SyncResult};

/// Exactly one backend kind per remote, the way the original's `Config`
/// struct carries one populated `*FooConfig` pointer per backend.
///
/// Only `Local` (and the test-only `Memory` variant) are backed by a real
/// [`crate::storage::Store`] implementation; the rest hold just the fields
/// their Go counterparts declare (`S3Config`, `SFTPConfig`, ...) so the
/// mesh's config parsing and key-hash handshake logic exercise the full
/// backend variety without needing each one's wire protocol (spec.md §1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreConfig {
	Local { mount: PathBuf },
	Memory,
	S3 { endpoint: String, bucket: String, location: String, access_key: String, secret: String, use_ssl: bool },
	Sftp { addr: String, username: String, password: String, key_path: String, base: String },
	Ftp { addr: String, username: String, password: String, base: String },
	Smb { addr: String, username: String, password: String, share: String },
	AzureFiles { addr: String, account_name: String, account_key: String, share: String },
	Http { endpoint: String, access_key: String, secret: String, sign_key: String },
	Kafka { brokers: Vec<String>, num_partitions: i32, replication_factor: i32, group_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
	pub name: String,
	pub group: String,
	pub store: StoreConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshConfig {
	pub remotes: Vec<RemoteConfig>,
	pub groups: BTreeMap<String, String>,
}

impl MeshConfig {
	pub fn new() -> Self {
		MeshConfig::default()
	}

	pub fn from_toml(text: &str) -> SyncResult<Self> {
		toml::from_str(text).map_err(|e| SyncError::InvalidConfig { message: e.to_string() })
	}

	pub fn to_toml(&self) -> SyncResult<String> {
		toml::to_string_pretty(self).map_err(|e| SyncError::InvalidConfig { message: e.to_string() })
	}

	/// Serialise with MessagePack and base64-encode, optionally sealing the
	/// bytes with AES-GCM keyed by `passphrase` first (spec.md §4.7).
	pub fn to_token(&self, passphrase: Option<&str>) -> SyncResult<String> {
		let bytes = rmp_serde::to_vec(self).map_err(|e| SyncError::Backend(e.to_string()))?;
		let sealed = match passphrase {
			Some(p) => Cipher::from_group_key(p.as_bytes()).encrypt_bytes(&bytes)?,
			None => bytes,
		};
		Ok(BASE64.encode(sealed))
	}

	/// Inverse of [`MeshConfig::to_token`]. A passphrase must be supplied
	/// iff one was used to encrypt; a mismatch surfaces as `Crypto`.
	pub fn from_token(token: &str, passphrase: Option<&str>) -> SyncResult<Self> {
		let sealed = BASE64.decode(token).map_err(|e| SyncError::InvalidConfig { message: e.to_string() })?;
		let bytes = match passphrase {
			Some(p) => Cipher::from_group_key(p.as_bytes()).decrypt_bytes(&sealed)?,
			None => sealed,
		};
		rmp_serde::from_slice(&bytes).map_err(|e| SyncError::Backend(e.to_string()))
	}
}


// vim: ts=4
