//! Key-hash handshake (C9), grounded on
//! `original_source/store/fs_config.go`'s `IsValidKeyHash`.
//!
//! Bootstraps trust in a newly attached remote without ever transmitting
//! the group key itself: the remote carries a `.keyHash` file holding
//! `SHA-256(group_key)`. A remote that has never seen this group gets the
//! hash written to it; a remote that already has one must match exactly.

use sha2::{Digest, Sha256};

use crate::error::SyncResult;
use crate::storage::Store;

pub const KEY_HASH_FILE: &str = ".keyHash";

pub fn hash_of(group_key: &str) -> [u8; 32] {
	let mut hasher = Sha256::new();
	hasher.update(group_key.as_bytes());
	let digest = hasher.finalize();
	let mut out = [0u8; 32];
	out.copy_from_slice(&digest);
	out
}

/// True when `store`'s `.keyHash` matches `group_key`, writing it first if
/// the remote has never recorded one for this group.
pub async fn is_valid_key_hash(store: &dyn Store, group_key: &str) -> SyncResult<bool> {
	use tokio::io::AsyncReadExt;

	let expected = hash_of(group_key);

	match store.stat(KEY_HASH_FILE).await {
		Err(_) => {
			store.push(KEY_HASH_FILE, Box::new(std::io::Cursor::new(expected.to_vec()))).await?;
			Ok(true)
		}
		Ok(_) => {
			let (client, mut server) = tokio::io::duplex(64);
			let (pull_result, buf) = tokio::join!(store.pull(KEY_HASH_FILE, Box::new(client)), async {
				let mut buf = Vec::new();
				let _ = server.read_to_end(&mut buf).await;
				buf
			});
			pull_result?;
			Ok(buf == expected)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::storage::memory::MemoryStore;

	#[tokio::test]
	async fn absent_key_hash_is_accepted_and_written() {
		let store = MemoryStore::new();
		assert!(is_valid_key_hash(&store, "secret").await.unwrap());
		assert_eq!(store.read_bytes(KEY_HASH_FILE).await.unwrap(), hash_of("secret").to_vec());
	}

	#[tokio::test]
	async fn matching_key_hash_is_accepted() {
		let store = MemoryStore::new();
		store.write_bytes(KEY_HASH_FILE, &hash_of("secret")).await.unwrap();
		assert!(is_valid_key_hash(&store, "secret").await.unwrap());
	}

	#[tokio::test]
	async fn mismatched_key_hash_is_rejected() {
		let store = MemoryStore::new();
		store.write_bytes(KEY_HASH_FILE, &hash_of("other")).await.unwrap();
		assert!(!is_valid_key_hash(&store, "secret").await.unwrap());
	}
}

// vim: ts=4
