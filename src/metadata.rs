//! Metadata sidecar channel (C4), grounded on `original_source/fs/fs_meta.go`
//! and `original_source/attr.go`.
//!
//! Every data file `DIR/NAME` may have a hidden sidecar `DIR/.NAME!.meta`
//! carrying out-of-band attributes the sync engine needs but the backend
//! itself has no field for: who last wrote the file, which group owns it,
//! when it was last synced, and a short fingerprint history. The original
//! blob is a `map[typeName][]byte` so several Go types could share one
//! sidecar; this crate has exactly one payload type, so the sidecar is the
//! `Attr` itself, self-describing via MessagePack.

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::path;
use crate::storage::Store;

/// How many fingerprints we remember per file. Bounds sidecar growth for
/// files that get touched often; see spec.md §4.5.
pub const MAX_CRC_HISTORY: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attr {
	pub modified_by: String,
	pub group: String,
	pub sync_time: u64,
	pub crc64s: Vec<u64>,
}

impl Attr {
	/// Push a newly computed fingerprint to the front — `crc64s[0]` is
	/// always the current content, `crc64s[1..]` the history the decision
	/// table derives from — trimming the oldest entries once the history
	/// exceeds [`MAX_CRC_HISTORY`].
	pub fn push_crc(&mut self, crc: u64) {
		self.crc64s.insert(0, crc);
		self.crc64s.truncate(MAX_CRC_HISTORY);
	}

	pub fn has_crc(&self, crc: u64) -> bool {
		self.crc64s.contains(&crc)
	}
}

/// Sidecar name for `name`: `.BASE!.meta` alongside the data file.
pub fn meta_name(name: &str) -> String {
	let (dir, base) = path::split(name);
	path::join(dir, &format!(".{}!.meta", base))
}

/// True when `name` is itself a sidecar (so listings can filter it out).
pub fn is_meta(name: &str) -> bool {
	let (_, base) = path::split(name);
	base.starts_with('.') && base.ends_with("!.meta")
}

/// The original data-file name a sidecar name refers to, or `None` if
/// `name` isn't a sidecar.
pub fn data_name_of(name: &str) -> Option<&str> {
	let (_, base) = path::split(name);
	if base.starts_with('.') && base.ends_with("!.meta") {
		Some(&base[1..base.len() - "!.meta".len()])
	} else {
		None
	}
}

pub async fn set_meta(store: &dyn Store, name: &str, attr: &Attr) -> SyncResult<()> {
	let sidecar = meta_name(name);
	let bytes = rmp_serde::to_vec(attr).map_err(|e| SyncError::Backend(e.to_string()))?;
	store.push(&sidecar, Box::new(std::io::Cursor::new(bytes))).await
}

pub async fn get_meta(store: &dyn Store, name: &str) -> SyncResult<Attr> {
	use tokio::io::AsyncReadExt;

	let sidecar = meta_name(name);
	let (client, mut server) = tokio::io::duplex(8192);
	let pull_fut = store.pull(&sidecar, Box::new(client));
	let read_fut = async {
		let mut buf = Vec::new();
		server.read_to_end(&mut buf).await.map(|_| buf)
	};
	let (pull_result, read_result) = tokio::join!(pull_fut, read_fut);
	pull_result?;
	let buf = read_result.map_err(|e| SyncError::Io(e.to_string()))?;
	rmp_serde::from_slice(&buf).map_err(|e| SyncError::Backend(e.to_string()))
}

pub async fn remove_meta(store: &dyn Store, name: &str) -> SyncResult<()> {
	store.remove(&meta_name(name)).await
}


#[cfg(test)]
mod tests {
	use super::*;
	use crate::storage::memory::MemoryStore;

	#[test]
	fn meta_name_hides_sidecar_alongside_data() {
		assert_eq!(meta_name("dir/file.txt"), "dir/.file.txt!.meta");
		assert_eq!(meta_name("file.txt"), ".file.txt!.meta");
	}

	#[test]
	fn is_meta_and_data_name_of_round_trip() {
		let sidecar = meta_name("report.csv");
		assert!(is_meta(&sidecar));
		assert_eq!(data_name_of(&sidecar), Some("report.csv"));
		assert!(!is_meta("report.csv"));
	}

	#[tokio::test]
	async fn set_then_get_meta_round_trips() {
		let store = MemoryStore::new();
		let mut attr = Attr { modified_by: "alice".into(), group: "team".into(), sync_time: 42, crc64s: vec![] };
		attr.push_crc(7);

		set_meta(&store, "notes.txt", &attr).await.unwrap();
		let loaded = get_meta(&store, "notes.txt").await.unwrap();
		assert_eq!(loaded, attr);
	}

	#[test]
	fn push_crc_bounds_history() {
		let mut attr = Attr::default();
		for i in 0..(MAX_CRC_HISTORY as u64 + 5) {
			attr.push_crc(i);
		}
		assert_eq!(attr.crc64s.len(), MAX_CRC_HISTORY);
		assert_eq!(attr.crc64s[0], MAX_CRC_HISTORY as u64 + 4);
		assert_eq!(attr.crc64s[MAX_CRC_HISTORY - 1], 5);
	}

}
