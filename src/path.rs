//! Virtual path helpers and listing entries (C2).
//!
//! Every path in the mesh is a forward-slash virtual path, relative to the
//! store it names a member of. No leading slash, and no `.`/`..` segments.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Join two virtual path segments, normalising away empty parts.
pub fn join(a: &str, b: &str) -> String {
	let a = a.trim_matches('/');
	let b = b.trim_matches('/');
	match (a.is_empty(), b.is_empty()) {
		(true, true) => String::new(),
		(true, false) => b.to_string(),
		(false, true) => a.to_string(),
		(false, false) => format!("{}/{}", a, b),
	}
}

/// Split a path into (dir, base). `dir` is `""` for a top-level name.
pub fn split(path: &str) -> (&str, &str) {
	match path.rfind('/') {
		Some(idx) => (&path[..idx], &path[idx + 1..]),
		None => ("", path),
	}
}

/// Validate a virtual path: no leading slash, no `.`/`..` segments.
pub fn normalize(path: &str) -> Result<String, crate::error::SyncError> {
	let trimmed = path.trim_matches('/');
	for segment in trimmed.split('/') {
		if segment == "." || segment == ".." {
			return Err(crate::error::SyncError::InvalidConfig {
				message: format!("path segment '{}' is not allowed in '{}'", segment, path),
			});
		}
	}
	Ok(trimmed.to_string())
}

/// A name is hidden when its basename starts with `.`.
pub fn is_hidden(name: &str) -> bool {
	let (_, base) = split(name);
	base.starts_with('.')
}

/// Listing entry returned by [`crate::storage::Store::read_dir`] and
/// [`crate::storage::Store::stat`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
	pub name: String,
	pub size: u64,
	pub is_dir: bool,
	/// Seconds since the Unix epoch. Backends without native mod-time
	/// report zero; the sync engine then relies on the sidecar's
	/// `sync_time` instead (spec.md §3).
	pub mod_time: u64,
}

impl FileInfo {
	pub fn file(name: impl Into<String>, size: u64, mod_time: u64) -> Self {
		FileInfo { name: name.into(), size, is_dir: false, mod_time }
	}

	pub fn dir(name: impl Into<String>) -> Self {
		FileInfo { name: name.into(), size: 0, is_dir: true, mod_time: 0 }
	}

	pub fn is_hidden(&self) -> bool {
		is_hidden(&self.name)
	}
}

/// Current wall-clock time as seconds since the Unix epoch.
pub fn now_secs() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}


// vim: ts=4
