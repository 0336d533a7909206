//! Conflict naming & registry (C6), grounded on
//! `original_source/fs/conflicts.go`.
//!
//! Conflict siblings share a stem and extension but carry a distinct
//! `!!tag` suffix on the stem: `report!!alice4f.csv` next to
//! `report.csv`. [`parse`] splits a name back into its collision key
//! (`prefix+ext`) and tag; [`get_collisions`] buckets a directory listing
//! by that key so the sync engine and CLI can find conflict sets.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{MultiError, SyncResult};
use crate::metadata::{self, Attr};
use crate::path::{self, FileInfo};
use crate::storage::{ReadDirOpts, Store};
use crate::zombie;

/// Result of splitting a name into its conflict-naming parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
	pub is_conflict: bool,
	pub prefix: String,
	pub tag: String,
	pub ext: String,
}

/// Split `name` on the last `!!` in its stem. Names without one still
/// parse, just with `is_conflict: false` and an empty tag.
pub fn parse(name: &str) -> Parsed {
	let (stem, ext) = match name.rfind('.') {
		Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
		_ => (name, ""),
	};
	match stem.rfind("!!") {
		Some(idx) => Parsed {
			is_conflict: true,
			prefix: stem[..idx].to_string(),
			tag: stem[idx + 2..].to_string(),
			ext: ext.to_string(),
		},
		None => Parsed { is_conflict: false, prefix: stem.to_string(), tag: String::new(), ext: ext.to_string() },
	}
}

/// Render a conflict sibling name: `<prefix>!!<tag><ext>`.
pub fn format(prefix: &str, tag: &str, ext: &str) -> String {
	format!("{}!!{}{}", prefix, tag, ext)
}

/// A compact per-writer conflict tag: `<modified_by_compact><hex(crc64 mod
/// 256)>` (spec.md §3 GLOSSARY "Conflict tag").
pub fn tag_for(modified_by: &str, crc64: u64) -> String {
	let compact: String = modified_by.chars().filter(|c| c.is_alphanumeric()).take(8).collect();
	format!("{}{:02x}", compact, (crc64 % 256) as u8)
}

#[derive(Debug, Clone)]
pub struct Item {
	pub name: String,
	pub size: u64,
	pub mod_time: u64,
	pub attr: Attr,
}

#[derive(Debug, Clone)]
pub struct Conflict {
	pub dir: String,
	pub name: String,
	pub items: Vec<Item>,
}

/// Bucket every regular file in `dir` by `prefix+ext`. A bucket with two or
/// more entries is a live conflict set.
pub async fn get_collisions(store: &dyn Store, dir: &str) -> SyncResult<BTreeMap<String, Vec<FileInfo>>> {
	let listed = store.read_dir(dir, ReadDirOpts::default()).await?;
	let mut buckets: BTreeMap<String, Vec<FileInfo>> = BTreeMap::new();
	for entry in listed {
		if entry.is_dir {
			continue;
		}
		let parsed = parse(&entry.name);
		buckets.entry(format!("{}{}", parsed.prefix, parsed.ext)).or_default().push(entry);
	}
	Ok(buckets)
}

/// Conflict sets under `dir`, each member annotated with its sidecar Attr.
/// `recursive` additionally descends into subdirectories.
pub fn get_conflicts(
	store: Arc<dyn Store>,
	dir: String,
	recursive: bool,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = SyncResult<Vec<Conflict>>> + Send>> {
	Box::pin(async move {
		let buckets = get_collisions(store.as_ref(), &dir).await?;
		let mut conflicts = Vec::new();
		for (name, files) in buckets {
			if files.len() < 2 {
				continue;
			}
			let mut items = Vec::new();
			for file in &files {
				let full = path::join(&dir, &file.name);
				let attr = metadata::get_meta(store.as_ref(), &full).await.unwrap_or_default();
				items.push(Item { name: file.name.clone(), size: file.size, mod_time: file.mod_time, attr });
			}
			conflicts.push(Conflict { dir: dir.clone(), name, items });
		}

		let mut errors = MultiError::new();
		if recursive {
			match store.read_dir(&dir, ReadDirOpts::default()).await {
				Ok(listed) => {
					for entry in listed {
						if entry.is_dir {
							let sub_dir = path::join(&dir, &entry.name);
							match errors.absorb(get_conflicts(store.clone(), sub_dir, recursive).await) {
								Some(sub) => conflicts.extend(sub),
								None => {}
							}
						}
					}
				}
				Err(e) => errors.push(e),
			}
		}
		if errors.is_empty() {
			Ok(conflicts)
		} else {
			errors.into_result()?;
			Ok(conflicts)
		}
	})
}

/// Reconcile tombstone sidecars into their surviving sibling's `crc64s`
/// history, then remove the tombstones. After this returns without error,
/// every non-conflict bucket in `dir` carries no stale sidecar.
pub async fn clear_conflicts(store: Arc<dyn Store>, dir: &str) -> SyncResult<()> {
	let zombies = zombie::get_zombies(store.clone(), dir).await?;
	let buckets = get_collisions(store.as_ref(), dir).await?;

	let mut dead: BTreeMap<String, Vec<String>> = BTreeMap::new();
	let mut zombie_crcs: BTreeMap<String, Vec<u64>> = BTreeMap::new();

	for zombie in &zombies {
		let parsed = parse(zombie);
		let key = format!("{}{}", parsed.prefix, parsed.ext);
		if buckets.get(&key).map(|c| c.len()).unwrap_or(0) == 1 {
			let full = path::join(dir, zombie);
			if let Ok(attr) = metadata::get_meta(store.as_ref(), &full).await {
				if let Some(first) = attr.crc64s.first() {
					zombie_crcs.entry(key.clone()).or_default().push(*first);
				}
			}
			dead.entry(key).or_default().push(zombie.clone());
		}
	}

	let mut errors = MultiError::new();
	for (key, files) in &buckets {
		if files.len() != 1 {
			continue;
		}
		let Some(merged) = zombie_crcs.get(key) else { continue };
		if merged.is_empty() {
			continue;
		}
		let surviving_name = files[0].name.clone();
		let surviving_path = path::join(dir, &surviving_name);
		let final_path = path::join(dir, key);

		let mut attr = metadata::get_meta(store.as_ref(), &surviving_path).await.unwrap_or_default();
		attr.crc64s = match attr.crc64s.len() {
			0 => merged.clone(),
			1 => {
				let mut combined = vec![attr.crc64s[0]];
				combined.extend(merged.iter().copied());
				combined
			}
			_ => {
				let mut combined = vec![attr.crc64s[0]];
				combined.extend(merged.iter().copied());
				combined.extend(attr.crc64s[1..].iter().copied());
				combined
			}
		};
		errors.absorb(metadata::set_meta(store.as_ref(), &final_path, &attr).await);

		if surviving_name != *key {
			errors.absorb(store.rename(&surviving_path, &final_path).await);
		}
		for z in dead.get(key).into_iter().flatten() {
			errors.absorb(metadata::remove_meta(store.as_ref(), &path::join(dir, z)).await);
		}
	}
	errors.into_result()
}

/// Keep only `chosen_names` among their respective conflict buckets,
/// deleting every other sibling, then reconcile via [`clear_conflicts`].
pub async fn solve_conflict(store: Arc<dyn Store>, dir: &str, chosen_names: &[String]) -> SyncResult<()> {
	let buckets = get_collisions(store.as_ref(), dir).await?;
	let mut errors = MultiError::new();
	for chosen in chosen_names {
		let parsed = parse(chosen);
		let key = format!("{}{}", parsed.prefix, parsed.ext);
		if let Some(files) = buckets.get(&key) {
			for file in files {
				if file.name != *chosen {
					errors.absorb(store.remove(&path::join(dir, &file.name)).await);
				}
			}
		}
	}
	errors.absorb(clear_conflicts(store, dir).await);
	errors.into_result()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::storage::memory::MemoryStore;

	#[test]
	fn parse_splits_stem_on_last_double_bang() {
		let p = parse("report!!alice4f.csv");
		assert!(p.is_conflict);
		assert_eq!(p.prefix, "report");
		assert_eq!(p.tag, "alice4f");
		assert_eq!(p.ext, ".csv");
	}

	#[test]
	fn parse_tolerates_names_without_marker() {
		let p = parse("report.csv");
		assert!(!p.is_conflict);
		assert_eq!(p.prefix, "report");
		assert_eq!(p.ext, ".csv");
	}

	#[test]
	fn format_round_trips_with_parse() {
		let name = format("report", "alice4f", ".csv");
		let p = parse(&name);
		assert_eq!(p.prefix, "report");
		assert_eq!(p.tag, "alice4f");
	}

	#[tokio::test]
	async fn get_collisions_buckets_by_prefix_and_ext() {
		let store = MemoryStore::new();
		store.write_bytes("report.csv", b"a").await.unwrap();
		store.write_bytes("report!!bob01.csv", b"b").await.unwrap();
		store.write_bytes("other.csv", b"c").await.unwrap();

		let buckets = get_collisions(&store, "").await.unwrap();
		assert_eq!(buckets.get("report.csv").unwrap().len(), 2);
		assert_eq!(buckets.get("other.csv").unwrap().len(), 1);
	}

	#[tokio::test]
	async fn get_conflicts_only_returns_multi_member_buckets() {
		let store = Arc::new(MemoryStore::new());
		store.write_bytes("report.csv", b"a").await.unwrap();
		store.write_bytes("report!!bob01.csv", b"b").await.unwrap();
		store.write_bytes("solo.csv", b"c").await.unwrap();

		let conflicts = get_conflicts(store, "".to_string(), false).await.unwrap();
		assert_eq!(conflicts.len(), 1);
		assert_eq!(conflicts[0].items.len(), 2);
	}
}

// vim: ts=4
