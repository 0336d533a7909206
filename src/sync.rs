//! Sync engine (C10), grounded on `original_source/sync.go`.
//!
//! One pass walks every attached remote in parallel against the local
//! mirror, directory by directory, deciding push/pull/conflict/no-op per
//! file from sidecar-recorded fingerprint history (spec.md §4.8).

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::cipher::{Cipher, Encrypted};
use crate::clock::Clock;
use crate::conflict;
use crate::error::{MultiError, SyncError, SyncResult};
use crate::fingerprint;
use crate::mesh::Mesh;
use crate::metadata::{self, Attr};
use crate::path::{self, FileInfo};
use crate::progress::{emit, Op, Progress, ProgressSender};
use crate::storage::{ReadDirOpts, Store};

const PASS_DEADLINE: Duration = Duration::from_secs(20 * 60);
const PUSH_TIMEOUT: Duration = Duration::from_secs(60);

/// One name seen on at least one side, paired with both sidecars (default
/// `Attr` when a sidecar is absent).
struct Item {
	name: String,
	local_present: bool,
	remote_present: bool,
	local_attr: Attr,
	remote_attr: Attr,
}

enum Action {
	None,
	Push,
	Pull,
	Conflict,
}

/// An unconfigured key set (no groups declared anywhere in the mesh) grants
/// access to everything, mirroring the original's `keys == nil` fast path;
/// once at least one group key exists, a remote's group must be among them.
fn has_access(group: &str, keys: &BTreeMap<String, Cipher>) -> bool {
	keys.is_empty() || keys.contains_key(group)
}

/// Read `dir`, split into non-hidden files (older than `ignore_older_than`
/// dropped, conflict-set members dropped) and subdirectory names, both
/// alphabetically sorted.
async fn list_and_sort(store: &dyn Store, dir: &str, ignore_older_than: u64) -> SyncResult<(Vec<FileInfo>, Vec<String>)> {
	let listed = store.read_dir(dir, ReadDirOpts::default()).await?;

	let mut conflict_names: BTreeSet<String> = BTreeSet::new();
	for entry in &listed {
		if entry.is_dir {
			continue;
		}
		let parsed = conflict::parse(&entry.name);
		if parsed.is_conflict {
			conflict_names.insert(format!("{}{}", parsed.prefix, parsed.ext));
			conflict_names.insert(entry.name.clone());
		}
	}

	let mut files = Vec::new();
	let mut dirs = Vec::new();
	for entry in listed {
		if entry.is_dir {
			dirs.push(entry.name);
		} else if entry.mod_time >= ignore_older_than && !conflict_names.contains(&entry.name) {
			files.push(entry);
		}
	}
	files.sort_by(|a, b| a.name.cmp(&b.name));
	dirs.sort();
	Ok((files, dirs))
}

/// Bring every local file's sidecar fingerprint up to date: a file modified
/// since its last recorded `sync_time` gets a fresh CRC-64 prepended to its
/// history and its `sync_time` bumped to `now`.
async fn refresh_local_fingerprints(store: &dyn Store, dir: &str, files: &[FileInfo], now: u64) -> SyncResult<()> {
	let mut errors = MultiError::new();
	for file in files {
		let full = path::join(dir, &file.name);
		let mut attr = metadata::get_meta(store, &full).await.unwrap_or_default();
		if file.mod_time <= attr.sync_time {
			continue;
		}
		match fingerprint::calculate_crc64(store, &full).await {
			Ok(crc) => {
				if attr.crc64s.first() != Some(&crc) {
					attr.push_crc(crc);
				}
				attr.sync_time = now;
				errors.absorb(metadata::set_meta(store, &full, &attr).await);
			}
			Err(e) => errors.push(e),
		}
	}
	errors.into_result()
}

/// Merge-join two sorted listings into per-name items, dropping names this
/// remote's group has no business seeing (spec.md §4.8 step 4).
async fn collect(
	dir: &str,
	local_files: &[FileInfo],
	remote_files: &[FileInfo],
	local: &dyn Store,
	remote_meta: &dyn Store,
	remote_group: &str,
	keys: &BTreeMap<String, Cipher>,
) -> Vec<Item> {
	let mut i = 0usize;
	let mut j = 0usize;
	let mut items = Vec::new();

	while i < local_files.len() || j < remote_files.len() {
		let l = local_files.get(i);
		let r = remote_files.get(j);

		if let (Some(lf), Some(rf)) = (l, r) {
			if lf.name == rf.name {
				let full = path::join(dir, &lf.name);
				let la = metadata::get_meta(local, &full).await.unwrap_or_default();
				let ra = metadata::get_meta(remote_meta, &full).await.unwrap_or_default();
				if has_access(remote_group, keys) {
					items.push(Item { name: full, local_present: true, remote_present: true, local_attr: la, remote_attr: ra });
				}
				i += 1;
				j += 1;
				continue;
			}
		}

		let take_local = match (l, r) {
			(Some(_), None) => true,
			(Some(lf), Some(rf)) => lf.name < rf.name,
			_ => false,
		};

		if take_local {
			let lf = l.expect("take_local implies a local entry");
			let full = path::join(dir, &lf.name);
			let la = metadata::get_meta(local, &full).await.unwrap_or_default();
			let ra = metadata::get_meta(remote_meta, &full).await.unwrap_or_default();
			if la.group == remote_group {
				items.push(Item { name: full, local_present: true, remote_present: false, local_attr: la, remote_attr: ra });
			}
			i += 1;
		} else {
			let rf = r.expect("take_local false implies a remote entry");
			let full = path::join(dir, &rf.name);
			let la = metadata::get_meta(local, &full).await.unwrap_or_default();
			let ra = metadata::get_meta(remote_meta, &full).await.unwrap_or_default();
			if has_access(remote_group, keys) {
				items.push(Item { name: full, local_present: false, remote_present: true, local_attr: la, remote_attr: ra });
			}
			j += 1;
		}
	}
	items
}

fn same_content(a: &Attr, b: &Attr) -> bool {
	!a.crc64s.is_empty() && !b.crc64s.is_empty() && a.crc64s[0] == b.crc64s[0]
}

/// True when `b`'s current content is something `a` has already seen and
/// moved past — a non-conflict even though the current fingerprints differ.
/// An empty `b` history is treated as "matches anything" (a known
/// conflict-masking risk for backends that lost their sidecars; see
/// DESIGN.md).
fn derive_from(a: &Attr, b: &Attr) -> bool {
	if b.crc64s.is_empty() {
		return true;
	}
	if a.crc64s.is_empty() {
		return false;
	}
	a.crc64s[1..].contains(&b.crc64s[0])
}

fn get_action(item: &Item) -> Action {
	if same_content(&item.local_attr, &item.remote_attr) {
		return if !item.local_present {
			Action::Push
		} else if !item.remote_present {
			Action::Pull
		} else {
			Action::None
		};
	}

	if item.local_attr.sync_time > item.remote_attr.sync_time {
		if !item.remote_present || derive_from(&item.local_attr, &item.remote_attr) {
			Action::Push
		} else {
			Action::Conflict
		}
	} else if !item.local_present || derive_from(&item.remote_attr, &item.local_attr) {
		Action::Pull
	} else {
		Action::Conflict
	}
}

/// Copy `src_name` from `src` to `dst_name` on `dst` through an
/// intermediate duplex pipe, so the source's read rate and the sink's
/// write rate stay independent (spec.md §5).
async fn copy(src: &dyn Store, dst: &dyn Store, src_name: &str, dst_name: &str, timeout: Option<Duration>) -> SyncResult<()> {
	let (client, server) = tokio::io::duplex(65536);
	let body = async {
		let (pull_result, push_result) = tokio::join!(src.pull(src_name, Box::new(client)), dst.push(dst_name, Box::new(server)));
		pull_result?;
		push_result?;
		Ok::<(), SyncError>(())
	};
	match timeout {
		Some(d) => tokio::time::timeout(d, body).await.map_err(|_| SyncError::Timeout)?,
		None => body.await,
	}
}

async fn delete_file(store: &dyn Store, name: &str, modified_by: &str, progress: Option<&ProgressSender>) -> SyncResult<()> {
	emit(progress, Progress { op: Op::Delete, name: name.to_string(), modified_by: modified_by.to_string(), crc64: 0, size: 0 });
	store.remove(name).await
}

async fn push_file(item: &Item, local: &dyn Store, remote_meta: &dyn Store, remote_content: &dyn Store, progress: Option<&ProgressSender>) -> SyncResult<()> {
	if !item.local_present {
		return delete_file(remote_meta, &item.name, &item.local_attr.modified_by, progress).await;
	}

	let mut errors = MultiError::new();
	errors.absorb(copy(local, remote_content, &item.name, &item.name, Some(PUSH_TIMEOUT)).await);
	errors.absorb(metadata::set_meta(remote_meta, &item.name, &item.local_attr).await);

	if errors.is_empty() {
		emit(
			progress,
			Progress {
				op: Op::Push,
				name: item.name.clone(),
				modified_by: item.local_attr.modified_by.clone(),
				crc64: item.local_attr.crc64s.first().copied().unwrap_or(0),
				size: 0,
			},
		);
	}
	errors.into_result()
}

fn conflict_sibling_name(name: &str, modified_by: &str, crc64: u64) -> String {
	let (dir, base) = path::split(name);
	let (stem, ext) = match base.rfind('.') {
		Some(idx) if idx > 0 => (&base[..idx], &base[idx..]),
		_ => (base, ""),
	};
	let tag = conflict::tag_for(modified_by, crc64);
	path::join(dir, &conflict::format(stem, &tag, ext))
}

async fn pull_file(
	item: &Item,
	local: &dyn Store,
	remote_meta: &dyn Store,
	remote_content: &dyn Store,
	is_conflict: bool,
	progress: Option<&ProgressSender>,
) -> SyncResult<()> {
	if !item.remote_present {
		return delete_file(local, &item.name, &item.remote_attr.modified_by, progress).await;
	}

	let dest = if is_conflict {
		conflict_sibling_name(&item.name, &item.remote_attr.modified_by, item.remote_attr.crc64s.first().copied().unwrap_or(0))
	} else {
		item.name.clone()
	};

	let mut errors = MultiError::new();
	errors.absorb(copy(remote_content, local, &item.name, &dest, None).await);
	errors.absorb(metadata::set_meta(local, &dest, &item.remote_attr).await);

	if errors.is_empty() {
		emit(
			progress,
			Progress {
				op: if is_conflict { Op::Conflict } else { Op::Pull },
				name: item.name.clone(),
				modified_by: item.remote_attr.modified_by.clone(),
				crc64: item.remote_attr.crc64s.first().copied().unwrap_or(0),
				size: 0,
			},
		);
	}
	errors.into_result()
}

async fn apply(item: &Item, local: &dyn Store, remote_meta: &dyn Store, remote_content: &dyn Store, progress: Option<&ProgressSender>) -> SyncResult<()> {
	match get_action(item) {
		Action::None => Ok(()),
		Action::Push => push_file(item, local, remote_meta, remote_content, progress).await,
		Action::Pull => pull_file(item, local, remote_meta, remote_content, false, progress).await,
		Action::Conflict => pull_file(item, local, remote_meta, remote_content, true, progress).await,
	}
}

/// Recursive per-(dir, remote) walk. Boxed because plain `async fn`
/// recursion is not supported.
fn sync_dir(
	dir: String,
	local: Arc<dyn Store>,
	remote_store: Arc<dyn Store>,
	remote_group: String,
	keys: Arc<BTreeMap<String, Cipher>>,
	now: u64,
	ignore_older_than: u64,
	progress: Option<ProgressSender>,
) -> Pin<Box<dyn Future<Output = SyncResult<()>> + Send>> {
	Box::pin(async move {
		let mut errors = MultiError::new();
		errors.absorb(conflict::clear_conflicts(local.clone(), &dir).await);

		let (local_files, local_dirs) = match list_and_sort(local.as_ref(), &dir, ignore_older_than).await {
			Ok(v) => v,
			Err(e) => {
				errors.push(e);
				(Vec::new(), Vec::new())
			}
		};
		let (remote_files, remote_dirs) = match list_and_sort(remote_store.as_ref(), &dir, ignore_older_than).await {
			Ok(v) => v,
			Err(e) => {
				errors.push(e);
				(Vec::new(), Vec::new())
			}
		};

		errors.absorb(refresh_local_fingerprints(local.as_ref(), &dir, &local_files, now).await);

		let items = collect(&dir, &local_files, &remote_files, local.as_ref(), remote_store.as_ref(), &remote_group, &keys).await;

		let content_store: Arc<dyn Store> = match keys.get(&remote_group) {
			Some(cipher) => Arc::new(Encrypted::new(remote_store.clone(), cipher.clone())),
			None => remote_store.clone(),
		};

		for item in &items {
			errors.absorb(apply(item, local.as_ref(), remote_store.as_ref(), content_store.as_ref(), progress.as_ref()).await);
		}

		let mut all_dirs: BTreeSet<String> = local_dirs.into_iter().collect();
		all_dirs.extend(remote_dirs);
		for d in all_dirs {
			let sub_dir = path::join(&dir, &d);
			errors.absorb(
				sync_dir(sub_dir, local.clone(), remote_store.clone(), remote_group.clone(), keys.clone(), now, ignore_older_than, progress.clone()).await,
			);
		}

		errors.into_result()
	})
}

/// Run one pass over every attached remote in parallel, starting at
/// `start_dir`. `ignore_older_than` is a Unix-seconds floor on mod-time
/// (entries older are skipped entirely). On success for a remote,
/// `mesh.last_sync[name]` is stamped with the pass's reference time.
pub async fn sync(mesh: &Mesh, start_dir: &str, ignore_older_than: u64, progress: Option<ProgressSender>, clock: &dyn Clock) -> SyncResult<()> {
	let now = clock.now_secs();
	tracing::debug!("[sync] starting pass at {}", now);
	let (remotes, keys) = mesh.snapshot().await;
	let keys = Arc::new(keys);
	let local = mesh.local.clone();

	let mut handles = Vec::new();
	let mut abort_handles = Vec::new();
	for (name, remote) in remotes {
		let local = local.clone();
		let keys = keys.clone();
		let progress = progress.clone();
		let dir = start_dir.to_string();
		let handle = tokio::spawn(async move {
			let result = sync_dir(dir, local, remote.store.clone(), remote.group.clone(), keys, now, ignore_older_than, progress).await;
			(name, result)
		});
		abort_handles.push(handle.abort_handle());
		handles.push(handle);
	}

	let joined = futures::future::join_all(handles);
	let outcomes = match tokio::time::timeout(PASS_DEADLINE, joined).await {
		Ok(outcomes) => outcomes,
		Err(_) => {
			for abort in abort_handles {
				abort.abort();
			}
			return Err(SyncError::Cancelled);
		}
	};

	let mut errors = MultiError::new();
	for outcome in outcomes {
		match outcome {
			Ok((name, Ok(()))) => mesh.set_last_sync(&name, now).await,
			Ok((name, Err(e))) => {
				tracing::warn!("[sync] remote {} failed: {}", name, e);
				errors.push(e);
			}
			Err(join_err) => errors.push(SyncError::Backend(join_err.to_string())),
		}
	}
	errors.into_result()
}
