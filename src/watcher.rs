//! Periodic sync driver (C11), grounded on
//! `original_source/mesh/mesh_watch.go`.
//!
//! A [`Watcher`] ticks [`crate::sync::sync`] on a fixed period until the
//! mesh is retired. Ticks never overlap: the loop awaits a full pass before
//! arming the next tick, and a pass that overruns its period simply
//! absorbs the missed ticks instead of bursting through them.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::SystemClock;
use crate::mesh::Mesh;
use crate::progress::ProgressSender;
use crate::sync;

/// A running periodic sync loop. Dropping or aborting it does not retire
/// the mesh — call [`Mesh::retire`] for that; this handle just lets the
/// caller tear down the background task directly (e.g. on process exit).
pub struct Watcher {
	handle: JoinHandle<()>,
}

impl Watcher {
	pub fn abort(&self) {
		self.handle.abort();
	}

	pub async fn join(self) {
		let _ = self.handle.await;
	}
}

/// Launch a watcher ticking `sync(mesh, dir, ..)` every `period`. Checks
/// `mesh.is_zombie()` before each pass; once true, stops ticking and drops
/// `progress`, closing the channel for any receiver.
pub fn watch(mesh: Arc<Mesh>, dir: String, period: Duration, progress: Option<ProgressSender>) -> Watcher {
	let handle = tokio::spawn(async move {
		let mut ticker = tokio::time::interval(period);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
		let clock = SystemClock;

		loop {
			ticker.tick().await;
			if mesh.is_zombie() {
				break;
			}
			if let Err(e) = sync::sync(&mesh, &dir, 0, progress.clone(), &clock).await {
				tracing::warn!(error = %e, "sync pass failed");
			}
		}
	});
	Watcher { handle }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::storage::memory::MemoryStore;

	#[tokio::test(start_paused = true)]
	async fn watcher_stops_after_mesh_is_retired() {
		let local = Arc::new(MemoryStore::new());
		let mesh = Arc::new(Mesh::new(local));
		let remote = Arc::new(MemoryStore::new());
		mesh.attach_remote("r1", remote, "team").await;

		let watcher = watch(mesh.clone(), String::new(), Duration::from_millis(10), None);
		mesh.retire();

		tokio::time::advance(Duration::from_millis(50)).await;
		watcher.join().await;
		assert!(mesh.is_zombie());
	}
}

// vim: ts=4
