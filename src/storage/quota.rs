//! Quota-enforcing decorator (C12), grounded on `original_source/quota.go`
//! and `store/fs_quota.go`.

use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite};

use super::{BoxedReader, BoxedWriter, Props, ReadDirOpts, Store, WatchReceiver};
use crate::error::{SyncError, SyncResult};
use crate::path::FileInfo;

/// Tallies bytes as they stream through, so [`Quota::push`] can credit the
/// running total with exactly what was written instead of what [`Store::stat`]
/// predicted beforehand. The count lives behind an `Arc` so the caller can
/// read it back after handing the reader's ownership to the wrapped store.
struct CountingReader {
	inner: BoxedReader,
	count: Arc<AtomicI64>,
}

impl AsyncRead for CountingReader {
	fn poll_read(
		mut self: std::pin::Pin<&mut Self>,
		cx: &mut std::task::Context<'_>,
		buf: &mut tokio::io::ReadBuf<'_>,
	) -> std::task::Poll<std::io::Result<()>> {
		let before = buf.filled().len();
		let inner = std::pin::Pin::new(&mut self.inner);
		let poll = inner.poll_read(cx, buf);
		if let std::task::Poll::Ready(Ok(())) = &poll {
			let read = (buf.filled().len() - before) as i64;
			self.count.fetch_add(read, Ordering::SeqCst);
		}
		poll
	}
}

/// Buffers bytes written through it into a shared `Vec<u8>`, so [`Quota::push`]
/// can read an overwritten file's prior content back out after the writer
/// itself has been consumed by [`Store::pull`], and restore it if the new
/// write turns out to cross the limit.
struct BackupWriter {
	buf: Arc<Mutex<Vec<u8>>>,
}

impl AsyncWrite for BackupWriter {
	fn poll_write(self: std::pin::Pin<&mut Self>, _cx: &mut std::task::Context<'_>, buf: &[u8]) -> std::task::Poll<std::io::Result<usize>> {
		self.buf.lock().unwrap().extend_from_slice(buf);
		std::task::Poll::Ready(Ok(buf.len()))
	}

	fn poll_flush(self: std::pin::Pin<&mut Self>, _cx: &mut std::task::Context<'_>) -> std::task::Poll<std::io::Result<()>> {
		std::task::Poll::Ready(Ok(()))
	}

	fn poll_shutdown(self: std::pin::Pin<&mut Self>, _cx: &mut std::task::Context<'_>) -> std::task::Poll<std::io::Result<()>> {
		std::task::Poll::Ready(Ok(()))
	}
}

/// Enforces a byte-count ceiling on the wrapped store. `current` starts from
/// a one-time recursive walk at construction and is then kept up to date
/// incrementally by `push`/`remove`, rather than re-walked.
pub struct Quota {
	inner: Arc<dyn Store>,
	limit: u64,
	current: AtomicI64,
}

impl Quota {
	/// `starting_usage` is the byte total already occupied by `inner` (the
	/// caller is expected to have walked it, mirroring the original's
	/// construction-time `Walk` over the wrapped store).
	pub fn new(inner: Arc<dyn Store>, limit: u64, starting_usage: u64) -> Self {
		Quota { inner, limit, current: AtomicI64::new(starting_usage as i64) }
	}

	pub fn usage(&self) -> i64 {
		self.current.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Store for Quota {
	async fn read_dir(&self, dir: &str, opts: ReadDirOpts) -> SyncResult<Vec<FileInfo>> {
		self.inner.read_dir(dir, opts).await
	}

	async fn stat(&self, name: &str) -> SyncResult<FileInfo> {
		self.inner.stat(name).await
	}

	async fn pull(&self, name: &str, writer: BoxedWriter) -> SyncResult<()> {
		self.inner.pull(name, writer).await
	}

	async fn push(&self, name: &str, reader: BoxedReader) -> SyncResult<()> {
		if self.current.load(Ordering::SeqCst) > self.limit as i64 {
			return Err(SyncError::QuotaExceeded { path: name.to_string(), limit: self.limit });
		}
		let previous_size = self.inner.stat(name).await.map(|i| i.size).unwrap_or(0);

		// An overwrite needs its prior content backed up before the write
		// lands, so a too-large replacement can be rolled back in full
		// instead of just deleted (deleting would lose data a plain reject
		// never had to touch).
		let backup = if previous_size > 0 {
			let buf = Arc::new(Mutex::new(Vec::new()));
			let _ = self.inner.pull(name, Box::new(BackupWriter { buf: buf.clone() })).await;
			Some(Arc::try_unwrap(buf).map(|m| m.into_inner().unwrap()).unwrap_or_default())
		} else {
			None
		};

		let counting = Box::new(CountingReader { inner: reader, count: Arc::new(AtomicI64::new(0)) });
		let count_handle = counting.count.clone();
		self.inner.push(name, counting).await?;
		let counted = count_handle.load(Ordering::SeqCst);
		let new_total = self.current.load(Ordering::SeqCst) + (counted - previous_size as i64);

		// The write already landed; if it crossed the limit, reject it and
		// undo rather than silently letting usage run over (spec.md §8 S6
		// requires the boundary itself to reject, not just the push after).
		if new_total > self.limit as i64 {
			match backup {
				Some(bytes) => {
					let _ = self.inner.push(name, Box::new(std::io::Cursor::new(bytes))).await;
				}
				None => {
					let _ = self.inner.remove(name).await;
				}
			}
			return Err(SyncError::QuotaExceeded { path: name.to_string(), limit: self.limit });
		}

		self.current.store(new_total, Ordering::SeqCst);
		Ok(())
	}

	async fn remove(&self, name: &str) -> SyncResult<()> {
		let size = self.inner.stat(name).await.map(|i| i.size).ok();
		self.inner.remove(name).await?;
		if let Some(size) = size {
			self.current.fetch_sub(size as i64, Ordering::SeqCst);
		}
		Ok(())
	}

	async fn mkdir_all(&self, name: &str) -> SyncResult<()> {
		self.inner.mkdir_all(name).await
	}

	async fn rename(&self, old: &str, new: &str) -> SyncResult<()> {
		self.inner.rename(old, new).await
	}

	async fn touch(&self, name: &str) -> SyncResult<()> {
		self.inner.touch(name).await
	}

	async fn props(&self) -> SyncResult<Props> {
		let limit = self.limit;
		let used = self.current.load(Ordering::SeqCst).max(0) as u64;
		Ok(Props { quota: limit, free: limit.saturating_sub(used), min_file_size: 0, max_file_size: limit, max_retention: None })
	}

	async fn watch(&self, name: &str) -> SyncResult<WatchReceiver> {
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
	use crate::storage::memory::MemoryStore;

	#[tokio::test]
	async fn push_accumulates_usage_and_rejects_over_limit() {
		let backing = Arc::new(MemoryStore::new());
		let quota = Quota::new(backing.clone(), 10, 0);

		quota.push("a.txt", Box::new(std::io::Cursor::new(b"12345".to_vec()))).await.unwrap();
		assert_eq!(quota.usage(), 5);

		let err = quota.push("over.txt", Box::new(std::io::Cursor::new(b"123456".to_vec()))).await;
		assert!(matches!(err, Err(SyncError::QuotaExceeded { .. })));
		assert_eq!(quota.usage(), 5);
		assert!(!backing.exists("over.txt"));
	}

	/// An overwrite that would cross the limit must restore the file's
	/// prior content, not just delete it — unlike a rejected brand-new
	/// file, an overwrite has existing data to lose.
	#[tokio::test]
	async fn push_rejects_over_limit_overwrite_and_restores_prior_content() {
		let backing = Arc::new(MemoryStore::new());
		backing.write_bytes("a.txt", b"12345").await.unwrap();
		let quota = Quota::new(backing.clone(), 10, 5);

		let err = quota.push("a.txt", Box::new(std::io::Cursor::new(b"123456789".to_vec()))).await;
		assert!(matches!(err, Err(SyncError::QuotaExceeded { .. })));
		assert_eq!(quota.usage(), 5);
		assert_eq!(backing.read_bytes("a.txt").await.unwrap(), b"12345");
	}

	/// spec.md §8 S6: usage 8 of a 10-byte quota; a push that would land
	/// exactly on the limit succeeds, one byte over is rejected.
	#[tokio::test]
	async fn push_rejects_exactly_at_the_boundary() {
		let backing = Arc::new(MemoryStore::new());
		let quota = Quota::new(backing.clone(), 10, 8);

		let err = quota.push("three.txt", Box::new(std::io::Cursor::new(b"123".to_vec()))).await;
		assert!(matches!(err, Err(SyncError::QuotaExceeded { .. })));

		quota.push("two.txt", Box::new(std::io::Cursor::new(b"12".to_vec()))).await.unwrap();
		assert_eq!(quota.usage(), 10);
	}

	#[tokio::test]
	async fn remove_frees_usage() {
		let backing = Arc::new(MemoryStore::new());
		backing.write_bytes("a.txt", b"12345").await.unwrap();
		let quota = Quota::new(backing.clone(), 10, 5);

		quota.remove("a.txt").await.unwrap();
		assert_eq!(quota.usage(), 0);
	}
}
