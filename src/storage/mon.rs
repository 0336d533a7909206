//! Progress-monitoring decorator (C12), grounded on
//! `original_source/store/fs_mon.go`.
//!
//! Tees bytes moving through `pull`/`push` and `remove` out to a progress
//! channel as `{name, size, op}` events (spec.md §6). Unlike the original
//! — which only ever wires the channel into `Push`, leaving `Pull`'s tee
//! hard-coded to `nil` — both directions report here.

use async_trait::async_trait;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

pub use crate::progress::{Op, Progress};
use crate::progress::ProgressSender;
use super::{BoxedReader, BoxedWriter, Props, ReadDirOpts, Store, WatchReceiver};
use crate::error::SyncResult;
use crate::path::FileInfo;

struct MonReader {
	inner: BoxedReader,
	name: String,
	size: u64,
	op: Op,
	chan: ProgressSender,
}

impl AsyncRead for MonReader {
	fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
		let before = buf.filled().len();
		let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
		if let Poll::Ready(Ok(())) = &poll {
			let n = buf.filled().len() - before;
			if n > 0 {
				self.size += n as u64;
				crate::progress::emit(
					Some(&self.chan),
					Progress { op: self.op, name: self.name.clone(), modified_by: String::new(), crc64: 0, size: self.size },
				);
			}
		}
		poll
	}
}

struct MonWriter {
	inner: BoxedWriter,
	name: String,
	size: u64,
	op: Op,
	chan: ProgressSender,
}

impl AsyncWrite for MonWriter {
	fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
		let poll = Pin::new(&mut self.inner).poll_write(cx, buf);
		if let Poll::Ready(Ok(n)) = &poll {
			self.size += *n as u64;
			crate::progress::emit(
				Some(&self.chan),
				Progress { op: self.op, name: self.name.clone(), modified_by: String::new(), crc64: 0, size: self.size },
			);
		}
		poll
	}

	fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
		Pin::new(&mut self.inner).poll_flush(cx)
	}

	fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
		Pin::new(&mut self.inner).poll_shutdown(cx)
	}
}

pub struct Mon {
	inner: Arc<dyn Store>,
	chan: ProgressSender,
}

impl Mon {
	pub fn new(inner: Arc<dyn Store>, chan: ProgressSender) -> Self {
		Mon { inner, chan }
	}
}

#[async_trait]
impl Store for Mon {
	async fn read_dir(&self, dir: &str, opts: ReadDirOpts) -> SyncResult<Vec<FileInfo>> {
		self.inner.read_dir(dir, opts).await
	}

	async fn stat(&self, name: &str) -> SyncResult<FileInfo> {
		self.inner.stat(name).await
	}

	async fn pull(&self, name: &str, writer: BoxedWriter) -> SyncResult<()> {
		let tee: BoxedWriter =
			Box::new(MonWriter { inner: writer, name: name.to_string(), size: 0, op: Op::Read, chan: self.chan.clone() });
		self.inner.pull(name, tee).await
	}

	async fn push(&self, name: &str, reader: BoxedReader) -> SyncResult<()> {
		let tee: BoxedReader =
			Box::new(MonReader { inner: reader, name: name.to_string(), size: 0, op: Op::Write, chan: self.chan.clone() });
		self.inner.push(name, tee).await
	}

	async fn remove(&self, name: &str) -> SyncResult<()> {
		let size = self.inner.stat(name).await.map(|i| i.size).unwrap_or(0);
		self.inner.remove(name).await?;
		crate::progress::emit(
			Some(&self.chan),
			Progress { op: Op::Remove, name: name.to_string(), modified_by: String::new(), crc64: 0, size },
		);
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
		self.inner.props().await
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
	async fn push_emits_write_progress() {
		let backing = Arc::new(MemoryStore::new());
		let (tx, mut rx) = crate::progress::channel();
		let mon = Mon::new(backing.clone(), tx);

		mon.push("f.txt", Box::new(std::io::Cursor::new(b"hello".to_vec()))).await.unwrap();

		let event = rx.recv().await.unwrap();
		assert_eq!(event.op, Op::Write);
		assert_eq!(event.size, 5);
	}

	#[tokio::test]
	async fn remove_emits_remove_progress_with_prior_size() {
		let backing = Arc::new(MemoryStore::new());
		backing.write_bytes("f.txt", b"12345").await.unwrap();
		let (tx, mut rx) = crate::progress::channel();
		let mon = Mon::new(backing.clone(), tx);

		mon.remove("f.txt").await.unwrap();

		let event = rx.recv().await.unwrap();
		assert_eq!(event.op, Op::Remove);
		assert_eq!(event.size, 5);
	}
}

// vim: ts=4
