//! At-rest stream cipher layer (C3), grounded on
//! `original_source/crypthelper.go` and `original_source/fs/fs_encrypted.go`.
//!
//! Two distinct primitives, both keyed from a group's shared secret:
//!
//! - **Bytes** (mesh config tokens): AES-256-GCM with a random 12-byte
//!   nonce prepended to the ciphertext. Used once per token, so a fresh
//!   nonce each time is free.
//! - **Streams** (file contents): AES-256-OFB with an all-zero IV. A fixed
//!   IV is normally unsound, but it is deliberate here — it is what makes
//!   the same plaintext written from two replicas produce identical
//!   ciphertext, so CRC-64 fingerprints computed over the encrypted bytes
//!   still agree across the mesh (spec.md §4.3). Every replica holds the
//!   group key and only ever encrypts file contents, never attacker-chosen
//!   plaintext under a key it doesn't also hold, so keystream reuse is not
//!   exploitable the way it would be in a general-purpose channel.

use aes::Aes256;
use aes_gcm::aead::{Aead, AeadCore, KeyInit as GcmKeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use cipher::{KeyIvInit, StreamCipher};
use ofb::Ofb;
use sha2::{Digest, Sha512_256};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::error::{SyncError, SyncResult};
use crate::storage::{BoxedReader, BoxedWriter, Props, ReadDirOpts, Store, WatchReceiver};
use crate::path::FileInfo;
use std::sync::Arc;

type AesOfb = Ofb<Aes256>;

const GCM_NONCE_LEN: usize = 12;

/// A group's derived symmetric key. Cheap to clone; holds only key bytes.
#[derive(Clone)]
pub struct Cipher {
	key: [u8; 32],
}

impl Cipher {
	/// Derive a cipher from a group's raw key material: `SHA-512/256(key)`.
	pub fn from_group_key(key: &[u8]) -> Self {
		let mut hasher = Sha512_256::new();
		hasher.update(key);
		let digest = hasher.finalize();
		let mut key_bytes = [0u8; 32];
		key_bytes.copy_from_slice(&digest);
		Cipher { key: key_bytes }
	}

	fn stream(&self) -> AesOfb {
		let iv = [0u8; 16];
		AesOfb::new(&self.key.into(), &iv.into())
	}

	/// Encrypt `plaintext` for storage in a config token: random nonce
	/// prepended to the AES-GCM ciphertext.
	pub fn encrypt_bytes(&self, plaintext: &[u8]) -> SyncResult<Vec<u8>> {
		let gcm = Aes256Gcm::new(&self.key.into());
		let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
		let mut out = gcm
			.encrypt(&nonce, plaintext)
			.map_err(|e| SyncError::Crypto(e.to_string()))?;
		let mut sealed = nonce.to_vec();
		sealed.append(&mut out);
		Ok(sealed)
	}

	pub fn decrypt_bytes(&self, sealed: &[u8]) -> SyncResult<Vec<u8>> {
		if sealed.len() < GCM_NONCE_LEN {
			return Err(SyncError::Crypto("ciphertext shorter than nonce".into()));
		}
		let (nonce_bytes, ciphertext) = sealed.split_at(GCM_NONCE_LEN);
		let gcm = Aes256Gcm::new(&self.key.into());
		let nonce = Nonce::from_slice(nonce_bytes);
		gcm.decrypt(nonce, ciphertext).map_err(|e| SyncError::Crypto(e.to_string()))
	}
}

/// Wraps an [`AsyncWrite`], XOR-ing every byte written through the
/// zero-IV OFB keystream before forwarding it to the inner sink.
struct OfbWriter<W> {
	inner: W,
	stream: AesOfb,
}

impl<W: AsyncWrite + Unpin> AsyncWrite for OfbWriter<W> {
	fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
		let mut scratch = buf.to_vec();
		self.stream.apply_keystream(&mut scratch);
		Pin::new(&mut self.inner).poll_write(cx, &scratch)
	}

	fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
		Pin::new(&mut self.inner).poll_flush(cx)
	}

	fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
		Pin::new(&mut self.inner).poll_shutdown(cx)
	}
}

/// Wraps an [`AsyncRead`], XOR-ing every byte read from the inner source
/// through the zero-IV OFB keystream before handing it to the caller.
struct OfbReader<R> {
	inner: R,
	stream: AesOfb,
}

impl<R: AsyncRead + Unpin> AsyncRead for OfbReader<R> {
	fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
		let before = buf.filled().len();
		let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
		if let Poll::Ready(Ok(())) = &poll {
			self.stream.apply_keystream(&mut buf.filled_mut()[before..]);
		}
		poll
	}
}

/// Decorates a [`Store`] so file contents are transparently encrypted on
/// push and decrypted on pull. Directory listings, metadata, and paths are
/// untouched — only bytes, matching the original's no-op `EncryptPath`.
pub struct Encrypted {
	inner: Arc<dyn Store>,
	cipher: Cipher,
}

impl Encrypted {
	pub fn new(inner: Arc<dyn Store>, cipher: Cipher) -> Self {
		Encrypted { inner, cipher }
	}
}

#[async_trait::async_trait]
impl Store for Encrypted {
	async fn read_dir(&self, dir: &str, opts: ReadDirOpts) -> SyncResult<Vec<FileInfo>> {
		self.inner.read_dir(dir, opts).await
	}

	async fn stat(&self, name: &str) -> SyncResult<FileInfo> {
		self.inner.stat(name).await
	}

	async fn pull(&self, name: &str, writer: BoxedWriter) -> SyncResult<()> {
		let decrypting: BoxedWriter = Box::new(OfbWriter { inner: writer, stream: self.cipher.stream() });
		self.inner.pull(name, decrypting).await
	}

	async fn push(&self, name: &str, reader: BoxedReader) -> SyncResult<()> {
		let encrypting: BoxedReader = Box::new(OfbReader { inner: reader, stream: self.cipher.stream() });
		self.inner.push(name, encrypting).await
	}

	async fn remove(&self, name: &str) -> SyncResult<()> {
		self.inner.remove(name).await
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
