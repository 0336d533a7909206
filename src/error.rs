//! Error types for mesh operations

use std::error::Error;
use std::fmt;
use std::io;

/// Unified error type for every mesh operation.
///
/// Variants map onto the error taxonomy a backend, the sync engine, or the
/// configuration layer can raise. `Many` aggregates per-file failures from a
/// sync pass without aborting it, the way the rest of the crate's call sites
/// collect errors.
#[derive(Debug)]
pub enum SyncError {
	/// No such path on the backend.
	NotFound { path: String },

	/// The path already exists and the operation requires it not to.
	AlreadyExists { path: String },

	/// Caller's group does not have access to the path.
	Permission { path: String },

	/// A quota-decorated store is over its byte limit.
	QuotaExceeded { path: String, limit: u64 },

	/// The backend does not implement the requested verb.
	NotSupported { verb: &'static str },

	/// Malformed or incomplete configuration.
	InvalidConfig { message: String },

	/// The `.keyHash` handshake failed: key does not match what is stored.
	InvalidKeyHash { remote: String },

	/// Operation exceeded its deadline.
	Timeout,

	/// Pass cancelled before finishing.
	Cancelled,

	/// Backend-specific failure, message only (no concrete backend wire
	/// protocol is implemented by this crate; see spec Non-goals).
	Backend(String),

	/// Cipher or token (de)serialisation failure.
	Crypto(String),

	/// Wrapped I/O error.
	Io(String),

	/// Aggregate of per-file errors from one sync pass.
	Many(Vec<SyncError>),
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::NotFound { path } => write!(f, "not found: {}", path),
			SyncError::AlreadyExists { path } => write!(f, "already exists: {}", path),
			SyncError::Permission { path } => write!(f, "permission denied: {}", path),
			SyncError::QuotaExceeded { path, limit } => {
				write!(f, "quota exceeded writing {} (limit {} bytes)", path, limit)
			}
			SyncError::NotSupported { verb } => write!(f, "operation not supported: {}", verb),
			SyncError::InvalidConfig { message } => write!(f, "invalid configuration: {}", message),
			SyncError::InvalidKeyHash { remote } => {
				write!(f, "invalid encryption key for remote {}", remote)
			}
			SyncError::Timeout => write!(f, "operation timed out"),
			SyncError::Cancelled => write!(f, "operation cancelled"),
			SyncError::Backend(msg) => write!(f, "backend error: {}", msg),
			SyncError::Crypto(msg) => write!(f, "crypto error: {}", msg),
			SyncError::Io(msg) => write!(f, "I/O error: {}", msg),
			SyncError::Many(errs) => {
				write!(f, "{} error(s): ", errs.len())?;
				for (i, e) in errs.iter().enumerate() {
					if i > 0 {
						write!(f, "; ")?;
					}
					write!(f, "{}", e)?;
				}
				Ok(())
			}
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		match e.kind() {
			io::ErrorKind::NotFound => SyncError::NotFound { path: e.to_string() },
			io::ErrorKind::PermissionDenied => SyncError::Permission { path: e.to_string() },
			_ => SyncError::Io(e.to_string()),
		}
	}
}

/// Accumulates errors from independent operations (one per file, one per
/// remote) without short-circuiting. Mirrors the `multierror.Error` pattern
/// the original sync engine leans on at every call site that fans out.
#[derive(Debug, Default)]
pub struct MultiError {
	errors: Vec<SyncError>,
}

impl MultiError {
	pub fn new() -> Self {
		MultiError { errors: Vec::new() }
	}

	pub fn push(&mut self, err: SyncError) {
		self.errors.push(err);
	}

	/// Records `result`'s error, if any; returns the value on success.
	pub fn absorb<T>(&mut self, result: Result<T, SyncError>) -> Option<T> {
		match result {
			Ok(v) => Some(v),
			Err(e) => {
				self.errors.push(e);
				None
			}
		}
	}

	pub fn is_empty(&self) -> bool {
		self.errors.is_empty()
	}

	pub fn len(&self) -> usize {
		self.errors.len()
	}

	/// Collapses to `Ok(())` when nothing was recorded, `Err(Many(..))`
	/// otherwise.
	pub fn into_result(self) -> Result<(), SyncError> {
		if self.errors.is_empty() {
			Ok(())
		} else {
			Err(SyncError::Many(self.errors))
		}
	}
}

pub type SyncResult<T> = Result<T, SyncError>;

// vim: ts=4
