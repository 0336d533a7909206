//! Progress channel (spec.md §6), grounded on
//! `original_source/store/fs_mon.go`'s `Progress`/`Op`, extended with the
//! sync-engine-level ops (`push`, `pull`, `conflict`, `delete`, `solve`)
//! the original emits ad hoc from `sync.go` rather than through `Mon`.

use std::fmt;

use tokio::sync::mpsc;

/// A bounded queue with drop-on-full avoids back-pressuring the sync pass
/// (spec.md §9 Design Notes): a slow or absent consumer must never stall
/// file transfer.
pub const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
	Push,
	Pull,
	Conflict,
	Delete,
	Solve,
	Read,
	Write,
	Remove,
}

impl fmt::Display for Op {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Op::Push => "push",
			Op::Pull => "pull",
			Op::Conflict => "conflict",
			Op::Delete => "delete",
			Op::Solve => "solve",
			Op::Read => "read",
			Op::Write => "write",
			Op::Remove => "remove",
		};
		f.write_str(s)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
	pub op: Op,
	pub name: String,
	pub modified_by: String,
	/// CRC-64 fingerprint, for sync-engine events (spec.md §6's
	/// `<op>,<name>,<modified_by>,<hex-crc>` format).
	pub crc64: u64,
	/// Running byte count, for `Mon`-originated transfer events — a
	/// separate field from `crc64` so a byte tally is never mistaken for a
	/// fingerprint.
	pub size: u64,
}

impl fmt::Display for Progress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{},{},{},{:x}", self.op, self.name, self.modified_by, self.crc64)
	}
}

pub type ProgressSender = mpsc::Sender<Progress>;
pub type ProgressReceiver = mpsc::Receiver<Progress>;

pub fn channel() -> (ProgressSender, ProgressReceiver) {
	mpsc::channel(CHANNEL_CAPACITY)
}

/// Emit `progress` if a channel is present, dropping it silently when the
/// channel is full or has no receiver left — emitting progress must never
/// block or fail the sync pass.
pub fn emit(chan: Option<&ProgressSender>, progress: Progress) {
	if let Some(chan) = chan {
		let _ = chan.try_send(progress);
	}
}
