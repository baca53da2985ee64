// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of [`RefreshMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshCounts {
	/// Refreshes started.
	pub attempts: u64,
	/// Refreshes that stored a new token pair.
	pub renewed: u64,
	/// Refreshes that ended as absent (no record, rejected grant, or persistence failure).
	pub absent: u64,
}

/// Per-process refresh counters shared by every flow of a linker.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	renewed: AtomicU64,
	absent: AtomicU64,
}
impl RefreshMetrics {
	/// Reads all counters.
	pub fn snapshot(&self) -> RefreshCounts {
		RefreshCounts {
			attempts: self.attempts.load(Ordering::Relaxed),
			renewed: self.renewed.load(Ordering::Relaxed),
			absent: self.absent.load(Ordering::Relaxed),
		}
	}

	pub(crate) fn begin(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn finish(&self, renewed: bool) {
		let counter = if renewed { &self.renewed } else { &self.absent };

		counter.fetch_add(1, Ordering::Relaxed);
	}
}
