// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters describing how [`TokenLifecycleManager`] served token lookups.
///
/// [`TokenLifecycleManager`]: crate::manager::TokenLifecycleManager
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	cache_hits: AtomicU64,
	refreshes: AtomicU64,
	rejections: AtomicU64,
	transient_failures: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the total number of token lookups.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of lookups answered from the cache.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Returns the number of successful refresh grants.
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Returns the number of lookups that ended with invalidated state.
	pub fn rejections(&self) -> u64 {
		self.rejections.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh attempts that failed without touching state.
	pub fn transient_failures(&self) -> u64 {
		self.transient_failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_rejection(&self) {
		self.rejections.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_transient_failure(&self) {
		self.transient_failures.fetch_add(1, Ordering::Relaxed);
	}
}
