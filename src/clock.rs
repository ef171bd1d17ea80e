//! Time sources shared by the lifecycle manager and the webhook verifier.

// self
use crate::_prelude::*;

/// Source of the current instant.
///
/// Every expiry and freshness decision in the crate reads time through this trait so tests can
/// pin the clock with [`ManualClock`].
pub trait Clock
where
	Self: Send + Sync,
{
	/// Returns the current UTC instant.
	fn now(&self) -> OffsetDateTime;

	/// Returns the current instant as milliseconds since the Unix epoch.
	fn now_millis(&self) -> i64 {
		unix_millis(self.now())
	}
}

/// Wall clock backed by [`OffsetDateTime::now_utc`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Manually driven clock for deterministic tests and simulations.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);
impl ManualClock {
	/// Creates a clock frozen at `instant`.
	pub fn new(instant: OffsetDateTime) -> Self {
		Self(Arc::new(Mutex::new(instant)))
	}

	/// Creates a clock frozen at `millis` since the Unix epoch.
	///
	/// Values outside the supported calendar range fall back to the epoch.
	pub fn from_millis(millis: i64) -> Self {
		let instant =
			OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
				.unwrap_or(OffsetDateTime::UNIX_EPOCH);

		Self::new(instant)
	}

	/// Moves the clock forward (or backward for negative durations).
	pub fn advance(&self, delta: Duration) {
		let mut now = self.0.lock();

		*now = now.saturating_add(delta);
	}

	/// Replaces the current instant.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::new(OffsetDateTime::UNIX_EPOCH)
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}

/// Converts an instant into whole milliseconds since the Unix epoch, saturating at the `i64`
/// bounds.
pub fn unix_millis(instant: OffsetDateTime) -> i64 {
	let millis = instant.unix_timestamp_nanos() / 1_000_000;

	i64::try_from(millis).unwrap_or(if millis.is_negative() { i64::MIN } else { i64::MAX })
}
