// std
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Copy, Debug)]
pub(crate) enum RefreshEvent {
	Attempt,
	Success,
	Failure,
	Coalesced,
}

/// Lock-free tallies of the coordinator's refresh activity.
#[derive(Debug, Default)]
pub struct RefreshMetrics([AtomicU64; 4]);
impl RefreshMetrics {
	/// Copies the current tallies.
	pub fn snapshot(&self) -> RefreshCounts {
		let [attempts, successes, failures, coalesced] =
			self.0.each_ref().map(|counter| counter.load(Ordering::Relaxed));

		RefreshCounts { attempts, successes, failures, coalesced }
	}

	pub(crate) fn record(&self, event: RefreshEvent) {
		self.0[event as usize].fetch_add(1, Ordering::Relaxed);
	}
}

/// Point-in-time copy of [`RefreshMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshCounts {
	/// Exchanges sent to the credential-issuing endpoint.
	pub attempts: u64,
	/// Cycles that stored a new credential.
	pub successes: u64,
	/// Cycles that ended in session termination.
	pub failures: u64,
	/// Callers that joined a cycle already in flight.
	pub coalesced: u64,
}
