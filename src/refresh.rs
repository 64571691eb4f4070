//! Single-flight refresh coordination.
//!
//! [`RefreshCoordinator::ensure_fresh_token`] guarantees that at most one refresh exchange is
//! in flight per session. The first caller moves the coordinator into the refreshing state and
//! spawns the refresh cycle on the tokio runtime; callers arriving while it runs only enqueue a
//! oneshot waiter. When the exchange completes, the new credential is written in one batch and
//! every waiter is resolved before the state returns to idle. A failed cycle terminates the
//! session first and then rejects every waiter with the same error. Tokens issued to a session
//! that was signed out while the exchange ran are discarded and the waiters see
//! [`Error::Unauthenticated`].
//!
//! The cycle runs detached from its callers, so dropping a caller future never cancels a
//! refresh another request depends on.

mod exchange;
mod metrics;

pub use exchange::*;
pub use metrics::{RefreshCounts, RefreshMetrics};

// crates.io
use tokio::{runtime::Handle, sync::oneshot};
// self
use crate::{
	_prelude::*,
	auth::{TokenInspector, TokenSecret},
	error::{ConfigError, TransientError},
	obs::{self, Flow, FlowKind},
	refresh::metrics::RefreshEvent,
	session::SessionTerminator,
	store::CredentialVault,
};

type Waiter = oneshot::Sender<Result<TokenSecret>>;

enum RefreshState {
	Idle,
	Refreshing { waiters: Vec<Waiter> },
}

/// Owns the refresh state of one session and serializes refresh exchanges.
#[derive(Clone)]
pub struct RefreshCoordinator {
	inner: Arc<CoordinatorInner>,
}
impl RefreshCoordinator {
	/// Default bound on a single refresh exchange.
	pub const DEFAULT_TIMEOUT: Duration = Duration::seconds(30);

	/// Creates a coordinator; `timeout` bounds every exchange and a timed-out exchange counts as
	/// a failed refresh.
	pub fn new(
		vault: CredentialVault,
		terminator: Arc<SessionTerminator>,
		exchange: Arc<dyn RefreshExchange>,
		inspector: TokenInspector,
		timeout: Duration,
	) -> Self {
		Self {
			inner: Arc::new(CoordinatorInner {
				vault,
				terminator,
				exchange,
				inspector,
				timeout,
				state: Mutex::new(RefreshState::Idle),
				metrics: RefreshMetrics::default(),
			}),
		}
	}

	/// Counters describing refresh activity so far.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.inner.metrics
	}

	/// Inspector used by [`refresh_if_expiring_soon`](Self::refresh_if_expiring_soon).
	pub fn inspector(&self) -> &TokenInspector {
		&self.inner.inspector
	}

	/// Returns `true` while a refresh cycle is in flight.
	pub fn is_refreshing(&self) -> bool {
		matches!(*self.inner.state.lock(), RefreshState::Refreshing { .. })
	}

	/// Resolves with an access token obtained from a refresh exchange.
	///
	/// Concurrent callers share one exchange. Fails fast with [`Error::Unauthenticated`] once
	/// the session has been terminated and not signed in again.
	///
	/// The exchange runs on a spawned task, so this must be polled inside a tokio runtime;
	/// elsewhere it returns [`ConfigError::MissingRuntime`] without touching the session.
	pub async fn ensure_fresh_token(&self) -> Result<TokenSecret> {
		if self.inner.terminator.is_terminated() {
			return Err(Error::Unauthenticated);
		}

		let runtime = Handle::try_current().map_err(|_| ConfigError::MissingRuntime)?;

		let (tx, rx) = oneshot::channel();
		let generation = self.inner.terminator.generation();
		let leader = {
			let mut state = self.inner.state.lock();

			if let RefreshState::Refreshing { waiters } = &mut *state {
				waiters.push(tx);
				self.inner.metrics.record(RefreshEvent::Coalesced);

				false
			} else {
				*state = RefreshState::Refreshing { waiters: vec![tx] };

				true
			}
		};

		if leader {
			runtime.spawn(Arc::clone(&self.inner).run_cycle(generation));
		}

		rx.await.unwrap_or_else(|_| Err(TransientError::RefreshAbandoned.into()))
	}

	/// Best-effort refresh used before ordinary requests.
	///
	/// Refreshes only when the stored access token expires within the inspector's threshold.
	/// Failures are logged and absorbed; the return value reports whether a refresh succeeded.
	pub async fn refresh_if_expiring_soon(&self) -> bool {
		let token = match self.inner.vault.access_token().await {
			Ok(Some(token)) => token,
			Ok(None) => return false,
			Err(e) => {
				obs::absorb(FlowKind::ProactiveRefresh, &e);

				return false;
			},
		};

		if !self.inner.inspector.is_expiring_soon(&token) {
			return false;
		}

		let flow = Flow::start(FlowKind::ProactiveRefresh, "refresh_if_expiring_soon");
		let result = flow.instrument(self.ensure_fresh_token()).await;

		if let Err(e) = &result {
			flow.absorb(e);

			return false;
		}

		flow.finish(result).is_ok()
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("refreshing", &self.is_refreshing())
			.field("inspector", &self.inner.inspector)
			.field("timeout", &self.inner.timeout)
			.field("metrics", &self.inner.metrics)
			.finish()
	}
}

struct CoordinatorInner {
	vault: CredentialVault,
	terminator: Arc<SessionTerminator>,
	exchange: Arc<dyn RefreshExchange>,
	inspector: TokenInspector,
	timeout: Duration,
	state: Mutex<RefreshState>,
	metrics: RefreshMetrics,
}
impl CoordinatorInner {
	async fn run_cycle(self: Arc<Self>, generation: u64) {
		let flow = Flow::start(FlowKind::Refresh, "run_cycle");
		let outcome = flow.instrument(self.refresh_once(generation)).await;

		match &outcome {
			Ok(_) => self.metrics.record(RefreshEvent::Success),
			Err(_) => {
				self.metrics.record(RefreshEvent::Failure);

				// A session that was signed out or replaced meanwhile is not this cycle's to end.
				if let Err(e) = self.terminator.terminate_generation(generation).await {
					obs::absorb(FlowKind::Terminate, &e);
				}
			},
		}

		self.settle(flow.finish(outcome));
	}

	async fn refresh_once(&self, generation: u64) -> Result<TokenSecret> {
		let Some(refresh_token) = self.vault.refresh_token().await? else {
			return Err(Error::Unauthenticated);
		};

		self.metrics.record(RefreshEvent::Attempt);

		let refreshed = tokio::time::timeout(
			self.timeout.unsigned_abs(),
			self.exchange.exchange(&refresh_token),
		)
		.await
		.map_err(|_| TransientError::RefreshTimedOut { after: self.timeout })??;
		let next_refresh = refreshed.refresh_token.unwrap_or(refresh_token);

		let committed = self
			.terminator
			.rotate_generation(
				generation,
				&refreshed.access_token,
				&next_refresh,
				refreshed.subject.as_ref(),
			)
			.await?;

		if !committed {
			return Err(Error::Unauthenticated);
		}

		Ok(refreshed.access_token)
	}

	// Waiters are answered under the same lock that returns the state to idle.
	fn settle(&self, outcome: Result<TokenSecret>) {
		let mut state = self.state.lock();

		if let RefreshState::Refreshing { waiters } =
			std::mem::replace(&mut *state, RefreshState::Idle)
		{
			for waiter in waiters {
				// A closed receiver only means that caller stopped waiting.
				let _ = waiter.send(outcome.clone());
			}
		}
	}
}
