//! Session termination: clear the stored credential and send the host back to sign-in.

// std
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret, UserIdentity},
	obs::{self, Flow, FlowKind},
	store::CredentialVault,
};

/// Host-side signal used to leave the authenticated area of the application.
pub trait HostNavigator
where
	Self: Send + Sync,
{
	/// Moves the user-facing application to its unauthenticated entry point.
	fn navigate_to_unauthenticated(&self);
}
impl<F> HostNavigator for F
where
	F: Fn() + Send + Sync,
{
	fn navigate_to_unauthenticated(&self) {
		self()
	}
}

/// Navigator for headless hosts that have nothing to navigate.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNavigator;
impl HostNavigator for NoopNavigator {
	fn navigate_to_unauthenticated(&self) {}
}

/// Clears the credential and signals the host exactly once per session.
///
/// Every sign-in and every termination starts a new generation. Work that began under one
/// generation, such as a refresh cycle, only writes to the store while that generation is
/// still current.
pub struct SessionTerminator {
	vault: CredentialVault,
	navigator: Arc<dyn HostNavigator>,
	terminated: AtomicBool,
	generation: AtomicU64,
	transition: AsyncMutex<()>,
}
impl SessionTerminator {
	/// Creates a terminator for the provided vault + navigator pair.
	pub fn new(vault: CredentialVault, navigator: Arc<dyn HostNavigator>) -> Self {
		Self {
			vault,
			navigator,
			terminated: AtomicBool::new(false),
			generation: AtomicU64::new(0),
			transition: AsyncMutex::new(()),
		}
	}

	/// Returns `true` once the session has been terminated and not re-armed by a sign-in.
	pub fn is_terminated(&self) -> bool {
		self.terminated.load(Ordering::Acquire)
	}

	/// Identifies the current session; bumped by every sign-in and termination.
	pub fn generation(&self) -> u64 {
		self.generation.load(Ordering::Acquire)
	}

	/// Clears every credential entry and signals the host.
	///
	/// Repeated calls are no-ops until [`SessionTerminator::sign_in`] re-arms the session. The
	/// host is only signalled once the store has been cleared.
	pub async fn terminate(&self) -> Result<()> {
		let _transition = self.transition.lock().await;

		self.terminate_locked().await
	}

	/// Terminates the session only if it is still the one identified by `generation`.
	///
	/// Returns `Ok(false)` without touching the store when a sign-in or termination happened
	/// in the meantime.
	pub async fn terminate_generation(&self, generation: u64) -> Result<bool> {
		let _transition = self.transition.lock().await;

		if self.generation() != generation {
			return Ok(false);
		}

		self.terminate_locked().await.map(|()| true)
	}

	/// Persists a freshly issued credential and re-arms the session.
	pub async fn sign_in(&self, credential: &Credential) -> Result<()> {
		let _transition = self.transition.lock().await;

		self.vault.replace(credential).await?;
		self.terminated.store(false, Ordering::Release);
		self.generation.fetch_add(1, Ordering::AcqRel);

		Ok(())
	}

	/// Writes refreshed tokens if the session identified by `generation` is still live.
	///
	/// Returns `Ok(false)` and discards the tokens when the session was signed out or replaced
	/// while they were being issued.
	pub async fn rotate_generation(
		&self,
		generation: u64,
		access_token: &TokenSecret,
		refresh_token: &TokenSecret,
		subject: Option<&UserIdentity>,
	) -> Result<bool> {
		let _transition = self.transition.lock().await;

		if self.is_terminated() || self.generation() != generation {
			return Ok(false);
		}

		self.vault.rotate(access_token, refresh_token, subject).await?;

		Ok(true)
	}

	async fn terminate_locked(&self) -> Result<()> {
		if self.is_terminated() {
			return Ok(());
		}

		let flow = Flow::start(FlowKind::Terminate, "terminate");
		let cleared = flow.instrument(self.vault.clear()).await;

		if cleared.is_ok() {
			self.terminated.store(true, Ordering::Release);
			self.generation.fetch_add(1, Ordering::AcqRel);
			self.navigator.navigate_to_unauthenticated();
			obs::log_terminated();
		}

		flow.finish(cleared)
	}
}
impl Debug for SessionTerminator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionTerminator")
			.field("terminated", &self.is_terminated())
			.field("generation", &self.generation())
			.finish()
	}
}
