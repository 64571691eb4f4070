//! Session facade wiring the store, coordinator, pipeline, and terminator together.
//!
//! [`SessionClient`] is what a host keeps for the lifetime of the signed-in user: it persists
//! the credential issued at sign-in, sends API requests through the pipeline, and tears the
//! session down on sign-out or when a refresh fails.

// self
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, refresh::JsonRefreshExchange};
use crate::{
	_prelude::*,
	auth::{
		Credential, LoginRequest, Registration, TokenSecret, UserIdentity, login::LoginResponse,
	},
	config::SessionConfig,
	http::ApiHttpClient,
	pipeline::{ApiRequest, ApiResponse, RequestPipeline},
	refresh::{RefreshCoordinator, RefreshExchange, RefreshMetrics},
	session::{HostNavigator, SessionTerminator},
	store::{CredentialStore, CredentialVault},
};

/// Authenticated API session for one host application.
///
/// Refreshes run on spawned tasks, so the session must be driven from inside a tokio runtime;
/// elsewhere refreshing fails with [`ConfigError::MissingRuntime`](crate::error::ConfigError).
pub struct SessionClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	config: SessionConfig,
	vault: CredentialVault,
	terminator: Arc<SessionTerminator>,
	coordinator: RefreshCoordinator,
	pipeline: RequestPipeline<C>,
}
#[cfg(feature = "reqwest")]
impl SessionClient<ReqwestHttpClient> {
	/// Creates a session using reqwest and the JSON refresh route of the API.
	pub fn new(
		config: SessionConfig,
		store: Arc<dyn CredentialStore>,
		navigator: Arc<dyn HostNavigator>,
	) -> Result<Self> {
		let http_client = Arc::new(ReqwestHttpClient::new()?);
		let exchange = Arc::new(<JsonRefreshExchange<ReqwestHttpClient>>::new(
			config.refresh_endpoint()?,
			http_client.clone(),
		));

		Ok(Self::with_http_client(config, store, navigator, http_client, exchange))
	}
}
impl<C> SessionClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Creates a session on top of a custom transport and refresh exchange.
	pub fn with_http_client(
		config: SessionConfig,
		store: Arc<dyn CredentialStore>,
		navigator: Arc<dyn HostNavigator>,
		http_client: impl Into<Arc<C>>,
		exchange: Arc<dyn RefreshExchange>,
	) -> Self {
		let vault = CredentialVault::new(store);
		let terminator = Arc::new(SessionTerminator::new(vault.clone(), navigator));
		let coordinator = RefreshCoordinator::new(
			vault.clone(),
			terminator.clone(),
			exchange,
			config.inspector(),
			config.refresh_timeout,
		);
		let pipeline = RequestPipeline::new(
			config.base_url.clone(),
			config.refresh_path.clone(),
			config.public_routes.clone(),
			vault.clone(),
			coordinator.clone(),
			http_client,
		);

		Self { config, vault, terminator, coordinator, pipeline }
	}

	/// Signs in through the login route and stores the issued credential.
	///
	/// Rejected credentials surface as [`Error::Status`] and leave the store untouched.
	pub async fn login(&self, request: &LoginRequest) -> Result<Credential> {
		let response = self
			.send(ApiRequest::post(self.config.login_path.as_str()).json(request)?)
			.await?
			.error_for_status()?;
		let credential = Credential::from(response.json::<LoginResponse>()?);

		self.sign_in(&credential).await?;

		Ok(credential)
	}

	/// Creates an account through the registration route without signing in.
	pub async fn register(&self, registration: &Registration) -> Result<ApiResponse> {
		self.send(ApiRequest::post(self.config.register_path.as_str()).json(registration)?)
			.await?
			.error_for_status()
	}

	/// Stores the credential issued by the login endpoint and re-arms a terminated session.
	pub async fn sign_in(&self, credential: &Credential) -> Result<()> {
		self.terminator.sign_in(credential).await
	}

	/// Clears the stored credential and signals the host, like a failed refresh would.
	pub async fn sign_out(&self) -> Result<()> {
		self.terminator.terminate().await
	}

	/// Returns `true` when both an access token and a user identity are stored.
	pub async fn is_authenticated(&self) -> Result<bool> {
		if self.terminator.is_terminated() {
			return Ok(false);
		}

		Ok(self.vault.access_token().await?.is_some() && self.vault.subject().await?.is_some())
	}

	/// Identity of the signed-in user, if any.
	pub async fn current_user(&self) -> Result<Option<UserIdentity>> {
		self.vault.subject().await
	}

	/// Loads the full stored credential, if complete.
	pub async fn credential(&self) -> Result<Option<Credential>> {
		self.vault.load().await
	}

	/// Applies `update` to the stored identity and persists the result.
	///
	/// Does nothing and returns `None` when no user is signed in.
	pub async fn update_user<F>(&self, update: F) -> Result<Option<UserIdentity>>
	where
		F: FnOnce(&mut UserIdentity),
	{
		let Some(mut subject) = self.vault.subject().await? else {
			return Ok(None);
		};

		update(&mut subject);
		self.vault.store_subject(&subject).await?;

		Ok(Some(subject))
	}

	/// Sends `request` through the pipeline.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		self.pipeline.send(request).await
	}

	/// Forces a single-flight refresh and returns the new access token.
	pub async fn ensure_fresh_token(&self) -> Result<TokenSecret> {
		self.coordinator.ensure_fresh_token().await
	}

	/// Refreshes when the stored access token is about to expire; never fails.
	pub async fn refresh_if_expiring_soon(&self) -> bool {
		self.coordinator.refresh_if_expiring_soon().await
	}

	/// Validated configuration.
	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	/// Typed credential store.
	pub fn vault(&self) -> &CredentialVault {
		&self.vault
	}

	/// Session terminator.
	pub fn terminator(&self) -> &Arc<SessionTerminator> {
		&self.terminator
	}

	/// Refresh coordinator.
	pub fn coordinator(&self) -> &RefreshCoordinator {
		&self.coordinator
	}

	/// Request pipeline.
	pub fn pipeline(&self) -> &RequestPipeline<C> {
		&self.pipeline
	}

	/// Refresh counters.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		self.coordinator.metrics()
	}
}
impl<C> Debug for SessionClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionClient")
			.field("config", &self.config)
			.field("terminator", &self.terminator)
			.field("coordinator", &self.coordinator)
			.finish()
	}
}
