//! Session configuration and its validating builder.

// self
use crate::{
	_prelude::*, auth::TokenInspector, error::ConfigError, pipeline::PublicRoutes,
	refresh::RefreshCoordinator,
};

/// Validated settings shared by the pipeline and the refresh coordinator.
#[derive(Clone, Debug)]
pub struct SessionConfig {
	/// API base URL; relative request targets resolve against it.
	pub base_url: Url,
	/// Path of the refresh route, relative to the base URL.
	pub refresh_path: String,
	/// Path of the login route used by
	/// [`SessionClient::login`](crate::client::SessionClient::login).
	pub login_path: String,
	/// Path of the registration route used by
	/// [`SessionClient::register`](crate::client::SessionClient::register).
	pub register_path: String,
	/// Routes sent without credentials; always contains `refresh_path`.
	pub public_routes: PublicRoutes,
	/// Remaining lifetime under which an access token is refreshed proactively.
	pub expiry_threshold: Duration,
	/// Bound on a single refresh exchange.
	pub refresh_timeout: Duration,
}
impl SessionConfig {
	/// Default refresh route of the mobile API.
	pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
	/// Default login route of the mobile API.
	pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";
	/// Default registration route of the mobile API.
	pub const DEFAULT_REGISTER_PATH: &str = "/auth/register";

	/// Starts a builder for `base_url`.
	pub fn builder(base_url: Url) -> SessionConfigBuilder {
		SessionConfigBuilder::new(base_url)
	}

	/// Parses `base_url` and builds a configuration with default settings.
	pub fn new(base_url: &str) -> Result<Self, ConfigError> {
		let url = Url::parse(base_url)
			.map_err(|source| ConfigError::InvalidUrl { url: base_url.to_owned(), source })?;

		Self::builder(url).build()
	}

	/// Absolute URL of the refresh route.
	pub fn refresh_endpoint(&self) -> Result<Url, ConfigError> {
		let raw = format!(
			"{}/{}",
			self.base_url.as_str().trim_end_matches('/'),
			self.refresh_path.trim_start_matches('/')
		);

		Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { url: raw, source })
	}

	/// Inspector configured with the expiry threshold.
	pub fn inspector(&self) -> TokenInspector {
		TokenInspector::new(self.expiry_threshold)
	}
}

/// Builder for [`SessionConfig`] values.
#[derive(Debug)]
pub struct SessionConfigBuilder {
	base_url: Url,
	refresh_path: String,
	login_path: String,
	register_path: String,
	public_routes: Vec<String>,
	expiry_threshold: Duration,
	refresh_timeout: Duration,
}
impl SessionConfigBuilder {
	/// Creates a builder seeded with the default routes, threshold, and timeout.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			refresh_path: SessionConfig::DEFAULT_REFRESH_PATH.into(),
			login_path: SessionConfig::DEFAULT_LOGIN_PATH.into(),
			register_path: SessionConfig::DEFAULT_REGISTER_PATH.into(),
			public_routes: PublicRoutes::DEFAULT.iter().map(|route| (*route).to_owned()).collect(),
			expiry_threshold: TokenInspector::DEFAULT_THRESHOLD,
			refresh_timeout: RefreshCoordinator::DEFAULT_TIMEOUT,
		}
	}

	/// Overrides the refresh route.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the login route.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.login_path = path.into();

		self
	}

	/// Overrides the registration route.
	pub fn register_path(mut self, path: impl Into<String>) -> Self {
		self.register_path = path.into();

		self
	}

	/// Adds a route to the public allow-list.
	pub fn public_route(mut self, route: impl Into<String>) -> Self {
		self.public_routes.push(route.into());

		self
	}

	/// Replaces the public allow-list; the refresh route is added back during
	/// [`build`](Self::build).
	pub fn public_routes<I, S>(mut self, routes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.public_routes = routes.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the proactive refresh threshold (defaults to five minutes).
	pub fn expiry_threshold(mut self, threshold: Duration) -> Self {
		self.expiry_threshold = threshold;

		self
	}

	/// Overrides the refresh timeout (defaults to 30 seconds).
	pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
		self.refresh_timeout = timeout;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<SessionConfig, ConfigError> {
		validate_base_url(&self.base_url)?;

		if self.expiry_threshold.is_negative() {
			return Err(ConfigError::NegativeExpiryThreshold);
		}
		if !self.refresh_timeout.is_positive() {
			return Err(ConfigError::NonPositiveRefreshTimeout);
		}

		let mut public_routes = PublicRoutes::new(self.public_routes)?;

		public_routes.push(self.refresh_path.clone())?;

		Ok(SessionConfig {
			base_url: self.base_url,
			refresh_path: self.refresh_path,
			login_path: self.login_path,
			register_path: self.register_path,
			public_routes,
			expiry_threshold: self.expiry_threshold,
			refresh_timeout: self.refresh_timeout,
		})
	}
}

fn validate_base_url(url: &Url) -> Result<(), ConfigError> {
	if url.cannot_be_a_base() {
		return Err(ConfigError::CannotBeABase { url: url.to_string() });
	}

	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ConfigError::InsecureBaseUrl { url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}
