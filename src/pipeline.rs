//! Outgoing request pipeline: bearer attachment, proactive refresh, and the 401 replay.
//!
//! Every request passes two interception points. Before sending, public routes go out
//! untouched while every other request first gets a best-effort proactive refresh and then the
//! stored access token as an `Authorization: Bearer` header. On response, a `401` to a
//! non-public request is replayed exactly once with a token obtained through the coordinator;
//! a second `401` surfaces as [`Error::RetryExhausted`] carrying that response. Every other
//! status, `403` included, is returned to the caller unchanged. When a proactive refresh fails
//! the request still goes out with the token it found before the attempt.

mod message;
mod routes;

pub use message::*;
pub use routes::*;

// crates.io
use oauth2::{
	AsyncHttpClient,
	http::{Request, StatusCode, header::AUTHORIZATION},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::ConfigError,
	http::{self, ApiHttpClient},
	obs::{Flow, FlowKind},
	refresh::RefreshCoordinator,
	store::CredentialVault,
};

/// A request in flight together with the number of replays it already consumed.
#[derive(Clone, Debug)]
pub struct Dispatch {
	/// Original request; replays resend it unchanged apart from the bearer header.
	pub request: ApiRequest,
	/// Replays performed so far.
	pub retries: u8,
}
impl Dispatch {
	/// Maximum number of replays after an authentication failure.
	pub const MAX_RETRIES: u8 = 1;

	/// Wraps a request that has not been sent yet.
	pub fn new(request: ApiRequest) -> Self {
		Self { request, retries: 0 }
	}

	/// Consumes one replay; returns `false` once the budget is spent.
	pub fn mark_retried(&mut self) -> bool {
		if self.retries >= Self::MAX_RETRIES {
			return false;
		}

		self.retries += 1;

		true
	}
}

/// Sends API requests on behalf of the session.
pub struct RequestPipeline<C>
where
	C: ?Sized + ApiHttpClient,
{
	base_url: Url,
	refresh_path: String,
	public_routes: PublicRoutes,
	vault: CredentialVault,
	coordinator: RefreshCoordinator,
	http_client: Arc<C>,
}
impl<C> RequestPipeline<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Creates a pipeline; relative targets resolve against `base_url`.
	pub fn new(
		base_url: Url,
		refresh_path: impl Into<String>,
		public_routes: PublicRoutes,
		vault: CredentialVault,
		coordinator: RefreshCoordinator,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self {
			base_url,
			refresh_path: refresh_path.into(),
			public_routes,
			vault,
			coordinator,
			http_client: http_client.into(),
		}
	}

	/// Allow-list consulted before every request.
	pub fn public_routes(&self) -> &PublicRoutes {
		&self.public_routes
	}

	/// Resolves a request target into the absolute URI that is dispatched.
	pub fn resolve(&self, target: &str) -> String {
		if target.starts_with("https://") || target.starts_with("http://") {
			return target.to_owned();
		}

		let base = self.base_url.as_str().trim_end_matches('/');

		if target.starts_with('/') { format!("{base}{target}") } else { format!("{base}/{target}") }
	}

	/// Sends `request`, refreshing and replaying it at most once on `401`.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		let flow = Flow::start(FlowKind::Dispatch, "send");
		let result = flow.instrument(self.dispatch(request)).await;

		flow.finish(result)
	}

	async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse> {
		if self.public_routes.matches(request.target()) {
			return self.execute(&request, None).await;
		}

		let stored = self.vault.access_token().await?;
		// A failed proactive refresh has already cleared the store; the stale token still goes.
		let mut token = if self.coordinator.refresh_if_expiring_soon().await {
			self.vault.access_token().await?
		} else {
			stored
		};
		let refreshable = !request.target().contains(self.refresh_path.as_str());
		let mut dispatch = Dispatch::new(request);

		loop {
			let response = self.execute(&dispatch.request, token.as_ref()).await?;

			if response.status() != StatusCode::UNAUTHORIZED || !refreshable {
				return Ok(response);
			}
			if !dispatch.mark_retried() {
				return Err(Error::retry_exhausted(response));
			}

			token = Some(self.token_for_replay(token.as_ref()).await?);
		}
	}

	// A token that changed since the request was sent was rotated by a refresh that finished
	// while this response was in flight; replaying with it needs no second exchange.
	async fn token_for_replay(&self, sent: Option<&TokenSecret>) -> Result<TokenSecret> {
		match self.vault.access_token().await? {
			Some(current) if Some(&current) != sent => Ok(current),
			_ => self.coordinator.ensure_fresh_token().await,
		}
	}

	async fn execute(
		&self,
		request: &ApiRequest,
		token: Option<&TokenSecret>,
	) -> Result<ApiResponse> {
		let mut http_request = Request::builder()
			.method(request.method().clone())
			.uri(self.resolve(request.target()))
			.body(request.body_bytes().to_vec())
			.map_err(ConfigError::from)?;

		*http_request.headers_mut() = request.headers().clone();

		if let Some(token) = token {
			http_request.headers_mut().insert(AUTHORIZATION, token.bearer_header()?);
		}

		let handle = self.http_client.handle();
		let response =
			handle.call(http_request).await.map_err(|e| http::map_transport_error("api", e))?;

		Ok(ApiResponse::new(response))
	}
}
impl<C> Debug for RequestPipeline<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestPipeline")
			.field("base_url", &self.base_url.as_str())
			.field("refresh_path", &self.refresh_path)
			.field("public_routes", &self.public_routes)
			.finish()
	}
}
