//! RFC 6749 refresh exchange backed by the `oauth2` crate.
//!
//! Hosts whose credential-issuing server is a standard OAuth 2.0 authorization server use
//! [`OAuth2RefreshExchange`] instead of the JSON exchange; both plug into the coordinator
//! through [`RefreshExchange`].

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, HttpRequest, HttpResponse, RefreshToken, RequestTokenError, Scope,
	TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicErrorResponseType, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, TransientError},
	http::{self, ApiHttpClient},
	refresh::{ExchangeFuture, RefreshExchange, RefreshedTokens},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Client authentication used when calling the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClientAuth {
	/// HTTP Basic authentication (`client_secret_basic`).
	#[default]
	Basic,
	/// Credentials in the form body (`client_secret_post`).
	RequestBody,
}

/// Refresh exchange performing `grant_type=refresh_token` against an OAuth 2.0 token endpoint.
pub struct OAuth2RefreshExchange<C>
where
	C: ?Sized + ApiHttpClient,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	scopes: Vec<String>,
}
impl<C> OAuth2RefreshExchange<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Creates an exchange for a public client (no secret).
	pub fn new(
		token_endpoint: &Url,
		client_id: impl Into<String>,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(token_endpoint.to_string()).map_err(|source| {
			ConfigError::InvalidUrl { url: token_endpoint.to_string(), source }
		})?;
		let oauth_client =
			BasicClient::new(ClientId::new(client_id.into())).set_token_uri(token_url);

		Ok(Self { oauth_client, http_client: http_client.into(), scopes: Vec::new() })
	}

	/// Authenticates the client with `secret` using the provided method.
	pub fn with_client_secret(mut self, secret: impl Into<String>, auth: ClientAuth) -> Self {
		self.oauth_client = self.oauth_client.set_client_secret(ClientSecret::new(secret.into()));

		if auth == ClientAuth::RequestBody {
			self.oauth_client = self.oauth_client.set_auth_type(AuthType::RequestBody);
		}

		self
	}

	/// Requests the provided scopes on every refresh.
	pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}
}
impl<C> RefreshExchange for OAuth2RefreshExchange<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn exchange<'a>(&'a self, refresh_token: &'a TokenSecret) -> ExchangeFuture<'a> {
		Box::pin(async move {
			let handle = <HintingHandle<C>>::new(&self.http_client);
			let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
			let mut request = self.oauth_client.exchange_refresh_token(&refresh_secret);

			for scope in &self.scopes {
				request = request.add_scope(Scope::new(scope.clone()));
			}

			let response = request
				.request_async(&handle)
				.await
				.map_err(|e| map_request_error(handle.hints(), e))?;

			Ok(RefreshedTokens::new(
				response.access_token().secret().to_owned(),
				response.refresh_token().map(|token| token.secret().to_owned()),
			))
		})
	}
}
impl<C> Debug for OAuth2RefreshExchange<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2RefreshExchange")
			.field("client_id", self.oauth_client.client_id())
			.field("token_uri", &self.oauth_client.token_uri().as_str())
			.field("scopes", &self.scopes)
			.finish()
	}
}

/// Status and `Retry-After` hint of the last token-endpoint response.
#[derive(Clone, Copy, Debug, Default)]
struct ResponseHints {
	status: Option<u16>,
	retry_after: Option<Duration>,
}

// `oauth2` discards the status once it has parsed an error body, so the handle keeps it.
struct HintingHandle<C>
where
	C: ?Sized + ApiHttpClient,
{
	inner: C::Handle,
	hints: Arc<Mutex<ResponseHints>>,
}
impl<C> HintingHandle<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn new(http_client: &C) -> Self {
		Self { inner: http_client.handle(), hints: Arc::default() }
	}

	fn hints(&self) -> ResponseHints {
		*self.hints.lock()
	}
}
impl<'c, C> AsyncHttpClient<'c> for HintingHandle<C>
where
	C: ?Sized + ApiHttpClient,
{
	type Error = HttpClientError<C::TransportError>;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let hints = Arc::clone(&self.hints);
		let pending = self.inner.call(request);

		Box::pin(async move {
			let response = pending.await?;

			*hints.lock() = ResponseHints {
				status: Some(response.status().as_u16()),
				retry_after: http::parse_retry_after(response.headers()),
			};

			Ok(response)
		})
	}
}

fn map_request_error<E>(
	hints: ResponseHints,
	err: BasicRequestTokenError<HttpClientError<E>>,
) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response, hints),
		RequestTokenError::Request(error) => http::map_transport_error("refresh", error),
		RequestTokenError::Parse(error, _body) => TransientError::RefreshResponseParse {
			source: Arc::new(error),
			status: hints.status,
		}
		.into(),
		RequestTokenError::Other(message) => TransientError::RefreshEndpoint {
			message: format!("token endpoint returned an unexpected response: {message}"),
			status: hints.status,
			retry_after: hints.retry_after,
		}
		.into(),
	}
}

fn map_server_response_error(response: BasicErrorResponse, hints: ResponseHints) -> Error {
	let message = match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_owned(),
	};

	match response.error() {
		BasicErrorResponseType::InvalidGrant
		| BasicErrorResponseType::InvalidClient
		| BasicErrorResponseType::UnauthorizedClient =>
			Error::CredentialExpired { reason: message },
		_ => TransientError::RefreshEndpoint {
			message,
			status: hints.status,
			retry_after: hints.retry_after,
		}
		.into(),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::{StatusCode, header::CONTENT_TYPE};
	// self
	use super::*;
	use crate::_preludet::{ScriptedHttpClient, response};

	fn token_endpoint() -> Url {
		Url::parse("https://id.example.com/oauth2/token").expect("Token endpoint should parse.")
	}

	fn exchange_for(client: ScriptedHttpClient) -> OAuth2RefreshExchange<ScriptedHttpClient> {
		OAuth2RefreshExchange::new(&token_endpoint(), "mobile-app", client)
			.expect("Exchange should build.")
	}

	fn json(status: StatusCode, body: &[u8]) -> oauth2::HttpResponse {
		let mut response = response(status, body);

		response.headers_mut().insert(
			CONTENT_TYPE,
			"application/json".parse().expect("Content type should be a valid header value."),
		);

		response
	}

	#[tokio::test]
	async fn refresh_grant_returns_rotated_tokens() {
		let client = ScriptedHttpClient::new(|request| {
			let body = String::from_utf8_lossy(request.body());

			assert!(body.contains("grant_type=refresh_token"));
			assert!(body.contains("refresh_token=refresh-1"));
			assert!(body.contains("scope=profile"));

			json(
				StatusCode::OK,
				br#"{"access_token":"access-2","token_type":"bearer","refresh_token":"refresh-2"}"#,
			)
		});
		let exchange = exchange_for(client).with_scopes(["profile"]);
		let tokens = exchange
			.exchange(&TokenSecret::new("refresh-1"))
			.await
			.expect("Refresh should succeed.");

		assert_eq!(tokens.access_token.expose(), "access-2");
		assert_eq!(tokens.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-2"));
	}

	#[tokio::test]
	async fn exchanges_run_on_spawned_tasks() {
		let client = ScriptedHttpClient::new(|_| {
			json(StatusCode::OK, br#"{"access_token":"access-2","token_type":"bearer"}"#)
		});
		let exchange: Arc<dyn RefreshExchange> = Arc::new(exchange_for(client));
		let tokens = tokio::spawn(async move {
			let refresh_token = TokenSecret::new("refresh-1");

			exchange.exchange(&refresh_token).await
		})
		.await
		.expect("The refresh task should not panic.")
		.expect("Refresh should succeed.");

		assert_eq!(tokens.access_token.expose(), "access-2");
		assert!(tokens.refresh_token.is_none());
	}

	#[tokio::test]
	async fn invalid_grant_means_the_credential_expired() {
		let client = ScriptedHttpClient::new(|_| {
			json(
				StatusCode::BAD_REQUEST,
				br#"{"error":"invalid_grant","error_description":"refresh token revoked"}"#,
			)
		});
		let exchange = exchange_for(client).with_client_secret("secret", ClientAuth::RequestBody);
		let err = exchange
			.exchange(&TokenSecret::new("revoked"))
			.await
			.expect_err("Revoked refresh tokens should fail.");

		assert!(
			matches!(&err, Error::CredentialExpired { reason } if reason.contains("revoked")),
			"{err:?}"
		);
	}

	#[tokio::test]
	async fn temporarily_unavailable_is_transient() {
		let client = ScriptedHttpClient::new(|_| {
			let mut response =
				json(StatusCode::SERVICE_UNAVAILABLE, br#"{"error":"temporarily_unavailable"}"#);

			response.headers_mut().insert(
				oauth2::http::header::RETRY_AFTER,
				"15".parse().expect("Retry-After should be a valid header value."),
			);

			response
		});
		let exchange = exchange_for(client);
		let err = exchange
			.exchange(&TokenSecret::new("refresh-1"))
			.await
			.expect_err("Server errors should fail.");
		let Error::Transient(TransientError::RefreshEndpoint { status, retry_after, .. }) = err
		else {
			panic!("Expected a transient endpoint error, got {err:?}.");
		};

		assert_eq!(status, Some(503));
		assert_eq!(retry_after, Some(Duration::seconds(15)));
	}
}
