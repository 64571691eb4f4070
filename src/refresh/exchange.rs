//! Credential-issuing endpoint boundary: trade a refresh token for a new access token.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpResponse,
	http::{
		Method, Request,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, UserIdentity},
	error::{ConfigError, TransientError},
	http::{self, ApiHttpClient},
};

/// Boxed future returned by [`RefreshExchange::exchange`].
pub type ExchangeFuture<'a> = Pin<Box<dyn Future<Output = Result<RefreshedTokens>> + 'a + Send>>;

/// Performs the network call that exchanges a refresh token.
///
/// Implementations classify failures: a rejected refresh token must surface as
/// [`Error::CredentialExpired`], temporary upstream trouble as [`Error::Transient`], and
/// connection problems as [`Error::Transport`].
pub trait RefreshExchange
where
	Self: Send + Sync,
{
	/// Exchanges `refresh_token` for a new token pair.
	fn exchange<'a>(&'a self, refresh_token: &'a TokenSecret) -> ExchangeFuture<'a>;
}

/// Tokens issued by a successful exchange.
#[derive(Clone, Debug)]
pub struct RefreshedTokens {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token; `None` keeps the current one.
	pub refresh_token: Option<TokenSecret>,
	/// Updated identity, when the endpoint returns one.
	pub subject: Option<UserIdentity>,
}
impl RefreshedTokens {
	/// Creates a token pair without identity data.
	pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: refresh_token.map(TokenSecret::new),
			subject: None,
		}
	}

	/// Attaches the identity returned alongside the tokens.
	pub fn with_subject(mut self, subject: UserIdentity) -> Self {
		self.subject = Some(subject);

		self
	}
}

#[derive(Serialize)]
struct RefreshRequestBody<'a> {
	refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponseBody {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	user: Option<UserIdentity>,
}

/// JSON exchange against the application's own refresh route.
///
/// Sends `POST <endpoint>` with `{"refresh_token": "..."}` and expects
/// `{"access_token": "...", "refresh_token"?: "...", "user"?: {...}}` back.
pub struct JsonRefreshExchange<C>
where
	C: ?Sized + ApiHttpClient,
{
	endpoint: Url,
	http_client: Arc<C>,
}
impl<C> JsonRefreshExchange<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Creates an exchange that posts to `endpoint` through `http_client`.
	pub fn new(endpoint: Url, http_client: impl Into<Arc<C>>) -> Self {
		Self { endpoint, http_client: http_client.into() }
	}

	/// Absolute URL of the refresh route.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}
}
impl<C> RefreshExchange for JsonRefreshExchange<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn exchange<'a>(&'a self, refresh_token: &'a TokenSecret) -> ExchangeFuture<'a> {
		Box::pin(async move {
			let handle = self.http_client.handle();
			let body =
				serde_json::to_vec(&RefreshRequestBody { refresh_token: refresh_token.expose() })
					.map_err(|e| ConfigError::RequestBody { source: Arc::new(e) })?;
			let request = Request::builder()
				.method(Method::POST)
				.uri(self.endpoint.as_str())
				.header(CONTENT_TYPE, "application/json")
				.header(ACCEPT, "application/json")
				.body(body)
				.map_err(ConfigError::from)?;
			let response =
				handle.call(request).await.map_err(|e| http::map_transport_error("refresh", e))?;

			classify_response(response)
		})
	}
}
impl<C> Debug for JsonRefreshExchange<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("JsonRefreshExchange").field("endpoint", &self.endpoint.as_str()).finish()
	}
}

fn classify_response(response: HttpResponse) -> Result<RefreshedTokens> {
	let status = response.status();

	if status.is_success() {
		let mut deserializer = serde_json::Deserializer::from_slice(response.body());
		let body: RefreshResponseBody = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|e| TransientError::RefreshResponseParse {
				source: Arc::new(e),
				status: Some(status.as_u16()),
			})?;
		let mut tokens = RefreshedTokens::new(body.access_token, body.refresh_token);

		tokens.subject = body.user;

		return Ok(tokens);
	}

	let preview = crate::pipeline::body_preview(response.body());

	match status.as_u16() {
		408 | 429 | 500..=599 => Err(TransientError::RefreshEndpoint {
			message: format!("status {status}: {preview}"),
			status: Some(status.as_u16()),
			retry_after: http::parse_retry_after(response.headers()),
		}
		.into()),
		400..=499 => Err(Error::CredentialExpired {
			reason: format!("refresh endpoint answered {status}: {preview}"),
		}),
		_ => Err(TransientError::RefreshEndpoint {
			message: format!("unexpected status {status}"),
			status: Some(status.as_u16()),
			retry_after: None,
		}
		.into()),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::StatusCode;
	// self
	use super::*;
	use crate::_preludet::{ScriptedHttpClient, fixture_identity, response};

	fn exchange(client: ScriptedHttpClient) -> JsonRefreshExchange<ScriptedHttpClient> {
		let endpoint =
			Url::parse("https://api.example.com/auth/refresh").expect("Endpoint should parse.");

		JsonRefreshExchange::new(endpoint, client)
	}

	#[tokio::test]
	async fn success_keeps_optional_fields_optional() {
		let client = ScriptedHttpClient::new(|request| {
			assert_eq!(request.method(), Method::POST);
			assert_eq!(request.body().as_slice(), br#"{"refresh_token":"refresh-1"}"#);

			response(StatusCode::OK, br#"{"access_token":"access-2"}"#)
		});
		let tokens = exchange(client.clone())
			.exchange(&TokenSecret::new("refresh-1"))
			.await
			.expect("Exchange should succeed.");

		assert_eq!(tokens.access_token.expose(), "access-2");
		assert!(tokens.refresh_token.is_none());
		assert!(tokens.subject.is_none());
		assert_eq!(client.sent()[0].0, "https://api.example.com/auth/refresh");
	}

	#[tokio::test]
	async fn success_carries_rotated_refresh_token_and_user() {
		let client = ScriptedHttpClient::new(|_| {
			response(
				StatusCode::OK,
				concat!(
					r#"{"access_token":"a","refresh_token":"r","user":{"id":42,"#,
					r#""nome":"Ada Lovelace","email":"ada@example.com","username":"ada"}}"#,
				)
				.as_bytes(),
			)
		});
		let tokens = exchange(client)
			.exchange(&TokenSecret::new("refresh-1"))
			.await
			.expect("Exchange should succeed.");

		assert_eq!(tokens.refresh_token.as_ref().map(TokenSecret::expose), Some("r"));
		assert_eq!(tokens.subject, Some(fixture_identity()));
	}

	#[tokio::test]
	async fn rejected_refresh_token_is_credential_expired() {
		for status in [StatusCode::BAD_REQUEST, StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
			let client =
				ScriptedHttpClient::new(move |_| response(status, b"invalid refresh token"));
			let err = exchange(client)
				.exchange(&TokenSecret::new("revoked"))
				.await
				.expect_err("Rejected refresh tokens should fail.");

			assert!(matches!(err, Error::CredentialExpired { .. }), "{status}: {err:?}");
		}
	}

	#[tokio::test]
	async fn server_errors_and_bad_json_are_transient() {
		let client = ScriptedHttpClient::new(|_| response(StatusCode::BAD_GATEWAY, b"upstream"));
		let err = exchange(client)
			.exchange(&TokenSecret::new("refresh-1"))
			.await
			.expect_err("Server errors should fail.");

		assert!(matches!(
			err,
			Error::Transient(TransientError::RefreshEndpoint { status: Some(502), .. })
		));

		let client = ScriptedHttpClient::new(|_| response(StatusCode::OK, br#"{"token":"x"}"#));
		let err = exchange(client)
			.exchange(&TokenSecret::new("refresh-1"))
			.await
			.expect_err("Malformed bodies should fail.");

		assert!(matches!(err, Error::Transient(TransientError::RefreshResponseParse { .. })));
	}
}
