//! Transport seam shared by the request pipeline and the refresh exchanges.
//!
//! Hosts plug their own HTTP stack in through [`ApiHttpClient`]; the `reqwest` feature ships
//! [`ReqwestHttpClient`]. Requests and responses are the `http` crate types re-exported by
//! `oauth2`, so the same transport also drives [`OAuth2RefreshExchange`].
//!
//! [`OAuth2RefreshExchange`]: crate::oauth::OAuth2RefreshExchange

// crates.io
#[cfg(feature = "reqwest")] use reqwest::redirect::Policy;
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::header::{HeaderMap, RETRY_AFTER},
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// HTTP transport able to carry both API calls and refresh exchanges.
///
/// Each call obtains a fresh [`AsyncHttpClient`] handle. Handles own whatever state they need
/// so request futures stay `Send` while the pipeline awaits them, and they must never follow
/// redirects on their own: a redirected refresh call would leak the refresh token.
pub trait ApiHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Error produced by the underlying stack.
	type TransportError: 'static + Send + Sync + StdError;

	/// Per-call handle.
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Returns a handle for one request.
	fn handle(&self) -> Self::Handle;
}

/// [`ApiHttpClient`] backed by a shared [`ReqwestClient`] connection pool.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a pooled client with redirects disabled.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps a caller-configured client; it should not follow redirects.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiHttpClient for ReqwestHttpClient {
	type Handle = ReqwestHandle;
	type TransportError = ReqwestError;

	fn handle(&self) -> Self::Handle {
		ReqwestHandle(self.0.clone())
	}
}

/// Handle returned by [`ReqwestHttpClient::handle`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHandle(ReqwestClient);
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for ReqwestHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			let request: reqwest::Request = request.try_into().map_err(Box::new)?;
			let response = self.0.execute(request).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().clone();
			let body = response.bytes().await.map_err(Box::new)?;
			let mut converted = HttpResponse::new(body.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

/// Reads a `Retry-After` header given either as delta seconds or as an HTTP date.
///
/// Dates in the past and unparsable values yield `None`.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	if let Ok(seconds) = raw.parse::<u32>() {
		return Some(Duration::seconds(seconds.into()));
	}

	let remaining = OffsetDateTime::parse(raw, &Rfc2822).ok()? - OffsetDateTime::now_utc();

	remaining.is_positive().then_some(remaining)
}

/// Converts a transport failure into a session [`Error`].
///
/// `endpoint` labels the call site (`api` or `refresh`) in the resulting error.
pub(crate) fn map_transport_error<E>(endpoint: &'static str, err: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) => TransportError::network(endpoint, *inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) =>
			TransportError::Io { endpoint, source: Arc::new(inner) }.into(),
		HttpClientError::Other(message) => TransportError::Other { endpoint, message }.into(),
		_ => TransportError::Other { endpoint, message: "unknown HTTP client failure".into() }
			.into(),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::HeaderValue;
	// self
	use super::*;

	fn retry_after(value: &'static str) -> Option<Duration> {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, HeaderValue::from_static(value));

		parse_retry_after(&headers)
	}

	#[test]
	fn retry_after_accepts_delta_seconds_and_future_dates() {
		assert_eq!(retry_after("120"), Some(Duration::seconds(120)));
		assert!(retry_after("Fri, 01 Jan 2100 00:00:00 +0000").is_some_and(|d| d.is_positive()));
	}

	#[test]
	fn retry_after_ignores_past_dates_and_garbage() {
		assert_eq!(retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
		assert_eq!(retry_after("soon"), None);
		assert_eq!(parse_retry_after(&HeaderMap::new()), None);
	}

	#[test]
	fn io_failures_keep_the_endpoint_label() {
		let err = map_transport_error::<std::io::Error>(
			"api",
			HttpClientError::Io(std::io::Error::other("broken pipe")),
		);

		assert!(matches!(err, Error::Transport(TransportError::Io { endpoint: "api", .. })));
	}

	#[test]
	fn opaque_failures_become_other_transport_errors() {
		let err = map_transport_error::<std::io::Error>(
			"refresh",
			HttpClientError::Other("connection reset".into()),
		);

		assert!(matches!(
			err,
			Error::Transport(TransportError::Other { endpoint: "refresh", ref message })
				if message == "connection reset"
		));
	}
}
