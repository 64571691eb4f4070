//! Request and response values exchanged with the pipeline; payloads are opaque bytes.

// crates.io
use oauth2::{
	HttpResponse,
	http::{
		HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, error::ConfigError};

const BODY_PREVIEW_LIMIT: usize = 256;

/// Outgoing API request, relative to the session's base URL unless the target is absolute.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	method: Method,
	target: String,
	headers: HeaderMap,
	body: Vec<u8>,
}
impl ApiRequest {
	/// Creates a request for `target` with the provided method.
	pub fn new(method: Method, target: impl Into<String>) -> Self {
		Self { method, target: target.into(), headers: HeaderMap::new(), body: Vec::new() }
	}

	/// `GET` request.
	pub fn get(target: impl Into<String>) -> Self {
		Self::new(Method::GET, target)
	}

	/// `POST` request.
	pub fn post(target: impl Into<String>) -> Self {
		Self::new(Method::POST, target)
	}

	/// `PUT` request.
	pub fn put(target: impl Into<String>) -> Self {
		Self::new(Method::PUT, target)
	}

	/// `PATCH` request.
	pub fn patch(target: impl Into<String>) -> Self {
		Self::new(Method::PATCH, target)
	}

	/// `DELETE` request.
	pub fn delete(target: impl Into<String>) -> Self {
		Self::new(Method::DELETE, target)
	}

	/// Adds (or replaces) a header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets an opaque request body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	/// Serializes `payload` as the JSON request body.
	pub fn json<T>(mut self, payload: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		self.body = serde_json::to_vec(payload)
			.map_err(|e| ConfigError::RequestBody { source: Arc::new(e) })?;
		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		self.headers.entry(ACCEPT).or_insert(HeaderValue::from_static("application/json"));

		Ok(self)
	}

	/// HTTP method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Path (or absolute URL) the request is sent to.
	pub fn target(&self) -> &str {
		&self.target
	}

	/// Caller-supplied headers; the bearer credential is added at dispatch time.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Raw request body.
	pub fn body_bytes(&self) -> &[u8] {
		&self.body
	}
}

/// Response returned by the pipeline.
#[derive(Debug)]
pub struct ApiResponse(HttpResponse);
impl ApiResponse {
	pub(crate) fn new(inner: HttpResponse) -> Self {
		Self(inner)
	}

	/// Status code.
	pub fn status(&self) -> StatusCode {
		self.0.status()
	}

	/// Response headers.
	pub fn headers(&self) -> &HeaderMap {
		self.0.headers()
	}

	/// Raw response body.
	pub fn body(&self) -> &[u8] {
		self.0.body()
	}

	/// Decodes the body as JSON, reporting the failing path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(self.0.body());

		serde_path_to_error::deserialize(&mut deserializer).map_err(Error::decode)
	}

	/// Converts non-success statuses into [`Error::Status`].
	pub fn error_for_status(self) -> Result<Self> {
		let status = self.status();

		if status.is_success() {
			return Ok(self);
		}

		Err(Error::Status { status: status.as_u16(), body_preview: body_preview(self.body()) })
	}

	/// Returns the underlying `http` response.
	pub fn into_inner(self) -> HttpResponse {
		self.0
	}
}

/// Lossy, length-limited rendering of a body for error messages.
pub(crate) fn body_preview(body: &[u8]) -> String {
	let text = String::from_utf8_lossy(body);
	let text = text.trim();

	if text.chars().count() <= BODY_PREVIEW_LIMIT {
		return text.to_owned();
	}

	let mut buf = text.chars().take(BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}
