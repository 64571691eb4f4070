//! Session-level error types shared across the pipeline, refresh coordinator, and stores.
//!
//! Every error is cheap to clone: a single refresh failure is delivered to every request that
//! was queued behind it, so underlying sources are shared through [`Arc`].

// self
use crate::{_prelude::*, pipeline::ApiResponse};

/// Session-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Shareable boxed error used as the source of wrapped third-party failures.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration or request-construction problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; the caller may retry later.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// No usable credential exists or the session has already been terminated.
	#[error("Session is not authenticated.")]
	Unauthenticated,
	/// The refresh token was rejected; the session has been terminated.
	#[error("Refresh token was rejected: {reason}.")]
	CredentialExpired {
		/// Server- or session-supplied reason string.
		reason: String,
	},
	/// The request was rejected again after being replayed with a fresh token.
	#[error("Request was rejected with status {status} after retrying with a refreshed token.")]
	RetryExhausted {
		/// Status code of the final response.
		status: u16,
		/// The final response, headers and body included.
		response: Arc<ApiResponse>,
	},
	/// The API answered with a non-success status.
	#[error("API responded with status {status}: {body_preview}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Leading part of the response body.
		body_preview: String,
	},
	/// A response body could not be decoded into the requested type.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured decoding failure including the JSON path.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
	},
}
impl Error {
	/// Returns `true` for failures that mean the user has to authenticate again.
	///
	/// HTTP 403 counts as an authentication error for reporting purposes even though the pipeline
	/// never refreshes on it.
	pub fn is_auth_error(&self) -> bool {
		match self {
			Self::Unauthenticated | Self::CredentialExpired { .. } | Self::RetryExhausted { .. } =>
				true,
			Self::Status { status, .. } => matches!(status, 401 | 403),
			_ => false,
		}
	}

	/// Final response carried by [`Error::RetryExhausted`].
	pub fn rejected_response(&self) -> Option<&ApiResponse> {
		match self {
			Self::RetryExhausted { response, .. } => Some(response),
			_ => None,
		}
	}

	pub(crate) fn retry_exhausted(response: ApiResponse) -> Self {
		Self::RetryExhausted { status: response.status().as_u16(), response: Arc::new(response) }
	}

	pub(crate) fn decode(source: serde_path_to_error::Error<serde_json::Error>) -> Self {
		Self::Decode { source: Arc::new(source) }
	}
}

/// Configuration and request-construction failures.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// HTTP request construction failed.
	#[error("HTTP request could not be constructed.")]
	HttpRequest {
		/// Underlying `http` crate failure.
		#[source]
		source: SharedError,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody {
		/// Underlying serializer failure.
		#[source]
		source: SharedError,
	},
	/// A URL (base URL or request target) cannot be parsed.
	#[error("URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending input.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The base URL cannot carry a path.
	#[error("Base URL `{url}` cannot be used as a base.")]
	CannotBeABase {
		/// Offending base URL.
		url: String,
	},
	/// Base URL uses an unsupported scheme or plain HTTP to a remote host.
	#[error("Base URL must use HTTPS (plain HTTP is only accepted for loopback hosts): {url}.")]
	InsecureBaseUrl {
		/// Offending base URL.
		url: String,
	},
	/// A public route entry was empty.
	#[error("Public routes cannot be empty strings.")]
	EmptyRoute,
	/// The refresh timeout must be strictly positive.
	#[error("The refresh timeout must be positive.")]
	NonPositiveRefreshTimeout,
	/// The expiry threshold cannot be negative.
	#[error("The expiry threshold cannot be negative.")]
	NegativeExpiryThreshold,
	/// A refresh was requested outside of a tokio runtime.
	#[error("Refreshing requires a running tokio runtime.")]
	MissingRuntime,
	/// A token contains characters that cannot appear in an `Authorization` header.
	#[error("Access token cannot be used as an Authorization header value.")]
	InvalidAuthorizationHeader,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}
impl From<oauth2::http::Error> for ConfigError {
	fn from(e: oauth2::http::Error) -> Self {
		Self::HttpRequest { source: Arc::new(e) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry once the session is re-established).
#[derive(Clone, Debug, ThisError)]
pub enum TransientError {
	/// Refresh endpoint returned an unexpected but non-fatal response.
	#[error("Refresh endpoint returned an unexpected response: {message}.")]
	RefreshEndpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Refresh endpoint responded with JSON that does not match the expected shape.
	#[error("Refresh endpoint returned malformed JSON.")]
	RefreshResponseParse {
		/// Structured parsing failure.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// The refresh call did not complete within the configured timeout.
	#[error("Refresh call did not complete within {after}.")]
	RefreshTimedOut {
		/// Configured timeout.
		after: Duration,
	},
	/// The refresh task ended without reporting an outcome.
	#[error("Refresh task ended without reporting an outcome.")]
	RefreshAbandoned,
}

/// Transport-level failures (network, IO).
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {endpoint}.")]
	Network {
		/// Endpoint label (`api` or `refresh`).
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling {endpoint}.")]
	Io {
		/// Endpoint label (`api` or `refresh`).
		endpoint: &'static str,
		/// Underlying IO failure.
		#[source]
		source: Arc<std::io::Error>,
	},
	/// HTTP client failure reported only as a message.
	#[error("HTTP client error occurred while calling {endpoint}: {message}.")]
	Other {
		/// Endpoint label (`api` or `refresh`).
		endpoint: &'static str,
		/// Client-supplied description.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(endpoint: &'static str, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { endpoint, source: Arc::new(src) }
	}
}
