//! Client-side access-token expiry inspection.
//!
//! The inspector only decodes the JWT payload to read its `exp` claim; signatures are never
//! verified because the result is a scheduling heuristic, not a security boundary. Tokens that
//! cannot be decoded are reported as *not* expiring so a parse problem never blocks a request.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{_prelude::*, auth::TokenSecret};

/// Reasons an access token's expiry could not be read.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum DecodeError {
	/// The token does not contain a payload segment.
	#[error("Token is not a JWT: payload segment is missing.")]
	MissingPayload,
	/// The payload segment is not valid base64url.
	#[error("Token payload is not valid base64url.")]
	InvalidEncoding,
	/// The payload is not a JSON object with a numeric `exp`.
	#[error("Token payload is not valid claims JSON: {message}.")]
	InvalidClaims {
		/// Parser message.
		message: String,
	},
	/// The payload carries no `exp` claim.
	#[error("Token payload has no `exp` claim.")]
	MissingExpiry,
	/// The `exp` claim is outside the representable range.
	#[error("Token `exp` claim is out of range.")]
	ExpiryOutOfRange,
}

#[derive(Deserialize)]
struct ExpiryClaims {
	exp: Option<f64>,
}

/// Decodes the `exp` claim of a JWT access token.
pub fn decode_expiry(token: &str) -> Result<OffsetDateTime, DecodeError> {
	let payload = token.split('.').nth(1).ok_or(DecodeError::MissingPayload)?;
	let bytes = URL_SAFE_NO_PAD
		.decode(payload.trim_end_matches('='))
		.map_err(|_| DecodeError::InvalidEncoding)?;
	let claims: ExpiryClaims = serde_json::from_slice(&bytes)
		.map_err(|e| DecodeError::InvalidClaims { message: e.to_string() })?;
	let exp = claims.exp.ok_or(DecodeError::MissingExpiry)?;

	OffsetDateTime::from_unix_timestamp(exp.floor() as i64)
		.map_err(|_| DecodeError::ExpiryOutOfRange)
}

/// Returns `true` when `token` expires in less than `threshold` from `now`.
///
/// Undecodable tokens fail open and report `false`.
pub fn is_expiring_soon_at(token: &str, threshold: Duration, now: OffsetDateTime) -> bool {
	match decode_expiry(token) {
		Ok(expires_at) => expires_at - now < threshold,
		Err(_) => false,
	}
}

/// Returns `true` when `token` expires in less than `threshold` from the current UTC instant.
pub fn is_expiring_soon(token: &str, threshold: Duration) -> bool {
	is_expiring_soon_at(token, threshold, OffsetDateTime::now_utc())
}

/// Stateless facade bundling the inspection helpers with a configured threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenInspector {
	/// Remaining lifetime under which a token counts as expiring soon.
	pub threshold: Duration,
}
impl TokenInspector {
	/// Threshold used by the original mobile client (five minutes).
	pub const DEFAULT_THRESHOLD: Duration = Duration::seconds(300);

	/// Creates an inspector for the provided threshold.
	pub const fn new(threshold: Duration) -> Self {
		Self { threshold }
	}

	/// Checks the secret against the configured threshold at the current instant.
	pub fn is_expiring_soon(&self, token: &TokenSecret) -> bool {
		is_expiring_soon(token.expose(), self.threshold)
	}

	/// Checks the secret against the configured threshold at `now`.
	pub fn is_expiring_soon_at(&self, token: &TokenSecret, now: OffsetDateTime) -> bool {
		is_expiring_soon_at(token.expose(), self.threshold, now)
	}
}
impl Default for TokenInspector {
	fn default() -> Self {
		Self::new(Self::DEFAULT_THRESHOLD)
	}
}
