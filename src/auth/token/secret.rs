//! Token strings that stay redacted everywhere except on the wire.

// crates.io
use oauth2::http::HeaderValue;
// self
use crate::{_prelude::*, auth::inspector, error::ConfigError};

/// Access or refresh token; `Debug` and `Display` never print the value.
///
/// Access tokens are expected to be JWTs, refresh tokens are opaque. Neither is ever
/// verified locally.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a raw token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Raw token value, for the transport and the store only.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// `Authorization: Bearer` value, flagged sensitive so HTTP stacks omit it from their logs.
	pub fn bearer_header(&self) -> Result<HeaderValue, ConfigError> {
		let mut value = HeaderValue::try_from(format!("Bearer {}", self.0))
			.map_err(|_| ConfigError::InvalidAuthorizationHeader)?;

		value.set_sensitive(true);

		Ok(value)
	}

	/// `exp` claim of a JWT access token; `None` for opaque or malformed tokens.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		inspector::decode_expiry(&self.0).ok()
	}
}
impl From<String> for TokenSecret {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenSecret(<redacted>)")
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
