//! Credential pair issued to a signed-in user.

// self
use crate::{
	_prelude::*,
	auth::{UserIdentity, token::secret::TokenSecret},
};

/// Access + refresh token pair together with the identity they were issued for.
///
/// A credential is created on sign-in, rotated as a whole on refresh, and cleared as a whole on
/// termination; the store is the only long-lived owner.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	/// Short-lived token attached to every authenticated request.
	pub access_token: TokenSecret,
	/// Long-lived token used solely to obtain a new access token.
	pub refresh_token: TokenSecret,
	/// User the tokens were issued for.
	pub subject: UserIdentity,
}
impl Credential {
	/// Creates a credential from raw token strings.
	pub fn new(
		access_token: impl Into<String>,
		refresh_token: impl Into<String>,
		subject: UserIdentity,
	) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::new(refresh_token),
			subject,
		}
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("subject", &self.subject)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::fixture_credential;

	#[test]
	fn debug_output_redacts_both_tokens() {
		let rendered = format!("{:?}", fixture_credential("access-123", "refresh-456"));

		assert!(!rendered.contains("access-123"));
		assert!(!rendered.contains("refresh-456"));
		assert!(rendered.contains("Ada Lovelace"));
	}
}
