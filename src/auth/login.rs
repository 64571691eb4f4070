//! Payloads of the credential-issuing routes.
//!
//! Field names follow the mobile API's wire format, which spells the password `senha` and the
//! display name `nome`.

// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret, UserIdentity},
};

/// Username and password posted to the login route.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
	/// Account username.
	pub username: String,
	/// Account password.
	#[serde(rename = "senha")]
	pub password: String,
}
impl LoginRequest {
	/// Creates a login payload.
	pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
		Self { username: username.into(), password: password.into() }
	}
}
impl Debug for LoginRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginRequest")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Account details posted to the registration route.
#[derive(Clone, Serialize)]
pub struct Registration {
	/// Name shown to the user.
	#[serde(rename = "nome")]
	pub display_name: String,
	/// Account username.
	pub username: String,
	/// Contact address.
	pub email: String,
	/// Account password.
	#[serde(rename = "senha")]
	pub password: String,
}
impl Debug for Registration {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Registration")
			.field("display_name", &self.display_name)
			.field("username", &self.username)
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

#[derive(Deserialize)]
pub(crate) struct LoginResponse {
	access_token: TokenSecret,
	refresh_token: TokenSecret,
	user: UserIdentity,
}
impl From<LoginResponse> for Credential {
	fn from(response: LoginResponse) -> Self {
		Self {
			access_token: response.access_token,
			refresh_token: response.refresh_token,
			subject: response.user,
		}
	}
}
