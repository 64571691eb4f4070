//! Identity of the signed-in user, carried through the session as an opaque payload.

// std
use std::borrow::Borrow;
// crates.io
use serde::{Deserializer, de::Error as _};
// self
use crate::_prelude::*;

const USER_ID_MAX_LEN: usize = 128;

/// Error returned when a user identifier is rejected.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("User identifier cannot be empty.")]
	Empty,
	/// The identifier contains whitespace.
	#[error("User identifier contains whitespace.")]
	ContainsWhitespace,
	/// The identifier is longer than the API ever issues.
	#[error("User identifier exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
}

/// API-issued user identifier.
///
/// The login endpoint sends numeric ids while stored identities carry strings; both decode
/// into the same value and always serialize as a string.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct UserId(String);
impl UserId {
	/// Validates and wraps `value`.
	pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
		let value = value.into();

		if value.is_empty() {
			return Err(IdentifierError::Empty);
		}
		if value.chars().any(char::is_whitespace) {
			return Err(IdentifierError::ContainsWhitespace);
		}
		if value.chars().count() > USER_ID_MAX_LEN {
			return Err(IdentifierError::TooLong { max: USER_ID_MAX_LEN });
		}

		Ok(Self(value))
	}

	/// Identifier as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl<'de> Deserialize<'de> for UserId {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Wire {
			Text(String),
			Number(u64),
		}

		let raw = match Wire::deserialize(deserializer)? {
			Wire::Text(text) => text,
			Wire::Number(number) => number.to_string(),
		};

		Self::new(raw).map_err(D::Error::custom)
	}
}
impl AsRef<str> for UserId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for UserId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl Debug for UserId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "UserId({})", self.0)
	}
}
impl Display for UserId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for UserId {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

/// Profile of the authenticated user; present only while a credential is stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
	/// API-issued user identifier.
	pub id: UserId,
	/// Name shown by the host application.
	#[serde(rename = "name", alias = "nome", alias = "display_name")]
	pub display_name: String,
	/// Contact email.
	pub email: String,
}
impl UserIdentity {
	/// Creates an identity from its parts.
	pub fn new(id: UserId, display_name: impl Into<String>, email: impl Into<String>) -> Self {
		Self { id, display_name: display_name.into(), email: email.into() }
	}
}
