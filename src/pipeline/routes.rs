// self
use crate::{_prelude::*, error::ConfigError};

/// Allow-list of routes that are sent without credentials.
///
/// A request is public when its target *contains* any listed entry. Public requests never
/// carry a bearer header and never trigger proactive or reactive refresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicRoutes(Vec<String>);
impl PublicRoutes {
	/// Credential issuance, registration, and refresh routes of the mobile API.
	pub const DEFAULT: [&str; 3] = ["/auth/login", "/auth/register", "/auth/refresh"];

	/// Builds an allow-list from explicit entries; empty entries are rejected.
	pub fn new<I, S>(routes: I) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut list = Self(Vec::new());

		for route in routes {
			list.push(route)?;
		}

		Ok(list)
	}

	/// Adds `route` unless it is already listed.
	pub fn push(&mut self, route: impl Into<String>) -> Result<(), ConfigError> {
		let route = route.into();

		if route.trim().is_empty() {
			return Err(ConfigError::EmptyRoute);
		}
		if !self.0.contains(&route) {
			self.0.push(route);
		}

		Ok(())
	}

	/// Returns `true` when `target` contains any allow-listed entry.
	pub fn matches(&self, target: &str) -> bool {
		self.0.iter().any(|route| target.contains(route.as_str()))
	}

	/// Iterates over the entries.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}
}
impl Default for PublicRoutes {
	fn default() -> Self {
		Self(Self::DEFAULT.iter().map(|route| (*route).to_owned()).collect())
	}
}
