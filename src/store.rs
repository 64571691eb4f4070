//! Storage contracts and built-in key-value backends for session credentials.
//!
//! [`CredentialStore`] is the injected key-value boundary (the host's secure storage on a real
//! device); [`CredentialVault`] layers typed access and atomic rotation on top of it.

pub mod file;
pub mod memory;
pub mod vault;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use vault::CredentialVault;

// self
use crate::_prelude::*;

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Key-value backend holding the session's credential entries.
///
/// Implementations should override [`set_many`](Self::set_many) and
/// [`remove_many`](Self::remove_many) so readers never observe a half-rotated credential; the
/// provided defaults apply the entries one by one.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Reads the value stored under `key`, if any.
	fn get(&self, key: CredentialKey) -> StoreFuture<'_, Option<String>>;

	/// Stores `value` under `key`, replacing any previous value.
	fn set(&self, key: CredentialKey, value: String) -> StoreFuture<'_, ()>;

	/// Removes the value stored under `key`; missing keys are not an error.
	fn remove(&self, key: CredentialKey) -> StoreFuture<'_, ()>;

	/// Stores every entry as one batch.
	fn set_many(&self, entries: Vec<(CredentialKey, String)>) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			for (key, value) in entries {
				self.set(key, value).await?;
			}

			Ok(())
		})
	}

	/// Removes every key as one batch.
	fn remove_many(&self, keys: Vec<CredentialKey>) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			for key in keys {
				self.remove(key).await?;
			}

			Ok(())
		})
	}
}

/// Keys under which the session persists its credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKey {
	/// Current access token.
	AccessToken,
	/// Current refresh token.
	RefreshToken,
	/// Serialized [`UserIdentity`](crate::auth::UserIdentity).
	User,
}
impl CredentialKey {
	/// Every key, in the order they are written.
	pub const ALL: [Self; 3] = [Self::AccessToken, Self::RefreshToken, Self::User];

	/// Returns the stable storage name of the key.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AccessToken => "access_token",
			Self::RefreshToken => "refresh_token",
			Self::User => "user",
		}
	}
}
impl Display for CredentialKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend or the vault.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	struct SequentialStore(Mutex<Vec<String>>);
	impl CredentialStore for SequentialStore {
		fn get(&self, _key: CredentialKey) -> StoreFuture<'_, Option<String>> {
			Box::pin(async { Ok(None) })
		}

		fn set(&self, key: CredentialKey, value: String) -> StoreFuture<'_, ()> {
			Box::pin(async move {
				self.0.lock().push(format!("set {key}={value}"));

				Ok(())
			})
		}

		fn remove(&self, key: CredentialKey) -> StoreFuture<'_, ()> {
			Box::pin(async move {
				self.0.lock().push(format!("remove {key}"));

				Ok(())
			})
		}
	}

	#[test]
	fn key_names_match_persisted_layout() {
		assert_eq!(
			CredentialKey::ALL.map(CredentialKey::as_str),
			["access_token", "refresh_token", "user"]
		);
		assert_eq!(
			serde_json::to_string(&CredentialKey::RefreshToken).expect("Keys should serialize."),
			"\"refresh_token\""
		);
	}

	#[tokio::test]
	async fn batch_defaults_apply_entries_in_order() {
		let store = SequentialStore(Mutex::new(Vec::new()));

		store
			.set_many(vec![
				(CredentialKey::AccessToken, "a".into()),
				(CredentialKey::RefreshToken, "r".into()),
			])
			.await
			.expect("Default batch set should succeed.");
		store
			.remove_many(CredentialKey::ALL.to_vec())
			.await
			.expect("Default batch remove should succeed.");

		assert_eq!(
			*store.0.lock(),
			[
				"set access_token=a",
				"set refresh_token=r",
				"remove access_token",
				"remove refresh_token",
				"remove user",
			]
		);
	}
}
