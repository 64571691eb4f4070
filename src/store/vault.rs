//! Typed credential access layered over a [`CredentialStore`].

// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret, UserIdentity},
	store::{CredentialKey, CredentialStore, StoreError},
};

/// Typed view of the injected key-value store.
///
/// Writes go through the store's batch operations so a concurrent reader sees either the
/// previous or the next credential, never a half-rotated pair.
#[derive(Clone)]
pub struct CredentialVault {
	store: Arc<dyn CredentialStore>,
}
impl CredentialVault {
	/// Wraps the provided backend.
	pub fn new(store: Arc<dyn CredentialStore>) -> Self {
		Self { store }
	}

	/// Underlying key-value backend.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	/// Reads the current access token.
	pub async fn access_token(&self) -> Result<Option<TokenSecret>> {
		Ok(self.store.get(CredentialKey::AccessToken).await?.map(TokenSecret::new))
	}

	/// Reads the current refresh token.
	pub async fn refresh_token(&self) -> Result<Option<TokenSecret>> {
		Ok(self.store.get(CredentialKey::RefreshToken).await?.map(TokenSecret::new))
	}

	/// Reads and decodes the stored user identity.
	pub async fn subject(&self) -> Result<Option<UserIdentity>> {
		let Some(raw) = self.store.get(CredentialKey::User).await? else {
			return Ok(None);
		};
		let identity = serde_json::from_str(&raw).map_err(|e| StoreError::Serialization {
			message: format!("Stored user identity is not valid JSON: {e}"),
		})?;

		Ok(Some(identity))
	}

	/// Loads the full credential; `None` unless both tokens and the identity are present.
	pub async fn load(&self) -> Result<Option<Credential>> {
		let (Some(access_token), Some(refresh_token), Some(subject)) =
			(self.access_token().await?, self.refresh_token().await?, self.subject().await?)
		else {
			return Ok(None);
		};

		Ok(Some(Credential { access_token, refresh_token, subject }))
	}

	/// Replaces every credential entry in one batch.
	pub async fn replace(&self, credential: &Credential) -> Result<()> {
		let subject = encode_subject(&credential.subject)?;

		self.store
			.set_many(vec![
				(CredentialKey::AccessToken, credential.access_token.expose().to_owned()),
				(CredentialKey::RefreshToken, credential.refresh_token.expose().to_owned()),
				(CredentialKey::User, subject),
			])
			.await?;

		Ok(())
	}

	/// Rotates both tokens (and optionally the identity) in one batch.
	pub async fn rotate(
		&self,
		access_token: &TokenSecret,
		refresh_token: &TokenSecret,
		subject: Option<&UserIdentity>,
	) -> Result<()> {
		let mut entries = vec![
			(CredentialKey::AccessToken, access_token.expose().to_owned()),
			(CredentialKey::RefreshToken, refresh_token.expose().to_owned()),
		];

		if let Some(subject) = subject {
			entries.push((CredentialKey::User, encode_subject(subject)?));
		}

		self.store.set_many(entries).await?;

		Ok(())
	}

	/// Stores an updated identity without touching the tokens.
	pub async fn store_subject(&self, subject: &UserIdentity) -> Result<()> {
		self.store.set(CredentialKey::User, encode_subject(subject)?).await?;

		Ok(())
	}

	/// Removes every credential entry in one batch.
	pub async fn clear(&self) -> Result<()> {
		self.store.remove_many(CredentialKey::ALL.to_vec()).await?;

		Ok(())
	}
}
impl Debug for CredentialVault {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CredentialVault(..)")
	}
}

fn encode_subject(subject: &UserIdentity) -> Result<String, StoreError> {
	serde_json::to_string(subject).map_err(|e| StoreError::Serialization {
		message: format!("Failed to serialize user identity: {e}"),
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{fixture_credential, fixture_identity},
		store::MemoryStore,
	};

	fn vault() -> (CredentialVault, MemoryStore) {
		let backend = MemoryStore::default();

		(CredentialVault::new(Arc::new(backend.clone())), backend)
	}

	#[tokio::test]
	async fn replace_then_load_returns_the_same_credential() {
		let (vault, _) = vault();
		let credential = fixture_credential("access-1", "refresh-1");

		vault.replace(&credential).await.expect("Replace should succeed.");

		let loaded = vault.load().await.expect("Load should succeed.").expect("Credential exists.");

		assert_eq!(loaded, credential);
	}

	#[tokio::test]
	async fn rotate_keeps_identity_when_none_is_returned() {
		let (vault, _) = vault();

		vault.replace(&fixture_credential("access-1", "refresh-1")).await.expect("Seed.");
		vault
			.rotate(&TokenSecret::new("access-2"), &TokenSecret::new("refresh-2"), None)
			.await
			.expect("Rotate should succeed.");

		let loaded = vault.load().await.expect("Load should succeed.").expect("Credential exists.");

		assert_eq!(loaded.access_token.expose(), "access-2");
		assert_eq!(loaded.refresh_token.expose(), "refresh-2");
		assert_eq!(loaded.subject, fixture_identity());
	}

	#[tokio::test]
	async fn partial_entries_do_not_form_a_credential() {
		let (vault, backend) = vault();

		backend.set(CredentialKey::AccessToken, "orphan".into()).await.expect("Seed.");

		assert!(vault.load().await.expect("Load should succeed.").is_none());
		assert_eq!(
			vault
				.access_token()
				.await
				.expect("Read should succeed.")
				.map(|t| t.expose().to_owned()),
			Some("orphan".into())
		);

		vault.clear().await.expect("Clear should succeed.");

		assert!(backend.is_empty());
	}

	#[tokio::test]
	async fn corrupt_identity_is_a_storage_error() {
		let (vault, backend) = vault();

		backend.set(CredentialKey::User, "{".into()).await.expect("Seed.");

		let err = vault.subject().await.expect_err("Corrupt identities should fail to decode.");

		assert!(matches!(err, Error::Storage(StoreError::Serialization { .. })));
	}
}
