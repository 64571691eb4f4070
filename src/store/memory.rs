//! Thread-safe in-memory [`CredentialStore`] implementation for tests and ephemeral sessions.

// self
use crate::{
	_prelude::*,
	store::{CredentialKey, CredentialStore, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<CredentialKey, String>>>;

/// Storage backend that keeps entries in-process; batches are applied under one write lock.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Returns `true` when no credential entry is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Returns a snapshot of the stored entries.
	pub fn snapshot(&self) -> HashMap<CredentialKey, String> {
		self.0.read().clone()
	}
}
impl CredentialStore for MemoryStore {
	fn get(&self, key: CredentialKey) -> StoreFuture<'_, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(&key).cloned()) })
	}

	fn set(&self, key: CredentialKey, value: String) -> StoreFuture<'_, ()> {
		self.set_many(vec![(key, value)])
	}

	fn remove(&self, key: CredentialKey) -> StoreFuture<'_, ()> {
		self.remove_many(vec![key])
	}

	fn set_many(&self, entries: Vec<(CredentialKey, String)>) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().extend(entries);

			Ok(())
		})
	}

	fn remove_many(&self, keys: Vec<CredentialKey>) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			let mut guard = map.write();

			for key in keys {
				guard.remove(&key);
			}

			Ok(())
		})
	}
}
