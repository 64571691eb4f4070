//! JSON-file [`CredentialStore`] for desktop hosts and command-line tools.

// std
use std::{
	collections::BTreeMap,
	fs::{self, OpenOptions},
	io::{self, ErrorKind, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{CredentialKey, CredentialStore, StoreError, StoreFuture},
};

type Entries = BTreeMap<CredentialKey, String>;

/// Keeps the credential entries in memory and mirrors every change to a JSON file.
///
/// A batch is written to a sibling `.tmp` file, synced, and renamed over the snapshot, so a
/// crash leaves either the previous or the next credential on disk. On Unix the file is
/// created readable by its owner only.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	entries: Arc<RwLock<Entries>>,
}
impl FileStore {
	/// Opens the snapshot at `path`, creating parent directories when needed.
	///
	/// A missing or empty file is an empty store; a file that is not a valid snapshot is an
	/// error rather than a silent sign-out.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(io_failure("create directory", parent))?;
		}

		let entries = match fs::read(&path) {
			Ok(bytes) if bytes.is_empty() => Entries::new(),
			Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("{} is not a credential snapshot: {e}", path.display()),
			})?,
			Err(e) if e.kind() == ErrorKind::NotFound => Entries::new(),
			Err(e) => return Err(io_failure("read", &path)(e)),
		};

		Ok(Self { path, entries: Arc::new(RwLock::new(entries)) })
	}

	/// Location of the snapshot file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn update<F>(&self, change: F) -> Result<(), StoreError>
	where
		F: FnOnce(&mut Entries),
	{
		let mut entries = self.entries.write();
		let mut next = entries.clone();

		change(&mut next);

		if next != *entries {
			write_atomically(&self.path, &next)?;

			*entries = next;
		}

		Ok(())
	}
}
impl CredentialStore for FileStore {
	fn get(&self, key: CredentialKey) -> StoreFuture<'_, Option<String>> {
		let value = self.entries.read().get(&key).cloned();

		Box::pin(async move { Ok(value) })
	}

	fn set(&self, key: CredentialKey, value: String) -> StoreFuture<'_, ()> {
		self.set_many(vec![(key, value)])
	}

	fn remove(&self, key: CredentialKey) -> StoreFuture<'_, ()> {
		self.remove_many(vec![key])
	}

	fn set_many(&self, batch: Vec<(CredentialKey, String)>) -> StoreFuture<'_, ()> {
		let outcome = self.update(|entries| entries.extend(batch));

		Box::pin(async move { outcome })
	}

	fn remove_many(&self, keys: Vec<CredentialKey>) -> StoreFuture<'_, ()> {
		let outcome = self.update(|entries| entries.retain(|key, _| !keys.contains(key)));

		Box::pin(async move { outcome })
	}
}

fn write_atomically(path: &Path, entries: &Entries) -> Result<(), StoreError> {
	let bytes = serde_json::to_vec_pretty(entries).map_err(|e| StoreError::Serialization {
		message: format!("Failed to encode the credential snapshot: {e}"),
	})?;
	let tmp = path.with_extension("tmp");
	let mut options = OpenOptions::new();

	options.write(true).create(true).truncate(true);

	#[cfg(unix)]
	{
		use std::os::unix::fs::OpenOptionsExt;

		options.mode(0o600);
	}

	let mut file = options.open(&tmp).map_err(io_failure("create", &tmp))?;

	file.write_all(&bytes).map_err(io_failure("write", &tmp))?;
	file.sync_all().map_err(io_failure("sync", &tmp))?;
	drop(file);

	fs::rename(&tmp, path).map_err(io_failure("replace", path))
}

fn io_failure<'a>(action: &'a str, path: &'a Path) -> impl 'a + FnOnce(io::Error) -> StoreError {
	move |e| StoreError::Backend { message: format!("Failed to {action} {}: {e}", path.display()) }
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;

	struct TempSnapshot(PathBuf);
	impl TempSnapshot {
		fn new(label: &str) -> Self {
			Self(env::temp_dir().join(format!(
				"bearer_session_{label}_{}_{}.json",
				process::id(),
				OffsetDateTime::now_utc().unix_timestamp_nanos(),
			)))
		}
	}
	impl Drop for TempSnapshot {
		fn drop(&mut self) {
			let _ = fs::remove_file(&self.0);
		}
	}

	#[tokio::test]
	async fn rotated_credentials_survive_a_restart() {
		let snapshot = TempSnapshot::new("restart");
		let store = FileStore::open(&snapshot.0).expect("Opening a new snapshot should succeed.");

		store
			.set_many(vec![
				(CredentialKey::AccessToken, "access-2".into()),
				(CredentialKey::RefreshToken, "refresh-2".into()),
			])
			.await
			.expect("Batch write should succeed.");
		drop(store);

		let reopened = FileStore::open(&snapshot.0).expect("Reopening should succeed.");

		assert_eq!(
			reopened.get(CredentialKey::RefreshToken).await.expect("Read should succeed."),
			Some("refresh-2".into())
		);
		assert!(!snapshot.0.with_extension("tmp").exists());
	}

	#[tokio::test]
	async fn clearing_every_key_leaves_an_empty_snapshot() {
		let snapshot = TempSnapshot::new("clear");
		let store = FileStore::open(&snapshot.0).expect("Opening a new snapshot should succeed.");

		store.set(CredentialKey::User, "{}".into()).await.expect("Write should succeed.");
		store.remove_many(CredentialKey::ALL.to_vec()).await.expect("Clear should succeed.");

		let reopened = FileStore::open(&snapshot.0).expect("Reopening should succeed.");

		assert_eq!(reopened.get(CredentialKey::User).await.expect("Read should succeed."), None);
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn snapshots_are_private_to_the_owner() {
		use std::os::unix::fs::PermissionsExt;

		let snapshot = TempSnapshot::new("mode");
		let store = FileStore::open(&snapshot.0).expect("Opening a new snapshot should succeed.");

		store.set(CredentialKey::AccessToken, "a".into()).await.expect("Write should succeed.");

		let mode = fs::metadata(&snapshot.0).expect("Snapshot should exist.").permissions().mode();

		assert_eq!(mode & 0o777, 0o600);
	}

	#[test]
	fn corrupt_snapshots_are_reported() {
		let snapshot = TempSnapshot::new("corrupt");

		fs::write(&snapshot.0, b"not json").expect("Writing the fixture should succeed.");

		assert!(matches!(FileStore::open(&snapshot.0), Err(StoreError::Serialization { .. })));
	}
}
