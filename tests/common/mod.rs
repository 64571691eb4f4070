#![allow(dead_code)]

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use httpmock::MockServer;
use time::{Duration, OffsetDateTime};
// self
use bearer_session::{
	auth::{Credential, UserId, UserIdentity},
	client::SessionClient,
	config::{SessionConfig, SessionConfigBuilder},
	http::ReqwestHttpClient,
	session::HostNavigator,
	store::{CredentialKey, MemoryStore},
	url::Url,
};

/// Mints an unsigned JWT expiring `ttl` from now.
pub fn jwt_expiring_in(ttl: Duration) -> String {
	let exp = (OffsetDateTime::now_utc() + ttl).unix_timestamp();
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
	let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"42","exp":{exp}}}"#));

	format!("{header}.{payload}.signature")
}

pub fn identity() -> UserIdentity {
	UserIdentity::new(
		UserId::new("42").expect("Fixture user identifier should be valid."),
		"Ada Lovelace",
		"ada@example.com",
	)
}

#[derive(Debug, Default)]
pub struct RecordingNavigator(AtomicUsize);
impl RecordingNavigator {
	pub fn calls(&self) -> usize {
		self.0.load(Ordering::SeqCst)
	}
}
impl HostNavigator for RecordingNavigator {
	fn navigate_to_unauthenticated(&self) {
		self.0.fetch_add(1, Ordering::SeqCst);
	}
}

pub struct Fixture {
	pub client: Arc<SessionClient<ReqwestHttpClient>>,
	pub store: MemoryStore,
	pub navigator: Arc<RecordingNavigator>,
}
impl Fixture {
	pub fn stored(&self, key: CredentialKey) -> Option<String> {
		self.store.snapshot().get(&key).cloned()
	}
}

pub fn config_for(server: &MockServer) -> SessionConfigBuilder {
	let base_url = Url::parse(&server.base_url()).expect("Mock server URL should parse.");

	SessionConfig::builder(base_url)
}

/// Builds a reqwest-backed session against `server` with nothing stored.
pub fn signed_out(server: &MockServer) -> Fixture {
	let config =
		config_for(server).build().expect("Session config should build for the mock server.");
	let store = MemoryStore::default();
	let navigator = Arc::new(RecordingNavigator::default());
	let client = SessionClient::new(config, Arc::new(store.clone()), navigator.clone())
		.expect("Reqwest session should build.");

	Fixture { client: Arc::new(client), store, navigator }
}

/// Builds a reqwest-backed session against `server` and signs in with the provided tokens.
pub async fn signed_in(server: &MockServer, access: &str, refresh: &str) -> Fixture {
	signed_in_with(config_for(server), access, refresh).await
}

pub async fn signed_in_with(config: SessionConfigBuilder, access: &str, refresh: &str) -> Fixture {
	let config = config.build().expect("Session config should build for the mock server.");
	let store = MemoryStore::default();
	let navigator = Arc::new(RecordingNavigator::default());
	let client = SessionClient::new(config, Arc::new(store.clone()), navigator.clone())
		.expect("Reqwest session should build.");

	client
		.sign_in(&Credential::new(access, refresh, identity()))
		.await
		.expect("Signing in should persist the credential.");

	Fixture { client: Arc::new(client), store, navigator }
}
