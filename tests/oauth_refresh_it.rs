#![cfg(feature = "reqwest")]

mod common;

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
// self
use bearer_session::{
	auth::Credential,
	client::SessionClient,
	error::Error,
	http::ReqwestHttpClient,
	oauth::{ClientAuth, OAuth2RefreshExchange},
	pipeline::ApiRequest,
	store::{CredentialKey, MemoryStore},
	url::Url,
};
use common::*;

const CLIENT_ID: &str = "mobile-app";
const CLIENT_SECRET: &str = "mobile-secret";

async fn oauth_session(server: &MockServer) -> Fixture {
	let config = config_for(server).build().expect("Session config should build.");
	let token_endpoint =
		Url::parse(&server.url("/oauth/token")).expect("Mock token endpoint should parse.");
	let http_client = Arc::new(ReqwestHttpClient::new().expect("Reqwest client should build."));
	let exchange = OAuth2RefreshExchange::<ReqwestHttpClient>::new(
		&token_endpoint,
		CLIENT_ID,
		http_client.clone(),
	)
	.expect("OAuth2 exchange should build.")
	.with_client_secret(CLIENT_SECRET, ClientAuth::RequestBody)
	.with_scopes(["finance:read", "finance:write"]);
	let store = MemoryStore::default();
	let navigator = Arc::new(RecordingNavigator::default());
	let client: SessionClient<ReqwestHttpClient> = SessionClient::with_http_client(
		config,
		Arc::new(store.clone()),
		navigator.clone(),
		http_client,
		Arc::new(exchange),
	);

	client
		.sign_in(&Credential::new("access-1", "refresh-1", identity()))
		.await
		.expect("Signing in should persist the credential.");

	Fixture { client: Arc::new(client), store, navigator }
}

#[tokio::test]
async fn refresh_grant_rotates_the_stored_credential() {
	let server = MockServer::start_async().await;
	let fixture = oauth_session(&server).await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.body_includes("grant_type=refresh_token")
				.body_includes("refresh_token=refresh-1")
				.body_includes("client_secret=mobile-secret");
			then.status(200).json_body(serde_json::json!({
				"access_token": "access-2",
				"refresh_token": "refresh-2",
				"token_type": "bearer",
				"expires_in": 900,
			}));
		})
		.await;
	let api = server
		.mock_async(|when, then| {
			when.method(GET).path("/me").header("authorization", "Bearer access-2");
			then.status(200).body("{\"id\":42}");
		})
		.await;
	let fresh = fixture.client.ensure_fresh_token().await.expect("Refresh grant should succeed.");

	assert_eq!(fresh.expose(), "access-2");

	let response = fixture
		.client
		.send(ApiRequest::get("/me"))
		.await
		.expect("Request with the rotated token should succeed.");

	assert_eq!(response.status().as_u16(), 200);

	token.assert_calls_async(1).await;
	api.assert_calls_async(1).await;

	assert_eq!(fixture.stored(CredentialKey::RefreshToken).as_deref(), Some("refresh-2"));
	assert_eq!(
		fixture.client.current_user().await.expect("Reading the identity should work."),
		Some(identity())
	);
}

#[tokio::test]
async fn invalid_grant_terminates_the_session() {
	let server = MockServer::start_async().await;
	let fixture = oauth_session(&server).await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(400)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_grant","error_description":"refresh token expired"}"#);
		})
		.await;
	let err = fixture
		.client
		.ensure_fresh_token()
		.await
		.expect_err("Expired refresh tokens should fail the refresh.");

	assert!(matches!(err, Error::CredentialExpired { ref reason } if reason.contains("expired")));

	token.assert_calls_async(1).await;

	assert!(fixture.store.is_empty());
	assert_eq!(fixture.navigator.calls(), 1);

	fixture.client.sign_out().await.expect("Signing out twice should be a no-op.");

	assert_eq!(fixture.navigator.calls(), 1);
}
