#![cfg(feature = "reqwest")]

mod common;

// crates.io
use httpmock::prelude::*;
// self
use bearer_session::{
	auth::{LoginRequest, Registration},
	error::Error,
	store::CredentialKey,
};
use common::*;

#[tokio::test]
async fn login_stores_the_issued_credential() {
	let server = MockServer::start_async().await;
	let fixture = signed_out(&server);
	let bearer_login = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login").header_exists("authorization");
			then.status(500);
		})
		.await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/login")
				.json_body(serde_json::json!({ "username": "ada", "senha": "hunter2" }));
			then.status(200).json_body(serde_json::json!({
				"access_token": "access-1",
				"refresh_token": "refresh-1",
				"user": { "id": 42, "nome": "Ada Lovelace", "email": "ada@example.com" }
			}));
		})
		.await;
	let credential = fixture
		.client
		.login(&LoginRequest::new("ada", "hunter2"))
		.await
		.expect("Login should succeed against the mock server.");

	login.assert_calls_async(1).await;
	bearer_login.assert_calls_async(0).await;

	assert_eq!(credential.access_token.expose(), "access-1");
	assert_eq!(fixture.stored(CredentialKey::AccessToken).as_deref(), Some("access-1"));
	assert_eq!(fixture.stored(CredentialKey::RefreshToken).as_deref(), Some("refresh-1"));
	assert!(fixture.client.is_authenticated().await.expect("Store reads should succeed."));

	let user = fixture
		.client
		.current_user()
		.await
		.expect("Store reads should succeed.")
		.expect("Login should store the user identity.");

	assert_eq!(user.id.as_str(), "42");
	assert_eq!(user.display_name, "Ada Lovelace");
}

#[tokio::test]
async fn rejected_login_leaves_the_store_untouched() {
	let server = MockServer::start_async().await;
	let fixture = signed_out(&server);
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login");
			then.status(401).body("{\"message\":\"invalid credentials\"}");
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(500);
		})
		.await;
	let err = fixture
		.client
		.login(&LoginRequest::new("ada", "wrong"))
		.await
		.expect_err("Rejected credentials should fail the login.");

	assert!(matches!(err, Error::Status { status: 401, .. }));

	login.assert_calls_async(1).await;
	refresh.assert_calls_async(0).await;

	assert!(fixture.store.snapshot().is_empty());
	assert_eq!(fixture.navigator.calls(), 0);
}

#[tokio::test]
async fn registration_does_not_sign_in() {
	let server = MockServer::start_async().await;
	let fixture = signed_out(&server);
	let register = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/register").json_body(serde_json::json!({
				"nome": "Ada Lovelace",
				"username": "ada",
				"email": "ada@example.com",
				"senha": "hunter2"
			}));
			then.status(201).json_body(serde_json::json!({ "id": 42 }));
		})
		.await;
	let response = fixture
		.client
		.register(&Registration {
			display_name: "Ada Lovelace".into(),
			username: "ada".into(),
			email: "ada@example.com".into(),
			password: "hunter2".into(),
		})
		.await
		.expect("Registration should succeed against the mock server.");

	assert_eq!(response.status().as_u16(), 201);

	register.assert_calls_async(1).await;

	assert!(!fixture.client.is_authenticated().await.expect("Store reads should succeed."));
	assert!(fixture.store.snapshot().is_empty());
}
