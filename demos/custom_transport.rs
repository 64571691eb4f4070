//! Demonstrates driving a [`SessionClient`] over a custom transport and a [`FileStore`].
//!
//! 1. Implement [`ApiHttpClient`] so every call gets its own [`AsyncHttpClient`] handle. Here the
//!    handle answers from an in-process backend instead of the network.
//! 2. Point a [`JsonRefreshExchange`] at the same transport so refresh calls share it.
//! 3. Pass both to [`SessionClient::with_http_client`] together with a [`FileStore`] snapshot.
//! 4. Sign in, let the backend revoke the access token, and watch the next request refresh and
//!    replay transparently.

// std
use std::{
	future::Future,
	io::Error as IoError,
	pin::Pin,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use color_eyre::{Result, eyre::eyre};
use parking_lot::Mutex;
use serde_json::{Value, json};
// self
use bearer_session::{
	auth::LoginRequest,
	client::SessionClient,
	config::SessionConfig,
	http::ApiHttpClient,
	http_types::{Method, StatusCode, header::AUTHORIZATION},
	oauth::oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse},
	pipeline::ApiRequest,
	refresh::JsonRefreshExchange,
	store::{CredentialStore, FileStore},
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = SessionConfig::builder(Url::parse("https://api.example.com")?).build()?;
	let snapshot = std::env::temp_dir().join("bearer-session-demo").join("credentials.json");
	let store: Arc<dyn CredentialStore> = Arc::new(FileStore::open(&snapshot)?);
	let backend = Arc::new(InProcessBackend::default());
	let exchange = Arc::new(<JsonRefreshExchange<InProcessBackend>>::new(
		config.refresh_endpoint()?,
		Arc::clone(&backend),
	));
	let client: SessionClient<InProcessBackend> = SessionClient::with_http_client(
		config,
		store,
		Arc::new(|| println!("Session ended; the host would show its sign-in screen.")),
		Arc::clone(&backend),
		exchange,
	);
	let credential = client.login(&LoginRequest::new("ada", "hunter2")).await?;

	println!(
		"Signed in as {} and persisted the credential to {}.",
		credential.subject.display_name,
		snapshot.display()
	);

	let profile = client.send(ApiRequest::get("/me")).await?;

	println!("First profile call answered {}.", profile.status());

	backend.revoke_access();

	let profile = client.send(ApiRequest::get("/me")).await?;

	println!(
		"Second profile call answered {} after {} refresh exchange(s).",
		profile.status(),
		client.refresh_metrics().snapshot().attempts
	);

	client.sign_out().await?;

	if client.is_authenticated().await? {
		return Err(eyre!("Signing out should clear the stored credential."));
	}

	println!("Signed out; the snapshot no longer holds any tokens.");

	Ok(())
}

/// Backend living in the same process that issues opaque access tokens.
#[derive(Clone, Debug, Default)]
struct InProcessBackend(Arc<BackendState>);
impl InProcessBackend {
	fn revoke_access(&self) {
		*self.0.current.lock() = None;
	}
}
impl ApiHttpClient for InProcessBackend {
	type Handle = InProcessHandle;
	type TransportError = IoError;

	fn handle(&self) -> Self::Handle {
		InProcessHandle(Arc::clone(&self.0))
	}
}

#[derive(Debug, Default)]
struct BackendState {
	issued: AtomicUsize,
	current: Mutex<Option<String>>,
}
impl BackendState {
	fn issue(&self) -> String {
		let token = format!("access-{}", self.issued.fetch_add(1, Ordering::SeqCst) + 1);

		*self.current.lock() = Some(token.clone());

		token
	}

	fn answer(&self, request: &HttpRequest) -> HttpResponse {
		match (request.method(), request.uri().path()) {
			(&Method::POST, "/auth/login") => reply(
				StatusCode::OK,
				json!({
					"access_token": self.issue(),
					"refresh_token": "refresh-1",
					"user": { "id": 42, "nome": "Ada Lovelace", "email": "ada@example.com" }
				}),
			),
			(&Method::POST, "/auth/refresh") =>
				reply(StatusCode::OK, json!({ "access_token": self.issue() })),
			(_, "/me") => {
				let expected = self.current.lock().as_ref().map(|token| format!("Bearer {token}"));
				let presented =
					request.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok());

				if expected.is_some() && presented == expected.as_deref() {
					reply(StatusCode::OK, json!({ "id": 42, "username": "ada" }))
				} else {
					reply(StatusCode::UNAUTHORIZED, json!({ "error": "unauthorized" }))
				}
			},
			_ => reply(StatusCode::NOT_FOUND, json!({ "error": "not found" })),
		}
	}
}

/// Per-call handle answering from the shared [`BackendState`].
struct InProcessHandle(Arc<BackendState>);
impl<'c> AsyncHttpClient<'c> for InProcessHandle {
	type Error = HttpClientError<IoError>;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move { Ok(self.0.answer(&request)) })
	}
}

fn reply(status: StatusCode, body: Value) -> HttpResponse {
	let mut response = HttpResponse::new(body.to_string().into_bytes());

	*response.status_mut() = status;

	response
}
