//! Bearer-token session coordinator: attaches access tokens, refreshes them before they lapse,
//! and collapses concurrent 401 storms into a single refresh with transparent request replay.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod pipeline;
pub mod refresh;
pub mod session;
pub mod store;
#[cfg(any(test, feature = "test"))]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and fixtures for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	use oauth2::{
		AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
		http::{StatusCode, header::AUTHORIZATION},
	};
	// self
	use crate::{
		auth::{Credential, TokenSecret, UserId, UserIdentity},
		http::ApiHttpClient,
		refresh::{ExchangeFuture, RefreshExchange, RefreshedTokens},
		session::HostNavigator,
	};

	/// Mints an unsigned JWT whose `exp` claim equals `expires_at`.
	pub fn unsigned_jwt(expires_at: OffsetDateTime) -> String {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
		let payload = URL_SAFE_NO_PAD
			.encode(format!(r#"{{"sub":"fixture","exp":{}}}"#, expires_at.unix_timestamp()));

		format!("{header}.{payload}.signature")
	}

	/// Mints an unsigned JWT expiring `ttl` from now.
	pub fn jwt_expiring_in(ttl: Duration) -> String {
		unsigned_jwt(OffsetDateTime::now_utc() + ttl)
	}

	/// Builds the identity used by most fixtures.
	pub fn fixture_identity() -> UserIdentity {
		UserIdentity::new(
			UserId::new("42").expect("Fixture user identifier should be valid."),
			"Ada Lovelace",
			"ada@example.com",
		)
	}

	/// Builds a credential with the provided secrets and the fixture identity.
	pub fn fixture_credential(access: &str, refresh: &str) -> Credential {
		Credential::new(access, refresh, fixture_identity())
	}

	/// Navigator that counts how often the host was asked to leave the authenticated area.
	#[derive(Debug, Default)]
	pub struct RecordingNavigator(AtomicUsize);
	impl RecordingNavigator {
		/// Number of navigation signals received so far.
		pub fn calls(&self) -> usize {
			self.0.load(Ordering::SeqCst)
		}
	}
	impl HostNavigator for RecordingNavigator {
		fn navigate_to_unauthenticated(&self) {
			self.0.fetch_add(1, Ordering::SeqCst);
		}
	}

	/// Refresh exchange that replays scripted outcomes and counts network calls.
	pub struct ScriptedExchange {
		outcomes: Mutex<VecDeque<Result<RefreshedTokens>>>,
		fallback: Result<RefreshedTokens>,
		delay: std::time::Duration,
		calls: AtomicUsize,
	}
	impl ScriptedExchange {
		/// Exchange that always issues the provided token pair.
		pub fn succeeding(access: &str, refresh: Option<&str>) -> Self {
			Self::with_fallback(Ok(RefreshedTokens::new(access, refresh.map(str::to_owned))))
		}

		/// Exchange that always fails with the provided error.
		pub fn failing(error: Error) -> Self {
			Self::with_fallback(Err(error))
		}

		fn with_fallback(fallback: Result<RefreshedTokens>) -> Self {
			Self {
				outcomes: Mutex::new(VecDeque::new()),
				fallback,
				delay: std::time::Duration::ZERO,
				calls: AtomicUsize::new(0),
			}
		}

		/// Queues a one-off outcome consumed before the fallback.
		pub fn then(self, outcome: Result<RefreshedTokens>) -> Self {
			self.outcomes.lock().push_back(outcome);

			self
		}

		/// Delays every exchange so concurrent callers overlap with the in-flight refresh.
		pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
			self.delay = delay;

			self
		}

		/// Number of exchanges performed.
		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl RefreshExchange for ScriptedExchange {
		fn exchange<'a>(&'a self, _refresh_token: &'a TokenSecret) -> ExchangeFuture<'a> {
			Box::pin(async move {
				self.calls.fetch_add(1, Ordering::SeqCst);

				if !self.delay.is_zero() {
					tokio::time::sleep(self.delay).await;
				}

				let scripted = self.outcomes.lock().pop_front();

				scripted.unwrap_or_else(|| self.fallback.clone())
			})
		}
	}

	type Responder = dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync;

	/// In-process transport that answers requests through a closure and records what was sent.
	#[derive(Clone)]
	pub struct ScriptedHttpClient(Arc<ScriptedHttpState>);
	impl ScriptedHttpClient {
		/// Creates a client that answers every request with `responder`.
		pub fn new<F>(responder: F) -> Self
		where
			F: 'static + Fn(&HttpRequest) -> HttpResponse + Send + Sync,
		{
			Self(Arc::new(ScriptedHttpState {
				responder: Box::new(responder),
				sent: Mutex::new(Vec::new()),
			}))
		}

		/// Client that answers 200 to bearer `accepted` and 401 to everything else.
		pub fn accepting(accepted: &str) -> Self {
			let expected = format!("Bearer {accepted}");

			Self::new(move |request| {
				let authorized = request
					.headers()
					.get(AUTHORIZATION)
					.and_then(|value| value.to_str().ok())
					.is_some_and(|value| value == expected);

				if authorized {
					response(StatusCode::OK, b"{\"ok\":true}")
				} else {
					response(StatusCode::UNAUTHORIZED, b"{\"error\":\"unauthorized\"}")
				}
			})
		}

		/// `(uri, authorization header)` pairs in dispatch order.
		pub fn sent(&self) -> Vec<(String, Option<String>)> {
			self.0.sent.lock().clone()
		}
	}
	impl ApiHttpClient for ScriptedHttpClient {
		type Handle = ScriptedHandle;
		type TransportError = std::io::Error;

		fn handle(&self) -> Self::Handle {
			ScriptedHandle(self.0.clone())
		}
	}

	struct ScriptedHttpState {
		responder: Box<Responder>,
		sent: Mutex<Vec<(String, Option<String>)>>,
	}

	/// Handle produced by [`ScriptedHttpClient`].
	pub struct ScriptedHandle(Arc<ScriptedHttpState>);
	impl<'c> AsyncHttpClient<'c> for ScriptedHandle {
		type Error = HttpClientError<std::io::Error>;
		type Future =
			Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

		fn call(&'c self, request: HttpRequest) -> Self::Future {
			let state = Arc::clone(&self.0);

			Box::pin(async move {
				let authorization = request
					.headers()
					.get(AUTHORIZATION)
					.and_then(|value| value.to_str().ok())
					.map(str::to_owned);

				state.sent.lock().push((request.uri().to_string(), authorization));

				Ok((state.responder)(&request))
			})
		}
	}

	/// Builds an [`HttpResponse`] with the provided status and body.
	pub fn response(status: StatusCode, body: &[u8]) -> HttpResponse {
		let mut response = HttpResponse::new(body.to_vec());

		*response.status_mut() = status;

		response
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
