// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use receiptr_session::{
	auth::{TokenBundle, TokenSecret},
	config::ClientConfig,
	error::{Error, RefreshError, TransportError},
	http::{AuthorizedClient, LoginClient, LoginCredentials, RefreshClient, ReqwestAuthClient},
	reqwest::{Client, Method, StatusCode},
	session::{SessionInterceptor, SessionManager, SessionStatus},
	store::{KeyValueTokenStore, MemoryStore, TokenStore},
	url::Url,
};
use serde_json::json;
use time::{Duration, OffsetDateTime, macros::datetime};

const TOKENS: &str = r#"{
	"sessionToken": {"token": "session-new", "expiresAt": "2030-01-01T12:00:00.000"},
	"refreshToken": {"token": "refresh-new", "expiresAt": "2030-01-08T12:00:00.000Z"}
}"#;

// The mock server terminates TLS with a self-signed certificate.
fn lenient_client() -> Client {
	Client::builder()
		.danger_accept_invalid_certs(true)
		.redirect(receiptr_session::reqwest::redirect::Policy::none())
		.build()
		.expect("Test HTTP client should build.")
}

fn config(server: &MockServer) -> ClientConfig {
	ClientConfig::builder(server.base_url())
		.device_info("Pixel 9")
		.build()
		.expect("Config should build against the mock server.")
}

fn auth_client(server: &MockServer) -> ReqwestAuthClient {
	let config = config(server);

	ReqwestAuthClient::with_client(lenient_client(), config.base_url())
		.expect("Auth client should build.")
		.with_device_info("Pixel 9")
}

fn live_bundle() -> TokenBundle {
	let now = OffsetDateTime::now_utc();

	TokenBundle::builder()
		.session_token("session-live")
		.refresh_token("refresh-live")
		.session_expires_at(now + Duration::hours(1))
		.refresh_expires_at(now + Duration::days(7))
		.build()
		.expect("Bundle fixture should build.")
}

fn stale_bundle() -> TokenBundle {
	let now = OffsetDateTime::now_utc();

	TokenBundle::builder()
		.session_token("session-old")
		.refresh_token("refresh-old")
		.session_expires_at(now - Duration::minutes(5))
		.refresh_expires_at(now + Duration::days(3))
		.build()
		.expect("Bundle fixture should build.")
}

#[tokio::test]
async fn refresh_posts_the_refresh_token_and_maps_the_bundle() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/public/refresh")
				.json_body(json!({"refreshToken": "refresh-old", "deviceInfo": "Pixel 9"}));
			then.status(200).header("content-type", "application/json").body(TOKENS);
		})
		.await;
	let bundle = auth_client(&server)
		.refresh_session(&TokenSecret::new("refresh-old"))
		.await
		.expect("Refresh should succeed.");

	mock.assert_async().await;

	assert_eq!(bundle.session_token.expose(), "session-new");
	assert_eq!(bundle.refresh_token.expose(), "refresh-new");
	assert_eq!(bundle.session_expires_at, datetime!(2030-01-01 12:00 UTC));
	assert_eq!(bundle.refresh_expires_at, datetime!(2030-01-08 12:00 UTC));
}

#[tokio::test]
async fn login_posts_email_password_credentials() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/public/login").json_body(json!({
				"authMethod": "EMAIL_PASSWORD",
				"email": "cook@receiptr.test",
				"password": "hunter2",
			}));
			then.status(200).header("content-type", "application/json").body(TOKENS);
		})
		.await;
	let bundle = auth_client(&server)
		.login(&LoginCredentials::new("cook@receiptr.test", "hunter2"))
		.await
		.expect("Login should succeed.");

	mock.assert_async().await;

	assert_eq!(bundle.session_token.expose(), "session-new");
}

#[tokio::test]
async fn unauthorized_responses_are_rejections() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/public/refresh");
			then.status(401).body("{\"message\":\"Invalid or expired refresh token\"}");
		})
		.await;

	let err = auth_client(&server)
		.refresh_session(&TokenSecret::new("refresh-old"))
		.await
		.expect_err("HTTP 401 should fail.");

	assert!(matches!(err, RefreshError::Rejected { .. }), "{err:?}");
}

#[tokio::test]
async fn server_errors_keep_status_and_body() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/public/refresh");
			then.status(503).body("maintenance");
		})
		.await;

	let err = auth_client(&server)
		.refresh_session(&TokenSecret::new("refresh-old"))
		.await
		.expect_err("HTTP 503 should fail.");

	match err {
		RefreshError::UnexpectedStatus { status, body } => {
			assert_eq!(status, 503);
			assert_eq!(body.as_deref(), Some("maintenance"));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}
}

#[tokio::test]
async fn malformed_payloads_are_reported() {
	let server = MockServer::start_async().await;
	let garbage = server
		.mock_async(|when, then| {
			when.method(POST).path("/public/refresh");
			then.status(200).header("content-type", "application/json").body("<html>oops</html>");
		})
		.await;
	let client = auth_client(&server);
	let err = client
		.refresh_session(&TokenSecret::new("refresh-old"))
		.await
		.expect_err("Non-JSON bodies should fail.");

	assert!(matches!(err, RefreshError::MalformedResponse { .. }), "{err:?}");

	garbage.delete_async().await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/public/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"sessionToken\":{\"token\":\"session-new\"}}");
		})
		.await;

	let err = client
		.refresh_session(&TokenSecret::new("refresh-old"))
		.await
		.expect_err("Incomplete payloads should fail.");

	assert!(matches!(err, RefreshError::InvalidResponse { .. }), "{err:?}");
}

#[tokio::test]
async fn unreachable_backends_are_network_errors() {
	let base = Url::parse("http://127.0.0.1:9/").expect("Base URL should parse.");
	let err = ReqwestAuthClient::new(&base)
		.expect("Auth client should build.")
		.refresh_session(&TokenSecret::new("refresh-old"))
		.await
		.expect_err("Unreachable backends should fail.");

	assert!(matches!(err, RefreshError::Network { .. }), "{err:?}");
}

#[tokio::test]
async fn authorized_client_refreshes_then_sends() {
	let server = MockServer::start_async().await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/public/refresh");
			then.status(200).header("content-type", "application/json").body(TOKENS);
		})
		.await;
	let recipes = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/recipes").header("authorization", "Bearer session-new");
			then.status(200).body("[]");
		})
		.await;
	let store = Arc::new(KeyValueTokenStore::new(MemoryStore::default()));

	store.save(stale_bundle()).await.expect("Seeding the store should succeed.");

	let interceptor =
		SessionInterceptor::new(store.clone(), Arc::new(auth_client(&server)), Arc::new(|| {}));
	let client = AuthorizedClient::new(lenient_client(), interceptor);
	let url = Url::parse(&server.url("/api/recipes")).expect("Recipe URL should parse.");

	for _ in 0..2 {
		let response = client
			.send(client.request(Method::GET, url.clone()))
			.await
			.expect("Authorized request should succeed.");

		assert_eq!(response.status(), StatusCode::OK);
	}

	refresh.assert_calls_async(1).await;
	recipes.assert_calls_async(2).await;

	let stored =
		store.load().await.expect("Load should succeed.").expect("Bundle should be stored.");

	assert_eq!(stored.session_token.expose(), "session-new");
}

#[tokio::test]
async fn authorized_client_surfaces_expired_sessions() {
	let server = MockServer::start_async().await;
	let store = Arc::new(KeyValueTokenStore::new(MemoryStore::default()));
	let now = OffsetDateTime::now_utc();
	let dead = TokenBundle::builder()
		.session_token("session-old")
		.refresh_token("refresh-old")
		.session_expires_at(now - Duration::days(2))
		.refresh_expires_at(now - Duration::days(1))
		.build()
		.expect("Bundle fixture should build.");

	store.save(dead).await.expect("Seeding the store should succeed.");

	let interceptor =
		SessionInterceptor::new(store.clone(), Arc::new(auth_client(&server)), Arc::new(|| {}));
	let client = AuthorizedClient::new(lenient_client(), interceptor);
	let url = Url::parse(&server.url("/api/recipes")).expect("Recipe URL should parse.");
	let err = client
		.send(client.request(Method::GET, url))
		.await
		.expect_err("Expired sessions should not reach the backend.");

	assert!(matches!(err, Error::SessionExpired));
	assert_eq!(store.load().await.expect("Load should succeed."), None);
}

#[tokio::test]
async fn session_manager_logs_in_and_out_against_the_backend() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/public/login");
			then.status(200).header("content-type", "application/json").body(TOKENS);
		})
		.await;

	let store = Arc::new(KeyValueTokenStore::new(MemoryStore::default()));
	let manager =
		SessionManager::new(store.clone(), Arc::new(auth_client(&server)), Arc::new(|| {}));

	assert_eq!(manager.status().await, SessionStatus::LoggedOut);

	manager
		.login(&LoginCredentials::new("cook@receiptr.test", "hunter2"))
		.await
		.expect("Login should succeed.");

	assert_eq!(manager.status().await, SessionStatus::LoggedIn);
	assert_eq!(store.backend().snapshot().len(), 4);

	manager.logout().await.expect("Logout should succeed.");

	assert_eq!(manager.status().await, SessionStatus::LoggedOut);
	assert!(store.backend().snapshot().is_empty());
}

#[tokio::test]
async fn create_user_posts_email_password_credentials() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/public/createUser").json_body(json!({
				"authMethod": "EMAIL_PASSWORD",
				"email": "new@receiptr.test",
				"password": "hunter2",
			}));
			then.status(200).header("content-type", "application/json").body(TOKENS);
		})
		.await;
	let store = Arc::new(KeyValueTokenStore::new(MemoryStore::default()));
	let manager =
		SessionManager::new(store.clone(), Arc::new(auth_client(&server)), Arc::new(|| {}));
	let bundle = manager
		.sign_up(&LoginCredentials::new("new@receiptr.test", "hunter2"))
		.await
		.expect("Sign-up should succeed.");

	mock.assert_async().await;

	assert_eq!(bundle.session_token.expose(), "session-new");
	assert_eq!(manager.status().await, SessionStatus::LoggedIn);
}

#[tokio::test]
async fn rejected_sign_ups_keep_status_and_body() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/public/createUser");
			then.status(400).body("{\"message\":\"Email already registered\"}");
		})
		.await;

	let err = auth_client(&server)
		.create_user(&LoginCredentials::new("cook@receiptr.test", "hunter2"))
		.await
		.expect_err("HTTP 400 should fail.");

	match err {
		RefreshError::UnexpectedStatus { status, body } => {
			assert_eq!(status, 400);
			assert!(body.is_some_and(|body| body.contains("Email already registered")));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}
}

#[tokio::test]
async fn logout_revokes_the_session_server_side() {
	let server = MockServer::start_async().await;
	let revoke = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/private/logout")
				.header("authorization", "Bearer session-live");
			then.status(204);
		})
		.await;
	let store = Arc::new(KeyValueTokenStore::new(MemoryStore::default()));

	store.save(live_bundle()).await.expect("Seeding the store should succeed.");

	let auth = Arc::new(auth_client(&server));
	let interceptor = SessionInterceptor::new(store.clone(), auth.clone(), Arc::new(|| {}));
	let client = AuthorizedClient::new(lenient_client(), interceptor);
	let manager = SessionManager::new(store.clone(), auth, Arc::new(|| {}))
		.with_remote_logout(client, config(&server).base_url().clone());

	manager.logout().await.expect("Logout should succeed.");

	revoke.assert_async().await;

	assert!(store.backend().snapshot().is_empty());
}

#[tokio::test]
async fn failed_revocations_still_log_out_locally() {
	let server = MockServer::start_async().await;
	let revoke = server
		.mock_async(|when, then| {
			when.method(POST).path("/private/logout");
			then.status(500);
		})
		.await;
	let store = Arc::new(KeyValueTokenStore::new(MemoryStore::default()));

	store.save(live_bundle()).await.expect("Seeding the store should succeed.");

	let auth = Arc::new(auth_client(&server));
	let interceptor = SessionInterceptor::new(store.clone(), auth.clone(), Arc::new(|| {}));
	let client = AuthorizedClient::new(lenient_client(), interceptor);
	let base = config(&server).base_url().clone();
	let err = client.revoke_session(&base).await.expect_err("HTTP 500 should fail.");

	assert!(
		matches!(err, Error::Transport(TransportError::UnexpectedStatus { status: 500 })),
		"{err:?}"
	);

	SessionManager::new(store.clone(), auth, Arc::new(|| {}))
		.with_remote_logout(client, base)
		.logout()
		.await
		.expect("Local logout should succeed.");

	revoke.assert_calls_async(2).await;

	assert!(store.backend().snapshot().is_empty());
}
