#![cfg(feature = "test")]

// crates.io
use axum::{
	body::{self, Body},
	http::{Request, StatusCode, header::LOCATION},
	response::Response,
};
use httpmock::prelude::*;
use serde_json::json;
use tower::ServiceExt;
// self
use linked_roles::{_preludet::*, server};

async fn get(harness: &TestLinker, uri: &str) -> Response {
	server::router(harness.linker.clone())
		.oneshot(Request::get(uri).body(Body::empty()).expect("Request should build."))
		.await
		.expect("Router should answer.")
}

async fn text(response: Response) -> String {
	let bytes =
		body::to_bytes(response.into_body(), usize::MAX).await.expect("Body should be readable.");

	String::from_utf8(bytes.to_vec()).expect("Body should be UTF-8.")
}

fn state_of(location: &str) -> String {
	let url = Url::parse(location).expect("Location should be an absolute URL.");

	url.query_pairs()
		.find_map(|(key, value)| (key == "state").then(|| value.into_owned()))
		.expect("Authorize URL should carry a state.")
}

#[tokio::test]
async fn index_reports_liveness() {
	let harness = build_test_linker("http://127.0.0.1:9");
	let response = get(&harness, "/").await;

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(text(response).await, server::INDEX_TEXT);
}

#[tokio::test]
async fn login_redirects_to_authorize_page() {
	let harness = build_test_linker("http://127.0.0.1:9");
	let response = get(&harness, "/login").await;

	assert_eq!(response.status(), StatusCode::FOUND);

	let location = response
		.headers()
		.get(LOCATION)
		.and_then(|value| value.to_str().ok())
		.expect("Redirect should carry a location.")
		.to_owned();
	let url = Url::parse(&location).expect("Location should parse.");
	let pairs = url.query_pairs().into_owned().collect::<HashMap<_, _>>();

	assert_eq!(url.path(), "/oauth2/authorize");
	assert_eq!(pairs["client_id"], TEST_CLIENT_ID);
	assert_eq!(pairs["response_type"], "code");
	assert_eq!(pairs["scope"], "identify role_connections.write offline");
	assert_eq!(pairs["prompt"], "consent");
	assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:9/discord-oauth-callback");
	assert_eq!(state_of(&location).len(), 32);
}

#[tokio::test]
async fn callback_without_code_is_bad_request() {
	let harness = build_test_linker("http://127.0.0.1:9");
	let response = get(&harness, "/discord-oauth-callback?error=access_denied").await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert_eq!(text(response).await, "Error: No code provided from Discord.");
}

#[tokio::test]
async fn callback_with_unknown_state_is_bad_request() {
	let harness = build_test_linker("http://127.0.0.1:9");
	let response = get(&harness, "/discord-oauth-callback?code=abc&state=forged").await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn callback_without_refresh_token_is_server_error() {
	let mock = MockServer::start_async().await;
	let harness = build_test_linker(&mock.base_url());

	mock.mock_async(|when, then| {
		when.method(POST).path("/api/v10/oauth2/token");
		then.status(200).json_body(json!({
			"access_token": "access-1",
			"token_type": "Bearer",
			"expires_in": 604800
		}));
	})
	.await;

	let state = harness.linker.start_login().state;
	let response = get(&harness, &format!("/discord-oauth-callback?code=abc&state={state}")).await;

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	assert!(text(response).await.contains("offline"));
}

#[tokio::test]
async fn callback_renders_success_page_with_escaped_username() {
	let mock = MockServer::start_async().await;
	let harness = build_test_linker(&mock.base_url());

	harness.directory.set(user(42), vec![role(12)]);

	mock.mock_async(|when, then| {
		when.method(POST).path("/api/v10/oauth2/token");
		then.status(200).json_body(json!({
			"access_token": "access-1",
			"token_type": "Bearer",
			"expires_in": 604800,
			"refresh_token": "refresh-1"
		}));
	})
	.await;
	mock.mock_async(|when, then| {
		when.method(GET).path("/api/v10/users/@me");
		then.status(200).json_body(json!({ "id": "42", "username": "<b>tester</b>" }));
	})
	.await;
	mock.mock_async(|when, then| {
		when.method(PUT).path("/api/v10/users/@me/applications/1234/role-connection");
		then.status(200).json_body(json!({}));
	})
	.await;

	let state = harness.linker.start_login().state;
	let response = get(&harness, &format!("/discord-oauth-callback?code=abc&state={state}")).await;

	assert_eq!(response.status(), StatusCode::OK);

	let page = text(response).await;

	assert!(page.contains("Success!"));
	assert!(page.contains("&lt;b&gt;tester&lt;/b&gt;"));
	assert_eq!(harness.notifier.titles(), vec!["Verification Success"]);
}

#[tokio::test]
async fn callback_renders_failure_page_without_roles() {
	let mock = MockServer::start_async().await;
	let harness = build_test_linker(&mock.base_url());

	mock.mock_async(|when, then| {
		when.method(POST).path("/api/v10/oauth2/token");
		then.status(200).json_body(json!({
			"access_token": "access-1",
			"token_type": "Bearer",
			"expires_in": 604800,
			"refresh_token": "refresh-1"
		}));
	})
	.await;
	mock.mock_async(|when, then| {
		when.method(GET).path("/api/v10/users/@me");
		then.status(200).json_body(json!({ "id": "42", "username": "tester" }));
	})
	.await;
	mock.mock_async(|when, then| {
		when.method(PUT).path("/api/v10/users/@me/applications/1234/role-connection");
		then.status(200).json_body(json!({}));
	})
	.await;

	let state = harness.linker.start_login().state;
	let response = get(&harness, &format!("/discord-oauth-callback?code=abc&state={state}")).await;

	assert_eq!(response.status(), StatusCode::OK);
	assert!(text(response).await.contains("Verification Failed"));
}

#[tokio::test]
async fn callback_renders_error_page_when_push_fails() {
	let mock = MockServer::start_async().await;
	let harness = build_test_linker(&mock.base_url());

	harness.directory.set(user(42), vec![role(11)]);

	mock.mock_async(|when, then| {
		when.method(POST).path("/api/v10/oauth2/token");
		then.status(200).json_body(json!({
			"access_token": "access-1",
			"token_type": "Bearer",
			"expires_in": 604800,
			"refresh_token": "refresh-1"
		}));
	})
	.await;
	mock.mock_async(|when, then| {
		when.method(GET).path("/api/v10/users/@me");
		then.status(200).json_body(json!({ "id": "42", "username": "tester" }));
	})
	.await;
	mock.mock_async(|when, then| {
		when.method(PUT).path("/api/v10/users/@me/applications/1234/role-connection");
		then.status(500).body("upstream exploded");
	})
	.await;

	let state = harness.linker.start_login().state;
	let response = get(&harness, &format!("/discord-oauth-callback?code=abc&state={state}")).await;

	assert_eq!(response.status(), StatusCode::OK);

	let page = text(response).await;

	assert!(page.contains("Verification Error"));
	assert!(!page.contains("required roles"));
	assert_eq!(harness.notifier.titles(), vec!["Verification Error"]);
}
