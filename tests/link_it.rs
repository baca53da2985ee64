#![cfg(feature = "test")]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use linked_roles::{
	_preludet::*,
	auth::TokenSecret,
	discord::DiscordUser,
	error::ConfigError,
	store::TokenStore,
};

const PUSH_PATH: &str = "/api/v10/users/@me/applications/1234/role-connection";

fn discord_user(raw: u64) -> DiscordUser {
	DiscordUser {
		id: user(raw),
		username: "tester".into(),
		discriminator: Some("0".into()),
		global_name: None,
	}
}

#[tokio::test]
async fn initial_link_grants_badge_for_tracked_roles() {
	let server = MockServer::start_async().await;
	let harness = build_test_linker(&server.base_url());

	harness.directory.set(user(42), vec![role(11), role(13), role(99)]);

	let push = server
		.mock_async(|when, then| {
			when.method(PUT)
				.path(PUSH_PATH)
				.header("authorization", "Bearer fresh-access")
				.json_body(json!({ "metadata": { "has_r1": 1, "has_r2": 0, "has_r3": 1 } }));
			then.status(200).json_body(json!({}));
		})
		.await;
	let granted = harness
		.linker
		.initial_link(&discord_user(42), &TokenSecret::new("fresh-access"))
		.await;

	push.assert_async().await;

	assert!(granted);
	assert_eq!(harness.notifier.titles(), vec!["Verification Success"]);
}

#[tokio::test]
async fn initial_link_without_roles_pushes_all_zero_metadata() {
	let server = MockServer::start_async().await;
	let harness = build_test_linker(&server.base_url());
	let push = server
		.mock_async(|when, then| {
			when.method(PUT)
				.path(PUSH_PATH)
				.json_body(json!({ "metadata": { "has_r1": 0, "has_r2": 0, "has_r3": 0 } }));
			then.status(200).json_body(json!({}));
		})
		.await;
	let granted = harness
		.linker
		.initial_link(&discord_user(42), &TokenSecret::new("fresh-access"))
		.await;

	push.assert_async().await;

	assert!(!granted);
	assert_eq!(harness.notifier.titles(), vec!["Verification Failed"]);
}

#[tokio::test]
async fn initial_link_reports_failed_push() {
	let server = MockServer::start_async().await;
	let harness = build_test_linker(&server.base_url());

	harness.directory.set(user(42), vec![role(12)]);

	let push = server
		.mock_async(|when, then| {
			when.method(PUT).path(PUSH_PATH);
			then.status(500).body("upstream exploded");
		})
		.await;
	let granted = harness
		.linker
		.initial_link(&discord_user(42), &TokenSecret::new("fresh-access"))
		.await;

	push.assert_async().await;

	assert!(!granted);
	assert_eq!(harness.notifier.titles(), vec!["Verification Error"]);
}

#[tokio::test]
async fn initial_link_lookup_failure_skips_push() {
	let server = MockServer::start_async().await;
	let harness = build_test_linker(&server.base_url());

	harness.directory.fail_with(403);

	let push = server
		.mock_async(|when, then| {
			when.method(PUT).path(PUSH_PATH);
			then.status(200);
		})
		.await;
	let granted = harness
		.linker
		.initial_link(&discord_user(42), &TokenSecret::new("fresh-access"))
		.await;

	push.assert_calls_async(0).await;
	assert!(!granted);
	assert_eq!(harness.notifier.titles(), vec!["Verification Error"]);
}

#[tokio::test]
async fn complete_login_exchanges_code_and_stores_tokens() {
	let server = MockServer::start_async().await;
	let harness = build_test_linker(&server.base_url());

	harness.directory.set(user(42), vec![role(11)]);

	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/v10/oauth2/token")
				.body_includes("grant_type=authorization_code")
				.body_includes("code=auth-code")
				.body_includes("client_id=1234")
				.body_includes("client_secret=client-secret");
			then.status(200).json_body(json!({
				"access_token": "access-1",
				"token_type": "Bearer",
				"expires_in": 604800,
				"refresh_token": "refresh-1",
				"scope": "identify role_connections.write offline"
			}));
		})
		.await;
	let me = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v10/users/@me").header("authorization", "Bearer access-1");
			then.status(200).json_body(json!({
				"id": "42",
				"username": "tester",
				"discriminator": "0",
				"global_name": "Tester"
			}));
		})
		.await;
	let push = server
		.mock_async(|when, then| {
			when.method(PUT).path(PUSH_PATH).header("authorization", "Bearer access-1");
			then.status(200).json_body(json!({}));
		})
		.await;
	let session = harness.linker.start_login();
	let report = harness
		.linker
		.complete_login("auth-code", &session.state)
		.await
		.expect("Login should complete.");

	token.assert_async().await;
	me.assert_async().await;
	push.assert_async().await;

	assert!(report.granted());
	assert_eq!(report.user.username, "tester");

	let record = harness
		.store
		.fetch(user(42))
		.await
		.expect("Store read should succeed.")
		.expect("Tokens should be stored after login.");

	assert_eq!(record.access_token.expose(), "access-1");
	assert_eq!(record.refresh_token.expose(), "refresh-1");
	assert!(record.expires_at > OffsetDateTime::now_utc() + Duration::days(6));

	let replay = harness.linker.complete_login("auth-code", &session.state).await;

	assert!(matches!(replay, Err(Error::InvalidState)), "State values are single use.");
}

#[tokio::test]
async fn complete_login_rejects_unknown_state_before_exchange() {
	let server = MockServer::start_async().await;
	let harness = build_test_linker(&server.base_url());
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v10/oauth2/token");
			then.status(200);
		})
		.await;
	let result = harness.linker.complete_login("auth-code", "forged-state").await;

	assert!(matches!(result, Err(Error::InvalidState)));
	token.assert_calls_async(0).await;
}

#[tokio::test]
async fn complete_login_requires_refresh_token() {
	let server = MockServer::start_async().await;
	let harness = build_test_linker(&server.base_url());

	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v10/oauth2/token");
			then.status(200).json_body(json!({
				"access_token": "access-1",
				"token_type": "Bearer",
				"expires_in": 604800
			}));
		})
		.await;

	let session = harness.linker.start_login();
	let result = harness.linker.complete_login("auth-code", &session.state).await;

	assert!(matches!(result, Err(Error::Config(ConfigError::MissingRefreshToken))));
	assert!(harness.store.is_empty());
}

#[tokio::test]
async fn complete_login_maps_invalid_grant() {
	let server = MockServer::start_async().await;
	let harness = build_test_linker(&server.base_url());

	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v10/oauth2/token");
			then.status(400).json_body(json!({
				"error": "invalid_grant",
				"error_description": "Invalid \"code\" in request."
			}));
		})
		.await;

	let session = harness.linker.start_login();
	let result = harness.linker.complete_login("stale-code", &session.state).await;

	assert!(matches!(result, Err(Error::InvalidGrant { .. })));
	assert!(harness.notifier.notices().is_empty());
}
