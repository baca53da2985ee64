//! User-scoped Discord calls: identity lookup and role connection push.

// crates.io
use reqwest::{StatusCode, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, UserId},
	discord::{DiscordEndpoints, read_json, status_error},
	error::map_reqwest_error,
	http::ReqwestHttpClient,
	roles::RoleMetadata,
};

/// Identity returned by `GET /users/@me`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordUser {
	/// Snowflake id.
	pub id: UserId,
	/// Unique username.
	pub username: String,
	/// Legacy four-digit discriminator; `"0"` for migrated accounts.
	#[serde(default)]
	pub discriminator: Option<String>,
	/// Display name, when set.
	#[serde(default)]
	pub global_name: Option<String>,
}
impl DiscordUser {
	/// Renders `name#1234`, or the bare username for migrated accounts.
	pub fn tag(&self) -> String {
		match self.discriminator.as_deref() {
			Some(discriminator) if !discriminator.is_empty() && discriminator != "0" =>
				format!("{}#{discriminator}", self.username),
			_ => self.username.clone(),
		}
	}
}

/// Classification of a single metadata push.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PushOutcome {
	/// Discord accepted the metadata (HTTP 200).
	Success,
	/// The access token was rejected (HTTP 401); a refresh may help.
	Unauthorized,
	/// Anything else, transport failures and timeouts included.
	Failure,
}
impl PushOutcome {
	/// Maps an HTTP status to an outcome.
	pub fn from_status(status: StatusCode) -> Self {
		match status {
			StatusCode::OK => PushOutcome::Success,
			StatusCode::UNAUTHORIZED => PushOutcome::Unauthorized,
			_ => PushOutcome::Failure,
		}
	}
}

#[derive(Serialize)]
struct RoleConnectionBody<'a> {
	metadata: &'a RoleMetadata,
}

/// Client for the calls made with a user's bearer token.
#[derive(Clone, Debug)]
pub struct RoleConnectionApi {
	http: ReqwestHttpClient,
	endpoints: Arc<DiscordEndpoints>,
	client_id: String,
}
impl RoleConnectionApi {
	/// Creates the client for application `client_id`.
	pub fn new(
		http: ReqwestHttpClient,
		endpoints: Arc<DiscordEndpoints>,
		client_id: impl Into<String>,
	) -> Self {
		Self { http, endpoints, client_id: client_id.into() }
	}

	/// Fetches the identity owning `access_token`.
	pub async fn current_user(&self, access_token: &TokenSecret) -> Result<DiscordUser> {
		const ENDPOINT: &str = "users/@me";

		let url = self.endpoints.api_url(ENDPOINT)?;
		let response = self
			.http
			.get(url)
			.header(AUTHORIZATION, access_token.authorization("Bearer"))
			.send()
			.await
			.map_err(|e| map_reqwest_error(ENDPOINT, e))?;

		if !response.status().is_success() {
			return Err(status_error(ENDPOINT, response).await);
		}

		read_json(ENDPOINT, response).await
	}

	/// Replaces the user's role connection metadata.
	///
	/// Never fails: every error is folded into [`PushOutcome::Failure`].
	pub async fn push(
		&self,
		user_id: UserId,
		access_token: &TokenSecret,
		metadata: &RoleMetadata,
	) -> PushOutcome {
		let path = format!("users/@me/applications/{}/role-connection", self.client_id);
		let url = match self.endpoints.api_url(&path) {
			Ok(url) => url,
			Err(e) => {
				tracing::error!(user_id = %user_id, error = %e, "role connection url is invalid");

				return PushOutcome::Failure;
			},
		};
		let response = match self
			.http
			.put(url)
			.header(AUTHORIZATION, access_token.authorization("Bearer"))
			.json(&RoleConnectionBody { metadata })
			.send()
			.await
		{
			Ok(response) => response,
			Err(e) => {
				let error = map_reqwest_error("role_connection", e);

				tracing::warn!(user_id = %user_id, error = %error, "metadata push did not complete");

				return PushOutcome::Failure;
			},
		};
		let status = response.status();
		let outcome = PushOutcome::from_status(status);

		tracing::debug!(user_id = %user_id, status = status.as_u16(), ?outcome, "metadata push returned");

		if outcome == PushOutcome::Failure {
			let error = status_error("role_connection", response).await;

			tracing::warn!(user_id = %user_id, error = %error, "metadata push rejected");
		}

		outcome
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn user(discriminator: Option<&str>) -> DiscordUser {
		DiscordUser {
			id: UserId::new(80351110224678912).expect("User fixture should be valid."),
			username: "nelly".into(),
			discriminator: discriminator.map(Into::into),
			global_name: None,
		}
	}

	#[test]
	fn tag_includes_legacy_discriminator_only() {
		assert_eq!(user(Some("1337")).tag(), "nelly#1337");
		assert_eq!(user(Some("0")).tag(), "nelly");
		assert_eq!(user(None).tag(), "nelly");
	}

	#[test]
	fn push_outcome_classifies_statuses() {
		assert_eq!(PushOutcome::from_status(StatusCode::OK), PushOutcome::Success);
		assert_eq!(PushOutcome::from_status(StatusCode::UNAUTHORIZED), PushOutcome::Unauthorized);
		assert_eq!(PushOutcome::from_status(StatusCode::NO_CONTENT), PushOutcome::Failure);
		assert_eq!(PushOutcome::from_status(StatusCode::FORBIDDEN), PushOutcome::Failure);
		assert_eq!(PushOutcome::from_status(StatusCode::BAD_GATEWAY), PushOutcome::Failure);
	}

	#[test]
	fn user_payload_accepts_string_snowflakes() {
		let payload = r#"{"id":"80351110224678912","username":"nelly","discriminator":"0","avatar":null}"#;
		let parsed: DiscordUser =
			serde_json::from_str(payload).expect("User payload should deserialize.");

		assert_eq!(parsed.id.get(), 80351110224678912);
		assert_eq!(parsed.global_name, None);
	}
}
