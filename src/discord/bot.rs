//! Bot-token REST adapter: guild member lookup, log channel notices, and schema registration.

// crates.io
use reqwest::{StatusCode, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	auth::{ChannelId, GuildId, RoleId, TokenSecret, UserId},
	discord::{DiscordEndpoints, read_json, status_error},
	error::map_reqwest_error,
	http::ReqwestHttpClient,
	notify::{Notice, Notifier, NotifyFuture},
	roles::{DirectoryFuture, MetadataField, RoleDirectory, RoleMapping},
};

#[derive(Deserialize)]
struct GuildMember {
	#[serde(default)]
	roles: Vec<RoleId>,
}

#[derive(Serialize)]
struct Embed<'a> {
	title: &'a str,
	description: &'a str,
	color: u32,
}

#[derive(Serialize)]
struct CreateMessage<'a> {
	embeds: [Embed<'a>; 1],
}

/// The application's bot identity, scoped to one guild.
#[derive(Clone)]
pub struct DiscordBot {
	http: ReqwestHttpClient,
	endpoints: Arc<DiscordEndpoints>,
	token: TokenSecret,
	guild_id: GuildId,
	log_channel: Option<ChannelId>,
}
impl DiscordBot {
	/// Creates the adapter for `guild_id`.
	pub fn new(
		http: ReqwestHttpClient,
		endpoints: Arc<DiscordEndpoints>,
		token: TokenSecret,
		guild_id: GuildId,
	) -> Self {
		Self { http, endpoints, token, guild_id, log_channel: None }
	}

	/// Posts notices to `channel`; without one, notices only reach the log.
	pub fn with_log_channel(mut self, channel: Option<ChannelId>) -> Self {
		self.log_channel = channel;

		self
	}

	/// Guild this bot serves.
	pub fn guild_id(&self) -> GuildId {
		self.guild_id
	}

	/// Bot token, also used to identify on the gateway.
	pub fn token(&self) -> &TokenSecret {
		&self.token
	}

	/// Fetches the member's role ids; a non-member yields an empty list.
	pub async fn fetch_member_roles(&self, user_id: UserId) -> Result<Vec<RoleId>> {
		const ENDPOINT: &str = "guild_member";

		let url = self.endpoints.api_url(&format!("guilds/{}/members/{user_id}", self.guild_id))?;
		let response = self
			.http
			.get(url)
			.header(AUTHORIZATION, self.token.authorization("Bot"))
			.send()
			.await
			.map_err(|e| map_reqwest_error(ENDPOINT, e))?;

		match response.status() {
			StatusCode::NOT_FOUND => {
				tracing::debug!(user_id = %user_id, guild_id = %self.guild_id, "user is not a guild member");

				Ok(Vec::new())
			},
			status if status.is_success() => {
				let member: GuildMember = read_json(ENDPOINT, response).await?;

				Ok(member.roles)
			},
			_ => Err(status_error(ENDPOINT, response).await),
		}
	}

	/// Posts `notice` as an embed to the log channel.
	pub async fn send_notice(&self, notice: &Notice) -> Result<()> {
		const ENDPOINT: &str = "channel_message";

		let Some(channel) = self.log_channel else {
			tracing::info!(title = %notice.title, description = %notice.description, "notice");

			return Ok(());
		};
		let url = self.endpoints.api_url(&format!("channels/{channel}/messages"))?;
		let body = CreateMessage {
			embeds: [Embed {
				title: &notice.title,
				description: &notice.description,
				color: notice.kind.color(),
			}],
		};
		let response = self
			.http
			.post(url)
			.header(AUTHORIZATION, self.token.authorization("Bot"))
			.json(&body)
			.send()
			.await
			.map_err(|e| map_reqwest_error(ENDPOINT, e))?;

		if !response.status().is_success() {
			return Err(status_error(ENDPOINT, response).await);
		}

		Ok(())
	}

	/// Replaces the application's role connection metadata schema with the mapping's fields.
	pub async fn register_metadata_schema(
		&self,
		client_id: &str,
		mapping: &RoleMapping,
	) -> Result<Vec<MetadataField>> {
		const ENDPOINT: &str = "role_connection_metadata";

		let url =
			self.endpoints.api_url(&format!("applications/{client_id}/role-connections/metadata"))?;
		let response = self
			.http
			.put(url)
			.header(AUTHORIZATION, self.token.authorization("Bot"))
			.json(&mapping.schema())
			.send()
			.await
			.map_err(|e| map_reqwest_error(ENDPOINT, e))?;

		if !response.status().is_success() {
			return Err(status_error(ENDPOINT, response).await);
		}

		read_json(ENDPOINT, response).await
	}
}
impl Debug for DiscordBot {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DiscordBot")
			.field("guild_id", &self.guild_id)
			.field("log_channel", &self.log_channel)
			.finish_non_exhaustive()
	}
}
impl RoleDirectory for DiscordBot {
	fn member_roles(&self, user_id: UserId) -> DirectoryFuture<'_> {
		Box::pin(self.fetch_member_roles(user_id))
	}
}
impl Notifier for DiscordBot {
	fn notify(&self, notice: Notice) -> NotifyFuture<'_> {
		Box::pin(async move {
			if let Err(e) = self.send_notice(&notice).await {
				tracing::warn!(title = %notice.title, error = %e, "failed to post notice");
			}
		})
	}
}
