//! Command-line and environment configuration.

// std
use std::{
	net::SocketAddr,
	path::PathBuf,
	time::Duration as StdDuration,
};
// crates.io
use clap::{Args, Parser, Subcommand};
// self
use crate::{
	_prelude::*,
	auth::{ChannelId, GuildId, TokenSecret},
	error::ConfigError,
	oauth::OAuthClient,
	roles::RoleMapping,
};

/// Top-level command line.
#[derive(Debug, Parser)]
#[command(name = "linked-roles", version, about = "Discord linked-roles bridge")]
pub struct Cli {
	/// Subcommand to run.
	#[command(subcommand)]
	pub command: Command,
}
impl Cli {
	/// Loads `.env` when present, then parses arguments and environment.
	pub fn load() -> Self {
		dotenvy::dotenv().ok();

		Self::parse()
	}
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
	/// Run the OAuth callback server and the gateway listener.
	Serve(ServeArgs),
	/// Replace the application's role connection metadata schema.
	RegisterMetadata(CommonArgs),
}

/// Settings shared by every subcommand.
#[derive(Clone, Debug, Args)]
pub struct CommonArgs {
	/// Bot token used for guild lookups, the gateway, and schema registration.
	#[arg(long, env = "DISCORD_BOT_TOKEN", hide_env_values = true)]
	pub bot_token: String,
	/// Application (client) identifier.
	#[arg(long, env = "DISCORD_CLIENT_ID")]
	pub client_id: String,
	/// Guild whose member roles are tracked.
	#[arg(long, env = "GUILD_ID")]
	pub guild_id: GuildId,
	/// JSON file with `{key, role_id, name}` entries; the built-in mapping is used otherwise.
	#[arg(long, env = "ROLE_MAPPING_PATH")]
	pub role_mapping: Option<PathBuf>,
	/// Per-request timeout for Discord calls, in seconds.
	#[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 10)]
	pub http_timeout_secs: u64,
}
impl CommonArgs {
	/// Bot token wrapped as a redacting secret.
	pub fn bot_token(&self) -> TokenSecret {
		TokenSecret::new(self.bot_token.clone())
	}

	/// Loads the configured role mapping.
	pub fn role_mapping(&self) -> Result<RoleMapping, ConfigError> {
		RoleMapping::load(self.role_mapping.as_deref())
	}

	/// Per-request timeout.
	pub fn http_timeout(&self) -> StdDuration {
		StdDuration::from_secs(self.http_timeout_secs)
	}
}

/// Settings for the `serve` subcommand.
#[derive(Clone, Debug, Args)]
pub struct ServeArgs {
	/// Shared settings.
	#[command(flatten)]
	pub common: CommonArgs,
	/// Application secret used for the code exchange and refreshes.
	#[arg(long, env = "DISCORD_CLIENT_SECRET", hide_env_values = true)]
	pub client_secret: String,
	/// Redirect URI registered with the application; must end in `/discord-oauth-callback`.
	#[arg(long, env = "DISCORD_REDIRECT_URI")]
	pub redirect_uri: Url,
	/// Channel receiving outcome notices; notices are only logged when unset.
	#[arg(long, env = "LOG_CHANNEL_ID")]
	pub log_channel_id: Option<ChannelId>,
	/// JSON file holding linked users' tokens.
	#[arg(long, env = "TOKEN_STORE_PATH", default_value = "tokens.json")]
	pub token_store: PathBuf,
	/// Address the HTTP server binds to.
	#[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:5000")]
	pub bind_addr: SocketAddr,
}
impl ServeArgs {
	/// Application credentials for the OAuth flows.
	pub fn oauth_client(&self) -> OAuthClient {
		OAuthClient::new(
			self.common.client_id.clone(),
			self.client_secret.clone(),
			self.redirect_uri.clone(),
		)
	}
}
