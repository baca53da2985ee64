//! Gateway listener that turns guild member updates into role changes.
//!
//! One session: connect, read Hello, Identify with `GUILDS | GUILD_MEMBERS`, then heartbeat at
//! the server interval while handling dispatches. A missed heartbeat ack, a Reconnect or
//! Invalid Session opcode, or a dropped socket ends the session and [`DiscordGateway::run`]
//! connects again after a delay. Every session identifies fresh; nothing is resumed.

// std
use std::time::Duration as StdDuration;
// crates.io
use futures_util::{Sink, SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::{self, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
// self
use crate::{
	_prelude::*,
	auth::{GuildId, RoleId, TokenSecret, UserId},
	error::TransientError,
	events::{MemberRoleCache, RoleChange, RoleEventQueue},
};

/// `GUILDS | GUILD_MEMBERS`.
pub const GATEWAY_INTENTS: u64 = (1 << 0) | (1 << 1);

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

const DEFAULT_RECONNECT_DELAY: StdDuration = StdDuration::from_secs(5);

#[derive(Debug, Deserialize)]
struct GatewayPayload {
	op: u8,
	#[serde(default)]
	d: Value,
	#[serde(default)]
	s: Option<u64>,
	#[serde(default)]
	t: Option<String>,
}

#[derive(Deserialize)]
struct Hello {
	heartbeat_interval: u64,
}

#[derive(Deserialize)]
struct MemberUser {
	id: UserId,
}

#[derive(Deserialize)]
struct MemberSnapshot {
	#[serde(default)]
	user: Option<MemberUser>,
	#[serde(default)]
	roles: Vec<RoleId>,
}

#[derive(Deserialize)]
struct GuildCreate {
	id: GuildId,
	#[serde(default)]
	members: Vec<MemberSnapshot>,
}

#[derive(Deserialize)]
struct MemberUpdate {
	guild_id: GuildId,
	user: MemberUser,
	#[serde(default)]
	roles: Vec<RoleId>,
}

#[derive(Deserialize)]
struct MemberRemove {
	guild_id: GuildId,
	user: MemberUser,
}

/// Long-running gateway client feeding a [`RoleEventQueue`].
pub struct DiscordGateway {
	url: Url,
	token: TokenSecret,
	guild_id: GuildId,
	cache: MemberRoleCache,
	queue: Arc<RoleEventQueue>,
	reconnect_delay: StdDuration,
}
impl DiscordGateway {
	/// Creates a listener for `guild_id`.
	pub fn new(url: Url, token: TokenSecret, guild_id: GuildId, queue: Arc<RoleEventQueue>) -> Self {
		Self {
			url,
			token,
			guild_id,
			cache: MemberRoleCache::default(),
			queue,
			reconnect_delay: DEFAULT_RECONNECT_DELAY,
		}
	}

	/// Overrides the pause between sessions.
	pub fn with_reconnect_delay(mut self, delay: StdDuration) -> Self {
		self.reconnect_delay = delay;

		self
	}

	/// Member role cache maintained from dispatches.
	pub fn cache(&self) -> &MemberRoleCache {
		&self.cache
	}

	/// Runs sessions forever, reconnecting after each one ends.
	pub async fn run(&self) {
		loop {
			match self.session().await {
				Ok(()) => tracing::info!("gateway session ended; reconnecting"),
				Err(e) => tracing::warn!(error = %e, "gateway session failed; reconnecting"),
			}

			time::sleep(self.reconnect_delay).await;
		}
	}

	/// Runs a single session until the connection ends.
	pub async fn session(&self) -> Result<()> {
		let (stream, _) =
			tokio_tungstenite::connect_async(self.url.as_str()).await.map_err(gateway_error)?;
		let (mut sink, mut source) = stream.split();
		let hello = loop {
			match source.next().await {
				Some(Ok(Message::Text(text))) => {
					let payload = parse_payload(&text)?;

					if payload.op == OP_HELLO {
						break decode::<Hello>(payload.d)?;
					}
				},
				Some(Ok(Message::Close(frame))) =>
					return Err(Error::Gateway { reason: format!("closed before hello: {frame:?}") }),
				Some(Ok(_)) => {},
				Some(Err(e)) => return Err(gateway_error(e)),
				None => return Err(Error::Gateway { reason: "closed before hello".into() }),
			}
		};

		tracing::info!(heartbeat_ms = hello.heartbeat_interval, "gateway hello received");

		send_json(&mut sink, &self.identify_payload()).await?;

		let period = StdDuration::from_millis(hello.heartbeat_interval.max(1));
		let mut heartbeat = time::interval_at(time::Instant::now() + period, period);
		let mut sequence: Option<u64> = None;
		let mut acked = true;

		heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				_ = heartbeat.tick() => {
					if !acked {
						return Err(Error::Gateway { reason: "heartbeat was not acknowledged".into() });
					}

					acked = false;

					send_json(&mut sink, &serde_json::json!({ "op": OP_HEARTBEAT, "d": sequence })).await?;
				},
				message = source.next() => {
					let text = match message {
						Some(Ok(Message::Text(text))) => text,
						Some(Ok(Message::Close(frame))) => {
							tracing::info!(?frame, "gateway closed the connection");

							return Ok(());
						},
						Some(Ok(_)) => continue,
						Some(Err(e)) => return Err(gateway_error(e)),
						None => return Ok(()),
					};
					let payload = parse_payload(&text)?;

					if payload.s.is_some() {
						sequence = payload.s;
					}

					match payload.op {
						OP_DISPATCH => {
							if let Some(kind) = payload.t.as_deref() {
								self.handle_dispatch(kind, payload.d);
							}
						},
						OP_HEARTBEAT =>
							send_json(&mut sink, &serde_json::json!({ "op": OP_HEARTBEAT, "d": sequence })).await?,
						OP_HEARTBEAT_ACK => acked = true,
						OP_RECONNECT => {
							tracing::info!("gateway requested reconnect");

							return Ok(());
						},
						OP_INVALID_SESSION => {
							tracing::warn!("gateway invalidated the session");

							return Ok(());
						},
						op => tracing::trace!(op, "ignoring gateway opcode"),
					}
				},
			}
		}
	}

	/// Applies a dispatch and enqueues the resulting role change, if any.
	pub fn handle_dispatch(&self, kind: &str, data: Value) {
		match self.apply_dispatch(kind, data) {
			Ok(Some(change)) => {
				tracing::debug!(user_id = %change.user_id, roles = change.current.len(), "member roles changed");

				self.queue.enqueue(change);
			},
			Ok(None) => {},
			Err(e) => tracing::warn!(kind, error = %e, "malformed gateway dispatch"),
		}
	}

	/// Updates the cache from a dispatch and returns the role change it carries.
	///
	/// Dispatches for other guilds and unrelated event kinds are ignored.
	pub fn apply_dispatch(&self, kind: &str, data: Value) -> Result<Option<RoleChange>> {
		match kind {
			"GUILD_CREATE" => {
				let guild: GuildCreate = decode(data)?;

				if guild.id != self.guild_id {
					return Ok(None);
				}

				let mut seeded = 0_usize;

				for member in guild.members {
					if let Some(user) = member.user {
						self.cache.seed(user.id, member.roles);

						seeded += 1;
					}
				}

				tracing::info!(guild_id = %guild.id, members = seeded, "member role cache seeded");

				Ok(None)
			},
			"GUILD_MEMBER_UPDATE" => {
				let update: MemberUpdate = decode(data)?;

				if update.guild_id != self.guild_id {
					return Ok(None);
				}

				Ok(self.cache.observe(update.user.id, update.roles))
			},
			"GUILD_MEMBER_REMOVE" => {
				let removal: MemberRemove = decode(data)?;

				if removal.guild_id == self.guild_id {
					self.cache.forget(removal.user.id);
				}

				Ok(None)
			},
			"READY" => {
				tracing::info!("gateway session ready");

				Ok(None)
			},
			_ => Ok(None),
		}
	}

	fn identify_payload(&self) -> Value {
		serde_json::json!({
			"op": OP_IDENTIFY,
			"d": {
				"token": self.token.expose(),
				"intents": GATEWAY_INTENTS,
				"properties": {
					"os": std::env::consts::OS,
					"browser": env!("CARGO_PKG_NAME"),
					"device": env!("CARGO_PKG_NAME"),
				},
			},
		})
	}
}
impl Debug for DiscordGateway {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DiscordGateway")
			.field("url", &self.url.as_str())
			.field("guild_id", &self.guild_id)
			.field("cached_members", &self.cache.len())
			.finish_non_exhaustive()
	}
}

fn parse_payload(text: &str) -> Result<GatewayPayload> {
	let mut deserializer = serde_json::Deserializer::from_str(text);

	serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
		TransientError::ResponseParse { endpoint: "gateway", source, status: None }.into()
	})
}

fn decode<T>(data: Value) -> Result<T>
where
	T: DeserializeOwned,
{
	serde_path_to_error::deserialize(data).map_err(|source| {
		TransientError::ResponseParse { endpoint: "gateway", source, status: None }.into()
	})
}

async fn send_json<S>(sink: &mut S, payload: &Value) -> Result<()>
where
	S: Sink<Message, Error = WsError> + Unpin,
{
	sink.send(Message::Text(payload.to_string())).await.map_err(gateway_error)
}

fn gateway_error(e: WsError) -> Error {
	Error::Gateway { reason: e.to_string() }
}
