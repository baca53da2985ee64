//! Discord REST and gateway adapters.
//!
//! [`RoleConnectionApi`] acts on behalf of a linked user (bearer token), [`DiscordBot`] acts as
//! the application's bot (bot token), and [`DiscordGateway`] streams member updates into the
//! role event queue.

pub mod api;
pub mod bot;
pub mod endpoints;
pub mod gateway;

pub use api::*;
pub use bot::*;
pub use endpoints::*;
pub use gateway::*;

// crates.io
use reqwest::Response;
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, error::TransientError};

const BODY_PREVIEW_LIMIT: usize = 256;

/// Reads a JSON body, reporting the failing field path on malformed payloads.
pub(crate) async fn read_json<T>(endpoint: &'static str, response: Response) -> Result<T>
where
	T: DeserializeOwned,
{
	let status = response.status().as_u16();
	let bytes =
		response.bytes().await.map_err(|e| crate::error::map_reqwest_error(endpoint, e))?;
	let mut deserializer = serde_json::Deserializer::from_slice(&bytes);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| TransientError::ResponseParse { endpoint, source, status: Some(status) }.into())
}

/// Converts a non-success response into [`Error::Discord`] with a truncated body preview.
pub(crate) async fn status_error(endpoint: &'static str, response: Response) -> Error {
	let status = response.status().as_u16();
	let body = response.text().await.unwrap_or_default();

	Error::Discord { endpoint, status, message: preview(&body) }
}

fn preview(body: &str) -> String {
	let trimmed = body.trim();

	match trimmed.char_indices().nth(BODY_PREVIEW_LIMIT) {
		Some((cut, _)) => format!("{}...", &trimmed[..cut]),
		None => trimmed.to_owned(),
	}
}
