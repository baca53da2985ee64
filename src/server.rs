//! HTTP surface: liveness, login redirect, and the OAuth callback.

pub mod pages;

// crates.io
use axum::{
	Router,
	extract::{Query, State},
	http::{StatusCode, header::LOCATION},
	response::{Html, IntoResponse, Response},
	routing::get,
};
use tokio::net::TcpListener;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransientError},
	flows::{LinkReport, LinkVerdict, Linker},
};

/// Body served at `/`.
pub const INDEX_TEXT: &str = "OAuth server is running. Use /login to link your role.";
/// Path of the OAuth redirect target.
pub const CALLBACK_PATH: &str = "/discord-oauth-callback";

const NO_CODE_TEXT: &str = "Error: No code provided from Discord.";
const INVALID_STATE_TEXT: &str = "Error: Login session is invalid or expired. Start again from /login.";
const TOKEN_ERROR_TEXT: &str = "Error fetching access token (maybe 'offline' scope is missing?).";
const LINK_ERROR_TEXT: &str = "Error: Unable to complete role linking. Please try again later.";

#[derive(Debug, Default, Deserialize)]
struct CallbackQuery {
	code: Option<String>,
	state: Option<String>,
	error: Option<String>,
}

/// Builds the router served by the `serve` command.
pub fn router(linker: Arc<Linker>) -> Router {
	Router::new()
		.route("/", get(index))
		.route("/login", get(login))
		.route(CALLBACK_PATH, get(callback))
		.with_state(linker)
}

/// Serves `router(linker)` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, linker: Arc<Linker>, shutdown: F) -> std::io::Result<()>
where
	F: 'static + Send + Future<Output = ()>,
{
	if let Ok(addr) = listener.local_addr() {
		tracing::info!(addr = %addr, "http server listening");
	}

	axum::serve(listener, router(linker)).with_graceful_shutdown(shutdown).await
}

async fn index() -> &'static str {
	INDEX_TEXT
}

async fn login(State(linker): State<Arc<Linker>>) -> Response {
	let session = linker.start_login();

	tracing::debug!(expires_at = %session.expires_at, "login session issued");

	(StatusCode::FOUND, [(LOCATION, session.authorize_url.to_string())]).into_response()
}

async fn callback(
	State(linker): State<Arc<Linker>>,
	Query(query): Query<CallbackQuery>,
) -> Response {
	let Some(code) = query.code.filter(|code| !code.is_empty()) else {
		if let Some(error) = query.error.as_deref() {
			tracing::info!(error, "authorization was not granted");
		}

		return (StatusCode::BAD_REQUEST, NO_CODE_TEXT).into_response();
	};
	let state = query.state.unwrap_or_default();

	match linker.complete_login(&code, &state).await {
		Ok(LinkReport { user, verdict: LinkVerdict::Granted }) =>
			Html(pages::success(&user.username)).into_response(),
		Ok(LinkReport { verdict: LinkVerdict::NoRoles, .. }) => Html(pages::failure()).into_response(),
		Ok(LinkReport { verdict: LinkVerdict::Error, .. }) => Html(pages::error()).into_response(),
		Err(Error::InvalidState) => (StatusCode::BAD_REQUEST, INVALID_STATE_TEXT).into_response(),
		Err(e) if is_token_error(&e) => {
			tracing::warn!(error = %e, "code exchange failed");

			(StatusCode::INTERNAL_SERVER_ERROR, TOKEN_ERROR_TEXT).into_response()
		},
		Err(e) => {
			tracing::error!(error = %e, "role linking failed");

			(StatusCode::INTERNAL_SERVER_ERROR, LINK_ERROR_TEXT).into_response()
		},
	}
}

fn is_token_error(e: &Error) -> bool {
	matches!(
		e,
		Error::InvalidGrant { .. }
			| Error::InvalidClient { .. }
			| Error::Config(
				ConfigError::MissingRefreshToken
					| ConfigError::MissingExpiresIn
					| ConfigError::ExpiresInOutOfRange
					| ConfigError::NonPositiveExpiresIn
			) | Error::Transient(
			TransientError::TokenEndpoint { .. }
				| TransientError::ResponseParse { endpoint: "token", .. }
				| TransientError::Timeout { endpoint: "token" }
		)
	)
}
