//! Error types returned by linker flows and their adapters.

// self
use crate::_prelude::*;

/// Result alias defaulting to [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error returned by linker flows and Discord adapters.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Misconfiguration or a malformed upstream token response.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Discord could not be reached.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Discord rejected the grant (bad code or revoked refresh token).
	#[error("Discord rejected the grant: {reason}.")]
	InvalidGrant {
		/// Discord-supplied reason string.
		reason: String,
	},
	/// Discord rejected the client id or secret.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Discord-supplied reason string.
		reason: String,
	},
	/// The `state` returned to the callback is unknown, reused, or expired.
	#[error("Login state is unknown or expired.")]
	InvalidState,
	/// A Discord REST call answered with an unexpected status.
	#[error("Discord API call to {endpoint} failed with status {status}: {message}.")]
	Discord {
		/// Logical endpoint label.
		endpoint: &'static str,
		/// HTTP status code.
		status: u16,
		/// Response body preview.
		message: String,
	},
	/// The gateway session ended abnormally.
	#[error("Gateway session failed: {reason}.")]
	Gateway {
		/// Human-readable failure reason.
		reason: String,
	},
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// The shared reqwest client failed to build.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Builder failure.
		#[source]
		source: BoxError,
	},
	/// An outgoing token request could not be assembled.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// An endpoint URL could not be parsed or joined.
	#[error("Endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The OAuth2 callback URL cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoint set failed validation.
	#[error(transparent)]
	Endpoints(#[from] crate::discord::EndpointError),
	/// Role mapping failed validation.
	#[error(transparent)]
	RoleMapping(#[from] crate::roles::RoleMappingError),
	/// A snowflake identifier failed validation.
	#[error(transparent)]
	Identifier(#[from] crate::auth::IdentifierError),
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Code exchange returned no refresh token (the `offline` scope was not granted).
	#[error("Token endpoint response is missing refresh_token.")]
	MissingRefreshToken,
	/// `expires_in` does not fit in a [`Duration`].
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// `expires_in` was zero or negative.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Role mapping file could not be read.
	#[error("Failed to read role mapping file {path}.")]
	RoleMappingFile {
		/// Path of the mapping file.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Role mapping file is not valid JSON.
	#[error("Role mapping file {path} is malformed.")]
	RoleMappingParse {
		/// Path of the mapping file.
		path: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl ConfigError {
	/// Boxes a client builder failure.
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures worth retrying on a later sync.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// `Retry-After` header value.
		retry_after: Option<Duration>,
	},
	/// An endpoint responded with JSON that could not be parsed.
	#[error("The {endpoint} endpoint returned malformed JSON.")]
	ResponseParse {
		/// Logical endpoint label.
		endpoint: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// The request exceeded the configured timeout.
	#[error("Request to the {endpoint} endpoint timed out.")]
	Timeout {
		/// Logical endpoint label.
		endpoint: &'static str,
	},
}

/// Connection-level failures.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying client reported a network failure.
	#[error("Network error occurred while calling Discord.")]
	Network {
		/// reqwest failure.
		#[source]
		source: BoxError,
	},
	/// Socket or stream IO failure.
	#[error("I/O error occurred while calling Discord.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Boxes a network failure.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Converts a reqwest failure raised while calling `endpoint` into a crate error.
pub(crate) fn map_reqwest_error(endpoint: &'static str, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::Timeout { endpoint }.into();
	}

	TransportError::from(err).into()
}
