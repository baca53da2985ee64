//! Validated Discord endpoint set and its builder.

// self
use crate::{_prelude::*, error::ConfigError};

const API_BASE: &str = "https://discord.com/api/v10/";
const AUTHORIZATION: &str = "https://discord.com/oauth2/authorize";
const TOKEN: &str = "https://discord.com/api/v10/oauth2/token";
const GATEWAY: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Errors raised while constructing or validating endpoints.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum EndpointError {
	/// A required endpoint was never supplied.
	#[error("Missing {endpoint} endpoint.")]
	Missing {
		/// Which endpoint is missing.
		endpoint: &'static str,
	},
	/// Remote endpoints must use TLS.
	#[error("The {endpoint} endpoint must use a secure scheme: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// The API base cannot be joined with relative paths.
	#[error("The API base must be a hierarchical URL: {url}.")]
	OpaqueApiBase {
		/// Offending URL.
		url: String,
	},
}

/// Endpoint set used by every outbound call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordEndpoints {
	/// REST API root; always ends with `/`.
	pub api_base: Url,
	/// OAuth authorize page users are redirected to.
	pub authorization: Url,
	/// OAuth token endpoint.
	pub token: Url,
	/// Gateway WebSocket URL.
	pub gateway: Url,
}
impl DiscordEndpoints {
	/// Creates an empty builder.
	pub fn builder() -> DiscordEndpointsBuilder {
		DiscordEndpointsBuilder::default()
	}

	/// Public Discord endpoints (API v10).
	pub fn production() -> Result<Self> {
		let parse = |raw: &str| Url::parse(raw).map_err(|source| ConfigError::InvalidEndpoint { source });

		Ok(Self::builder()
			.api_base(parse(API_BASE)?)
			.authorization(parse(AUTHORIZATION)?)
			.token(parse(TOKEN)?)
			.gateway(parse(GATEWAY)?)
			.build()
			.map_err(ConfigError::from)?)
	}

	/// Every endpoint on a single local server, as used by integration tests.
	pub fn local(base: &Url) -> Result<Self> {
		let join = |path: &str| base.join(path).map_err(|source| ConfigError::InvalidEndpoint { source });
		let mut gateway = join("/gateway")?;
		let socket_scheme = if base.scheme() == "https" { "wss" } else { "ws" };

		gateway.set_scheme(socket_scheme).map_err(|_| {
			ConfigError::from(EndpointError::InsecureEndpoint {
				endpoint: "gateway",
				url: base.to_string(),
			})
		})?;

		Ok(Self::builder()
			.api_base(join("/api/v10/")?)
			.authorization(join("/oauth2/authorize")?)
			.token(join("/api/v10/oauth2/token")?)
			.gateway(gateway)
			.build()
			.map_err(ConfigError::from)?)
	}

	/// Resolves a REST path (without leading slash) against [`Self::api_base`].
	pub fn api_url(&self, path: &str) -> Result<Url> {
		Ok(self
			.api_base
			.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidEndpoint { source })?)
	}
}

/// Builder for [`DiscordEndpoints`].
#[derive(Debug, Default)]
pub struct DiscordEndpointsBuilder {
	/// REST API root.
	pub api_base: Option<Url>,
	/// OAuth authorize page.
	pub authorization: Option<Url>,
	/// OAuth token endpoint.
	pub token: Option<Url>,
	/// Gateway WebSocket URL.
	pub gateway: Option<Url>,
}
impl DiscordEndpointsBuilder {
	/// Sets the REST API root. A missing trailing slash is added.
	pub fn api_base(mut self, mut url: Url) -> Self {
		if !url.path().ends_with('/') {
			let path = format!("{}/", url.path());

			url.set_path(&path);
		}

		self.api_base = Some(url);

		self
	}

	/// Sets the OAuth authorize page.
	pub fn authorization(mut self, url: Url) -> Self {
		self.authorization = Some(url);

		self
	}

	/// Sets the OAuth token endpoint.
	pub fn token(mut self, url: Url) -> Self {
		self.token = Some(url);

		self
	}

	/// Sets the gateway WebSocket URL.
	pub fn gateway(mut self, url: Url) -> Self {
		self.gateway = Some(url);

		self
	}

	/// Consumes the builder and validates the resulting endpoint set.
	pub fn build(self) -> Result<DiscordEndpoints, EndpointError> {
		let api_base = self.api_base.ok_or(EndpointError::Missing { endpoint: "api_base" })?;
		let authorization =
			self.authorization.ok_or(EndpointError::Missing { endpoint: "authorization" })?;
		let token = self.token.ok_or(EndpointError::Missing { endpoint: "token" })?;
		let gateway = self.gateway.ok_or(EndpointError::Missing { endpoint: "gateway" })?;

		if api_base.cannot_be_a_base() {
			return Err(EndpointError::OpaqueApiBase { url: api_base.to_string() });
		}

		validate_endpoint("api_base", &api_base, "https", "http")?;
		validate_endpoint("authorization", &authorization, "https", "http")?;
		validate_endpoint("token", &token, "https", "http")?;
		validate_endpoint("gateway", &gateway, "wss", "ws")?;

		Ok(DiscordEndpoints { api_base, authorization, token, gateway })
	}
}

// Plain schemes are accepted for loopback hosts only.
fn validate_endpoint(
	name: &'static str,
	url: &Url,
	secure: &str,
	plain: &str,
) -> Result<(), EndpointError> {
	let scheme = url.scheme();

	if scheme == secure || (scheme == plain && is_loopback(url)) {
		Ok(())
	} else {
		Err(EndpointError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain == "localhost",
		Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
		Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
		None => false,
	}
}
