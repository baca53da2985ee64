//! Linking flows: login session, initial link, token refresh, and role re-sync.

pub mod common;
pub mod link;
pub mod refresh;
pub mod resync;
pub mod session;

pub use common::*;
pub use link::*;
pub use refresh::*;
pub use resync::*;
pub use session::*;

// self
use crate::{
	_prelude::*,
	discord::{DiscordEndpoints, RoleConnectionApi},
	events::{HandlerFuture, RoleChange, RoleChangeHandler},
	http::ReqwestHttpClient,
	notify::Notifier,
	oauth::{OAuthClient, OAuthFacade},
	roles::{RoleDirectory, RoleMapping},
	store::TokenStore,
};

/// Coordinates every call made on behalf of linked users.
///
/// The linker owns the token store handle, the role directory, the notifier, and the OAuth
/// client so individual flows only carry user-specific data. No error escapes
/// [`Linker::initial_link`] or [`Linker::auto_resync`]; both fold failures into outcomes.
pub struct Linker {
	/// Token store shared by every flow.
	pub store: Arc<dyn TokenStore>,
	/// Guild role membership lookup.
	pub directory: Arc<dyn RoleDirectory>,
	/// Outcome notice sink.
	pub notifier: Arc<dyn Notifier>,
	/// Tracked roles.
	pub roles: RoleMapping,
	/// Discord endpoints.
	pub endpoints: Arc<DiscordEndpoints>,
	/// Registered application credentials.
	pub client: OAuthClient,
	/// Shared counters for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	api: RoleConnectionApi,
	facade: OAuthFacade,
	logins: PendingLogins,
}
impl Linker {
	/// Wires a linker from its collaborators.
	pub fn new(
		store: Arc<dyn TokenStore>,
		directory: Arc<dyn RoleDirectory>,
		notifier: Arc<dyn Notifier>,
		roles: RoleMapping,
		endpoints: DiscordEndpoints,
		client: OAuthClient,
		http_client: ReqwestHttpClient,
	) -> Result<Self> {
		let endpoints = Arc::new(endpoints);
		let facade = OAuthFacade::new(&endpoints, &client, http_client.clone())?;
		let api = RoleConnectionApi::new(http_client, endpoints.clone(), client.client_id.clone());

		Ok(Self {
			store,
			directory,
			notifier,
			roles,
			endpoints,
			client,
			refresh_metrics: Default::default(),
			api,
			facade,
			logins: PendingLogins::new(LOGIN_TTL, MAX_PENDING_LOGINS),
		})
	}

	/// Client for the calls made with a user's bearer token.
	pub fn api(&self) -> &RoleConnectionApi {
		&self.api
	}
}
impl Debug for Linker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Linker")
			.field("roles", &self.roles)
			.field("endpoints", &self.endpoints)
			.field("client", &self.client)
			.field("pending_logins", &self.logins.len())
			.finish_non_exhaustive()
	}
}
impl RoleChangeHandler for Linker {
	fn handle(&self, change: RoleChange) -> HandlerFuture<'_> {
		Box::pin(async move {
			let roles = change.current_roles();

			self.auto_resync(change.user_id, &roles).await;
		})
	}
}
