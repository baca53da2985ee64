//! Login sessions: single-use `state` values and the Discord authorize redirect.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	discord::DiscordEndpoints,
	flows::{Linker, OAUTH_SCOPES},
	oauth::OAuthClient,
};

const STATE_LEN: usize = 32;

/// Authorize redirect handed to a user starting the link flow.
#[derive(Clone, Debug)]
pub struct LoginSession {
	/// Opaque state value that must round-trip via the callback.
	pub state: String,
	/// Discord authorize page to redirect the user to.
	pub authorize_url: Url,
	/// Moment after which the state is no longer accepted.
	pub expires_at: OffsetDateTime,
}

/// Single-use login states awaiting their callback.
///
/// At most `capacity` states are held; issuing past that evicts the one closest to expiry.
#[derive(Debug)]
pub(crate) struct PendingLogins {
	ttl: Duration,
	capacity: usize,
	states: Mutex<HashMap<String, OffsetDateTime>>,
}
impl PendingLogins {
	pub(crate) fn new(ttl: Duration, capacity: usize) -> Self {
		Self { ttl, capacity: capacity.max(1), states: Default::default() }
	}

	pub(crate) fn issue(&self, now: OffsetDateTime) -> (String, OffsetDateTime) {
		let state = random_string(STATE_LEN);
		let expires_at = now + self.ttl;
		let mut states = self.states.lock();

		states.retain(|_, deadline| *deadline > now);

		while states.len() >= self.capacity {
			let Some(oldest) =
				states.iter().min_by_key(|(_, deadline)| **deadline).map(|(key, _)| key.clone())
			else {
				break;
			};

			tracing::debug!("pending login limit reached; evicting the oldest state");
			states.remove(&oldest);
		}

		states.insert(state.clone(), expires_at);

		(state, expires_at)
	}

	pub(crate) fn redeem(&self, state: &str, now: OffsetDateTime) -> Result<()> {
		match self.states.lock().remove(state) {
			Some(deadline) if deadline > now => Ok(()),
			_ => Err(Error::InvalidState),
		}
	}

	pub(crate) fn len(&self) -> usize {
		self.states.lock().len()
	}
}

impl Linker {
	/// Starts a login: remembers a fresh `state` and builds the authorize URL.
	pub fn start_login(&self) -> LoginSession {
		let (state, expires_at) = self.logins.issue(OffsetDateTime::now_utc());
		let authorize_url = build_authorize_url(&self.endpoints, &self.client, &state);

		LoginSession { state, authorize_url, expires_at }
	}
}

fn build_authorize_url(endpoints: &DiscordEndpoints, client: &OAuthClient, state: &str) -> Url {
	let mut url = endpoints.authorization.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("client_id", &client.client_id);
	pairs.append_pair("redirect_uri", client.redirect_uri.as_str());
	pairs.append_pair("response_type", "code");
	pairs.append_pair("scope", OAUTH_SCOPES);
	pairs.append_pair("state", state);
	pairs.append_pair("prompt", "consent");

	drop(pairs);

	url
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn states_are_single_use() {
		let logins = PendingLogins::new(Duration::minutes(10), 16);
		let now = OffsetDateTime::now_utc();
		let (state, _) = logins.issue(now);

		assert_eq!(state.len(), STATE_LEN);
		assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
		assert!(logins.redeem(&state, now).is_ok());
		assert!(matches!(logins.redeem(&state, now), Err(Error::InvalidState)));
	}

	#[test]
	fn expired_states_are_rejected_and_purged() {
		let logins = PendingLogins::new(Duration::minutes(10), 16);
		let issued = OffsetDateTime::now_utc();
		let (stale, _) = logins.issue(issued);

		assert!(matches!(
			logins.redeem(&stale, issued + Duration::minutes(11)),
			Err(Error::InvalidState)
		));

		logins.issue(issued);
		logins.issue(issued + Duration::minutes(11));

		assert_eq!(logins.len(), 1);
	}

	#[test]
	fn login_flood_evicts_oldest_state() {
		let logins = PendingLogins::new(Duration::minutes(10), 3);
		let start = OffsetDateTime::now_utc();
		let issued = (0..5)
			.map(|i| logins.issue(start + Duration::seconds(i)).0)
			.collect::<Vec<_>>();

		assert_eq!(logins.len(), 3);
		assert!(matches!(logins.redeem(&issued[0], start), Err(Error::InvalidState)));
		assert!(matches!(logins.redeem(&issued[1], start), Err(Error::InvalidState)));
		assert!(logins.redeem(&issued[4], start).is_ok());
	}

	#[test]
	fn authorize_url_requests_offline_consent() {
		let endpoints = DiscordEndpoints::production().expect("Production endpoints should build.");
		let client = OAuthClient::new(
			"1234",
			"secret",
			Url::parse("https://linked.example.com/discord-oauth-callback")
				.expect("Redirect fixture should parse."),
		);
		let url = build_authorize_url(&endpoints, &client, "state123");
		let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();

		assert_eq!(url.path(), "/oauth2/authorize");
		assert_eq!(pairs["scope"], "identify role_connections.write offline");
		assert_eq!(pairs["prompt"], "consent");
		assert_eq!(pairs["state"], "state123");
		assert_eq!(pairs["redirect_uri"], "https://linked.example.com/discord-oauth-callback");
		assert!(!url.as_str().contains("secret"));
	}
}
