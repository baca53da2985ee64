//! Discord linked-roles bridge: OAuth account linking, gateway-driven role tracking, and
//! refresh-aware role connection metadata pushes.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod discord;
pub mod error;
pub mod events;
pub mod flows;
pub mod http;
pub mod notify;
pub mod oauth;
pub mod obs;
pub mod roles;
pub mod server;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and test doubles for integration tests; enabled via `cfg(test)` or
	//! the `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{RoleId, UserId},
		discord::DiscordEndpoints,
		flows::Linker,
		http::{DEFAULT_TIMEOUT, ReqwestHttpClient},
		notify::{Notice, Notifier, NotifyFuture},
		oauth::OAuthClient,
		roles::{DirectoryFuture, RoleDirectory, RoleMapping, RoleMappingEntry},
		store::MemoryStore,
	};

	/// Application id used by test linkers.
	pub const TEST_CLIENT_ID: &str = "1234";
	/// Application secret used by test linkers.
	pub const TEST_CLIENT_SECRET: &str = "client-secret";

	/// Role directory answering from an in-memory table.
	#[derive(Debug, Default)]
	pub struct StaticRoleDirectory {
		roles: RwLock<HashMap<UserId, Vec<RoleId>>>,
		failure: RwLock<Option<u16>>,
	}
	impl StaticRoleDirectory {
		/// Sets the roles reported for `user_id`.
		pub fn set(&self, user_id: UserId, roles: Vec<RoleId>) {
			self.roles.write().insert(user_id, roles);
		}

		/// Makes every lookup fail with a Discord error carrying `status`.
		pub fn fail_with(&self, status: u16) {
			*self.failure.write() = Some(status);
		}
	}
	impl RoleDirectory for StaticRoleDirectory {
		fn member_roles(&self, user_id: UserId) -> DirectoryFuture<'_> {
			let result = match *self.failure.read() {
				Some(status) => Err(Error::Discord {
					endpoint: "guild_member",
					status,
					message: "lookup disabled".into(),
				}),
				None => Ok(self.roles.read().get(&user_id).cloned().unwrap_or_default()),
			};

			Box::pin(async move { result })
		}
	}

	/// Notifier that keeps every delivered notice.
	#[derive(Debug, Default)]
	pub struct RecordingNotifier(Mutex<Vec<Notice>>);
	impl RecordingNotifier {
		/// Notices delivered so far, oldest first.
		pub fn notices(&self) -> Vec<Notice> {
			self.0.lock().clone()
		}

		/// Titles of the delivered notices, oldest first.
		pub fn titles(&self) -> Vec<String> {
			self.0.lock().iter().map(|notice| notice.title.clone()).collect()
		}
	}
	impl Notifier for RecordingNotifier {
		fn notify(&self, notice: Notice) -> NotifyFuture<'_> {
			self.0.lock().push(notice);

			Box::pin(async {})
		}
	}

	/// Linker wired to a mock Discord plus handles to its in-memory collaborators.
	#[derive(Debug)]
	pub struct TestLinker {
		/// Linker under test.
		pub linker: Arc<Linker>,
		/// Backing token store.
		pub store: Arc<MemoryStore>,
		/// Backing role directory.
		pub directory: Arc<StaticRoleDirectory>,
		/// Recorded notices.
		pub notifier: Arc<RecordingNotifier>,
	}

	/// Snowflake for tests; panics on zero.
	pub fn user(raw: u64) -> UserId {
		UserId::new(raw).expect("User fixture should be valid.")
	}

	/// Snowflake for tests; panics on zero.
	pub fn role(raw: u64) -> RoleId {
		RoleId::new(raw).expect("Role fixture should be valid.")
	}

	/// Three tracked roles: `has_r1` (11), `has_r2` (12), and `has_r3` (13).
	pub fn test_role_mapping() -> RoleMapping {
		RoleMapping::new(vec![
			RoleMappingEntry::new("has_r1", role(11), "Role One"),
			RoleMappingEntry::new("has_r2", role(12), "Role Two"),
			RoleMappingEntry::new("has_r3", role(13), "Role Three"),
		])
		.expect("Test role mapping should be valid.")
	}

	/// Builds a [`Linker`] whose REST and OAuth calls go to `base_url` (an `httpmock` server).
	pub fn build_test_linker(base_url: &str) -> TestLinker {
		let base = Url::parse(base_url).expect("Mock server URL should parse.");
		let endpoints =
			DiscordEndpoints::local(&base).expect("Local endpoints should build for the mock.");
		let redirect = base.join("/discord-oauth-callback").expect("Redirect URI should join.");
		let http = ReqwestHttpClient::new(DEFAULT_TIMEOUT).expect("HTTP client should build.");
		let store = Arc::new(MemoryStore::default());
		let directory = Arc::new(StaticRoleDirectory::default());
		let notifier = Arc::new(RecordingNotifier::default());
		let linker = Linker::new(
			store.clone(),
			directory.clone(),
			notifier.clone(),
			test_role_mapping(),
			endpoints,
			OAuthClient::new(TEST_CLIENT_ID, TEST_CLIENT_SECRET, redirect),
			http,
		)
		.expect("Test linker should build.");

		TestLinker { linker: Arc::new(linker), store, directory, notifier }
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
// The binary reports startup failures through color-eyre.
use color_eyre as _;
#[cfg(test)] use {httpmock as _, tower as _};
