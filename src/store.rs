//! Storage contract and built-in token store implementations.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, TokenRecord, UserId},
};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by token stores.
///
/// Writes are last-write-wins full replacements keyed by user id.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Persists `record`, replacing any prior record for the same user.
	fn save(&self, record: TokenRecord) -> StoreFuture<'_, ()>;

	/// Fetches the record for `user_id`, if present.
	fn fetch(&self, user_id: UserId) -> StoreFuture<'_, Option<TokenRecord>>;

	/// Stores freshly issued credentials, stamping `expires_at = now + expires_in`.
	fn put<'a>(
		&'a self,
		user_id: UserId,
		access_token: &'a str,
		refresh_token: &'a str,
		expires_in: Duration,
	) -> StoreFuture<'a, TokenRecord> {
		Box::pin(async move {
			let record = TokenRecord::issue(user_id, access_token, refresh_token, expires_in);

			self.save(record.clone()).await?;

			Ok(record)
		})
	}

	/// Alias for [`TokenStore::fetch`].
	fn get(&self, user_id: UserId) -> StoreFuture<'_, Option<TokenRecord>> {
		self.fetch(user_id)
	}
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Persisted key for a user's record, rendered as `discord-<user_id>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreKey(pub UserId);
impl StoreKey {
	const PREFIX: &'static str = "discord-";
}
impl Display for StoreKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}{}", Self::PREFIX, self.0)
	}
}
impl From<StoreKey> for String {
	fn from(value: StoreKey) -> Self {
		value.to_string()
	}
}
impl TryFrom<String> for StoreKey {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}
impl FromStr for StoreKey {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let raw = s.strip_prefix(Self::PREFIX).unwrap_or(s);

		Ok(Self(raw.parse()?))
	}
}
