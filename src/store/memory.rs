//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, UserId},
	store::{StoreError, StoreFuture, TokenStore},
};

type StoreMap = Arc<RwLock<HashMap<UserId, TokenRecord>>>;

/// Storage backend that keeps records in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Returns the number of stored records.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing has been stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn save_now(map: StoreMap, record: TokenRecord) -> Result<(), StoreError> {
		map.write().insert(record.user_id, record);

		Ok(())
	}

	fn fetch_now(map: StoreMap, user_id: UserId) -> Option<TokenRecord> {
		map.read().get(&user_id).cloned()
	}
}
impl TokenStore for MemoryStore {
	fn save(&self, record: TokenRecord) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::save_now(map, record) })
	}

	fn fetch(&self, user_id: UserId) -> StoreFuture<'_, Option<TokenRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::fetch_now(map, user_id)) })
	}
}
