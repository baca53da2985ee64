//! File-backed [`TokenStore`] persisting every record into a single JSON document.
//!
//! The document is a JSON object keyed by `discord-<user_id>`, where each value carries
//! `access_token`, `refresh_token`, and `expires_at` (absolute epoch seconds).

// std
use std::{
	collections::BTreeMap,
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, UserId},
	store::{StoreError, StoreFuture, StoreKey, TokenStore},
};

#[derive(Serialize, Deserialize)]
struct StoredTokens {
	access_token: String,
	refresh_token: String,
	#[serde(with = "time::serde::timestamp")]
	expires_at: OffsetDateTime,
}

/// Persists token records to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<HashMap<UserId, TokenRecord>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		tracing::debug!(path = %path.display(), records = snapshot.len(), "token store loaded");

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Returns the backing file path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Returns the number of linked users currently held.
	pub fn len(&self) -> usize {
		self.inner.read().len()
	}

	/// Returns `true` when no user has been linked yet.
	pub fn is_empty(&self) -> bool {
		self.inner.read().is_empty()
	}

	fn load_snapshot(path: &Path) -> Result<HashMap<UserId, TokenRecord>, StoreError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Ok(HashMap::new());
		}

		let entries: BTreeMap<StoreKey, StoredTokens> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(entries
			.into_iter()
			.filter_map(|(key, stored)| {
				match TokenRecord::builder(key.0)
					.access_token(stored.access_token)
					.refresh_token(stored.refresh_token)
					.expires_at(stored.expires_at)
					.build()
				{
					Ok(record) => Some((key.0, record)),
					Err(e) => {
						tracing::warn!(
							key = %key,
							path = %path.display(),
							error = %e,
							"skipping unusable token record"
						);

						None
					},
				}
			})
			.collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &HashMap<UserId, TokenRecord>) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let snapshot: BTreeMap<StoreKey, StoredTokens> = contents
			.values()
			.map(|record| {
				(
					StoreKey(record.user_id),
					StoredTokens {
						access_token: record.access_token.expose().to_owned(),
						refresh_token: record.refresh_token.expose().to_owned(),
						expires_at: record.expires_at,
					},
				)
			})
			.collect();
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl TokenStore for FileStore {
	fn save(&self, record: TokenRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let previous = guard.insert(record.user_id, record.clone());

			if let Err(e) = self.persist_locked(&guard) {
				// Keep memory consistent with what is on disk.
				match previous {
					Some(previous) => guard.insert(record.user_id, previous),
					None => guard.remove(&record.user_id),
				};

				return Err(e);
			}

			Ok(())
		})
	}

	fn fetch(&self, user_id: UserId) -> StoreFuture<'_, Option<TokenRecord>> {
		Box::pin(async move { Ok(self.inner.read().get(&user_id).cloned()) })
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;

	fn temp_path(tag: &str) -> PathBuf {
		let unique = format!(
			"linked_roles_file_store_{tag}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	fn user(raw: u64) -> UserId {
		UserId::new(raw).expect("User fixture should be valid.")
	}

	#[tokio::test]
	async fn save_and_reload_round_trip() {
		let path = temp_path("round_trip");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let record = store
			.put(user(42), "access-token", "refresh-token", Duration::hours(1))
			.await
			.expect("Failed to put fixture record into file store.");

		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");
		let fetched = reopened
			.fetch(user(42))
			.await
			.expect("Failed to fetch fixture record from file store.")
			.expect("File store lost record after reopen.");

		assert_eq!(fetched.access_token.expose(), "access-token");
		assert_eq!(fetched.refresh_token.expose(), "refresh-token");
		// Epoch-second precision on disk.
		assert_eq!(fetched.expires_at.unix_timestamp(), record.expires_at.unix_timestamp());

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[tokio::test]
	async fn save_replaces_prior_record() {
		let path = temp_path("replace");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");

		store
			.put(user(9), "first-access", "first-refresh", Duration::hours(1))
			.await
			.expect("First put should succeed.");
		store
			.put(user(9), "second-access", "second-refresh", Duration::hours(2))
			.await
			.expect("Second put should succeed.");

		assert_eq!(store.len(), 1);

		let fetched = store
			.fetch(user(9))
			.await
			.expect("Fetch should succeed.")
			.expect("Record should be present.");

		assert_eq!(fetched.access_token.expose(), "second-access");
		assert_eq!(fetched.refresh_token.expose(), "second-refresh");

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn reads_prefixed_document_layout() {
		let path = temp_path("layout");

		fs::write(
			&path,
			r#"{
    "discord-80351110224678912": {
        "access_token": "legacy-access",
        "refresh_token": "legacy-refresh",
        "expires_at": 1735693200
    }
}"#,
		)
		.expect("Failed to write legacy fixture.");

		let store = FileStore::open(&path).expect("Legacy document should load.");
		let record = store
			.inner
			.read()
			.get(&user(80351110224678912))
			.cloned()
			.expect("Legacy record should be keyed by the user id.");

		assert_eq!(record.access_token.expose(), "legacy-access");
		assert_eq!(record.expires_at.unix_timestamp(), 1735693200);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[tokio::test]
	async fn blank_records_are_skipped_on_load() {
		let path = temp_path("blank");

		fs::write(
			&path,
			r#"{
    "discord-42": { "access_token": "", "refresh_token": "r", "expires_at": 1735693200 },
    "discord-43": { "access_token": "a", "refresh_token": "r", "expires_at": 1735693200 }
}"#,
		)
		.expect("Failed to write blank fixture.");

		let store = FileStore::open(&path).expect("One unusable record should not block the load.");

		assert_eq!(store.len(), 1);
		assert!(store.fetch(user(42)).await.expect("Fetch should succeed.").is_none());
		assert!(store.fetch(user(43)).await.expect("Fetch should succeed.").is_some());

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn empty_file_loads_as_empty_store() {
		let path = temp_path("empty");

		fs::write(&path, "").expect("Failed to write empty fixture.");

		let store = FileStore::open(&path).expect("Empty document should load.");

		assert!(store.is_empty());

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}
}
