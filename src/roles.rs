//! Static role mapping, derived role connection metadata, and the membership lookup seam.
//!
//! A [`RoleMapping`] is fixed at process start. Every push derives a fresh [`RoleMetadata`] from
//! the member's current role set, so the metadata always carries exactly one `0`/`1` entry per
//! configured role.

// std
use std::{collections::BTreeSet, fs, path::Path};
// self
use crate::{
	_prelude::*,
	auth::{RoleId, UserId},
	error::ConfigError,
};

/// Discord `BOOLEAN_EQUAL` metadata type.
pub const BOOLEAN_EQUAL: u8 = 7;

const MAX_KEY_LEN: usize = 50;
const MAX_NAME_LEN: usize = 100;

/// Boxed future returned by [`RoleDirectory`] lookups.
pub type DirectoryFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<RoleId>>> + 'a + Send>>;

/// Read-only access to a member's current guild roles.
pub trait RoleDirectory
where
	Self: Send + Sync,
{
	/// Returns the role ids currently held by `user_id`; non-members yield an empty list.
	fn member_roles(&self, user_id: UserId) -> DirectoryFuture<'_>;
}

/// Errors raised while validating a [`RoleMapping`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RoleMappingError {
	/// At least one role must be tracked.
	#[error("Role mapping must contain at least one entry.")]
	Empty,
	/// Discord accepts at most five metadata records per application.
	#[error("Role mapping has {count} entries; at most {max} are supported.")]
	TooManyEntries {
		/// Supplied entry count.
		count: usize,
		/// Maximum allowed.
		max: usize,
	},
	/// Keys must be 1-50 characters of `a-z`, `0-9`, or `_`.
	#[error("Metadata key `{key}` must be 1-50 characters of a-z, 0-9, or _.")]
	InvalidKey {
		/// Offending key.
		key: String,
	},
	/// Display names must be 1-100 characters.
	#[error("Display name for `{key}` must be 1-100 characters.")]
	InvalidName {
		/// Key whose name is invalid.
		key: String,
	},
	/// The same key appears twice.
	#[error("Metadata key `{key}` is configured more than once.")]
	DuplicateKey {
		/// Duplicated key.
		key: String,
	},
	/// The same role is mapped twice.
	#[error("Role {role_id} is mapped more than once.")]
	DuplicateRole {
		/// Duplicated role.
		role_id: RoleId,
	},
}

/// One tracked role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMappingEntry {
	/// Metadata field name pushed to Discord.
	pub key: String,
	/// Guild role whose membership sets the flag.
	pub role_id: RoleId,
	/// Human-readable role name.
	pub name: String,
}
impl RoleMappingEntry {
	/// Convenience constructor.
	pub fn new(key: impl Into<String>, role_id: RoleId, name: impl Into<String>) -> Self {
		Self { key: key.into(), role_id, name: name.into() }
	}
}

/// Validated, ordered set of tracked roles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleMapping(Vec<RoleMappingEntry>);
impl RoleMapping {
	/// Maximum number of entries Discord accepts.
	pub const MAX_ENTRIES: usize = 5;

	/// Validates and wraps `entries`.
	pub fn new(entries: Vec<RoleMappingEntry>) -> Result<Self, RoleMappingError> {
		if entries.is_empty() {
			return Err(RoleMappingError::Empty);
		}
		if entries.len() > Self::MAX_ENTRIES {
			return Err(RoleMappingError::TooManyEntries {
				count: entries.len(),
				max: Self::MAX_ENTRIES,
			});
		}

		let mut keys = BTreeSet::new();
		let mut roles = BTreeSet::new();

		for entry in &entries {
			if !valid_key(&entry.key) {
				return Err(RoleMappingError::InvalidKey { key: entry.key.clone() });
			}
			if entry.name.trim().is_empty() || entry.name.chars().count() > MAX_NAME_LEN {
				return Err(RoleMappingError::InvalidName { key: entry.key.clone() });
			}
			if !keys.insert(entry.key.as_str()) {
				return Err(RoleMappingError::DuplicateKey { key: entry.key.clone() });
			}
			if !roles.insert(entry.role_id) {
				return Err(RoleMappingError::DuplicateRole { role_id: entry.role_id });
			}
		}

		Ok(Self(entries))
	}

	/// The five-role mapping the bot shipped with.
	pub fn builtin() -> Result<Self, ConfigError> {
		let entries = [
			("has_founder", 1400496639680057407, "Founder"),
			("has_c_suit", 1432535953712615486, "The C Suit"),
			("has_nexus", 1432769935590818005, "The Nexus"),
			("has_as_suites", 1433905673275703349, "Assisting Suites"),
			("has_as_nexus", 1434247577251090453, "Assisting Nexus"),
		]
		.into_iter()
		.map(|(key, role, name)| Ok(RoleMappingEntry::new(key, RoleId::new(role)?, name)))
		.collect::<Result<Vec<_>, ConfigError>>()?;

		Ok(Self::new(entries)?)
	}

	/// Loads a JSON array of `{key, role_id, name}` objects from `path`.
	pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
		let bytes = fs::read(path).map_err(|source| ConfigError::RoleMappingFile {
			path: path.display().to_string(),
			source,
		})?;
		let entries: Vec<RoleMappingEntry> =
			serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_slice(&bytes))
				.map_err(|source| ConfigError::RoleMappingParse {
					path: path.display().to_string(),
					source,
				})?;

		Ok(Self::new(entries)?)
	}

	/// Loads from `path` when given, otherwise falls back to [`RoleMapping::builtin`].
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		match path {
			Some(path) => Self::from_json_file(path),
			None => Self::builtin(),
		}
	}

	/// Configured entries in declaration order.
	pub fn entries(&self) -> &[RoleMappingEntry] {
		&self.0
	}

	/// Number of tracked roles.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Always `false` for a validated mapping.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Maps every configured key to `1` iff its role is in `roles`, `0` otherwise.
	pub fn derive_metadata(&self, roles: &[RoleId]) -> RoleMetadata {
		let held: BTreeSet<_> = roles.iter().copied().collect();

		RoleMetadata(
			self.0
				.iter()
				.map(|entry| (entry.key.clone(), u8::from(held.contains(&entry.role_id))))
				.collect(),
		)
	}

	/// Metadata schema records registered with the application.
	pub fn schema(&self) -> Vec<MetadataField> {
		self.0
			.iter()
			.map(|entry| MetadataField {
				key: entry.key.clone(),
				name: entry.name.clone(),
				description: format!("Has the {} role in the server", entry.name),
				kind: BOOLEAN_EQUAL,
			})
			.collect()
	}
}

/// Role connection metadata payload: one `0`/`1` flag per tracked role.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoleMetadata(BTreeMap<String, u8>);
impl RoleMetadata {
	/// Returns `true` when at least one flag is set.
	pub fn any_granted(&self) -> bool {
		self.0.values().any(|value| *value == 1)
	}

	/// Looks up the flag for `key`.
	pub fn get(&self, key: &str) -> Option<u8> {
		self.0.get(key).copied()
	}

	/// Keys whose flag is set.
	pub fn granted_keys(&self) -> impl Iterator<Item = &str> {
		self.0.iter().filter(|(_, value)| **value == 1).map(|(key, _)| key.as_str())
	}

	/// Number of flags.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// `true` when there are no flags at all.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

/// Application role connection metadata record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataField {
	/// Field key.
	pub key: String,
	/// Display name.
	pub name: String,
	/// Display description.
	pub description: String,
	/// Discord metadata type (`7` = boolean equal).
	#[serde(rename = "type")]
	pub kind: u8,
}

fn valid_key(key: &str) -> bool {
	!key.is_empty()
		&& key.len() <= MAX_KEY_LEN
		&& key.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;

	fn role(raw: u64) -> RoleId {
		RoleId::new(raw).expect("Role fixture should be valid.")
	}

	fn five_roles() -> RoleMapping {
		RoleMapping::new(
			(1..=5).map(|n| RoleMappingEntry::new(format!("k{n}"), role(n), format!("Role {n}"))).collect(),
		)
		.expect("Five-role mapping should be valid.")
	}

	#[test]
	fn derive_marks_only_held_roles() {
		let metadata = five_roles().derive_metadata(&[role(1), role(3), role(99)]);

		assert_eq!(metadata.len(), 5);
		assert_eq!(metadata.get("k1"), Some(1));
		assert_eq!(metadata.get("k2"), Some(0));
		assert_eq!(metadata.get("k3"), Some(1));
		assert_eq!(metadata.get("k4"), Some(0));
		assert_eq!(metadata.get("k5"), Some(0));
		assert!(metadata.any_granted());
		assert_eq!(metadata.granted_keys().collect::<Vec<_>>(), ["k1", "k3"]);
	}

	#[test]
	fn derive_without_roles_is_all_zero() {
		let mapping = five_roles();

		for roles in [vec![], vec![role(42)], vec![role(42), role(43)]] {
			let metadata = mapping.derive_metadata(&roles);

			assert_eq!(metadata.len(), mapping.len());
			assert!(!metadata.any_granted());
		}

		let json = serde_json::to_value(mapping.derive_metadata(&[]))
			.expect("Metadata should serialize.");

		assert_eq!(json, serde_json::json!({"k1": 0, "k2": 0, "k3": 0, "k4": 0, "k5": 0}));
	}

	#[test]
	fn mapping_validation_rejects_bad_entries() {
		assert_eq!(RoleMapping::new(vec![]), Err(RoleMappingError::Empty));
		assert!(matches!(
			RoleMapping::new(
				(1..=6).map(|n| RoleMappingEntry::new(format!("k{n}"), role(n), "R")).collect()
			),
			Err(RoleMappingError::TooManyEntries { count: 6, max: 5 })
		));
		assert!(matches!(
			RoleMapping::new(vec![RoleMappingEntry::new("Has-Caps", role(1), "R")]),
			Err(RoleMappingError::InvalidKey { .. })
		));
		assert!(matches!(
			RoleMapping::new(vec![RoleMappingEntry::new("ok", role(1), "  ")]),
			Err(RoleMappingError::InvalidName { .. })
		));
		assert!(matches!(
			RoleMapping::new(vec![
				RoleMappingEntry::new("same", role(1), "A"),
				RoleMappingEntry::new("same", role(2), "B"),
			]),
			Err(RoleMappingError::DuplicateKey { .. })
		));
		assert!(matches!(
			RoleMapping::new(vec![
				RoleMappingEntry::new("a", role(1), "A"),
				RoleMappingEntry::new("b", role(1), "B"),
			]),
			Err(RoleMappingError::DuplicateRole { .. })
		));
	}

	#[test]
	fn builtin_mapping_is_valid_and_describes_schema() {
		let mapping = RoleMapping::builtin().expect("Builtin mapping should validate.");
		let schema = mapping.schema();

		assert_eq!(mapping.len(), 5);
		assert_eq!(schema[0].key, "has_founder");
		assert_eq!(schema[0].description, "Has the Founder role in the server");
		assert_eq!(
			serde_json::to_value(&schema[0]).expect("Schema should serialize.")["type"],
			serde_json::json!(7)
		);
	}

	#[test]
	fn mapping_loads_from_json_file() {
		let path = env::temp_dir().join(format!(
			"linked_roles_mapping_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos()
		));

		fs::write(
			&path,
			r#"[{"key":"has_admin","role_id":"1400496639680057407","name":"Admin"},
			    {"key":"has_mod","role_id":1432535953712615486,"name":"Mod"}]"#,
		)
		.expect("Failed to write mapping fixture.");

		let mapping = RoleMapping::load(Some(&path)).expect("Mapping file should load.");

		assert_eq!(mapping.entries()[1].role_id, role(1432535953712615486));

		fs::write(&path, r#"[{"key":"has_admin","role_id":"x","name":"Admin"}]"#)
			.expect("Failed to write malformed fixture.");

		let err = RoleMapping::load(Some(&path)).expect_err("Malformed ids must be rejected.");

		assert!(matches!(err, ConfigError::RoleMappingParse { .. }));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove mapping fixture {}: {e}", path.display())
		});
	}
}
