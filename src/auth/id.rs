//! Strongly typed Discord snowflake identifiers.

// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "SnowflakeRepr", into = "String")]
		pub struct $name(u64);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: u64) -> Result<Self, IdentifierError> {
				validate_value($kind, value)?;

				Ok(Self(value))
			}

			/// Returns the raw snowflake value.
			pub const fn get(self) -> u64 {
				self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0.to_string()
			}
		}
		impl From<$name> for u64 {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<u64> for $name {
			type Error = IdentifierError;

			fn try_from(value: u64) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl TryFrom<SnowflakeRepr> for $name {
			type Error = IdentifierError;

			fn try_from(value: SnowflakeRepr) -> Result<Self, Self::Error> {
				match value {
					SnowflakeRepr::Text(text) => text.parse(),
					SnowflakeRepr::Number(number) => Self::new(number),
				}
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				Display::fmt(&self.0, f)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(parse_view($kind, s)?)
			}
		}
	};
}

/// Wire representation accepted for snowflakes.
///
/// Discord encodes snowflakes as JSON strings, while hand-written configuration often uses bare
/// integers, so both are accepted on input. Output is always a string.
#[doc(hidden)]
#[derive(Deserialize)]
#[serde(untagged)]
pub enum SnowflakeRepr {
	/// String-encoded snowflake.
	Text(String),
	/// Integer snowflake.
	Number(u64),
}

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty or whitespace.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (user, role, guild, channel).
		kind: &'static str,
	},
	/// The identifier is not a base-10 unsigned integer.
	#[error("{kind} identifier must be numeric.")]
	NotNumeric {
		/// Kind of identifier (user, role, guild, channel).
		kind: &'static str,
	},
	/// Snowflakes are never zero.
	#[error("{kind} identifier cannot be zero.")]
	Zero {
		/// Kind of identifier (user, role, guild, channel).
		kind: &'static str,
	},
}

def_id! { UserId, "Discord user snowflake.", "User" }
def_id! { RoleId, "Discord guild role snowflake.", "Role" }
def_id! { GuildId, "Discord guild snowflake.", "Guild" }
def_id! { ChannelId, "Discord channel snowflake.", "Channel" }

fn parse_view(kind: &'static str, view: &str) -> Result<u64, IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if !view.bytes().all(|b| b.is_ascii_digit()) {
		return Err(IdentifierError::NotNumeric { kind });
	}

	view.parse().map_err(|_| IdentifierError::NotNumeric { kind })
}

fn validate_value(kind: &'static str, value: u64) -> Result<(), IdentifierError> {
	if value == 0 {
		return Err(IdentifierError::Zero { kind });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_parse_and_validate() {
		let user: UserId = "80351110224678912".parse().expect("User fixture should be valid.");

		assert_eq!(user.get(), 80351110224678912);
		assert_eq!(user.to_string(), "80351110224678912");
		assert!(" 1".parse::<UserId>().is_err(), "Leading whitespace must be rejected.");
		assert!("".parse::<RoleId>().is_err());
		assert!("12a".parse::<GuildId>().is_err());
		assert_eq!("0".parse::<ChannelId>(), Err(IdentifierError::Zero { kind: "Channel" }));
		assert!("99999999999999999999999".parse::<UserId>().is_err());
	}

	#[test]
	fn serde_accepts_strings_and_numbers() {
		let from_text: RoleId =
			serde_json::from_str("\"1400496639680057407\"").expect("String snowflake should parse.");
		let from_number: RoleId =
			serde_json::from_str("1400496639680057407").expect("Numeric snowflake should parse.");

		assert_eq!(from_text, from_number);
		assert_eq!(
			serde_json::to_string(&from_text).expect("Snowflake should serialize."),
			"\"1400496639680057407\""
		);
		assert!(serde_json::from_str::<RoleId>("\"abc\"").is_err());
		assert!(serde_json::from_str::<RoleId>("0").is_err());
	}

	#[test]
	fn debug_includes_kind() {
		let guild = GuildId::new(42).expect("Guild fixture should be valid.");

		assert_eq!(format!("{guild:?}"), "Guild(42)");
	}
}
