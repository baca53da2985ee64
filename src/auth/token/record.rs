//! Stored token pair for one linked user.

// crates.io
use time::Date;
// self
use crate::{
	_prelude::*,
	auth::{UserId, token::secret::TokenSecret},
};

/// Reasons a [`TokenRecordBuilder`] refuses to produce a record.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TokenRecordBuilderError {
	/// The access token is absent or blank.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// The refresh token is absent or blank.
	#[error("Refresh token is required; was the `offline` scope granted?")]
	MissingRefreshToken,
	/// No expiry instant was given.
	#[error("Expiry instant is required.")]
	MissingExpiry,
}

/// Credentials stored for a single linked Discord user.
///
/// Records are replaced wholesale on issuance and refresh; there is no partial update path.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenRecord {
	/// Discord user owning the grant.
	pub user_id: UserId,
	/// Bearer credential; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Renewal credential used by the refresh grant.
	pub refresh_token: TokenSecret,
	/// Absolute expiry instant of the access token.
	pub expires_at: OffsetDateTime,
}
impl TokenRecord {
	/// Starts a validated record for `user_id`.
	pub fn builder(user_id: UserId) -> TokenRecordBuilder {
		TokenRecordBuilder { user_id, access_token: None, refresh_token: None, expires_at: None }
	}

	/// Creates a record expiring `expires_in` after the current instant.
	///
	/// Lifetimes past the representable range clamp to the last (or first) instant.
	pub fn issue(
		user_id: UserId,
		access_token: impl Into<String>,
		refresh_token: impl Into<String>,
		expires_in: Duration,
	) -> Self {
		Self {
			user_id,
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::new(refresh_token),
			expires_at: expiry_after(OffsetDateTime::now_utc(), expires_in),
		}
	}

	/// Time left before expiry at `instant`; negative once expired.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		self.expires_at - instant
	}

	/// Returns `true` when the access token expires within `window` of `instant`.
	pub fn needs_refresh_at(&self, instant: OffsetDateTime, window: Duration) -> bool {
		self.remaining_at(instant) < window
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("user_id", &self.user_id)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

fn expiry_after(now: OffsetDateTime, expires_in: Duration) -> OffsetDateTime {
	now.checked_add(expires_in).unwrap_or_else(|| {
		let edge = if expires_in.is_negative() { Date::MIN } else { Date::MAX };

		edge.midnight().assume_utc()
	})
}

/// Assembles a [`TokenRecord`] from loosely typed parts, rejecting blank secrets.
#[derive(Clone, Debug)]
pub struct TokenRecordBuilder {
	user_id: UserId,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	expires_at: Option<OffsetDateTime>,
}
impl TokenRecordBuilder {
	/// Sets the access token.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the refresh token.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the absolute expiry.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Validates the parts and produces the record.
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let present = |secret: &TokenSecret| !secret.is_empty();
		let access_token = self
			.access_token
			.filter(present)
			.ok_or(TokenRecordBuilderError::MissingAccessToken)?;
		let refresh_token = self
			.refresh_token
			.filter(present)
			.ok_or(TokenRecordBuilderError::MissingRefreshToken)?;
		let expires_at = self.expires_at.ok_or(TokenRecordBuilderError::MissingExpiry)?;

		Ok(TokenRecord { user_id: self.user_id, access_token, refresh_token, expires_at })
	}
}
