//! Refresh token exchange with full-replace persistence.
//!
//! [`Linker::refresh`] reads the stored refresh token, performs a
//! `grant_type=refresh_token` call, and replaces the user's record with the new pair. Any
//! failure leaves the stored record untouched and yields `None`, so callers only ever see
//! "new access token" or "absent".

mod metrics;

pub use metrics::{RefreshCounts, RefreshMetrics};

// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, UserId},
	flows::Linker,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	oauth::TokenGrant,
};

impl Linker {
	/// Exchanges the stored refresh token for a new pair and returns the new access token.
	///
	/// Returns `None` when the user has no record, the exchange fails, or the new pair cannot
	/// be persisted.
	pub async fn refresh(&self, user_id: UserId) -> Option<TokenSecret> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh").with_user(user_id);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.refresh_metrics.begin();

		let result = span.instrument(self.refresh_inner(user_id)).await;

		self.refresh_metrics.finish(matches!(result, Ok(Some(_))));

		match &result {
			Ok(Some(_)) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Ok(None) => obs::record_flow_outcome(KIND, FlowOutcome::Skipped),
			Err(e) => {
				tracing::warn!(user_id = %user_id, error = %e, "token refresh failed");
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result.ok().flatten()
	}

	async fn refresh_inner(&self, user_id: UserId) -> Result<Option<TokenSecret>> {
		let Some(current) = self.store.fetch(user_id).await? else {
			tracing::debug!(user_id = %user_id, "no stored tokens to refresh");

			return Ok(None);
		};
		let TokenGrant { access_token, refresh_token, expires_in } =
			self.facade.refresh_token(&current.refresh_token).await?;
		// Discord rotates refresh tokens; keep the old one if a response ever omits it.
		let refresh_token = refresh_token.unwrap_or(current.refresh_token);

		self.store.put(user_id, access_token.expose(), refresh_token.expose(), expires_in).await?;

		tracing::debug!(user_id = %user_id, expires_in = expires_in.whole_seconds(), "token refreshed");

		Ok(Some(access_token))
	}
}
