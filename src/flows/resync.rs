//! Role-change driven re-sync with the bounded refresh-and-retry policy.
//!
//! `Start -> (maybe Refresh) -> Push -> [on Unauthorized: Refresh -> Push] -> Terminal`.
//! A token expiring within [`PREEMPTIVE_WINDOW`] is refreshed before the first push. A 401
//! earns exactly one more refresh and one more push; nothing else is retried.

// self
use crate::{
	_prelude::*,
	auth::{RoleId, TokenSecret, UserId},
	discord::PushOutcome,
	flows::{Linker, PREEMPTIVE_WINDOW, common},
	notify::Notice,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	roles::RoleMetadata,
};

/// Terminal state of [`Linker::auto_resync`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncOutcome {
	/// Metadata pushed and at least one tracked role is granted.
	Success,
	/// Metadata pushed with every flag at zero.
	Cleared,
	/// A refresh or push failed.
	Failure,
	/// The user never linked; nothing was attempted.
	Skipped,
}
impl SyncOutcome {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			SyncOutcome::Success => "success",
			SyncOutcome::Cleared => "cleared",
			SyncOutcome::Failure => "failure",
			SyncOutcome::Skipped => "skipped",
		}
	}
}
impl Display for SyncOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

enum Resolution {
	Synced(SyncOutcome, RoleMetadata),
	Skipped,
	Failed(&'static str),
}

impl Linker {
	/// Re-pushes metadata for `user_id` after their roles changed to `roles`.
	///
	/// Every outcome except [`SyncOutcome::Skipped`] is reported through the notifier.
	pub async fn auto_resync(&self, user_id: UserId, roles: &[RoleId]) -> SyncOutcome {
		const KIND: FlowKind = FlowKind::Resync;

		let span = FlowSpan::new(KIND, "auto_resync").with_user(user_id);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let (outcome, notice) = match span.instrument(self.resync_inner(user_id, roles)).await {
			Resolution::Skipped => {
				tracing::debug!(user_id = %user_id, "role change for unlinked user skipped");
				obs::record_flow_outcome(KIND, FlowOutcome::Skipped);

				return SyncOutcome::Skipped;
			},
			Resolution::Synced(SyncOutcome::Cleared, _) =>
				(SyncOutcome::Cleared, common::badge_cleared(user_id)),
			Resolution::Synced(outcome, metadata) =>
				(outcome, common::roles_updated(user_id, &metadata)),
			Resolution::Failed(reason) => {
				tracing::warn!(user_id = %user_id, reason, "role re-sync failed");

				(SyncOutcome::Failure, common::update_failed(user_id, reason))
			},
		};

		obs::record_flow_outcome(
			KIND,
			if outcome == SyncOutcome::Failure { FlowOutcome::Failure } else { FlowOutcome::Success },
		);
		tracing::info!(user_id = %user_id, outcome = %outcome, "role re-sync finished");

		self.report(notice).await;

		outcome
	}

	async fn resync_inner(&self, user_id: UserId, roles: &[RoleId]) -> Resolution {
		let record = match self.store.fetch(user_id).await {
			Ok(Some(record)) => record,
			Ok(None) => return Resolution::Skipped,
			Err(e) => {
				tracing::error!(user_id = %user_id, error = %e, "token store read failed");

				return Resolution::Failed("the token store could not be read");
			},
		};
		let access_token = if record.needs_refresh_at(OffsetDateTime::now_utc(), PREEMPTIVE_WINDOW)
		{
			match self.refresh(user_id).await {
				Some(token) => token,
				None => return Resolution::Failed("the expiring access token could not be refreshed"),
			}
		} else {
			record.access_token
		};
		let metadata = self.roles.derive_metadata(roles);

		match self.push_with_retry(user_id, access_token, &metadata).await {
			Ok(()) => {
				let outcome =
					if metadata.any_granted() { SyncOutcome::Success } else { SyncOutcome::Cleared };

				Resolution::Synced(outcome, metadata)
			},
			Err(reason) => Resolution::Failed(reason),
		}
	}

	async fn push_with_retry(
		&self,
		user_id: UserId,
		access_token: TokenSecret,
		metadata: &RoleMetadata,
	) -> Result<(), &'static str> {
		match self.api.push(user_id, &access_token, metadata).await {
			PushOutcome::Success => Ok(()),
			PushOutcome::Failure => Err("Discord rejected the metadata push"),
			PushOutcome::Unauthorized => {
				tracing::debug!(user_id = %user_id, "access token rejected; refreshing once");

				let Some(fresh) = self.refresh(user_id).await else {
					return Err("the rejected access token could not be refreshed");
				};

				match self.api.push(user_id, &fresh, metadata).await {
					PushOutcome::Success => Ok(()),
					PushOutcome::Unauthorized =>
						Err("the refreshed access token was also rejected"),
					PushOutcome::Failure => Err("Discord rejected the retried metadata push"),
				}
			},
		}
	}

	async fn report(&self, notice: Notice) {
		self.notifier.notify(notice).await;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn outcome_labels_are_stable() {
		let labels = [
			SyncOutcome::Success,
			SyncOutcome::Cleared,
			SyncOutcome::Failure,
			SyncOutcome::Skipped,
		]
		.map(|outcome| outcome.to_string());

		assert_eq!(labels, ["success", "cleared", "failure", "skipped"]);
	}
}
