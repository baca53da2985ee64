//! OAuth callback completion and the first metadata push.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	discord::{DiscordUser, PushOutcome},
	error::ConfigError,
	flows::{Linker, common},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// How the first metadata push for a user ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkVerdict {
	/// At least one tracked role is held and the push succeeded.
	Granted,
	/// No tracked role is held; an all-zero map was pushed.
	NoRoles,
	/// The role lookup or the metadata push failed.
	Error,
}

/// Result of a completed OAuth callback.
#[derive(Clone, Debug)]
pub struct LinkReport {
	/// Identity that linked their account.
	pub user: DiscordUser,
	/// Outcome of [`Linker::initial_link`].
	pub verdict: LinkVerdict,
}
impl LinkReport {
	/// `true` when the badge was granted.
	pub fn granted(&self) -> bool {
		self.verdict == LinkVerdict::Granted
	}
}

impl Linker {
	/// Completes the authorize redirect: validates `state`, exchanges `code`, identifies the
	/// user, stores their tokens, and runs [`Linker::initial_link`].
	pub async fn complete_login(&self, code: &str, state: &str) -> Result<LinkReport> {
		const KIND: FlowKind = FlowKind::Link;

		let span = FlowSpan::new(KIND, "complete_login");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<LinkReport> = span
			.instrument(async move {
				self.logins.redeem(state, OffsetDateTime::now_utc())?;

				let grant = self.facade.exchange_code(code, &self.client.redirect_uri).await?;
				let refresh_token = grant.refresh_token.ok_or(ConfigError::MissingRefreshToken)?;
				let user = self.api.current_user(&grant.access_token).await?;

				self.store
					.put(
						user.id,
						grant.access_token.expose(),
						refresh_token.expose(),
						grant.expires_in,
					)
					.await?;

				tracing::info!(user_id = %user.id, user = %user.tag(), "tokens stored");

				let verdict = self.link_verdict(&user, &grant.access_token).await;

				Ok(LinkReport { user, verdict })
			})
			.await;

		match &result {
			Ok(report) if report.granted() => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			_ => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Pushes the user's current role metadata with a freshly issued access token.
	///
	/// Without any tracked role an all-zero map is pushed to clear the badge and `false` is
	/// returned. Lookup and push failures also yield `false`; nothing is retried.
	pub async fn initial_link(&self, user: &DiscordUser, access_token: &TokenSecret) -> bool {
		self.link_verdict(user, access_token).await == LinkVerdict::Granted
	}

	async fn link_verdict(&self, user: &DiscordUser, access_token: &TokenSecret) -> LinkVerdict {
		let span = FlowSpan::new(FlowKind::Link, "initial_link").with_user(user.id);

		span.instrument(async move {
			let tag = user.tag();
			let roles = match self.directory.member_roles(user.id).await {
				Ok(roles) => roles,
				Err(e) => {
					tracing::warn!(user_id = %user.id, error = %e, "member role lookup failed");
					self.notifier.notify(common::verification_error(&tag, user.id)).await;

					return LinkVerdict::Error;
				},
			};
			let metadata = self.roles.derive_metadata(&roles);
			let outcome = self.api.push(user.id, access_token, &metadata).await;

			if !metadata.any_granted() {
				tracing::info!(user_id = %user.id, ?outcome, "no tracked roles; badge cleared");
				self.notifier.notify(common::verification_failed(&tag, user.id)).await;

				return LinkVerdict::NoRoles;
			}
			if outcome != PushOutcome::Success {
				tracing::warn!(user_id = %user.id, ?outcome, "initial metadata push failed");
				self.notifier.notify(common::verification_error(&tag, user.id)).await;

				return LinkVerdict::Error;
			}

			tracing::info!(user_id = %user.id, metadata = ?metadata, "badge granted");
			self.notifier.notify(common::verification_success(&tag, user.id)).await;

			LinkVerdict::Granted
		})
		.await
	}
}
