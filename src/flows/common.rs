//! Shared constants and notice wording for flow implementations.

// self
use crate::{
	_prelude::*,
	auth::UserId,
	notify::{Notice, NoticeKind},
	roles::RoleMetadata,
};

/// Tokens expiring within this window are refreshed before a push.
pub const PREEMPTIVE_WINDOW: Duration = Duration::seconds(60);
/// Lifetime of a pending login `state`.
pub const LOGIN_TTL: Duration = Duration::minutes(10);
/// Upper bound on login `state` values awaiting a callback.
pub const MAX_PENDING_LOGINS: usize = 10_000;
/// Scopes requested on the authorize page; `offline` yields a refresh token.
pub const OAUTH_SCOPES: &str = "identify role_connections.write offline";

pub(crate) fn verification_success(tag: &str, user_id: UserId) -> Notice {
	Notice::new(
		NoticeKind::Success,
		"Verification Success",
		format!("User **{tag}** (`{user_id}`) successfully linked their roles."),
	)
}

pub(crate) fn verification_failed(tag: &str, user_id: UserId) -> Notice {
	Notice::new(
		NoticeKind::Failure,
		"Verification Failed",
		format!(
			"User **{tag}** (`{user_id}`) attempted to link their roles but had no required roles."
		),
	)
}

pub(crate) fn verification_error(tag: &str, user_id: UserId) -> Notice {
	Notice::new(
		NoticeKind::Failure,
		"Verification Error",
		format!("User **{tag}** (`{user_id}`) could not be verified: the role lookup or metadata push failed."),
	)
}

pub(crate) fn roles_updated(user_id: UserId, metadata: &RoleMetadata) -> Notice {
	let granted = metadata.granted_keys().collect::<Vec<_>>().join(", ");

	Notice::new(
		NoticeKind::Success,
		"Roles Updated",
		format!("Role connection for <@{user_id}> (`{user_id}`) now grants: {granted}."),
	)
}

pub(crate) fn badge_cleared(user_id: UserId) -> Notice {
	Notice::new(
		NoticeKind::Cleared,
		"Badge Cleared",
		format!("<@{user_id}> (`{user_id}`) no longer holds a tracked role; their badge was cleared."),
	)
}

pub(crate) fn update_failed(user_id: UserId, reason: &str) -> Notice {
	Notice::new(
		NoticeKind::Failure,
		"Role Update Failed",
		format!("Could not update the role connection for <@{user_id}> (`{user_id}`): {reason}."),
	)
}
