//! Observability helpers for linking flows.
//!
//! # Feature Flags
//!
//! - Spans named `linked_roles.flow` carry the `flow`, `stage`, and `user_id` fields and are
//!   always emitted through `tracing`.
//! - Enable `metrics` to increment the `linked_roles_flow_total` counter for every
//!   attempt/success/failure/skip, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flows observed by the linker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// OAuth callback through the first metadata push.
	Link,
	/// Refresh token exchange.
	Refresh,
	/// Role-change driven re-sync.
	Resync,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Link => "link",
			FlowKind::Refresh => "refresh",
			FlowKind::Resync => "resync",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Terminal failure.
	Failure,
	/// Nothing to do for this user.
	Skipped,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
			FlowOutcome::Skipped => "skipped",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
