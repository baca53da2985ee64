// crates.io
use tracing::{Instrument, Span, field, instrument::Instrumented};
use tracing_subscriber::EnvFilter;
// self
use crate::{_prelude::*, auth::UserId, obs::FlowKind};

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,linked_roles=debug";

/// Span wrapper used by linking flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	span: Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		let span = tracing::info_span!(
			"linked_roles.flow",
			flow = kind.as_str(),
			stage,
			user_id = field::Empty
		);

		Self { span }
	}

	/// Records the user the flow acts on.
	pub fn with_user(self, user_id: UserId) -> Self {
		self.span.record("user_id", field::display(user_id));

		self
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}

/// Installs the global fmt subscriber honouring `RUST_LOG`.
///
/// Does nothing when a global subscriber is already set.
pub fn install_subscriber() {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

	if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
		tracing::debug!("global subscriber already installed");
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_wraps_future() {
		let user_id = UserId::new(42).expect("User fixture should be valid.");
		let span = FlowSpan::new(FlowKind::Resync, "instrument_wraps_future").with_user(user_id);
		let value = FlowSpan::instrument(&span, async { 42 }).await;

		assert_eq!(value, 42);
	}

	#[test]
	fn install_subscriber_is_idempotent() {
		install_subscriber();
		install_subscriber();
	}
}
