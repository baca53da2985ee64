//! Operator-facing outcome notices.

// self
use crate::_prelude::*;

/// Boxed future returned by [`Notifier::notify`].
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a + Send>>;

/// Category of a notice; drives its colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
	/// The badge was granted or updated.
	Success,
	/// A technical problem prevented the update.
	Failure,
	/// The badge was cleared because no tracked role is held.
	Cleared,
}
impl NoticeKind {
	/// Embed colour (RGB) for the category.
	pub fn color(self) -> u32 {
		match self {
			NoticeKind::Success => 0x2ECC71,
			NoticeKind::Failure => 0xE74C3C,
			NoticeKind::Cleared => 0xE67E22,
		}
	}
}

/// Human-readable outcome record posted to the operations channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
	/// Short headline.
	pub title: String,
	/// Markdown body.
	pub description: String,
	/// Category.
	pub kind: NoticeKind,
}
impl Notice {
	/// Creates a notice.
	pub fn new(kind: NoticeKind, title: impl Into<String>, description: impl Into<String>) -> Self {
		Self { title: title.into(), description: description.into(), kind }
	}
}

/// Sink for outcome notices.
///
/// Delivery is best effort: implementations log and swallow their own failures.
pub trait Notifier
where
	Self: Send + Sync,
{
	/// Delivers `notice`.
	fn notify(&self, notice: Notice) -> NotifyFuture<'_>;
}

/// Notifier that only writes notices to the tracing log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;
impl Notifier for LogNotifier {
	fn notify(&self, notice: Notice) -> NotifyFuture<'_> {
		Box::pin(async move {
			tracing::info!(
				kind = ?notice.kind,
				title = %notice.title,
				description = %notice.description,
				"notice"
			);
		})
	}
}
