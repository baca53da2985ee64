//! Role-change detection and per-user ordered dispatch.
//!
//! The gateway reader feeds member updates into [`MemberRoleCache`], which reports a
//! [`RoleChange`] only when a member's role set actually differs. Changes are then handed to
//! [`RoleEventQueue`], which keeps one FIFO lane per user: lanes for different users drain
//! concurrently, while a single user's changes are handled strictly in arrival order.

// std
use std::collections::BTreeSet;
// crates.io
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
// self
use crate::{
	_prelude::*,
	auth::{RoleId, UserId},
};

/// Boxed future returned by [`RoleChangeHandler::handle`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a + Send>>;

/// A member's role set moved from `previous` to `current`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleChange {
	/// Member whose roles changed.
	pub user_id: UserId,
	/// Cached role set before the update; `None` when the member was not cached.
	pub previous: Option<BTreeSet<RoleId>>,
	/// Role set carried by the update.
	pub current: BTreeSet<RoleId>,
}
impl RoleChange {
	/// Current roles as a list, in ascending id order.
	pub fn current_roles(&self) -> Vec<RoleId> {
		self.current.iter().copied().collect()
	}
}

/// Consumer of role changes.
pub trait RoleChangeHandler
where
	Self: Send + Sync,
{
	/// Processes a single change to completion.
	fn handle(&self, change: RoleChange) -> HandlerFuture<'_>;
}

/// Last known role set per guild member.
#[derive(Clone, Debug, Default)]
pub struct MemberRoleCache(Arc<RwLock<HashMap<UserId, BTreeSet<RoleId>>>>);
impl MemberRoleCache {
	/// Records roles without reporting a change (initial guild snapshot).
	pub fn seed<I>(&self, user_id: UserId, roles: I)
	where
		I: IntoIterator<Item = RoleId>,
	{
		self.0.write().insert(user_id, roles.into_iter().collect());
	}

	/// Stores `roles` and returns the change when they differ from the cached set.
	///
	/// A member seen for the first time counts as changed.
	pub fn observe<I>(&self, user_id: UserId, roles: I) -> Option<RoleChange>
	where
		I: IntoIterator<Item = RoleId>,
	{
		let current: BTreeSet<RoleId> = roles.into_iter().collect();
		let previous = self.0.write().insert(user_id, current.clone());

		if previous.as_ref() == Some(&current) {
			return None;
		}

		Some(RoleChange { user_id, previous, current })
	}

	/// Drops a member that left the guild.
	pub fn forget(&self, user_id: UserId) {
		self.0.write().remove(&user_id);
	}

	/// Cached roles for `user_id`.
	pub fn get(&self, user_id: UserId) -> Option<BTreeSet<RoleId>> {
		self.0.read().get(&user_id).cloned()
	}

	/// Number of cached members.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// `true` when no member is cached.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}

type Lanes = Arc<Mutex<HashMap<UserId, UnboundedSender<RoleChange>>>>;

/// Per-user FIFO dispatcher backed by tokio tasks.
pub struct RoleEventQueue {
	handler: Arc<dyn RoleChangeHandler>,
	lanes: Lanes,
}
impl RoleEventQueue {
	/// Creates a queue delivering changes to `handler`.
	pub fn new(handler: Arc<dyn RoleChangeHandler>) -> Self {
		Self { handler, lanes: Arc::default() }
	}

	/// Appends `change` to its user's lane, spawning a worker when the lane is idle.
	///
	/// Must be called from within a tokio runtime.
	pub fn enqueue(&self, change: RoleChange) {
		let user_id = change.user_id;
		let mut lanes = self.lanes.lock();
		// A worker that closed its receiver has already unregistered the lane under this
		// lock, so a live sender always reaches a running worker.
		let change = match lanes.get(&user_id) {
			Some(sender) => match sender.send(change) {
				Ok(()) => return,
				Err(mpsc::error::SendError(change)) => change,
			},
			None => change,
		};
		let (sender, receiver) = mpsc::unbounded_channel();

		if sender.send(change).is_err() {
			return;
		}

		lanes.insert(user_id, sender);
		drop(lanes);

		tracing::debug!(user_id = %user_id, "role event lane opened");
		tokio::spawn(Self::drain(user_id, receiver, self.handler.clone(), self.lanes.clone()));
	}

	/// Number of users with an active lane.
	pub fn pending_lanes(&self) -> usize {
		self.lanes.lock().len()
	}

	async fn drain(
		user_id: UserId,
		mut receiver: UnboundedReceiver<RoleChange>,
		handler: Arc<dyn RoleChangeHandler>,
		lanes: Lanes,
	) {
		loop {
			let next = match receiver.try_recv() {
				Ok(change) => change,
				Err(_) => {
					let mut guard = lanes.lock();

					// Re-check under the lock so no enqueued change is stranded.
					match receiver.try_recv() {
						Ok(change) => {
							drop(guard);

							change
						},
						Err(_) => {
							guard.remove(&user_id);
							receiver.close();

							tracing::debug!(user_id = %user_id, "role event lane closed");

							return;
						},
					}
				},
			};

			handler.handle(next).await;
		}
	}
}
impl Debug for RoleEventQueue {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RoleEventQueue").field("lanes", &self.pending_lanes()).finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::time::Duration as StdDuration;
	// self
	use super::*;

	fn user(raw: u64) -> UserId {
		UserId::new(raw).expect("User fixture should be valid.")
	}

	fn roles(raw: &[u64]) -> Vec<RoleId> {
		raw.iter().map(|id| RoleId::new(*id).expect("Role fixture should be valid.")).collect()
	}

	#[derive(Default)]
	struct Recorder {
		seen: Mutex<Vec<(UserId, Vec<RoleId>)>>,
	}
	impl RoleChangeHandler for Recorder {
		fn handle(&self, change: RoleChange) -> HandlerFuture<'_> {
			Box::pin(async move {
				// Yield so lanes for different users interleave.
				tokio::time::sleep(StdDuration::from_millis(2)).await;

				self.seen.lock().push((change.user_id, change.current_roles()));
			})
		}
	}

	#[test]
	fn cache_reports_only_real_changes() {
		let cache = MemberRoleCache::default();

		cache.seed(user(1), roles(&[10, 11]));

		assert!(cache.observe(user(1), roles(&[11, 10])).is_none());

		let change = cache.observe(user(1), roles(&[10])).expect("Dropping a role is a change.");

		assert_eq!(change.previous, Some(roles(&[10, 11]).into_iter().collect()));
		assert_eq!(change.current_roles(), roles(&[10]));

		let first_sight =
			cache.observe(user(2), roles(&[12])).expect("Unknown members count as changed.");

		assert!(first_sight.previous.is_none());

		cache.forget(user(2));

		assert!(cache.get(user(2)).is_none());
		assert_eq!(cache.len(), 1);
	}

	#[tokio::test]
	async fn queue_preserves_per_user_order() {
		let recorder = Arc::new(Recorder::default());
		let queue = RoleEventQueue::new(recorder.clone());

		for step in 1..=5 {
			for raw_user in [1, 2] {
				queue.enqueue(RoleChange {
					user_id: user(raw_user),
					previous: None,
					current: roles(&[step]).into_iter().collect(),
				});
			}
		}

		for _ in 0..200 {
			if recorder.seen.lock().len() == 10 && queue.pending_lanes() == 0 {
				break;
			}

			tokio::time::sleep(StdDuration::from_millis(5)).await;
		}

		let seen = recorder.seen.lock().clone();

		assert_eq!(seen.len(), 10);
		assert_eq!(queue.pending_lanes(), 0);

		for raw_user in [1, 2] {
			let order: Vec<_> = seen
				.iter()
				.filter(|(user_id, _)| *user_id == user(raw_user))
				.map(|(_, roles)| roles[0].get())
				.collect();

			assert_eq!(order, vec![1, 2, 3, 4, 5]);
		}
	}
}
