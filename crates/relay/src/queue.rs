//! FIFO-completion ordering queue.

use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Serializes the *completions* of submitted tasks.
///
/// Tasks start immediately and run concurrently — each is an independent
/// round trip with its own latency — but no task's completion becomes
/// observable (its handle resolves, its output is released) before every
/// earlier task has completed. This is a "complete in order" barrier, not
/// just "start in order": a rapid open-then-close must never settle as
/// close-before-open, which would leave a dangling visible surface.
pub struct OrderQueue {
	tail: Mutex<Option<oneshot::Receiver<()>>>,
}

impl Default for OrderQueue {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for OrderQueue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OrderQueue").finish_non_exhaustive()
	}
}

impl OrderQueue {
	/// Creates an empty queue.
	#[must_use]
	pub fn new() -> Self {
		Self { tail: Mutex::new(None) }
	}

	/// Submits a task. The returned handle resolves with the task's output
	/// once the task *and every earlier task* have completed.
	pub fn push<F>(&self, task: F) -> JoinHandle<F::Output>
	where
		F: Future + Send + 'static,
		F::Output: Send + 'static,
	{
		let (done_tx, done_rx) = oneshot::channel();
		let previous = self.tail.lock().replace(done_rx);
		tokio::spawn(async move {
			let output = task.await;
			if let Some(previous) = previous {
				// A dropped predecessor counts as settled.
				let _ = previous.await;
			}
			let _ = done_tx.send(());
			output
		})
	}
}
