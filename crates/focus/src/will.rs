//! The grace flag distinguishing intentional focus transfers from real blurs.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Shared flag marking that focus is about to move into an embedded surface.
///
/// While the flag is active, window-blur events are the expected side effect
/// of the focus transfer itself and must not be read as the user leaving the
/// page. The flag expires on its own; nothing needs to clear it on the happy
/// path.
#[derive(Debug, Clone, Default)]
pub struct FocusWill {
	expiry: Arc<Mutex<Option<Instant>>>,
}

impl FocusWill {
	/// Creates an inactive flag.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Arms the flag for the next `grace` period.
	pub fn arm(&self, grace: Duration) {
		*self.expiry.lock() = Some(Instant::now() + grace);
	}

	/// Returns true while the grace period is running.
	#[must_use]
	pub fn active(&self) -> bool {
		matches!(*self.expiry.lock(), Some(expiry) if Instant::now() < expiry)
	}

	/// Disarms the flag early, e.g. when the surface closes before focus
	/// ever moved.
	pub fn clear(&self) {
		*self.expiry.lock() = None;
	}
}
