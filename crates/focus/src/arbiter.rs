//! The focus arbiter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use inlay_host::{Anchor, FieldLocker, FocusHolder, FocusOracle, LockGuard, SurfaceKind};

use crate::will::FocusWill;

/// Arbitration tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct FocusArbiterConfig {
	/// Delay between focus re-observations while the page fights back.
	pub poll_interval: Duration,
	/// Hard cap on re-observations before the page's trap is declared the
	/// winner.
	pub max_polls: u32,
	/// Upper bound the host may keep a sibling lock alive, independent of
	/// the guard.
	pub lock_window: Duration,
	/// Grace period armed on a grant, during which window blur is treated
	/// as the focus transfer itself.
	pub grace: Duration,
}

impl Default for FocusArbiterConfig {
	fn default() -> Self {
		Self {
			poll_interval: Duration::from_millis(25),
			max_polls: 20,
			lock_window: Duration::from_millis(500),
			grace: Duration::from_millis(300),
		}
	}
}

/// How one arbitration round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusOutcome {
	/// The surface already held focus; nothing to do.
	AlreadyHeld,
	/// Focus was released; the surface may take it now.
	Granted,
	/// The page kept re-claiming focus for the whole poll budget. No
	/// further attempts are made for this interaction.
	TrapWon,
}

/// Releases focus from an anchor living in a nested context.
///
/// The top level cannot blur a nested element itself; it asks the owning
/// context and learns whether the element was actually focused there.
#[async_trait]
pub trait RemoteFocusRelease: Send + Sync {
	/// Asks the anchor's context to blur it, returning whether it held
	/// focus at the time. A transport failure reads as `false`.
	async fn release(&self, anchor: &Anchor) -> bool;
}

/// Wrestles document focus away from the host page within a bounded budget.
pub struct FocusArbiter {
	oracle: Arc<dyn FocusOracle>,
	locker: Arc<dyn FieldLocker>,
	remote: Arc<dyn RemoteFocusRelease>,
	will: FocusWill,
	config: FocusArbiterConfig,
}

impl FocusArbiter {
	/// Creates an arbiter over the given capabilities.
	#[must_use]
	pub fn new(
		oracle: Arc<dyn FocusOracle>,
		locker: Arc<dyn FieldLocker>,
		remote: Arc<dyn RemoteFocusRelease>,
		will: FocusWill,
		config: FocusArbiterConfig,
	) -> Self {
		Self {
			oracle,
			locker,
			remote,
			will,
			config,
		}
	}

	/// Returns the grace flag armed on grants.
	#[must_use]
	pub fn will(&self) -> &FocusWill {
		&self.will
	}

	/// Acquires focus for `surface`, releasing it from `anchor` first.
	///
	/// Terminates within `max_polls` re-observations no matter how the page
	/// behaves. On [`FocusOutcome::Granted`] the grace flag is armed so the
	/// transfer's own blur events pass unremarked. The sibling lock taken
	/// for a local anchor is held on the stack for the whole arbitration
	/// and released on every exit path.
	pub async fn acquire(&self, surface: SurfaceKind, anchor: &Anchor) -> FocusOutcome {
		if self.oracle.holder() == FocusHolder::SurfaceRoot(surface) {
			return FocusOutcome::AlreadyHeld;
		}

		let _lock = match *anchor {
			Anchor::Local(field) => {
				// Lock siblings before blurring so the page cannot
				// auto-advance focus to a neighboring field.
				let guard = self.locker.lock_siblings(field, self.config.lock_window);
				self.oracle.blur(field);
				guard
			}
			Anchor::Remote { .. } => {
				let was_focused = self.remote.release(anchor).await;
				if !was_focused {
					tracing::debug!(?anchor, "remote anchor reported no focus to release");
				}
				LockGuard::noop()
			}
		};

		let mut polls = 0;
		while !self.oracle.holder().is_released() {
			if polls == self.config.max_polls {
				tracing::debug!(?surface, ?anchor, polls, "host page kept focus, conceding");
				return FocusOutcome::TrapWon;
			}
			tokio::time::sleep(self.config.poll_interval).await;
			polls += 1;
			// The page re-claimed focus for our own anchor; contest it.
			if let (Anchor::Local(field), FocusHolder::Element(holding)) = (*anchor, self.oracle.holder())
				&& holding == field
			{
				self.oracle.blur(field);
			}
		}

		self.will.arm(self.config.grace);
		FocusOutcome::Granted
	}
}

impl std::fmt::Debug for FocusArbiter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FocusArbiter").field("config", &self.config).finish_non_exhaustive()
	}
}
