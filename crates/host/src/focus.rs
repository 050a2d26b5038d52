use std::time::Duration;

use crate::ids::{ElementId, SurfaceKind};

/// What currently holds document-level keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusHolder {
	/// The document body or root holds focus.
	Body,
	/// A non-focusable element holds focus.
	NonFocusable,
	/// A page element holds focus.
	Element(ElementId),
	/// The root element of one of our embedded surfaces holds focus.
	SurfaceRoot(SurfaceKind),
}

impl FocusHolder {
	/// Returns true when focus counts as released for the arbiter's poll.
	#[must_use]
	pub fn is_released(self) -> bool {
		matches!(self, Self::Body | Self::NonFocusable)
	}
}

/// Observation and manipulation of document focus.
pub trait FocusOracle: Send + Sync {
	/// Returns the current focus holder.
	fn holder(&self) -> FocusHolder;

	/// Blurs the element if it currently holds focus.
	///
	/// Host-page scripts may immediately re-claim focus; callers must
	/// re-observe [`FocusOracle::holder`] rather than assume success.
	fn blur(&self, element: ElementId);

	/// Moves focus to the element.
	fn focus(&self, element: ElementId);
}

/// Temporary lock on the sibling interactive elements of a form field.
///
/// Dropping the guard releases the lock; every arbiter exit path holds its
/// guard on the stack so no lock can outlive the arbitration.
pub struct LockGuard {
	release: Option<Box<dyn FnOnce() + Send>>,
}

impl LockGuard {
	/// Creates a guard running `release` when dropped.
	#[must_use]
	pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
		Self {
			release: Some(Box::new(release)),
		}
	}

	/// Creates a guard that releases nothing.
	#[must_use]
	pub fn noop() -> Self {
		Self { release: None }
	}
}

impl Drop for LockGuard {
	fn drop(&mut self) {
		if let Some(release) = self.release.take() {
			release();
		}
	}
}

impl std::fmt::Debug for LockGuard {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LockGuard").field("armed", &self.release.is_some()).finish()
	}
}

/// Locking of sibling fields while focus is being wrestled from the page.
///
/// Stops the host page from auto-advancing focus to a neighboring field
/// during a blur. `window` bounds how long the host may keep the lock even
/// if the guard leaks.
pub trait FieldLocker: Send + Sync {
	/// Locks the siblings of `field`, returning the release guard.
	fn lock_siblings(&self, field: ElementId, window: Duration) -> LockGuard;
}
