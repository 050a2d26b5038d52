//! Surface state machine types.

use std::time::Duration;

use inlay_host::{Rect, SurfaceKind};
use inlay_port::SurfaceAction;

/// Lifecycle phase of an embedded surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	/// Hidden, nothing in flight.
	Closed,
	/// An open is waiting on readiness or its prepare guard.
	Opening,
	/// Visible.
	Open,
	/// A close is notifying the embedded surface.
	Closing,
}

/// Observable state of a surface at one point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSnapshot {
	/// Current lifecycle phase.
	pub phase: Phase,
	/// The embedded document signalled it has initialized.
	pub loaded: bool,
	/// A bidirectional message channel is established.
	pub ready: bool,
	/// The surface is shown. Implies `ready`, which implies `loaded`.
	pub visible: bool,
	/// Current position, while visible.
	pub position: Option<Rect>,
	/// An abortable open is in flight.
	pub pending: bool,
}

impl SurfaceSnapshot {
	/// Returns true when the `visible ⇒ ready ⇒ loaded` chain holds.
	#[must_use]
	pub fn chain_holds(&self) -> bool {
		(!self.visible || self.ready) && (!self.ready || self.loaded)
	}
}

/// Options carried on a close so subscribers can decide what to do with
/// the interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CloseOptions {
	/// Treat the interaction as abandoned.
	pub discard: bool,
	/// Return keyboard focus to the anchor.
	pub refocus: bool,
}

/// Event emitted on surface open/close boundaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceEvent {
	/// The surface became visible.
	Opened {
		/// The surface that opened.
		kind: SurfaceKind,
		/// The action it is showing.
		action: SurfaceAction,
	},
	/// The surface was hidden. Emitted exactly once per visible run.
	Closed {
		/// The surface that closed.
		kind: SurfaceKind,
		/// The interaction was abandoned.
		discard: bool,
		/// Focus should return to the anchor.
		refocus: bool,
	},
}

/// Controller tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceConfig {
	/// Bounded wait for the embedded document to become ready before an
	/// open is abandoned.
	pub ready_timeout: Duration,
}

impl Default for SurfaceConfig {
	fn default() -> Self {
		Self {
			ready_timeout: Duration::from_secs(2),
		}
	}
}
