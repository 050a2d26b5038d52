use tokio::sync::broadcast;

use crate::ids::ElementId;

/// A host-document UI event the engine reacts to.
///
/// These are the auto-close triggers plus overlay lifecycle notifications;
/// listener registration mechanics live outside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
	/// The window was resized.
	Resize,
	/// The window or a scroll container scrolled.
	Scroll {
		/// The scrolled container, `None` for the window itself.
		container: Option<ElementId>,
	},
	/// Browser history navigation occurred.
	Navigation,
	/// The page is unloading.
	Unload,
	/// The window lost focus (e.g. tab switch).
	WindowBlur,
	/// The window regained focus.
	WindowFocus,
	/// A mouse-down landed on the page.
	MouseDown {
		/// The element under the pointer.
		target: ElementId,
	},
	/// The host page removed the overlay root from the document.
	OverlayRootRemoved,
}

/// Broadcast stream of [`HostEvent`]s for one execution context.
#[derive(Debug, Clone)]
pub struct HostEvents {
	tx: broadcast::Sender<HostEvent>,
}

impl Default for HostEvents {
	fn default() -> Self {
		Self::new()
	}
}

impl HostEvents {
	/// Creates an event stream.
	#[must_use]
	pub fn new() -> Self {
		let (tx, _) = broadcast::channel(64);
		Self { tx }
	}

	/// Subscribes to events emitted after this call.
	#[must_use]
	pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
		self.tx.subscribe()
	}

	/// Emits an event to all current subscribers.
	pub fn emit(&self, event: HostEvent) {
		// No subscribers is fine: nothing is attached right now.
		let _ = self.tx.send(event);
	}
}
