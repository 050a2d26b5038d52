//! The anchor registry.

use std::sync::Arc;

use inlay_host::{Anchor, ElementId, Fields, FocusOracle};
use inlay_port::{DownMessage, PortSender};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

struct Attached {
	anchor: Anchor,
	listeners: CancellationToken,
}

/// Tracks the anchor the suggestions surface is currently attached to.
///
/// At most one anchor is attached at a time. Attaching a new anchor cancels
/// the previous anchor's auto-close listeners, so listeners never
/// accumulate across open/close cycles; the listener tasks themselves are
/// spawned by the coordinator against the token stored here.
pub struct AnchorRegistry {
	fields: Arc<dyn Fields>,
	oracle: Arc<dyn FocusOracle>,
	current: Mutex<Option<Attached>>,
}

impl AnchorRegistry {
	/// Creates an empty registry over the document's capabilities.
	#[must_use]
	pub fn new(fields: Arc<dyn Fields>, oracle: Arc<dyn FocusOracle>) -> Self {
		Self {
			fields,
			oracle,
			current: Mutex::new(None),
		}
	}

	/// Attaches an anchor, replacing and unlistening any previous one.
	pub fn attach(&self, anchor: Anchor, listeners: CancellationToken) {
		let previous = self.current.lock().replace(Attached { anchor, listeners });
		if let Some(previous) = previous {
			previous.listeners.cancel();
		}
	}

	/// Detaches the current anchor, cancelling its listeners. Returns the
	/// anchor so the caller can run its close effects.
	pub fn detach(&self) -> Option<Anchor> {
		let attached = self.current.lock().take()?;
		attached.listeners.cancel();
		Some(attached.anchor)
	}

	/// Returns the currently attached anchor.
	#[must_use]
	pub fn current(&self) -> Option<Anchor> {
		self.current.lock().as_ref().map(|attached| attached.anchor)
	}

	/// Returns true when attaching `incoming` would replace the current
	/// anchor. No current anchor always counts as a change.
	#[must_use]
	pub fn will_change(&self, incoming: &Anchor) -> bool {
		self.current().is_none_or(|current| current.will_change(incoming))
	}

	/// Returns true when a mouse-down on `target` counts as a click on the
	/// page backdrop rather than on the anchored ensemble.
	///
	/// The exclusion list is exactly the anchor element, its inline icon,
	/// and the nested-context host element; everything else closes.
	#[must_use]
	pub fn is_backdrop_click(&self, target: ElementId) -> bool {
		let Some(anchor) = self.current() else {
			return false;
		};
		match anchor {
			Anchor::Local(field) => target != field && Some(target) != self.fields.icon_of(field),
			Anchor::Remote { container_id, .. } => target != container_id,
		}
	}

	/// Runs the close effects for a detached anchor.
	///
	/// A local anchor is cleaned up directly; a remote anchor's cleanup is
	/// delegated to its context, routed through the immediate child port.
	pub fn close_effects(&self, anchor: &Anchor, refocus: bool, child: Option<&PortSender<DownMessage>>) {
		match *anchor {
			Anchor::Local(field) => {
				self.fields.detach_icon(field);
				if refocus {
					self.oracle.focus(field);
				}
			}
			Anchor::Remote { .. } => {
				let message = DownMessage::CloseAnchor {
					key: anchor.key(),
					refocus,
				};
				match child {
					Some(child) => {
						if child.send(message).is_err() {
							tracing::debug!(?anchor, "anchor's context is gone, skipping remote cleanup");
						}
					}
					None => tracing::debug!(?anchor, "no route to the anchor's context, skipping remote cleanup"),
				}
			}
		}
	}
}

impl std::fmt::Debug for AnchorRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AnchorRegistry").field("current", &self.current()).finish_non_exhaustive()
	}
}
