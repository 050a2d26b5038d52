use crate::ids::ElementId;

/// Ownership of the single shared overlay root element per document.
///
/// The overlay root is the parent of both embedded surfaces. It normally
/// lives directly under the document root, but host pages that trap focus
/// inside their own modal subtree require the root to be relocated into
/// that subtree to remain interactive.
pub trait OverlayHost: Send + Sync {
	/// Mounts the overlay root under the given subtree, or under the
	/// document root when `None`. Remounting moves an existing root.
	fn mount_root(&self, under: Option<ElementId>);

	/// Removes the overlay root from the document.
	fn unmount_root(&self);

	/// Returns the subtree the root is currently mounted under.
	fn current_mount(&self) -> Option<ElementId>;

	/// Returns true while the root element is attached to the document.
	///
	/// The host page may detach it at any time; detachment is also
	/// reported as [`crate::HostEvent::OverlayRootRemoved`].
	fn root_attached(&self) -> bool;

	/// Returns the nearest ancestor focus-trap/modal subtree of an
	/// element, detected via the known marker attributes, if any.
	fn trap_root_for(&self, element: ElementId) -> Option<ElementId>;

	/// Returns true when the overlay root is the document's top-most
	/// interactive layer. Used to reject synthetic messages forwarded
	/// while a different modal has focus.
	fn is_top_layer(&self) -> bool;
}
