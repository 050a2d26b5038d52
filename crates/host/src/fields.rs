use crate::geometry::{FrameOffset, Rect};
use crate::ids::ElementId;

/// Geometry and per-field cleanup capabilities of the current context.
pub trait Fields: Send + Sync {
	/// Returns the on-screen rectangle of an element relative to this
	/// context's viewport, or `None` if the element is gone.
	fn anchor_rect(&self, element: ElementId) -> Option<Rect>;

	/// Returns the offset of this context's viewport within its parent.
	///
	/// The top-level context reports a zero offset.
	fn frame_offset(&self) -> FrameOffset;

	/// Returns the visual icon element attached to a field, if any.
	fn icon_of(&self, field: ElementId) -> Option<ElementId>;

	/// Detaches the visual icon from a field.
	fn detach_icon(&self, field: ElementId);
}
