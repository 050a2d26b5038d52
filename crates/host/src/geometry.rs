/// An axis-aligned rectangle in CSS pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
	/// Left edge.
	pub x: f64,
	/// Top edge.
	pub y: f64,
	/// Width, non-negative.
	pub width: f64,
	/// Height, non-negative.
	pub height: f64,
}

impl Rect {
	/// Creates a rectangle, clamping negative dimensions to zero.
	#[must_use]
	pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
		Self {
			x,
			y,
			width: width.max(0.0),
			height: height.max(0.0),
		}
	}

	/// Returns this rectangle shifted by a frame offset.
	///
	/// Used to translate geometry computed inside a nested context into the
	/// coordinate space of an ancestor context.
	#[must_use]
	pub fn translated(self, offset: FrameOffset) -> Self {
		Self {
			x: self.x + offset.dx,
			y: self.y + offset.dy,
			..self
		}
	}
}

/// Offset of a nested context's viewport within its parent context.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameOffset {
	/// Horizontal offset in parent CSS pixels.
	pub dx: f64,
	/// Vertical offset in parent CSS pixels.
	pub dy: f64,
}

impl FrameOffset {
	/// Creates a frame offset.
	#[must_use]
	pub const fn new(dx: f64, dy: f64) -> Self {
		Self { dx, dy }
	}
}

#[cfg(test)]
mod tests {
	use super::{FrameOffset, Rect};

	#[test]
	fn new_rect_clamps_negative_dimensions() {
		let rect = Rect::new(4.0, 2.0, -3.0, -1.0);
		assert_eq!(rect.width, 0.0);
		assert_eq!(rect.height, 0.0);
	}

	#[test]
	fn translated_shifts_origin_only() {
		let rect = Rect::new(1.0, 2.0, 3.0, 4.0).translated(FrameOffset::new(10.0, 20.0));
		assert_eq!(rect, Rect::new(11.0, 22.0, 3.0, 4.0));
	}
}
