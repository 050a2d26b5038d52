/// Identifier of one isolated execution context within a host document.
///
/// The top-level context and every nested child context get distinct ids;
/// ids are only meaningful within one host document instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
	/// Creates a context id from its raw value.
	#[must_use]
	pub const fn new(raw: u64) -> Self {
		Self(raw)
	}

	/// Returns the raw id value.
	#[must_use]
	pub const fn raw(self) -> u64 {
		self.0
	}
}

/// Identifier of an element inside its owning context.
///
/// Element ids are handles, not DOM references: two ids are the same element
/// exactly when they compare equal, which is what anchor identity checks use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
	/// Creates an element id from its raw value.
	#[must_use]
	pub const fn new(raw: u64) -> Self {
		Self(raw)
	}

	/// Returns the raw id value.
	#[must_use]
	pub const fn raw(self) -> u64 {
		self.0
	}
}

/// The two embedded surface purposes sharing the overlay root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
	/// The autofill suggestion panel.
	Suggestions,
	/// The notification panel.
	Notifications,
}
