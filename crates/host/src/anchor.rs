use crate::ids::{ContextId, ElementId};

/// What an open embedded surface is attached to.
///
/// At most one anchor is active per surface at any time; attaching a new
/// anchor invalidates any in-flight operation tied to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
	/// A concrete interactive element owned by the current context.
	Local(ElementId),
	/// An element living inside a context the current context cannot touch.
	Remote {
		/// The immediate child context the anchor is reachable through.
		context_id: ContextId,
		/// The anchored field element, within its owning context.
		field_id: ElementId,
		/// The nested-context host element, within the current context.
		container_id: ElementId,
		/// The context the element truly lives in. Differs from
		/// `context_id` when nesting is deeper than one level.
		nested_context_id: ContextId,
	},
}

impl Anchor {
	/// Returns the identity key used for anchor-change detection.
	#[must_use]
	pub fn key(&self) -> AnchorKey {
		match *self {
			Self::Local(element) => AnchorKey::Local(element),
			Self::Remote {
				nested_context_id, field_id, ..
			} => AnchorKey::Remote {
				nested_context_id,
				field_id,
			},
		}
	}

	/// Returns true when an incoming anchor would replace this one.
	///
	/// Local anchors compare by element identity; remote anchors by their
	/// `(nested context, field)` pair, so the same field reached through
	/// different intermediate contexts still counts as the same anchor.
	#[must_use]
	pub fn will_change(&self, incoming: &Self) -> bool {
		self.key() != incoming.key()
	}
}

/// Identity of an anchor, independent of how it was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorKey {
	/// Identity of a local anchor element.
	Local(ElementId),
	/// Identity of a remote anchor field.
	Remote {
		/// The context the field truly lives in.
		nested_context_id: ContextId,
		/// The field element within that context.
		field_id: ElementId,
	},
}

#[cfg(test)]
mod tests {
	use super::Anchor;
	use crate::ids::{ContextId, ElementId};

	#[test]
	fn local_anchors_compare_by_element_identity() {
		let a = Anchor::Local(ElementId::new(1));
		let b = Anchor::Local(ElementId::new(1));
		let c = Anchor::Local(ElementId::new(2));
		assert!(!a.will_change(&b));
		assert!(a.will_change(&c));
	}

	#[test]
	fn remote_anchors_ignore_the_intermediate_context() {
		let a = Anchor::Remote {
			context_id: ContextId::new(1),
			field_id: ElementId::new(7),
			container_id: ElementId::new(3),
			nested_context_id: ContextId::new(2),
		};
		// Same field, reached through a different immediate child.
		let b = Anchor::Remote {
			context_id: ContextId::new(9),
			field_id: ElementId::new(7),
			container_id: ElementId::new(4),
			nested_context_id: ContextId::new(2),
		};
		assert!(!a.will_change(&b));
	}

	#[test]
	fn local_and_remote_anchors_never_match() {
		let local = Anchor::Local(ElementId::new(7));
		let remote = Anchor::Remote {
			context_id: ContextId::new(1),
			field_id: ElementId::new(7),
			container_id: ElementId::new(3),
			nested_context_id: ContextId::new(2),
		};
		assert!(local.will_change(&remote));
	}
}
