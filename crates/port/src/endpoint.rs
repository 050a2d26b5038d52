//! Message sender identities.

use inlay_host::{ContextId, SurfaceKind};

/// Identity of a message sender, stamped on every envelope.
///
/// Consumers match on the endpoint to ignore messages intended for a
/// sibling surface or context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
	/// The top-level context of the host document.
	Top,
	/// A nested child context.
	Nested(ContextId),
	/// One of the embedded UI surfaces.
	Surface(SurfaceKind),
}
