//! Port transport errors.

/// Transport failure on a cross-context port.
///
/// Callers treat every variant as a no-op: the destination context is gone
/// and the UI simply will not appear or will not close cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
	/// The peer end of the port has been dropped.
	#[error("peer context is gone")]
	Disconnected,
}
