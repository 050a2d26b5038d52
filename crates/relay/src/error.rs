//! Relay call errors.

use inlay_port::PortError;

/// Failure of one relayed cross-context call.
///
/// None of these surface to the end user; callers log and move on. The
/// worst outcome is a surface that does not appear or does not close
/// cleanly, leaving the rest of the host page unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
	/// The port to the parent context is gone.
	#[error(transparent)]
	Transport(#[from] PortError),
	/// The top level never acknowledged within the bounded wait.
	#[error("cross-context call was not acknowledged in time")]
	AckTimeout,
	/// The reply channel was dropped before a response arrived.
	#[error("cross-context call was aborted")]
	Aborted,
}
