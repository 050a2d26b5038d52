//! Coordinator-level errors.

use inlay_port::PortError;

/// Why the coordinator dropped or refused an operation.
///
/// None of these propagate to the host page. Stale operations are the
/// normal outcome of races and are discarded without noise; untrusted
/// origins are logged at warn level before being dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
	/// The operation referred to an anchor that is no longer attached.
	#[error("operation targets a stale anchor")]
	Stale,
	/// A port to a child context or surface is gone.
	#[error(transparent)]
	Transport(#[from] PortError),
	/// The message arrived from an endpoint that is not an attached
	/// nested context.
	#[error("message sender is not an attached nested context")]
	UntrustedOrigin,
}
