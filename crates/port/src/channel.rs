//! In-memory bidirectional port pairs.

use tokio::sync::mpsc;

use crate::endpoint::Endpoint;
use crate::error::PortError;

/// A message plus the identity of the endpoint that sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope<M> {
	/// The sending endpoint.
	pub sender: Endpoint,
	/// The message body.
	pub body: M,
}

/// Sending half of a port. Cheap to clone; all clones stamp the same
/// endpoint identity.
pub struct PortSender<Out> {
	tx: mpsc::UnboundedSender<Envelope<Out>>,
	local: Endpoint,
}

impl<Out> Clone for PortSender<Out> {
	fn clone(&self) -> Self {
		Self {
			tx: self.tx.clone(),
			local: self.local,
		}
	}
}

impl<Out> std::fmt::Debug for PortSender<Out> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PortSender").field("local", &self.local).finish()
	}
}

impl<Out> PortSender<Out> {
	/// Returns the identity stamped on outgoing envelopes.
	#[must_use]
	pub fn endpoint(&self) -> Endpoint {
		self.local
	}

	/// Sends a message to the peer.
	///
	/// # Errors
	///
	/// Returns [`PortError::Disconnected`] when the peer end is gone;
	/// callers treat this as a no-op.
	pub fn send(&self, body: Out) -> Result<(), PortError> {
		self.tx
			.send(Envelope {
				sender: self.local,
				body,
			})
			.map_err(|_| PortError::Disconnected)
	}
}

/// Receiving half of a port.
pub struct PortReceiver<In> {
	rx: mpsc::UnboundedReceiver<Envelope<In>>,
}

impl<In> std::fmt::Debug for PortReceiver<In> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PortReceiver").finish_non_exhaustive()
	}
}

impl<In> PortReceiver<In> {
	/// Receives the next envelope, or `None` once the peer is gone and the
	/// queue is drained. Delivery is in-order within this port.
	pub async fn recv(&mut self) -> Option<Envelope<In>> {
		self.rx.recv().await
	}
}

/// One end of a bidirectional port.
#[derive(Debug)]
pub struct Port<Out, In> {
	sender: PortSender<Out>,
	receiver: PortReceiver<In>,
}

impl<Out, In> Port<Out, In> {
	/// Returns a clone of the sending half.
	#[must_use]
	pub fn sender(&self) -> PortSender<Out> {
		self.sender.clone()
	}

	/// Receives the next envelope.
	pub async fn recv(&mut self) -> Option<Envelope<In>> {
		self.receiver.recv().await
	}

	/// Splits into independent halves.
	#[must_use]
	pub fn split(self) -> (PortSender<Out>, PortReceiver<In>) {
		(self.sender, self.receiver)
	}
}

/// Creates a connected port pair between endpoints `a` and `b`.
///
/// Messages sent from one end arrive at the other in submission order;
/// independently created pairs give no relative ordering.
#[must_use]
pub fn pair<AtoB, BtoA>(a: Endpoint, b: Endpoint) -> (Port<AtoB, BtoA>, Port<BtoA, AtoB>) {
	let (a_tx, b_rx) = mpsc::unbounded_channel();
	let (b_tx, a_rx) = mpsc::unbounded_channel();
	(
		Port {
			sender: PortSender { tx: a_tx, local: a },
			receiver: PortReceiver { rx: a_rx },
		},
		Port {
			sender: PortSender { tx: b_tx, local: b },
			receiver: PortReceiver { rx: b_rx },
		},
	)
}
