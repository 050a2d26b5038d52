//! The nested-context relay.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use inlay_host::{AnchorKey, ContextId, ElementId, Fields, FocusHolder, FocusOracle, HostEvent, HostEvents};
use inlay_port::{Correlator, DownMessage, PortError, PortReceiver, PortSender, RemoteOpen, SurfaceAction, Token, TokenGen, UpMessage};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::RelayError;
use crate::queue::OrderQueue;

/// Relay tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct RelayConfig {
	/// Bounded wait for the top level to acknowledge a relayed call.
	pub ack_timeout: Duration,
}

impl Default for RelayConfig {
	fn default() -> Self {
		Self {
			ack_timeout: Duration::from_secs(1),
		}
	}
}

/// Forwards open/close/state requests from a nested context to the top
/// level, and executes top-level requests against this context's elements.
///
/// All outbound calls go through one [`OrderQueue`], so their completions
/// are observed in submission order; the sends themselves happen
/// synchronously at call time and are therefore also in order on the wire.
pub struct ContextRelay {
	context_id: ContextId,
	config: RelayConfig,
	up: PortSender<UpMessage>,
	fields: Arc<dyn Fields>,
	oracle: Arc<dyn FocusOracle>,
	queue: OrderQueue,
	tokens: TokenGen,
	correlator: Arc<Correlator<DownMessage>>,
	anchored: Mutex<Option<ElementId>>,
	children: Mutex<HashMap<ContextId, PortSender<DownMessage>>>,
	cancel: CancellationToken,
}

impl ContextRelay {
	/// Creates a relay for one nested context.
	#[must_use]
	pub fn new(
		context_id: ContextId,
		up: PortSender<UpMessage>,
		fields: Arc<dyn Fields>,
		oracle: Arc<dyn FocusOracle>,
		config: RelayConfig,
	) -> Arc<Self> {
		Arc::new(Self {
			context_id,
			config,
			up,
			fields,
			oracle,
			queue: OrderQueue::new(),
			tokens: TokenGen::scoped(context_id.raw()),
			correlator: Arc::new(Correlator::new()),
			anchored: Mutex::new(None),
			children: Mutex::new(HashMap::new()),
			cancel: CancellationToken::new(),
		})
	}

	/// Returns this relay's context id.
	#[must_use]
	pub fn context_id(&self) -> ContextId {
		self.context_id
	}

	/// Returns the anchor key for a field of this context.
	#[must_use]
	pub fn anchor_key(&self, field: ElementId) -> AnchorKey {
		AnchorKey::Remote {
			nested_context_id: self.context_id,
			field_id: field,
		}
	}

	/// Requests the top level to open a surface anchored on a local field.
	///
	/// Geometry is computed against this context's viewport and lifted
	/// into the parent's coordinate space before sending.
	pub fn open(&self, field: ElementId, action: SurfaceAction, autofocused: bool) -> JoinHandle<Result<(), RelayError>> {
		let rect = self
			.fields
			.anchor_rect(field)
			.unwrap_or_default()
			.translated(self.fields.frame_offset());
		let token = self.tokens.next();
		let rx = self.correlator.register(token);
		*self.anchored.lock() = Some(field);
		let sent = self.up.send(UpMessage::SurfaceOpen(RemoteOpen {
			action,
			nested_context_id: self.context_id,
			field_id: field,
			rect,
			autofocused,
			token,
		}));
		self.queue_ack(token, rx, sent)
	}

	/// Requests the top level to close the surface.
	///
	/// When `target` is set, the close only applies if that anchor is still
	/// attached, so an unrelated close never cancels a newer open that
	/// raced ahead of it.
	pub fn close(&self, target: Option<AnchorKey>) -> JoinHandle<Result<(), RelayError>> {
		{
			let mut anchored = self.anchored.lock();
			match (target, *anchored) {
				(None, _) => *anchored = None,
				(
					Some(AnchorKey::Remote {
						nested_context_id,
						field_id,
					}),
					Some(current),
				) if nested_context_id == self.context_id && field_id == current => *anchored = None,
				_ => {}
			}
		}
		let token = self.tokens.next();
		let rx = self.correlator.register(token);
		let sent = self.up.send(UpMessage::SurfaceClose { target, token });
		self.queue_ack(token, rx, sent)
	}

	/// Queries overlay visibility from the top level; a nested context has
	/// no local knowledge of it.
	pub fn get_state(&self) -> JoinHandle<Result<bool, RelayError>> {
		let token = self.tokens.next();
		let rx = self.correlator.register(token);
		let sent = self.up.send(UpMessage::StateQuery { token });
		let correlator = Arc::clone(&self.correlator);
		let timeout = self.config.ack_timeout;
		self.queue.push(async move {
			if let Err(err) = sent {
				correlator.discard(token);
				return Err(err.into());
			}
			match tokio::time::timeout(timeout, rx).await {
				Ok(Ok(DownMessage::StateReply { visible, .. })) => Ok(visible),
				Ok(Ok(other)) => {
					tracing::debug!(context = ?token.scope(), reply = ?other, "unexpected reply to state query");
					Err(RelayError::Aborted)
				}
				Ok(Err(_)) => Err(RelayError::Aborted),
				Err(_) => {
					correlator.discard(token);
					Err(RelayError::AckTimeout)
				}
			}
		})
	}

	/// Adopts an immediate child context: its upward traffic is forwarded
	/// to this relay's parent, and downward traffic addressed to it (or to
	/// a deeper descendant) is routed through its port.
	pub fn adopt_child(self: &Arc<Self>, child: ContextId, down: PortSender<DownMessage>, mut up_rx: PortReceiver<UpMessage>) -> JoinHandle<()> {
		self.children.lock().insert(child, down);
		let this = Arc::clone(self);
		tokio::spawn(async move {
			loop {
				tokio::select! {
					() = this.cancel.cancelled() => break,
					envelope = up_rx.recv() => {
						let Some(envelope) = envelope else { break };
						this.forward_up(envelope.body);
					}
				}
			}
			this.children.lock().remove(&child);
		})
	}

	/// Drives inbound messages from the parent context until cancelled.
	pub fn spawn(self: &Arc<Self>, mut rx: PortReceiver<DownMessage>) -> JoinHandle<()> {
		let this = Arc::clone(self);
		tokio::spawn(async move {
			loop {
				tokio::select! {
					() = this.cancel.cancelled() => break,
					envelope = rx.recv() => {
						let Some(envelope) = envelope else { break };
						this.handle_down(envelope.body);
					}
				}
			}
		})
	}

	/// Installs the local auto-close listeners: a scroll or resize in this
	/// context invalidates the anchored geometry, so the panel closes.
	///
	/// This same listener also covers descendants: an ancestor context
	/// closing on its own layout changes is what lets a scroll three
	/// levels up close a panel anchored four levels down, without any
	/// context knowing the whole tree.
	pub fn watch_local_events(self: &Arc<Self>, events: &HostEvents) -> JoinHandle<()> {
		let mut rx = events.subscribe();
		let this = Arc::clone(self);
		tokio::spawn(async move {
			loop {
				tokio::select! {
					() = this.cancel.cancelled() => break,
					event = rx.recv() => {
						match event {
							Ok(event) => this.on_local_event(event),
							Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
							Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
						}
					}
				}
			}
		})
	}

	/// Stops all relay tasks and aborts every pending call.
	pub fn shutdown(&self) {
		self.cancel.cancel();
		self.correlator.abort_all();
	}

	fn queue_ack(&self, token: Token, rx: oneshot::Receiver<DownMessage>, sent: Result<(), PortError>) -> JoinHandle<Result<(), RelayError>> {
		let correlator = Arc::clone(&self.correlator);
		let timeout = self.config.ack_timeout;
		self.queue.push(async move {
			if let Err(err) = sent {
				correlator.discard(token);
				return Err(err.into());
			}
			match tokio::time::timeout(timeout, rx).await {
				Ok(Ok(_ack)) => Ok(()),
				Ok(Err(_)) => Err(RelayError::Aborted),
				Err(_) => {
					correlator.discard(token);
					Err(RelayError::AckTimeout)
				}
			}
		})
	}

	fn forward_up(&self, mut message: UpMessage) {
		if let UpMessage::SurfaceOpen(open) = &mut message {
			// Lift the child's geometry into our parent's space.
			open.rect = open.rect.translated(self.fields.frame_offset());
		}
		if self.up.send(message).is_err() {
			tracing::debug!(context = self.context_id.raw(), "parent context is gone, dropping forwarded message");
		}
	}

	pub(crate) fn handle_down(&self, message: DownMessage) {
		match message {
			DownMessage::Ack { token } | DownMessage::StateReply { token, .. } => {
				if !self.correlator.resolve(token, message) {
					if token.scope() == self.context_id.raw() {
						// Ours, but the waiter already timed out or was
						// discarded; never leak it to a child.
						tracing::debug!(context = self.context_id.raw(), "dropping reply to an abandoned call");
					} else {
						// A reply for a descendant routed through us.
						self.forward_down(message, None);
					}
				}
			}
			DownMessage::ReleaseFocus { token, context, field } => {
				if context == self.context_id {
					self.release_focus(token, field);
				} else {
					self.forward_down(message, Some(context));
				}
			}
			DownMessage::CloseAnchor { key, refocus } => match key {
				AnchorKey::Remote {
					nested_context_id,
					field_id,
				} if nested_context_id == self.context_id => self.cleanup_anchor(field_id, refocus),
				AnchorKey::Remote { nested_context_id, .. } => self.forward_down(message, Some(nested_context_id)),
				// Local anchors are cleaned up by the top level itself.
				AnchorKey::Local(_) => {}
			},
		}
	}

	fn forward_down(&self, message: DownMessage, destination: Option<ContextId>) {
		let children = self.children.lock();
		if let Some(child) = destination.and_then(|id| children.get(&id)) {
			let _ = child.send(message);
			return;
		}
		// One-level knowledge: hand the message to every child; the owning
		// context recognizes it somewhere downstream.
		for child in children.values() {
			let _ = child.send(message);
		}
	}

	fn release_focus(&self, token: Token, field: ElementId) {
		let was_focused = self.oracle.holder() == FocusHolder::Element(field);
		if was_focused {
			self.oracle.blur(field);
		}
		if self.up.send(UpMessage::FocusReleased { token, was_focused }).is_err() {
			tracing::debug!(context = self.context_id.raw(), "parent context is gone, dropping focus reply");
		}
	}

	fn cleanup_anchor(&self, field: ElementId, refocus: bool) {
		self.fields.detach_icon(field);
		if refocus {
			self.oracle.focus(field);
		}
		let mut anchored = self.anchored.lock();
		if *anchored == Some(field) {
			*anchored = None;
		}
	}

	fn on_local_event(&self, event: HostEvent) {
		let Some(field) = *self.anchored.lock() else {
			return;
		};
		match event {
			HostEvent::Scroll { .. } | HostEvent::Resize | HostEvent::WindowBlur => {
				// Anchored geometry is stale; close rather than drift.
				let _ = self.close(Some(self.anchor_key(field)));
			}
			_ => {}
		}
	}
}

impl std::fmt::Debug for ContextRelay {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ContextRelay")
			.field("context_id", &self.context_id)
			.field("anchored", &*self.anchored.lock())
			.finish_non_exhaustive()
	}
}
