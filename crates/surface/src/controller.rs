//! The embedded surface controller.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use inlay_host::{OverlayHost, Rect, SurfaceKind};
use inlay_port::{Endpoint, Envelope, InitPayload, PortSender, SurfaceAction, SurfaceDown, SurfaceUp, SurfaceUpKind};
use parking_lot::Mutex;
use tokio::sync::{Notify, broadcast};
use tokio_util::sync::CancellationToken;

use crate::state::{CloseOptions, Phase, SurfaceConfig, SurfaceEvent, SurfaceSnapshot};

/// Async guard run just before an open becomes visible, re-validating that
/// the open is still wanted. Returning false discards the open silently.
pub type PrepareGuard = Pin<Box<dyn Future<Output = bool> + Send>>;

/// Options for a registered message handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct HandlerOptions {
	/// The handler only fires while the overlay is the document's top-most
	/// interactive layer. Rejects synthetic messages forwarded while a
	/// different modal has focus.
	pub user_action: bool,
}

#[derive(Clone)]
struct HandlerEntry {
	id: u64,
	user_action: bool,
	handler: Arc<dyn Fn(&SurfaceUp) + Send + Sync>,
}

type HandlerMap = Mutex<HashMap<SurfaceUpKind, Vec<HandlerEntry>>>;

/// Unregisters its handler when dropped.
pub struct HandlerGuard {
	handlers: Arc<HandlerMap>,
	kind: SurfaceUpKind,
	id: u64,
}

impl Drop for HandlerGuard {
	fn drop(&mut self) {
		let mut handlers = self.handlers.lock();
		if let Some(entries) = handlers.get_mut(&self.kind) {
			entries.retain(|entry| entry.id != self.id);
		}
	}
}

impl std::fmt::Debug for HandlerGuard {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HandlerGuard").field("kind", &self.kind).field("id", &self.id).finish()
	}
}

struct PendingOp {
	id: u64,
	token: CancellationToken,
}

struct State {
	phase: Phase,
	loaded: bool,
	ready: bool,
	visible: bool,
	position: Option<Rect>,
	pending: Option<PendingOp>,
	port: Option<PortSender<SurfaceDown>>,
	destroyed: bool,
}

/// Owns one reusable embedded UI surface and its open/closed state.
///
/// The controller is the single writer of the surface's visibility and
/// position. At most one abortable open is in flight at any time: a new
/// open or an explicit close always aborts the previous pending operation
/// before proceeding.
pub struct SurfaceController {
	kind: SurfaceKind,
	config: SurfaceConfig,
	layer: Arc<dyn OverlayHost>,
	state: Mutex<State>,
	changed: Notify,
	events: broadcast::Sender<SurfaceEvent>,
	handlers: Arc<HandlerMap>,
	next_op: AtomicU64,
}

impl SurfaceController {
	/// Creates a controller for one surface purpose.
	#[must_use]
	pub fn new(kind: SurfaceKind, layer: Arc<dyn OverlayHost>, config: SurfaceConfig) -> Self {
		let (events, _) = broadcast::channel(16);
		Self {
			kind,
			config,
			layer,
			state: Mutex::new(State {
				phase: Phase::Closed,
				loaded: false,
				ready: false,
				visible: false,
				position: None,
				pending: None,
				port: None,
				destroyed: false,
			}),
			changed: Notify::new(),
			events,
			handlers: Arc::new(Mutex::new(HashMap::new())),
			next_op: AtomicU64::new(0),
		}
	}

	/// Returns which surface this controller owns.
	#[must_use]
	pub fn kind(&self) -> SurfaceKind {
		self.kind
	}

	/// Subscribes to open/close events.
	#[must_use]
	pub fn subscribe(&self) -> broadcast::Receiver<SurfaceEvent> {
		self.events.subscribe()
	}

	/// Returns the current observable state.
	#[must_use]
	pub fn snapshot(&self) -> SurfaceSnapshot {
		let state = self.state.lock();
		SurfaceSnapshot {
			phase: state.phase,
			loaded: state.loaded,
			ready: state.ready,
			visible: state.visible,
			position: state.position,
			pending: state.pending.is_some(),
		}
	}

	/// (Re)binds the message channel to the embedded surface.
	///
	/// Used whenever the extension-wide channel is replaced. Re-binding
	/// leaves a currently visible surface's state untouched.
	pub fn init(&self, port: PortSender<SurfaceDown>, get_init: impl FnOnce() -> InitPayload) {
		{
			let mut state = self.state.lock();
			if state.destroyed {
				return;
			}
			state.port = Some(port.clone());
		}
		if port.send(SurfaceDown::Init(get_init())).is_err() {
			tracing::debug!(surface = ?self.kind, "surface channel peer is gone");
		}
	}

	/// Rebinds the channel after the embedded document itself was torn
	/// down and recreated, e.g. when the overlay root moved into a
	/// focus-trap subtree.
	///
	/// Unlike [`SurfaceController::init`], the readiness handshake starts
	/// over: a recreated document must re-signal `Loaded`/`Ready` before
	/// any open can commit, and a currently visible surface is closed
	/// first since its document no longer exists.
	pub fn rebuild(&self, port: PortSender<SurfaceDown>, get_init: impl FnOnce() -> InitPayload) {
		self.close(CloseOptions {
			discard: true,
			refocus: false,
		});
		{
			let mut state = self.state.lock();
			if state.destroyed {
				return;
			}
			state.loaded = false;
			state.ready = false;
			state.port = Some(port.clone());
		}
		self.changed.notify_waiters();
		if port.send(SurfaceDown::Init(get_init())).is_err() {
			tracing::debug!(surface = ?self.kind, "surface channel peer is gone");
		}
	}

	/// Opens the surface for an action at a position.
	///
	/// Cancels any previous pending operation, waits for readiness within
	/// a bounded window, runs the optional `prepare` guard, and only then
	/// flips visibility. A stale open — aborted, vetoed, or timed out —
	/// is discarded without ever becoming visible.
	pub async fn open(&self, action: SurfaceAction, position: Rect, prepare: Option<PrepareGuard>) {
		let (op_id, token) = {
			let mut state = self.state.lock();
			if state.destroyed {
				return;
			}
			if let Some(previous) = state.pending.take() {
				previous.token.cancel();
			}
			let op_id = self.next_op.fetch_add(1, Ordering::Relaxed);
			let token = CancellationToken::new();
			state.pending = Some(PendingOp {
				id: op_id,
				token: token.clone(),
			});
			if matches!(state.phase, Phase::Closed | Phase::Closing) {
				state.phase = Phase::Opening;
			}
			(op_id, token)
		};
		self.changed.notify_waiters();

		let became_ready = tokio::select! {
			() = token.cancelled() => return,
			ready = self.wait_ready() => ready,
		};
		if !became_ready {
			// The embedded surface failing to load is not actionable by
			// the user; the open just never appears.
			tracing::debug!(surface = ?self.kind, "surface never became ready, abandoning open");
			self.abandon(op_id);
			return;
		}

		if let Some(prepare) = prepare {
			let keep = tokio::select! {
				() = token.cancelled() => return,
				keep = prepare => keep,
			};
			if !keep {
				self.abandon(op_id);
				return;
			}
		}

		let port = {
			let mut state = self.state.lock();
			let ours = state.pending.as_ref().is_some_and(|pending| pending.id == op_id);
			if !ours || token.is_cancelled() || !state.ready {
				return;
			}
			state.pending = None;
			state.visible = true;
			state.phase = Phase::Open;
			state.position = Some(position);
			state.port.clone()
		};
		self.changed.notify_waiters();
		let _ = self.events.send(SurfaceEvent::Opened { kind: self.kind, action });
		if let Some(port) = port {
			let _ = port.send(SurfaceDown::Position { rect: position });
			let _ = port.send(SurfaceDown::ShowAction { action });
		}
	}

	/// Closes the surface. Idempotent: a surface that is already hidden
	/// stays hidden and emits nothing.
	///
	/// A close landing while an open is still pending aborts that open;
	/// the surface goes straight to `Closed` without a close event, since
	/// subscribers never saw it open.
	pub fn close(&self, options: CloseOptions) {
		let port = {
			let mut state = self.state.lock();
			if let Some(pending) = state.pending.take() {
				pending.token.cancel();
			}
			match state.phase {
				Phase::Closed | Phase::Closing => None,
				Phase::Opening => {
					state.phase = Phase::Closed;
					None
				}
				Phase::Open => {
					state.phase = Phase::Closing;
					state.visible = false;
					state.position = None;
					Some(state.port.clone())
				}
			}
		};
		self.changed.notify_waiters();
		let Some(port) = port else {
			return;
		};
		let _ = self.events.send(SurfaceEvent::Closed {
			kind: self.kind,
			discard: options.discard,
			refocus: options.refocus,
		});
		if let Some(port) = port {
			let _ = port.send(SurfaceDown::Close);
		}
		{
			let mut state = self.state.lock();
			if state.phase == Phase::Closing {
				state.phase = Phase::Closed;
			}
		}
		self.changed.notify_waiters();
	}

	/// Moves a visible surface to a new position.
	pub fn reposition(&self, rect: Rect) {
		let port = {
			let mut state = self.state.lock();
			if !state.visible {
				return;
			}
			state.position = Some(rect);
			state.port.clone()
		};
		if let Some(port) = port {
			let _ = port.send(SurfaceDown::Position { rect });
		}
	}

	/// Instructs the embedded surface to take keyboard focus.
	pub fn request_take_focus(&self) {
		let port = self.state.lock().port.clone();
		if let Some(port) = port {
			let _ = port.send(SurfaceDown::TakeFocus);
		}
	}

	/// Force-closes, detaches all handlers, and drops the channel.
	/// Safe to call multiple times.
	pub fn destroy(&self) {
		self.close(CloseOptions {
			discard: true,
			refocus: false,
		});
		{
			let mut state = self.state.lock();
			state.destroyed = true;
			state.loaded = false;
			state.ready = false;
			state.port = None;
		}
		self.handlers.lock().clear();
		self.changed.notify_waiters();
	}

	/// Registers a handler for one inbound message kind.
	///
	/// Handlers are scoped to this controller's identity: messages stamped
	/// for a sibling surface never reach them. Dropping the returned guard
	/// unregisters the handler.
	#[must_use]
	pub fn register_message_handler(
		&self,
		kind: SurfaceUpKind,
		options: HandlerOptions,
		handler: impl Fn(&SurfaceUp) + Send + Sync + 'static,
	) -> HandlerGuard {
		let id = self.next_op.fetch_add(1, Ordering::Relaxed);
		self.handlers.lock().entry(kind).or_default().push(HandlerEntry {
			id,
			user_action: options.user_action,
			handler: Arc::new(handler),
		});
		HandlerGuard {
			handlers: Arc::clone(&self.handlers),
			kind,
			id,
		}
	}

	/// Feeds one inbound envelope from the embedded surface channel.
	///
	/// Envelopes stamped for a different endpoint are ignored.
	pub fn handle_message(&self, envelope: &Envelope<SurfaceUp>) {
		if envelope.sender != Endpoint::Surface(self.kind) {
			return;
		}
		match &envelope.body {
			SurfaceUp::Loaded => {
				self.state.lock().loaded = true;
				self.changed.notify_waiters();
			}
			SurfaceUp::Ready => {
				// A reordered handshake must not break the implication
				// chain: ready implies the document loaded.
				let mut state = self.state.lock();
				state.loaded = true;
				state.ready = true;
				drop(state);
				self.changed.notify_waiters();
			}
			_ => {}
		}
		self.dispatch(&envelope.body);
	}

	fn dispatch(&self, message: &SurfaceUp) {
		let entries = self.handlers.lock().get(&message.kind()).cloned().unwrap_or_default();
		for entry in entries {
			if entry.user_action && !self.layer.is_top_layer() {
				tracing::warn!(
					surface = ?self.kind,
					kind = ?message.kind(),
					"rejected surface message: overlay is not the top layer"
				);
				continue;
			}
			(entry.handler)(message);
		}
	}

	fn abandon(&self, op_id: u64) {
		let mut state = self.state.lock();
		if state.pending.as_ref().is_some_and(|pending| pending.id == op_id) {
			state.pending = None;
		}
		if state.phase == Phase::Opening && !state.visible {
			state.phase = Phase::Closed;
		}
		drop(state);
		self.changed.notify_waiters();
	}

	async fn wait_ready(&self) -> bool {
		tokio::time::timeout(self.config.ready_timeout, async {
			loop {
				// Register the notification future *before* checking state
				// to avoid a lost wakeup between the check and the await.
				let notified = self.changed.notified();
				if self.state.lock().ready {
					return;
				}
				notified.await;
			}
		})
		.await
		.is_ok()
	}
}

impl std::fmt::Debug for SurfaceController {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SurfaceController")
			.field("kind", &self.kind)
			.field("snapshot", &self.snapshot())
			.finish()
	}
}
