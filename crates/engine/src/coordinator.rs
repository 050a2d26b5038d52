//! The per-document coordinator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use inlay_focus::{FocusArbiter, FocusArbiterConfig, FocusOutcome, FocusWill, RemoteFocusRelease};
use inlay_host::{
	Anchor, AnchorKey, ContextId, ElementId, FieldLocker, Fields, FocusOracle, HostEvent, HostEvents, OverlayHost, Rect, SurfaceKind,
};
use inlay_port::{
	Correlator, DownMessage, Endpoint, Envelope, InitPayload, Port, PortSender, SurfaceAction, SurfaceDown, SurfaceUp, SurfaceUpKind,
	TokenGen, UpMessage,
};
use inlay_surface::{CloseOptions, HandlerGuard, HandlerOptions, PrepareGuard, SurfaceConfig, SurfaceController};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::effects::{EffectEvent, SideEffects};
use crate::error::EngineError;
use crate::layer::OverlayLayerRegistry;
use crate::registry::AnchorRegistry;

/// The injected capabilities of one host document.
pub struct HostCapabilities {
	/// Field geometry and icon cleanup.
	pub fields: Arc<dyn Fields>,
	/// Focus observation and blur/focus.
	pub oracle: Arc<dyn FocusOracle>,
	/// Sibling-field locking during focus arbitration.
	pub locker: Arc<dyn FieldLocker>,
	/// Overlay root ownership.
	pub overlay: Arc<dyn OverlayHost>,
	/// Document UI event stream.
	pub events: HostEvents,
}

/// Coordinator tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
	/// Surface controller configuration, shared by both surfaces.
	pub surface: SurfaceConfig,
	/// Focus arbitration configuration.
	pub focus: FocusArbiterConfig,
	/// Bounded wait for a nested context to answer a focus release.
	pub focus_reply_timeout: Duration,
}

impl Default for CoordinatorConfig {
	fn default() -> Self {
		Self {
			surface: SurfaceConfig::default(),
			focus: FocusArbiterConfig::default(),
			focus_reply_timeout: Duration::from_secs(1),
		}
	}
}

/// A request to open a surface.
#[derive(Debug, Clone, Copy)]
pub struct OpenRequest {
	/// The action the surface should render.
	pub action: SurfaceAction,
	/// The anchor the surface attaches to; `None` for unanchored prompts.
	pub anchor: Option<Anchor>,
	/// Target position in top-level coordinates.
	pub rect: Rect,
	/// True when the anchored field gained focus without user interaction.
	pub autofocused: bool,
}

struct ChildLink {
	sender: PortSender<DownMessage>,
	/// The nested-frame host element, within the top-level document.
	container: ElementId,
}

type ChildMap = Arc<Mutex<HashMap<ContextId, ChildLink>>>;

/// Releases focus from remote anchors by round-tripping through the
/// owning context's port.
struct PortFocusRelease {
	children: ChildMap,
	replies: Arc<Correlator<bool>>,
	tokens: TokenGen,
	timeout: Duration,
}

#[async_trait]
impl RemoteFocusRelease for PortFocusRelease {
	async fn release(&self, anchor: &Anchor) -> bool {
		let Anchor::Remote {
			context_id,
			field_id,
			nested_context_id,
			..
		} = *anchor
		else {
			return false;
		};
		let Some(child) = self.children.lock().get(&context_id).map(|link| link.sender.clone()) else {
			return false;
		};
		let token = self.tokens.next();
		let rx = self.replies.register(token);
		let sent = child.send(DownMessage::ReleaseFocus {
			token,
			context: nested_context_id,
			field: field_id,
		});
		if sent.is_err() {
			self.replies.discard(token);
			return false;
		}
		match tokio::time::timeout(self.timeout, rx).await {
			Ok(Ok(was_focused)) => was_focused,
			_ => {
				self.replies.discard(token);
				false
			}
		}
	}
}

/// Coordinates the two embedded surfaces of one host document.
///
/// Explicitly constructed per document, no process-wide state: two
/// documents get two independent coordinators over two independent sets of
/// capabilities. The coordinator is the only writer of surface visibility
/// and position.
pub struct Coordinator {
	config: CoordinatorConfig,
	events: HostEvents,
	suggestions: Arc<SurfaceController>,
	notifications: Arc<SurfaceController>,
	anchors: AnchorRegistry,
	layer: OverlayLayerRegistry,
	arbiter: FocusArbiter,
	will: FocusWill,
	effects: Arc<dyn SideEffects>,
	children: ChildMap,
	focus_replies: Arc<Correlator<bool>>,
	surface_ports: Mutex<HashMap<SurfaceKind, PortSender<SurfaceDown>>>,
	cancel: CancellationToken,
}

impl Coordinator {
	/// Wires a coordinator over one document's capabilities.
	#[must_use]
	pub fn new(caps: HostCapabilities, effects: Arc<dyn SideEffects>, config: CoordinatorConfig) -> Arc<Self> {
		let children: ChildMap = Arc::new(Mutex::new(HashMap::new()));
		let focus_replies = Arc::new(Correlator::new());
		let will = FocusWill::new();
		let remote = PortFocusRelease {
			children: Arc::clone(&children),
			replies: Arc::clone(&focus_replies),
			tokens: TokenGen::new(),
			timeout: config.focus_reply_timeout,
		};
		let arbiter = FocusArbiter::new(
			Arc::clone(&caps.oracle),
			Arc::clone(&caps.locker),
			Arc::new(remote),
			will.clone(),
			config.focus,
		);
		Arc::new(Self {
			config,
			events: caps.events.clone(),
			suggestions: Arc::new(SurfaceController::new(SurfaceKind::Suggestions, Arc::clone(&caps.overlay), config.surface)),
			notifications: Arc::new(SurfaceController::new(SurfaceKind::Notifications, Arc::clone(&caps.overlay), config.surface)),
			anchors: AnchorRegistry::new(Arc::clone(&caps.fields), Arc::clone(&caps.oracle)),
			layer: OverlayLayerRegistry::new(caps.overlay),
			arbiter,
			will,
			effects,
			children,
			focus_replies,
			surface_ports: Mutex::new(HashMap::new()),
			cancel: CancellationToken::new(),
		})
	}

	/// Returns the controller for a surface.
	#[must_use]
	pub fn surface(&self, kind: SurfaceKind) -> &Arc<SurfaceController> {
		match kind {
			SurfaceKind::Suggestions => &self.suggestions,
			SurfaceKind::Notifications => &self.notifications,
		}
	}

	/// Returns the grace flag armed when focus is about to move into a
	/// surface.
	#[must_use]
	pub fn will_focus(&self) -> &FocusWill {
		&self.will
	}

	/// Returns the anchor the suggestions surface is attached to.
	#[must_use]
	pub fn current_anchor(&self) -> Option<Anchor> {
		self.anchors.current()
	}

	/// Binds a surface's message channel and drives its inbound messages.
	pub fn serve_surface(self: &Arc<Self>, kind: SurfaceKind, port: Port<SurfaceDown, SurfaceUp>) -> JoinHandle<()> {
		let (tx, mut rx) = port.split();
		self.surface_ports.lock().insert(kind, tx.clone());
		self.surface(kind).init(tx, || InitPayload { kind });
		let guards = self.register_surface_handlers(kind);
		let this = Arc::clone(self);
		tokio::spawn(async move {
			let _guards = guards;
			loop {
				tokio::select! {
					() = this.cancel.cancelled() => break,
					envelope = rx.recv() => {
						let Some(envelope) = envelope else { break };
						this.surface(kind).handle_message(&envelope);
					}
				}
			}
		})
	}

	/// Attaches an immediate nested context reachable through `container`
	/// and drives its upward messages.
	pub fn attach_context(self: &Arc<Self>, context: ContextId, container: ElementId, port: Port<DownMessage, UpMessage>) -> JoinHandle<()> {
		let (sender, mut rx) = port.split();
		self.children.lock().insert(context, ChildLink { sender, container });
		let this = Arc::clone(self);
		tokio::spawn(async move {
			loop {
				tokio::select! {
					() = this.cancel.cancelled() => break,
					envelope = rx.recv() => {
						let Some(envelope) = envelope else { break };
						if let Err(error) = this.handle_up(envelope) {
							tracing::warn!(%error, context = context.raw(), "dropped message from nested context");
						}
					}
				}
			}
			this.children.lock().remove(&context);
		})
	}

	/// Watches for the host page removing the overlay root and restores it,
	/// or shuts the engine down once the coordinator is stale.
	pub fn watch_overlay(self: &Arc<Self>) -> JoinHandle<()> {
		let mut rx = self.events.subscribe();
		let this = Arc::clone(self);
		tokio::spawn(async move {
			loop {
				tokio::select! {
					() = this.cancel.cancelled() => break,
					event = rx.recv() => {
						match event {
							Ok(HostEvent::OverlayRootRemoved) => {
								if this.layer.restore_after_removal() {
									this.rebind_surfaces();
								} else {
									this.destroy();
									break;
								}
							}
							Ok(_) => {}
							Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
							Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
						}
					}
				}
			}
		})
	}

	/// Opens a surface for a request.
	///
	/// An open on the already-attached anchor refocuses the visible surface
	/// instead of cycling it; an open on a different anchor closes the
	/// current surface first, so subscribers always observe `Closed` before
	/// the new `Opened`.
	pub async fn open(self: &Arc<Self>, request: OpenRequest) {
		self.begin_open(&request);
		Arc::clone(self).finish_open(request).await;
	}

	/// Closes a surface.
	pub fn close(&self, kind: SurfaceKind, options: CloseOptions) {
		match kind {
			SurfaceKind::Suggestions => {
				let _ = self.close_scoped(None, options);
			}
			SurfaceKind::Notifications => self.notifications.close(options),
		}
	}

	/// Tears the coordinator down. Safe to call multiple times.
	pub fn destroy(&self) {
		self.cancel.cancel();
		self.layer.teardown();
		if let Some(anchor) = self.anchors.detach() {
			self.run_close_effects(&anchor, false);
		}
		self.suggestions.destroy();
		self.notifications.destroy();
		self.children.lock().clear();
		self.surface_ports.lock().clear();
		self.focus_replies.abort_all();
		self.will.clear();
	}

	/// Synchronous head of an open: anchor bookkeeping that must be
	/// ordered with respect to other inbound operations.
	fn begin_open(self: &Arc<Self>, request: &OpenRequest) {
		if self.cancel.is_cancelled() || request.action.surface() != SurfaceKind::Suggestions {
			return;
		}
		let Some(anchor) = request.anchor else {
			return;
		};
		let probe = match anchor {
			Anchor::Local(field) => field,
			Anchor::Remote { container_id, .. } => container_id,
		};
		if self.layer.ensure_interactive(probe) {
			self.rebind_surfaces();
		}
		if !self.anchors.will_change(&anchor) {
			return;
		}
		// Anchor changed while a surface is up: close the old one first so
		// Closed(old) is observed before Opened(new).
		if self.suggestions.snapshot().visible {
			let _ = self.close_scoped(
				None,
				CloseOptions {
					discard: false,
					refocus: false,
				},
			);
		}
		self.attach_anchor(anchor);
	}

	/// Asynchronous tail of an open: readiness wait, side-effect gate, and
	/// the visibility flip.
	async fn finish_open(self: Arc<Self>, request: OpenRequest) {
		if self.cancel.is_cancelled() {
			return;
		}
		let kind = request.action.surface();
		let controller = Arc::clone(self.surface(kind));

		// Same anchor, surface already visible: refocus, do not cycle.
		if kind == SurfaceKind::Suggestions
			&& controller.snapshot().visible
			&& let Some(anchor) = request.anchor
			&& self.anchors.current().map(|current| current.key()) == Some(anchor.key())
		{
			controller.reposition(request.rect);
			if self.arbiter.acquire(kind, &anchor).await == FocusOutcome::Granted {
				controller.request_take_focus();
			}
			return;
		}

		// Only the suggestions panel tracks the shared anchor; a
		// notifications anchor is informational and never goes stale.
		let staleness_gate = match kind {
			SurfaceKind::Suggestions => request.anchor.map(|anchor| anchor.key()),
			SurfaceKind::Notifications => None,
		};
		let prepare = self.prepare_guard(request.action, staleness_gate);
		controller.open(request.action, request.rect, Some(prepare)).await;

		if controller.snapshot().visible {
			self.report(EffectEvent::SurfaceOpened { kind });
		} else if kind == SurfaceKind::Suggestions
			&& let Some(anchor) = request.anchor
			&& self.anchors.current().map(|current| current.key()) == Some(anchor.key())
		{
			// The open never became visible; leave no anchor behind.
			if let Some(anchor) = self.anchors.detach() {
				self.run_close_effects(&anchor, false);
			}
		}
	}

	/// Closes the suggestions surface, optionally scoped to one anchor.
	///
	/// # Errors
	///
	/// Returns [`EngineError::Stale`] when `target` no longer names the
	/// attached anchor; the close is a no-op in that case, so a stale close
	/// never cancels a newer open that raced ahead of it.
	pub fn close_scoped(&self, target: Option<AnchorKey>, options: CloseOptions) -> Result<(), EngineError> {
		if let Some(key) = target
			&& self.anchors.current().map(|anchor| anchor.key()) != Some(key)
		{
			return Err(EngineError::Stale);
		}
		let was_visible = self.suggestions.snapshot().visible;
		let detached = self.anchors.detach();
		self.suggestions.close(options);
		if let Some(anchor) = detached {
			self.run_close_effects(&anchor, options.refocus);
		}
		self.will.clear();
		if was_visible {
			self.report(EffectEvent::SurfaceClosed {
				kind: SurfaceKind::Suggestions,
			});
		}
		Ok(())
	}

	fn handle_up(self: &Arc<Self>, envelope: Envelope<UpMessage>) -> Result<(), EngineError> {
		let Endpoint::Nested(context) = envelope.sender else {
			return Err(EngineError::UntrustedOrigin);
		};
		let Some(sender) = self.children.lock().get(&context).map(|link| link.sender.clone()) else {
			return Err(EngineError::UntrustedOrigin);
		};
		match envelope.body {
			UpMessage::SurfaceOpen(open) => {
				let container = self
					.children
					.lock()
					.get(&context)
					.map(|link| link.container)
					.ok_or(EngineError::UntrustedOrigin)?;
				let request = OpenRequest {
					action: open.action,
					anchor: Some(Anchor::Remote {
						context_id: context,
						field_id: open.field_id,
						container_id: container,
						nested_context_id: open.nested_context_id,
					}),
					rect: open.rect,
					autofocused: open.autofocused,
				};
				self.begin_open(&request);
				tokio::spawn(Arc::clone(self).finish_open(request));
				sender.send(DownMessage::Ack { token: open.token })?;
			}
			UpMessage::SurfaceClose { target, token } => {
				// A stale scoped close is acknowledged but changes nothing.
				let _ = self.close_scoped(
					target,
					CloseOptions {
						discard: false,
						refocus: false,
					},
				);
				sender.send(DownMessage::Ack { token })?;
			}
			UpMessage::StateQuery { token } => {
				let visible = self.suggestions.snapshot().visible || self.notifications.snapshot().visible;
				sender.send(DownMessage::StateReply { token, visible })?;
			}
			UpMessage::FocusReleased { token, was_focused } => {
				// Late replies to an arbitration that moved on are dropped.
				let _ = self.focus_replies.resolve(token, was_focused);
			}
		}
		Ok(())
	}

	/// Attaches the anchor and spawns its auto-close listener, bound to a
	/// token the registry cancels on detach.
	fn attach_anchor(self: &Arc<Self>, anchor: Anchor) {
		let listeners = self.cancel.child_token();
		self.anchors.attach(anchor, listeners.clone());
		let mut rx = self.events.subscribe();
		let this = Arc::clone(self);
		tokio::spawn(async move {
			loop {
				tokio::select! {
					() = listeners.cancelled() => break,
					event = rx.recv() => {
						match event {
							Ok(event) => this.on_host_event(anchor, event),
							Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
							Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
						}
					}
				}
			}
		});
	}

	fn on_host_event(&self, anchor: Anchor, event: HostEvent) {
		let close = |discard: bool| {
			let _ = self.close_scoped(Some(anchor.key()), CloseOptions { discard, refocus: false });
		};
		match event {
			HostEvent::Resize | HostEvent::Scroll { .. } => close(false),
			HostEvent::Navigation | HostEvent::Unload => close(true),
			// A blur caused by our own focus transfer must not close the
			// surface the transfer targets.
			HostEvent::WindowBlur if !self.will.active() => close(false),
			HostEvent::MouseDown { target } if self.anchors.is_backdrop_click(target) => close(false),
			_ => {}
		}
	}

	fn prepare_guard(self: &Arc<Self>, action: SurfaceAction, anchor: Option<AnchorKey>) -> PrepareGuard {
		let this = Arc::clone(self);
		Box::pin(async move {
			// A close or newer open that landed while we awaited readiness
			// has moved the anchor on; this open is stale.
			if let Some(key) = anchor
				&& this.anchors.current().map(|current| current.key()) != Some(key)
			{
				return false;
			}
			this.effects.prepare(action).await
		})
	}

	fn register_surface_handlers(self: &Arc<Self>, kind: SurfaceKind) -> Vec<HandlerGuard> {
		let controller = self.surface(kind);
		let mut guards = Vec::new();

		let weak = Arc::downgrade(self);
		guards.push(controller.register_message_handler(
			SurfaceUpKind::RequestFocus,
			HandlerOptions { user_action: true },
			move |_message| {
				let Some(this) = weak.upgrade() else { return };
				tokio::spawn(async move { this.focus_surface(kind).await });
			},
		));

		let weak = Arc::downgrade(self);
		guards.push(controller.register_message_handler(
			SurfaceUpKind::Fill,
			HandlerOptions { user_action: true },
			move |message| {
				let Some(this) = weak.upgrade() else { return };
				let SurfaceUp::Fill { value } = message else { return };
				let value = value.clone();
				let anchor = this.anchors.current().map(|anchor| anchor.key());
				let effects = Arc::clone(&this.effects);
				tokio::spawn(async move {
					if let Err(error) = effects.fill(anchor, value).await {
						tracing::warn!(%error, "fill side effect failed");
					} else if let Err(error) = effects.report(EffectEvent::Filled).await {
						tracing::warn!(%error, "telemetry side effect failed");
					}
				});
			},
		));

		let weak = Arc::downgrade(self);
		guards.push(controller.register_message_handler(
			SurfaceUpKind::Resize,
			HandlerOptions::default(),
			move |message| {
				let Some(this) = weak.upgrade() else { return };
				let SurfaceUp::Resize { height } = message else { return };
				if let Some(position) = this.surface(kind).snapshot().position {
					this.surface(kind).reposition(Rect { height: *height, ..position });
				}
			},
		));

		let weak = Arc::downgrade(self);
		guards.push(controller.register_message_handler(
			SurfaceUpKind::CloseRequest,
			HandlerOptions::default(),
			move |message| {
				let Some(this) = weak.upgrade() else { return };
				let SurfaceUp::CloseRequest { refocus } = message else { return };
				this.close(
					kind,
					CloseOptions {
						discard: false,
						refocus: *refocus,
					},
				);
			},
		));

		guards
	}

	async fn focus_surface(self: Arc<Self>, kind: SurfaceKind) {
		let anchor = match kind {
			SurfaceKind::Suggestions => self.anchors.current(),
			SurfaceKind::Notifications => None,
		};
		let Some(anchor) = anchor else {
			// Nothing holds focus on our behalf; hand it straight over.
			self.will.arm(self.config.focus.grace);
			self.surface(kind).request_take_focus();
			return;
		};
		if self.arbiter.acquire(kind, &anchor).await == FocusOutcome::Granted {
			self.surface(kind).request_take_focus();
		}
	}

	fn run_close_effects(&self, anchor: &Anchor, refocus: bool) {
		let child = match *anchor {
			Anchor::Remote { context_id, .. } => self.children.lock().get(&context_id).map(|link| link.sender.clone()),
			Anchor::Local(_) => None,
		};
		self.anchors.close_effects(anchor, refocus, child.as_ref());
	}

	/// Recreates both surfaces after the overlay root moved or was
	/// remounted: the embedded documents reload, so their handshakes
	/// start over.
	fn rebind_surfaces(&self) {
		let ports = self.surface_ports.lock().clone();
		for (kind, port) in ports {
			self.surface(kind).rebuild(port, || InitPayload { kind });
		}
	}

	fn report(&self, event: EffectEvent) {
		let effects = Arc::clone(&self.effects);
		tokio::spawn(async move {
			if let Err(error) = effects.report(event).await {
				tracing::warn!(%error, ?event, "telemetry side effect failed");
			}
		});
	}
}

impl std::fmt::Debug for Coordinator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Coordinator")
			.field("suggestions", &self.suggestions.snapshot())
			.field("notifications", &self.notifications.snapshot())
			.field("anchor", &self.anchors.current())
			.finish_non_exhaustive()
	}
}
