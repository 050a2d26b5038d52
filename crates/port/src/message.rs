//! Message unions exchanged over cross-context ports.

use inlay_host::{AnchorKey, ContextId, ElementId, Rect, SurfaceKind};

use crate::correlate::Token;

/// What an open request asks a surface to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceAction {
	/// Suggest saved logins for the anchored field.
	SuggestLogin,
	/// Suggest saved identity data for the anchored field.
	SuggestIdentity,
	/// Suggest a generated password for the anchored field.
	SuggestPassword,
	/// Prompt to save a submitted form.
	PromptAutosave,
}

impl SurfaceAction {
	/// Returns the surface this action renders on.
	#[must_use]
	pub fn surface(self) -> SurfaceKind {
		match self {
			Self::SuggestLogin | Self::SuggestIdentity | Self::SuggestPassword => SurfaceKind::Suggestions,
			Self::PromptAutosave => SurfaceKind::Notifications,
		}
	}
}

/// An open request forwarded from a nested context.
///
/// `rect` is translated into the receiver's coordinate space at every
/// forwarding hop; `nested_context_id` always names the origin context.
/// The immediate child the request arrived through is the envelope sender.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteOpen {
	/// The requested action.
	pub action: SurfaceAction,
	/// The context the anchored field truly lives in.
	pub nested_context_id: ContextId,
	/// The anchored field, within the origin context.
	pub field_id: ElementId,
	/// Anchor geometry, in the receiving context's coordinate space.
	pub rect: Rect,
	/// True when the field gained focus without user interaction.
	pub autofocused: bool,
	/// Correlation token for the acknowledgement.
	pub token: Token,
}

/// Messages travelling from a nested context toward the top level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpMessage {
	/// Open a surface for an anchor in the sending (or a deeper) context.
	SurfaceOpen(RemoteOpen),
	/// Close the surface, optionally scoped to one anchor.
	SurfaceClose {
		/// Only close if this anchor is still attached; `None` closes
		/// unconditionally.
		target: Option<AnchorKey>,
		/// Correlation token for the acknowledgement.
		token: Token,
	},
	/// Query overlay visibility; only the top level knows it.
	StateQuery {
		/// Correlation token for the reply.
		token: Token,
	},
	/// Reply to a [`DownMessage::ReleaseFocus`] request.
	FocusReleased {
		/// The request's token.
		token: Token,
		/// True when an element was actually focused and has been blurred.
		was_focused: bool,
	},
}

/// Messages travelling from the top level toward nested contexts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DownMessage {
	/// Acknowledges a queued `SurfaceOpen`/`SurfaceClose` request.
	Ack {
		/// The request's token.
		token: Token,
	},
	/// Reply to a [`UpMessage::StateQuery`].
	StateReply {
		/// The query's token.
		token: Token,
		/// Whether a surface is currently visible.
		visible: bool,
	},
	/// Run local close cleanup for an anchor that lives in a nested
	/// context; the top level cannot touch that context's elements.
	CloseAnchor {
		/// The anchor to clean up after.
		key: AnchorKey,
		/// Whether focus should return to the anchored field.
		refocus: bool,
	},
	/// Release focus from a field and report back whether one was focused.
	ReleaseFocus {
		/// Correlation token echoed in the reply.
		token: Token,
		/// The context the field lives in.
		context: ContextId,
		/// The field to release.
		field: ElementId,
	},
}

impl DownMessage {
	/// Returns the nested context this message must reach, when it is
	/// addressed to one rather than to the immediate receiver.
	#[must_use]
	pub fn destination(&self) -> Option<ContextId> {
		match self {
			Self::Ack { .. } | Self::StateReply { .. } => None,
			Self::CloseAnchor { key, .. } => match key {
				AnchorKey::Remote { nested_context_id, .. } => Some(*nested_context_id),
				AnchorKey::Local(_) => None,
			},
			Self::ReleaseFocus { context, .. } => Some(*context),
		}
	}
}

/// Initialization payload for an embedded surface document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitPayload {
	/// Which surface the embedded document renders.
	pub kind: SurfaceKind,
}

/// Messages from the coordinator to an embedded surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceDown {
	/// (Re)initializes the embedded document after a channel bind.
	Init(InitPayload),
	/// Tells the surface which action to render.
	ShowAction {
		/// The action to render.
		action: SurfaceAction,
	},
	/// Positions the surface over its anchor.
	Position {
		/// Target rectangle in top-level coordinates.
		rect: Rect,
	},
	/// Instructs the surface to take keyboard focus.
	TakeFocus,
	/// Tells the surface it is being hidden.
	Close,
}

/// Messages from an embedded surface to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceUp {
	/// The embedded document finished initializing.
	Loaded,
	/// The bidirectional channel is established.
	Ready,
	/// The surface wants keyboard focus for its list.
	RequestFocus,
	/// The user picked a value to fill into the anchored field.
	Fill {
		/// The value to fill.
		value: String,
	},
	/// The surface's content height changed.
	Resize {
		/// New content height in CSS pixels.
		height: f64,
	},
	/// The user dismissed the surface from inside it.
	CloseRequest {
		/// Whether focus should return to the anchored field.
		refocus: bool,
	},
}

impl SurfaceUp {
	/// Returns the handler-registration kind of this message.
	#[must_use]
	pub fn kind(&self) -> SurfaceUpKind {
		match self {
			Self::Loaded => SurfaceUpKind::Loaded,
			Self::Ready => SurfaceUpKind::Ready,
			Self::RequestFocus => SurfaceUpKind::RequestFocus,
			Self::Fill { .. } => SurfaceUpKind::Fill,
			Self::Resize { .. } => SurfaceUpKind::Resize,
			Self::CloseRequest { .. } => SurfaceUpKind::CloseRequest,
		}
	}
}

/// Discriminant of a [`SurfaceUp`] message, used as a handler key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceUpKind {
	/// [`SurfaceUp::Loaded`]
	Loaded,
	/// [`SurfaceUp::Ready`]
	Ready,
	/// [`SurfaceUp::RequestFocus`]
	RequestFocus,
	/// [`SurfaceUp::Fill`]
	Fill,
	/// [`SurfaceUp::Resize`]
	Resize,
	/// [`SurfaceUp::CloseRequest`]
	CloseRequest,
}
