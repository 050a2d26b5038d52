//! Injected side effects.

use async_trait::async_trait;
use inlay_host::{AnchorKey, SurfaceKind};
use inlay_port::SurfaceAction;

/// A side effect failed. Carries a human-readable cause; the coordinator
/// only ever logs it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct EffectError(pub String);

/// Telemetry events reported fire-and-forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectEvent {
	/// A surface became visible.
	SurfaceOpened {
		/// Which surface opened.
		kind: SurfaceKind,
	},
	/// A visible surface was closed.
	SurfaceClosed {
		/// Which surface closed.
		kind: SurfaceKind,
	},
	/// A value was filled into the anchored field.
	Filled,
}

/// Everything the coordinator delegates outside the document.
///
/// All calls are fire-and-forget from the coordinator's point of view:
/// failures are swallowed with a logged warning and never change surface
/// state. The one exception is [`SideEffects::prepare`], whose verdict
/// gates an open just before it becomes visible.
#[async_trait]
pub trait SideEffects: Send + Sync {
	/// Re-validates an open immediately before the surface becomes
	/// visible, e.g. that the credential store is still unlocked.
	/// Returning false discards the open silently.
	async fn prepare(&self, action: SurfaceAction) -> bool;

	/// Fills the picked value into the anchored field.
	async fn fill(&self, anchor: Option<AnchorKey>, value: String) -> Result<(), EffectError>;

	/// Reports a telemetry event.
	async fn report(&self, event: EffectEvent) -> Result<(), EffectError>;
}

/// Side effects that do nothing and allow every open.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEffects;

#[async_trait]
impl SideEffects for NoEffects {
	async fn prepare(&self, _action: SurfaceAction) -> bool {
		true
	}

	async fn fill(&self, _anchor: Option<AnchorKey>, _value: String) -> Result<(), EffectError> {
		Ok(())
	}

	async fn report(&self, _event: EffectEvent) -> Result<(), EffectError> {
		Ok(())
	}
}
