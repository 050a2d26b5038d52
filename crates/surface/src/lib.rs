//! Reusable embedded surface controller.
//!
//! One [`SurfaceController`] owns one embedded UI surface for a given
//! purpose and is the only writer of its open/closed state. Opens are
//! abortable and gated on the embedded document's readiness; closes are
//! idempotent; the `visible ⇒ ready ⇒ loaded` chain holds at every
//! observation point.

#![warn(missing_docs)]

pub mod controller;
pub mod state;

#[cfg(test)]
mod tests;

pub use controller::{HandlerGuard, HandlerOptions, PrepareGuard, SurfaceController};
pub use state::{CloseOptions, Phase, SurfaceConfig, SurfaceEvent, SurfaceSnapshot};
