//! Injected host-document capabilities.
//!
//! The coordination engine never touches a real document. Everything it needs
//! from the page — focus state, element geometry, the overlay mount point,
//! global UI events — is consumed through the traits in this crate, and every
//! trait has a scriptable [`FakeHost`] implementation for tests.

#![warn(missing_docs)]

/// Anchor model: what an open surface is attached to.
pub mod anchor;
/// Host-document UI event stream.
pub mod events;
/// Scriptable test double implementing every host capability.
pub mod fake;
/// Field geometry and cleanup capabilities.
pub mod fields;
/// Focus observation, blur/focus, and sibling-field locking.
pub mod focus;
/// Geometry primitives in CSS pixel space.
pub mod geometry;
/// Identifier types for engine entities.
pub mod ids;
/// Shared overlay root ownership.
pub mod overlay;

pub use anchor::{Anchor, AnchorKey};
pub use events::{HostEvent, HostEvents};
pub use fake::FakeHost;
pub use fields::Fields;
pub use focus::{FieldLocker, FocusHolder, FocusOracle, LockGuard};
pub use geometry::{FrameOffset, Rect};
pub use ids::{ContextId, ElementId, SurfaceKind};
pub use overlay::OverlayHost;
