//! Per-document coordination of the embedded autofill surfaces.
//!
//! One [`Coordinator`] owns the two surfaces of one host document, the
//! anchor the suggestions surface is attached to, the shared overlay root,
//! and the ports to every attached nested context. It is the single writer
//! of surface visibility; everything else feeds it messages.

#![warn(missing_docs)]

pub mod coordinator;
pub mod effects;
pub mod error;
pub mod layer;
pub mod registry;


pub use coordinator::{Coordinator, CoordinatorConfig, HostCapabilities, OpenRequest};
pub use effects::{EffectError, EffectEvent, NoEffects, SideEffects};
pub use error::EngineError;
pub use layer::OverlayLayerRegistry;
pub use registry::AnchorRegistry;
