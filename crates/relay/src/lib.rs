//! Nested-context counterpart of the top-level coordinator.
//!
//! A nested context cannot render the shared embedded surfaces — only the
//! top-level context owns the overlay root — so it forwards open/close/state
//! requests upward instead. The [`queue::OrderQueue`] guarantees that the
//! externally observable completions of those calls follow their submission
//! order even though each call is an independent asynchronous round trip.

#![warn(missing_docs)]

pub mod error;
pub mod queue;
pub mod relay;

#[cfg(test)]
mod tests;

pub use error::RelayError;
pub use queue::OrderQueue;
pub use relay::{ContextRelay, RelayConfig};
