//! Bounded focus arbitration against hostile host pages.
//!
//! Some host pages script focus aggressively and re-claim it the instant a
//! field is blurred. The [`FocusArbiter`] wrestles focus away from such
//! pages within a fixed poll budget and either grants it to an embedded
//! surface or concedes, never spinning forever and never leaving a sibling
//! lock behind.

#![warn(missing_docs)]

pub mod arbiter;
pub mod will;


pub use arbiter::{FocusArbiter, FocusArbiterConfig, FocusOutcome, RemoteFocusRelease};
pub use will::FocusWill;
