//! Typed message ports between isolated execution contexts.
//!
//! This crate provides the transport seam of the engine:
//! * `Port`/`PortSender`/`PortReceiver`: a bidirectional in-memory port pair
//!   with in-order, at-least-once delivery within one port and no ordering
//!   guarantee across independently opened ports
//! * `TokenGen`/`Correlator`: counter-generated correlation tokens and the
//!   token → pending-waiter map that turns fire-and-forget ports into
//!   request/response calls
//! * The tagged message unions exchanged between contexts and with the
//!   embedded surfaces, matched exhaustively by their consumers

#![warn(missing_docs)]

pub mod channel;
pub mod correlate;
pub mod endpoint;
pub mod error;
pub mod message;

pub use channel::{Envelope, Port, PortReceiver, PortSender, pair};
pub use correlate::{Correlator, Token, TokenGen};
pub use endpoint::Endpoint;
pub use error::PortError;
pub use message::{DownMessage, InitPayload, RemoteOpen, SurfaceAction, SurfaceDown, SurfaceUp, SurfaceUpKind, UpMessage};
