//! Unified error type for the Pointforge server.

use pointforge_protocol::ProtocolError;
use pointforge_room::RoomError;
use pointforge_session::SessionError;
use pointforge_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[error(transparent)]` + `#[from]` pairs let the `?` operator
/// convert sub-crate errors automatically, so callers of the meta crate
/// deal with one error type.
#[derive(Debug, thiserror::Error)]
pub enum PointforgeError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (attachment, retained identity).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (membership, round state, invariants).
    #[error(transparent)]
    Room(#[from] RoomError),
}
