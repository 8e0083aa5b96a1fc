//! Error types for the room layer.

use pointforge_protocol::{CardValue, ErrorCode, RoomCode, RoundState};

/// Errors that can occur during room operations.
///
/// All of these are recovered at the gateway boundary and returned as a
/// `failed` ack to the calling connection only; none of them terminate the
/// room or affect other members.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room code names no live room.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The operation is illegal for the current round state.
    #[error("cannot {op} while round is {state}")]
    InvalidState {
        /// The operation that was attempted.
        op: &'static str,
        /// The round state the room was in.
        state: RoundState,
    },

    /// The vote value is not a card in the room's active deck.
    #[error("vote {0} is not in the active deck")]
    InvalidCard(CardValue),

    /// A non-host attempted a host-only operation, the caller is not a
    /// member, or the target is not a member.
    #[error("{0}")]
    Forbidden(String),

    /// The room was destroyed while the operation was in flight.
    #[error("room {0} is closed")]
    RoomClosed(RoomCode),

    /// An internal invariant violation. The operation was rolled back and
    /// the room's committed state is unchanged.
    #[error("invariant violated, operation rolled back: {0}")]
    Invariant(String),
}

impl RoomError {
    /// The stable wire-level reason code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::InvalidState { .. } => ErrorCode::InvalidState,
            Self::InvalidCard(_) => ErrorCode::InvalidCard,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::RoomClosed(_) => ErrorCode::RoomClosed,
            Self::Invariant(_) => ErrorCode::Internal,
        }
    }
}
