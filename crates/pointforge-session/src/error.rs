//! Error types for the session layer.

use pointforge_protocol::ConnectionId;

/// Errors that can occur during session directory operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The connection is not attached to any room.
    ///
    /// This happens when a client sends a room-scoped operation (vote,
    /// start-voting, …) before joining, or after its membership was removed.
    #[error("connection {0} is not in a room")]
    NotAttached(ConnectionId),

    /// The connection is already attached to a room.
    ///
    /// A connection can act as at most one membership at a time; the client
    /// must leave before joining another room.
    #[error("connection {0} is already in a room")]
    AlreadyAttached(ConnectionId),

    /// The retained identity was revoked (its holder was kicked) and may
    /// not be resumed.
    #[error("identity {name:?} was removed from the room")]
    IdentityRevoked {
        /// The display name whose retained slot is revoked.
        name: String,
    },
}
