//! Session directory for Pointforge.
//!
//! This crate answers two questions the gateway asks constantly:
//!
//! 1. **Who is this connection?** — `ConnectionId → (room, voter key)`,
//!    dropped the moment the connection goes away.
//! 2. **Has this identity been here before?** — `(room, display name) →
//!    voter key`, retained across a disconnect for a bounded grace period so
//!    a refreshed tab can resume as the *same* member (keeping host status
//!    and any vote already cast) instead of being admitted as a stranger.
//!
//! The directory is the authority on identity resumption. Whatever a client
//! has squirreled away locally is only a hint used to *request*
//! reattachment; it is never trusted to assert host status or a prior vote.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room layer (above)  ← keyed by VoterKey, never by connection or name
//!     ↕
//! Session layer (this crate)  ← identity lookup + grace-period retention
//!     ↕
//! Protocol layer (below)  ← provides ConnectionId, RoomCode
//! ```

mod directory;
mod error;
mod identity;

pub use directory::SessionDirectory;
pub use error::SessionError;
pub use identity::{
    Attachment, DirectoryConfig, RejoinOutcome, RetainedIdentity,
    RetentionState, VoterKey,
};
