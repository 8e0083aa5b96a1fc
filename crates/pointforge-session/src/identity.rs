//! Identity types: voter keys, attachments, and retained entries.

use std::fmt;
use std::time::Instant;

use pointforge_protocol::RoomCode;

// ---------------------------------------------------------------------------
// VoterKey
// ---------------------------------------------------------------------------

/// Stable identity used to index a member's vote.
///
/// Distinct from both the display name (not unique) and the connection id
/// (changes on every reconnect). Allocated once per membership and kept for
/// as long as the membership is retained; never reused within a process.
///
/// Deliberately not serializable — voter keys are server-internal and never
/// travel on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoterKey(u64);

impl VoterKey {
    /// Creates a `VoterKey` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for VoterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voter-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// DirectoryConfig
// ---------------------------------------------------------------------------

/// Configuration for identity retention.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// How long (in seconds) a disconnected identity is retained for
    /// rejoin-by-name before it is forgotten.
    ///
    /// Default: 60 seconds. Set to 0 to disable reconnection entirely.
    pub retention_grace_secs: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            retention_grace_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// Attachment & retained identities
// ---------------------------------------------------------------------------

/// Where a live connection currently belongs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// The room this connection is joined to.
    pub room: RoomCode,
    /// The membership it acts as.
    pub voter_key: VoterKey,
}

/// Lifecycle of a retained `(room, name)` rejoin slot.
///
/// ```text
///   Attached ──(disconnect)──→ Detached ──(grace elapses)──→ forgotten
///       ↑                          │
///       └────────(rejoin)──────────┘
///
///   any ──(kick)──→ Revoked ──(grace elapses)──→ forgotten
/// ```
///
/// `Revoked` exists so a kicked member cannot walk straight back in with the
/// same retained identity: the slot blocks rejoin until it ages out, after
/// which the name is free for a brand-new member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionState {
    /// The identity's holder is currently connected.
    Attached,
    /// The holder disconnected at the given instant; rejoin is allowed
    /// until the grace period elapses.
    Detached {
        /// When the holder disconnected.
        since: Instant,
    },
    /// The holder was kicked at the given instant; rejoin is refused.
    Revoked {
        /// When the identity was revoked.
        since: Instant,
    },
}

/// One retained `(room, name) → voter key` entry.
#[derive(Debug, Clone)]
pub struct RetainedIdentity {
    /// The membership this slot resumes.
    pub voter_key: VoterKey,
    /// Current lifecycle state.
    pub state: RetentionState,
}

/// How a join for `(room, name)` should attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejoinOutcome {
    /// No retained identity: admit as a brand-new member.
    Fresh,
    /// Resume the given membership.
    Resume(VoterKey),
}
