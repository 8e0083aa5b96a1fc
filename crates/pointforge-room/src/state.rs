//! Room state: pure data plus its invariant check.
//!
//! `RoomState` exposes no operations beyond constructors, lookups, snapshot
//! derivation, and [`RoomState::check`]. Mutation happens only inside the
//! room coordinator, which applies every operation to a working copy and
//! commits it only if the invariants still hold — so a bug in one operation
//! aborts that operation, never the room.

use std::collections::HashMap;
use std::time::Instant;

use pointforge_protocol::{
    CardValue, ConnectionId, DeckType, RoomCode, RoomSnapshot, RoundState,
    UserInfo,
};
use pointforge_session::VoterKey;

/// One member of a room.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Stable identity; keys this member's vote.
    pub voter_key: VoterKey,
    /// Live connection, `None` while disconnected-but-retained.
    pub connection_id: Option<ConnectionId>,
    /// Display name, presentation only.
    pub name: String,
    /// `false` during the reconnection grace period.
    pub connected: bool,
    /// When the member disconnected; drives grace-period expiry.
    pub disconnected_at: Option<Instant>,
}

impl Participant {
    /// Creates a connected member.
    pub fn new(
        voter_key: VoterKey,
        connection_id: ConnectionId,
        name: impl Into<String>,
    ) -> Self {
        Self {
            voter_key,
            connection_id: Some(connection_id),
            name: name.into(),
            connected: true,
            disconnected_at: None,
        }
    }
}

/// One estimation room's complete state.
///
/// Owned exclusively by the room's coordinator task; nothing else mutates
/// it. `users` preserves insertion order — the client renders members in
/// join order, and host promotion picks the longest-tenured member (first
/// by insertion).
#[derive(Debug, Clone)]
pub struct RoomState {
    /// Unique room identifier, immutable after creation.
    pub code: RoomCode,
    /// The deck votes are validated against, fixed at creation.
    pub deck_type: DeckType,
    /// Current round state.
    pub round_state: RoundState,
    /// Members in join order.
    pub users: Vec<Participant>,
    /// The host's voter key. `None` only while the room is empty.
    pub host_key: Option<VoterKey>,
    /// Votes for the current round. Cleared on every entry into voting.
    pub votes: HashMap<VoterKey, CardValue>,
    /// Updated on every committed mutation; drives idle-room expiry.
    pub last_activity: Instant,
    /// Set while the room has no members at all; drives room reaping.
    pub empty_since: Option<Instant>,
}

impl RoomState {
    /// Creates an empty room in the idle state.
    pub fn new(code: RoomCode, deck_type: DeckType) -> Self {
        Self {
            code,
            deck_type,
            round_state: RoundState::Idle,
            users: Vec::new(),
            host_key: None,
            votes: HashMap::new(),
            last_activity: Instant::now(),
            empty_since: Some(Instant::now()),
        }
    }

    /// Looks up a member by voter key.
    pub fn participant(&self, key: VoterKey) -> Option<&Participant> {
        self.users.iter().find(|p| p.voter_key == key)
    }

    /// Looks up a member by voter key, mutably.
    pub fn participant_mut(
        &mut self,
        key: VoterKey,
    ) -> Option<&mut Participant> {
        self.users.iter_mut().find(|p| p.voter_key == key)
    }

    /// Looks up a member by live connection.
    pub fn by_connection(&self, conn: ConnectionId) -> Option<&Participant> {
        self.users
            .iter()
            .find(|p| p.connection_id == Some(conn))
    }

    /// The current host, if the room has members.
    pub fn host(&self) -> Option<&Participant> {
        self.host_key.and_then(|key| self.participant(key))
    }

    /// Whether `key` holds the host role.
    pub fn is_host(&self, key: VoterKey) -> bool {
        self.host_key == Some(key)
    }

    /// Number of currently-connected members.
    pub fn connected_count(&self) -> usize {
        self.users.iter().filter(|p| p.connected).count()
    }

    /// Derives the wire-ready view of this room.
    ///
    /// `isHost` and `hostConnectionId` are computed here — internally the
    /// host is tracked by voter key so the role survives reconnection.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            code: self.code.clone(),
            deck_type: self.deck_type,
            round_state: self.round_state,
            users: self
                .users
                .iter()
                .map(|p| UserInfo {
                    connection_id: p.connection_id,
                    name: p.name.clone(),
                    is_host: self.is_host(p.voter_key),
                    connected: p.connected,
                })
                .collect(),
            host_connection_id: self.host().and_then(|h| h.connection_id),
        }
    }

    /// Verifies every continuously-checked room invariant.
    ///
    /// Returns a description of the first violation found. The coordinator
    /// calls this after applying each operation to a working copy; a
    /// violation aborts that one operation.
    pub fn check(&self) -> Result<(), String> {
        // Exactly one host whenever the room has members.
        match self.host_key {
            None if !self.users.is_empty() => {
                return Err("non-empty room has no host".into());
            }
            Some(key) if self.participant(key).is_none() => {
                return Err(format!("host {key} is not a member"));
            }
            Some(_) if self.users.is_empty() => {
                return Err("empty room still has a host".into());
            }
            _ => {}
        }

        // At most one member per voter key and per live connection.
        for (i, a) in self.users.iter().enumerate() {
            for b in &self.users[i + 1..] {
                if a.voter_key == b.voter_key {
                    return Err(format!(
                        "duplicate membership for {}",
                        a.voter_key
                    ));
                }
                if a.connection_id.is_some()
                    && a.connection_id == b.connection_id
                {
                    return Err(format!(
                        "two members share connection {:?}",
                        a.connection_id
                    ));
                }
            }
        }

        // A member's connection fields must agree.
        for p in &self.users {
            if p.connected != p.connection_id.is_some() {
                return Err(format!(
                    "member {} connected flag disagrees with connection",
                    p.voter_key
                ));
            }
            if p.connected && p.disconnected_at.is_some() {
                return Err(format!(
                    "connected member {} has a disconnect timestamp",
                    p.voter_key
                ));
            }
        }

        // Every vote belongs to a current member.
        for key in self.votes.keys() {
            if self.participant(*key).is_none() {
                return Err(format!("vote from non-member {key}"));
            }
        }

        Ok(())
    }
}
