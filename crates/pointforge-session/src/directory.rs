//! The session directory: both identity lookup directions.
//!
//! # Concurrency note
//!
//! `SessionDirectory` is NOT thread-safe by itself — plain `HashMap`s, no
//! interior locking. The gateway owns it behind a single `Mutex`; every
//! operation here is O(1)-ish and never calls into a room coordinator, so
//! the critical sections stay short and lock ordering stays trivial.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use pointforge_protocol::{ConnectionId, RoomCode};

use crate::{
    Attachment, DirectoryConfig, RejoinOutcome, RetainedIdentity,
    RetentionState, SessionError, VoterKey,
};

/// Counter for allocating voter keys. Process-wide so keys stay unique
/// even across rooms.
static NEXT_VOTER_KEY: AtomicU64 = AtomicU64::new(1);

fn alloc_voter_key() -> VoterKey {
    VoterKey::new(NEXT_VOTER_KEY.fetch_add(1, Ordering::Relaxed))
}

/// Maps live connections to memberships, and `(room, name)` pairs back to
/// memberships for reconnection.
///
/// ## Lifecycle of one identity
///
/// ```text
/// attach() ──→ detach() ──→ reattach()          (refresh mid-round)
///     │            │
///     │            └──(grace elapses)──→ expire_stale() / forget()
///     │
///     └──→ remove()                              (explicit leave)
///     └──→ revoke() ──(grace elapses)──→ expire_stale()   (kick)
/// ```
pub struct SessionDirectory {
    /// Live connections, keyed by connection id. A connection acts as at
    /// most one membership at a time.
    connections: HashMap<ConnectionId, Attachment>,

    /// Retained rejoin slots, keyed by `(room, display name)`. Kept in sync
    /// with `connections`: the slot for a name is `Attached` exactly while
    /// its holder has a live connection.
    retained: HashMap<(RoomCode, String), RetainedIdentity>,

    config: DirectoryConfig,
}

impl SessionDirectory {
    /// Creates a new, empty directory with the given config.
    pub fn new(config: DirectoryConfig) -> Self {
        Self {
            connections: HashMap::new(),
            retained: HashMap::new(),
            config,
        }
    }

    fn grace(&self) -> Duration {
        Duration::from_secs(self.config.retention_grace_secs)
    }

    /// Registers a brand-new membership for `conn`.
    ///
    /// Allocates a fresh voter key and, if the `(room, name)` rejoin slot is
    /// vacant (or held by an entry that already aged out), claims it. When a
    /// second connected user picks an already-claimed name, they still get
    /// their own voter key — they just don't get a rejoin slot. Duplicate
    /// display names: first claimant keeps the slot.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyAttached`] if `conn` is already in a
    /// room.
    pub fn attach(
        &mut self,
        conn: ConnectionId,
        room: RoomCode,
        name: &str,
    ) -> Result<VoterKey, SessionError> {
        if self.connections.contains_key(&conn) {
            return Err(SessionError::AlreadyAttached(conn));
        }

        let voter_key = alloc_voter_key();
        self.connections.insert(
            conn,
            Attachment {
                room: room.clone(),
                voter_key,
            },
        );

        let slot = (room, name.to_string());
        let claimable = match self.retained.get(&slot) {
            None => true,
            Some(entry) => self.entry_expired(entry),
        };
        if claimable {
            self.retained.insert(
                slot,
                RetainedIdentity {
                    voter_key,
                    state: RetentionState::Attached,
                },
            );
        }

        tracing::debug!(%conn, %voter_key, "attached new membership");
        Ok(voter_key)
    }

    /// Rebinds a new connection to a retained membership.
    ///
    /// Called after [`resolve_rejoin`](Self::resolve_rejoin) returned
    /// `Resume`. Marks the slot `Attached` again.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyAttached`] if `conn` is already in a
    /// room.
    pub fn reattach(
        &mut self,
        conn: ConnectionId,
        room: RoomCode,
        name: &str,
        voter_key: VoterKey,
    ) -> Result<(), SessionError> {
        if self.connections.contains_key(&conn) {
            return Err(SessionError::AlreadyAttached(conn));
        }

        self.connections.insert(
            conn,
            Attachment {
                room: room.clone(),
                voter_key,
            },
        );

        let slot = (room, name.to_string());
        if let Some(entry) = self.retained.get_mut(&slot) {
            if entry.voter_key == voter_key {
                entry.state = RetentionState::Attached;
            }
        }

        tracing::debug!(%conn, %voter_key, "reattached retained membership");
        Ok(())
    }

    /// Looks up which room and membership a live connection belongs to.
    pub fn resolve(&self, conn: ConnectionId) -> Option<Attachment> {
        self.connections.get(&conn).cloned()
    }

    /// Decides whether a join for `(room, name)` resumes an existing
    /// membership or admits a new one.
    ///
    /// - A slot in `Detached` state within the grace period → `Resume`.
    /// - A vacant, expired, or currently-`Attached` slot → `Fresh`
    ///   (an attached slot means the name's holder is still connected —
    ///   the joiner is a second user with the same name, not a resume).
    ///
    /// # Errors
    /// Returns [`SessionError::IdentityRevoked`] while the slot is revoked
    /// and the revocation hasn't aged out: the kicked identity may not
    /// return.
    pub fn resolve_rejoin(
        &self,
        room: &RoomCode,
        name: &str,
    ) -> Result<RejoinOutcome, SessionError> {
        let slot = (room.clone(), name.to_string());
        match self.retained.get(&slot) {
            None => Ok(RejoinOutcome::Fresh),
            Some(entry) if self.entry_expired(entry) => {
                Ok(RejoinOutcome::Fresh)
            }
            Some(entry) => match entry.state {
                RetentionState::Attached => Ok(RejoinOutcome::Fresh),
                RetentionState::Detached { .. } => {
                    Ok(RejoinOutcome::Resume(entry.voter_key))
                }
                RetentionState::Revoked { .. } => {
                    Err(SessionError::IdentityRevoked {
                        name: name.to_string(),
                    })
                }
            },
        }
    }

    /// Handles a transport-level disconnect: drops the live mapping and
    /// starts the retention clock on the identity's rejoin slot.
    ///
    /// Returns the attachment the connection had, so the gateway can inform
    /// the right room coordinator.
    pub fn detach(&mut self, conn: ConnectionId) -> Option<Attachment> {
        let attachment = self.connections.remove(&conn)?;
        for entry in self.room_slots_mut(&attachment.room) {
            if entry.voter_key == attachment.voter_key {
                entry.state = RetentionState::Detached {
                    since: Instant::now(),
                };
            }
        }
        tracing::debug!(%conn, "detached, retention clock started");
        Some(attachment)
    }

    /// Handles an explicit leave: drops both the live mapping and the
    /// rejoin slot. Nothing is retained.
    pub fn remove(&mut self, conn: ConnectionId) -> Option<Attachment> {
        let attachment = self.connections.remove(&conn)?;
        self.retained.retain(|(room, _), entry| {
            !(room == &attachment.room
                && entry.voter_key == attachment.voter_key)
        });
        tracing::debug!(%conn, "removed, nothing retained");
        Some(attachment)
    }

    /// Handles a kick: drops the live mapping (if any) and marks the rejoin
    /// slot revoked so the identity cannot be resumed.
    pub fn revoke(
        &mut self,
        room: &RoomCode,
        voter_key: VoterKey,
        conn: Option<ConnectionId>,
    ) {
        if let Some(conn) = conn {
            self.connections.remove(&conn);
        }
        for entry in self.room_slots_mut(room) {
            if entry.voter_key == voter_key {
                entry.state = RetentionState::Revoked {
                    since: Instant::now(),
                };
            }
        }
        tracing::info!(%voter_key, room = %room, "identity revoked");
    }

    /// Forgets a retained membership whose grace period a room coordinator
    /// has already enforced (the member was structurally removed).
    pub fn forget(&mut self, room: &RoomCode, voter_key: VoterKey) {
        self.retained.retain(|(r, _), entry| {
            !(r == room && entry.voter_key == voter_key)
        });
    }

    /// Prunes detached and revoked slots whose grace period elapsed.
    ///
    /// Call periodically (the server's sweep task does). Returns how many
    /// slots were forgotten.
    pub fn expire_stale(&mut self) -> usize {
        let grace = self.grace();
        let before = self.retained.len();
        self.retained.retain(|_, entry| match entry.state {
            RetentionState::Attached => true,
            RetentionState::Detached { since }
            | RetentionState::Revoked { since } => since.elapsed() <= grace,
        });
        before - self.retained.len()
    }

    /// Returns `true` if any identity for `room` is still retained
    /// (attached or within grace). A room with retained identities must not
    /// be destroyed yet.
    pub fn has_retained(&self, room: &RoomCode) -> bool {
        self.retained.keys().any(|(r, _)| r == room)
    }

    /// Drops every entry for a destroyed room. Returns how many live
    /// connections were orphaned (they get `room-closed` on their next
    /// request).
    pub fn purge_room(&mut self, room: &RoomCode) -> usize {
        let before = self.connections.len();
        self.connections.retain(|_, a| &a.room != room);
        self.retained.retain(|(r, _), _| r != room);
        before - self.connections.len()
    }

    /// Number of live attachments.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of retained rejoin slots (any state).
    pub fn retained_count(&self) -> usize {
        self.retained.len()
    }

    fn entry_expired(&self, entry: &RetainedIdentity) -> bool {
        match entry.state {
            RetentionState::Attached => false,
            RetentionState::Detached { since }
            | RetentionState::Revoked { since } => {
                since.elapsed() > self.grace()
            }
        }
    }

    fn room_slots_mut<'a>(
        &'a mut self,
        room: &'a RoomCode,
    ) -> impl Iterator<Item = &'a mut RetainedIdentity> + 'a {
        self.retained
            .iter_mut()
            .filter_map(move |((r, _), entry)| (r == room).then_some(entry))
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Time-dependent behavior is tested without sleeping: a 0-second
    //! grace period makes everything expire immediately, a 1-hour one makes
    //! nothing expire during the test.

    use super::*;

    fn directory_with_instant_expiry() -> SessionDirectory {
        SessionDirectory::new(DirectoryConfig {
            retention_grace_secs: 0,
        })
    }

    fn directory_with_long_grace() -> SessionDirectory {
        SessionDirectory::new(DirectoryConfig {
            retention_grace_secs: 3600,
        })
    }

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn room(code: &str) -> RoomCode {
        RoomCode::parse(code).expect("valid test code")
    }

    // =====================================================================
    // attach() / resolve()
    // =====================================================================

    #[test]
    fn test_attach_registers_live_lookup() {
        let mut dir = directory_with_long_grace();

        let key = dir.attach(conn(1), room("AAA111"), "ada").unwrap();

        let attachment = dir.resolve(conn(1)).expect("should resolve");
        assert_eq!(attachment.room, room("AAA111"));
        assert_eq!(attachment.voter_key, key);
    }

    #[test]
    fn test_attach_twice_same_connection_fails() {
        let mut dir = directory_with_long_grace();
        dir.attach(conn(1), room("AAA111"), "ada").unwrap();

        let result = dir.attach(conn(1), room("BBB222"), "ada");

        assert!(matches!(
            result,
            Err(SessionError::AlreadyAttached(c)) if c == conn(1)
        ));
    }

    #[test]
    fn test_attach_allocates_distinct_voter_keys() {
        let mut dir = directory_with_long_grace();
        let k1 = dir.attach(conn(1), room("AAA111"), "ada").unwrap();
        let k2 = dir.attach(conn(2), room("AAA111"), "grace").unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_duplicate_name_keeps_first_rejoin_slot() {
        // Two connected "ada"s: each gets a voter key, but the rejoin slot
        // belongs to the first. The second disconnecting must not let them
        // resume as the first.
        let mut dir = directory_with_long_grace();
        let k1 = dir.attach(conn(1), room("AAA111"), "ada").unwrap();
        let _k2 = dir.attach(conn(2), room("AAA111"), "ada").unwrap();

        dir.detach(conn(1));

        match dir.resolve_rejoin(&room("AAA111"), "ada").unwrap() {
            RejoinOutcome::Resume(k) => assert_eq!(k, k1),
            other => panic!("expected resume of first claimant, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_unknown_connection_returns_none() {
        let dir = directory_with_long_grace();
        assert!(dir.resolve(conn(99)).is_none());
    }

    // =====================================================================
    // detach() / resolve_rejoin() / reattach()
    // =====================================================================

    #[test]
    fn test_rejoin_within_grace_resumes_same_key() {
        let mut dir = directory_with_long_grace();
        let key = dir.attach(conn(1), room("AAA111"), "ada").unwrap();

        dir.detach(conn(1));

        let outcome = dir.resolve_rejoin(&room("AAA111"), "ada").unwrap();
        assert_eq!(outcome, RejoinOutcome::Resume(key));

        dir.reattach(conn(2), room("AAA111"), "ada", key).unwrap();
        let attachment = dir.resolve(conn(2)).unwrap();
        assert_eq!(attachment.voter_key, key);
    }

    #[test]
    fn test_rejoin_after_grace_is_fresh() {
        let mut dir = directory_with_instant_expiry();
        dir.attach(conn(1), room("AAA111"), "ada").unwrap();
        dir.detach(conn(1));

        let outcome = dir.resolve_rejoin(&room("AAA111"), "ada").unwrap();
        assert_eq!(outcome, RejoinOutcome::Fresh);
    }

    #[test]
    fn test_rejoin_unknown_name_is_fresh() {
        let dir = directory_with_long_grace();
        let outcome = dir.resolve_rejoin(&room("AAA111"), "nobody").unwrap();
        assert_eq!(outcome, RejoinOutcome::Fresh);
    }

    #[test]
    fn test_rejoin_while_holder_connected_is_fresh() {
        // "ada" is still connected; a second join with the same name is a
        // second user, not a resume.
        let mut dir = directory_with_long_grace();
        dir.attach(conn(1), room("AAA111"), "ada").unwrap();

        let outcome = dir.resolve_rejoin(&room("AAA111"), "ada").unwrap();
        assert_eq!(outcome, RejoinOutcome::Fresh);
    }

    #[test]
    fn test_detach_returns_attachment_for_routing() {
        let mut dir = directory_with_long_grace();
        let key = dir.attach(conn(1), room("AAA111"), "ada").unwrap();

        let attachment = dir.detach(conn(1)).expect("was attached");
        assert_eq!(attachment.room, room("AAA111"));
        assert_eq!(attachment.voter_key, key);
        assert!(dir.resolve(conn(1)).is_none());
    }

    // =====================================================================
    // remove() — explicit leave
    // =====================================================================

    #[test]
    fn test_remove_retains_nothing() {
        let mut dir = directory_with_long_grace();
        dir.attach(conn(1), room("AAA111"), "ada").unwrap();

        dir.remove(conn(1));

        assert!(dir.resolve(conn(1)).is_none());
        let outcome = dir.resolve_rejoin(&room("AAA111"), "ada").unwrap();
        assert_eq!(outcome, RejoinOutcome::Fresh);
        assert_eq!(dir.retained_count(), 0);
    }

    // =====================================================================
    // revoke() — kick
    // =====================================================================

    #[test]
    fn test_revoked_identity_cannot_rejoin() {
        let mut dir = directory_with_long_grace();
        let key = dir.attach(conn(1), room("AAA111"), "ada").unwrap();

        dir.revoke(&room("AAA111"), key, Some(conn(1)));

        assert!(dir.resolve(conn(1)).is_none());
        let result = dir.resolve_rejoin(&room("AAA111"), "ada");
        assert!(matches!(
            result,
            Err(SessionError::IdentityRevoked { name }) if name == "ada"
        ));
    }

    #[test]
    fn test_revocation_ages_out_to_fresh() {
        // With 0s grace the revocation expires immediately; the name is
        // then free for a brand-new member.
        let mut dir = directory_with_instant_expiry();
        let key = dir.attach(conn(1), room("AAA111"), "ada").unwrap();

        dir.revoke(&room("AAA111"), key, Some(conn(1)));

        let outcome = dir.resolve_rejoin(&room("AAA111"), "ada").unwrap();
        assert_eq!(outcome, RejoinOutcome::Fresh);
    }

    // =====================================================================
    // expire_stale() / forget() / purge_room()
    // =====================================================================

    #[test]
    fn test_expire_stale_prunes_detached_past_grace() {
        let mut dir = directory_with_instant_expiry();
        dir.attach(conn(1), room("AAA111"), "ada").unwrap();
        dir.attach(conn(2), room("AAA111"), "grace").unwrap();
        dir.detach(conn(1));
        // conn 2 stays attached.

        let pruned = dir.expire_stale();

        assert_eq!(pruned, 1);
        assert_eq!(dir.retained_count(), 1);
    }

    #[test]
    fn test_expire_stale_keeps_entries_within_grace() {
        let mut dir = directory_with_long_grace();
        dir.attach(conn(1), room("AAA111"), "ada").unwrap();
        dir.detach(conn(1));

        assert_eq!(dir.expire_stale(), 0);
        assert_eq!(dir.retained_count(), 1);
    }

    #[test]
    fn test_forget_drops_single_membership() {
        let mut dir = directory_with_long_grace();
        let key = dir.attach(conn(1), room("AAA111"), "ada").unwrap();
        dir.attach(conn(2), room("AAA111"), "grace").unwrap();
        dir.detach(conn(1));

        dir.forget(&room("AAA111"), key);

        let outcome = dir.resolve_rejoin(&room("AAA111"), "ada").unwrap();
        assert_eq!(outcome, RejoinOutcome::Fresh);
        assert!(dir.has_retained(&room("AAA111")), "grace's slot remains");
    }

    #[test]
    fn test_purge_room_drops_everything_for_that_room() {
        let mut dir = directory_with_long_grace();
        dir.attach(conn(1), room("AAA111"), "ada").unwrap();
        dir.attach(conn(2), room("BBB222"), "grace").unwrap();

        let orphaned = dir.purge_room(&room("AAA111"));

        assert_eq!(orphaned, 1);
        assert!(dir.resolve(conn(1)).is_none());
        assert!(dir.resolve(conn(2)).is_some());
        assert!(!dir.has_retained(&room("AAA111")));
        assert!(dir.has_retained(&room("BBB222")));
    }

    #[test]
    fn test_has_retained_tracks_room_scoped_slots() {
        let mut dir = directory_with_long_grace();
        assert!(!dir.has_retained(&room("AAA111")));

        dir.attach(conn(1), room("AAA111"), "ada").unwrap();
        assert!(dir.has_retained(&room("AAA111")));
        assert!(!dir.has_retained(&room("BBB222")));
    }

    // =====================================================================
    // Full lifecycle
    // =====================================================================

    #[test]
    fn test_full_lifecycle_refresh_mid_session() {
        // A tab refresh: attach → detach → resolve_rejoin → reattach,
        // same voter key throughout.
        let mut dir = directory_with_long_grace();
        let key = dir.attach(conn(1), room("AAA111"), "ada").unwrap();

        dir.detach(conn(1));
        let RejoinOutcome::Resume(resumed) =
            dir.resolve_rejoin(&room("AAA111"), "ada").unwrap()
        else {
            panic!("expected resume");
        };
        assert_eq!(resumed, key);

        dir.reattach(conn(7), room("AAA111"), "ada", key).unwrap();
        assert_eq!(dir.resolve(conn(7)).unwrap().voter_key, key);
        assert_eq!(dir.connection_count(), 1);
    }
}
