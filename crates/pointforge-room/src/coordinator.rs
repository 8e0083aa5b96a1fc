//! Room coordinator: an isolated Tokio task that owns one room.
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel — the actor model. Every mutating operation
//! (join, vote, round transitions, host transfer, kick, disconnect, the
//! expiry sweep) is processed to completion before the next begins, which
//! makes the room invariants atomic by construction.
//!
//! The coordinator knows nothing about transport. Operations reply with
//! the caller's result plus a list of scoped [`Outbound`] events; the
//! gateway owns the connection list and does the fan-out.

use std::time::Instant;

use pointforge_protocol::{
    CardValue, ConnectionId, RoomCode, RoomSnapshot, RoundState,
    RoundStats, ServerEvent, UserInfo,
};
use pointforge_session::VoterKey;
use tokio::sync::{mpsc, oneshot};

use crate::stats::revealed_votes;
use crate::{Participant, RoomConfig, RoomError, RoomState, compute_stats};

// ---------------------------------------------------------------------------
// Outbound events
// ---------------------------------------------------------------------------

/// Who should receive an outbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every connection currently joined to the room.
    All,
    /// Every connection except the given one (typically the caller, who
    /// already has the same information in their ack).
    AllExcept(ConnectionId),
    /// One specific connection (the kicked member's terminal notice).
    Connection(ConnectionId),
}

/// One event to fan out, paired with its delivery scope.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub scope: Scope,
    pub event: ServerEvent,
}

impl Outbound {
    fn all(event: ServerEvent) -> Self {
        Self {
            scope: Scope::All,
            event,
        }
    }

    fn except(conn: ConnectionId, event: ServerEvent) -> Self {
        Self {
            scope: Scope::AllExcept(conn),
            event,
        }
    }

    fn only(conn: ConnectionId, event: ServerEvent) -> Self {
        Self {
            scope: Scope::Connection(conn),
            event,
        }
    }
}

// ---------------------------------------------------------------------------
// Operation replies
// ---------------------------------------------------------------------------

/// How a join attaches to the room.
///
/// The gateway consults the session directory first and tells the
/// coordinator which membership the join acts as; the coordinator decides
/// nothing about identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    /// A brand-new membership under the given key.
    Fresh(VoterKey),
    /// Reattach the retained membership with the given key.
    Resume(VoterKey),
}

impl JoinMode {
    fn key(self) -> VoterKey {
        match self {
            Self::Fresh(key) | Self::Resume(key) => key,
        }
    }
}

/// Everything a (re)joining client needs, plus the events for the room.
#[derive(Debug, Clone)]
pub struct JoinReply {
    pub room: RoomSnapshot,
    pub user: UserInfo,
    pub stats: RoundStats,
    /// The joiner's already-cast vote when resuming mid-round.
    pub user_vote: Option<CardValue>,
    pub is_reconnection: bool,
    pub outbound: Vec<Outbound>,
}

/// Result of an explicit leave.
#[derive(Debug, Clone)]
pub struct LeaveReply {
    pub user_name: String,
    pub outbound: Vec<Outbound>,
}

/// Result of a kick: who was removed, and where to send what.
#[derive(Debug, Clone)]
pub struct RemovalReply {
    pub target_name: String,
    pub target_key: VoterKey,
    pub target_conn: ConnectionId,
    pub outbound: Vec<Outbound>,
}

/// A member structurally removed by the expiry sweep.
#[derive(Debug, Clone)]
pub struct ExpiredMember {
    pub voter_key: VoterKey,
    pub name: String,
}

/// Result of one expiry sweep pass.
#[derive(Debug, Clone)]
pub struct SweepReport {
    /// Members whose reconnection grace elapsed this pass.
    pub expired: Vec<ExpiredMember>,
    pub outbound: Vec<Outbound>,
    /// `true` once the room has been empty past its grace period and the
    /// registry may destroy it.
    pub expendable: bool,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Commands sent to a room coordinator through its channel. Each carries a
/// reply channel; the caller awaits the result.
pub(crate) enum RoomCommand {
    Join {
        conn: ConnectionId,
        name: String,
        mode: JoinMode,
        reply: oneshot::Sender<Result<JoinReply, RoomError>>,
    },
    Leave {
        conn: ConnectionId,
        reply: oneshot::Sender<Result<LeaveReply, RoomError>>,
    },
    Disconnect {
        conn: ConnectionId,
        reply: oneshot::Sender<Result<Vec<Outbound>, RoomError>>,
    },
    CastVote {
        conn: ConnectionId,
        vote: CardValue,
        reply: oneshot::Sender<Result<Vec<Outbound>, RoomError>>,
    },
    StartVoting {
        conn: ConnectionId,
        reply:
            oneshot::Sender<Result<(RoundStats, Vec<Outbound>), RoomError>>,
    },
    RevealVotes {
        conn: ConnectionId,
        reply: oneshot::Sender<Result<Vec<Outbound>, RoomError>>,
    },
    ResetRound {
        conn: ConnectionId,
        reply: oneshot::Sender<Result<Vec<Outbound>, RoomError>>,
    },
    MakeHost {
        conn: ConnectionId,
        target: ConnectionId,
        reply: oneshot::Sender<Result<Vec<Outbound>, RoomError>>,
    },
    RemoveUser {
        conn: ConnectionId,
        target: ConnectionId,
        reply: oneshot::Sender<Result<RemovalReply, RoomError>>,
    },
    Sweep {
        reply: oneshot::Sender<SweepReport>,
    },
    Shutdown,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running room coordinator. Cheap to clone — just an
/// `mpsc::Sender` wrapper. The registry holds one per room.
///
/// Every method maps a closed command channel to
/// [`RoomError::RoomClosed`]: the room was destroyed while the operation
/// was in flight.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// The room's code.
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::RoomClosed(self.code.clone()))
    }

    fn closed(&self) -> RoomError {
        RoomError::RoomClosed(self.code.clone())
    }

    /// Joins (or rejoins) the room.
    pub async fn join(
        &self,
        conn: ConnectionId,
        name: impl Into<String>,
        mode: JoinMode,
    ) -> Result<JoinReply, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Join {
            conn,
            name: name.into(),
            mode,
            reply,
        })
        .await?;
        rx.await.map_err(|_| self.closed())?
    }

    /// Removes the caller's membership for good.
    pub async fn leave(
        &self,
        conn: ConnectionId,
    ) -> Result<LeaveReply, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Leave { conn, reply }).await?;
        rx.await.map_err(|_| self.closed())?
    }

    /// Marks the caller disconnected; their slot is held for the grace
    /// period.
    pub async fn disconnect(
        &self,
        conn: ConnectionId,
    ) -> Result<Vec<Outbound>, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Disconnect { conn, reply }).await?;
        rx.await.map_err(|_| self.closed())?
    }

    /// Records or overwrites the caller's vote.
    pub async fn cast_vote(
        &self,
        conn: ConnectionId,
        vote: CardValue,
    ) -> Result<Vec<Outbound>, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::CastVote { conn, vote, reply })
            .await?;
        rx.await.map_err(|_| self.closed())?
    }

    /// Host only: begins a voting round.
    pub async fn start_voting(
        &self,
        conn: ConnectionId,
    ) -> Result<(RoundStats, Vec<Outbound>), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::StartVoting { conn, reply }).await?;
        rx.await.map_err(|_| self.closed())?
    }

    /// Host only: exposes the collected votes.
    pub async fn reveal_votes(
        &self,
        conn: ConnectionId,
    ) -> Result<Vec<Outbound>, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::RevealVotes { conn, reply }).await?;
        rx.await.map_err(|_| self.closed())?
    }

    /// Host only: clears votes and returns to idle.
    pub async fn reset_round(
        &self,
        conn: ConnectionId,
    ) -> Result<Vec<Outbound>, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::ResetRound { conn, reply }).await?;
        rx.await.map_err(|_| self.closed())?
    }

    /// Host only: hands the host role to another member.
    pub async fn make_host(
        &self,
        conn: ConnectionId,
        target: ConnectionId,
    ) -> Result<Vec<Outbound>, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::MakeHost {
            conn,
            target,
            reply,
        })
        .await?;
        rx.await.map_err(|_| self.closed())?
    }

    /// Host only: kicks a member.
    pub async fn remove_user(
        &self,
        conn: ConnectionId,
        target: ConnectionId,
    ) -> Result<RemovalReply, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::RemoveUser {
            conn,
            target,
            reply,
        })
        .await?;
        rx.await.map_err(|_| self.closed())?
    }

    /// Runs one expiry sweep pass through the room's own queue.
    pub async fn sweep(&self) -> Result<SweepReport, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Sweep { reply }).await?;
        rx.await.map_err(|_| self.closed())
    }

    /// Tells the room to shut down.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(RoomCommand::Shutdown).await
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// The coordinator's internal state. Runs inside a Tokio task.
struct RoomActor {
    state: RoomState,
    config: RoomConfig,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop, processing commands until shutdown.
    async fn run(mut self) {
        tracing::info!(room = %self.state.code, "room coordinator started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join {
                    conn,
                    name,
                    mode,
                    reply,
                } => {
                    let _ = reply.send(self.handle_join(conn, &name, mode));
                }
                RoomCommand::Leave { conn, reply } => {
                    let _ = reply.send(self.handle_leave(conn));
                }
                RoomCommand::Disconnect { conn, reply } => {
                    let _ = reply.send(self.handle_disconnect(conn));
                }
                RoomCommand::CastVote { conn, vote, reply } => {
                    let _ = reply.send(self.handle_cast_vote(conn, vote));
                }
                RoomCommand::StartVoting { conn, reply } => {
                    let _ = reply.send(self.handle_start_voting(conn));
                }
                RoomCommand::RevealVotes { conn, reply } => {
                    let _ = reply.send(self.handle_reveal_votes(conn));
                }
                RoomCommand::ResetRound { conn, reply } => {
                    let _ = reply.send(self.handle_reset_round(conn));
                }
                RoomCommand::MakeHost {
                    conn,
                    target,
                    reply,
                } => {
                    let _ = reply.send(self.handle_make_host(conn, target));
                }
                RoomCommand::RemoveUser {
                    conn,
                    target,
                    reply,
                } => {
                    let _ =
                        reply.send(self.handle_remove_user(conn, target));
                }
                RoomCommand::Sweep { reply } => {
                    let _ = reply.send(self.handle_sweep());
                }
                RoomCommand::Shutdown => {
                    tracing::info!(
                        room = %self.state.code,
                        "room shutting down"
                    );
                    break;
                }
            }
        }

        tracing::info!(room = %self.state.code, "room coordinator stopped");
    }

    /// Applies one operation copy-on-write: the closure mutates a working
    /// copy, the invariants are re-checked, and only a clean result is
    /// committed. A violation aborts this operation — the room keeps its
    /// previous state and stays alive.
    fn mutate<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut RoomState) -> Result<T, RoomError>,
    ) -> Result<T, RoomError> {
        let mut draft = self.state.clone();
        let value = f(&mut draft)?;
        draft.last_activity = Instant::now();

        if let Err(violation) = draft.check() {
            tracing::error!(
                room = %self.state.code,
                op,
                %violation,
                "invariant violated, operation rolled back"
            );
            return Err(RoomError::Invariant(violation));
        }

        self.state = draft;
        Ok(value)
    }

    /// Resolves the caller to their membership, or `Forbidden`.
    fn caller(&self, conn: ConnectionId) -> Result<VoterKey, RoomError> {
        self.state
            .by_connection(conn)
            .map(|p| p.voter_key)
            .ok_or_else(|| {
                RoomError::Forbidden("you are not a member of this room".into())
            })
    }

    /// Resolves the caller and requires the host role.
    fn require_host(
        &self,
        conn: ConnectionId,
        op: &str,
    ) -> Result<VoterKey, RoomError> {
        let key = self.caller(conn)?;
        if self.state.is_host(key) {
            Ok(key)
        } else {
            Err(RoomError::Forbidden(format!("only the host can {op}")))
        }
    }

    fn user_info(&self, key: VoterKey) -> Option<UserInfo> {
        self.state.participant(key).map(|p| UserInfo {
            connection_id: p.connection_id,
            name: p.name.clone(),
            is_host: self.state.is_host(p.voter_key),
            connected: p.connected,
        })
    }

    // -- join ------------------------------------------------------------

    fn handle_join(
        &mut self,
        conn: ConnectionId,
        name: &str,
        mode: JoinMode,
    ) -> Result<JoinReply, RoomError> {
        // Idempotent re-join by a connection that is already a member
        // (the client follows create-room with join-room): answer with the
        // current picture, no broadcast.
        if let Some(p) = self.state.by_connection(conn) {
            let key = p.voter_key;
            return Ok(JoinReply {
                room: self.state.snapshot(),
                user: self.user_info(key).unwrap_or_else(|| UserInfo {
                    connection_id: Some(conn),
                    name: name.to_string(),
                    is_host: false,
                    connected: true,
                }),
                stats: compute_stats(&self.state),
                user_vote: self.state.votes.get(&key).cloned(),
                is_reconnection: false,
                outbound: Vec::new(),
            });
        }

        let key = mode.key();
        let resuming = matches!(mode, JoinMode::Resume(_))
            && self.state.participant(key).is_some();

        self.mutate("join", |state| {
            if resuming {
                // Reattach: same membership, new connection. Host role and
                // any cast vote ride along untouched.
                if let Some(p) = state.participant_mut(key) {
                    p.connection_id = Some(conn);
                    p.connected = true;
                    p.disconnected_at = None;
                }
            } else {
                state.users.push(Participant::new(key, conn, name));
                // First member of an empty room becomes host.
                if state.host_key.is_none() {
                    state.host_key = Some(key);
                }
            }
            state.empty_since = None;
            Ok(())
        })?;

        let user = self
            .user_info(key)
            .ok_or_else(|| RoomError::Invariant("joined member missing".into()))?;

        tracing::info!(
            room = %self.state.code,
            %conn,
            name,
            reconnection = resuming,
            members = self.state.users.len(),
            "member joined"
        );

        Ok(JoinReply {
            room: self.state.snapshot(),
            user: user.clone(),
            stats: compute_stats(&self.state),
            user_vote: self.state.votes.get(&key).cloned(),
            is_reconnection: resuming,
            outbound: vec![Outbound::except(
                conn,
                ServerEvent::UserJoined {
                    user,
                    is_reconnection: resuming,
                },
            )],
        })
    }

    // -- membership ------------------------------------------------------

    fn handle_leave(
        &mut self,
        conn: ConnectionId,
    ) -> Result<LeaveReply, RoomError> {
        let key = self.caller(conn)?;

        let (name, new_host) =
            self.mutate("leave", |state| Ok(remove_member(state, key)))?;

        tracing::info!(
            room = %self.state.code,
            %conn,
            name,
            members = self.state.users.len(),
            "member left"
        );

        Ok(LeaveReply {
            user_name: name.clone(),
            outbound: vec![Outbound::except(
                conn,
                ServerEvent::UserLeft {
                    user_name: name,
                    new_host,
                    stats: compute_stats(&self.state),
                },
            )],
        })
    }

    fn handle_disconnect(
        &mut self,
        conn: ConnectionId,
    ) -> Result<Vec<Outbound>, RoomError> {
        let key = self.caller(conn)?;

        self.mutate("disconnect", |state| {
            if let Some(p) = state.participant_mut(key) {
                p.connection_id = None;
                p.connected = false;
                p.disconnected_at = Some(Instant::now());
            }
            Ok(())
        })?;

        tracing::info!(
            room = %self.state.code,
            %conn,
            "member disconnected, grace period started"
        );

        // No dedicated event in the contract; a full resync lets the
        // remaining clients render the member as not-connected.
        Ok(vec![Outbound::all(ServerEvent::RoomUpdated {
            room: self.state.snapshot(),
            new_host_name: None,
        })])
    }

    fn handle_make_host(
        &mut self,
        conn: ConnectionId,
        target: ConnectionId,
    ) -> Result<Vec<Outbound>, RoomError> {
        self.require_host(conn, "transfer the host role")?;

        let target_key = self
            .state
            .by_connection(target)
            .map(|p| p.voter_key)
            .ok_or_else(|| {
                RoomError::Forbidden("target is not a member of this room".into())
            })?;

        self.mutate("make-host", |state| {
            state.host_key = Some(target_key);
            Ok(())
        })?;

        let new_host_name = self
            .state
            .participant(target_key)
            .map(|p| p.name.clone());

        tracing::info!(
            room = %self.state.code,
            new_host = new_host_name.as_deref().unwrap_or(""),
            "host role transferred"
        );

        Ok(vec![Outbound::all(ServerEvent::RoomUpdated {
            room: self.state.snapshot(),
            new_host_name,
        })])
    }

    fn handle_remove_user(
        &mut self,
        conn: ConnectionId,
        target: ConnectionId,
    ) -> Result<RemovalReply, RoomError> {
        self.require_host(conn, "remove a member")?;

        let target_key = self
            .state
            .by_connection(target)
            .map(|p| p.voter_key)
            .ok_or_else(|| {
                RoomError::Forbidden("target is not a member of this room".into())
            })?;

        let (name, new_host) = self
            .mutate("remove-user", |state| {
                Ok(remove_member(state, target_key))
            })?;

        tracing::info!(
            room = %self.state.code,
            target = %target,
            name,
            "member removed by host"
        );

        Ok(RemovalReply {
            target_name: name.clone(),
            target_key,
            target_conn: target,
            outbound: vec![
                Outbound::only(target, ServerEvent::Removed),
                Outbound::except(
                    target,
                    ServerEvent::UserLeft {
                        user_name: name,
                        new_host,
                        stats: compute_stats(&self.state),
                    },
                ),
            ],
        })
    }

    // -- round machine ---------------------------------------------------

    fn handle_cast_vote(
        &mut self,
        conn: ConnectionId,
        vote: CardValue,
    ) -> Result<Vec<Outbound>, RoomError> {
        let key = self.caller(conn)?;

        let name = self.mutate("cast-vote", |state| {
            if state.round_state != RoundState::Voting {
                return Err(RoomError::InvalidState {
                    op: "cast a vote",
                    state: state.round_state,
                });
            }
            if !state.deck_type.contains(&vote) {
                return Err(RoomError::InvalidCard(vote.clone()));
            }
            state.votes.insert(key, vote.clone());
            Ok(state
                .participant(key)
                .map(|p| p.name.clone())
                .unwrap_or_default())
        })?;

        tracing::debug!(room = %self.state.code, %conn, "vote recorded");

        Ok(vec![Outbound::all(ServerEvent::VoteCast {
            user_name: name,
            vote,
            stats: compute_stats(&self.state),
        })])
    }

    fn handle_start_voting(
        &mut self,
        conn: ConnectionId,
    ) -> Result<(RoundStats, Vec<Outbound>), RoomError> {
        self.require_host(conn, "start voting")?;

        self.mutate("start-voting", |state| {
            transition(state, RoundState::Voting, "start voting")?;
            state.votes.clear();
            Ok(())
        })?;

        tracing::info!(room = %self.state.code, "voting started");

        let stats = compute_stats(&self.state);
        Ok((
            stats,
            vec![Outbound::all(ServerEvent::VotingStarted {
                round_state: self.state.round_state,
            })],
        ))
    }

    fn handle_reveal_votes(
        &mut self,
        conn: ConnectionId,
    ) -> Result<Vec<Outbound>, RoomError> {
        self.require_host(conn, "reveal votes")?;

        // No mutation beyond the transition — the collected votes are
        // simply exposed. Revealing an already-revealed round is a
        // self-loop: the same votes go out again.
        self.mutate("reveal-votes", |state| {
            if state.round_state == RoundState::Revealed {
                return Ok(());
            }
            transition(state, RoundState::Revealed, "reveal votes")
        })?;

        tracing::info!(room = %self.state.code, "votes revealed");

        Ok(vec![Outbound::all(ServerEvent::VotesRevealed {
            round_state: self.state.round_state,
            stats: compute_stats(&self.state),
            votes: revealed_votes(&self.state),
        })])
    }

    fn handle_reset_round(
        &mut self,
        conn: ConnectionId,
    ) -> Result<Vec<Outbound>, RoomError> {
        self.require_host(conn, "reset the round")?;

        self.mutate("reset-round", |state| {
            transition(state, RoundState::Idle, "reset the round")?;
            state.votes.clear();
            Ok(())
        })?;

        tracing::info!(room = %self.state.code, "round reset");

        Ok(vec![Outbound::all(ServerEvent::RoundReset {
            round_state: self.state.round_state,
        })])
    }

    // -- sweep -----------------------------------------------------------

    fn handle_sweep(&mut self) -> SweepReport {
        let grace = self.config.reconnect_grace;

        let result = self.mutate("sweep", |state| {
            let stale: Vec<VoterKey> = state
                .users
                .iter()
                .filter(|p| {
                    p.disconnected_at
                        .is_some_and(|since| since.elapsed() > grace)
                })
                .map(|p| p.voter_key)
                .collect();

            let mut expired = Vec::with_capacity(stale.len());
            let mut outbound = Vec::with_capacity(stale.len());
            for key in stale {
                let name = state
                    .participant(key)
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                let (_, new_host) = remove_member(state, key);
                outbound.push(Outbound::all(ServerEvent::UserLeft {
                    user_name: name.clone(),
                    new_host,
                    stats: compute_stats(state),
                }));
                expired.push(ExpiredMember {
                    voter_key: key,
                    name,
                });
            }
            Ok((expired, outbound))
        });

        let (expired, outbound) = match result {
            Ok(pair) => pair,
            // A sweep must never take the room down; a rolled-back sweep
            // just runs again next interval.
            Err(_) => (Vec::new(), Vec::new()),
        };

        if !expired.is_empty() {
            tracing::info!(
                room = %self.state.code,
                expired = expired.len(),
                "grace-elapsed members removed"
            );
        }

        let expendable = self.state.users.is_empty()
            && self
                .state
                .empty_since
                .is_some_and(|since| since.elapsed() > self.config.empty_room_grace);

        SweepReport {
            expired,
            outbound,
            expendable,
        }
    }
}

/// Applies a round-state transition, or fails with `InvalidState` if the
/// edge is not legal.
fn transition(
    state: &mut RoomState,
    target: RoundState,
    op: &'static str,
) -> Result<(), RoomError> {
    if !state.round_state.can_transition_to(target) {
        return Err(RoomError::InvalidState {
            op,
            state: state.round_state,
        });
    }
    state.round_state = target;
    Ok(())
}

/// Removes one member: drops them from the roster and the tally, promotes
/// the longest-tenured remaining member if the host left, and starts the
/// empty-room clock if nobody remains.
///
/// Returns the removed member's name and the new host's name, if a
/// promotion happened.
fn remove_member(
    state: &mut RoomState,
    key: VoterKey,
) -> (String, Option<String>) {
    let name = state
        .participant(key)
        .map(|p| p.name.clone())
        .unwrap_or_default();

    state.users.retain(|p| p.voter_key != key);
    state.votes.remove(&key);

    let mut new_host = None;
    if state.host_key == Some(key) {
        // Longest-tenured remaining member: first by insertion order.
        state.host_key = state.users.first().map(|p| p.voter_key);
        new_host = state.users.first().map(|p| p.name.clone());
    }

    if state.users.is_empty() {
        state.host_key = None;
        state.empty_since = Some(Instant::now());
    }

    (name, new_host)
}

/// Spawns a new room coordinator task and returns a handle to it.
///
/// `channel_size` controls backpressure — a full channel makes senders
/// wait rather than letting one room queue unboundedly.
pub(crate) fn spawn_room(
    state: RoomState,
    config: RoomConfig,
    channel_size: usize,
) -> RoomHandle {
    let code = state.code.clone();
    let (tx, rx) = mpsc::channel(channel_size);

    let actor = RoomActor {
        state,
        config,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { code, sender: tx }
}
