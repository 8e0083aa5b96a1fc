//! Per-connection handler: request dispatch, acks, and the grace path.
//!
//! Each accepted connection gets two tasks: this handler (the reader) and
//! a writer that owns the socket's outbound half. The flow per request:
//!
//!   1. Decode the envelope → dispatch to the right room/registry call
//!   2. Queue the ack for the caller (correlated by the request's `seq`)
//!   3. On a state-changing success, fan the room's events out through the
//!      subscription registry
//!
//! A transport-level disconnect is not an error: it detaches the session,
//! tells the room to hold the member's slot open, and lets the grace-period
//! sweep decide their fate.

use std::sync::Arc;

use pointforge_protocol::{
    AckBody, AckFrame, CardValue, ClientEnvelope, ClientRequest, Codec,
    ConnectionId, DeckType, ErrorCode, RoomCode, ServerEnvelope,
    ServerPayload,
};
use pointforge_room::{JoinReply, JoinMode, RoomError, RoomHandle};
use pointforge_session::{RejoinOutcome, SessionError};
use pointforge_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::subscriptions::OutboundSender;

/// Longest display name accepted at the boundary.
const MAX_NAME_CHARS: usize = 40;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let conn = Arc::new(conn);
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerPayload>();

    // Writer task: the only place that touches the outbound half. It owns
    // the per-connection sequence counter, so acks and fanned-out events
    // can never interleave mid-frame.
    let writer = {
        let conn = Arc::clone(&conn);
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let mut seq: u64 = 1;
            while let Some(payload) = out_rx.recv().await {
                let envelope = ServerEnvelope { seq, payload };
                seq += 1;
                match state.codec.encode(&envelope) {
                    Ok(bytes) => {
                        if conn.send(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            "failed to encode outbound frame"
                        );
                    }
                }
            }
        })
    };

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let envelope: ClientEnvelope = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "malformed frame");
                send_ack(
                    &out_tx,
                    0,
                    AckBody::failed(
                        ErrorCode::BadRequest,
                        "malformed request",
                    ),
                );
                continue;
            }
        };

        let body =
            dispatch(&state, conn_id, &out_tx, envelope.request).await;
        send_ack(&out_tx, envelope.seq, body);
    }

    // Normal input, not an error: start the grace path.
    on_transport_disconnect(&state, conn_id).await;

    drop(out_tx);
    let _ = writer.await;
}

/// Routes one request to its operation and produces the ack body.
async fn dispatch(
    state: &Arc<ServerState>,
    conn_id: ConnectionId,
    out_tx: &OutboundSender,
    request: ClientRequest,
) -> AckBody {
    match request {
        ClientRequest::CreateRoom {
            host_name,
            deck_type,
        } => create_room(state, conn_id, out_tx, &host_name, deck_type).await,
        ClientRequest::JoinRoom {
            room_code,
            user_name,
        } => join_room(state, conn_id, out_tx, &room_code, &user_name).await,
        ClientRequest::LeaveRoom => leave_room(state, conn_id).await,
        ClientRequest::CastVote { vote } => {
            cast_vote(state, conn_id, vote).await
        }
        ClientRequest::StartVoting => start_voting(state, conn_id).await,
        ClientRequest::RevealVotes => reveal_votes(state, conn_id).await,
        ClientRequest::ResetRound => reset_round(state, conn_id).await,
        ClientRequest::MakeHost {
            target_connection_id,
        } => make_host(state, conn_id, target_connection_id).await,
        ClientRequest::RemoveUser {
            target_connection_id,
        } => remove_user(state, conn_id, target_connection_id).await,
    }
}

// ---------------------------------------------------------------------------
// Room creation & joining
// ---------------------------------------------------------------------------

async fn create_room(
    state: &Arc<ServerState>,
    conn_id: ConnectionId,
    out_tx: &OutboundSender,
    host_name: &str,
    deck_type: DeckType,
) -> AckBody {
    let name = match clean_name(host_name) {
        Ok(name) => name,
        Err(ack) => return ack,
    };

    if state.directory.lock().await.resolve(conn_id).is_some() {
        return AckBody::failed(
            ErrorCode::BadRequest,
            "leave your current room first",
        );
    }

    let handle = state.registry.lock().await.create_room(deck_type);
    let code = handle.code().clone();

    let voter_key = match state
        .directory
        .lock()
        .await
        .attach(conn_id, code.clone(), &name)
    {
        Ok(key) => key,
        Err(e) => return AckBody::failed(ErrorCode::BadRequest, e.to_string()),
    };

    // The creator is the sole member and host.
    match handle.join(conn_id, name, JoinMode::Fresh(voter_key)).await {
        Ok(_) => {
            state
                .subscriptions
                .lock()
                .await
                .subscribe(conn_id, code.clone(), out_tx.clone());
            tracing::info!(%conn_id, room = %code, "room created");
            AckBody::RoomCreated {
                success: true,
                room_code: code,
            }
        }
        Err(e) => {
            state.directory.lock().await.remove(conn_id);
            room_failure(&e)
        }
    }
}

async fn join_room(
    state: &Arc<ServerState>,
    conn_id: ConnectionId,
    out_tx: &OutboundSender,
    room_code: &str,
    user_name: &str,
) -> AckBody {
    let name = match clean_name(user_name) {
        Ok(name) => name,
        Err(ack) => return ack,
    };
    // Codes are case-insensitive on input.
    let Ok(code) = RoomCode::parse(room_code) else {
        return AckBody::failed(ErrorCode::NotFound, "room not found");
    };

    // A connection that is already a member re-joining its own room (the
    // client follows create-room with join-room): answer idempotently.
    if let Some(att) = state.directory.lock().await.resolve(conn_id) {
        if att.room != code {
            return AckBody::failed(
                ErrorCode::BadRequest,
                "leave your current room first",
            );
        }
        let handle = match state.registry.lock().await.get(&code) {
            Ok(handle) => handle,
            Err(e) => return room_failure(&e),
        };
        return match handle
            .join(conn_id, name, JoinMode::Resume(att.voter_key))
            .await
        {
            Ok(reply) => joined(state, conn_id, out_tx, &code, reply).await,
            Err(e) => room_failure(&e),
        };
    }

    let handle = match state.registry.lock().await.get(&code) {
        Ok(handle) => handle,
        Err(e) => return room_failure(&e),
    };

    // The directory, not the client, decides whether this is a resume.
    let rejoin =
        state.directory.lock().await.resolve_rejoin(&code, &name);
    match rejoin {
        Err(e @ SessionError::IdentityRevoked { .. }) => {
            AckBody::failed(ErrorCode::Forbidden, e.to_string())
        }
        Err(e) => AckBody::failed(ErrorCode::BadRequest, e.to_string()),
        Ok(RejoinOutcome::Resume(key)) => {
            match handle
                .join(conn_id, name.clone(), JoinMode::Resume(key))
                .await
            {
                Ok(reply) => {
                    if let Err(e) = state
                        .directory
                        .lock()
                        .await
                        .reattach(conn_id, code.clone(), &name, key)
                    {
                        tracing::warn!(
                            %conn_id, error = %e,
                            "reattach bookkeeping failed"
                        );
                    }
                    joined(state, conn_id, out_tx, &code, reply).await
                }
                Err(e) => room_failure(&e),
            }
        }
        Ok(RejoinOutcome::Fresh) => {
            let key = match state
                .directory
                .lock()
                .await
                .attach(conn_id, code.clone(), &name)
            {
                Ok(key) => key,
                Err(e) => {
                    return AckBody::failed(
                        ErrorCode::BadRequest,
                        e.to_string(),
                    );
                }
            };
            match handle.join(conn_id, name, JoinMode::Fresh(key)).await {
                Ok(reply) => {
                    joined(state, conn_id, out_tx, &code, reply).await
                }
                Err(e) => {
                    state.directory.lock().await.remove(conn_id);
                    room_failure(&e)
                }
            }
        }
    }
}

/// Subscribes the joiner, announces them to the room, builds their ack.
async fn joined(
    state: &Arc<ServerState>,
    conn_id: ConnectionId,
    out_tx: &OutboundSender,
    code: &RoomCode,
    reply: JoinReply,
) -> AckBody {
    let mut subscriptions = state.subscriptions.lock().await;
    subscriptions.subscribe(conn_id, code.clone(), out_tx.clone());
    subscriptions.fan_out(code, &reply.outbound);
    drop(subscriptions);

    tracing::info!(
        %conn_id,
        room = %code,
        reconnection = reply.is_reconnection,
        "joined room"
    );

    AckBody::RoomJoined {
        success: true,
        room: reply.room,
        user: reply.user,
        stats: reply.stats,
        user_vote: reply.user_vote,
        is_reconnection: reply.is_reconnection,
    }
}

// ---------------------------------------------------------------------------
// Room-scoped operations
// ---------------------------------------------------------------------------

async fn leave_room(
    state: &Arc<ServerState>,
    conn_id: ConnectionId,
) -> AckBody {
    // Leaving while not in a room is a no-op, not an error.
    let Some(att) = state.directory.lock().await.remove(conn_id) else {
        return AckBody::done();
    };
    state.subscriptions.lock().await.unsubscribe(conn_id);

    if let Ok(handle) = state.registry.lock().await.get(&att.room) {
        match handle.leave(conn_id).await {
            Ok(reply) => {
                state
                    .subscriptions
                    .lock()
                    .await
                    .fan_out(&att.room, &reply.outbound);
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "leave failed");
            }
        }
    }
    AckBody::done()
}

async fn cast_vote(
    state: &Arc<ServerState>,
    conn_id: ConnectionId,
    vote: CardValue,
) -> AckBody {
    let (code, handle) = match resolve_member(state, conn_id).await {
        Ok(found) => found,
        Err(ack) => return ack,
    };
    match handle.cast_vote(conn_id, vote).await {
        Ok(outbound) => {
            state.subscriptions.lock().await.fan_out(&code, &outbound);
            AckBody::done()
        }
        Err(e) => room_failure(&e),
    }
}

async fn start_voting(
    state: &Arc<ServerState>,
    conn_id: ConnectionId,
) -> AckBody {
    let (code, handle) = match resolve_member(state, conn_id).await {
        Ok(found) => found,
        Err(ack) => return ack,
    };
    match handle.start_voting(conn_id).await {
        Ok((stats, outbound)) => {
            state.subscriptions.lock().await.fan_out(&code, &outbound);
            AckBody::VotingStarted {
                success: true,
                stats,
            }
        }
        Err(e) => room_failure(&e),
    }
}

async fn reveal_votes(
    state: &Arc<ServerState>,
    conn_id: ConnectionId,
) -> AckBody {
    let (code, handle) = match resolve_member(state, conn_id).await {
        Ok(found) => found,
        Err(ack) => return ack,
    };
    match handle.reveal_votes(conn_id).await {
        Ok(outbound) => {
            state.subscriptions.lock().await.fan_out(&code, &outbound);
            AckBody::done()
        }
        Err(e) => room_failure(&e),
    }
}

async fn reset_round(
    state: &Arc<ServerState>,
    conn_id: ConnectionId,
) -> AckBody {
    let (code, handle) = match resolve_member(state, conn_id).await {
        Ok(found) => found,
        Err(ack) => return ack,
    };
    match handle.reset_round(conn_id).await {
        Ok(outbound) => {
            state.subscriptions.lock().await.fan_out(&code, &outbound);
            AckBody::done()
        }
        Err(e) => room_failure(&e),
    }
}

async fn make_host(
    state: &Arc<ServerState>,
    conn_id: ConnectionId,
    target: ConnectionId,
) -> AckBody {
    let (code, handle) = match resolve_member(state, conn_id).await {
        Ok(found) => found,
        Err(ack) => return ack,
    };
    match handle.make_host(conn_id, target).await {
        Ok(outbound) => {
            state.subscriptions.lock().await.fan_out(&code, &outbound);
            AckBody::done()
        }
        Err(e) => room_failure(&e),
    }
}

async fn remove_user(
    state: &Arc<ServerState>,
    conn_id: ConnectionId,
    target: ConnectionId,
) -> AckBody {
    let (code, handle) = match resolve_member(state, conn_id).await {
        Ok(found) => found,
        Err(ack) => return ack,
    };
    match handle.remove_user(conn_id, target).await {
        Ok(removal) => {
            // Revoke the identity before anything reaches the target, so
            // a rejoin racing the kick cannot resume it. The terminal
            // notice goes out while the target is still subscribed.
            state.directory.lock().await.revoke(
                &code,
                removal.target_key,
                Some(removal.target_conn),
            );
            state
                .subscriptions
                .lock()
                .await
                .fan_out(&code, &removal.outbound);
            state
                .subscriptions
                .lock()
                .await
                .unsubscribe(removal.target_conn);
            tracing::info!(
                room = %code,
                target = %removal.target_conn,
                "member kicked"
            );
            AckBody::done()
        }
        Err(e) => room_failure(&e),
    }
}

// ---------------------------------------------------------------------------
// Disconnects & shared plumbing
// ---------------------------------------------------------------------------

/// The grace path: triggered by the transport, never by a request.
pub(crate) async fn on_transport_disconnect(
    state: &Arc<ServerState>,
    conn_id: ConnectionId,
) {
    state.subscriptions.lock().await.unsubscribe(conn_id);

    let Some(att) = state.directory.lock().await.detach(conn_id) else {
        return;
    };

    if let Ok(handle) = state.registry.lock().await.get(&att.room) {
        match handle.disconnect(conn_id).await {
            Ok(outbound) => {
                state
                    .subscriptions
                    .lock()
                    .await
                    .fan_out(&att.room, &outbound);
            }
            Err(e) => {
                tracing::debug!(
                    %conn_id, error = %e,
                    "disconnect handling failed"
                );
            }
        }
    }
}

/// Resolves the caller to their room, or fails the ack.
///
/// A connection whose room was destroyed out from under it gets
/// `room-closed` once, and its stale attachment is dropped.
async fn resolve_member(
    state: &Arc<ServerState>,
    conn_id: ConnectionId,
) -> Result<(RoomCode, RoomHandle), AckBody> {
    let Some(att) = state.directory.lock().await.resolve(conn_id) else {
        return Err(AckBody::failed(
            ErrorCode::BadRequest,
            "join a room first",
        ));
    };

    match state.registry.lock().await.get(&att.room) {
        Ok(handle) => Ok((att.room, handle)),
        Err(_) => {
            state.directory.lock().await.remove(conn_id);
            state.subscriptions.lock().await.unsubscribe(conn_id);
            Err(AckBody::failed(
                ErrorCode::RoomClosed,
                "the room has closed",
            ))
        }
    }
}

fn room_failure(error: &RoomError) -> AckBody {
    AckBody::failed(error.code(), error.to_string())
}

fn clean_name(raw: &str) -> Result<String, AckBody> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AckBody::failed(
            ErrorCode::BadRequest,
            "a display name is required",
        ));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(AckBody::failed(
            ErrorCode::BadRequest,
            "display name is too long",
        ));
    }
    Ok(name.to_string())
}

fn send_ack(out_tx: &OutboundSender, reply_to: u64, body: AckBody) {
    let _ = out_tx.send(ServerPayload::Ack(AckFrame { reply_to, body }));
}
