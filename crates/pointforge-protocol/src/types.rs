//! Core protocol types for Pointforge's wire format.
//!
//! Everything here travels on the wire. The contract mirrors the browser
//! client's socket events: enum tags are kebab-case (`"join-room"`,
//! `"votes-revealed"`) and field names camelCase (`"roomCode"`,
//! `"isReconnection"`), so a frame in DevTools reads exactly like the
//! client-side handler that consumes it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::deck::{CardValue, DeckType};
use crate::error::ProtocolError;
use pointforge_transport::ConnectionId;

// ---------------------------------------------------------------------------
// Room codes
// ---------------------------------------------------------------------------

/// A room's unique, human-typeable identifier.
///
/// Six uppercase alphanumeric characters. Input is case-insensitive:
/// [`RoomCode::parse`] normalizes before validating, so `"ab3x9k"` and
/// `"AB3X9K"` name the same room. Serializes as a plain string.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Fixed length of every room code.
    pub const LENGTH: usize = 6;

    /// Parses and normalizes a room code.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidRoomCode`] unless the input is
    /// exactly six ASCII letters/digits (any case).
    pub fn parse(input: &str) -> Result<Self, ProtocolError> {
        let code = input.trim().to_ascii_uppercase();
        let valid = code.len() == Self::LENGTH
            && code
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        if valid {
            Ok(Self(code))
        } else {
            Err(ProtocolError::InvalidRoomCode(input.to_string()))
        }
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Round state machine
// ---------------------------------------------------------------------------

/// The state of a room's current voting round.
///
/// The only legal edges:
///
/// ```text
///   idle ──(start-voting)──→ voting ──(reveal-votes)──→ revealed
///     ↑                         │                           │
///     └───────(reset-round)─────┴───────(reset-round)───────┘
/// ```
///
/// Shared with the client, which renders its controls off this value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum RoundState {
    /// No round in flight. The initial state of every room.
    #[default]
    Idle,
    /// Votes are being collected; their values stay hidden.
    Voting,
    /// Votes are exposed; no further votes accepted.
    Revealed,
}

impl RoundState {
    /// Returns `true` if transitioning to `target` is a legal edge.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Idle, Self::Voting)
                | (Self::Voting, Self::Revealed)
                | (Self::Voting, Self::Idle)
                | (Self::Revealed, Self::Idle)
        )
    }
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Voting => write!(f, "voting"),
            Self::Revealed => write!(f, "revealed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshots — what clients see of a room
// ---------------------------------------------------------------------------

/// One member as presented to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// The member's live connection, absent while disconnected-but-retained.
    pub connection_id: Option<ConnectionId>,
    /// Display name. Not unique; presentation only.
    pub name: String,
    /// Derived: whether this member currently holds the host role.
    pub is_host: bool,
    /// `false` during the reconnection grace period.
    pub connected: bool,
}

/// An immutable, wire-ready view of a room.
///
/// Produced by the room coordinator after each mutation; never a live
/// reference into room state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub code: RoomCode,
    pub deck_type: DeckType,
    pub round_state: RoundState,
    /// Members in join order (the client renders them in this order).
    pub users: Vec<UserInfo>,
    /// The host's live connection, absent while the host is disconnected.
    pub host_connection_id: Option<ConnectionId>,
}

/// Vote participation and aggregate figures for the current round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStats {
    /// Currently-connected members.
    pub total_users: usize,
    /// Connected members whose vote has been recorded.
    pub voted_users: usize,
    /// Mean of the numeric votes; `null` when no numeric vote exists.
    pub average: Option<f64>,
    /// The vote values keyed by display name — populated only once the
    /// round is revealed, `null` before that to keep in-progress votes
    /// secret.
    pub votes: Option<BTreeMap<String, CardValue>>,
}

// ---------------------------------------------------------------------------
// Requests — client → server
// ---------------------------------------------------------------------------

/// Every operation a client can request, one variant per socket event.
///
/// `#[serde(tag = "type")]` gives internally tagged JSON, e.g.
/// `{ "type": "join-room", "roomCode": "AB3X9K", "userName": "ada" }`.
/// An unknown tag fails to parse and is answered with a `bad-request` ack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientRequest {
    /// Open a new room and become its host.
    CreateRoom {
        host_name: String,
        deck_type: DeckType,
    },
    /// Join (or rejoin) a room by code. The code is accepted in any case.
    JoinRoom {
        room_code: String,
        user_name: String,
    },
    /// Leave the current room for good (no grace period).
    LeaveRoom,
    /// Record or overwrite the caller's vote for the current round.
    CastVote { vote: CardValue },
    /// Host only: begin collecting votes.
    StartVoting,
    /// Host only: expose the collected votes.
    RevealVotes,
    /// Host only: clear votes and return to idle.
    ResetRound,
    /// Host only: hand the host role to another member.
    MakeHost { target_connection_id: ConnectionId },
    /// Host only: kick a member.
    RemoveUser { target_connection_id: ConnectionId },
}

// ---------------------------------------------------------------------------
// Acknowledgements — server → calling client
// ---------------------------------------------------------------------------

/// Stable, typed reason codes for rejected operations.
///
/// The message next to a code is for humans; the code is what clients
/// branch on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// The room code names no live room.
    NotFound,
    /// The operation is illegal in the room's current round state.
    InvalidState,
    /// The vote value is not a card in the room's deck.
    InvalidCard,
    /// Caller lacks the host role, or the target is not a member.
    Forbidden,
    /// The room was destroyed while the operation was in flight.
    RoomClosed,
    /// The request itself was malformed.
    BadRequest,
    /// An internal invariant violation; the operation was rolled back.
    Internal,
}

/// The direct reply to one request, delivered only to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum AckBody {
    /// Reply to create-room.
    RoomCreated { success: bool, room_code: RoomCode },
    /// Reply to join-room: the full picture a (re)joining client needs.
    RoomJoined {
        success: bool,
        room: RoomSnapshot,
        user: UserInfo,
        stats: RoundStats,
        /// The caller's own previously-cast vote, if resuming mid-round.
        user_vote: Option<CardValue>,
        is_reconnection: bool,
    },
    /// Reply to start-voting, carrying the freshly-zeroed stats.
    VotingStarted { success: bool, stats: RoundStats },
    /// Generic success for operations with nothing extra to report.
    Done { success: bool },
    /// Any rejected operation.
    Failed {
        success: bool,
        code: ErrorCode,
        error: String,
    },
}

impl AckBody {
    /// A plain `{ success: true }` acknowledgement.
    pub fn done() -> Self {
        Self::Done { success: true }
    }

    /// A failure acknowledgement with a typed code and a specific message.
    pub fn failed(code: ErrorCode, error: impl Into<String>) -> Self {
        Self::Failed {
            success: false,
            code,
            error: error.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Events — server → every member of a room
// ---------------------------------------------------------------------------

/// Room-scoped broadcasts, one variant per client-side listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Someone joined or reconnected.
    UserJoined { user: UserInfo, is_reconnection: bool },
    /// Someone left (explicitly, or their grace period expired).
    UserLeft {
        user_name: String,
        /// Present when the departure promoted a new host.
        new_host: Option<String>,
        stats: RoundStats,
    },
    /// A round began; clients clear their selections.
    VotingStarted { round_state: RoundState },
    /// A vote was recorded. The value drives "has voted" indicators;
    /// stats still hide the tally until reveal.
    VoteCast {
        user_name: String,
        vote: CardValue,
        stats: RoundStats,
    },
    /// The round was revealed, votes and all.
    VotesRevealed {
        round_state: RoundState,
        stats: RoundStats,
        votes: BTreeMap<String, CardValue>,
    },
    /// The round was reset to idle.
    RoundReset { round_state: RoundState },
    /// Full-room resync (host transfer, membership change mid-grace, …).
    /// The snapshot's fields are spread into the payload itself, so the
    /// client can treat the whole event as the room.
    RoomUpdated {
        #[serde(flatten)]
        room: RoomSnapshot,
        /// Present when the update is a host transfer.
        new_host_name: Option<String>,
    },
    /// Sent to a kicked connection only; terminal for that member.
    Removed,
}

// ---------------------------------------------------------------------------
// Envelopes — the top-level frames
// ---------------------------------------------------------------------------

/// Every client → server frame.
///
/// `seq` is the client's own counter; the server echoes it back in the
/// matching ack, which is how the client correlates its callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEnvelope {
    pub seq: u64,
    #[serde(flatten)]
    pub request: ClientRequest,
}

/// An acknowledgement frame body: which request it answers, and the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckFrame {
    /// The `seq` of the request this ack answers.
    pub reply_to: u64,
    pub body: AckBody,
}

/// What a server → client frame carries: an ack or a broadcast event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerPayload {
    Ack(AckFrame),
    Event(ServerEvent),
}

/// Every server → client frame. `seq` is the server's per-connection
/// counter, independent of client sequence numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEnvelope {
    pub seq: u64,
    pub payload: ServerPayload,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The wire contract defines exact JSON shapes — a mismatch means the
    //! browser client silently drops or mis-renders a frame, so these tests
    //! pin the serde output per variant rather than just round-tripping.

    use super::*;
    use crate::deck::{CardValue, DeckType};

    fn code(s: &str) -> RoomCode {
        RoomCode::parse(s).expect("valid test code")
    }

    // =====================================================================
    // RoomCode
    // =====================================================================

    #[test]
    fn test_room_code_parse_normalizes_to_uppercase() {
        assert_eq!(code("ab3x9k").as_str(), "AB3X9K");
        assert_eq!(code(" AB3X9K ").as_str(), "AB3X9K");
    }

    #[test]
    fn test_room_code_parse_rejects_wrong_length() {
        assert!(RoomCode::parse("ABC").is_err());
        assert!(RoomCode::parse("ABCDEFG").is_err());
        assert!(RoomCode::parse("").is_err());
    }

    #[test]
    fn test_room_code_parse_rejects_non_alphanumeric() {
        assert!(RoomCode::parse("AB-39K").is_err());
        assert!(RoomCode::parse("AB 39K").is_err());
    }

    #[test]
    fn test_room_code_serializes_as_plain_string() {
        let json = serde_json::to_string(&code("QWE123")).unwrap();
        assert_eq!(json, "\"QWE123\"");
    }

    #[test]
    fn test_room_code_deserialization_validates() {
        let ok: Result<RoomCode, _> = serde_json::from_str("\"qwe123\"");
        assert_eq!(ok.unwrap().as_str(), "QWE123");

        let bad: Result<RoomCode, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }

    // =====================================================================
    // RoundState
    // =====================================================================

    #[test]
    fn test_round_state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RoundState::Revealed).unwrap(),
            "\"revealed\""
        );
    }

    #[test]
    fn test_round_state_legal_edges() {
        use RoundState::*;
        assert!(Idle.can_transition_to(Voting));
        assert!(Voting.can_transition_to(Revealed));
        assert!(Revealed.can_transition_to(Idle));
        // reset-without-reveal
        assert!(Voting.can_transition_to(Idle));
    }

    #[test]
    fn test_round_state_illegal_edges() {
        use RoundState::*;
        assert!(!Idle.can_transition_to(Revealed));
        assert!(!Revealed.can_transition_to(Voting));
        assert!(!Idle.can_transition_to(Idle));
        assert!(!Revealed.can_transition_to(Revealed));
    }

    // =====================================================================
    // ClientRequest — JSON shape per variant
    // =====================================================================

    #[test]
    fn test_create_room_request_json_shape() {
        let req = ClientRequest::CreateRoom {
            host_name: "ada".into(),
            deck_type: DeckType::Tshirt,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "create-room");
        assert_eq!(json["hostName"], "ada");
        assert_eq!(json["deckType"], "tshirt");
    }

    #[test]
    fn test_join_room_request_json_shape() {
        let req = ClientRequest::JoinRoom {
            room_code: "AB3X9K".into(),
            user_name: "grace".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "join-room");
        assert_eq!(json["roomCode"], "AB3X9K");
        assert_eq!(json["userName"], "grace");
    }

    #[test]
    fn test_unit_requests_parse_from_bare_tag() {
        for (tag, expect) in [
            ("leave-room", ClientRequest::LeaveRoom),
            ("start-voting", ClientRequest::StartVoting),
            ("reveal-votes", ClientRequest::RevealVotes),
            ("reset-round", ClientRequest::ResetRound),
        ] {
            let json = format!("{{\"type\":\"{tag}\"}}");
            let req: ClientRequest = serde_json::from_str(&json).unwrap();
            assert_eq!(req, expect);
        }
    }

    #[test]
    fn test_cast_vote_request_accepts_number_and_label() {
        let n: ClientRequest =
            serde_json::from_str(r#"{"type":"cast-vote","vote":5}"#).unwrap();
        assert_eq!(
            n,
            ClientRequest::CastVote {
                vote: CardValue::Number(5.0)
            }
        );

        let s: ClientRequest =
            serde_json::from_str(r#"{"type":"cast-vote","vote":"XL"}"#)
                .unwrap();
        assert_eq!(
            s,
            ClientRequest::CastVote {
                vote: CardValue::from("XL")
            }
        );
    }

    #[test]
    fn test_make_host_request_json_shape() {
        let req = ClientRequest::MakeHost {
            target_connection_id: pointforge_transport::ConnectionId::new(9),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "make-host");
        assert_eq!(json["targetConnectionId"], 9);
    }

    #[test]
    fn test_unknown_request_tag_fails_to_parse() {
        let result: Result<ClientRequest, _> =
            serde_json::from_str(r#"{"type":"fly-to-moon"}"#);
        assert!(result.is_err());
    }

    // =====================================================================
    // Acks
    // =====================================================================

    #[test]
    fn test_room_created_ack_json_shape() {
        let ack = AckBody::RoomCreated {
            success: true,
            room_code: code("AB3X9K"),
        };
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["type"], "room-created");
        assert_eq!(json["success"], true);
        assert_eq!(json["roomCode"], "AB3X9K");
    }

    #[test]
    fn test_failed_ack_carries_typed_code_and_message() {
        let ack = AckBody::failed(ErrorCode::InvalidCard, "failed to cast vote");
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["type"], "failed");
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "invalid-card");
        assert_eq!(json["error"], "failed to cast vote");
    }

    #[test]
    fn test_done_ack_is_bare_success() {
        let json = serde_json::to_value(AckBody::done()).unwrap();
        assert_eq!(json["type"], "done");
        assert_eq!(json["success"], true);
    }

    // =====================================================================
    // Events
    // =====================================================================

    fn snapshot() -> RoomSnapshot {
        RoomSnapshot {
            code: code("AB3X9K"),
            deck_type: DeckType::Fibonacci,
            round_state: RoundState::Idle,
            users: vec![UserInfo {
                connection_id: Some(pointforge_transport::ConnectionId::new(1)),
                name: "ada".into(),
                is_host: true,
                connected: true,
            }],
            host_connection_id: Some(pointforge_transport::ConnectionId::new(
                1,
            )),
        }
    }

    fn empty_stats() -> RoundStats {
        RoundStats {
            total_users: 1,
            voted_users: 0,
            average: None,
            votes: None,
        }
    }

    #[test]
    fn test_user_left_event_json_shape() {
        let event = ServerEvent::UserLeft {
            user_name: "ada".into(),
            new_host: Some("grace".into()),
            stats: empty_stats(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "user-left");
        assert_eq!(json["userName"], "ada");
        assert_eq!(json["newHost"], "grace");
        assert!(json["stats"]["votes"].is_null());
    }

    #[test]
    fn test_votes_revealed_event_exposes_votes() {
        let mut votes = BTreeMap::new();
        votes.insert("ada".to_string(), CardValue::Number(3.0));
        votes.insert("grace".to_string(), CardValue::from("?"));

        let event = ServerEvent::VotesRevealed {
            round_state: RoundState::Revealed,
            stats: RoundStats {
                total_users: 2,
                voted_users: 2,
                average: Some(3.0),
                votes: Some(votes.clone()),
            },
            votes,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "votes-revealed");
        assert_eq!(json["roundState"], "revealed");
        assert_eq!(json["votes"]["ada"], 3.0);
        assert_eq!(json["votes"]["grace"], "?");
        assert_eq!(json["stats"]["average"], 3.0);
    }

    #[test]
    fn test_room_updated_event_spreads_the_room() {
        let event = ServerEvent::RoomUpdated {
            room: snapshot(),
            new_host_name: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "room-updated");
        // The room is flattened into the event payload itself.
        assert_eq!(json["code"], "AB3X9K");
        assert_eq!(json["roundState"], "idle");
        assert_eq!(json["users"][0]["isHost"], true);
        assert!(json["newHostName"].is_null());
    }

    #[test]
    fn test_removed_event_is_bare_tag() {
        let json = serde_json::to_value(ServerEvent::Removed).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "removed" }));
    }

    // =====================================================================
    // Envelopes
    // =====================================================================

    #[test]
    fn test_client_envelope_flattens_request() {
        // `#[serde(flatten)]` puts seq next to the request's own tag:
        //   { "seq": 4, "type": "start-voting" }
        let envelope = ClientEnvelope {
            seq: 4,
            request: ClientRequest::StartVoting,
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["seq"], 4);
        assert_eq!(json["type"], "start-voting");

        let back: ClientEnvelope =
            serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn test_server_envelope_ack_json_shape() {
        let envelope = ServerEnvelope {
            seq: 10,
            payload: ServerPayload::Ack(AckFrame {
                reply_to: 4,
                body: AckBody::done(),
            }),
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["seq"], 10);
        assert_eq!(json["payload"]["type"], "ack");
        assert_eq!(json["payload"]["data"]["replyTo"], 4);
        assert_eq!(json["payload"]["data"]["body"]["type"], "done");
    }

    #[test]
    fn test_server_envelope_event_json_shape() {
        let envelope = ServerEnvelope {
            seq: 11,
            payload: ServerPayload::Event(ServerEvent::RoundReset {
                round_state: RoundState::Idle,
            }),
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["payload"]["type"], "event");
        assert_eq!(json["payload"]["data"]["type"], "round-reset");
        assert_eq!(json["payload"]["data"]["roundState"], "idle");
    }
}
