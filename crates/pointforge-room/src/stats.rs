//! Vote aggregation: pure computation over a room's state.

use std::collections::BTreeMap;

use pointforge_protocol::{RoundState, RoundStats};

use crate::RoomState;

/// Computes participation counts and the numeric average for a room.
///
/// Side-effect free; the result is a function of the state at the instant
/// of the call. The rules:
///
/// - `total_users` counts currently-connected members only. A member inside
///   the reconnection grace period drops out of the denominator but their
///   already-cast vote stays recorded for display continuity.
/// - `voted_users` counts votes whose voter is currently connected.
/// - `average` is the arithmetic mean of the *numeric* votes; label cards
///   ("?", t-shirt sizes) are excluded from both the sum and the divisor.
///   `None` when no numeric vote exists.
/// - `votes` is populated only once the round is revealed; before that it
///   is `None` so in-progress votes stay secret. The map is keyed by
///   display name, which is what the client renders.
pub fn compute_stats(room: &RoomState) -> RoundStats {
    let total_users = room.connected_count();

    let voted_users = room
        .votes
        .keys()
        .filter(|key| {
            room.participant(**key).is_some_and(|p| p.connected)
        })
        .count();

    let numeric: Vec<f64> = room
        .votes
        .values()
        .filter_map(|v| v.as_number())
        .collect();
    let average = if numeric.is_empty() {
        None
    } else {
        Some(numeric.iter().sum::<f64>() / numeric.len() as f64)
    };

    let votes = (room.round_state == RoundState::Revealed)
        .then(|| revealed_votes(room));

    RoundStats {
        total_users,
        voted_users,
        average,
        votes,
    }
}

/// The name-keyed vote map exposed at reveal time.
pub(crate) fn revealed_votes(
    room: &RoomState,
) -> BTreeMap<String, pointforge_protocol::CardValue> {
    room.votes
        .iter()
        .filter_map(|(key, vote)| {
            room.participant(*key)
                .map(|p| (p.name.clone(), vote.clone()))
        })
        .collect()
}
