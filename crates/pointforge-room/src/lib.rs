//! Room coordination for Pointforge.
//!
//! Each estimation room runs as an isolated Tokio task (actor model) that
//! owns the room's state outright: membership, host role, the voting round,
//! and the vote tally. All mutating operations are serialized through the
//! actor's command channel, which makes every room invariant atomic without
//! any locking inside the state itself.
//!
//! # Key types
//!
//! - [`RoomState`] — one room's data, plus its invariant check
//! - [`compute_stats`] — pure vote aggregation over a `RoomState`
//! - [`RoomHandle`] — send operations to a running room coordinator
//! - [`RoomRegistry`] — creates rooms, looks up handles, reaps idle rooms
//! - [`RoomConfig`] — grace periods
//!
//! The coordinator never touches transport: operations return scoped
//! [`Outbound`] events and the gateway does the fan-out.

mod config;
mod coordinator;
mod error;
mod registry;
mod state;
mod stats;

pub use config::RoomConfig;
pub use coordinator::{
    ExpiredMember, JoinMode, JoinReply, LeaveReply, Outbound, RemovalReply,
    RoomHandle, Scope, SweepReport,
};
pub use error::RoomError;
pub use registry::RoomRegistry;
pub use state::{Participant, RoomState};
pub use stats::compute_stats;
