//! Wire protocol for Pointforge.
//!
//! This crate defines the contract the browser client and the server share:
//!
//! - **Types** ([`ClientRequest`], [`AckBody`], [`ServerEvent`], envelopes) —
//!   the closed set of tagged messages that travel on the wire.
//! - **Decks** ([`DeckType`], [`CardValue`]) — the fixed, versioned card
//!   table. Adding a deck is a contract change, not configuration.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how messages are converted
//!   to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while
//!   encoding/decoding/validating.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (frames) and session (identity).
//! It doesn't know about connections or rooms — it only knows how messages
//! are shaped and serialized.
//!
//! ```text
//! Transport (frames) → Protocol (envelopes) → Session / Room (semantics)
//! ```

mod codec;
mod deck;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use deck::{CardValue, Deck, DeckType, DECK_TABLE_VERSION};
pub use error::ProtocolError;
pub use pointforge_transport::ConnectionId;
pub use types::{
    AckBody, AckFrame, ClientEnvelope, ClientRequest, ErrorCode,
    RoomCode, RoomSnapshot, RoundState, RoundStats, ServerEnvelope,
    ServerPayload, ServerEvent, UserInfo,
};
