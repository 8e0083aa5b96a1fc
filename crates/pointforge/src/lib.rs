//! # Pointforge
//!
//! Real-time planning poker backend.
//!
//! A host opens a room, teammates join by code, everyone casts a hidden
//! vote from a shared deck, and the host reveals and resets rounds.
//! Pointforge is the session authority behind that flow: it owns room
//! membership, round state, host identity, and reconnection recovery for
//! many independent rooms at once.
//!
//! Every room is a single-writer actor; the gateway in this crate
//! translates the client's socket contract into coordinator calls and fans
//! broadcast events back out to the room's connections.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use pointforge::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PointforgeError> {
//!     let server = PointforgeServer::builder()
//!         .bind("0.0.0.0:8080")
//!         .build()
//!         .await?;
//!     server.run().await
//! }
//! ```

mod error;
mod handler;
mod server;
mod subscriptions;

pub use error::PointforgeError;
pub use server::{PointforgeServer, PointforgeServerBuilder};

/// The common imports for running a Pointforge server.
pub mod prelude {
    pub use crate::{
        PointforgeError, PointforgeServer, PointforgeServerBuilder,
    };
    pub use pointforge_protocol::{
        AckBody, CardValue, ClientEnvelope, ClientRequest, DeckType,
        ErrorCode, RoomCode, RoundState, ServerEnvelope, ServerEvent,
        ServerPayload,
    };
    pub use pointforge_room::RoomConfig;
    pub use pointforge_session::DirectoryConfig;
}
