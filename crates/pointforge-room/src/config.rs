//! Room timing configuration.

use std::time::Duration;

/// Grace periods governing member retention and room reaping.
///
/// Both clocks are enforced by the sweep command, which runs through each
/// room's own serialized queue — so neither can fire in the middle of
/// another operation.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// How long a disconnected member's slot (and vote) is held open for
    /// reconnection before the member is structurally removed.
    pub reconnect_grace: Duration,

    /// How long a room may sit with no members before the registry may
    /// destroy it. Tolerates a brief all-disconnected blip.
    pub empty_room_grace: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            reconnect_grace: Duration::from_secs(60),
            empty_room_grace: Duration::from_secs(60),
        }
    }
}
