//! Room registry: creates rooms, routes to them by code, reaps dead ones.

use std::collections::HashMap;

use pointforge_protocol::{DeckType, RoomCode};
use rand::Rng;

use crate::coordinator::spawn_room;
use crate::{RoomConfig, RoomError, RoomHandle, RoomState};

/// Default command channel size for room coordinators.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Characters room codes are drawn from.
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Tracks every live room and hands out coordinator handles.
///
/// This is the entry point for room operations from the gateway. The
/// registry itself does no room-level work — it only spawns, looks up,
/// and destroys coordinators. Destroyed room codes become reusable.
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, RoomHandle>,
    config: RoomConfig,
}

impl RoomRegistry {
    /// Creates a new, empty registry with the given room config.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            config,
        }
    }

    /// Creates a new room with the given deck and returns its handle.
    ///
    /// The room starts empty and idle; the caller (the gateway) joins the
    /// creator as sole member and host immediately after.
    pub fn create_room(&mut self, deck_type: DeckType) -> RoomHandle {
        let code = self.generate_code();
        let state = RoomState::new(code.clone(), deck_type);
        let handle =
            spawn_room(state, self.config.clone(), DEFAULT_CHANNEL_SIZE);
        self.rooms.insert(code.clone(), handle.clone());
        tracing::info!(room = %code, deck = %deck_type, "room created");
        handle
    }

    /// Looks up a room's coordinator by code.
    ///
    /// # Errors
    /// Returns [`RoomError::NotFound`] if no live room has this code.
    pub fn get(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.rooms
            .get(code)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    /// Shuts a room down and frees its code.
    pub async fn destroy(&mut self, code: &RoomCode) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .remove(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        let _ = handle.shutdown().await;
        tracing::info!(room = %code, "room destroyed");
        Ok(())
    }

    /// Returns cloned handles to all live rooms.
    ///
    /// The sweep task uses this so it can run coordinator sweeps without
    /// holding the registry lock across awaits.
    pub fn handles(&self) -> Vec<RoomHandle> {
        self.rooms.values().cloned().collect()
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Generates a room code that collides with no live room.
    ///
    /// 36^6 codes against a handful of live rooms: the retry loop
    /// effectively never spins more than once.
    fn generate_code(&self) -> RoomCode {
        let mut rng = rand::rng();
        loop {
            let raw: String = (0..RoomCode::LENGTH)
                .map(|_| {
                    let idx = rng.random_range(0..CODE_CHARSET.len());
                    CODE_CHARSET[idx] as char
                })
                .collect();
            let Ok(code) = RoomCode::parse(&raw) else {
                continue;
            };
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_room_registers_unique_codes() {
        let mut registry = RoomRegistry::default();
        let a = registry.create_room(DeckType::Fibonacci);
        let b = registry.create_room(DeckType::Tshirt);

        assert_ne!(a.code(), b.code());
        assert_eq!(registry.room_count(), 2);
    }

    #[tokio::test]
    async fn test_generated_codes_are_well_formed() {
        let mut registry = RoomRegistry::default();
        let handle = registry.create_room(DeckType::Fibonacci);

        let code = handle.code().as_str();
        assert_eq!(code.len(), RoomCode::LENGTH);
        assert!(code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_get_returns_handle_for_live_room() {
        let mut registry = RoomRegistry::default();
        let handle = registry.create_room(DeckType::Fibonacci);

        let looked_up = registry.get(handle.code()).expect("should exist");
        assert_eq!(looked_up.code(), handle.code());
    }

    #[tokio::test]
    async fn test_get_unknown_code_returns_not_found() {
        let registry = RoomRegistry::default();
        let code = RoomCode::parse("ZZZ999").unwrap();

        let result = registry.get(&code);
        assert!(matches!(result, Err(RoomError::NotFound(c)) if c == code));
    }

    #[tokio::test]
    async fn test_destroy_frees_the_code() {
        let mut registry = RoomRegistry::default();
        let handle = registry.create_room(DeckType::Fibonacci);
        let code = handle.code().clone();

        registry.destroy(&code).await.expect("should destroy");

        assert_eq!(registry.room_count(), 0);
        assert!(registry.get(&code).is_err());
    }

    #[tokio::test]
    async fn test_destroy_unknown_room_returns_not_found() {
        let mut registry = RoomRegistry::default();
        let code = RoomCode::parse("ZZZ999").unwrap();

        let result = registry.destroy(&code).await;
        assert!(matches!(result, Err(RoomError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_operation_on_destroyed_room_is_room_closed() {
        let mut registry = RoomRegistry::default();
        let handle = registry.create_room(DeckType::Fibonacci);
        let code = handle.code().clone();

        registry.destroy(&code).await.unwrap();
        // Give the actor a moment to drain and drop its receiver.
        tokio::task::yield_now().await;

        let result = handle.sweep().await;
        assert!(matches!(result, Err(RoomError::RoomClosed(c)) if c == code));
    }
}
