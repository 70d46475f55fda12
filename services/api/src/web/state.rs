//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use studysync_core::ports::StudyStore;
use studysync_core::rooms::ChatRooms;

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub db: Arc<dyn StudyStore>,
    /// The chat room registry. Owns one broadcast task per live group room.
    pub rooms: ChatRooms,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Arc<dyn StudyStore>, config: Arc<Config>) -> Self {
        Self {
            rooms: ChatRooms::new(db.clone()),
            db,
            config,
        }
    }
}
