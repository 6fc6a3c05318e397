//! Application state shared across routes

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::config::Config;
use crate::game::{GameMatch, MatchHandle};
use crate::util::time::unix_millis;

/// Live WebSocket session, tracked for health reporting
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub connected_at: u64,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub relay: MatchHandle,
    pub sessions: Arc<DashMap<Uuid, SessionInfo>>,
}

impl AppState {
    /// Build the state and the match task it talks to. The caller spawns the task.
    pub fn new(config: Config) -> (Self, GameMatch) {
        let config = Arc::new(config);
        let (game_match, relay) = GameMatch::new(config.rules.clone(), unix_millis());

        let state = Self {
            config,
            relay,
            sessions: Arc::new(DashMap::new()),
        };

        (state, game_match)
    }

    pub fn open_session(&self, conn_id: Uuid) {
        self.sessions.insert(
            conn_id,
            SessionInfo {
                connected_at: unix_millis(),
            },
        );
    }

    /// Returns how long the session lasted in millis
    pub fn close_session(&self, conn_id: &Uuid) -> Option<u64> {
        self.sessions
            .remove(conn_id)
            .map(|(_, info)| unix_millis().saturating_sub(info.connected_at))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
