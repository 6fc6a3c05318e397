//! Match relay modules

pub mod combat;
pub mod r#match;
pub mod pickups;
pub mod player;
pub mod registry;
pub mod snapshot;
pub mod timers;

pub use r#match::{GameMatch, MatchHandle, MatchPhase, MatchRules, MatchState, MatchStatus};

use crate::ws::protocol::{ClientMsg, ServerMsg};
use uuid::Uuid;

/// Event received from a WebSocket session
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub conn_id: Uuid,
    pub event: InputEvent,
    pub received_at: u64,
}

#[derive(Debug, Clone)]
pub enum InputEvent {
    /// Transport connected, no player record yet
    Connected,
    Message(ClientMsg),
    /// Transport closed
    Disconnected,
}

/// Who should receive an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    All,
    Only(Uuid),
    AllExcept(Uuid),
}

impl Recipients {
    pub fn includes(&self, conn_id: Uuid) -> bool {
        match self {
            Recipients::All => true,
            Recipients::Only(id) => *id == conn_id,
            Recipients::AllExcept(id) => *id != conn_id,
        }
    }
}

/// Server message addressed to a set of sessions
#[derive(Debug, Clone)]
pub struct Outbound {
    pub recipients: Recipients,
    pub msg: ServerMsg,
}

impl Outbound {
    pub fn all(msg: ServerMsg) -> Self {
        Self {
            recipients: Recipients::All,
            msg,
        }
    }

    pub fn only(conn_id: Uuid, msg: ServerMsg) -> Self {
        Self {
            recipients: Recipients::Only(conn_id),
            msg,
        }
    }

    pub fn all_except(conn_id: Uuid, msg: ServerMsg) -> Self {
        Self {
            recipients: Recipients::AllExcept(conn_id),
            msg,
        }
    }
}

/// Why a client action was dropped. Never sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("connection {0} is not registered")]
    UnknownConnection(Uuid),

    #[error("connection {0} has not joined the game")]
    NotJoined(Uuid),

    #[error("connection {0} already joined")]
    AlreadyJoined(Uuid),

    #[error("player {0} is not in the match")]
    UnknownPlayer(Uuid),

    #[error("match is not active")]
    MatchNotActive,

    #[error("players cannot hit themselves")]
    SelfHit,

    #[error("player {0} is already eliminated")]
    TargetEliminated(Uuid),

    #[error("unknown pickup {0}")]
    UnknownPickup(String),

    #[error("pickup {0} is not active")]
    PickupInactive(String),

    #[error("player {0} does not need this pickup")]
    PickupNotNeeded(Uuid),
}
