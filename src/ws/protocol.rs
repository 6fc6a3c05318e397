//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::combat::Projectile;
use crate::game::pickups::{HealthPack, SpecialWeapon};
use crate::game::player::Player;

/// Position or Euler rotation in world space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Paint guns available in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weapon {
    /// Default sidearm every player spawns with
    Pistol,
    /// Special weapon picked up from the centre of the map
    Sniper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Blue,
    Red,
}

impl Team {
    /// Teams alternate by the number of players already in the match
    pub fn for_slot(connected: usize) -> Self {
        if connected % 2 == 0 {
            Self::Blue
        } else {
            Self::Red
        }
    }
}

/// Paint palette. Serialized as the hex string clients render with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaintColor {
    #[serde(rename = "#FF0066")]
    Magenta,
    #[serde(rename = "#0066FF")]
    Blue,
    #[serde(rename = "#00FF66")]
    Green,
    #[serde(rename = "#FF6600")]
    Orange,
    #[serde(rename = "#6600FF")]
    Purple,
    #[serde(rename = "#FFFF00")]
    Yellow,
    #[serde(rename = "#FF0000")]
    Red,
    #[serde(rename = "#00FFFF")]
    Cyan,
}

impl PaintColor {
    pub const PALETTE: [PaintColor; 8] = [
        PaintColor::Magenta,
        PaintColor::Blue,
        PaintColor::Green,
        PaintColor::Orange,
        PaintColor::Purple,
        PaintColor::Yellow,
        PaintColor::Red,
        PaintColor::Cyan,
    ];

    /// Palette entry for the Nth player slot, wrapping around
    pub fn for_slot(connected: usize) -> Self {
        Self::PALETTE[connected % Self::PALETTE.len()]
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMsg {
    /// Enter the match with an optional display name
    JoinGame {
        #[serde(default)]
        name: Option<String>,
    },

    /// Latest pose reported by the headset
    PlayerMove { position: Vec3, rotation: Vec3 },

    /// Paintball fired. Any colour the client sends is ignored.
    Shoot {
        position: Vec3,
        direction: Vec3,
        #[serde(default)]
        weapon: Option<Weapon>,
    },

    /// Client-side hit detection result, trusted as reported
    Hit {
        shooter_id: Uuid,
        target_id: Uuid,
        damage: u32,
        #[serde(default)]
        paint_color: Option<PaintColor>,
    },

    CollectHealthPack { pack_id: String },

    CollectSpecialWeapon,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    /// Sent only to the joining client
    PlayerJoined {
        player: Player,
        game_state: GameStateSnapshot,
    },

    /// Sent to everyone else when a player joins
    PlayerConnected { player: Player },

    PlayerDisconnected { player_id: Uuid },

    PlayerMoved {
        player_id: Uuid,
        position: Vec3,
        rotation: Vec3,
    },

    ProjectileFired(Projectile),

    PlayerHit(HitOutcome),

    PlayerRespawned {
        player_id: Uuid,
        position: Vec3,
        health: u32,
    },

    HealthPackCollected {
        player_id: Uuid,
        pack_id: String,
        heal_amount: u32,
        new_health: u32,
    },

    HealthPackRespawned { pack_id: String },

    /// Full pickup table, sent when the match resets
    HealthPacksUpdate { health_packs: Vec<HealthPack> },

    SpecialWeaponCollected { player_id: Uuid, weapon: Weapon },

    SpecialWeaponRespawned(SpecialWeapon),

    SpecialWeaponUpdate(SpecialWeapon),

    /// Held special weapon ran out, player is back on `weapon`
    WeaponExpired { player_id: Uuid, weapon: Weapon },

    GameStarted { duration: u32, players: Vec<Player> },

    TimeUpdate { seconds_remaining: u32 },

    GameEnded {
        winner: Option<Player>,
        final_scores: Vec<FinalScore>,
    },

    GamePaused { message: String },
}

/// Everything a freshly joined client needs to build the scene
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateSnapshot {
    pub players: Vec<Player>,
    pub health_packs: Vec<HealthPack>,
    pub special_weapon: SpecialWeapon,
    pub game_active: bool,
    pub game_time: u32,
}

/// Result of an accepted hit report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HitOutcome {
    pub shooter_id: Uuid,
    pub target_id: Uuid,
    pub damage: u32,
    pub paint_color: Option<PaintColor>,
    pub target_health: u32,
    pub target_paint_color: PaintColor,
    /// Includes the elimination bonus when `eliminated` is set
    pub shooter_score: u32,
    pub shooter_hits: u32,
    pub points: u32,
    pub eliminated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalScore {
    pub id: Uuid,
    pub name: String,
    pub score: u32,
}
