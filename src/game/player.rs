//! Player record held by the relay for each joined connection

use serde::Serialize;
use uuid::Uuid;

use crate::util::time::unix_millis;
use crate::ws::protocol::{PaintColor, Team, Vec3, Weapon};

pub const MAX_HEALTH: u32 = 100;

/// Splat left on a player by someone else's paintball
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaintHit {
    pub color: PaintColor,
    pub shooter_id: Uuid,
    pub timestamp: u64,
}

/// Player state in the match (last reported pose, server-owned counters)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: Uuid,
    pub name: String,

    pub position: Vec3,
    pub rotation: Vec3,

    pub health: u32,
    pub score: u32,
    pub hits: u32,
    pub weapon: Weapon,
    pub team: Team,
    pub spawn_index: usize,

    // Cosmetics
    pub paint_color: PaintColor,
    pub original_color: PaintColor,
    pub paint_hits: Vec<PaintHit>,

    /// Join order within the current match, used as the tie-break
    #[serde(skip)]
    pub join_seq: u64,
}

impl Player {
    pub fn new(
        id: Uuid,
        name: String,
        team: Team,
        color: PaintColor,
        spawn_index: usize,
        spawn: Vec3,
        join_seq: u64,
    ) -> Self {
        Self {
            id,
            name,
            position: spawn,
            rotation: Vec3::default(),
            health: MAX_HEALTH,
            score: 0,
            hits: 0,
            weapon: Weapon::Pistol,
            team,
            spawn_index,
            paint_color: color,
            original_color: color,
            paint_hits: Vec::new(),
            join_seq,
        }
    }

    /// Display name fallback when the client did not send one
    pub fn default_name(id: Uuid) -> String {
        format!("Player_{}", &id.simple().to_string()[..6])
    }

    pub fn is_eliminated(&self) -> bool {
        self.health == 0
    }

    /// Record a paint splat and take on its colour
    pub fn splat(&mut self, color: PaintColor, shooter_id: Uuid) {
        self.paint_hits.push(PaintHit {
            color,
            shooter_id,
            timestamp: unix_millis(),
        });
        self.paint_color = color;
    }

    pub fn respawn_at(&mut self, spawn_index: usize, position: Vec3) {
        self.health = MAX_HEALTH;
        self.spawn_index = spawn_index;
        self.position = position;
    }
}
