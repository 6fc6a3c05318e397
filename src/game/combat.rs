//! Combat rules - weapons, projectiles, damage and scoring
//!
//! The relay never simulates projectiles; hits are reported by clients.

use serde::Serialize;
use uuid::Uuid;

use crate::util::time::unix_millis;
use crate::ws::protocol::{PaintColor, Vec3, Weapon};

/// Points per hit, per 5 points of damage dealt
pub const POINTS_PER_DAMAGE_STEP: u32 = 10;
pub const DAMAGE_STEP: u32 = 5;

/// Weapon stats per paint gun
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    /// Damage carried by each projectile
    pub damage: u32,
    /// Projectile speed hint for client rendering
    pub projectile_speed: f32,
}

impl WeaponStats {
    pub fn for_weapon(weapon: Weapon) -> Self {
        match weapon {
            Weapon::Pistol => Self {
                damage: 25,
                projectile_speed: 50.0,
            },
            Weapon::Sniper => Self {
                damage: 50,
                projectile_speed: 100.0,
            },
        }
    }
}

/// Relayed projectile, kept only until its bookkeeping window expires
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projectile {
    pub id: Uuid,
    pub player_id: Uuid,
    pub position: Vec3,
    pub direction: Vec3,
    pub speed: f32,
    pub damage: u32,
    pub weapon: Weapon,
    pub paint_color: PaintColor,
    pub timestamp: u64,
}

impl Projectile {
    /// Create a projectile painted with the shooter's own colour
    pub fn new(
        player_id: Uuid,
        position: Vec3,
        direction: Vec3,
        weapon: Weapon,
        paint_color: PaintColor,
    ) -> Self {
        let stats = WeaponStats::for_weapon(weapon);
        Self {
            id: Uuid::new_v4(),
            player_id,
            position,
            direction,
            speed: stats.projectile_speed,
            damage: stats.damage,
            weapon,
            paint_color,
            timestamp: unix_millis(),
        }
    }
}

/// Combat math shared by the relay handlers
pub struct CombatSystem;

impl CombatSystem {
    /// Apply damage to health, returns (new_health, is_eliminated)
    pub fn apply_damage(current_health: u32, damage: u32) -> (u32, bool) {
        let new_health = current_health.saturating_sub(damage);
        (new_health, new_health == 0)
    }

    /// 10 points for every full 5 points of damage
    pub fn score_for_damage(damage: u32) -> u32 {
        (damage / DAMAGE_STEP).saturating_mul(POINTS_PER_DAMAGE_STEP)
    }

    /// Health restored by a pack, never above `max_health`
    pub fn heal_amount(current_health: u32, pack_amount: u32, max_health: u32) -> u32 {
        pack_amount.min(max_health.saturating_sub(current_health))
    }
}
