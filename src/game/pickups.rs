//! Shared world pickups - health packs and the special weapon

use std::time::Duration;

use serde::Serialize;

use crate::util::time::unix_millis;
use crate::ws::protocol::{Vec3, Weapon};

use super::Rejection;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthPack {
    pub id: String,
    pub position: Vec3,
    pub active: bool,
    /// Unix millis when the pack comes back, 0 while active
    pub respawn_time: u64,
}

impl HealthPack {
    fn new(id: &str, position: Vec3) -> Self {
        Self {
            id: id.to_string(),
            position,
            active: true,
            respawn_time: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialWeapon {
    pub position: Vec3,
    pub active: bool,
    pub respawn_time: u64,
    #[serde(rename = "type")]
    pub weapon: Weapon,
}

/// All pickups in the arena. At most one holder per pickup at a time.
#[derive(Debug, Clone)]
pub struct PickupBoard {
    health_packs: Vec<HealthPack>,
    special_weapon: SpecialWeapon,
}

impl Default for PickupBoard {
    fn default() -> Self {
        Self {
            health_packs: vec![
                HealthPack::new("health1", Vec3::new(12.0, 1.0, 12.0)),
                HealthPack::new("health2", Vec3::new(-12.0, 1.0, -12.0)),
            ],
            special_weapon: SpecialWeapon {
                position: Vec3::new(0.0, 1.5, 0.0),
                active: true,
                respawn_time: 0,
                weapon: Weapon::Sniper,
            },
        }
    }
}

impl PickupBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn health_packs(&self) -> &[HealthPack] {
        &self.health_packs
    }

    pub fn special_weapon(&self) -> &SpecialWeapon {
        &self.special_weapon
    }

    pub fn health_pack(&self, pack_id: &str) -> Option<&HealthPack> {
        self.health_packs.iter().find(|p| p.id == pack_id)
    }

    /// Check a pack can be collected right now
    pub fn check_health_pack(&self, pack_id: &str) -> Result<(), Rejection> {
        match self.health_pack(pack_id) {
            None => Err(Rejection::UnknownPickup(pack_id.to_string())),
            Some(pack) if !pack.active => Err(Rejection::PickupInactive(pack_id.to_string())),
            Some(_) => Ok(()),
        }
    }

    /// Take an active pack out of play until `respawn_in` has passed
    pub fn claim_health_pack(&mut self, pack_id: &str, respawn_in: Duration) -> Result<(), Rejection> {
        self.check_health_pack(pack_id)?;
        if let Some(pack) = self.health_packs.iter_mut().find(|p| p.id == pack_id) {
            pack.active = false;
            pack.respawn_time = unix_millis() + respawn_in.as_millis() as u64;
        }
        Ok(())
    }

    /// Put a pack back. Returns false if it was already active.
    pub fn restore_health_pack(&mut self, pack_id: &str) -> bool {
        match self.health_packs.iter_mut().find(|p| p.id == pack_id) {
            Some(pack) if !pack.active => {
                pack.active = true;
                pack.respawn_time = 0;
                true
            }
            _ => false,
        }
    }

    pub fn check_special_weapon(&self) -> Result<(), Rejection> {
        if self.special_weapon.active {
            Ok(())
        } else {
            Err(Rejection::PickupInactive("specialWeapon".to_string()))
        }
    }

    /// Take the special weapon out of play, returning the weapon granted
    pub fn claim_special_weapon(&mut self, respawn_in: Duration) -> Result<Weapon, Rejection> {
        self.check_special_weapon()?;
        self.special_weapon.active = false;
        self.special_weapon.respawn_time = unix_millis() + respawn_in.as_millis() as u64;
        Ok(self.special_weapon.weapon)
    }

    pub fn restore_special_weapon(&mut self) -> bool {
        if self.special_weapon.active {
            return false;
        }
        self.special_weapon.active = true;
        self.special_weapon.respawn_time = 0;
        true
    }

    /// Everything back to active, as at process start
    pub fn reset(&mut self) {
        for pack in &mut self.health_packs {
            pack.active = true;
            pack.respawn_time = 0;
        }
        self.special_weapon.active = true;
        self.special_weapon.respawn_time = 0;
    }
}
