//! Connection registry - transport connections, player records, spawns

use std::collections::{HashMap, HashSet};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use crate::ws::protocol::{PaintColor, Team, Vec3};

use super::player::Player;
use super::Rejection;

/// Fixed spawn slots at the four corners of the arena
pub const SPAWN_POINTS: [Vec3; 4] = [
    Vec3::new(20.0, 1.6, 20.0),
    Vec3::new(-20.0, 1.6, -20.0),
    Vec3::new(20.0, 1.6, -20.0),
    Vec3::new(-20.0, 1.6, 20.0),
];

/// Longest display name accepted from a client
pub const MAX_NAME_LEN: usize = 32;

pub struct PlayerRegistry {
    connections: HashSet<Uuid>,
    players: HashMap<Uuid, Player>,
    next_join_seq: u64,
    rng: ChaCha8Rng,
}

impl PlayerRegistry {
    pub fn new(seed: u64) -> Self {
        Self {
            connections: HashSet::new(),
            players: HashMap::new(),
            next_join_seq: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Register a bare transport connection. Returns false if already known.
    pub fn connect(&mut self, conn_id: Uuid) -> bool {
        self.connections.insert(conn_id)
    }

    pub fn is_connected(&self, conn_id: &Uuid) -> bool {
        self.connections.contains(conn_id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Create the player record for a connection
    pub fn join(&mut self, conn_id: Uuid, name: Option<String>) -> Result<&Player, Rejection> {
        if !self.connections.contains(&conn_id) {
            return Err(Rejection::UnknownConnection(conn_id));
        }
        if self.players.contains_key(&conn_id) {
            return Err(Rejection::AlreadyJoined(conn_id));
        }

        let (spawn_index, spawn) = self.available_spawn();
        let slot = self.players.len();
        let name = sanitize_name(name).unwrap_or_else(|| Player::default_name(conn_id));

        let player = Player::new(
            conn_id,
            name,
            Team::for_slot(slot),
            PaintColor::for_slot(slot),
            spawn_index,
            spawn,
            self.next_join_seq,
        );
        self.next_join_seq += 1;

        Ok(self.players.entry(conn_id).or_insert(player))
    }

    /// Drop a connection and its player record, if any
    pub fn disconnect(&mut self, conn_id: &Uuid) -> Option<Player> {
        self.connections.remove(conn_id);
        self.players.remove(conn_id)
    }

    /// First spawn slot nobody occupies, otherwise a random one
    pub fn available_spawn(&mut self) -> (usize, Vec3) {
        let index = (0..SPAWN_POINTS.len())
            .find(|i| !self.players.values().any(|p| p.spawn_index == *i))
            .unwrap_or_else(|| self.rng.gen_range(0..SPAWN_POINTS.len()));
        (index, SPAWN_POINTS[index])
    }

    pub fn get(&self, id: &Uuid) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.players.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Players in join order
    pub fn ordered(&self) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by_key(|p| p.join_seq);
        players
    }

    /// Remove every player record. Connections stay open and may rejoin.
    pub fn clear_players(&mut self) {
        self.players.clear();
    }
}

fn sanitize_name(name: Option<String>) -> Option<String> {
    let trimmed = name?.trim().to_string();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_NAME_LEN).collect())
}
