//! Match state and the relay task that owns it

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, HitOutcome, PaintColor, ServerMsg, Vec3, Weapon};

use super::combat::{CombatSystem, Projectile};
use super::pickups::PickupBoard;
use super::player::MAX_HEALTH;
use super::registry::PlayerRegistry;
use super::snapshot::SnapshotBuilder;
use super::timers::{Scheduler, TimerKey};
use super::{InputEvent, Outbound, PlayerInput, Rejection};

pub const PAUSED_MESSAGE: &str = "Waiting for more players...";

/// Inputs queued longer than this before processing are logged
const INPUT_LAG_WARN_MS: u64 = 250;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPhase {
    /// Not enough players, or waiting for the start delay
    Waiting,
    /// Countdown running
    Active,
    /// Winner announced, arena reset pending
    Ended,
}

/// Gameplay tunables
#[derive(Debug, Clone)]
pub struct MatchRules {
    pub min_players: usize,
    pub match_duration_secs: u32,
    /// Settle time between reaching `min_players` and starting
    pub start_delay: Duration,
    pub reset_delay: Duration,
    pub respawn_delay: Duration,
    pub projectile_ttl: Duration,
    pub health_pack_respawn: Duration,
    pub special_weapon_respawn: Duration,
    pub special_weapon_hold: Duration,
    pub heal_amount: u32,
    pub elimination_bonus: u32,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            min_players: 2,
            match_duration_secs: 300,
            start_delay: Duration::from_secs(2),
            reset_delay: Duration::from_secs(10),
            respawn_delay: Duration::from_secs(3),
            projectile_ttl: Duration::from_millis(3000),
            health_pack_respawn: Duration::from_secs(15),
            special_weapon_respawn: Duration::from_secs(30),
            special_weapon_hold: Duration::from_secs(60),
            heal_amount: 25,
            elimination_bonus: 50,
        }
    }
}

/// Read-only view published for the HTTP endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchStatus {
    pub players: usize,
    pub connections: usize,
    pub phase: MatchPhase,
    pub game_time: u32,
}

impl MatchStatus {
    pub fn game_active(&self) -> bool {
        self.phase == MatchPhase::Active
    }
}

/// Match state (owned by the relay task)
pub struct MatchState {
    pub rules: MatchRules,
    pub phase: MatchPhase,
    pub game_time: u32,
    pub game_start_time: Option<u64>,
    pub registry: PlayerRegistry,
    pub pickups: PickupBoard,
    pub projectiles: HashMap<Uuid, Projectile>,
    pub timers: Scheduler,
}

type Handled = Result<Vec<Outbound>, Rejection>;

impl MatchState {
    pub fn new(rules: MatchRules, seed: u64) -> Self {
        Self {
            game_time: rules.match_duration_secs,
            rules,
            phase: MatchPhase::Waiting,
            game_start_time: None,
            registry: PlayerRegistry::new(seed),
            pickups: PickupBoard::new(),
            projectiles: HashMap::new(),
            timers: Scheduler::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase == MatchPhase::Active
    }

    pub fn status(&self) -> MatchStatus {
        MatchStatus {
            players: self.registry.len(),
            connections: self.registry.connection_count(),
            phase: self.phase,
            game_time: self.game_time,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Route one session event to its handler
    pub fn handle_input(&mut self, input: PlayerInput, now: Instant) -> Handled {
        let id = input.conn_id;
        match input.event {
            InputEvent::Connected => self.on_connect(id),
            InputEvent::Disconnected => self.on_disconnect(id),
            InputEvent::Message(msg) => match msg {
                ClientMsg::JoinGame { name } => self.join_game(id, name, now),
                ClientMsg::PlayerMove { position, rotation } => {
                    self.player_move(id, position, rotation)
                }
                ClientMsg::Shoot {
                    position,
                    direction,
                    weapon,
                } => self.shoot(id, position, direction, weapon, now),
                ClientMsg::Hit {
                    shooter_id,
                    target_id,
                    damage,
                    paint_color,
                } => self.hit(shooter_id, target_id, damage, paint_color, now),
                ClientMsg::CollectHealthPack { pack_id } => {
                    self.collect_health_pack(id, &pack_id, now)
                }
                ClientMsg::CollectSpecialWeapon => self.collect_special_weapon(id, now),
            },
        }
    }

    // ------------------------------------------------------------------
    // Connection registry
    // ------------------------------------------------------------------

    pub fn on_connect(&mut self, conn_id: Uuid) -> Handled {
        if self.registry.connect(conn_id) {
            info!(conn_id = %conn_id, "Connection registered");
        }
        Ok(Vec::new())
    }

    pub fn join_game(&mut self, conn_id: Uuid, name: Option<String>, now: Instant) -> Handled {
        let player = self.registry.join(conn_id, name)?.clone();

        info!(
            player_id = %conn_id,
            name = %player.name,
            team = ?player.team,
            spawn_index = player.spawn_index,
            player_count = self.registry.len(),
            "Player joined"
        );

        let game_state = SnapshotBuilder::game_state(
            &self.registry,
            &self.pickups,
            self.is_active(),
            self.game_time,
        );

        let out = vec![
            Outbound::only(
                conn_id,
                ServerMsg::PlayerJoined {
                    player: player.clone(),
                    game_state,
                },
            ),
            Outbound::all_except(conn_id, ServerMsg::PlayerConnected { player }),
        ];

        if self.phase == MatchPhase::Waiting && self.registry.len() >= self.rules.min_players {
            let at = now + self.rules.start_delay;
            if self.timers.schedule(TimerKey::StartMatch, at) {
                debug!(player_count = self.registry.len(), "Match start scheduled");
            }
        }

        Ok(out)
    }

    pub fn on_disconnect(&mut self, conn_id: Uuid) -> Handled {
        let Some(player) = self.registry.disconnect(&conn_id) else {
            debug!(conn_id = %conn_id, "Connection closed before joining");
            return Ok(Vec::new());
        };

        let cancelled = self.timers.cancel_where(|k| k.player() == Some(conn_id));
        info!(
            player_id = %conn_id,
            name = %player.name,
            cancelled_timers = cancelled,
            "Player disconnected"
        );

        let mut out = vec![Outbound::all_except(
            conn_id,
            ServerMsg::PlayerDisconnected { player_id: conn_id },
        )];

        if self.is_active() && self.registry.len() < self.rules.min_players {
            self.timers.cancel(&TimerKey::CountdownTick);
            self.phase = MatchPhase::Waiting;
            info!(
                player_count = self.registry.len(),
                game_time = self.game_time,
                "Match paused, not enough players"
            );
            out.push(Outbound::all(ServerMsg::GamePaused {
                message: PAUSED_MESSAGE.to_string(),
            }));
        }

        Ok(out)
    }

    // ------------------------------------------------------------------
    // Event relay
    // ------------------------------------------------------------------

    pub fn player_move(&mut self, player_id: Uuid, position: Vec3, rotation: Vec3) -> Handled {
        let active = self.is_active();
        let player = self
            .registry
            .get_mut(&player_id)
            .ok_or(Rejection::NotJoined(player_id))?;
        if !active {
            return Err(Rejection::MatchNotActive);
        }

        player.position = position;
        player.rotation = rotation;

        Ok(vec![Outbound::all_except(
            player_id,
            ServerMsg::PlayerMoved {
                player_id,
                position,
                rotation,
            },
        )])
    }

    pub fn shoot(
        &mut self,
        player_id: Uuid,
        position: Vec3,
        direction: Vec3,
        claimed_weapon: Option<Weapon>,
        now: Instant,
    ) -> Handled {
        let player = self
            .registry
            .get(&player_id)
            .ok_or(Rejection::NotJoined(player_id))?;
        if !self.is_active() {
            return Err(Rejection::MatchNotActive);
        }

        if let Some(claimed) = claimed_weapon.filter(|w| *w != player.weapon) {
            debug!(
                player_id = %player_id,
                claimed = ?claimed,
                held = ?player.weapon,
                "Shot weapon differs from held weapon, using held weapon"
            );
        }

        let projectile = Projectile::new(
            player_id,
            position,
            direction,
            player.weapon,
            player.paint_color,
        );

        self.timers.schedule(
            TimerKey::ExpireProjectile(projectile.id),
            now + self.rules.projectile_ttl,
        );
        self.projectiles.insert(projectile.id, projectile.clone());

        debug!(player_id = %player_id, projectile_id = %projectile.id, "Projectile fired");

        Ok(vec![Outbound::all(ServerMsg::ProjectileFired(projectile))])
    }

    pub fn hit(
        &mut self,
        shooter_id: Uuid,
        target_id: Uuid,
        damage: u32,
        paint_color: Option<PaintColor>,
        now: Instant,
    ) -> Handled {
        if !self.is_active() {
            return Err(Rejection::MatchNotActive);
        }
        if shooter_id == target_id {
            return Err(Rejection::SelfHit);
        }
        if !self.registry.contains(&shooter_id) {
            return Err(Rejection::UnknownPlayer(shooter_id));
        }

        let target = self
            .registry
            .get_mut(&target_id)
            .ok_or(Rejection::UnknownPlayer(target_id))?;
        if target.is_eliminated() {
            return Err(Rejection::TargetEliminated(target_id));
        }

        let (target_health, eliminated) = CombatSystem::apply_damage(target.health, damage);
        target.health = target_health;
        if let Some(color) = paint_color {
            target.splat(color, shooter_id);
        }
        let target_paint_color = target.paint_color;
        let target_name = target.name.clone();

        let points = CombatSystem::score_for_damage(damage);
        let bonus = if eliminated {
            self.rules.elimination_bonus
        } else {
            0
        };
        let shooter = self
            .registry
            .get_mut(&shooter_id)
            .ok_or(Rejection::UnknownPlayer(shooter_id))?;
        shooter.score = shooter.score.saturating_add(points.saturating_add(bonus));
        shooter.hits += 1;

        let outcome = HitOutcome {
            shooter_id,
            target_id,
            damage,
            paint_color,
            target_health,
            target_paint_color,
            shooter_score: shooter.score,
            shooter_hits: shooter.hits,
            points,
            eliminated,
        };

        info!(
            shooter = %shooter.name,
            target = %target_name,
            damage,
            points,
            target_health,
            "Player painted"
        );

        if eliminated {
            info!(shooter = %shooter.name, target = %target_name, "Player eliminated");
            self.timers.schedule(
                TimerKey::RespawnPlayer(target_id),
                now + self.rules.respawn_delay,
            );
        }

        Ok(vec![Outbound::all(ServerMsg::PlayerHit(outcome))])
    }

    // ------------------------------------------------------------------
    // Pickup scheduler
    // ------------------------------------------------------------------

    pub fn collect_health_pack(&mut self, player_id: Uuid, pack_id: &str, now: Instant) -> Handled {
        let player = self
            .registry
            .get(&player_id)
            .ok_or(Rejection::NotJoined(player_id))?;
        self.pickups.check_health_pack(pack_id)?;
        if player.is_eliminated() {
            return Err(Rejection::TargetEliminated(player_id));
        }
        if player.health >= MAX_HEALTH {
            return Err(Rejection::PickupNotNeeded(player_id));
        }

        self.pickups
            .claim_health_pack(pack_id, self.rules.health_pack_respawn)?;
        self.timers.schedule(
            TimerKey::RespawnHealthPack(pack_id.to_string()),
            now + self.rules.health_pack_respawn,
        );

        let player = self
            .registry
            .get_mut(&player_id)
            .ok_or(Rejection::NotJoined(player_id))?;
        let heal_amount = CombatSystem::heal_amount(player.health, self.rules.heal_amount, MAX_HEALTH);
        player.health += heal_amount;

        info!(player = %player.name, pack_id, heal_amount, "Health pack collected");

        Ok(vec![Outbound::all(ServerMsg::HealthPackCollected {
            player_id,
            pack_id: pack_id.to_string(),
            heal_amount,
            new_health: player.health,
        })])
    }

    pub fn collect_special_weapon(&mut self, player_id: Uuid, now: Instant) -> Handled {
        let player = self
            .registry
            .get(&player_id)
            .ok_or(Rejection::NotJoined(player_id))?;
        self.pickups.check_special_weapon()?;
        if player.is_eliminated() {
            return Err(Rejection::TargetEliminated(player_id));
        }
        if player.weapon == self.pickups.special_weapon().weapon {
            return Err(Rejection::PickupNotNeeded(player_id));
        }

        let weapon = self
            .pickups
            .claim_special_weapon(self.rules.special_weapon_respawn)?;
        self.timers.schedule(
            TimerKey::RespawnSpecialWeapon,
            now + self.rules.special_weapon_respawn,
        );
        self.timers.cancel(&TimerKey::WeaponExpiry(player_id));
        self.timers.schedule(
            TimerKey::WeaponExpiry(player_id),
            now + self.rules.special_weapon_hold,
        );

        let player = self
            .registry
            .get_mut(&player_id)
            .ok_or(Rejection::NotJoined(player_id))?;
        player.weapon = weapon;

        info!(player = %player.name, weapon = ?weapon, "Special weapon collected");

        Ok(vec![Outbound::all(ServerMsg::SpecialWeaponCollected {
            player_id,
            weapon,
        })])
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Run every timer due at `now`, in deadline order
    pub fn fire_due(&mut self, now: Instant) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Some((key, deadline)) = self.timers.pop_due(now) {
            out.extend(self.fire(key, deadline));
        }
        out
    }

    fn fire(&mut self, key: TimerKey, deadline: Instant) -> Vec<Outbound> {
        match key {
            TimerKey::StartMatch => self.start_match(deadline),
            TimerKey::CountdownTick => self.countdown_tick(deadline),
            TimerKey::ResetMatch => self.reset_match(),
            TimerKey::RespawnPlayer(id) => self.respawn_player(id),
            TimerKey::WeaponExpiry(id) => self.expire_weapon(id),
            TimerKey::RespawnHealthPack(pack_id) => self.respawn_health_pack(pack_id),
            TimerKey::RespawnSpecialWeapon => self.respawn_special_weapon(),
            TimerKey::ExpireProjectile(id) => {
                self.projectiles.remove(&id);
                Vec::new()
            }
        }
    }

    fn start_match(&mut self, now: Instant) -> Vec<Outbound> {
        if self.phase != MatchPhase::Waiting || self.registry.len() < self.rules.min_players {
            debug!(
                phase = ?self.phase,
                player_count = self.registry.len(),
                "Start skipped"
            );
            return Vec::new();
        }

        self.phase = MatchPhase::Active;
        self.game_time = self.rules.match_duration_secs;
        self.game_start_time = Some(unix_millis());
        self.timers
            .schedule(TimerKey::CountdownTick, now + Duration::from_secs(1));

        info!(player_count = self.registry.len(), duration = self.game_time, "Match started");

        vec![
            Outbound::all(ServerMsg::GameStarted {
                duration: self.game_time,
                players: SnapshotBuilder::players(&self.registry),
            }),
            Outbound::all(ServerMsg::TimeUpdate {
                seconds_remaining: self.game_time,
            }),
        ]
    }

    fn countdown_tick(&mut self, now: Instant) -> Vec<Outbound> {
        if !self.is_active() {
            return Vec::new();
        }

        self.game_time = self.game_time.saturating_sub(1);
        if self.game_time == 0 {
            return self.end_match(now);
        }

        self.timers
            .schedule(TimerKey::CountdownTick, now + Duration::from_secs(1));
        vec![Outbound::all(ServerMsg::TimeUpdate {
            seconds_remaining: self.game_time,
        })]
    }

    fn end_match(&mut self, now: Instant) -> Vec<Outbound> {
        self.phase = MatchPhase::Ended;
        self.timers.cancel(&TimerKey::CountdownTick);

        let winner = SnapshotBuilder::winner(&self.registry);
        let final_scores = SnapshotBuilder::final_scores(&self.registry);

        match &winner {
            Some(w) => info!(winner = %w.name, score = w.score, "Match ended"),
            None => warn!("Match ended with no players left"),
        }

        self.timers
            .schedule(TimerKey::ResetMatch, now + self.rules.reset_delay);

        vec![Outbound::all(ServerMsg::GameEnded {
            winner,
            final_scores,
        })]
    }

    fn reset_match(&mut self) -> Vec<Outbound> {
        if self.phase != MatchPhase::Ended {
            return Vec::new();
        }

        let cancelled = self.timers.cancel_where(TimerKey::is_round_scoped);
        self.registry.clear_players();
        self.projectiles.clear();
        self.pickups.reset();
        self.phase = MatchPhase::Waiting;
        self.game_time = self.rules.match_duration_secs;
        self.game_start_time = None;

        info!(cancelled_timers = cancelled, "Arena reset, waiting for players");

        vec![
            Outbound::all(ServerMsg::HealthPacksUpdate {
                health_packs: self.pickups.health_packs().to_vec(),
            }),
            Outbound::all(ServerMsg::SpecialWeaponUpdate(
                self.pickups.special_weapon().clone(),
            )),
        ]
    }

    fn respawn_player(&mut self, player_id: Uuid) -> Vec<Outbound> {
        if !self.registry.contains(&player_id) {
            debug!(player_id = %player_id, "Respawn skipped, player left");
            return Vec::new();
        }

        let (spawn_index, position) = self.registry.available_spawn();
        let Some(player) = self.registry.get_mut(&player_id) else {
            return Vec::new();
        };
        player.respawn_at(spawn_index, position);

        info!(player = %player.name, spawn_index, "Player respawned");

        vec![Outbound::all(ServerMsg::PlayerRespawned {
            player_id,
            position,
            health: player.health,
        })]
    }

    fn expire_weapon(&mut self, player_id: Uuid) -> Vec<Outbound> {
        let Some(player) = self.registry.get_mut(&player_id) else {
            return Vec::new();
        };
        if player.weapon == Weapon::Pistol {
            return Vec::new();
        }

        player.weapon = Weapon::Pistol;
        info!(player = %player.name, "Special weapon expired");

        vec![Outbound::all(ServerMsg::WeaponExpired {
            player_id,
            weapon: Weapon::Pistol,
        })]
    }

    fn respawn_health_pack(&mut self, pack_id: String) -> Vec<Outbound> {
        if !self.pickups.restore_health_pack(&pack_id) {
            return Vec::new();
        }
        debug!(pack_id = %pack_id, "Health pack respawned");
        vec![Outbound::all(ServerMsg::HealthPackRespawned { pack_id })]
    }

    fn respawn_special_weapon(&mut self) -> Vec<Outbound> {
        if !self.pickups.restore_special_weapon() {
            return Vec::new();
        }
        debug!("Special weapon respawned");
        vec![Outbound::all(ServerMsg::SpecialWeaponRespawned(
            self.pickups.special_weapon().clone(),
        ))]
    }

    /// Drop every pending timer, returning how many were cancelled
    pub fn shutdown(&mut self) -> usize {
        let pending = self.timers.len();
        self.timers.clear();
        pending
    }
}

/// Handle to the running relay task
#[derive(Clone)]
pub struct MatchHandle {
    pub input_tx: mpsc::Sender<PlayerInput>,
    pub outbound_tx: broadcast::Sender<Outbound>,
    status: Arc<RwLock<MatchStatus>>,
}

impl MatchHandle {
    pub fn status(&self) -> MatchStatus {
        *self.status.read()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.outbound_tx.subscribe()
    }
}

/// The single authority task for a match
pub struct GameMatch {
    state: MatchState,
    input_rx: mpsc::Receiver<PlayerInput>,
    outbound_tx: broadcast::Sender<Outbound>,
    status: Arc<RwLock<MatchStatus>>,
}

impl GameMatch {
    pub fn new(rules: MatchRules, seed: u64) -> (Self, MatchHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (outbound_tx, _) = broadcast::channel(256);
        let state = MatchState::new(rules, seed);
        let status = Arc::new(RwLock::new(state.status()));

        let handle = MatchHandle {
            input_tx,
            outbound_tx: outbound_tx.clone(),
            status: status.clone(),
        };

        let game_match = Self {
            state,
            input_rx,
            outbound_tx,
            status,
        };

        (game_match, handle)
    }

    /// Process inputs and timers one at a time until every sender is gone
    pub async fn run(self) -> usize {
        self.run_until(std::future::pending()).await
    }

    /// Like `run`, but also stops when `shutdown` resolves. Returns how many
    /// timers were still pending.
    pub async fn run_until<F>(mut self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            min_players = self.state.rules.min_players,
            duration = self.state.rules.match_duration_secs,
            "Match relay running"
        );

        loop {
            let deadline = self.state.next_deadline();

            tokio::select! {
                input = self.input_rx.recv() => {
                    let Some(input) = input else { break };
                    self.process_input(input);
                }
                _ = wait_until(deadline) => {
                    let out = self.state.fire_due(Instant::now());
                    self.dispatch(out);
                }
                _ = &mut shutdown => break,
            }

            *self.status.write() = self.state.status();
        }

        let cancelled = self.state.shutdown();
        info!(cancelled_timers = cancelled, "Match relay stopped");
        cancelled
    }

    fn process_input(&mut self, input: PlayerInput) {
        let conn_id = input.conn_id;
        let queued_ms = unix_millis().saturating_sub(input.received_at);
        if queued_ms > INPUT_LAG_WARN_MS {
            warn!(conn_id = %conn_id, queued_ms, "Input waited long in the relay queue");
        }
        match self.state.handle_input(input, Instant::now()) {
            Ok(out) => self.dispatch(out),
            Err(rejection) => {
                debug!(conn_id = %conn_id, reason = %rejection, "Dropped client action");
            }
        }
    }

    fn dispatch(&self, out: Vec<Outbound>) {
        for msg in out {
            // No subscribers just means nobody is connected
            let _ = self.outbound_tx.send(msg);
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
