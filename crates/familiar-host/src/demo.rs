//! In-memory demo world: one owner walking a circle, the companions bound to
//! it, and hostile mobs that spawn around the owner and chase it.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use familiar_api::{
    EntityId, EntityInfo, EntityKind, EntityProfile, EntityWorld, Location, OwnerAgent, ParticleEmission, Vec3,
};
use rand::Rng;
use tracing::{debug, info, trace};

pub const REGION: &str = "overworld";
pub const GROUND_Y: f64 = 64.0;

/// Blocks moved per tick at speed 1.0.
const WALK_STEP: f64 = 0.25;
/// Hostiles closer than this chase the owner.
const CHASE_RANGE: f64 = 12.0;
const CHASE_SPEED: f64 = 0.8;
/// Hostiles this close hit the owner once per second.
const MELEE_RANGE: f64 = 1.5;
const MELEE_DAMAGE: f64 = 2.0;
const HOSTILE_KINDS: &[EntityKind] = &[
    EntityKind::Zombie,
    EntityKind::Skeleton,
    EntityKind::Spider,
    EntityKind::Creeper,
];

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn ground(x: f64, z: f64) -> Location {
    Location::new(REGION, Vec3::new(x, GROUND_Y, z))
}

// ─── Spawning ────────────────────────────────────────────────────────────────

/// Configuration for hostile spawning around the owner.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Maximum hostile mobs in the world.
    pub hostile_cap: usize,
    /// Ticks between spawn attempts.
    pub spawn_interval: u64,
    /// Minimum distance from the owner to spawn (blocks).
    pub min_distance: f64,
    /// Maximum distance from the owner to spawn (blocks).
    pub max_distance: f64,
    /// Distance beyond which hostiles are despawned.
    pub despawn_distance: f64,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            hostile_cap: 6,
            spawn_interval: 100,
            min_distance: 6.0,
            max_distance: 16.0,
            despawn_distance: 48.0,
        }
    }
}

/// Pick a random ground position within [min_dist, max_dist] of `center`.
fn random_spawn_position(rng: &mut impl Rng, center: Vec3, min_dist: f64, max_dist: f64) -> Location {
    let angle: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
    let dist: f64 = rng.gen_range(min_dist..=max_dist);
    ground(center.x + angle.cos() * dist, center.z + angle.sin() * dist)
}

// ─── World ───────────────────────────────────────────────────────────────────

struct Mob {
    info: EntityInfo,
    /// Set for companions.
    profile: Option<EntityProfile>,
    goal: Option<(Vec3, f64)>,
}

impl Mob {
    fn is_companion(&self) -> bool {
        self.profile.is_some()
    }

    /// Walk toward the goal; the goal clears on arrival.
    fn advance(&mut self) {
        let Some((goal, speed)) = self.goal else {
            return;
        };
        let position = self.info.location.position;
        let delta = goal - position;
        let distance = delta.length();
        let step = speed * WALK_STEP;
        if distance <= step {
            self.info.location.position = goal;
            self.goal = None;
        } else {
            self.info.location.position = position + delta * (step / distance);
        }
    }
}

struct WorldState {
    mobs: BTreeMap<EntityId, Mob>,
    next_id: u64,
    particles: u64,
}

/// [`EntityWorld`] kept entirely in memory.
pub struct DemoWorld {
    spawn: SpawnConfig,
    state: Mutex<WorldState>,
}

impl DemoWorld {
    pub fn new(spawn: SpawnConfig) -> Self {
        Self {
            spawn,
            state: Mutex::new(WorldState {
                mobs: BTreeMap::new(),
                next_id: 100,
                particles: 0,
            }),
        }
    }

    fn insert(&self, kind: EntityKind, at: &Location, hostile: bool, profile: Option<EntityProfile>) -> EntityId {
        let mut state = lock(&self.state);
        let id = EntityId(state.next_id);
        state.next_id += 1;
        let info = EntityInfo {
            id,
            name: kind.as_str().to_lowercase(),
            kind: kind.as_str().to_string(),
            location: at.clone(),
            hostile,
            alive: true,
            health: 20.0,
        };
        state.mobs.insert(
            id,
            Mob {
                info,
                profile,
                goal: None,
            },
        );
        id
    }

    pub fn spawn_hostile(&self, kind: EntityKind, at: &Location) -> EntityId {
        let id = self.insert(kind, at, true, None);
        debug!("Spawned {kind} {id} at {:?}", at.position);
        id
    }

    pub fn hostile_count(&self) -> usize {
        lock(&self.state)
            .mobs
            .values()
            .filter(|m| m.info.hostile && m.info.alive)
            .count()
    }

    pub fn particles_emitted(&self) -> u64 {
        lock(&self.state).particles
    }

    pub fn entity_count(&self) -> usize {
        lock(&self.state).mobs.len()
    }

    /// Advance the world one tick around `owner`.
    pub fn step(&self, tick: u64, owner: &DemoOwner) {
        let center = owner.location().position;
        let mut rng = rand::thread_rng();
        let mut hits = 0;
        {
            let mut state = lock(&self.state);

            state.mobs.retain(|id, mob| {
                if !mob.info.alive {
                    debug!("Removed dead {} {id}", mob.info.kind);
                    return false;
                }
                true
            });

            for mob in state.mobs.values_mut() {
                if mob.info.hostile {
                    let distance = mob.info.location.position.distance_squared(center).sqrt();
                    if distance <= MELEE_RANGE {
                        mob.goal = None;
                        if tick % 20 == 0 {
                            hits += 1;
                        }
                    } else if distance <= CHASE_RANGE {
                        mob.goal = Some((center, CHASE_SPEED));
                    } else if mob.goal.is_none() && rng.gen_bool(0.05) {
                        let p = mob.info.location.position;
                        let target = Vec3::new(p.x + rng.gen_range(-4.0..4.0), GROUND_Y, p.z + rng.gen_range(-4.0..4.0));
                        mob.goal = Some((target, 0.5));
                    }
                }
                mob.advance();
            }

            let despawn_sq = self.spawn.despawn_distance * self.spawn.despawn_distance;
            state.mobs.retain(|id, mob| {
                if mob.is_companion() || mob.info.location.position.distance_squared(center) <= despawn_sq {
                    return true;
                }
                debug!("Despawned far {} {id}", mob.info.kind);
                false
            });
        }

        for _ in 0..hits {
            owner.hurt(MELEE_DAMAGE);
        }

        if tick > 0 && tick % self.spawn.spawn_interval == 0 && self.hostile_count() < self.spawn.hostile_cap {
            let at = random_spawn_position(&mut rng, center, self.spawn.min_distance, self.spawn.max_distance);
            let kind = HOSTILE_KINDS[rng.gen_range(0..HOSTILE_KINDS.len())];
            self.spawn_hostile(kind, &at);
        }
    }
}

impl EntityWorld for DemoWorld {
    fn spawn_companion(&self, kind: EntityKind, at: &Location) -> Option<EntityId> {
        if !at.position.is_finite() {
            return None;
        }
        Some(self.insert(kind, at, false, Some(EntityProfile::default())))
    }

    fn apply_profile(&self, entity: EntityId, profile: &EntityProfile) {
        if let Some(mob) = lock(&self.state).mobs.get_mut(&entity) {
            mob.info.kind = profile.entity_type.as_str().to_string();
            mob.profile = Some(profile.clone());
        }
    }

    fn remove_entity(&self, entity: EntityId) {
        lock(&self.state).mobs.remove(&entity);
    }

    fn entity(&self, entity: EntityId) -> Option<EntityInfo> {
        lock(&self.state).mobs.get(&entity).map(|m| m.info.clone())
    }

    fn entities_in_box(&self, center: &Location, half_extents: Vec3) -> Vec<EntityInfo> {
        lock(&self.state)
            .mobs
            .values()
            .filter(|m| {
                let d = m.info.location.position - center.position;
                m.info.location.same_region(center)
                    && d.x.abs() <= half_extents.x
                    && d.y.abs() <= half_extents.y
                    && d.z.abs() <= half_extents.z
            })
            .map(|m| m.info.clone())
            .collect()
    }

    fn damage(&self, target: EntityId, amount: f64, source: Option<EntityId>) {
        let mut state = lock(&self.state);
        let Some(mob) = state.mobs.get_mut(&target) else {
            return;
        };
        if !mob.info.alive || amount <= 0.0 {
            return;
        }
        mob.info.health = (mob.info.health - amount).max(0.0);
        debug!(
            "{} {target} took {amount:.1} damage from {source:?} ({:.1} left)",
            mob.info.kind, mob.info.health
        );
        if mob.info.health == 0.0 {
            mob.info.alive = false;
            info!("{} {target} was slain", mob.info.kind);
        }
    }

    fn set_display_name(&self, entity: EntityId, name: &str) {
        if let Some(mob) = lock(&self.state).mobs.get_mut(&entity) {
            mob.info.name = name.to_string();
            info!("{entity} is now called '{name}'");
        }
    }

    fn spawn_particle(&self, emission: &ParticleEmission) {
        lock(&self.state).particles += 1;
        trace!(
            "{} x{} at ({:.1}, {:.1}, {:.1})",
            emission.particle,
            emission.count,
            emission.at.position.x,
            emission.at.position.y,
            emission.at.position.z
        );
    }

    fn follow(&self, entity: EntityId, target: &Location, profile: &EntityProfile) {
        let mut state = lock(&self.state);
        let Some(mob) = state.mobs.get_mut(&entity) else {
            return;
        };
        let distance = mob.info.location.position.distance_squared(target.position).sqrt();
        if !mob.info.location.same_region(target) || distance > profile.leash_distance {
            mob.info.location = target.clone();
            mob.goal = None;
            debug!("{entity} teleported to its owner");
        } else if distance > profile.follow_start_distance {
            mob.goal = Some((target.position, profile.follow_speed));
        } else if distance < profile.follow_stop_distance {
            mob.goal = None;
        }
    }

    fn navigate(&self, entity: EntityId, to: &Location, speed: f64) {
        if let Some(mob) = lock(&self.state).mobs.get_mut(&entity) {
            mob.goal = Some((to.position, speed.max(0.0)));
        }
    }

    fn stop_navigation(&self, entity: EntityId) {
        if let Some(mob) = lock(&self.state).mobs.get_mut(&entity) {
            mob.goal = None;
        }
    }
}

// ─── Owner ───────────────────────────────────────────────────────────────────

const OWNER_MAX_HEALTH: f64 = 20.0;
const WALK_RADIUS: f64 = 8.0;
/// Radians walked per tick.
const WALK_RATE: f64 = 0.01;

struct OwnerState {
    location: Location,
    look: Vec3,
    health: f64,
    absorption: f64,
    online: bool,
}

/// The demo player: walks a circle around the origin.
pub struct DemoOwner {
    name: String,
    state: Mutex<OwnerState>,
}

impl DemoOwner {
    pub const ID: EntityId = EntityId(1);

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(OwnerState {
                location: ground(WALK_RADIUS, 0.0),
                look: Vec3::new(0.0, 0.0, 1.0),
                health: OWNER_MAX_HEALTH,
                absorption: 0.0,
                online: true,
            }),
        }
    }

    pub fn walk(&self, tick: u64) {
        let angle = tick as f64 * WALK_RATE;
        let mut state = lock(&self.state);
        state.location = ground(angle.cos() * WALK_RADIUS, angle.sin() * WALK_RADIUS);
        state.look = Vec3::new(-angle.sin(), 0.0, angle.cos());
    }

    /// Take damage; absorption is consumed first.
    pub fn hurt(&self, amount: f64) {
        let mut state = lock(&self.state);
        let absorbed = amount.min(state.absorption);
        state.absorption -= absorbed;
        state.health = (state.health - (amount - absorbed)).max(0.0);
        debug!("{} took {amount:.1} damage ({:.1} health left)", self.name, state.health);
    }

    pub fn absorption(&self) -> f64 {
        lock(&self.state).absorption
    }

    pub fn set_online(&self, online: bool) {
        lock(&self.state).online = online;
    }

    /// Back online at full health.
    pub fn respawn(&self) {
        let mut state = lock(&self.state);
        state.online = true;
        state.health = OWNER_MAX_HEALTH;
        state.absorption = 0.0;
    }
}

impl OwnerAgent for DemoOwner {
    fn id(&self) -> EntityId {
        Self::ID
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn location(&self) -> Location {
        lock(&self.state).location.clone()
    }

    fn look_direction(&self) -> Vec3 {
        lock(&self.state).look
    }

    fn is_online(&self) -> bool {
        lock(&self.state).online
    }

    fn is_alive(&self) -> bool {
        lock(&self.state).health > 0.0
    }

    fn health(&self) -> f64 {
        lock(&self.state).health
    }

    fn max_health(&self) -> f64 {
        OWNER_MAX_HEALTH
    }

    fn heal(&self, amount: f64) {
        let mut state = lock(&self.state);
        state.health = (state.health + amount.max(0.0)).min(OWNER_MAX_HEALTH);
    }

    fn grant_absorption(&self, amount: f64) {
        let mut state = lock(&self.state);
        state.absorption = state.absorption.max(amount);
    }

    fn send_message(&self, message: &str) {
        info!("[to {}] {message}", self.name);
    }
}

/// Companion statistics for the demo.
pub fn demo_stats(name: &str) -> f64 {
    match name {
        "health" => 40.0,
        "attack" | "strength" => 6.0,
        "defense" => 3.0,
        "magic" => 5.0,
        "level" => 1.0,
        _ => 0.0,
    }
}
