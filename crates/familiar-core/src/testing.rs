//! Mock collaborators shared by the unit tests of this crate.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use familiar_anim::{AnimationEngine, AnimationHandle, AnimationLibrary};
use familiar_api::{
    CompanionId, EntityId, EntityInfo, EntityKind, EntityProfile, EntityWorld, Location, OwnerAgent,
    ParticleEmission, Vec3,
};

use crate::context::{Collaborators, CompanionContext};

pub const REGION: &str = "overworld";
pub const OWNER_ID: EntityId = EntityId(1000);

pub fn at(x: f64, y: f64, z: f64) -> Location {
    Location::new(REGION, Vec3::new(x, y, z))
}

#[derive(Default)]
pub struct MockWorld {
    pub entities: Mutex<BTreeMap<EntityId, EntityInfo>>,
    pub next_id: Mutex<u64>,
    pub damage: Mutex<Vec<(EntityId, f64, Option<EntityId>)>>,
    pub names: Mutex<Vec<(EntityId, String)>>,
    pub profiles: Mutex<Vec<(EntityId, EntityKind)>>,
    pub removed: Mutex<Vec<EntityId>>,
    pub follows: Mutex<u32>,
    pub particles: Mutex<u32>,
    pub refuse_spawn: AtomicBool,
}

impl MockWorld {
    pub fn add_mob(&self, id: u64, location: Location, hostile: bool) -> EntityId {
        let id = EntityId(id);
        self.entities.lock().unwrap().insert(
            id,
            EntityInfo {
                id,
                name: format!("mob{}", id.0),
                kind: "ZOMBIE".into(),
                location,
                hostile,
                alive: true,
                health: 20.0,
            },
        );
        id
    }

    pub fn kill(&self, id: EntityId) {
        if let Some(e) = self.entities.lock().unwrap().get_mut(&id) {
            e.alive = false;
        }
    }

    pub fn damage_log(&self) -> Vec<(EntityId, f64, Option<EntityId>)> {
        self.damage.lock().unwrap().clone()
    }

    pub fn exists(&self, id: EntityId) -> bool {
        self.entities.lock().unwrap().contains_key(&id)
    }
}

impl EntityWorld for MockWorld {
    fn spawn_companion(&self, kind: EntityKind, at: &Location) -> Option<EntityId> {
        if self.refuse_spawn.load(Ordering::SeqCst) {
            return None;
        }
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let id = EntityId(500 + *next);
        self.entities.lock().unwrap().insert(
            id,
            EntityInfo {
                id,
                name: kind.to_string(),
                kind: kind.to_string(),
                location: at.clone(),
                hostile: false,
                alive: true,
                health: 20.0,
            },
        );
        Some(id)
    }

    fn apply_profile(&self, entity: EntityId, profile: &EntityProfile) {
        self.profiles.lock().unwrap().push((entity, profile.entity_type));
    }

    fn remove_entity(&self, entity: EntityId) {
        self.entities.lock().unwrap().remove(&entity);
        self.removed.lock().unwrap().push(entity);
    }

    fn entity(&self, entity: EntityId) -> Option<EntityInfo> {
        self.entities.lock().unwrap().get(&entity).cloned()
    }

    fn entities_in_box(&self, center: &Location, half: Vec3) -> Vec<EntityInfo> {
        self.entities
            .lock()
            .unwrap()
            .values()
            .filter(|e| {
                let d = e.location.position - center.position;
                e.location.same_region(center)
                    && d.x.abs() <= half.x
                    && d.y.abs() <= half.y
                    && d.z.abs() <= half.z
            })
            .cloned()
            .collect()
    }

    fn damage(&self, target: EntityId, amount: f64, source: Option<EntityId>) {
        self.damage.lock().unwrap().push((target, amount, source));
    }

    fn set_display_name(&self, entity: EntityId, name: &str) {
        self.names.lock().unwrap().push((entity, name.to_string()));
    }

    fn spawn_particle(&self, _emission: &ParticleEmission) {
        *self.particles.lock().unwrap() += 1;
    }

    fn follow(&self, _entity: EntityId, _target: &Location, _profile: &EntityProfile) {
        *self.follows.lock().unwrap() += 1;
    }

    fn navigate(&self, _entity: EntityId, _to: &Location, _speed: f64) {}

    fn stop_navigation(&self, _entity: EntityId) {}
}

pub struct MockOwner {
    pub online: AtomicBool,
    pub alive: AtomicBool,
    pub health: Mutex<f64>,
    pub absorption: Mutex<f64>,
    pub messages: Mutex<Vec<String>>,
    pub location: Mutex<Location>,
}

impl Default for MockOwner {
    fn default() -> Self {
        Self {
            online: AtomicBool::new(true),
            alive: AtomicBool::new(true),
            health: Mutex::new(10.0),
            absorption: Mutex::new(0.0),
            messages: Mutex::new(Vec::new()),
            location: Mutex::new(at(0.0, 64.0, 0.0)),
        }
    }
}

impl OwnerAgent for MockOwner {
    fn id(&self) -> EntityId {
        OWNER_ID
    }
    fn name(&self) -> String {
        "Alex".into()
    }
    fn location(&self) -> Location {
        self.location.lock().unwrap().clone()
    }
    fn look_direction(&self) -> Vec3 {
        Vec3::new(1.0, 0.0, 0.0)
    }
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
    fn health(&self) -> f64 {
        *self.health.lock().unwrap()
    }
    fn max_health(&self) -> f64 {
        20.0
    }
    fn heal(&self, amount: f64) {
        let mut health = self.health.lock().unwrap();
        *health = (*health + amount).min(20.0);
    }
    fn grant_absorption(&self, amount: f64) {
        let mut absorption = self.absorption.lock().unwrap();
        *absorption = absorption.max(amount);
    }
    fn send_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

pub fn stats(name: &str) -> f64 {
    match name {
        "strength" => 6.0,
        "magic" => 4.0,
        _ => 0.0,
    }
}

pub struct Fixture {
    pub world: Arc<MockWorld>,
    pub owner: Arc<MockOwner>,
    pub collaborators: Collaborators,
    pub engine: AnimationEngine,
    pub handles: Vec<AnimationHandle>,
    pub profile: EntityProfile,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_library(AnimationLibrary::new())
    }

    pub fn with_library(library: AnimationLibrary) -> Self {
        let world = Arc::new(MockWorld::default());
        let owner = Arc::new(MockOwner::default());
        let collaborators = Collaborators {
            world: world.clone(),
            owner: owner.clone(),
            stats: Arc::new(stats),
        };
        Self {
            world,
            owner,
            collaborators,
            engine: AnimationEngine::new(Arc::new(library)),
            handles: Vec::new(),
            profile: EntityProfile::default(),
        }
    }

    /// A context for a companion standing at `location` with no spawned entity.
    pub fn context(&mut self, location: Location) -> CompanionContext<'_> {
        CompanionContext::new(
            CompanionId(1),
            "wisp",
            None,
            location,
            &self.profile,
            &self.collaborators,
            &mut self.engine,
            &mut self.handles,
        )
    }
}
