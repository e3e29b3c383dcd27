//! Small collaborators for driving script hooks in tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use familiar_anim::{
    AnimationDefinition, AnimationEngine, AnimationHandle, AnimationLibrary, AreaPulse, FrameSequence,
    ParticleFrame, Raycast,
};
use familiar_api::{
    CompanionId, EntityId, EntityInfo, EntityKind, EntityProfile, EntityWorld, Location, OwnerAgent,
    ParticleEmission, ParticleKind, Vec3,
};
use familiar_core::{Collaborators, CompanionContext};

pub const OWNER_ID: EntityId = EntityId(1000);
pub const COMPANION_ENTITY: EntityId = EntityId(600);

pub fn at(x: f64, y: f64, z: f64) -> Location {
    Location::new("overworld", Vec3::new(x, y, z))
}

#[derive(Default)]
pub struct MockWorld {
    pub entities: Mutex<BTreeMap<EntityId, EntityInfo>>,
    pub damage: Mutex<Vec<(EntityId, f64, Option<EntityId>)>>,
    pub names: Mutex<Vec<(EntityId, String)>>,
    /// `Some((to, speed))` per navigate call, `None` per stop.
    pub navigation: Mutex<Vec<Option<(Location, f64)>>>,
}

impl MockWorld {
    pub fn add_mob(&self, id: u64, location: Location, hostile: bool) -> EntityId {
        let id = EntityId(id);
        self.entities.lock().unwrap().insert(
            id,
            EntityInfo {
                id,
                name: format!("mob{id}"),
                kind: "ZOMBIE".into(),
                location,
                hostile,
                alive: true,
                health: 20.0,
            },
        );
        id
    }

    pub fn damage_log(&self) -> Vec<(EntityId, f64, Option<EntityId>)> {
        self.damage.lock().unwrap().clone()
    }

    pub fn navigation(&self) -> Vec<Option<(Location, f64)>> {
        self.navigation.lock().unwrap().clone()
    }
}

impl EntityWorld for MockWorld {
    fn spawn_companion(&self, _kind: EntityKind, _at: &Location) -> Option<EntityId> {
        Some(COMPANION_ENTITY)
    }

    fn apply_profile(&self, _entity: EntityId, _profile: &EntityProfile) {}

    fn remove_entity(&self, entity: EntityId) {
        self.entities.lock().unwrap().remove(&entity);
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
                e.location.same_region(center) && d.x.abs() <= half.x && d.y.abs() <= half.y && d.z.abs() <= half.z
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

    fn spawn_particle(&self, _emission: &ParticleEmission) {}

    fn follow(&self, _entity: EntityId, _target: &Location, _profile: &EntityProfile) {}

    fn navigate(&self, _entity: EntityId, to: &Location, speed: f64) {
        self.navigation.lock().unwrap().push(Some((to.clone(), speed)));
    }

    fn stop_navigation(&self, _entity: EntityId) {
        self.navigation.lock().unwrap().push(None);
    }
}

pub struct MockOwner {
    health: Mutex<f64>,
    absorption: Mutex<f64>,
    messages: Mutex<Vec<String>>,
}

impl Default for MockOwner {
    fn default() -> Self {
        Self {
            health: Mutex::new(10.0),
            absorption: Mutex::new(0.0),
            messages: Mutex::new(Vec::new()),
        }
    }
}

impl MockOwner {
    pub fn absorption(&self) -> f64 {
        *self.absorption.lock().unwrap()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
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
        at(0.0, 64.0, 0.0)
    }
    fn look_direction(&self) -> Vec3 {
        Vec3::new(0.0, 0.0, 1.0)
    }
    fn is_online(&self) -> bool {
        true
    }
    fn is_alive(&self) -> bool {
        true
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
        *self.absorption.lock().unwrap() = amount;
    }
    fn send_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

fn stats(name: &str) -> f64 {
    if name == "magic" {
        4.0
    } else {
        0.0
    }
}

/// `glow` and the frameless `blank` sequence, `beam` raycast and `ring` area.
fn library() -> AnimationLibrary {
    let mut library = AnimationLibrary::new();
    library.insert(AnimationDefinition::Sequence(
        FrameSequence::new("glow").frame(ParticleFrame::new(ParticleKind::Glow)),
    ));
    library.insert(AnimationDefinition::Sequence(FrameSequence::new("blank")));
    library.insert(AnimationDefinition::Raycast(Raycast::new("beam")));
    library.insert(AnimationDefinition::Area(AreaPulse::new("ring")));
    library
}

pub struct Fixture {
    pub world: Arc<MockWorld>,
    pub owner: Arc<MockOwner>,
    pub collaborators: Collaborators,
    pub engine: AnimationEngine,
    pub handles: Vec<AnimationHandle>,
    pub profile: EntityProfile,
    pub entity: EntityId,
    pub debug_to_owner: bool,
}

impl Fixture {
    pub fn new() -> Self {
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
            engine: AnimationEngine::new(Arc::new(library())),
            handles: Vec::new(),
            profile: EntityProfile::default(),
            entity: COMPANION_ENTITY,
            debug_to_owner: false,
        }
    }

    /// Context of companion 1 running behavior `wisp` at `location`.
    pub fn context(&mut self, location: Location) -> CompanionContext<'_> {
        CompanionContext::new(
            CompanionId(1),
            "wisp",
            Some(self.entity),
            location,
            &self.profile,
            &self.collaborators,
            &mut self.engine,
            &mut self.handles,
        )
        .debug_to_owner(self.debug_to_owner)
    }
}
