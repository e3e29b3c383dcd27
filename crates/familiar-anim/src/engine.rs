//! Animation engine: owns every running instance and advances them one tick
//! at a time.
//!
//! Instances started during a tick take their first step on the next call to
//! [`AnimationEngine::tick`]. Steps within one instance fire in tick order;
//! instances are advanced in start order.

use std::collections::HashSet;
use std::f64::consts::TAU;
use std::sync::Arc;

use familiar_api::{CompanionId, EntityId, EntityInfo, EntityWorld, Location, ParticleEmission, Vec3};
use tracing::{debug, trace};

use crate::definition::{AreaPulse, FrameSequence, Raycast};
use crate::handle::{AnimationHandle, HandleId};
use crate::library::AnimationLibrary;

/// Candidate filter for hit tests. Returning `false` skips the entity.
pub type EntityFilter = Box<dyn Fn(&EntityInfo) -> bool + Send>;

/// Which primitive produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitSource {
    Raycast,
    Area,
}

/// Something that happened while advancing animations.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationEvent {
    /// A raycast emitted a point.
    Step {
        handle: HandleId,
        owner: Option<CompanionId>,
        point: Location,
    },
    /// First contact between an instance and an entity.
    Hit {
        handle: HandleId,
        owner: Option<CompanionId>,
        source: HitSource,
        entity: EntityInfo,
    },
    /// The instance ran to completion.
    Finished {
        handle: HandleId,
        owner: Option<CompanionId>,
    },
}

// ─── Running instances ───────────────────────────────────────────────────────

struct SequenceRun {
    definition: Arc<FrameSequence>,
    plan: Vec<(u64, usize)>,
    next: usize,
    elapsed: u64,
    origin: Location,
    viewer: Option<EntityId>,
}

impl SequenceRun {
    fn advance(&mut self, world: &dyn EntityWorld) -> bool {
        while let Some(&(offset, index)) = self.plan.get(self.next) {
            if offset > self.elapsed {
                break;
            }
            let frame = &self.definition.frames[index];
            world.spawn_particle(&ParticleEmission {
                particle: frame.particle,
                at: self.origin.offset(frame.offset),
                count: frame.count,
                spread: frame.spread,
                speed: frame.speed,
                viewer: self.viewer,
            });
            self.next += 1;
        }
        self.elapsed += 1;
        self.next >= self.plan.len()
    }
}

struct RaycastRun {
    definition: Arc<Raycast>,
    origin: Location,
    direction: Vec3,
    traveled: f64,
    elapsed: u64,
    seen: HashSet<EntityId>,
    filter: Option<EntityFilter>,
}

impl RaycastRun {
    fn advance(&mut self, world: &dyn EntityWorld, ctx: &StepContext, events: &mut Vec<AnimationEvent>) -> bool {
        let due = self.elapsed % self.definition.period() == 0;
        self.elapsed += 1;
        if !due {
            return false;
        }
        if self.traveled > self.definition.max_distance {
            return true;
        }

        let ray = &self.definition;
        let point = self.origin.offset(self.direction * self.traveled);
        world.spawn_particle(&ParticleEmission {
            particle: ray.particle,
            at: point.clone(),
            count: ray.count,
            spread: ray.spread,
            speed: ray.speed,
            viewer: None,
        });
        events.push(AnimationEvent::Step {
            handle: ctx.handle,
            owner: ctx.owner,
            point: point.clone(),
        });

        let r = ray.hit_radius;
        let candidates = world.entities_in_box(&point, Vec3::new(r, r, r));
        report_new_hits(candidates, &mut self.seen, self.filter.as_ref(), HitSource::Raycast, ctx, events);

        self.traveled += ray.step;
        false
    }
}

struct AreaRun {
    definition: Arc<AreaPulse>,
    center: Location,
    ticks: u64,
    elapsed: u64,
    seen: HashSet<EntityId>,
    filter: Option<EntityFilter>,
}

impl AreaRun {
    fn advance(&mut self, world: &dyn EntityWorld, ctx: &StepContext, events: &mut Vec<AnimationEvent>) -> bool {
        let area = Arc::clone(&self.definition);
        let interval = area.interval();
        let due = self.ticks % interval == 0;
        self.ticks += 1;
        if !due {
            return false;
        }
        if self.elapsed > area.duration_ticks {
            return true;
        }

        for layer in 0..area.layers {
            let y = layer as f64 * area.layer_spacing;
            for point in 0..area.points_per_layer {
                let angle = TAU * point as f64 / area.points_per_layer as f64;
                let offset = Vec3::new(angle.cos() * area.radius, y, angle.sin() * area.radius);
                world.spawn_particle(&ParticleEmission {
                    particle: area.particle,
                    at: self.center.offset(offset),
                    count: area.count,
                    spread: area.spread,
                    speed: area.speed,
                    viewer: None,
                });
            }
        }

        if area.affect_entities {
            let candidates = world.entities_in_box(&self.center, area.scan_extents());
            report_new_hits(candidates, &mut self.seen, self.filter.as_ref(), HitSource::Area, ctx, events);
        }

        self.elapsed += interval;
        false
    }
}

struct StepContext {
    handle: HandleId,
    owner: Option<CompanionId>,
}

/// Push a hit for every live, accepted entity not seen before by this instance.
fn report_new_hits(
    candidates: Vec<EntityInfo>,
    seen: &mut HashSet<EntityId>,
    filter: Option<&EntityFilter>,
    source: HitSource,
    ctx: &StepContext,
    events: &mut Vec<AnimationEvent>,
) {
    for entity in candidates {
        if !entity.alive || seen.contains(&entity.id) {
            continue;
        }
        if let Some(filter) = filter {
            if !filter(&entity) {
                continue;
            }
        }
        seen.insert(entity.id);
        events.push(AnimationEvent::Hit {
            handle: ctx.handle,
            owner: ctx.owner,
            source,
            entity,
        });
    }
}

enum Run {
    Sequence(SequenceRun),
    Raycast(RaycastRun),
    Area(AreaRun),
}

struct ActiveAnimation {
    handle: AnimationHandle,
    owner: Option<CompanionId>,
    run: Run,
}

impl ActiveAnimation {
    /// Advance one tick. Returns `true` once complete.
    fn advance(&mut self, world: &dyn EntityWorld, events: &mut Vec<AnimationEvent>) -> bool {
        let ctx = StepContext {
            handle: self.handle.id(),
            owner: self.owner,
        };
        match &mut self.run {
            Run::Sequence(run) => run.advance(world),
            Run::Raycast(run) => run.advance(world, &ctx, events),
            Run::Area(run) => run.advance(world, &ctx, events),
        }
    }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Starts and advances animation instances against the current library.
pub struct AnimationEngine {
    library: Arc<AnimationLibrary>,
    active: Vec<ActiveAnimation>,
    next_handle: u64,
}

impl AnimationEngine {
    pub fn new(library: Arc<AnimationLibrary>) -> Self {
        Self {
            library,
            active: Vec::new(),
            next_handle: 1,
        }
    }

    /// Switch to a newly published library. Running instances keep the
    /// definitions they started with.
    pub fn use_library(&mut self, library: Arc<AnimationLibrary>) {
        if !Arc::ptr_eq(&self.library, &library) {
            debug!("Animation engine switched to a library of {} definitions", library.len());
            self.library = library;
        }
    }

    pub fn library(&self) -> &Arc<AnimationLibrary> {
        &self.library
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    fn allocate(&mut self) -> AnimationHandle {
        let id = HandleId(self.next_handle);
        self.next_handle += 1;
        AnimationHandle::new(id)
    }

    fn start(&mut self, owner: Option<CompanionId>, run: Run) -> AnimationHandle {
        let handle = self.allocate();
        self.active.push(ActiveAnimation {
            handle: handle.clone(),
            owner,
            run,
        });
        handle
    }

    /// Play a frame sequence at `origin`, visible to `viewer` only or to everyone.
    ///
    /// Returns `None` for an unknown name. A sequence without frames returns an
    /// already finished handle.
    pub fn play_sequence(
        &mut self,
        name: &str,
        origin: Location,
        viewer: Option<EntityId>,
        owner: Option<CompanionId>,
    ) -> Option<AnimationHandle> {
        let Some(definition) = self.library.sequence(name) else {
            debug!("Unknown particle sequence '{name}'");
            return None;
        };
        let plan = definition.schedule();
        if plan.is_empty() {
            let handle = self.allocate();
            handle.mark_finished();
            return Some(handle);
        }
        trace!("Playing sequence '{}' with {} emits", definition.name, plan.len());
        Some(self.start(
            owner,
            Run::Sequence(SequenceRun {
                definition,
                plan,
                next: 0,
                elapsed: 0,
                origin,
                viewer,
            }),
        ))
    }

    /// Cast a raycast from `origin` along `direction`.
    ///
    /// Returns `None` for an unknown name or a zero direction.
    pub fn play_raycast(
        &mut self,
        name: &str,
        origin: Location,
        direction: Vec3,
        owner: Option<CompanionId>,
        filter: Option<EntityFilter>,
    ) -> Option<AnimationHandle> {
        let Some(definition) = self.library.raycast(name) else {
            debug!("Unknown raycast animation '{name}'");
            return None;
        };
        let Some(direction) = direction.normalized() else {
            debug!("Raycast '{name}' has no direction");
            return None;
        };
        Some(self.start(
            owner,
            Run::Raycast(RaycastRun {
                definition,
                origin,
                direction,
                traveled: 0.0,
                elapsed: 0,
                seen: HashSet::new(),
                filter,
            }),
        ))
    }

    /// Pulse an area effect around `center`. Returns `None` for an unknown name.
    pub fn play_area_effect(
        &mut self,
        name: &str,
        center: Location,
        owner: Option<CompanionId>,
        filter: Option<EntityFilter>,
    ) -> Option<AnimationHandle> {
        let Some(definition) = self.library.area(name) else {
            debug!("Unknown area effect '{name}'");
            return None;
        };
        Some(self.start(
            owner,
            Run::Area(AreaRun {
                definition,
                center,
                ticks: 0,
                elapsed: 0,
                seen: HashSet::new(),
                filter,
            }),
        ))
    }

    /// Advance every instance by one tick and drop the completed and cancelled ones.
    pub fn tick(&mut self, world: &dyn EntityWorld) -> Vec<AnimationEvent> {
        let mut events = Vec::new();
        self.active.retain_mut(|anim| {
            if anim.handle.is_cancelled() {
                return false;
            }
            if anim.advance(world, &mut events) {
                anim.handle.mark_finished();
                events.push(AnimationEvent::Finished {
                    handle: anim.handle.id(),
                    owner: anim.owner,
                });
                return false;
            }
            true
        });
        events
    }

    /// Cancel every instance tagged with `owner`. Returns how many were running.
    pub fn cancel_owned_by(&mut self, owner: CompanionId) -> usize {
        let mut cancelled = 0;
        self.active.retain(|anim| {
            if anim.owner == Some(owner) {
                anim.handle.cancel();
                cancelled += 1;
                false
            } else {
                true
            }
        });
        cancelled
    }

    pub fn cancel_all(&mut self) {
        for anim in self.active.drain(..) {
            anim.handle.cancel();
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use familiar_api::{EntityKind, EntityProfile, ParticleKind};

    use super::*;
    use crate::definition::{AnimationDefinition, ParticleFrame};

    #[derive(Default)]
    struct MockWorld {
        tick: Mutex<u64>,
        emissions: Mutex<Vec<(u64, ParticleEmission)>>,
        entities: Mutex<Vec<EntityInfo>>,
    }

    impl MockWorld {
        fn set_tick(&self, tick: u64) {
            *self.tick.lock().unwrap() = tick;
        }

        fn emission_ticks(&self) -> Vec<u64> {
            self.emissions.lock().unwrap().iter().map(|(t, _)| *t).collect()
        }

        fn emission_count(&self) -> usize {
            self.emissions.lock().unwrap().len()
        }

        fn add_entity(&self, id: u64, position: Vec3) {
            self.entities.lock().unwrap().push(EntityInfo {
                id: EntityId(id),
                name: format!("mob{id}"),
                kind: "ZOMBIE".into(),
                location: Location::new("overworld", position),
                hostile: true,
                alive: true,
                health: 20.0,
            });
        }
    }

    impl EntityWorld for MockWorld {
        fn spawn_companion(&self, _kind: EntityKind, _at: &Location) -> Option<EntityId> {
            None
        }
        fn apply_profile(&self, _entity: EntityId, _profile: &EntityProfile) {}
        fn remove_entity(&self, _entity: EntityId) {}
        fn entity(&self, _entity: EntityId) -> Option<EntityInfo> {
            None
        }
        fn entities_in_box(&self, center: &Location, half: Vec3) -> Vec<EntityInfo> {
            self.entities
                .lock()
                .unwrap()
                .iter()
                .filter(|e| {
                    let p = e.location.position;
                    let c = center.position;
                    e.location.same_region(center)
                        && (p.x - c.x).abs() <= half.x
                        && (p.y - c.y).abs() <= half.y
                        && (p.z - c.z).abs() <= half.z
                })
                .cloned()
                .collect()
        }
        fn damage(&self, _target: EntityId, _amount: f64, _source: Option<EntityId>) {}
        fn set_display_name(&self, _entity: EntityId, _name: &str) {}
        fn spawn_particle(&self, emission: &ParticleEmission) {
            let tick = *self.tick.lock().unwrap();
            self.emissions.lock().unwrap().push((tick, emission.clone()));
        }
        fn follow(&self, _entity: EntityId, _target: &Location, _profile: &EntityProfile) {}
        fn navigate(&self, _entity: EntityId, _to: &Location, _speed: f64) {}
        fn stop_navigation(&self, _entity: EntityId) {}
    }

    fn origin() -> Location {
        Location::new("overworld", Vec3::ZERO)
    }

    fn engine_with(defs: Vec<AnimationDefinition>) -> AnimationEngine {
        let mut lib = AnimationLibrary::new();
        for def in defs {
            lib.insert(def);
        }
        AnimationEngine::new(Arc::new(lib))
    }

    /// Run `ticks` engine ticks, collecting every event.
    fn run(engine: &mut AnimationEngine, world: &MockWorld, ticks: u64) -> Vec<AnimationEvent> {
        let mut events = Vec::new();
        for t in 0..ticks {
            world.set_tick(t);
            events.extend(engine.tick(world));
        }
        events
    }

    fn hits(events: &[AnimationEvent]) -> Vec<EntityId> {
        events
            .iter()
            .filter_map(|e| match e {
                AnimationEvent::Hit { entity, .. } => Some(entity.id),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn sequence_fires_at_accumulated_offsets() {
        let seq = FrameSequence::new("pulse")
            .frame(ParticleFrame::new(ParticleKind::EndRod).delay(0))
            .frame(ParticleFrame::new(ParticleKind::Heart).delay(6))
            .repeats(2)
            .loop_delay(4);
        let mut engine = engine_with(vec![AnimationDefinition::Sequence(seq)]);
        let world = MockWorld::default();
        let handle = engine.play_sequence("PULSE", origin(), None, None).unwrap();

        run(&mut engine, &world, 30);
        assert_eq!(world.emission_ticks(), vec![0, 6, 10, 16]);
        assert!(handle.is_finished());
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn sequence_targets_viewer_at_offset() {
        let seq = FrameSequence::new("halo")
            .frame(ParticleFrame::new(ParticleKind::Glow).offset(Vec3::new(0.0, 2.0, 0.0)));
        let mut engine = engine_with(vec![AnimationDefinition::Sequence(seq)]);
        let world = MockWorld::default();
        engine.play_sequence("halo", origin(), Some(EntityId(9)), None);
        run(&mut engine, &world, 1);

        let emissions = world.emissions.lock().unwrap();
        assert_eq!(emissions.len(), 1);
        assert_eq!(emissions[0].1.viewer, Some(EntityId(9)));
        assert_eq!(emissions[0].1.at.position, Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn empty_sequence_is_finished_noop() {
        let mut engine = engine_with(vec![AnimationDefinition::Sequence(FrameSequence::new("nothing"))]);
        let handle = engine.play_sequence("nothing", origin(), None, None).unwrap();
        assert!(handle.is_finished());
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn unknown_names_return_none() {
        let mut engine = engine_with(Vec::new());
        assert!(engine.play_sequence("missing", origin(), None, None).is_none());
        assert!(engine
            .play_raycast("missing", origin(), Vec3::UP, None, None)
            .is_none());
        assert!(engine.play_area_effect("missing", origin(), None, None).is_none());
    }

    #[test]
    fn raycast_zero_direction_fails() {
        let mut engine = engine_with(vec![AnimationDefinition::Raycast(Raycast::new("bolt"))]);
        assert!(engine
            .play_raycast("bolt", origin(), Vec3::ZERO, None, None)
            .is_none());
    }

    #[test]
    fn raycast_emits_five_points() {
        let mut ray = Raycast::new("bolt");
        ray.step = 0.5;
        ray.max_distance = 2.0;
        let mut engine = engine_with(vec![AnimationDefinition::Raycast(ray)]);
        let world = MockWorld::default();
        let handle = engine
            .play_raycast("bolt", origin(), Vec3::new(0.0, 0.0, 3.0), None, None)
            .unwrap();

        let events = run(&mut engine, &world, 20);
        assert_eq!(world.emission_count(), 5);
        let steps: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                AnimationEvent::Step { point, .. } => Some(point.position.z),
                _ => None,
            })
            .collect();
        assert_eq!(steps, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
        assert!(handle.is_finished());
    }

    #[test]
    fn raycast_respects_period() {
        let mut ray = Raycast::new("slow");
        ray.max_distance = 1.0;
        ray.period_ticks = 3;
        let mut engine = engine_with(vec![AnimationDefinition::Raycast(ray)]);
        let world = MockWorld::default();
        engine.play_raycast("slow", origin(), Vec3::UP, None, None);
        run(&mut engine, &world, 20);
        assert_eq!(world.emission_ticks(), vec![0, 3, 6]);
    }

    #[test]
    fn raycast_hits_each_entity_once() {
        let mut ray = Raycast::new("bolt");
        ray.step = 0.25;
        ray.max_distance = 4.0;
        ray.hit_radius = 1.0;
        let mut engine = engine_with(vec![AnimationDefinition::Raycast(ray)]);
        let world = MockWorld::default();
        // Within radius of several consecutive steps.
        world.add_entity(1, Vec3::new(1.0, 0.0, 0.0));
        world.add_entity(2, Vec3::new(3.0, 0.5, 0.0));
        world.add_entity(3, Vec3::new(0.0, 10.0, 0.0));

        let owner = CompanionId(4);
        engine.play_raycast("bolt", origin(), Vec3::new(1.0, 0.0, 0.0), Some(owner), None);
        let events = run(&mut engine, &world, 40);
        assert_eq!(hits(&events), vec![EntityId(1), EntityId(2)]);
        assert!(events.iter().all(|e| match e {
            AnimationEvent::Hit { owner: o, source, .. } => *o == Some(owner) && *source == HitSource::Raycast,
            _ => true,
        }));
    }

    #[test]
    fn raycast_filter_and_dead_entities_skipped() {
        let mut ray = Raycast::new("bolt");
        ray.max_distance = 2.0;
        ray.hit_radius = 1.0;
        let mut engine = engine_with(vec![AnimationDefinition::Raycast(ray)]);
        let world = MockWorld::default();
        world.add_entity(1, Vec3::new(0.5, 0.0, 0.0));
        world.add_entity(2, Vec3::new(1.0, 0.0, 0.0));
        world.add_entity(3, Vec3::new(1.5, 0.0, 0.0));
        world.entities.lock().unwrap()[2].alive = false;

        let filter: EntityFilter = Box::new(|e| e.id != EntityId(1));
        engine.play_raycast("bolt", origin(), Vec3::new(1.0, 0.0, 0.0), None, Some(filter));
        let events = run(&mut engine, &world, 10);
        assert_eq!(hits(&events), vec![EntityId(2)]);
    }

    #[test]
    fn area_pulses_until_duration() {
        let mut area = AreaPulse::new("field");
        area.points_per_layer = 4;
        area.layers = 2;
        area.duration_ticks = 10;
        area.interval_ticks = 5;
        area.affect_entities = false;
        let mut engine = engine_with(vec![AnimationDefinition::Area(area)]);
        let world = MockWorld::default();
        world.add_entity(1, Vec3::new(1.0, 0.0, 0.0));
        let handle = engine.play_area_effect("field", origin(), None, None).unwrap();

        let events = run(&mut engine, &world, 30);
        // Pulses at elapsed 0, 5, 10; 8 points each.
        assert_eq!(world.emission_count(), 24);
        let ticks = world.emission_ticks();
        assert_eq!(ticks.first(), Some(&0));
        assert_eq!(ticks.last(), Some(&10));
        assert!(hits(&events).is_empty());
        assert!(handle.is_finished());
    }

    #[test]
    fn area_ring_geometry() {
        let mut area = AreaPulse::new("ring");
        area.radius = 2.0;
        area.points_per_layer = 4;
        area.duration_ticks = 0;
        area.affect_entities = false;
        let mut engine = engine_with(vec![AnimationDefinition::Area(area)]);
        let world = MockWorld::default();
        engine.play_area_effect("ring", origin(), None, None);
        run(&mut engine, &world, 1);

        let emissions = world.emissions.lock().unwrap();
        assert_eq!(emissions.len(), 4);
        let first = emissions[0].1.at.position;
        assert!((first.x - 2.0).abs() < 1e-9);
        assert!(first.z.abs() < 1e-9);
        let second = emissions[1].1.at.position;
        assert!(second.x.abs() < 1e-9);
        assert!((second.z - 2.0).abs() < 1e-9);
    }

    #[test]
    fn area_hits_each_entity_once_across_pulses() {
        let mut area = AreaPulse::new("field");
        area.radius = 3.0;
        area.duration_ticks = 20;
        area.interval_ticks = 2;
        let mut engine = engine_with(vec![AnimationDefinition::Area(area)]);
        let world = MockWorld::default();
        world.add_entity(1, Vec3::new(1.0, 0.0, 1.0));
        world.add_entity(2, Vec3::new(-2.0, 1.0, 0.0));
        world.add_entity(3, Vec3::new(6.0, 0.0, 0.0));

        let events = {
            engine.play_area_effect("field", origin(), Some(CompanionId(1)), None);
            let mut events = run(&mut engine, &world, 4);
            // Walks into range mid-effect.
            world.add_entity(4, Vec3::new(0.0, 0.0, 2.0));
            for t in 4..40 {
                world.set_tick(t);
                events.extend(engine.tick(&world));
            }
            events
        };
        assert_eq!(hits(&events), vec![EntityId(1), EntityId(2), EntityId(4)]);
    }

    #[test]
    fn cancel_stops_future_steps() {
        let mut ray = Raycast::new("bolt");
        ray.max_distance = 10.0;
        let mut engine = engine_with(vec![AnimationDefinition::Raycast(ray)]);
        let world = MockWorld::default();
        let handle = engine
            .play_raycast("bolt", origin(), Vec3::UP, None, None)
            .unwrap();
        run(&mut engine, &world, 3);
        assert_eq!(world.emission_count(), 3);

        handle.cancel();
        handle.cancel();
        let events = run(&mut engine, &world, 10);
        assert_eq!(world.emission_count(), 3);
        assert!(events.is_empty());
        assert!(handle.is_cancelled());
        assert!(!handle.is_finished());
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn cancel_owned_by_only_touches_owner() {
        let mut engine = engine_with(vec![
            AnimationDefinition::Raycast(Raycast::new("bolt")),
            AnimationDefinition::Area(AreaPulse::new("field")),
        ]);
        let a = engine
            .play_raycast("bolt", origin(), Vec3::UP, Some(CompanionId(1)), None)
            .unwrap();
        let b = engine
            .play_area_effect("field", origin(), Some(CompanionId(1)), None)
            .unwrap();
        let c = engine
            .play_area_effect("field", origin(), Some(CompanionId(2)), None)
            .unwrap();

        assert_eq!(engine.cancel_owned_by(CompanionId(1)), 2);
        assert!(a.is_cancelled() && b.is_cancelled());
        assert!(c.is_active());
        assert_eq!(engine.active_count(), 1);
    }

    #[test]
    fn finished_event_carries_owner() {
        let seq = FrameSequence::new("blink").frame(ParticleFrame::new(ParticleKind::Flame));
        let mut engine = engine_with(vec![AnimationDefinition::Sequence(seq)]);
        let world = MockWorld::default();
        let handle = engine
            .play_sequence("blink", origin(), None, Some(CompanionId(3)))
            .unwrap();
        let events = run(&mut engine, &world, 2);
        assert_eq!(
            events,
            vec![AnimationEvent::Finished {
                handle: handle.id(),
                owner: Some(CompanionId(3)),
            }]
        );
    }

    #[test]
    fn running_instances_survive_library_swap() {
        let mut ray = Raycast::new("bolt");
        ray.max_distance = 1.0;
        let mut engine = engine_with(vec![AnimationDefinition::Raycast(ray)]);
        let world = MockWorld::default();
        let handle = engine
            .play_raycast("bolt", origin(), Vec3::UP, None, None)
            .unwrap();
        engine.use_library(Arc::new(AnimationLibrary::new()));
        run(&mut engine, &world, 10);
        assert_eq!(world.emission_count(), 3);
        assert!(handle.is_finished());
        assert!(engine
            .play_raycast("bolt", origin(), Vec3::UP, None, None)
            .is_none());
    }
}
