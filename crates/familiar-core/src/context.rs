//! The capability object handed to hooks and moves.

use std::sync::Arc;

use familiar_anim::{AnimationEngine, AnimationHandle, AnimationLibrary, EntityFilter};
use familiar_api::{
    CompanionId, EntityId, EntityInfo, EntityProfile, EntityWorld, Location, OwnerAgent, StatProvider, Vec3,
};
use tracing::debug;

use crate::behavior::{BaseStats, TaskHook};
use crate::tasks::{TaskId, TaskQueue};

/// Distance from the owner's line of sight within which an entity counts as looked at.
const SIGHT_RADIUS: f64 = 1.0;

/// External collaborators of one companion.
#[derive(Clone)]
pub struct Collaborators {
    pub world: Arc<dyn EntityWorld>,
    pub owner: Arc<dyn OwnerAgent>,
    pub stats: Arc<dyn StatProvider>,
}

/// What a hook may see and do for one companion during one call.
///
/// Reads go straight to the collaborators. Animations started through the
/// context are tagged with the companion and cancelled when it is dismissed.
/// Tasks can only be scheduled when the context carries a [`TaskQueue`].
pub struct CompanionContext<'a> {
    companion: CompanionId,
    behavior_id: &'a str,
    entity: Option<EntityId>,
    location: Location,
    profile: &'a EntityProfile,
    collaborators: &'a Collaborators,
    engine: &'a mut AnimationEngine,
    handles: &'a mut Vec<AnimationHandle>,
    base_stats: &'a BaseStats,
    tasks: Option<&'a mut TaskQueue>,
    debug_to_owner: bool,
}

impl<'a> CompanionContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        companion: CompanionId,
        behavior_id: &'a str,
        entity: Option<EntityId>,
        location: Location,
        profile: &'a EntityProfile,
        collaborators: &'a Collaborators,
        engine: &'a mut AnimationEngine,
        handles: &'a mut Vec<AnimationHandle>,
    ) -> Self {
        Self {
            companion,
            behavior_id,
            entity,
            location,
            profile,
            collaborators,
            engine,
            handles,
            base_stats: &BaseStats::DEFAULT,
            tasks: None,
            debug_to_owner: false,
        }
    }

    pub fn with_base_stats(mut self, stats: &'a BaseStats) -> Self {
        self.base_stats = stats;
        self
    }

    /// Let hooks schedule tasks on `tasks`.
    pub fn with_tasks(mut self, tasks: &'a mut TaskQueue) -> Self {
        self.tasks = Some(tasks);
        self
    }

    /// Mirror `debug` lines to the owner.
    pub fn debug_to_owner(mut self, enabled: bool) -> Self {
        self.debug_to_owner = enabled;
        self
    }

    // --- Reads ---

    pub fn companion_id(&self) -> CompanionId {
        self.companion
    }

    pub fn definition_id(&self) -> &str {
        self.behavior_id
    }

    pub fn entity(&self) -> Option<EntityId> {
        self.entity
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn profile(&self) -> &EntityProfile {
        self.profile
    }

    pub fn collaborators(&self) -> &Collaborators {
        self.collaborators
    }

    pub fn world(&self) -> &dyn EntityWorld {
        self.collaborators.world.as_ref()
    }

    pub fn owner(&self) -> &dyn OwnerAgent {
        self.collaborators.owner.as_ref()
    }

    pub fn owner_name(&self) -> String {
        self.owner().name()
    }

    pub fn owner_location(&self) -> Location {
        self.owner().location()
    }

    pub fn stat(&self, name: &str) -> f64 {
        self.collaborators.stats.stat(name)
    }

    /// Stats the behavior declares for its species.
    pub fn base_stats(&self) -> &BaseStats {
        self.base_stats
    }

    /// Library the next `play_*` call resolves names against.
    pub fn animations(&self) -> &Arc<AnimationLibrary> {
        self.engine.library()
    }

    /// Nearest living hostile within `radius`, excluding the owner and the companion.
    pub fn nearest_enemy(&self, radius: f64) -> Option<EntityInfo> {
        nearest_hostile(
            self.world(),
            &self.location,
            radius,
            &[Some(self.owner().id()), self.entity],
        )
    }

    /// Living entity the owner is looking at within `range`, excluding the companion.
    pub fn owner_target(&self, range: f64) -> Option<EntityInfo> {
        owner_target(self.world(), self.owner(), range, &[self.entity])
    }

    /// Unit vector from the companion to `target`, zero when they coincide.
    pub fn direction_to(&self, target: &EntityInfo) -> Vec3 {
        (target.location.position - self.location.position)
            .normalized()
            .unwrap_or(Vec3::ZERO)
    }

    // --- Intents ---

    pub fn heal(&mut self, amount: f64) {
        if amount > 0.0 {
            self.owner().heal(amount);
        }
    }

    pub fn grant_shield(&mut self, hearts: f64) {
        if hearts > 0.0 {
            self.owner().grant_absorption(hearts);
        }
    }

    pub fn set_display_name(&mut self, name: &str) {
        if let Some(entity) = self.entity {
            self.world().set_display_name(entity, name);
        }
    }

    pub fn debug(&mut self, message: &str) {
        debug!("[{}] {} ({}): {message}", self.behavior_id, self.companion, self.owner_name());
        if self.debug_to_owner {
            self.owner().send_message(&format!("[{}] {message}", self.behavior_id));
        }
    }

    /// Damage `target` on behalf of the companion.
    pub fn attack(&mut self, target: EntityId, damage: f64) {
        if damage > 0.0 {
            self.world().damage(target, damage, self.entity);
        }
    }

    /// Walk to `to` at `speed`, or at the profile's follow speed.
    pub fn move_to(&mut self, to: &Location, speed: Option<f64>) {
        if let Some(entity) = self.entity {
            let speed = speed.unwrap_or(self.profile.follow_speed);
            self.world().navigate(entity, to, speed);
        }
    }

    pub fn stop_navigation(&mut self) {
        if let Some(entity) = self.entity {
            self.world().stop_navigation(entity);
        }
    }

    /// Play a sequence at `origin` (default: the companion), for `viewer` only or everyone.
    /// A sequence without frames yields a handle that is already finished.
    pub fn play_sequence(
        &mut self,
        name: &str,
        origin: Option<Location>,
        viewer: Option<EntityId>,
    ) -> Option<AnimationHandle> {
        let origin = origin.unwrap_or_else(|| self.location.clone());
        let handle = self
            .engine
            .play_sequence(name, origin, viewer, Some(self.companion))?;
        self.handles.push(handle.clone());
        Some(handle)
    }

    /// Cast a raycast from `origin` (default: the companion) along `direction`
    /// (default: where the owner looks). Hits route to `onRaycastHit`; the owner
    /// and the companion are never hit.
    pub fn play_raycast(
        &mut self,
        name: &str,
        origin: Option<Location>,
        direction: Option<Vec3>,
    ) -> Option<AnimationHandle> {
        let origin = origin.unwrap_or_else(|| self.location.clone());
        let direction = direction.unwrap_or_else(|| self.owner().look_direction());
        let filter = self.exclude_self_and_owner();
        let handle = self
            .engine
            .play_raycast(name, origin, direction, Some(self.companion), Some(filter))?;
        self.handles.push(handle.clone());
        Some(handle)
    }

    /// Pulse an area effect around `center` (default: the companion). Hits route
    /// to `onAreaHit`. Without a filter the owner and the companion are skipped.
    pub fn play_area_effect(
        &mut self,
        name: &str,
        center: Option<Location>,
        filter: Option<EntityFilter>,
    ) -> Option<AnimationHandle> {
        let center = center.unwrap_or_else(|| self.location.clone());
        let filter = filter.unwrap_or_else(|| self.exclude_self_and_owner());
        let handle = self
            .engine
            .play_area_effect(name, center, Some(self.companion), Some(filter))?;
        self.handles.push(handle.clone());
        Some(handle)
    }

    /// Run `task` after `delay_ticks` host ticks. `None` when no queue is
    /// attached or the queue is full.
    pub fn run_later(&mut self, delay_ticks: u64, task: TaskHook) -> Option<TaskId> {
        self.tasks.as_deref_mut()?.schedule_delayed(delay_ticks, task)
    }

    /// Run `task` after `delay_ticks`, then every `interval_ticks`, until it
    /// returns `Ok(false)`, fails, or the companion is dismissed.
    pub fn run_repeating(&mut self, delay_ticks: u64, interval_ticks: u64, task: TaskHook) -> Option<TaskId> {
        self.tasks
            .as_deref_mut()?
            .schedule_repeating(delay_ticks, interval_ticks, task)
    }

    pub fn cancel_task(&mut self, id: TaskId) -> bool {
        self.tasks.as_deref_mut().is_some_and(|tasks| tasks.cancel(id))
    }

    fn exclude_self_and_owner(&self) -> EntityFilter {
        let owner = self.owner().id();
        let own = self.entity;
        Box::new(move |e: &EntityInfo| e.id != owner && Some(e.id) != own)
    }
}

/// Nearest living hostile entity in `center`'s region within `radius`,
/// skipping the `excluded` ids.
pub fn nearest_hostile(
    world: &dyn EntityWorld,
    center: &Location,
    radius: f64,
    excluded: &[Option<EntityId>],
) -> Option<EntityInfo> {
    let radius = radius.max(0.0);
    let limit = radius * radius;
    world
        .entities_in_box(center, Vec3::new(radius, radius, radius))
        .into_iter()
        .filter(|e| e.alive && e.hostile && e.location.same_region(center))
        .filter(|e| !excluded.contains(&Some(e.id)))
        .map(|e| (e.location.position.distance_squared(center.position), e))
        .filter(|(d, _)| *d <= limit)
        .min_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, e)| e)
}

/// Nearest living entity along the owner's look direction within `range`,
/// skipping the owner and the `excluded` ids.
pub fn owner_target(
    world: &dyn EntityWorld,
    owner: &dyn OwnerAgent,
    range: f64,
    excluded: &[Option<EntityId>],
) -> Option<EntityInfo> {
    let direction = owner.look_direction().normalized()?;
    let eye = owner.location();
    let range = range.max(0.0);
    let owner_id = owner.id();
    world
        .entities_in_box(&eye, Vec3::new(range, range, range))
        .into_iter()
        .filter(|e| e.alive && e.id != owner_id && e.location.same_region(&eye))
        .filter(|e| !excluded.contains(&Some(e.id)))
        .filter_map(|e| {
            let offset = e.location.position - eye.position;
            let along = offset.dot(direction);
            if along <= 0.0 || along > range {
                return None;
            }
            let off_axis = (offset - direction * along).length_squared();
            (off_axis <= SIGHT_RADIUS * SIGHT_RADIUS).then_some((along, e))
        })
        .min_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, e)| e)
}
