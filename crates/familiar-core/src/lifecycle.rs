//! One companion bound to one behavior: spawn, cadence, hook routing, removal.
//!
//! States run `Unbound → Active → Dismissed`. A dismissed companion never
//! comes back; summoning again creates a new lifecycle.

use std::sync::Arc;

use familiar_anim::{AnimationEngine, AnimationHandle, HitSource};
use familiar_api::{CompanionId, EntityId, EntityInfo, Location, OwnerAgent};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::behavior::{default_display_name, BehaviorDefinition, HookResult};
use crate::context::{Collaborators, CompanionContext};
use crate::dispatch::HookDispatcher;
use crate::moves::MoveScheduler;
use crate::tasks::TaskQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompanionState {
    Unbound,
    Active,
    Dismissed,
}

#[derive(Debug, Clone)]
pub struct CompanionSettings {
    /// Host ticks between two companion ticks.
    pub tick_interval: u64,
    /// Mirror `debug` lines from hooks to the owner.
    pub debug_to_owner: bool,
}

impl Default for CompanionSettings {
    fn default() -> Self {
        Self {
            tick_interval: 20,
            debug_to_owner: false,
        }
    }
}

/// Snapshot of one companion for status output.
#[derive(Debug, Clone, Serialize)]
pub struct CompanionStatus {
    pub id: CompanionId,
    pub owner: String,
    pub behavior: String,
    pub state: CompanionState,
    pub entity: Option<EntityId>,
    pub location: Location,
    pub moves: Vec<(String, u64)>,
    pub animations: usize,
    pub tasks: usize,
    pub companion_ticks: u64,
    pub hook_failures: u64,
}

pub struct CompanionLifecycle {
    id: CompanionId,
    state: CompanionState,
    behavior: Arc<BehaviorDefinition>,
    moves: MoveScheduler,
    collaborators: Collaborators,
    entity: Option<EntityId>,
    location: Location,
    handles: Vec<AnimationHandle>,
    tasks: TaskQueue,
    dispatcher: HookDispatcher,
    settings: CompanionSettings,
    countdown: u64,
    companion_ticks: u64,
}

impl CompanionLifecycle {
    pub fn new(
        id: CompanionId,
        collaborators: Collaborators,
        behavior: Arc<BehaviorDefinition>,
        settings: CompanionSettings,
    ) -> Self {
        let location = collaborators.owner.location();
        Self {
            id,
            state: CompanionState::Unbound,
            moves: MoveScheduler::for_behavior(&behavior),
            behavior,
            collaborators,
            entity: None,
            location,
            handles: Vec::new(),
            tasks: TaskQueue::new(),
            dispatcher: HookDispatcher::new(),
            settings,
            countdown: 0,
            companion_ticks: 0,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn id(&self) -> CompanionId {
        self.id
    }

    pub fn state(&self) -> CompanionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == CompanionState::Active
    }

    pub fn behavior(&self) -> &Arc<BehaviorDefinition> {
        &self.behavior
    }

    pub fn entity(&self) -> Option<EntityId> {
        self.entity
    }

    pub fn owner(&self) -> &Arc<dyn OwnerAgent> {
        &self.collaborators.owner
    }

    pub fn moves(&self) -> &MoveScheduler {
        &self.moves
    }

    /// Handles started by this companion that are still running.
    pub fn active_handles(&self) -> usize {
        self.handles.iter().filter(|h| h.is_active()).count()
    }

    /// Tasks scheduled by hooks that have not finished.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn hook_failures(&self) -> u64 {
        self.dispatcher.failures()
    }

    pub fn companion_ticks(&self) -> u64 {
        self.companion_ticks
    }

    pub fn status(&self) -> CompanionStatus {
        CompanionStatus {
            id: self.id,
            owner: self.collaborators.owner.name(),
            behavior: self.behavior.id.clone(),
            state: self.state,
            entity: self.entity,
            location: self.location.clone(),
            moves: self
                .moves
                .moves()
                .iter()
                .map(|m| (m.name().to_string(), m.cooldown()))
                .collect(),
            animations: self.active_handles(),
            tasks: self.tasks.len(),
            companion_ticks: self.companion_ticks,
            hook_failures: self.dispatcher.failures(),
        }
    }

    // ─── Transitions ─────────────────────────────────────────────────────

    /// Spawn the entity, apply the profile and display name, then `onSummon`.
    ///
    /// Returns `false` if the companion is not unbound or the world refused
    /// the spawn; it then stays unbound.
    pub fn spawn(&mut self, engine: &mut AnimationEngine) -> bool {
        if self.state != CompanionState::Unbound {
            warn!("{} cannot spawn while {:?}", self.id, self.state);
            return false;
        }
        let world = Arc::clone(&self.collaborators.world);
        let at = self.collaborators.owner.location();
        let Some(entity) = world.spawn_companion(self.behavior.profile.entity_type, &at) else {
            warn!(
                "World refused to spawn {} for {}",
                self.behavior.profile.entity_type,
                self.collaborators.owner.name()
            );
            return false;
        };
        self.entity = Some(entity);
        self.location = at;
        self.state = CompanionState::Active;
        self.countdown = 0;

        world.apply_profile(entity, &self.behavior.profile);
        self.apply_display_name(engine);
        info!(
            "Summoned {} ({}) for {} with behavior '{}'",
            self.id,
            entity,
            self.collaborators.owner.name(),
            self.behavior.id
        );
        self.call_on_summon(engine);
        true
    }

    /// Advance one host tick: run due tasks, then a companion tick every
    /// `tick_interval` host ticks, starting with the first. Returns whether
    /// a companion tick ran.
    pub fn tick(&mut self, engine: &mut AnimationEngine) -> bool {
        if self.state != CompanionState::Active {
            return false;
        }
        self.run_tasks(engine);
        if self.countdown > 0 {
            self.countdown -= 1;
            return false;
        }
        self.countdown = self.settings.tick_interval.max(1) - 1;
        self.tick_now(engine);
        true
    }

    /// One companion tick: follow, `onTick`, then moves.
    pub fn tick_now(&mut self, engine: &mut AnimationEngine) {
        if self.state != CompanionState::Active {
            return;
        }
        let owner = Arc::clone(&self.collaborators.owner);
        if !owner.is_online() || !owner.is_alive() {
            info!("Owner {} is gone, dismissing {}", owner.name(), self.id);
            self.remove(engine);
            return;
        }

        if let Some(entity) = self.entity {
            self.collaborators
                .world
                .follow(entity, &owner.location(), &self.behavior.profile);
        }
        self.refresh_location();

        if let Some(hook) = self.behavior.hooks.on_tick.clone() {
            self.dispatch(engine, "onTick", |ctx| hook(ctx));
        }

        let behavior = Arc::clone(&self.behavior);
        let (mut ctx, dispatcher, moves) = self.parts(&behavior, engine);
        moves.tick(&mut ctx, dispatcher);

        self.companion_ticks += 1;
        self.handles.retain(|h| h.is_active());
    }

    /// The companion struck or was told to strike `target`.
    pub fn handle_attack(&mut self, target: &EntityInfo, damage: f64, engine: &mut AnimationEngine) {
        if self.state != CompanionState::Active {
            return;
        }
        if let Some(hook) = self.behavior.hooks.on_attack.clone() {
            self.dispatch(engine, "onAttack", |ctx| hook(ctx, target, damage));
        }
    }

    /// An animation started by this companion touched `entity`.
    pub fn handle_hit(&mut self, source: HitSource, entity: &EntityInfo, engine: &mut AnimationEngine) {
        if self.state != CompanionState::Active {
            return;
        }
        let (name, hook) = match source {
            HitSource::Raycast => ("onRaycastHit", self.behavior.hooks.on_raycast_hit.clone()),
            HitSource::Area => ("onAreaHit", self.behavior.hooks.on_area_hit.clone()),
        };
        if let Some(hook) = hook {
            self.dispatch(engine, name, |ctx| hook(ctx, entity));
        }
    }

    /// Stop ticking, run `onDismiss`, cancel every owned animation and remove
    /// the entity. Returns `false` if already dismissed.
    pub fn remove(&mut self, engine: &mut AnimationEngine) -> bool {
        if self.state == CompanionState::Dismissed {
            return false;
        }
        let was_active = self.state == CompanionState::Active;
        self.state = CompanionState::Dismissed;

        if was_active {
            if let Some(hook) = self.behavior.hooks.on_dismiss.clone() {
                self.dispatch(engine, "onDismiss", |ctx| hook(ctx));
            }
        }
        self.tasks.clear();
        for handle in self.handles.drain(..) {
            handle.cancel();
        }
        engine.cancel_owned_by(self.id);
        if let Some(entity) = self.entity.take() {
            self.collaborators.world.remove_entity(entity);
        }
        info!("Dismissed {} of {}", self.id, self.collaborators.owner.name());
        true
    }

    /// Swap to `behavior`: fresh moves, profile re-applied, `onSummon` again.
    ///
    /// An unbound companion just takes the new binding. Returns `false` when
    /// dismissed.
    pub fn update_behavior(&mut self, behavior: Arc<BehaviorDefinition>, engine: &mut AnimationEngine) -> bool {
        match self.state {
            CompanionState::Dismissed => {
                warn!("{} is dismissed; ignoring behavior change to '{}'", self.id, behavior.id);
                false
            }
            CompanionState::Unbound => {
                self.tasks.clear();
                self.moves = MoveScheduler::for_behavior(&behavior);
                self.behavior = behavior;
                true
            }
            CompanionState::Active => {
                debug!("{} switching behavior '{}' -> '{}'", self.id, self.behavior.id, behavior.id);
                self.tasks.clear();
                self.moves = MoveScheduler::for_behavior(&behavior);
                self.behavior = behavior;
                if let Some(entity) = self.entity {
                    self.collaborators.world.apply_profile(entity, &self.behavior.profile);
                }
                self.apply_display_name(engine);
                self.call_on_summon(engine);
                true
            }
        }
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn refresh_location(&mut self) {
        let current = self
            .entity
            .and_then(|e| self.collaborators.world.entity(e))
            .map(|info| info.location);
        self.location = current.unwrap_or_else(|| self.collaborators.owner.location());
    }

    /// Run the tasks due this host tick. A task that fails or returns
    /// `Ok(false)` is not run again.
    fn run_tasks(&mut self, engine: &mut AnimationEngine) {
        for (id, task) in self.tasks.tick() {
            let behavior = Arc::clone(&self.behavior);
            let keep = {
                let (mut ctx, dispatcher, _) = self.parts(&behavior, engine);
                dispatcher.invoke("task", &behavior.id, ctx.companion_id(), || task(&mut ctx))
            };
            if keep != Some(true) && self.tasks.cancel(id) {
                debug!("{} stopped {id}", self.id);
            }
        }
    }

    fn call_on_summon(&mut self, engine: &mut AnimationEngine) {
        if let Some(hook) = self.behavior.hooks.on_summon.clone() {
            self.dispatch(engine, "onSummon", |ctx| hook(ctx));
        }
    }

    fn apply_display_name(&mut self, engine: &mut AnimationEngine) {
        let Some(entity) = self.entity else {
            return;
        };
        let fallback = default_display_name(&self.collaborators.owner.name());
        let name = match self.behavior.hooks.display_name.clone() {
            Some(provider) => {
                let behavior = Arc::clone(&self.behavior);
                let (mut ctx, dispatcher, _) = self.parts(&behavior, engine);
                dispatcher
                    .invoke("displayName", &behavior.id, ctx.companion_id(), || provider(&mut ctx))
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or(fallback)
            }
            None => fallback,
        };
        self.collaborators.world.set_display_name(entity, &name);
    }

    fn dispatch(
        &mut self,
        engine: &mut AnimationEngine,
        hook: &str,
        call: impl FnOnce(&mut CompanionContext<'_>) -> HookResult,
    ) {
        let behavior = Arc::clone(&self.behavior);
        let (mut ctx, dispatcher, _) = self.parts(&behavior, engine);
        dispatcher.invoke(hook, &behavior.id, ctx.companion_id(), || call(&mut ctx));
    }

    fn parts<'a>(
        &'a mut self,
        behavior: &'a BehaviorDefinition,
        engine: &'a mut AnimationEngine,
    ) -> (CompanionContext<'a>, &'a mut HookDispatcher, &'a mut MoveScheduler) {
        let ctx = CompanionContext::new(
            self.id,
            &behavior.id,
            self.entity,
            self.location.clone(),
            &behavior.profile,
            &self.collaborators,
            engine,
            &mut self.handles,
        )
        .with_base_stats(&behavior.base_stats)
        .with_tasks(&mut self.tasks)
        .debug_to_owner(self.settings.debug_to_owner);
        (ctx, &mut self.dispatcher, &mut self.moves)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
