//! Per-companion move cooldowns, target selection and execution.

use std::sync::Arc;

use familiar_api::EntityInfo;

use crate::behavior::{BehaviorDefinition, MoveDefinition};
use crate::context::CompanionContext;
use crate::dispatch::HookDispatcher;

/// What one move did on one companion tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    CoolingDown,
    NoTarget,
    /// Target dead, gone, in another region or out of range.
    OutOfReach,
    Executed,
}

/// A move bound to one companion, with its remaining cooldown.
#[derive(Debug)]
pub struct ActiveMove {
    definition: Arc<MoveDefinition>,
    cooldown: u64,
}

impl ActiveMove {
    pub fn new(definition: Arc<MoveDefinition>) -> Self {
        Self {
            definition,
            cooldown: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Ticks left before the move may trigger again.
    pub fn cooldown(&self) -> u64 {
        self.cooldown
    }

    /// Evaluate the move for one companion tick.
    ///
    /// The cooldown is only armed after the executor ran, whether or not it
    /// succeeded.
    pub fn tick(&mut self, ctx: &mut CompanionContext<'_>, dispatcher: &mut HookDispatcher) -> MoveOutcome {
        if self.cooldown > 0 {
            self.cooldown -= 1;
            return MoveOutcome::CoolingDown;
        }

        let definition = Arc::clone(&self.definition);
        let behavior = ctx.definition_id().to_string();
        let companion = ctx.companion_id();

        let selected = match &definition.selector {
            Some(select) => dispatcher
                .invoke("select", &behavior, companion, || select(ctx))
                .flatten(),
            None => ctx.nearest_enemy(definition.range).map(|e| e.id),
        };
        let Some(target_id) = selected else {
            return MoveOutcome::NoTarget;
        };
        let Some(target) = ctx.world().entity(target_id) else {
            return MoveOutcome::OutOfReach;
        };
        if !in_reach(ctx, &target, definition.range) {
            return MoveOutcome::OutOfReach;
        }

        let hook = format!("move '{}'", definition.name);
        dispatcher.invoke(&hook, &behavior, companion, || (definition.executor)(ctx, &target));
        self.cooldown = definition.cooldown_ticks;
        MoveOutcome::Executed
    }
}

fn in_reach(ctx: &CompanionContext<'_>, target: &EntityInfo, range: f64) -> bool {
    let here = ctx.location();
    target.alive
        && target.location.same_region(here)
        && target.location.position.distance_squared(here.position) <= range * range
}

/// The active moves of one companion, evaluated independently each tick.
#[derive(Debug, Default)]
pub struct MoveScheduler {
    moves: Vec<ActiveMove>,
}

impl MoveScheduler {
    /// Fresh moves, all ready, for `behavior`.
    pub fn for_behavior(behavior: &BehaviorDefinition) -> Self {
        Self {
            moves: behavior.moves.iter().cloned().map(ActiveMove::new).collect(),
        }
    }

    pub fn tick(&mut self, ctx: &mut CompanionContext<'_>, dispatcher: &mut HookDispatcher) -> Vec<MoveOutcome> {
        self.moves.iter_mut().map(|m| m.tick(ctx, dispatcher)).collect()
    }

    pub fn moves(&self) -> &[ActiveMove] {
        &self.moves
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}
