//! Behavior engine: definitions, the hot-reloadable catalog, failure-isolated
//! hook dispatch, per-companion move cooldowns, scheduled tasks and the companion lifecycle.

pub mod behavior;
pub mod catalog;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod moves;
pub mod tasks;

#[cfg(test)]
mod testing;

pub use behavior::{
    AttackHook, BaseStats, BehaviorDefinition, BehaviorHooks, DisplayNameProvider, EntityHook, HookResult,
    LifecycleHook, MoveDefinition, TargetSelector, TaskHook, FALLBACK_BEHAVIOR_ID,
};
pub use catalog::{BehaviorCatalog, CatalogSnapshot, DocumentParser, LoadReport, ParsedDocument, RejectedDefinition};
pub use context::{nearest_hostile, owner_target, Collaborators, CompanionContext};
pub use dispatch::HookDispatcher;
pub use error::{DefinitionError, HookError};
pub use lifecycle::{CompanionLifecycle, CompanionSettings, CompanionState, CompanionStatus};
pub use manager::{CompanionManager, ManagerStatus};
pub use moves::{ActiveMove, MoveOutcome, MoveScheduler};
pub use tasks::{TaskId, TaskQueue, MAX_TASKS};
