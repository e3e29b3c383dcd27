//! Behavior and move definitions.
//!
//! A [`BehaviorDefinition`] is immutable once published: the catalog hands out
//! `Arc`s and replaces them wholesale on reload. Hooks are plain function
//! values; the script boundary builds them from script functions.

use std::fmt;
use std::sync::Arc;

use familiar_api::{EntityId, EntityInfo, EntityProfile};
use serde::Serialize;

use crate::context::CompanionContext;
use crate::error::{DefinitionError, HookError};

/// Identifier of the built-in inert behavior.
pub const FALLBACK_BEHAVIOR_ID: &str = "default";

pub type HookResult<T = ()> = Result<T, HookError>;

/// `onSummon`, `onTick`, `onDismiss`.
pub type LifecycleHook = Arc<dyn Fn(&mut CompanionContext<'_>) -> HookResult + Send + Sync>;

/// `onAttack(target, damage)`.
pub type AttackHook = Arc<dyn Fn(&mut CompanionContext<'_>, &EntityInfo, f64) -> HookResult + Send + Sync>;

/// `onRaycastHit(entity)`, `onAreaHit(entity)`, move execution.
pub type EntityHook = Arc<dyn Fn(&mut CompanionContext<'_>, &EntityInfo) -> HookResult + Send + Sync>;

/// Picks a move target. `Ok(None)` means nothing to do this tick.
pub type TargetSelector =
    Arc<dyn Fn(&mut CompanionContext<'_>) -> HookResult<Option<EntityId>> + Send + Sync>;

/// A scheduled task. `Ok(false)` stops a repeating task.
pub type TaskHook = Arc<dyn Fn(&mut CompanionContext<'_>) -> HookResult<bool> + Send + Sync>;

/// Computes the companion's display name.
pub type DisplayNameProvider = Arc<dyn Fn(&mut CompanionContext<'_>) -> HookResult<String> + Send + Sync>;

/// The fixed set of callback points a behavior may fill.
#[derive(Clone, Default)]
pub struct BehaviorHooks {
    pub on_summon: Option<LifecycleHook>,
    pub on_tick: Option<LifecycleHook>,
    pub on_attack: Option<AttackHook>,
    pub on_dismiss: Option<LifecycleHook>,
    pub on_raycast_hit: Option<EntityHook>,
    pub on_area_hit: Option<EntityHook>,
    pub display_name: Option<DisplayNameProvider>,
}

impl BehaviorHooks {
    /// Names of the hooks that are present.
    pub fn present(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.on_summon.is_some() {
            names.push("onSummon");
        }
        if self.on_tick.is_some() {
            names.push("onTick");
        }
        if self.on_attack.is_some() {
            names.push("onAttack");
        }
        if self.on_dismiss.is_some() {
            names.push("onDismiss");
        }
        if self.on_raycast_hit.is_some() {
            names.push("onRaycastHit");
        }
        if self.on_area_hit.is_some() {
            names.push("onAreaHit");
        }
        if self.display_name.is_some() {
            names.push("displayName");
        }
        names
    }
}

impl fmt::Debug for BehaviorHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.present()).finish()
    }
}

// ─── Moves ───────────────────────────────────────────────────────────────────

/// A cooldown-gated action that triggers on its own against a qualifying target.
#[derive(Clone)]
pub struct MoveDefinition {
    pub name: String,
    pub cooldown_ticks: u64,
    pub range: f64,
    /// `None` selects the nearest hostile within `range`.
    pub selector: Option<TargetSelector>,
    pub executor: EntityHook,
}

impl MoveDefinition {
    pub fn new<F>(name: impl Into<String>, cooldown_ticks: u64, range: f64, execute: F) -> Self
    where
        F: Fn(&mut CompanionContext<'_>, &EntityInfo) -> HookResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            cooldown_ticks,
            range,
            selector: None,
            executor: Arc::new(execute),
        }
    }

    pub fn select<F>(mut self, select: F) -> Self
    where
        F: Fn(&mut CompanionContext<'_>) -> HookResult<Option<EntityId>> + Send + Sync + 'static,
    {
        self.selector = Some(Arc::new(select));
        self
    }
}

impl fmt::Debug for MoveDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MoveDefinition")
            .field("name", &self.name)
            .field("cooldown_ticks", &self.cooldown_ticks)
            .field("range", &self.range)
            .field("custom_selector", &self.selector.is_some())
            .finish()
    }
}

// ─── Base stats ──────────────────────────────────────────────────────────────

/// Species stats a behavior declares. Growth and leveling on top of these
/// belong to the [`StatProvider`](familiar_api::StatProvider).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BaseStats {
    pub health: f64,
    pub attack: f64,
    pub defense: f64,
    pub magic: f64,
}

impl BaseStats {
    pub const DEFAULT: Self = Self {
        health: 40.0,
        attack: 6.0,
        defense: 3.0,
        magic: 5.0,
    };

    /// Case-insensitive lookup by stat name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries()
            .into_iter()
            .find(|(stat, _)| stat.eq_ignore_ascii_case(name.trim()))
            .map(|(_, value)| value)
    }

    pub fn entries(&self) -> [(&'static str, f64); 4] {
        [
            ("health", self.health),
            ("attack", self.attack),
            ("defense", self.defense),
            ("magic", self.magic),
        ]
    }
}

impl Default for BaseStats {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ─── Behaviors ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BehaviorDefinition {
    pub id: String,
    pub hooks: BehaviorHooks,
    pub moves: Vec<Arc<MoveDefinition>>,
    pub profile: EntityProfile,
    pub base_stats: BaseStats,
    /// Document the definition came from, if any.
    pub origin: Option<String>,
}

impl BehaviorDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            hooks: BehaviorHooks::default(),
            moves: Vec::new(),
            profile: EntityProfile::default(),
            base_stats: BaseStats::default(),
            origin: None,
        }
    }

    /// The built-in behavior: no hooks, no moves, default profile.
    pub fn fallback() -> Self {
        let mut definition = Self::new(FALLBACK_BEHAVIOR_ID);
        definition.profile.follow_speed = 1.2;
        definition
    }

    /// Lower-cased identifier used for lookups.
    pub fn key(&self) -> String {
        self.id.trim().to_lowercase()
    }

    pub fn is_inert(&self) -> bool {
        self.hooks.present().is_empty() && self.moves.is_empty()
    }

    pub fn profile(mut self, profile: EntityProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn base_stats(mut self, stats: BaseStats) -> Self {
        self.base_stats = stats;
        self
    }

    pub fn with_move(mut self, definition: MoveDefinition) -> Self {
        self.moves.push(Arc::new(definition));
        self
    }

    pub fn on_summon<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut CompanionContext<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.on_summon = Some(Arc::new(hook));
        self
    }

    pub fn on_tick<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut CompanionContext<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.on_tick = Some(Arc::new(hook));
        self
    }

    pub fn on_attack<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut CompanionContext<'_>, &EntityInfo, f64) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.on_attack = Some(Arc::new(hook));
        self
    }

    pub fn on_dismiss<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut CompanionContext<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.on_dismiss = Some(Arc::new(hook));
        self
    }

    pub fn on_raycast_hit<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut CompanionContext<'_>, &EntityInfo) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.on_raycast_hit = Some(Arc::new(hook));
        self
    }

    pub fn on_area_hit<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut CompanionContext<'_>, &EntityInfo) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.on_area_hit = Some(Arc::new(hook));
        self
    }

    pub fn display_name<F>(mut self, provider: F) -> Self
    where
        F: Fn(&mut CompanionContext<'_>) -> HookResult<String> + Send + Sync + 'static,
    {
        self.hooks.display_name = Some(Arc::new(provider));
        self
    }

    /// Check identifier, move cooldowns and ranges, profile distances and stats.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.id.trim().is_empty() {
            return Err(DefinitionError::MissingIdentifier);
        }
        for definition in &self.moves {
            if definition.cooldown_ticks < 1 {
                return Err(DefinitionError::InvalidCooldown {
                    definition: self.id.clone(),
                    name: definition.name.clone(),
                    cooldown: definition.cooldown_ticks as i64,
                });
            }
            check_distance(&self.id, &format!("move '{}' range", definition.name), definition.range)?;
        }
        let p = &self.profile;
        for (field, value) in [
            ("followSpeed", p.follow_speed),
            ("followStart", p.follow_start_distance),
            ("followStop", p.follow_stop_distance),
            ("leashDistance", p.leash_distance),
        ] {
            check_distance(&self.id, field, value)?;
        }
        for (stat, value) in self.base_stats.entries() {
            check_distance(&self.id, &format!("stats.{stat}"), value)?;
        }
        Ok(())
    }
}

fn check_distance(definition: &str, field: &str, value: f64) -> Result<(), DefinitionError> {
    if !value.is_finite() {
        return Err(DefinitionError::InvalidField {
            definition: definition.to_string(),
            field: field.to_string(),
            message: "not a finite number".into(),
        });
    }
    if value < 0.0 {
        return Err(DefinitionError::NegativeValue {
            definition: definition.to_string(),
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

/// Display name used when a behavior has no provider or the provider fails.
pub fn default_display_name(owner_name: &str) -> String {
    format!("{owner_name}'s Familiar")
}
