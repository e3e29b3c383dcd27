//! Companion manager: the per-tick integration loop over every bound companion.
//!
//! Owned by the tick thread. Each host tick it picks up the latest published
//! animation library, advances animations, routes hits back to the companion
//! that started them, and then ticks every companion.

use std::collections::BTreeMap;
use std::sync::Arc;

use familiar_anim::{AnimationEngine, AnimationEvent};
use familiar_api::{CompanionId, EntityId, EntityWorld, OwnerAgent, StatProvider};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{BehaviorCatalog, LoadReport};
use crate::context::Collaborators;
use crate::lifecycle::{CompanionLifecycle, CompanionSettings, CompanionStatus};

struct Bound {
    lifecycle: CompanionLifecycle,
    /// Behavior id the companion was summoned or switched with. Persisted by
    /// the host; re-resolved after every reload.
    chosen: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManagerStatus {
    pub host_ticks: u64,
    pub catalog_generation: u64,
    pub behaviors: Vec<String>,
    pub animations: Vec<String>,
    pub running_animations: usize,
    pub companions: Vec<CompanionStatus>,
    pub last_load: LoadReport,
}

pub struct CompanionManager {
    catalog: Arc<BehaviorCatalog>,
    world: Arc<dyn EntityWorld>,
    engine: AnimationEngine,
    companions: BTreeMap<CompanionId, Bound>,
    settings: CompanionSettings,
    next_id: u64,
    host_ticks: u64,
}

impl CompanionManager {
    pub fn new(catalog: Arc<BehaviorCatalog>, world: Arc<dyn EntityWorld>, settings: CompanionSettings) -> Self {
        let engine = AnimationEngine::new(catalog.animations());
        Self {
            catalog,
            world,
            engine,
            companions: BTreeMap::new(),
            settings,
            next_id: 1,
            host_ticks: 0,
        }
    }

    pub fn catalog(&self) -> &Arc<BehaviorCatalog> {
        &self.catalog
    }

    pub fn len(&self) -> usize {
        self.companions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.companions.is_empty()
    }

    pub fn companion(&self, id: CompanionId) -> Option<&CompanionLifecycle> {
        self.companions.get(&id).map(|b| &b.lifecycle)
    }

    /// Behavior id chosen for `id`, as it would be persisted.
    pub fn chosen_behavior(&self, id: CompanionId) -> Option<&str> {
        self.companions.get(&id).map(|b| b.chosen.as_str())
    }

    pub fn companion_of(&self, owner: EntityId) -> Option<CompanionId> {
        self.companions
            .iter()
            .find(|(_, b)| b.lifecycle.owner().id() == owner)
            .map(|(id, _)| *id)
    }

    /// Bind and spawn a companion for `owner`, replacing the one it already has.
    pub fn summon(
        &mut self,
        owner: Arc<dyn OwnerAgent>,
        stats: Arc<dyn StatProvider>,
        behavior_id: &str,
    ) -> Option<CompanionId> {
        if let Some(existing) = self.companion_of(owner.id()) {
            self.dismiss(existing);
        }
        let behavior = self.catalog.resolve(behavior_id);
        if !behavior.id.eq_ignore_ascii_case(behavior_id) {
            warn!("Behavior '{behavior_id}' not found, using '{}'", behavior.id);
        }
        self.engine.use_library(self.catalog.animations());

        let id = CompanionId(self.next_id);
        self.next_id += 1;
        let collaborators = Collaborators {
            world: Arc::clone(&self.world),
            owner,
            stats,
        };
        let mut lifecycle = CompanionLifecycle::new(id, collaborators, behavior, self.settings.clone());
        if !lifecycle.spawn(&mut self.engine) {
            return None;
        }
        self.companions.insert(
            id,
            Bound {
                lifecycle,
                chosen: behavior_id.to_string(),
            },
        );
        Some(id)
    }

    pub fn dismiss(&mut self, id: CompanionId) -> bool {
        match self.companions.remove(&id) {
            Some(mut bound) => {
                bound.lifecycle.remove(&mut self.engine);
                true
            }
            None => false,
        }
    }

    /// Dismiss whatever `owner` has bound. Returns how many were dismissed.
    pub fn owner_disconnected(&mut self, owner: EntityId) -> usize {
        let ids: Vec<CompanionId> = self
            .companions
            .iter()
            .filter(|(_, b)| b.lifecycle.owner().id() == owner)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            self.dismiss(*id);
        }
        ids.len()
    }

    /// Switch a companion to another behavior.
    pub fn set_behavior(&mut self, id: CompanionId, behavior_id: &str) -> bool {
        let behavior = self.catalog.resolve(behavior_id);
        let Some(bound) = self.companions.get_mut(&id) else {
            return false;
        };
        if !bound.lifecycle.update_behavior(behavior, &mut self.engine) {
            return false;
        }
        bound.chosen = behavior_id.to_string();
        true
    }

    /// The world reports that companion `id` struck `target`.
    pub fn handle_attack(&mut self, id: CompanionId, target: EntityId, damage: f64) -> bool {
        let Some(info) = self.world.entity(target) else {
            return false;
        };
        let Some(bound) = self.companions.get_mut(&id) else {
            return false;
        };
        bound.lifecycle.handle_attack(&info, damage, &mut self.engine);
        true
    }

    /// Re-resolve every companion's chosen behavior against the published
    /// catalog and rebind those whose definition changed.
    pub fn refresh_behaviors(&mut self) -> usize {
        self.engine.use_library(self.catalog.animations());
        let mut rebound = 0;
        for bound in self.companions.values_mut() {
            let resolved = self.catalog.resolve(&bound.chosen);
            if Arc::ptr_eq(&resolved, bound.lifecycle.behavior()) {
                continue;
            }
            if bound.lifecycle.update_behavior(resolved, &mut self.engine) {
                rebound += 1;
            }
        }
        if rebound > 0 {
            info!("Rebound {rebound} companions to reloaded behaviors");
        }
        rebound
    }

    /// One host tick.
    pub fn tick(&mut self) {
        self.host_ticks += 1;
        self.engine.use_library(self.catalog.animations());

        for event in self.engine.tick(self.world.as_ref()) {
            if let AnimationEvent::Hit {
                owner: Some(owner),
                source,
                entity,
                ..
            } = event
            {
                if let Some(bound) = self.companions.get_mut(&owner) {
                    bound.lifecycle.handle_hit(source, &entity, &mut self.engine);
                }
            }
        }

        for bound in self.companions.values_mut() {
            bound.lifecycle.tick(&mut self.engine);
        }

        self.companions.retain(|id, bound| {
            let keep = bound.lifecycle.is_active();
            if !keep {
                debug!("Pruned {id}");
            }
            keep
        });
    }

    pub fn host_ticks(&self) -> u64 {
        self.host_ticks
    }

    pub fn running_animations(&self) -> usize {
        self.engine.active_count()
    }

    pub fn status(&self) -> ManagerStatus {
        let snapshot = self.catalog.snapshot();
        ManagerStatus {
            host_ticks: self.host_ticks,
            catalog_generation: snapshot.generation(),
            behaviors: snapshot.ids(),
            animations: snapshot.animations().names(),
            running_animations: self.engine.active_count(),
            companions: self.companions.values().map(|b| b.lifecycle.status()).collect(),
            last_load: snapshot.report().clone(),
        }
    }

    /// Dismiss every companion and stop all animations.
    pub fn shutdown(&mut self) {
        let ids: Vec<CompanionId> = self.companions.keys().copied().collect();
        for id in ids {
            self.dismiss(id);
        }
        self.engine.cancel_all();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
