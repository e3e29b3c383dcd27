//! The host: owns the companion manager and the demo world, and runs console
//! commands against them.

use std::sync::Arc;

use familiar_api::{CompanionId, EntityWorld, OwnerAgent, StatProvider};
use familiar_core::{nearest_hostile, CompanionManager, LoadReport};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::console::{self, ConsoleCommand, ConsoleReply};
use crate::demo::{DemoOwner, DemoWorld};

/// How far the companion looks for something to strike.
const ATTACK_RANGE: f64 = 8.0;

pub struct Host {
    manager: CompanionManager,
    world: Arc<DemoWorld>,
    owner: Arc<DemoOwner>,
    stats: Arc<dyn StatProvider>,
    default_behavior: String,
    ticks: u64,
    reloads: mpsc::Sender<LoadReport>,
    reload_pending: bool,
}

impl Host {
    pub fn new(
        manager: CompanionManager,
        world: Arc<DemoWorld>,
        owner: Arc<DemoOwner>,
        stats: Arc<dyn StatProvider>,
        reloads: mpsc::Sender<LoadReport>,
    ) -> Self {
        let default_behavior = manager.catalog().default_id().to_string();
        Self {
            manager,
            world,
            owner,
            stats,
            default_behavior,
            ticks: 0,
            reloads,
            reload_pending: false,
        }
    }

    pub fn manager(&self) -> &CompanionManager {
        &self.manager
    }

    pub fn current_tick(&self) -> u64 {
        self.ticks
    }

    fn companion(&self) -> Option<CompanionId> {
        self.manager.companion_of(self.owner.id())
    }

    /// Advance the world, then the engine, by one host tick.
    pub fn tick(&mut self) {
        self.ticks += 1;
        if self.owner.is_online() {
            self.owner.walk(self.ticks);
        }
        self.world.step(self.ticks, &self.owner);
        self.manager.tick();
    }

    pub fn execute(&mut self, command: ConsoleCommand) -> ConsoleReply {
        match command {
            ConsoleCommand::Help => console::help(),
            ConsoleCommand::Reload => self.start_reload(),
            ConsoleCommand::Status => match self.status_json() {
                Ok(json) => ConsoleReply::lines(vec![
                    json,
                    format!(
                        "World: {} entities, {} hostile, {} particle bursts",
                        self.world.entity_count(),
                        self.world.hostile_count(),
                        self.world.particles_emitted()
                    ),
                ]),
                Err(e) => ConsoleReply::err(format!("Failed to render status: {e}")),
            },
            ConsoleCommand::Behaviors => self.list_behaviors(),
            ConsoleCommand::Summon(id) => self.summon(id),
            ConsoleCommand::Use(id) => self.use_behavior(&id),
            ConsoleCommand::Attack(damage) => self.attack(damage),
            ConsoleCommand::Hurt(amount) => {
                self.owner.hurt(amount);
                ConsoleReply::ok(format!(
                    "{} has {:.1}/{:.1} health, {:.1} absorption",
                    self.owner.name(),
                    self.owner.health(),
                    self.owner.max_health(),
                    self.owner.absorption()
                ))
            }
            ConsoleCommand::Dismiss => match self.companion() {
                Some(id) if self.manager.dismiss(id) => ConsoleReply::ok(format!("Dismissed {id}")),
                _ => ConsoleReply::err("No companion to dismiss"),
            },
            ConsoleCommand::Disconnect => {
                self.owner.set_online(false);
                let dismissed = self.manager.owner_disconnected(self.owner.id());
                ConsoleReply::ok(format!(
                    "{} disconnected, {dismissed} companion(s) dismissed",
                    self.owner.name()
                ))
            }
            ConsoleCommand::Stop => ConsoleReply::stop(),
        }
    }

    pub fn status_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.manager.status())
    }

    fn list_behaviors(&self) -> ConsoleReply {
        let catalog = self.manager.catalog();
        ConsoleReply::lines(vec![
            format!("Behaviors: {}", catalog.available_ids().join(", ")),
            format!("Animations: {}", catalog.animations().names().join(", ")),
        ])
    }

    fn summon(&mut self, id: Option<String>) -> ConsoleReply {
        let id = id.unwrap_or_else(|| self.default_behavior.clone());
        if !self.owner.is_online() || !self.owner.is_alive() {
            self.owner.respawn();
            info!("{} is back", self.owner.name());
        }
        let owner: Arc<dyn OwnerAgent> = self.owner.clone();
        match self.manager.summon(owner, Arc::clone(&self.stats), &id) {
            Some(companion) => {
                let behavior = self
                    .manager
                    .companion(companion)
                    .map(|c| c.behavior().id.clone())
                    .unwrap_or_default();
                ConsoleReply::ok(format!("Summoned {companion} with behavior '{behavior}'"))
            }
            None => ConsoleReply::err("The world refused to spawn a companion"),
        }
    }

    fn use_behavior(&mut self, id: &str) -> ConsoleReply {
        let Some(companion) = self.companion() else {
            return ConsoleReply::err("No companion; summon one first");
        };
        if self.manager.catalog().find(id).is_none() {
            return ConsoleReply::err(format!(
                "Unknown behavior '{id}'. Available: {}",
                self.manager.catalog().available_ids().join(", ")
            ));
        }
        if self.manager.set_behavior(companion, id) {
            ConsoleReply::ok(format!("{companion} now uses '{id}'"))
        } else {
            ConsoleReply::err(format!("{companion} could not switch to '{id}'"))
        }
    }

    fn attack(&mut self, damage: f64) -> ConsoleReply {
        let Some(companion) = self.companion() else {
            return ConsoleReply::err("No companion; summon one first");
        };
        let Some(entity) = self.manager.companion(companion).and_then(|c| c.entity()) else {
            return ConsoleReply::err(format!("{companion} has no entity"));
        };
        let Some(center) = self.world.entity(entity).map(|e| e.location) else {
            return ConsoleReply::err(format!("{companion} has no entity"));
        };
        let excluded = [Some(self.owner.id()), Some(entity)];
        let Some(target) = nearest_hostile(self.world.as_ref(), &center, ATTACK_RANGE, &excluded) else {
            return ConsoleReply::err("Nothing hostile in range");
        };

        self.world.damage(target.id, damage, Some(entity));
        self.manager.handle_attack(companion, target.id, damage);
        ConsoleReply::ok(format!("{companion} struck {} {} for {damage:.1}", target.kind, target.id))
    }

    /// Run a reload on the blocking pool; the report arrives on the reload
    /// channel and is applied by [`finish_reload`](Self::finish_reload).
    fn start_reload(&mut self) -> ConsoleReply {
        if self.reload_pending {
            return ConsoleReply::err("A reload is already running");
        }
        self.reload_pending = true;
        let catalog = Arc::clone(self.manager.catalog());
        let reloads = self.reloads.clone();
        tokio::task::spawn_blocking(move || {
            let report = catalog.reload();
            if reloads.blocking_send(report).is_err() {
                warn!("Reload finished after the host stopped");
            }
        });
        ConsoleReply::ok("Reloading scripts...")
    }

    /// Rebind companions to the published catalog and summarize `report`.
    pub fn finish_reload(&mut self, report: LoadReport) -> ConsoleReply {
        self.reload_pending = false;
        let rebound = self.manager.refresh_behaviors();

        let mut lines = vec![format!(
            "Reload #{}: {} behaviors, {} animations from {} documents ({} failed), {rebound} companion(s) rebound",
            report.generation, report.behaviors, report.animations, report.documents, report.documents_failed
        )];
        if let Some(error) = &report.source_error {
            lines.push(format!("  source error: {error}"));
        }
        for rejected in &report.rejected {
            lines.push(format!("  rejected in {}: {}", rejected.document, rejected.message));
        }
        ConsoleReply {
            success: report.is_clean(),
            messages: lines,
            should_stop: false,
        }
    }

    /// Dismiss every companion and stop all animations.
    pub fn shutdown(&mut self) {
        self.manager.shutdown();
    }
}
