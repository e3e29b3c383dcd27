//! Script functions as behavior hooks, and the `ctx` object they receive.
//!
//! A call installs a [`HookScope`] in the VM's app data. Reads through `ctx`
//! answer straight from the collaborators; writes are queued as
//! [`CtxAction`]s and replayed onto the companion once the function returns.
//! A function that raises an error has its queued writes dropped.

use std::fmt;
use std::sync::Arc;

use familiar_anim::AnimationLibrary;
use familiar_api::{CompanionId, EntityId, EntityInfo, Location, Vec3};
use familiar_core::{
    nearest_hostile, owner_target, BaseStats, Collaborators, CompanionContext, HookError, HookResult, TaskHook,
};
use mlua::prelude::*;
use tracing::{debug, warn};

const CTX_REGISTRY_KEY: &str = "__familiar_ctx";

// ─── Actions ─────────────────────────────────────────────────────────────────

/// A write requested by a script during one hook call.
#[derive(Debug, Clone)]
pub(crate) enum CtxAction {
    Heal {
        amount: f64,
    },
    Shield {
        hearts: f64,
    },
    SetDisplayName {
        name: String,
    },
    Debug {
        message: String,
    },
    Attack {
        target: EntityId,
        damage: f64,
    },
    MoveTo {
        to: Location,
        speed: Option<f64>,
    },
    StopNavigation,
    PlaySequence {
        name: String,
        origin: Option<Location>,
        viewer: Option<EntityId>,
    },
    PlayRaycast {
        name: String,
        origin: Option<Location>,
        direction: Option<Vec3>,
    },
    PlayArea {
        name: String,
        center: Option<Location>,
    },
    /// `interval: None` runs the task once.
    Schedule {
        delay: u64,
        interval: Option<u64>,
        task: ScriptFunction,
    },
}

/// What `ctx` can see during one hook call.
pub(crate) struct HookScope {
    collaborators: Collaborators,
    companion: CompanionId,
    behavior_id: String,
    entity: Option<EntityId>,
    location: Location,
    base_stats: BaseStats,
    library: Arc<AnimationLibrary>,
    actions: Vec<CtxAction>,
}

impl HookScope {
    fn capture(ctx: &CompanionContext<'_>) -> Self {
        Self {
            collaborators: ctx.collaborators().clone(),
            companion: ctx.companion_id(),
            behavior_id: ctx.definition_id().to_string(),
            entity: ctx.entity(),
            location: ctx.location().clone(),
            base_stats: *ctx.base_stats(),
            library: ctx.animations().clone(),
            actions: Vec::new(),
        }
    }

    fn replay(self, ctx: &mut CompanionContext<'_>) {
        for action in self.actions {
            match action {
                CtxAction::Heal { amount } => ctx.heal(amount),
                CtxAction::Shield { hearts } => ctx.grant_shield(hearts),
                CtxAction::SetDisplayName { name } => ctx.set_display_name(&name),
                CtxAction::Debug { message } => ctx.debug(&message),
                CtxAction::Attack { target, damage } => ctx.attack(target, damage),
                CtxAction::MoveTo { to, speed } => ctx.move_to(&to, speed),
                CtxAction::StopNavigation => ctx.stop_navigation(),
                CtxAction::PlaySequence { name, origin, viewer } => {
                    ctx.play_sequence(&name, origin, viewer);
                }
                CtxAction::PlayRaycast {
                    name,
                    origin,
                    direction,
                } => {
                    ctx.play_raycast(&name, origin, direction);
                }
                CtxAction::PlayArea { name, center } => {
                    ctx.play_area_effect(&name, center, None);
                }
                CtxAction::Schedule { delay, interval, task } => {
                    // A task returning `false` stops repeating; anything else keeps it.
                    let hook: TaskHook = Arc::new(move |ctx: &mut CompanionContext<'_>| {
                        Ok(task.call::<_, Option<bool>>(ctx, ())?.unwrap_or(true))
                    });
                    let scheduled = match interval {
                        Some(interval) => ctx.run_repeating(delay, interval, hook),
                        None => ctx.run_later(delay, hook),
                    };
                    if scheduled.is_none() {
                        warn!("{} could not schedule a task for {}", self.behavior_id, self.companion);
                    }
                }
            }
        }
    }
}

fn with_scope<R>(lua: &Lua, f: impl FnOnce(&HookScope) -> R) -> LuaResult<R> {
    let scope = lua
        .app_data_ref::<HookScope>()
        .ok_or_else(|| LuaError::runtime("ctx is only usable inside a hook call"))?;
    Ok(f(&scope))
}

fn queue(lua: &Lua, action: CtxAction) -> LuaResult<()> {
    let mut scope = lua
        .app_data_mut::<HookScope>()
        .ok_or_else(|| LuaError::runtime("ctx is only usable inside a hook call"))?;
    scope.actions.push(action);
    Ok(())
}

// ─── Script functions ────────────────────────────────────────────────────────

/// A Lua function bound to the VM that defined it.
#[derive(Clone)]
pub(crate) struct ScriptFunction {
    lua: Lua,
    function: LuaFunction,
}

impl fmt::Debug for ScriptFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptFunction").finish_non_exhaustive()
    }
}

impl ScriptFunction {
    pub(crate) fn new(lua: &Lua, function: LuaFunction) -> Self {
        Self {
            lua: lua.clone(),
            function,
        }
    }

    /// Call as `f(ctx, args...)` and replay the queued writes on success.
    pub(crate) fn call<A, R>(&self, ctx: &mut CompanionContext<'_>, args: A) -> HookResult<R>
    where
        A: IntoLuaMulti,
        R: FromLuaMulti,
    {
        self.lua.set_app_data(HookScope::capture(ctx));
        crate::reset_instruction_budget(&self.lua);
        let result = self.invoke::<A, R>(args);
        let scope = self.lua.remove_app_data::<HookScope>();

        match result {
            Ok(value) => {
                if let Some(scope) = scope {
                    scope.replay(ctx);
                }
                Ok(value)
            }
            Err(e) => {
                if let Some(scope) = scope.filter(|s| !s.actions.is_empty()) {
                    debug!(
                        "Dropped {} queued actions of {} after a script error",
                        scope.actions.len(),
                        scope.behavior_id
                    );
                }
                Err(HookError::Script(e.to_string()))
            }
        }
    }

    fn invoke<A: IntoLuaMulti, R: FromLuaMulti>(&self, args: A) -> LuaResult<R> {
        let ctx: LuaTable = self.lua.named_registry_value(CTX_REGISTRY_KEY)?;
        let mut values = args.into_lua_multi(&self.lua)?;
        values.push_front(LuaValue::Table(ctx));
        self.function.call::<R>(values)
    }
}

// ─── Conversions ─────────────────────────────────────────────────────────────

/// An entity as a Lua table: `{id, name, kind, x, y, z, region, hostile, alive, health}`.
pub(crate) struct EntityValue<'a>(pub &'a EntityInfo);

impl IntoLua for EntityValue<'_> {
    fn into_lua(self, lua: &Lua) -> LuaResult<LuaValue> {
        let e = self.0;
        let t = lua.create_table()?;
        t.set("id", e.id.0)?;
        t.set("name", e.name.as_str())?;
        t.set("kind", e.kind.as_str())?;
        t.set("x", e.location.position.x)?;
        t.set("y", e.location.position.y)?;
        t.set("z", e.location.position.z)?;
        t.set("region", e.location.region.as_str())?;
        t.set("hostile", e.hostile)?;
        t.set("alive", e.alive)?;
        t.set("health", e.health)?;
        Ok(LuaValue::Table(t))
    }
}

fn location_table(lua: &Lua, location: &Location) -> LuaResult<LuaTable> {
    let t = vector_table(lua, location.position)?;
    t.set("region", location.region.as_str())?;
    Ok(t)
}

fn vector_table(lua: &Lua, v: Vec3) -> LuaResult<LuaTable> {
    let t = lua.create_table()?;
    t.set("x", v.x)?;
    t.set("y", v.y)?;
    t.set("z", v.z)?;
    Ok(t)
}

/// `{x=, y=, z=}` or `{1, 2, 3}`; missing components read as zero.
pub(crate) fn vector_from_table(t: &LuaTable) -> LuaResult<Vec3> {
    if t.raw_len() >= 3 {
        return Ok(Vec3::new(t.get(1)?, t.get(2)?, t.get(3)?));
    }
    Ok(Vec3::new(
        t.get::<Option<f64>>("x")?.unwrap_or(0.0),
        t.get::<Option<f64>>("y")?.unwrap_or(0.0),
        t.get::<Option<f64>>("z")?.unwrap_or(0.0),
    ))
}

/// A position argument; the region defaults to `fallback_region`.
fn location_from(value: &LuaValue, fallback_region: &str) -> LuaResult<Option<Location>> {
    match value {
        LuaValue::Nil => Ok(None),
        LuaValue::Table(t) => {
            let region = t
                .get::<Option<String>>("region")?
                .unwrap_or_else(|| fallback_region.to_string());
            Ok(Some(Location::new(region, vector_from_table(t)?)))
        }
        other => Err(LuaError::runtime(format!(
            "expected a position table, got {}",
            other.type_name()
        ))),
    }
}

/// An entity argument: an entity table, a bare id, or nil.
pub(crate) fn entity_id_from(value: &LuaValue) -> LuaResult<Option<EntityId>> {
    match value {
        LuaValue::Nil => Ok(None),
        LuaValue::Integer(id) if *id >= 0 => Ok(Some(EntityId(*id as u64))),
        LuaValue::Number(id) if *id >= 0.0 => Ok(Some(EntityId(*id as u64))),
        LuaValue::Table(t) => Ok(t.get::<Option<u64>>("id")?.map(EntityId)),
        other => Err(LuaError::runtime(format!(
            "expected an entity, got {}",
            other.type_name()
        ))),
    }
}

// ─── ctx API ─────────────────────────────────────────────────────────────────

/// Whole ticks from a script number; negatives and NaN become zero.
pub(crate) fn ticks(value: f64) -> u64 {
    value.max(0.0) as u64
}

/// Build the shared `ctx` table. Methods are called with `:`, so every
/// function takes the table itself as its first argument and ignores it.
pub(crate) fn setup_ctx_api(lua: &Lua) -> LuaResult<()> {
    let ctx = lua.create_table()?;

    // Reads

    ctx.set(
        "owner_name",
        lua.create_function(|lua, _: LuaValue| with_scope(lua, |s| s.collaborators.owner.name()))?,
    )?;
    ctx.set(
        "owner_health",
        lua.create_function(|lua, _: LuaValue| with_scope(lua, |s| s.collaborators.owner.health()))?,
    )?;
    ctx.set(
        "owner_max_health",
        lua.create_function(|lua, _: LuaValue| with_scope(lua, |s| s.collaborators.owner.max_health()))?,
    )?;
    ctx.set(
        "owner_position",
        lua.create_function(|lua, _: LuaValue| {
            let location = with_scope(lua, |s| s.collaborators.owner.location())?;
            location_table(lua, &location)
        })?,
    )?;
    ctx.set(
        "position",
        lua.create_function(|lua, _: LuaValue| {
            let location = with_scope(lua, |s| s.location.clone())?;
            location_table(lua, &location)
        })?,
    )?;
    ctx.set(
        "entity_id",
        lua.create_function(|lua, _: LuaValue| with_scope(lua, |s| s.entity.map(|e| e.0)))?,
    )?;
    ctx.set(
        "definition_id",
        lua.create_function(|lua, _: LuaValue| with_scope(lua, |s| s.behavior_id.clone()))?,
    )?;
    ctx.set(
        "companion_id",
        lua.create_function(|lua, _: LuaValue| with_scope(lua, |s| s.companion.0))?,
    )?;
    ctx.set(
        "stat",
        lua.create_function(|lua, (_, name): (LuaValue, String)| {
            with_scope(lua, |s| s.collaborators.stats.stat(&name))
        })?,
    )?;

    // ctx:base_stat(name) -> number or nil
    ctx.set(
        "base_stat",
        lua.create_function(|lua, (_, name): (LuaValue, String)| {
            with_scope(lua, |s| s.base_stats.get(&name))
        })?,
    )?;
    ctx.set(
        "base_stats",
        lua.create_function(|lua, _: LuaValue| {
            let stats = with_scope(lua, |s| s.base_stats)?;
            let t = lua.create_table()?;
            for (name, value) in stats.entries() {
                t.set(name, value)?;
            }
            Ok(t)
        })?,
    )?;

    // ctx:owner_target(range) -> entity the owner looks at, or nil
    ctx.set(
        "owner_target",
        lua.create_function(|lua, (_, range): (LuaValue, f64)| {
            let found = with_scope(lua, |s| {
                owner_target(
                    s.collaborators.world.as_ref(),
                    s.collaborators.owner.as_ref(),
                    range,
                    &[s.entity],
                )
            })?;
            match found {
                Some(entity) => EntityValue(&entity).into_lua(lua),
                None => Ok(LuaValue::Nil),
            }
        })?,
    )?;

    // ctx:nearest_enemy(radius) -> entity or nil
    ctx.set(
        "nearest_enemy",
        lua.create_function(|lua, (_, radius): (LuaValue, f64)| {
            let found = with_scope(lua, |s| {
                nearest_hostile(
                    s.collaborators.world.as_ref(),
                    &s.location,
                    radius,
                    &[Some(s.collaborators.owner.id()), s.entity],
                )
            })?;
            match found {
                Some(entity) => EntityValue(&entity).into_lua(lua),
                None => Ok(LuaValue::Nil),
            }
        })?,
    )?;

    // ctx:direction_to(entity_or_position) -> unit vector
    ctx.set(
        "direction_to",
        lua.create_function(|lua, (_, target): (LuaValue, LuaTable)| {
            let target = vector_from_table(&target)?;
            let from = with_scope(lua, |s| s.location.position)?;
            vector_table(lua, (target - from).normalized().unwrap_or(Vec3::ZERO))
        })?,
    )?;

    // Writes

    ctx.set(
        "heal",
        lua.create_function(|lua, (_, amount): (LuaValue, f64)| queue(lua, CtxAction::Heal { amount }))?,
    )?;
    let shield = lua.create_function(|lua, (_, hearts): (LuaValue, f64)| queue(lua, CtxAction::Shield { hearts }))?;
    ctx.set("shield", shield.clone())?;
    ctx.set("grant_shield", shield)?;
    ctx.set(
        "set_display_name",
        lua.create_function(|lua, (_, name): (LuaValue, String)| {
            queue(lua, CtxAction::SetDisplayName { name })
        })?,
    )?;
    ctx.set(
        "debug",
        lua.create_function(|lua, (_, message): (LuaValue, String)| queue(lua, CtxAction::Debug { message }))?,
    )?;
    ctx.set(
        "attack",
        lua.create_function(|lua, (_, target, damage): (LuaValue, LuaValue, f64)| {
            let target = entity_id_from(&target)?.ok_or_else(|| LuaError::runtime("attack needs a target"))?;
            queue(lua, CtxAction::Attack { target, damage })
        })?,
    )?;
    ctx.set(
        "move_to",
        lua.create_function(|lua, (_, to, speed): (LuaValue, LuaValue, Option<f64>)| {
            let region = with_scope(lua, |s| s.location.region.clone())?;
            let to = location_from(&to, &region)?.ok_or_else(|| LuaError::runtime("move_to needs a position"))?;
            queue(lua, CtxAction::MoveTo { to, speed })
        })?,
    )?;
    ctx.set(
        "stop_navigation",
        lua.create_function(|lua, _: LuaValue| queue(lua, CtxAction::StopNavigation))?,
    )?;

    // ctx:play_sequence(name [, position [, owner_only]]) -> known
    ctx.set(
        "play_sequence",
        lua.create_function(
            |lua, (_, name, origin, owner_only): (LuaValue, String, LuaValue, Option<bool>)| {
                let (known, region, owner) = with_scope(lua, |s| {
                    (
                        s.library.sequence(&name).is_some(),
                        s.location.region.clone(),
                        s.collaborators.owner.id(),
                    )
                })?;
                let origin = location_from(&origin, &region)?;
                if known {
                    let viewer = owner_only.unwrap_or(false).then_some(owner);
                    queue(lua, CtxAction::PlaySequence { name, origin, viewer })?;
                }
                Ok(known)
            },
        )?,
    )?;

    // ctx:play_raycast(name [, origin [, direction]]) -> known
    ctx.set(
        "play_raycast",
        lua.create_function(
            |lua, (_, name, origin, direction): (LuaValue, String, LuaValue, Option<LuaTable>)| {
                let (known, region) =
                    with_scope(lua, |s| (s.library.raycast(&name).is_some(), s.location.region.clone()))?;
                let origin = location_from(&origin, &region)?;
                let direction = direction.as_ref().map(vector_from_table).transpose()?;
                let aimed = direction.map_or(true, |d| d.normalized().is_some());
                if known && aimed {
                    queue(lua, CtxAction::PlayRaycast { name, origin, direction })?;
                }
                Ok(known && aimed)
            },
        )?,
    )?;

    // ctx:play_area(name [, center]) -> known
    let area = lua.create_function(|lua, (_, name, center): (LuaValue, String, LuaValue)| {
        let (known, region) = with_scope(lua, |s| (s.library.area(&name).is_some(), s.location.region.clone()))?;
        let center = location_from(&center, &region)?;
        if known {
            queue(lua, CtxAction::PlayArea { name, center })?;
        }
        Ok(known)
    })?;
    ctx.set("play_area", area.clone())?;
    ctx.set("play_area_effect", area)?;

    // ctx:run_later(delay_ticks, fn(ctx))
    ctx.set(
        "run_later",
        lua.create_function(|lua, (_, delay, task): (LuaValue, f64, LuaFunction)| {
            queue(
                lua,
                CtxAction::Schedule {
                    delay: ticks(delay),
                    interval: None,
                    task: ScriptFunction::new(lua, task),
                },
            )
        })?,
    )?;

    // ctx:run_repeating(delay_ticks, period_ticks, fn(ctx)); returning false stops it
    ctx.set(
        "run_repeating",
        lua.create_function(|lua, (_, delay, period, task): (LuaValue, f64, f64, LuaFunction)| {
            queue(
                lua,
                CtxAction::Schedule {
                    delay: ticks(delay),
                    interval: Some(ticks(period)),
                    task: ScriptFunction::new(lua, task),
                },
            )
        })?,
    )?;

    lua.set_named_registry_value(CTX_REGISTRY_KEY, ctx)?;
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, Fixture, OWNER_ID};
    use crate::LuaDocumentParser;
    use familiar_api::{DefinitionDocument, EntityWorld, OwnerAgent};
    use familiar_core::{BehaviorDefinition, DocumentParser};

    fn load(script: &str) -> BehaviorDefinition {
        let parsed = LuaDocumentParser::default()
            .parse(&DefinitionDocument::new("hooks.lua", script))
            .unwrap();
        parsed.behaviors.into_iter().next().unwrap().unwrap()
    }

    #[test]
    fn tick_hook_heals_owner() {
        let pet = load("pet { id = 'medic', tick = function(ctx) ctx:heal(3) end }");
        let mut fx = Fixture::new();
        let hook = pet.hooks.on_tick.clone().unwrap();
        hook(&mut fx.context(at(0.0, 64.0, 0.0))).unwrap();
        assert_eq!(fx.owner.health(), 13.0);
    }

    #[test]
    fn failing_hook_discards_queued_writes() {
        let pet = load(
            r#"pet { id = 'clumsy', tick = function(ctx)
                ctx:heal(3)
                ctx:set_display_name("Oops")
                error("boom")
            end }"#,
        );
        let mut fx = Fixture::new();
        let hook = pet.hooks.on_tick.clone().unwrap();
        let err = hook(&mut fx.context(at(0.0, 64.0, 0.0))).unwrap_err();
        assert!(matches!(err, HookError::Script(ref m) if m.contains("boom")));
        assert_eq!(fx.owner.health(), 10.0);
        assert!(fx.world.names.lock().unwrap().is_empty());
    }

    #[test]
    fn endless_hook_fails_and_the_vm_recovers() {
        let pet = load(
            r#"pet { id = 'stuck',
                tick = function(ctx) ctx:heal(5) while true do end end,
                onSummon = function(ctx) ctx:heal(3) end,
            }"#,
        );
        let mut fx = Fixture::new();
        let tick = pet.hooks.on_tick.clone().unwrap();
        let err = tick(&mut fx.context(at(0.0, 64.0, 0.0))).unwrap_err();
        assert!(matches!(err, HookError::Script(ref m) if m.contains("instruction limit")));
        assert_eq!(fx.owner.health(), 10.0);

        let summon = pet.hooks.on_summon.clone().unwrap();
        summon(&mut fx.context(at(0.0, 64.0, 0.0))).unwrap();
        assert_eq!(fx.owner.health(), 13.0);

        let err = tick(&mut fx.context(at(0.0, 64.0, 0.0))).unwrap_err();
        assert!(matches!(err, HookError::Script(ref m) if m.contains("instruction limit")));
    }

    #[test]
    fn reads_reflect_collaborators() {
        let pet = load(
            r#"pet { id = 'reader', tick = function(ctx)
                assert(ctx:owner_name() == "Alex")
                assert(ctx:owner_health() == 10 and ctx:owner_max_health() == 20)
                assert(ctx:stat("magic") == 4 and ctx:stat("unknown") == 0)
                assert(ctx:definition_id() == "wisp")
                local p = ctx:position()
                assert(p.x == 2 and p.y == 64 and p.region == "overworld")
            end }"#,
        );
        let mut fx = Fixture::new();
        let hook = pet.hooks.on_tick.clone().unwrap();
        hook(&mut fx.context(at(2.0, 64.0, 0.0))).unwrap();
    }

    #[test]
    fn attack_hook_receives_entity_table() {
        let pet = load(
            r#"pet { id = 'biter', onAttack = function(ctx, target, damage)
                ctx:attack(target, damage + target.health / 4)
            end }"#,
        );
        let mut fx = Fixture::new();
        let mob = fx.world.add_mob(7, at(3.0, 64.0, 0.0), true);
        let info = fx.world.entity(mob).unwrap();
        let hook = pet.hooks.on_attack.clone().unwrap();
        hook(&mut fx.context(at(0.0, 64.0, 0.0)), &info, 2.0).unwrap();
        assert_eq!(fx.world.damage_log(), vec![(mob, 7.0, Some(fx.entity))]);
    }

    #[test]
    fn selector_returns_entity_id() {
        let pet = load(
            r#"pet { id = 'hunter', moves = { {
                name = "Pounce",
                select = function(ctx) return ctx:nearest_enemy(8) end,
                execute = function(ctx, target) ctx:attack(target.id, 5) end,
            } } }"#,
        );
        let mut fx = Fixture::new();
        fx.world.add_mob(7, at(3.0, 64.0, 0.0), true);
        fx.world.add_mob(8, at(1.0, 64.0, 0.0), false);
        let select = pet.moves[0].selector.clone().unwrap();
        let chosen = select(&mut fx.context(at(0.0, 64.0, 0.0))).unwrap();
        assert_eq!(chosen, Some(EntityId(7)));

        let far = select(&mut fx.context(at(100.0, 64.0, 0.0))).unwrap();
        assert_eq!(far, None);
    }

    #[test]
    fn selector_rejects_garbage() {
        let pet = load(
            "pet { id = 'odd', moves = { { select = function() return true end, execute = function() end } } }",
        );
        let mut fx = Fixture::new();
        let select = pet.moves[0].selector.clone().unwrap();
        assert!(select(&mut fx.context(at(0.0, 64.0, 0.0))).is_err());
    }

    #[test]
    fn play_reports_known_names_and_tracks_handles() {
        let pet = load(
            r#"pet { id = 'sparkle', onSummon = function(ctx)
                assert(ctx:play_sequence("glow"))
                assert(not ctx:play_sequence("missing"))
                assert(not ctx:play_raycast("beam", nil, {0, 0, 0}))
                assert(ctx:play_raycast("beam", nil, {x = 1}))
                assert(ctx:play_area("ring", ctx:owner_position()))
            end }"#,
        );
        let mut fx = Fixture::new();
        let hook = pet.hooks.on_summon.clone().unwrap();
        hook(&mut fx.context(at(0.0, 64.0, 0.0))).unwrap();
        assert_eq!(fx.handles.len(), 3);
        assert_eq!(fx.engine.active_count(), 3);
    }

    #[test]
    fn frameless_sequence_counts_as_played() {
        let pet = load(
            r#"pet { id = 'blank', onSummon = function(ctx)
                assert(ctx:play_sequence("blank") == true)
            end }"#,
        );
        let mut fx = Fixture::new();
        let hook = pet.hooks.on_summon.clone().unwrap();
        hook(&mut fx.context(at(0.0, 64.0, 0.0))).unwrap();
        assert_eq!(fx.handles.len(), 1);
        assert!(!fx.handles[0].is_active());
        assert_eq!(fx.engine.active_count(), 0);
    }

    #[test]
    fn display_name_provider_returns_string() {
        let pet = load(
            r#"pet { id = 'named', displayName = function(ctx) return ctx:owner_name() .. "'s Wisp" end }"#,
        );
        let mut fx = Fixture::new();
        let provider = pet.hooks.display_name.clone().unwrap();
        let name = provider(&mut fx.context(at(0.0, 64.0, 0.0))).unwrap();
        assert_eq!(name, "Alex's Wisp");
    }

    #[test]
    fn debug_and_movement_replay_in_order() {
        let pet = load(
            r#"pet { id = 'walker', tick = function(ctx)
                ctx:debug("heading out")
                ctx:move_to({ 5, 64, 5 }, 1.5)
                ctx:stop_navigation()
                ctx:shield(2)
            end }"#,
        );
        let mut fx = Fixture::new();
        fx.debug_to_owner = true;
        let hook = pet.hooks.on_tick.clone().unwrap();
        hook(&mut fx.context(at(0.0, 64.0, 0.0))).unwrap();
        assert_eq!(fx.owner.messages(), vec!["[wisp] heading out".to_string()]);
        assert_eq!(
            fx.world.navigation(),
            vec![Some((at(5.0, 64.0, 5.0), 1.5)), None]
        );
        assert_eq!(fx.owner.absorption(), 2.0);
    }

    #[test]
    fn owner_target_and_base_stats_are_readable() {
        let pet = load(
            r#"pet { id = 'scout', tick = function(ctx)
                local seen = ctx:owner_target(10)
                assert(seen and seen.id == 7 and seen.hostile == false)
                assert(ctx:owner_target(2) == nil)
                assert(ctx:base_stat("Magic") == 5 and ctx:base_stat("luck") == nil)
                assert(ctx:base_stats().health == 40)
            end }"#,
        );
        let mut fx = Fixture::new();
        // The owner stands at (0, 64, 0) looking along +z.
        fx.world.add_mob(7, at(0.0, 64.0, 4.0), false);
        let hook = pet.hooks.on_tick.clone().unwrap();
        hook(&mut fx.context(at(0.0, 64.0, 0.0))).unwrap();
    }

    #[test]
    fn scheduling_without_a_queue_is_ignored() {
        let pet = load(
            r#"pet { id = 'timer', tick = function(ctx)
                ctx:run_later(5, function(c) c:heal(1) end)
                ctx:heal(2)
            end }"#,
        );
        let mut fx = Fixture::new();
        let hook = pet.hooks.on_tick.clone().unwrap();
        hook(&mut fx.context(at(0.0, 64.0, 0.0))).unwrap();
        assert_eq!(fx.owner.health(), 12.0);
    }

    #[test]
    fn owner_is_never_the_nearest_enemy() {
        let pet = load(
            r#"pet { id = 'loyal', tick = function(ctx)
                assert(ctx:nearest_enemy(50) == nil)
            end }"#,
        );
        let mut fx = Fixture::new();
        fx.world.add_mob(OWNER_ID.0, at(1.0, 64.0, 0.0), true);
        let hook = pet.hooks.on_tick.clone().unwrap();
        hook(&mut fx.context(at(0.0, 64.0, 0.0))).unwrap();
    }
}
