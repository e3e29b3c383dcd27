//! Definition globals and the table readers behind them.
//!
//! Every declaration yields its own `Result`: a bad pet or animation is
//! reported and dropped while the rest of the document still registers.

use std::str::FromStr;

use familiar_anim::{AnimationDefinition, AreaPulse, FrameSequence, ParticleFrame, Raycast};
use familiar_api::{EntityKind, EntityProfile, ParticleKind, Vec3};
use familiar_core::{BaseStats, BehaviorDefinition, DefinitionError, HookError, MoveDefinition, ParsedDocument};
use mlua::prelude::*;

use crate::hooks::{entity_id_from, ticks, vector_from_table, EntityValue, ScriptFunction};

/// Definitions collected while one document runs.
pub(crate) struct Registrar {
    document: String,
    pub(crate) parsed: ParsedDocument,
}

impl Registrar {
    pub(crate) fn new(document: &str) -> Self {
        Self {
            document: document.to_string(),
            parsed: ParsedDocument::default(),
        }
    }
}

fn with_registrar<R>(lua: &Lua, f: impl FnOnce(&mut Registrar) -> R) -> LuaResult<R> {
    let mut registrar = lua
        .app_data_mut::<Registrar>()
        .ok_or_else(|| LuaError::runtime("definitions can only be declared while the document loads"))?;
    Ok(f(&mut registrar))
}

// ─── Globals ─────────────────────────────────────────────────────────────────

pub(crate) fn setup_definition_api(lua: &Lua) -> LuaResult<()> {
    let globals = lua.globals();

    // pet { id = ..., entity = {...}, behavior = {...}, moves = {...} }
    let pet = lua.create_function(|lua, table: LuaTable| {
        let document = with_registrar(lua, |r| r.document.clone())?;
        let behavior = read_pet(lua, &document, &table);
        with_registrar(lua, |r| r.parsed.behaviors.push(behavior))
    })?;
    globals.set("pet", pet.clone())?;
    globals.set("pet_definition", pet)?;

    // particle_sequence(name, { repeats, loopDelay, frames = {...} })
    let sequence = lua.create_function(|lua, (name, table): (String, LuaTable)| {
        let definition = read_sequence(&name, &table).map(AnimationDefinition::Sequence);
        with_registrar(lua, |r| r.parsed.animations.push(definition))
    })?;
    globals.set("particle_sequence", sequence.clone())?;
    globals.set("particleSequence", sequence)?;

    // raycast_animation(name, { particle, step, maxDistance, ... })
    let raycast = lua.create_function(|lua, (name, table): (String, LuaTable)| {
        let definition = read_raycast(&name, &table).map(AnimationDefinition::Raycast);
        with_registrar(lua, |r| r.parsed.animations.push(definition))
    })?;
    globals.set("raycast_animation", raycast.clone())?;
    globals.set("raycastAnimation", raycast)?;

    // area_effect(name, { particle, radius, layers, ... })
    let area = lua.create_function(|lua, (name, table): (String, LuaTable)| {
        let definition = read_area(&name, &table).map(AnimationDefinition::Area);
        with_registrar(lua, |r| r.parsed.animations.push(definition))
    })?;
    globals.set("area_effect", area.clone())?;
    globals.set("areaEffect", area)?;

    Ok(())
}

// ─── Field helpers ───────────────────────────────────────────────────────────

fn field<T: FromLua>(definition: &str, table: &LuaTable, key: &str) -> Result<Option<T>, DefinitionError> {
    table
        .get::<Option<T>>(key)
        .map_err(|e| invalid(definition, key, e.to_string()))
}

fn invalid(definition: &str, field: &str, message: impl Into<String>) -> DefinitionError {
    DefinitionError::InvalidField {
        definition: definition.to_string(),
        field: field.to_string(),
        message: message.into(),
    }
}

/// First of `keys` that is set.
fn number(definition: &str, table: &LuaTable, keys: &[&str]) -> Result<Option<f64>, DefinitionError> {
    for key in keys {
        if let Some(value) = field::<f64>(definition, table, key)? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

fn count(value: f64) -> u32 {
    value.max(0.0) as u32
}

fn vector(definition: &str, table: &LuaTable, key: &str) -> Result<Option<Vec3>, DefinitionError> {
    match field::<LuaTable>(definition, table, key)? {
        Some(t) => vector_from_table(&t)
            .map(Some)
            .map_err(|e| invalid(definition, key, e.to_string())),
        None => Ok(None),
    }
}

fn particle(definition: &str, table: &LuaTable) -> Result<Option<ParticleKind>, DefinitionError> {
    match field::<String>(definition, table, "particle")? {
        Some(name) => ParticleKind::from_str(&name)
            .map(Some)
            .map_err(|_| DefinitionError::UnknownParticle {
                definition: definition.to_string(),
                name,
            }),
        None => Ok(None),
    }
}

// ─── Pets ────────────────────────────────────────────────────────────────────

fn read_pet(lua: &Lua, document: &str, table: &LuaTable) -> Result<BehaviorDefinition, DefinitionError> {
    let id = match field::<String>(document, table, "id")? {
        Some(id) => Some(id),
        None => field::<String>(document, table, "name")?,
    }
    .filter(|id| !id.trim().is_empty())
    .ok_or(DefinitionError::MissingIdentifier)?;

    let hooks = field::<LuaTable>(&id, table, "behavior")?.unwrap_or_else(|| table.clone());
    let hook = |key: &str| -> Result<Option<ScriptFunction>, DefinitionError> {
        Ok(field::<LuaFunction>(&id, &hooks, key)?.map(|f| ScriptFunction::new(lua, f)))
    };

    let mut behavior = BehaviorDefinition::new(id.clone())
        .profile(read_profile(&id, table)?)
        .base_stats(read_stats(&id, table)?);
    behavior.origin = Some(document.to_string());

    if let Some(script) = hook("onSummon")? {
        behavior = behavior.on_summon(move |ctx| script.call(ctx, ()));
    }
    let tick = match hook("tick")? {
        Some(script) => Some(script),
        None => hook("onTick")?,
    };
    if let Some(script) = tick {
        behavior = behavior.on_tick(move |ctx| script.call(ctx, ()));
    }
    if let Some(script) = hook("onAttack")? {
        behavior = behavior.on_attack(move |ctx, target, damage| script.call(ctx, (EntityValue(target), damage)));
    }
    if let Some(script) = hook("onDismiss")? {
        behavior = behavior.on_dismiss(move |ctx| script.call(ctx, ()));
    }
    if let Some(script) = hook("onRaycastHit")? {
        behavior = behavior.on_raycast_hit(move |ctx, entity| script.call(ctx, EntityValue(entity)));
    }
    if let Some(script) = hook("onAreaHit")? {
        behavior = behavior.on_area_hit(move |ctx, entity| script.call(ctx, EntityValue(entity)));
    }

    // displayName sits next to id, or with the hooks.
    let display_name = match field::<LuaFunction>(&id, table, "displayName")? {
        Some(f) => Some(ScriptFunction::new(lua, f)),
        None => hook("displayName")?,
    };
    if let Some(script) = display_name {
        behavior = behavior.display_name(move |ctx| script.call::<_, String>(ctx, ()));
    }

    for definition in read_moves(lua, &id, table)? {
        behavior = behavior.with_move(definition);
    }
    Ok(behavior)
}

fn read_profile(id: &str, pet: &LuaTable) -> Result<EntityProfile, DefinitionError> {
    let mut profile = EntityProfile::default();
    let Some(table) = field::<LuaTable>(id, pet, "entity")? else {
        return Ok(profile);
    };

    if let Some(name) = field::<String>(id, &table, "type")? {
        profile.entity_type = EntityKind::from_str(&name).map_err(|_| DefinitionError::UnknownEntityType {
            definition: id.to_string(),
            name,
        })?;
    }
    for (key, flag) in [
        ("invisible", &mut profile.invisible),
        ("silent", &mut profile.silent),
        ("baby", &mut profile.baby),
        ("mount", &mut profile.allow_mount),
        ("flight", &mut profile.allow_flight),
    ] {
        if let Some(value) = field::<bool>(id, &table, key)? {
            *flag = value;
        }
    }
    if let Some(v) = number(id, &table, &["followSpeed", "speed"])? {
        profile.follow_speed = v;
    }
    if let Some(v) = number(id, &table, &["followStart", "followDistance"])? {
        profile.follow_start_distance = v;
    }
    if let Some(v) = number(id, &table, &["followStop"])? {
        profile.follow_stop_distance = v;
    }
    if let Some(v) = number(id, &table, &["leashDistance"])? {
        profile.leash_distance = v;
    }
    Ok(profile)
}

fn read_stats(id: &str, pet: &LuaTable) -> Result<BaseStats, DefinitionError> {
    let mut stats = BaseStats::default();
    let Some(table) = field::<LuaTable>(id, pet, "stats")? else {
        return Ok(stats);
    };
    for (key, value) in [
        ("health", &mut stats.health),
        ("attack", &mut stats.attack),
        ("defense", &mut stats.defense),
        ("magic", &mut stats.magic),
    ] {
        if let Some(v) = number(id, &table, &[key])? {
            *value = v;
        }
    }
    Ok(stats)
}

/// Where a move sits in the `moves` table. List entries come first, then
/// keyed ones by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum MoveSlot {
    Index(i64),
    Key(String),
}

impl MoveSlot {
    fn label(&self) -> String {
        match self {
            Self::Index(i) => format!("moves[{i}]"),
            Self::Key(key) => format!("moves.{key}"),
        }
    }
}

fn read_moves(lua: &Lua, id: &str, pet: &LuaTable) -> Result<Vec<MoveDefinition>, DefinitionError> {
    let Some(table) = field::<LuaTable>(id, pet, "moves")? else {
        return Ok(Vec::new());
    };

    let mut entries = Vec::new();
    for pair in table.pairs::<LuaValue, LuaValue>() {
        let (key, value) = pair.map_err(|e| invalid(id, "moves", e.to_string()))?;
        let LuaValue::Table(entry) = value else {
            continue;
        };
        let slot = match key {
            LuaValue::Integer(i) => MoveSlot::Index(i),
            LuaValue::String(key) => MoveSlot::Key(key.to_string_lossy()),
            _ => continue,
        };
        entries.push((slot, entry));
    }
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut moves = Vec::new();
    for (slot, entry) in entries {
        let name = match (field::<String>(id, &entry, "name")?, &slot) {
            (Some(name), _) => name,
            (None, MoveSlot::Key(key)) => key.clone(),
            (None, MoveSlot::Index(_)) => "Unnamed Move".to_string(),
        };
        let cooldown = number(id, &entry, &["cooldown"])?.unwrap_or(40.0);
        if cooldown < 1.0 {
            return Err(DefinitionError::InvalidCooldown {
                definition: id.to_string(),
                name,
                cooldown: cooldown as i64,
            });
        }
        let range = number(id, &entry, &["range"])?.unwrap_or(6.0);

        let execute = field::<LuaFunction>(id, &entry, "execute")?
            .map(|f| ScriptFunction::new(lua, f))
            .ok_or_else(|| DefinitionError::MissingFunction {
                definition: id.to_string(),
                field: format!("{}.execute", slot.label()),
            })?;
        let mut definition = MoveDefinition::new(name, cooldown as u64, range, move |ctx, target| {
            execute.call(ctx, EntityValue(target))
        });

        if let Some(select) = field::<LuaFunction>(id, &entry, "select")? {
            let select = ScriptFunction::new(lua, select);
            definition = definition.select(move |ctx| {
                let chosen: LuaValue = select.call(ctx, ())?;
                entity_id_from(&chosen).map_err(|e| HookError::Script(e.to_string()))
            });
        }
        moves.push(definition);
    }
    Ok(moves)
}

// ─── Animations ──────────────────────────────────────────────────────────────

fn read_sequence(name: &str, table: &LuaTable) -> Result<FrameSequence, DefinitionError> {
    let mut sequence = FrameSequence::new(name);
    if let Some(repeats) = number(name, table, &["repeats"])? {
        sequence.repeats = count(repeats);
    }
    if let Some(delay) = number(name, table, &["loopDelay"])? {
        sequence.loop_delay = ticks(delay);
    }

    let Some(frames) = field::<LuaTable>(name, table, "frames")? else {
        return Ok(sequence);
    };
    for entry in frames.sequence_values::<LuaTable>() {
        let frame = entry.map_err(|e| invalid(name, "frames", e.to_string()))?;
        let particle = particle(name, &frame)?.ok_or_else(|| invalid(name, "frames.particle", "particle is required"))?;
        let mut built = ParticleFrame::new(particle);
        if let Some(delay) = number(name, &frame, &["delayTicks"])? {
            built.delay_ticks = ticks(delay);
        }
        if let Some(n) = number(name, &frame, &["count"])? {
            built.count = count(n);
        }
        if let Some(speed) = number(name, &frame, &["speed"])? {
            built.speed = speed;
        }
        if let Some(offset) = vector(name, &frame, "offset")? {
            built.offset = offset;
        }
        if let Some(spread) = vector(name, &frame, "spread")? {
            built.spread = spread;
        }
        sequence.frames.push(built);
    }
    Ok(sequence)
}

fn read_raycast(name: &str, table: &LuaTable) -> Result<Raycast, DefinitionError> {
    let mut raycast = Raycast::new(name);
    if let Some(particle) = particle(name, table)? {
        raycast.particle = particle;
    }
    if let Some(v) = number(name, table, &["step"])? {
        raycast.step = v;
    }
    if let Some(v) = number(name, table, &["maxDistance"])? {
        raycast.max_distance = v;
    }
    if let Some(v) = number(name, table, &["periodTicks"])? {
        raycast.period_ticks = ticks(v);
    }
    if let Some(v) = number(name, table, &["count"])? {
        raycast.count = count(v);
    }
    if let Some(v) = vector(name, table, "spread")? {
        raycast.spread = v;
    }
    if let Some(v) = number(name, table, &["speed"])? {
        raycast.speed = v;
    }
    if let Some(v) = number(name, table, &["hitRadius"])? {
        raycast.hit_radius = v;
    }
    Ok(raycast)
}

fn read_area(name: &str, table: &LuaTable) -> Result<AreaPulse, DefinitionError> {
    let mut area = AreaPulse::new(name);
    if let Some(particle) = particle(name, table)? {
        area.particle = particle;
    }
    if let Some(v) = number(name, table, &["radius"])? {
        area.radius = v;
    }
    if let Some(v) = number(name, table, &["pointsPerLayer"])? {
        area.points_per_layer = count(v);
    }
    if let Some(v) = number(name, table, &["layers"])? {
        area.layers = count(v);
    }
    if let Some(v) = number(name, table, &["layerSpacing"])? {
        area.layer_spacing = v;
    }
    if let Some(v) = number(name, table, &["durationTicks"])? {
        area.duration_ticks = ticks(v);
    }
    if let Some(v) = number(name, table, &["intervalTicks"])? {
        area.interval_ticks = ticks(v);
    }
    if let Some(v) = number(name, table, &["count"])? {
        area.count = count(v);
    }
    if let Some(v) = vector(name, table, "spread")? {
        area.spread = v;
    }
    if let Some(v) = number(name, table, &["speed"])? {
        area.speed = v;
    }
    if let Some(v) = field::<bool>(name, table, "affectEntities")? {
        area.affect_entities = v;
    }
    Ok(area)
}
