//! Familiar API: plain data types and the collaborator traits the engine consumes.
//!
//! The world simulation, the owning player and the definition store all live
//! outside the engine. This crate defines the narrow interfaces they implement.
//! It has no dependency on the animation engine, the catalog or the Lua runtime.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Geometry ────────────────────────────────────────────────────────────────

/// A point or direction in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    pub const UP: Vec3 = Vec3::new(0.0, 1.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    pub fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn distance_squared(self, other: Vec3) -> f64 {
        (self - other).length_squared()
    }

    /// Unit vector in the same direction, or `None` for a zero or non-finite vector.
    pub fn normalized(self) -> Option<Vec3> {
        let len = self.length();
        if len == 0.0 || !len.is_finite() {
            return None;
        }
        Some(self * (1.0 / len))
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

/// A position inside a named region (a world or dimension).
///
/// Distances are only meaningful between locations of the same region.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub region: String,
    pub position: Vec3,
}

impl Location {
    pub fn new(region: impl Into<String>, position: Vec3) -> Self {
        Self {
            region: region.into(),
            position,
        }
    }

    /// Same region, position shifted by `delta`.
    pub fn offset(&self, delta: Vec3) -> Location {
        Location {
            region: self.region.clone(),
            position: self.position + delta,
        }
    }

    pub fn same_region(&self, other: &Location) -> bool {
        self.region == other.region
    }
}

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Runtime identifier of an entity in the external world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of one bound companion instance, assigned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompanionId(pub u64);

impl fmt::Display for CompanionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "companion-{}", self.0)
    }
}

/// A name that did not match any known particle or entity type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{name}'")]
pub struct UnknownName {
    pub kind: &'static str,
    pub name: String,
}

/// Normalizes a user-supplied type name: trims, uppercases, `-`/space to `_`,
/// and strips a `minecraft:` style namespace.
fn normalize_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let bare = trimmed.rsplit(':').next().unwrap_or(trimmed);
    bare.chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

// ─── Particles ───────────────────────────────────────────────────────────────

macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $( $variant:ident => $canonical:literal $(| $alias:literal)* ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $( $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];

            /// Canonical upper-case name.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $canonical ),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownName;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match normalize_name(s).as_str() {
                    $( $canonical $(| $alias)* => Ok($name::$variant), )+
                    _ => Err(UnknownName {
                        kind: $label,
                        name: s.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = UnknownName;
            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

named_enum! {
    /// Particle types an animation may emit.
    ParticleKind, "particle" {
        EndRod => "END_ROD",
        Crit => "CRIT",
        EnchantedHit => "ENCHANTED_HIT" | "CRIT_MAGIC" | "MAGIC_CRIT",
        Witch => "WITCH" | "SPELL_WITCH",
        Effect => "EFFECT" | "SPELL",
        InstantEffect => "INSTANT_EFFECT" | "SPELL_INSTANT",
        Heart => "HEART",
        Flame => "FLAME",
        SoulFireFlame => "SOUL_FIRE_FLAME",
        Smoke => "SMOKE" | "SMOKE_NORMAL",
        Cloud => "CLOUD",
        Portal => "PORTAL",
        Enchant => "ENCHANT" | "ENCHANTMENT_TABLE",
        HappyVillager => "HAPPY_VILLAGER" | "VILLAGER_HAPPY",
        AngryVillager => "ANGRY_VILLAGER" | "VILLAGER_ANGRY",
        Note => "NOTE",
        DrippingWater => "DRIPPING_WATER" | "DRIP_WATER",
        Snowflake => "SNOWFLAKE",
        TotemOfUndying => "TOTEM_OF_UNDYING" | "TOTEM",
        SonicBoom => "SONIC_BOOM",
        Explosion => "EXPLOSION" | "EXPLOSION_NORMAL",
        Glow => "GLOW",
        ElectricSpark => "ELECTRIC_SPARK",
        DragonBreath => "DRAGON_BREATH",
    }
}

named_enum! {
    /// Mob types a companion may be spawned as.
    EntityKind, "entity type" {
        Wolf => "WOLF",
        Cat => "CAT",
        Fox => "FOX",
        Parrot => "PARROT",
        Allay => "ALLAY",
        Bee => "BEE",
        Axolotl => "AXOLOTL",
        Rabbit => "RABBIT",
        Ocelot => "OCELOT",
        Frog => "FROG",
        Vex => "VEX",
        Bat => "BAT",
        Chicken => "CHICKEN",
        Pig => "PIG",
        Sheep => "SHEEP",
        Horse => "HORSE",
        Llama => "LLAMA",
        Goat => "GOAT",
        Panda => "PANDA",
        PolarBear => "POLAR_BEAR",
        IronGolem => "IRON_GOLEM",
        SnowGolem => "SNOW_GOLEM" | "SNOWMAN",
        Zombie => "ZOMBIE",
        Skeleton => "SKELETON",
        Spider => "SPIDER",
        Creeper => "CREEPER",
    }
}

/// One particle burst request handed to the world.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleEmission {
    pub particle: ParticleKind,
    pub at: Location,
    pub count: u32,
    pub spread: Vec3,
    pub speed: f64,
    /// Only this entity sees the burst; `None` means every observer.
    pub viewer: Option<EntityId>,
}

// ─── Entities ────────────────────────────────────────────────────────────────

/// Snapshot of an entity as reported by the world.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityInfo {
    pub id: EntityId,
    pub name: String,
    pub kind: String,
    pub location: Location,
    pub hostile: bool,
    pub alive: bool,
    pub health: f64,
}

/// Visual and movement parameters applied to a companion entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityProfile {
    pub entity_type: EntityKind,
    pub invisible: bool,
    pub silent: bool,
    pub baby: bool,
    pub follow_speed: f64,
    pub follow_start_distance: f64,
    pub follow_stop_distance: f64,
    pub leash_distance: f64,
    pub allow_mount: bool,
    pub allow_flight: bool,
}

impl Default for EntityProfile {
    fn default() -> Self {
        Self {
            entity_type: EntityKind::Wolf,
            invisible: true,
            silent: true,
            baby: false,
            follow_speed: 1.25,
            follow_start_distance: 3.0,
            follow_stop_distance: 1.5,
            leash_distance: 32.0,
            allow_mount: true,
            allow_flight: false,
        }
    }
}

// ─── Collaborators ───────────────────────────────────────────────────────────

/// The external world simulation.
///
/// All methods take `&self`; implementations own their interior mutability.
/// Calls are made from the tick thread only.
pub trait EntityWorld: Send + Sync {
    /// Spawn a companion entity; `None` when the world refuses.
    fn spawn_companion(&self, kind: EntityKind, at: &Location) -> Option<EntityId>;

    /// Apply visual flags and movement attributes. Must be idempotent.
    fn apply_profile(&self, entity: EntityId, profile: &EntityProfile);

    fn remove_entity(&self, entity: EntityId);

    /// Current state of an entity, `None` if it no longer exists.
    fn entity(&self, entity: EntityId) -> Option<EntityInfo>;

    /// Entities inside the axis-aligned box `center ± half_extents`.
    fn entities_in_box(&self, center: &Location, half_extents: Vec3) -> Vec<EntityInfo>;

    fn damage(&self, target: EntityId, amount: f64, source: Option<EntityId>);

    fn set_display_name(&self, entity: EntityId, name: &str);

    fn spawn_particle(&self, emission: &ParticleEmission);

    /// Keep `entity` near `target`, teleporting past the leash distance.
    fn follow(&self, entity: EntityId, target: &Location, profile: &EntityProfile);

    fn navigate(&self, entity: EntityId, to: &Location, speed: f64);

    fn stop_navigation(&self, entity: EntityId);
}

/// Named numeric statistics of a companion (strength, level, and so on).
pub trait StatProvider: Send + Sync {
    /// Unknown stats read as `0.0`.
    fn stat(&self, name: &str) -> f64;
}

impl<F> StatProvider for F
where
    F: Fn(&str) -> f64 + Send + Sync,
{
    fn stat(&self, name: &str) -> f64 {
        self(name)
    }
}

/// The player a companion is bound to.
pub trait OwnerAgent: Send + Sync {
    fn id(&self) -> EntityId;
    fn name(&self) -> String;
    fn location(&self) -> Location;
    /// Unit vector the owner is facing.
    fn look_direction(&self) -> Vec3;
    fn is_online(&self) -> bool;
    fn is_alive(&self) -> bool;
    fn health(&self) -> f64;
    fn max_health(&self) -> f64;
    fn heal(&self, amount: f64);
    /// Absorption hearts on top of health.
    fn grant_absorption(&self, amount: f64);
    fn send_message(&self, message: &str);
}

// ─── Definition source ───────────────────────────────────────────────────────

/// One raw definition document (a script file, a blob from a store).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionDocument {
    /// Name used in log lines and load reports.
    pub name: String,
    pub contents: String,
}

impl DefinitionDocument {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// Errors reading a definition source as a whole.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("definition source unavailable: {0}")]
    Unavailable(String),
}

/// Supplier of raw definition documents, read in full on every load.
pub trait DefinitionSource: Send + Sync {
    /// Human-readable description for logs.
    fn describe(&self) -> String;

    /// All documents, in the order they should be applied.
    fn documents(&self) -> Result<Vec<DefinitionDocument>, SourceError>;
}

impl<T: DefinitionSource + ?Sized> DefinitionSource for std::sync::Arc<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn documents(&self) -> Result<Vec<DefinitionDocument>, SourceError> {
        (**self).documents()
    }
}

/// In-memory source. Documents can be replaced between loads.
#[derive(Debug, Default)]
pub struct MemorySource {
    documents: std::sync::RwLock<Vec<DefinitionDocument>>,
}

impl MemorySource {
    pub fn new(documents: Vec<DefinitionDocument>) -> Self {
        Self {
            documents: std::sync::RwLock::new(documents),
        }
    }

    /// Replace the document set seen by the next load.
    pub fn replace(&self, documents: Vec<DefinitionDocument>) {
        let mut guard = self
            .documents
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = documents;
    }
}

impl DefinitionSource for MemorySource {
    fn describe(&self) -> String {
        "memory".into()
    }

    fn documents(&self) -> Result<Vec<DefinitionDocument>, SourceError> {
        let guard = self
            .documents
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(guard.clone())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
