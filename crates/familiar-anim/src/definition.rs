//! Immutable animation definitions.
//!
//! Definitions are plain values built once (by a loader or by hand) and shared
//! through an [`AnimationLibrary`](crate::AnimationLibrary). Step period and
//! pulse interval are clamped to one tick when read; everything else is
//! checked by [`AnimationDefinition::validate`].

use familiar_api::{ParticleKind, Vec3};

use crate::error::AnimationError;

// ─── Frame sequence ──────────────────────────────────────────────────────────

/// One particle burst of a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleFrame {
    /// Ticks after the previous frame.
    pub delay_ticks: u64,
    pub particle: ParticleKind,
    pub offset: Vec3,
    pub count: u32,
    pub speed: f64,
    pub spread: Vec3,
}

impl ParticleFrame {
    pub fn new(particle: ParticleKind) -> Self {
        Self {
            delay_ticks: 0,
            particle,
            offset: Vec3::ZERO,
            count: 1,
            speed: 0.0,
            spread: Vec3::ZERO,
        }
    }

    pub fn delay(mut self, ticks: u64) -> Self {
        self.delay_ticks = ticks;
        self
    }

    pub fn offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }
}

/// Frames played in order, optionally repeated with a pause between rounds.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSequence {
    pub name: String,
    pub frames: Vec<ParticleFrame>,
    pub repeats: u32,
    pub loop_delay: u64,
}

impl FrameSequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frames: Vec::new(),
            repeats: 1,
            loop_delay: 0,
        }
    }

    pub fn frame(mut self, frame: ParticleFrame) -> Self {
        self.frames.push(frame);
        self
    }

    pub fn repeats(mut self, repeats: u32) -> Self {
        self.repeats = repeats;
        self
    }

    pub fn loop_delay(mut self, ticks: u64) -> Self {
        self.loop_delay = ticks;
        self
    }

    /// Firing plan: `(tick offset, frame index)` for every emit, in order.
    ///
    /// Delays accumulate across frames and rounds; `loop_delay` is added after
    /// each round. A repeat count of zero plays once.
    pub fn schedule(&self) -> Vec<(u64, usize)> {
        let rounds = self.repeats.max(1) as usize;
        let mut plan = Vec::with_capacity(rounds * self.frames.len());
        let mut offset = 0u64;
        for _ in 0..rounds {
            for (index, frame) in self.frames.iter().enumerate() {
                offset = offset.saturating_add(frame.delay_ticks);
                plan.push((offset, index));
            }
            offset = offset.saturating_add(self.loop_delay);
        }
        plan
    }
}

// ─── Raycast ─────────────────────────────────────────────────────────────────

/// A particle trail stepping along a straight line, hit-testing as it goes.
#[derive(Debug, Clone, PartialEq)]
pub struct Raycast {
    pub name: String,
    pub particle: ParticleKind,
    /// Distance advanced per step.
    pub step: f64,
    pub max_distance: f64,
    /// Ticks between steps.
    pub period_ticks: u64,
    pub count: u32,
    pub spread: Vec3,
    pub speed: f64,
    pub hit_radius: f64,
}

impl Raycast {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            particle: ParticleKind::EndRod,
            step: 0.5,
            max_distance: 16.0,
            period_ticks: 1,
            count: 1,
            spread: Vec3::ZERO,
            speed: 0.0,
            hit_radius: 0.5,
        }
    }

    pub fn period(&self) -> u64 {
        self.period_ticks.max(1)
    }
}

// ─── Area pulse ──────────────────────────────────────────────────────────────

/// Stacked particle rings around a center, redrawn every interval.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaPulse {
    pub name: String,
    pub particle: ParticleKind,
    pub radius: f64,
    pub layers: u32,
    pub points_per_layer: u32,
    pub layer_spacing: f64,
    pub duration_ticks: u64,
    pub interval_ticks: u64,
    pub count: u32,
    pub spread: Vec3,
    pub speed: f64,
    pub affect_entities: bool,
}

impl AreaPulse {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            particle: ParticleKind::Witch,
            radius: 3.0,
            layers: 1,
            points_per_layer: 24,
            layer_spacing: 0.5,
            duration_ticks: 40,
            interval_ticks: 5,
            count: 2,
            spread: Vec3::ZERO,
            speed: 0.0,
            affect_entities: true,
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval_ticks.max(1)
    }

    /// Half extents of the entity scan box around the center.
    pub fn scan_extents(&self) -> Vec3 {
        Vec3::new(
            self.radius,
            self.layers as f64 * self.layer_spacing + 1.0,
            self.radius,
        )
    }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Any of the three primitives, as produced by a loader.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationDefinition {
    Sequence(FrameSequence),
    Raycast(Raycast),
    Area(AreaPulse),
}

impl AnimationDefinition {
    pub fn name(&self) -> &str {
        match self {
            AnimationDefinition::Sequence(s) => &s.name,
            AnimationDefinition::Raycast(r) => &r.name,
            AnimationDefinition::Area(a) => &a.name,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            AnimationDefinition::Sequence(_) => "sequence",
            AnimationDefinition::Raycast(_) => "raycast",
            AnimationDefinition::Area(_) => "area",
        }
    }

    pub fn validate(&self) -> Result<(), AnimationError> {
        let name = self.name();
        if name.trim().is_empty() {
            return Err(AnimationError::BlankName);
        }
        match self {
            AnimationDefinition::Sequence(seq) => {
                for frame in &seq.frames {
                    non_negative(name, "speed", frame.speed)?;
                    non_negative_vec(name, "offset", frame.offset, false)?;
                    non_negative_vec(name, "spread", frame.spread, true)?;
                }
            }
            AnimationDefinition::Raycast(ray) => {
                positive(name, "step", ray.step)?;
                non_negative(name, "maxDistance", ray.max_distance)?;
                non_negative(name, "hitRadius", ray.hit_radius)?;
                non_negative(name, "speed", ray.speed)?;
                non_negative_vec(name, "spread", ray.spread, true)?;
            }
            AnimationDefinition::Area(area) => {
                non_negative(name, "radius", area.radius)?;
                non_negative(name, "layerSpacing", area.layer_spacing)?;
                non_negative(name, "speed", area.speed)?;
                non_negative_vec(name, "spread", area.spread, true)?;
            }
        }
        Ok(())
    }
}

fn finite(name: &str, field: &'static str, value: f64) -> Result<(), AnimationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AnimationError::NotFinite {
            animation: name.to_string(),
            field,
        })
    }
}

fn non_negative(name: &str, field: &'static str, value: f64) -> Result<(), AnimationError> {
    finite(name, field, value)?;
    if value < 0.0 {
        return Err(AnimationError::Negative {
            animation: name.to_string(),
            field,
            value,
        });
    }
    Ok(())
}

fn positive(name: &str, field: &'static str, value: f64) -> Result<(), AnimationError> {
    finite(name, field, value)?;
    if value <= 0.0 {
        return Err(AnimationError::NotPositive {
            animation: name.to_string(),
            field,
            value,
        });
    }
    Ok(())
}

/// Offsets may point anywhere; spreads are magnitudes.
fn non_negative_vec(
    name: &str,
    field: &'static str,
    value: Vec3,
    magnitudes: bool,
) -> Result<(), AnimationError> {
    for component in [value.x, value.y, value.z] {
        if magnitudes {
            non_negative(name, field, component)?;
        } else {
            finite(name, field, component)?;
        }
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
