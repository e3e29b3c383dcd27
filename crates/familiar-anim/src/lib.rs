//! Particle animation engine: timed frame sequences, traveling raycasts and
//! expanding area pulses, each running as an independent cancellable process.
//!
//! The engine knows nothing about behaviors or companions. Callers tag each
//! instance with an optional owner and receive hits back as [`AnimationEvent`]s
//! from [`AnimationEngine::tick`].

pub mod definition;
pub mod engine;
pub mod error;
pub mod handle;
pub mod library;

pub use definition::{AnimationDefinition, AreaPulse, FrameSequence, ParticleFrame, Raycast};
pub use engine::{AnimationEngine, AnimationEvent, EntityFilter, HitSource};
pub use error::AnimationError;
pub use handle::{AnimationHandle, HandleId};
pub use library::AnimationLibrary;
