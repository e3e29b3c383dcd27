use familiar_anim::AnimationError;
use serde::Serialize;
use thiserror::Error;

/// A behavior or animation definition that was rejected at load time.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum DefinitionError {
    #[error("definition identifier is missing or blank")]
    MissingIdentifier,

    #[error("'{definition}': move '{name}' cooldown must be at least 1 tick (got {cooldown})")]
    InvalidCooldown {
        definition: String,
        name: String,
        cooldown: i64,
    },

    #[error("'{definition}': {field} must not be negative (got {value})")]
    NegativeValue {
        definition: String,
        field: String,
        value: f64,
    },

    #[error("'{definition}': unknown particle '{name}'")]
    UnknownParticle { definition: String, name: String },

    #[error("'{definition}': unknown entity type '{name}'")]
    UnknownEntityType { definition: String, name: String },

    #[error("'{definition}': {field} must be a function")]
    MissingFunction { definition: String, field: String },

    #[error("'{definition}': invalid {field}: {message}")]
    InvalidField {
        definition: String,
        field: String,
        message: String,
    },

    #[error("script error: {0}")]
    Script(String),

    #[error("source error: {0}")]
    Source(String),

    #[error(transparent)]
    Animation(#[from] AnimationError),
}

/// A hook or move function that failed while running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("script error: {0}")]
    Script(String),

    #[error("panicked: {0}")]
    Panic(String),

    #[error("{0}")]
    Failed(String),
}
