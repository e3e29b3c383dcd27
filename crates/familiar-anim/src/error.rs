use serde::Serialize;
use thiserror::Error;

/// An animation definition with out-of-range parameters.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum AnimationError {
    #[error("animation name must not be blank")]
    BlankName,

    #[error("animation '{animation}': {field} must not be negative (got {value})")]
    Negative {
        animation: String,
        field: &'static str,
        value: f64,
    },

    #[error("animation '{animation}': {field} must be greater than zero (got {value})")]
    NotPositive {
        animation: String,
        field: &'static str,
        value: f64,
    },

    #[error("animation '{animation}': {field} is not a finite number")]
    NotFinite {
        animation: String,
        field: &'static str,
    },
}
