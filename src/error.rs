use thiserror::Error;

use crate::types::GamePhase;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("operation not valid in phase {actual:?} (expected {expected:?})")]
    InvalidPhase {
        expected: GamePhase,
        actual: GamePhase,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("coordinates ({x}, {y}) are outside the {width}x{height} grid")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },

    #[error("cell ({x}, {y}) is not empty")]
    CellOccupied { x: i32, y: i32 },

    #[error("need at least {required} participants, have {actual}")]
    InsufficientParticipants { required: usize, actual: usize },

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("agent must stand on {required}")]
    NotOnRequiredCell { required: &'static str },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { name: &'static str, value: f32 },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("grid {width}x{height} cannot hold the node layout")]
    GridTooSmall { width: i32, height: i32 },

    #[error("stored grid is {width}x{height} but config expects {expected_width}x{expected_height}")]
    GridMismatch {
        expected_width: i32,
        expected_height: i32,
        width: i32,
        height: i32,
    },

    #[error("force action range {min}..={max} is empty")]
    EmptyForceRange { min: u32, max: u32 },

    #[error("failed to read config: {0}")]
    Io(String),

    #[error("failed to parse config: {0}")]
    Parse(String),
}
