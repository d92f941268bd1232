// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Error types

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Construction and configuration errors.
///
/// Runtime conditions (unknown persons, locations off an outline, repeated
/// source ids) are never reported through this type.
#[derive(Debug, Error)]
pub enum Error {
    /// A name that must carry text was empty or whitespace
    #[error("{0} name must not be blank")]
    BlankName(&'static str),

    /// An outline was built from too few vertices
    #[error("outline requires at least 3 vertices, got {0}")]
    TooFewVertices(usize),

    /// Configuration failed validation
    #[error("invalid configuration: {}", format_violations(.0))]
    InvalidConfiguration(Vec<ConfigViolation>),

    /// The runtime driving timers could not be started
    #[error("timer runtime unavailable: {0}")]
    TimerRuntime(#[from] std::io::Error),
}

/// A single configuration rule that was broken
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigViolation {
    #[error("floor name '{0}' is used more than once")]
    DuplicateFloorName(String),

    #[error("hazard zone name '{0}' is used more than once")]
    DuplicateZoneName(String),

    #[error("hazard zones '{first}' and '{second}' overlap")]
    OverlappingZones { first: String, second: String },

    #[error("hazard zone '{zone}' does not lie within floor '{floor}'")]
    ZoneOutsideFloor { zone: String, floor: String },

    #[error("{owner}: {reason}")]
    InvalidEntity { owner: String, reason: String },
}

fn format_violations(violations: &[ConfigViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
