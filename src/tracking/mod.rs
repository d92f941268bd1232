// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Person tracking - persons, floors and simulated movement

mod floor;
mod person;
mod simulator;

pub use floor::{Floor, DEFAULT_PERSON_LIFESPAN};
pub use person::{Person, PersonListener};
pub use simulator::WalkSimulator;

use serde::{Deserialize, Serialize};

use crate::geometry::Location;

/// Opaque person identifier as reported by the positioning system
pub type PersonId = String;

/// One movement record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonLocationUpdate {
    pub person_id: PersonId,
    pub location: Location,
}

impl PersonLocationUpdate {
    pub fn new(person_id: impl Into<PersonId>, location: Location) -> Self {
        Self {
            person_id: person_id.into(),
            location,
        }
    }
}
