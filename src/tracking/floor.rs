// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Floor membership - owns the persons last seen inside its outline

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::person::{Person, PersonListener};
use super::{PersonId, PersonLocationUpdate};
use crate::core::{EventBus, EventPayload, TimeSource};
use crate::error::{Error, Result};
use crate::geometry::{Location, Outline};

/// Lifespan used when a floor is built without one
pub const DEFAULT_PERSON_LIFESPAN: Duration = Duration::from_secs(60);

struct Member {
    // Distinguishes a re-created person from an evicted one with the same id.
    serial: u64,
    person: Person,
}

struct FloorShared {
    name: String,
    outline: Outline,
    person_lifespan: Duration,
    time: TimeSource,
    bus: Arc<EventBus>,
    members: Mutex<HashMap<PersonId, Member>>,
    next_serial: AtomicU64,
}

/// A building floor and the persons currently on it
pub struct Floor {
    shared: Arc<FloorShared>,
}

impl Floor {
    pub fn new(name: impl Into<String>, outline: Outline, bus: Arc<EventBus>) -> Result<Self> {
        Self::with_options(name, outline, DEFAULT_PERSON_LIFESPAN, TimeSource::system()?, bus)
    }

    pub fn with_options(
        name: impl Into<String>,
        outline: Outline,
        person_lifespan: Duration,
        time: TimeSource,
        bus: Arc<EventBus>,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::BlankName("floor"));
        }

        debug!("Created floor '{}' (person lifespan {:?})", name, person_lifespan);
        Ok(Self {
            shared: Arc::new(FloorShared {
                name,
                outline,
                person_lifespan,
                time,
                bus,
                members: Mutex::new(HashMap::new()),
                next_serial: AtomicU64::new(0),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn outline(&self) -> &Outline {
        &self.shared.outline
    }

    pub fn person_lifespan(&self) -> Duration {
        self.shared.person_lifespan
    }

    /// Applies a location update.
    ///
    /// Returns `true` when the location lies on this floor. A known person
    /// reported off the floor is evicted.
    pub fn try_add_person_location_update(&self, update: &PersonLocationUpdate) -> bool {
        self.shared.apply(update)
    }

    pub fn person_count(&self) -> usize {
        self.shared.members.lock().len()
    }

    pub fn contains_person(&self, person_id: &str) -> bool {
        self.shared.members.lock().contains_key(person_id)
    }

    pub fn person_location(&self, person_id: &str) -> Option<Location> {
        self.shared
            .members
            .lock()
            .get(person_id)
            .map(|member| member.person.location())
    }

    pub fn person_ids(&self) -> Vec<PersonId> {
        self.shared.members.lock().keys().cloned().collect()
    }

    /// Disposes every person on the floor without emitting removals
    pub fn dispose(&self) {
        let members: Vec<Member> = self.shared.members.lock().drain().map(|(_, m)| m).collect();
        for member in &members {
            member.person.dispose();
        }
    }
}

impl Drop for Floor {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl FloorShared {
    fn apply(self: &Arc<Self>, update: &PersonLocationUpdate) -> bool {
        let on_floor = self.outline.is_location_inside(&update.location);
        let mut members = self.members.lock();

        if !on_floor {
            if let Some(member) = members.remove(&update.person_id) {
                member.person.dispose();
                debug!("Person {} left floor '{}'", update.person_id, self.name);
                self.publish_removed(&update.person_id);
            }
            return false;
        }

        if let Some(member) = members.get(&update.person_id) {
            member.person.update_location(update.location);
            return true;
        }

        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let listener = Arc::new(MemberListener {
            floor: Arc::downgrade(self),
            serial,
        });
        let person = Person::create(
            update.person_id.clone(),
            update.location,
            self.person_lifespan,
            &self.time,
            listener,
        );
        members.insert(update.person_id.clone(), Member { serial, person });

        info!("Person {} entered floor '{}' at {}", update.person_id, self.name, update.location);
        self.bus.publish(EventPayload::PersonAddedToFloor {
            floor: self.name.clone(),
            person_id: update.person_id.clone(),
            location: update.location,
        });
        true
    }

    fn on_person_expired(&self, person_id: &PersonId, serial: u64) {
        let mut members = self.members.lock();

        // A sighting may have landed between the timer firing and this call.
        let current = members
            .get(person_id)
            .is_some_and(|m| m.serial == serial && m.person.is_expired());
        if !current {
            debug!("Ignoring stale expiry for {} on floor '{}'", person_id, self.name);
            return;
        }

        if let Some(member) = members.remove(person_id) {
            member.person.dispose();
        }

        info!("Person {} expired from floor '{}'", person_id, self.name);
        self.bus.publish(EventPayload::PersonExpired {
            floor: self.name.clone(),
            person_id: person_id.clone(),
        });
        self.publish_removed(person_id);
    }

    fn publish_removed(&self, person_id: &PersonId) {
        self.bus.publish(EventPayload::PersonRemovedFromFloor {
            floor: self.name.clone(),
            person_id: person_id.clone(),
        });
    }
}

struct MemberListener {
    floor: Weak<FloorShared>,
    serial: u64,
}

impl PersonListener for MemberListener {
    fn location_changed(&self, person_id: &PersonId, location: Location) {
        if let Some(floor) = self.floor.upgrade() {
            floor.bus.publish(EventPayload::PersonLocationChanged {
                floor: floor.name.clone(),
                person_id: person_id.clone(),
                location,
            });
        }
    }

    fn expired(&self, person_id: &PersonId) {
        if let Some(floor) = self.floor.upgrade() {
            floor.on_person_expired(person_id, self.serial);
        }
    }
}
