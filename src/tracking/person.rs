// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! A single tracked person with a sliding expiry timeout

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use super::PersonId;
use crate::core::{add_duration, Clock, TimeSource, Timer};
use crate::geometry::Location;

/// Receives a person's notifications
pub trait PersonListener: Send + Sync {
    fn location_changed(&self, person_id: &PersonId, location: Location);

    fn expired(&self, person_id: &PersonId);
}

struct PersonState {
    location: Location,
    deadline: DateTime<Utc>,
    expired: bool,
    timer: Option<Box<dyn Timer>>,
}

struct PersonShared {
    id: PersonId,
    timeout: Duration,
    clock: Arc<dyn Clock>,
    listener: Arc<dyn PersonListener>,
    state: Mutex<PersonState>,
}

/// Person whose last known location is tracked until it goes quiet for
/// longer than its timeout.
pub struct Person {
    shared: Arc<PersonShared>,
}

impl Person {
    /// Creates the person and starts its expiry countdown
    pub fn create(
        id: impl Into<PersonId>,
        location: Location,
        timeout: Duration,
        time: &TimeSource,
        listener: Arc<dyn PersonListener>,
    ) -> Self {
        let timer = time.timers.create(timeout, false);
        let deadline = add_duration(time.clock.utc_now(), timeout);

        let shared = Arc::new_cyclic(|weak: &Weak<PersonShared>| {
            let weak = weak.clone();
            timer.set_handler(Arc::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_timer_elapsed();
                }
            }));

            PersonShared {
                id: id.into(),
                timeout,
                clock: time.clock.clone(),
                listener,
                state: Mutex::new(PersonState {
                    location,
                    deadline,
                    expired: false,
                    timer: None,
                }),
            }
        });

        timer.start();
        shared.state.lock().timer = Some(timer);

        Self { shared }
    }

    pub fn id(&self) -> &PersonId {
        &self.shared.id
    }

    pub fn location(&self) -> Location {
        self.shared.state.lock().location
    }

    pub fn timeout(&self) -> Duration {
        self.shared.timeout
    }

    pub fn is_expired(&self) -> bool {
        self.shared.state.lock().expired
    }

    /// Records a sighting. The expiry countdown restarts even when the
    /// location is unchanged; only a changed location is reported.
    pub fn update_location(&self, location: Location) {
        let shared = &self.shared;
        let changed = {
            let mut state = shared.state.lock();
            let Some(timer) = state.timer.as_ref() else {
                return;
            };

            timer.set_interval(shared.timeout);
            timer.start();
            state.deadline = add_duration(shared.clock.utc_now(), shared.timeout);
            state.expired = false;

            if state.location == location {
                false
            } else {
                state.location = location;
                true
            }
        };

        if changed {
            shared.listener.location_changed(&shared.id, location);
        }
    }

    /// Stops the expiry timer; no notifications follow
    pub fn dispose(&self) {
        self.shared.state.lock().timer = None;
    }
}

impl Drop for Person {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl PersonShared {
    fn on_timer_elapsed(&self) {
        {
            let mut state = self.state.lock();
            let Some(timer) = state.timer.as_ref() else {
                return;
            };
            if state.expired {
                return;
            }

            let now = self.clock.utc_now();
            if now < state.deadline {
                // Early or stale callback; wait out the remainder.
                let remaining = (state.deadline - now).to_std().unwrap_or(self.timeout);
                debug!("Expiry timer for {} fired early, re-arming for {:?}", self.id, remaining);
                timer.set_interval(remaining);
                timer.start();
                return;
            }

            state.expired = true;
        }

        debug!("Person {} expired", self.id);
        self.listener.expired(&self.id);
    }
}
