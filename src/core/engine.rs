// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Engine - builds floors and hazard zones from configuration and routes
//! floor membership events to the zones drawn on each floor

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tracing::{debug, info, warn};

use super::{Event, EventBus, EventPayload, SubscriptionId, TimeSource};
use crate::config::Config;
use crate::error::Result;
use crate::tracking::{Floor, PersonLocationUpdate};
use crate::zones::{HazardZone, ZoneSnapshot};

type Routes = HashMap<String, Vec<Weak<HazardZone>>>;

/// Composition root for a configured building
pub struct Engine {
    bus: Arc<EventBus>,
    floors: Vec<Arc<Floor>>,
    zones: Vec<Arc<HazardZone>>,
    router: SubscriptionId,
}

impl Engine {
    /// Validates `config` and puts its floors and zones into service.
    ///
    /// Zones flagged `start_active` are activated once routing is in place.
    pub fn from_config(config: &Config, time: TimeSource, bus: Arc<EventBus>) -> Result<Self> {
        config.validate()?;

        let mut floors = Vec::with_capacity(config.floors.len());
        let mut zones = Vec::new();
        let mut routes = Routes::new();
        let mut start_active = Vec::new();

        for floor_config in &config.floors {
            let floor = Floor::with_options(
                floor_config.name.as_str(),
                floor_config.outline()?,
                config.tracking.person_lifespan(),
                time.clone(),
                bus.clone(),
            )?;
            let floor_routes = routes.entry(floor_config.name.clone()).or_default();

            for zone_config in &floor_config.hazard_zones {
                let zone = Arc::new(HazardZone::with_time_source(
                    zone_config.name.as_str(),
                    zone_config.outline()?,
                    zone_config.activation_duration(),
                    zone_config.pre_alarm_duration(),
                    time.clone(),
                    bus.clone(),
                )?);
                zone.set_allowed_number_of_persons(
                    i32::try_from(zone_config.allowed_number_of_persons).unwrap_or(i32::MAX),
                );

                floor_routes.push(Arc::downgrade(&zone));
                if zone_config.start_active {
                    start_active.push(zone.clone());
                }
                zones.push(zone);
            }

            floors.push(Arc::new(floor));
        }

        let router = bus.subscribe(move |event| route(&routes, event));

        for zone in &start_active {
            zone.manually_activate();
        }

        info!(
            "Engine ready: {} floor(s), {} hazard zone(s), {:?} event delivery",
            floors.len(),
            zones.len(),
            bus.mode()
        );

        Ok(Self {
            bus,
            floors,
            zones,
            router,
        })
    }

    /// Feeds one sighting to the named floor.
    ///
    /// Returns `false` for an unknown floor or a location off that floor.
    pub fn update_location(&self, floor: &str, update: &PersonLocationUpdate) -> bool {
        match self.floor(floor) {
            Some(floor) => floor.try_add_person_location_update(update),
            None => {
                warn!("Dropping update for {} on unknown floor '{}'", update.person_id, floor);
                false
            }
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn floor(&self, name: &str) -> Option<&Arc<Floor>> {
        self.floors.iter().find(|f| f.name() == name)
    }

    pub fn floors(&self) -> &[Arc<Floor>] {
        &self.floors
    }

    pub fn zone(&self, name: &str) -> Option<&Arc<HazardZone>> {
        self.zones.iter().find(|z| z.name() == name)
    }

    pub fn zones(&self) -> &[Arc<HazardZone>] {
        &self.zones
    }

    /// Snapshot of every zone, in configuration order
    pub fn status(&self) -> Vec<ZoneSnapshot> {
        self.zones.iter().map(|z| z.snapshot()).collect()
    }

    /// Stops routing and releases every person and zone timer
    pub fn dispose(&self) {
        self.bus.unsubscribe(self.router);
        for floor in &self.floors {
            floor.dispose();
        }
        for zone in &self.zones {
            zone.dispose();
        }
        debug!("Engine disposed");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn route(routes: &Routes, event: &Event) {
    let floor = match &event.payload {
        EventPayload::PersonAddedToFloor { floor, .. }
        | EventPayload::PersonLocationChanged { floor, .. }
        | EventPayload::PersonRemovedFromFloor { floor, .. } => floor,
        _ => return,
    };
    let Some(zones) = routes.get(floor) else {
        return;
    };

    for zone in zones.iter().filter_map(Weak::upgrade) {
        match &event.payload {
            EventPayload::PersonAddedToFloor {
                person_id, location, ..
            } => zone.handle_person_created(person_id, *location),
            EventPayload::PersonLocationChanged {
                person_id, location, ..
            } => zone.handle_person_location_changed(person_id, *location),
            EventPayload::PersonRemovedFromFloor { person_id, .. } => zone.handle_person_expired(person_id),
            _ => {}
        }
    }
}
