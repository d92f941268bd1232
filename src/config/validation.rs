// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Layout checks run before any floor or zone is put into service

use std::collections::HashSet;

use super::Config;
use crate::error::ConfigViolation;
use crate::geometry::Outline;

pub(super) fn violations(config: &Config) -> Vec<ConfigViolation> {
    let mut violations = Vec::new();
    let mut floor_names = HashSet::new();
    let mut zone_names = HashSet::new();

    for (index, floor) in config.floors.iter().enumerate() {
        if floor.name.trim().is_empty() {
            violations.push(invalid(format!("floor #{}", index + 1), "name must not be blank"));
        } else if !floor_names.insert(floor.name.as_str()) {
            violations.push(ConfigViolation::DuplicateFloorName(floor.name.clone()));
        }

        let floor_outline = match floor.outline() {
            Ok(outline) => Some(outline),
            Err(e) => {
                violations.push(invalid(format!("floor '{}'", floor.name), e));
                None
            }
        };

        let mut zones: Vec<(&str, Outline)> = Vec::new();
        for (zone_index, zone) in floor.hazard_zones.iter().enumerate() {
            if zone.name.trim().is_empty() {
                violations.push(invalid(
                    format!("floor '{}' hazard zone #{}", floor.name, zone_index + 1),
                    "name must not be blank",
                ));
            } else if !zone_names.insert(zone.name.as_str()) {
                violations.push(ConfigViolation::DuplicateZoneName(zone.name.clone()));
            }

            match zone.outline() {
                Ok(outline) => zones.push((zone.name.as_str(), outline)),
                Err(e) => violations.push(invalid(format!("hazard zone '{}'", zone.name), e)),
            }
        }

        for (i, (first, a)) in zones.iter().enumerate() {
            for (second, b) in &zones[i + 1..] {
                if a.overlaps(b) {
                    violations.push(ConfigViolation::OverlappingZones {
                        first: first.to_string(),
                        second: second.to_string(),
                    });
                }
            }
        }

        if config.validation.require_zone_containment {
            if let Some(floor_outline) = &floor_outline {
                for (zone, outline) in &zones {
                    if !outline.is_within(floor_outline) {
                        violations.push(ConfigViolation::ZoneOutsideFloor {
                            zone: zone.to_string(),
                            floor: floor.name.clone(),
                        });
                    }
                }
            }
        }
    }

    violations
}

fn invalid(owner: String, reason: impl ToString) -> ConfigViolation {
    ConfigViolation::InvalidEntity {
        owner,
        reason: reason.to_string(),
    }
}
