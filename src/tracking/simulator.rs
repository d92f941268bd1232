// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Random-walk movement simulator for demo/testing

use rand::prelude::*;
use rand::rngs::StdRng;

use super::{PersonId, PersonLocationUpdate};
use crate::geometry::{Location, Outline};

struct Walker {
    id: PersonId,
    location: Location,
}

/// Simulates persons wandering around a floor
pub struct WalkSimulator {
    rng: StdRng,
    walkers: Vec<Walker>,
    min: Location,
    max: Location,
    step: f64,

    /// Chance that a walker reports nothing in a tick
    silence_probability: f64,
}

impl WalkSimulator {
    pub fn new(persons: usize, outline: &Outline, step: f64, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let step = if step.is_finite() { step.abs() } else { 0.0 };
        let (min, max) = bounding_box(outline);
        // Let walkers stray a little past the floor edge.
        let margin = step * 2.0;
        let min = Location::new(min.x - margin, min.y - margin);
        let max = Location::new(max.x + margin, max.y + margin);

        let walkers = (0..persons)
            .map(|_| {
                let id = uuid::Builder::from_random_bytes(rng.gen()).into_uuid();
                Walker {
                    id: id.to_string(),
                    location: Location::new(
                        rng.gen_range(min.x..=max.x),
                        rng.gen_range(min.y..=max.y),
                    ),
                }
            })
            .collect();

        Self {
            rng,
            walkers,
            min,
            max,
            step,
            silence_probability: 0.05,
        }
    }

    pub fn with_silence_probability(mut self, probability: f64) -> Self {
        self.silence_probability = probability.clamp(0.0, 1.0);
        self
    }

    pub fn person_ids(&self) -> Vec<PersonId> {
        self.walkers.iter().map(|w| w.id.clone()).collect()
    }

    /// Moves every walker one step and returns the sightings reported this tick
    pub fn tick(&mut self) -> Vec<PersonLocationUpdate> {
        let mut updates = Vec::with_capacity(self.walkers.len());

        for walker in &mut self.walkers {
            if self.step > 0.0 {
                let dx = self.rng.gen_range(-self.step..=self.step);
                let dy = self.rng.gen_range(-self.step..=self.step);
                walker.location = Location::new(
                    (walker.location.x + dx).clamp(self.min.x, self.max.x),
                    (walker.location.y + dy).clamp(self.min.y, self.max.y),
                );
            }

            if self.rng.gen_bool(self.silence_probability) {
                continue;
            }
            updates.push(PersonLocationUpdate::new(walker.id.clone(), walker.location));
        }

        updates
    }
}

fn bounding_box(outline: &Outline) -> (Location, Location) {
    let vertices = outline.vertices();
    let mut min = vertices[0];
    let mut max = vertices[0];
    for v in &vertices[1..] {
        min.x = min.x.min(v.x);
        min.y = min.y.min(v.y);
        max.x = max.x.max(v.x);
        max.y = max.y.max(v.y);
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor() -> Outline {
        Outline::new([(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]).unwrap()
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let mut a = WalkSimulator::new(5, &floor(), 1.0, Some(7));
        let mut b = WalkSimulator::new(5, &floor(), 1.0, Some(7));

        assert_eq!(a.person_ids(), b.person_ids());
        for _ in 0..10 {
            assert_eq!(a.tick(), b.tick());
        }
    }

    #[test]
    fn test_walkers_stay_near_floor() {
        let mut sim = WalkSimulator::new(20, &floor(), 1.0, Some(1)).with_silence_probability(0.0);

        for _ in 0..50 {
            let updates = sim.tick();
            assert_eq!(updates.len(), 20);
            for u in updates {
                assert!((-2.0..=12.0).contains(&u.location.x));
                assert!((-2.0..=12.0).contains(&u.location.y));
            }
        }
    }

    #[test]
    fn test_negative_step_on_narrow_floor() {
        let narrow = Outline::new([(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]).unwrap();
        let mut sim = WalkSimulator::new(10, &narrow, -1.0, Some(5)).with_silence_probability(0.0);

        for _ in 0..20 {
            for u in sim.tick() {
                assert!((-2.0..=3.0).contains(&u.location.x));
                assert!((-2.0..=3.0).contains(&u.location.y));
            }
        }
    }

    #[test]
    fn test_silent_walkers_report_nothing() {
        let mut sim = WalkSimulator::new(10, &floor(), 1.0, Some(3)).with_silence_probability(1.0);
        assert!(sim.tick().is_empty());
    }
}
