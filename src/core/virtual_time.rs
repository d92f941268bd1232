// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Deterministic timers driven by a manual clock

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::clock::{add_duration, Clock, ManualClock};
use super::timer::{ElapsedHandler, Timer, TimerFactory};
use super::TimeSource;

struct Slot {
    interval: Duration,
    auto_reset: bool,
    handler: Option<ElapsedHandler>,
    // Due time plus a sequence number that orders timers due at the same instant.
    due: Option<(DateTime<Utc>, u64)>,
}

#[derive(Default)]
struct Schedule {
    next_id: u64,
    next_seq: u64,
    slots: HashMap<u64, Slot>,
}

impl Schedule {
    fn seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// Timer factory whose timers only fire from [`VirtualTimerFactory::advance`].
///
/// Advancing walks the clock forward one due timer at a time, earliest first,
/// so a handler that starts another timer already due within the advance
/// window sees it fired before `advance` returns.
#[derive(Clone)]
pub struct VirtualTimerFactory {
    clock: Arc<ManualClock>,
    schedule: Arc<Mutex<Schedule>>,
}

impl VirtualTimerFactory {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            schedule: Arc::new(Mutex::new(Schedule::default())),
        }
    }

    pub fn clock(&self) -> Arc<ManualClock> {
        self.clock.clone()
    }

    /// Clock and timer factory bundle for injecting into floors and zones
    pub fn time_source(&self) -> TimeSource {
        TimeSource::new(self.clock.clone(), Arc::new(self.clone()))
    }

    pub fn advance(&self, by: Duration) {
        let target = add_duration(self.clock.utc_now(), by);
        self.advance_to(target);
    }

    pub fn advance_to(&self, target: DateTime<Utc>) {
        while let Some(handler) = self.pop_due(target) {
            if let Some(handler) = handler {
                handler();
            }
        }
        self.clock.set(target);
    }

    /// Number of timers currently counting down
    pub fn pending(&self) -> usize {
        self.schedule
            .lock()
            .slots
            .values()
            .filter(|slot| slot.due.is_some())
            .count()
    }

    fn pop_due(&self, target: DateTime<Utc>) -> Option<Option<ElapsedHandler>> {
        let mut schedule = self.schedule.lock();

        let (due, _, id) = schedule
            .slots
            .iter()
            .filter_map(|(id, slot)| slot.due.map(|(due, seq)| (due, seq, *id)))
            .filter(|(due, _, _)| *due <= target)
            .min()?;

        let seq = schedule.seq();
        let slot = schedule.slots.get_mut(&id)?;
        // A zero interval would never let the clock move past `due`.
        slot.due = if slot.auto_reset && !slot.interval.is_zero() {
            Some((add_duration(due, slot.interval), seq))
        } else {
            None
        };
        let handler = slot.handler.clone();
        drop(schedule);

        self.clock.set(due);
        Some(handler)
    }
}

impl TimerFactory for VirtualTimerFactory {
    fn create(&self, interval: Duration, auto_reset: bool) -> Box<dyn Timer> {
        let mut schedule = self.schedule.lock();
        schedule.next_id += 1;
        let id = schedule.next_id;
        schedule.slots.insert(
            id,
            Slot {
                interval,
                auto_reset,
                handler: None,
                due: None,
            },
        );

        Box::new(VirtualTimer {
            id,
            clock: self.clock.clone(),
            schedule: self.schedule.clone(),
        })
    }
}

struct VirtualTimer {
    id: u64,
    clock: Arc<ManualClock>,
    schedule: Arc<Mutex<Schedule>>,
}

impl VirtualTimer {
    fn with_slot<R>(&self, f: impl FnOnce(&mut Slot) -> R) -> Option<R> {
        self.schedule.lock().slots.get_mut(&self.id).map(f)
    }
}

impl Timer for VirtualTimer {
    fn interval(&self) -> Duration {
        self.with_slot(|slot| slot.interval).unwrap_or_default()
    }

    fn set_interval(&self, interval: Duration) {
        self.with_slot(|slot| slot.interval = interval);
    }

    fn auto_reset(&self) -> bool {
        self.with_slot(|slot| slot.auto_reset).unwrap_or(false)
    }

    fn set_handler(&self, handler: ElapsedHandler) {
        self.with_slot(|slot| slot.handler = Some(handler));
    }

    fn start(&self) {
        let now = self.clock.utc_now();
        let mut schedule = self.schedule.lock();
        let seq = schedule.seq();
        if let Some(slot) = schedule.slots.get_mut(&self.id) {
            slot.due = Some((add_duration(now, slot.interval), seq));
        }
    }

    fn stop(&self) {
        self.with_slot(|slot| slot.due = None);
    }

    fn is_running(&self) -> bool {
        self.with_slot(|slot| slot.due.is_some()).unwrap_or(false)
    }
}

impl Drop for VirtualTimer {
    fn drop(&mut self) {
        self.schedule.lock().slots.remove(&self.id);
    }
}
