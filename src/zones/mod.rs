// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Hazard zones - occupancy monitoring with delayed activation and
//! pre-alarm escalation

mod state;

use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use state::{transition, Conditions, Phase, Trigger};

use crate::core::{elapsed_since, EventBus, EventPayload, TimeSource, Timer};
use crate::error::{Error, Result};
use crate::geometry::{Location, Outline};
use crate::tracking::PersonId;

/// Whether a zone is monitoring occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneState {
    Inactive,
    Activating,
    Active,
}

/// Escalation level; only meaningful while the zone is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlarmState {
    None,
    PreAlarm,
    Alarm,
}

impl std::fmt::Display for ZoneState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl std::fmt::Display for AlarmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Point-in-time view of a zone, taken under its lock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    pub name: String,
    pub zone_state: ZoneState,
    pub alarm_state: AlarmState,
    pub person_count: usize,
    pub allowed_number_of_persons: usize,
    pub active_sources: Vec<String>,
}

/// Running delay owned by the Activating and PreAlarm phases
struct Countdown {
    started_at: DateTime<Utc>,
    duration: Duration,
    timer: Box<dyn Timer>,
}

/// The live phase; replacing it drops any countdown it owned
struct PhaseState {
    phase: Phase,
    epoch: u64,
    countdown: Option<Countdown>,
}

struct ZoneInner {
    current: PhaseState,
    next_epoch: u64,
    allowed: usize,
    persons: HashSet<PersonId>,
    sources: HashSet<String>,
    disposed: bool,
}

struct ZoneShared {
    name: String,
    outline: Outline,
    activation_duration: Duration,
    pre_alarm_duration: Duration,
    time: TimeSource,
    bus: Arc<EventBus>,
    inner: Mutex<ZoneInner>,
}

/// A monitored area that escalates to an alarm when more persons are inside
/// than allowed.
///
/// Every command, membership change and timer callback runs under one
/// per-zone lock, so each check-and-transition is atomic.
pub struct HazardZone {
    shared: Arc<ZoneShared>,
}

impl HazardZone {
    pub fn new(
        name: impl Into<String>,
        outline: Outline,
        activation_duration: Duration,
        pre_alarm_duration: Duration,
        bus: Arc<EventBus>,
    ) -> Result<Self> {
        Self::with_time_source(
            name,
            outline,
            activation_duration,
            pre_alarm_duration,
            TimeSource::system()?,
            bus,
        )
    }

    pub fn with_time_source(
        name: impl Into<String>,
        outline: Outline,
        activation_duration: Duration,
        pre_alarm_duration: Duration,
        time: TimeSource,
        bus: Arc<EventBus>,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::BlankName("hazard zone"));
        }

        debug!(
            "Created hazard zone '{}' (activation {:?}, pre-alarm {:?})",
            name, activation_duration, pre_alarm_duration
        );

        Ok(Self {
            shared: Arc::new(ZoneShared {
                name,
                outline,
                activation_duration,
                pre_alarm_duration,
                time,
                bus,
                inner: Mutex::new(ZoneInner {
                    current: PhaseState {
                        phase: Phase::Inactive,
                        epoch: 0,
                        countdown: None,
                    },
                    next_epoch: 0,
                    allowed: 0,
                    persons: HashSet::new(),
                    sources: HashSet::new(),
                    disposed: false,
                }),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn outline(&self) -> &Outline {
        &self.shared.outline
    }

    pub fn activation_duration(&self) -> Duration {
        self.shared.activation_duration
    }

    pub fn pre_alarm_duration(&self) -> Duration {
        self.shared.pre_alarm_duration
    }

    pub fn zone_state(&self) -> ZoneState {
        self.shared.inner.lock().current.phase.zone_state()
    }

    pub fn alarm_state(&self) -> AlarmState {
        self.shared.inner.lock().current.phase.alarm_state()
    }

    pub fn allowed_number_of_persons(&self) -> usize {
        self.shared.inner.lock().allowed
    }

    pub fn person_count(&self) -> usize {
        self.shared.inner.lock().persons.len()
    }

    pub fn contains_person(&self, person_id: &str) -> bool {
        self.shared.inner.lock().persons.contains(person_id)
    }

    /// Registered external activation sources, sorted
    pub fn active_sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self.shared.inner.lock().sources.iter().cloned().collect();
        sources.sort();
        sources
    }

    pub fn snapshot(&self) -> ZoneSnapshot {
        let inner = self.shared.inner.lock();
        let mut active_sources: Vec<String> = inner.sources.iter().cloned().collect();
        active_sources.sort();

        ZoneSnapshot {
            name: self.shared.name.clone(),
            zone_state: inner.current.phase.zone_state(),
            alarm_state: inner.current.phase.alarm_state(),
            person_count: inner.persons.len(),
            allowed_number_of_persons: inner.allowed,
            active_sources,
        }
    }

    pub fn manually_activate(&self) {
        let mut inner = self.shared.inner.lock();
        self.shared.fire(&mut inner, Trigger::Activate);
    }

    pub fn manually_deactivate(&self) {
        let mut inner = self.shared.inner.lock();
        self.shared.fire(&mut inner, Trigger::Deactivate);
    }

    /// Registers `source_id` as asserting activation.
    ///
    /// Returns `false` for a blank or already registered id, which changes
    /// nothing.
    pub fn activate_from_external_source(&self, source_id: &str) -> bool {
        if source_id.trim().is_empty() {
            warn!("Ignoring blank activation source for zone '{}'", self.shared.name);
            return false;
        }

        let mut inner = self.shared.inner.lock();
        if !inner.sources.insert(source_id.to_string()) {
            return false;
        }
        debug!("Zone '{}' activation source '{}' registered", self.shared.name, source_id);
        self.shared.fire(&mut inner, Trigger::Activate);
        true
    }

    /// Withdraws `source_id`. A registered id deactivates the zone even when
    /// other sources remain registered; an unknown id changes nothing.
    pub fn deactivate_from_external_source(&self, source_id: &str) -> bool {
        let mut inner = self.shared.inner.lock();
        if !inner.sources.remove(source_id) {
            return false;
        }
        debug!("Zone '{}' activation source '{}' withdrawn", self.shared.name, source_id);
        self.shared.fire(&mut inner, Trigger::Deactivate);
        true
    }

    /// Negative values are ignored
    pub fn set_allowed_number_of_persons(&self, allowed: i32) {
        let Ok(allowed) = usize::try_from(allowed) else {
            debug!("Ignoring negative allowed number {} for zone '{}'", allowed, self.shared.name);
            return;
        };

        let mut inner = self.shared.inner.lock();
        inner.allowed = allowed;
        self.shared.fire(&mut inner, Trigger::OccupancyChanged);
    }

    pub fn handle_person_created(&self, person_id: &str, location: Location) {
        if !self.shared.outline.is_location_inside(&location) {
            return;
        }
        let mut inner = self.shared.inner.lock();
        self.shared.add_person(&mut inner, person_id);
    }

    pub fn handle_person_expired(&self, person_id: &str) {
        let mut inner = self.shared.inner.lock();
        self.shared.remove_person(&mut inner, person_id);
    }

    pub fn handle_person_location_changed(&self, person_id: &str, location: Location) {
        let inside = self.shared.outline.is_location_inside(&location);
        let mut inner = self.shared.inner.lock();
        let was_inside = inner.persons.contains(person_id);

        match (was_inside, inside) {
            (false, true) => self.shared.add_person(&mut inner, person_id),
            (true, false) => self.shared.remove_person(&mut inner, person_id),
            _ => {}
        }
    }

    /// Releases any pending timer; later commands are ignored
    pub fn dispose(&self) {
        let mut inner = self.shared.inner.lock();
        inner.disposed = true;
        inner.current.countdown = None;
    }
}

impl Drop for HazardZone {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl ZoneShared {
    fn conditions(&self, inner: &ZoneInner) -> Conditions {
        Conditions {
            overcrowded: inner.persons.len() > inner.allowed,
            activation_delay: !self.activation_duration.is_zero(),
            pre_alarm_delay: !self.pre_alarm_duration.is_zero(),
        }
    }

    fn fire(self: &Arc<Self>, inner: &mut ZoneInner, trigger: Trigger) {
        if inner.disposed {
            return;
        }
        let conditions = self.conditions(inner);
        if let Some(next) = transition(inner.current.phase, trigger, conditions) {
            self.enter(inner, next);
        }
    }

    fn enter(self: &Arc<Self>, inner: &mut ZoneInner, next: Phase) {
        inner.next_epoch += 1;
        let epoch = inner.next_epoch;

        let countdown = match next {
            Phase::Activating => Some(self.start_countdown(epoch, self.activation_duration, Trigger::ActivationElapsed)),
            Phase::PreAlarm => Some(self.start_countdown(epoch, self.pre_alarm_duration, Trigger::PreAlarmElapsed)),
            Phase::Inactive | Phase::Monitoring | Phase::Alarm => None,
        };

        let previous = std::mem::replace(
            &mut inner.current,
            PhaseState {
                phase: next,
                epoch,
                countdown,
            },
        );
        let from = previous.phase;
        drop(previous);

        self.announce(from, next);
    }

    fn announce(&self, from: Phase, to: Phase) {
        let zone = || self.name.clone();

        if from.zone_state() != to.zone_state() {
            info!("Zone '{}' is now {}", self.name, to.zone_state());
            self.bus.publish(EventPayload::ZoneStateChanged {
                zone: zone(),
                state: to.zone_state(),
            });

            match to.zone_state() {
                ZoneState::Activating => self.bus.publish(EventPayload::ActivationStarted { zone: zone() }),
                ZoneState::Active => self.bus.publish(EventPayload::Activated { zone: zone() }),
                ZoneState::Inactive => {}
            }
        }

        if from.alarm_state() != to.alarm_state() {
            match to.alarm_state() {
                AlarmState::None => info!("Zone '{}' alarm cleared", self.name),
                escalated => warn!("Zone '{}' raised {}", self.name, escalated),
            }
            self.bus.publish(EventPayload::AlarmStateChanged {
                zone: zone(),
                state: to.alarm_state(),
            });
        }
    }

    fn start_countdown(self: &Arc<Self>, epoch: u64, duration: Duration, trigger: Trigger) -> Countdown {
        let timer = self.time.timers.create(duration, false);
        let weak: Weak<ZoneShared> = Arc::downgrade(self);
        timer.set_handler(Arc::new(move || {
            if let Some(zone) = weak.upgrade() {
                zone.on_countdown_elapsed(epoch, trigger);
            }
        }));
        timer.start();

        Countdown {
            started_at: self.time.clock.utc_now(),
            duration,
            timer,
        }
    }

    fn on_countdown_elapsed(self: &Arc<Self>, epoch: u64, trigger: Trigger) {
        let mut inner = self.inner.lock();
        if inner.current.epoch != epoch {
            debug!("Discarding stale {:?} callback for zone '{}'", trigger, self.name);
            return;
        }
        let Some(countdown) = inner.current.countdown.as_ref() else {
            return;
        };

        let elapsed = elapsed_since(self.time.clock.as_ref(), countdown.started_at);
        if elapsed < countdown.duration {
            let remaining = countdown.duration - elapsed;
            debug!("Early {:?} callback for zone '{}', re-arming for {:?}", trigger, self.name, remaining);
            countdown.timer.set_interval(remaining);
            countdown.timer.start();
            return;
        }

        self.fire(&mut inner, trigger);
    }

    fn add_person(self: &Arc<Self>, inner: &mut ZoneInner, person_id: &str) {
        if !inner.persons.insert(person_id.to_string()) {
            return;
        }
        debug!("Person {} entered zone '{}' ({} inside)", person_id, self.name, inner.persons.len());
        self.bus.publish(EventPayload::PersonAddedToHazardZone {
            zone: self.name.clone(),
            person_id: person_id.to_string(),
        });
        self.fire(inner, Trigger::OccupancyChanged);
    }

    fn remove_person(self: &Arc<Self>, inner: &mut ZoneInner, person_id: &str) {
        if !inner.persons.remove(person_id) {
            return;
        }
        debug!("Person {} left zone '{}' ({} inside)", person_id, self.name, inner.persons.len());
        self.bus.publish(EventPayload::PersonRemovedFromHazardZone {
            zone: self.name.clone(),
            person_id: person_id.to_string(),
        });
        self.fire(inner, Trigger::OccupancyChanged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Event, ManualClock, VirtualTimerFactory};
    use crossbeam::channel::Receiver;

    const T: Duration = Duration::from_secs(10);

    fn square(size: f64) -> Outline {
        Outline::new([(0.0, 0.0), (size, 0.0), (size, size), (0.0, size)]).unwrap()
    }

    fn setup(activation: Duration, pre_alarm: Duration) -> (VirtualTimerFactory, HazardZone, Receiver<Event>) {
        let timers = VirtualTimerFactory::new(Arc::new(ManualClock::at_epoch()));
        let bus = Arc::new(EventBus::inline(timers.clock()));
        let (_, rx) = bus.subscribe_channel();
        let zone =
            HazardZone::with_time_source("Z1", square(10.0), activation, pre_alarm, timers.time_source(), bus).unwrap();
        (timers, zone, rx)
    }

    fn payloads(rx: &Receiver<Event>) -> Vec<EventPayload> {
        rx.try_iter().map(|e| e.payload).collect()
    }

    fn states(zone: &HazardZone) -> (ZoneState, AlarmState) {
        (zone.zone_state(), zone.alarm_state())
    }

    #[test]
    fn test_new_zone_is_inactive() {
        let (_timers, zone, _rx) = setup(T, T);
        assert_eq!(states(&zone), (ZoneState::Inactive, AlarmState::None));
        assert_eq!(zone.allowed_number_of_persons(), 0);
        assert_eq!(zone.person_count(), 0);
        assert!(zone.active_sources().is_empty());
    }

    #[test]
    fn test_rejects_blank_name() {
        let bus = Arc::new(EventBus::inline(Arc::new(ManualClock::at_epoch())));
        let result = HazardZone::new("", square(1.0), T, T, bus);
        assert!(matches!(result, Err(Error::BlankName("hazard zone"))));
    }

    #[test]
    fn test_immediate_alarm_without_delays() {
        let (_timers, zone, rx) = setup(Duration::ZERO, Duration::ZERO);
        zone.set_allowed_number_of_persons(1);

        zone.manually_activate();
        assert_eq!(states(&zone), (ZoneState::Active, AlarmState::None));

        zone.handle_person_created("p1", Location::new(5.0, 5.0));
        assert_eq!(zone.person_count(), 1);
        assert_eq!(zone.alarm_state(), AlarmState::None);

        zone.handle_person_created("p2", Location::new(6.0, 6.0));
        assert_eq!(zone.person_count(), 2);
        assert_eq!(zone.alarm_state(), AlarmState::Alarm);

        zone.handle_person_expired("p1");
        assert_eq!(zone.person_count(), 1);
        assert_eq!(zone.alarm_state(), AlarmState::None);

        let events = payloads(&rx);
        let alarms: Vec<_> = events
            .iter()
            .filter_map(|p| match p {
                EventPayload::AlarmStateChanged { state, .. } => Some(*state),
                _ => None,
            })
            .collect();
        assert_eq!(alarms, vec![AlarmState::Alarm, AlarmState::None]);
        assert_eq!(
            events[..2],
            [
                EventPayload::ZoneStateChanged {
                    zone: "Z1".into(),
                    state: ZoneState::Active
                },
                EventPayload::Activated { zone: "Z1".into() },
            ]
        );
    }

    #[test]
    fn test_pre_alarm_escalates_after_delay() {
        let (timers, zone, _rx) = setup(Duration::ZERO, T);
        zone.set_allowed_number_of_persons(1);
        zone.manually_activate();

        zone.handle_person_created("p1", Location::new(5.0, 5.0));
        zone.handle_person_created("p2", Location::new(6.0, 6.0));
        assert_eq!(zone.alarm_state(), AlarmState::PreAlarm);

        timers.advance(T - Duration::from_millis(1));
        assert_eq!(zone.alarm_state(), AlarmState::PreAlarm);

        timers.advance(Duration::from_millis(1));
        assert_eq!(zone.alarm_state(), AlarmState::Alarm);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn test_pre_alarm_cancelled_when_occupancy_drops() {
        let (timers, zone, _rx) = setup(Duration::ZERO, T);
        zone.set_allowed_number_of_persons(1);
        zone.manually_activate();
        zone.handle_person_created("p1", Location::new(5.0, 5.0));
        zone.handle_person_created("p2", Location::new(6.0, 6.0));

        zone.handle_person_expired("p2");
        assert_eq!(zone.alarm_state(), AlarmState::None);
        assert_eq!(timers.pending(), 0);

        timers.advance(T * 2);
        assert_eq!(zone.alarm_state(), AlarmState::None);
    }

    #[test]
    fn test_pre_alarm_restarts_from_reentry() {
        let (timers, zone, _rx) = setup(Duration::ZERO, T);
        zone.manually_activate();

        zone.handle_person_created("p1", Location::new(5.0, 5.0));
        timers.advance(Duration::from_secs(5));
        zone.handle_person_expired("p1");
        zone.handle_person_created("p1", Location::new(5.0, 5.0));

        // The first pre-alarm would have been due now.
        timers.advance(Duration::from_secs(5));
        assert_eq!(zone.alarm_state(), AlarmState::PreAlarm);

        timers.advance(Duration::from_secs(5));
        assert_eq!(zone.alarm_state(), AlarmState::Alarm);
    }

    #[test]
    fn test_threshold_increase_clears_alarm() {
        let (_timers, zone, _rx) = setup(Duration::ZERO, Duration::ZERO);
        zone.manually_activate();
        zone.handle_person_created("p1", Location::new(5.0, 5.0));
        zone.handle_person_created("p2", Location::new(6.0, 6.0));
        assert_eq!(zone.alarm_state(), AlarmState::Alarm);

        zone.set_allowed_number_of_persons(1);
        assert_eq!(zone.alarm_state(), AlarmState::Alarm);

        zone.set_allowed_number_of_persons(2);
        assert_eq!(zone.alarm_state(), AlarmState::None);

        zone.set_allowed_number_of_persons(-1);
        assert_eq!(zone.allowed_number_of_persons(), 2);
        assert_eq!(zone.alarm_state(), AlarmState::None);

        zone.set_allowed_number_of_persons(0);
        assert_eq!(zone.alarm_state(), AlarmState::Alarm);
    }

    #[test]
    fn test_activation_delay() {
        let (timers, zone, rx) = setup(T, T);

        zone.manually_activate();
        assert_eq!(states(&zone), (ZoneState::Activating, AlarmState::None));

        timers.advance(T - Duration::from_millis(1));
        assert_eq!(zone.zone_state(), ZoneState::Activating);

        timers.advance(Duration::from_millis(1));
        assert_eq!(states(&zone), (ZoneState::Active, AlarmState::None));

        assert_eq!(
            payloads(&rx),
            vec![
                EventPayload::ZoneStateChanged {
                    zone: "Z1".into(),
                    state: ZoneState::Activating
                },
                EventPayload::ActivationStarted { zone: "Z1".into() },
                EventPayload::ZoneStateChanged {
                    zone: "Z1".into(),
                    state: ZoneState::Active
                },
                EventPayload::Activated { zone: "Z1".into() },
            ]
        );
    }

    #[test]
    fn test_deactivate_while_activating_cancels_timer() {
        let (timers, zone, _rx) = setup(T, T);
        zone.manually_activate();

        zone.manually_deactivate();
        assert_eq!(zone.zone_state(), ZoneState::Inactive);
        assert_eq!(timers.pending(), 0);

        timers.advance(T * 2);
        assert_eq!(zone.zone_state(), ZoneState::Inactive);
    }

    #[test]
    fn test_activation_starts_without_alarm_when_crowded() {
        let (timers, zone, _rx) = setup(Duration::ZERO, T);
        zone.handle_person_created("p1", Location::new(5.0, 5.0));
        assert_eq!(zone.person_count(), 1);

        zone.manually_activate();
        assert_eq!(states(&zone), (ZoneState::Active, AlarmState::None));
        assert_eq!(timers.pending(), 0);

        zone.handle_person_created("p2", Location::new(6.0, 6.0));
        assert_eq!(states(&zone), (ZoneState::Active, AlarmState::PreAlarm));
    }

    #[test]
    fn test_activation_delay_ends_without_alarm_when_crowded() {
        let (timers, zone, _rx) = setup(T, Duration::ZERO);
        zone.manually_activate();
        zone.handle_person_created("p1", Location::new(5.0, 5.0));

        timers.advance(T);
        assert_eq!(states(&zone), (ZoneState::Active, AlarmState::None));

        // Still overcrowded; the next allowed-count change escalates.
        zone.set_allowed_number_of_persons(0);
        assert_eq!(states(&zone), (ZoneState::Active, AlarmState::Alarm));
    }

    #[test]
    fn test_early_countdown_callback_rearms() {
        let timers = VirtualTimerFactory::new(Arc::new(ManualClock::at_epoch()));
        // The zone reads a clock that trails the one driving its timers.
        let lagging = Arc::new(ManualClock::at_epoch());
        let bus = Arc::new(EventBus::inline(timers.clock()));
        let time = TimeSource::new(lagging.clone(), Arc::new(timers.clone()));
        let zone = HazardZone::with_time_source("Z1", square(10.0), T, T, time, bus).unwrap();

        zone.manually_activate();
        timers.advance(T);
        assert_eq!(zone.zone_state(), ZoneState::Activating);
        assert_eq!(timers.pending(), 1);

        lagging.advance(T);
        timers.advance(T);
        assert_eq!(states(&zone), (ZoneState::Active, AlarmState::None));
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn test_stale_countdown_callback_is_discarded() {
        let (timers, zone, _rx) = setup(T, T);
        zone.manually_activate();
        timers.advance(T / 2);

        // Restarting activation supersedes the first countdown.
        zone.manually_deactivate();
        zone.manually_activate();
        zone.shared.on_countdown_elapsed(1, Trigger::ActivationElapsed);
        assert_eq!(zone.zone_state(), ZoneState::Activating);
        assert_eq!(timers.pending(), 1);

        timers.advance(T);
        assert_eq!(zone.zone_state(), ZoneState::Active);
    }

    #[test]
    fn test_external_activation_is_idempotent_per_source() {
        let (timers, zone, rx) = setup(T, T);

        assert!(zone.activate_from_external_source("door-1"));
        assert_eq!(zone.zone_state(), ZoneState::Activating);
        payloads(&rx);

        assert!(!zone.activate_from_external_source("door-1"));
        assert!(payloads(&rx).is_empty());
        assert_eq!(timers.pending(), 1);

        timers.advance(T);
        assert_eq!(zone.zone_state(), ZoneState::Active);
        payloads(&rx);

        assert!(zone.activate_from_external_source("door-2"));
        assert_eq!(states(&zone), (ZoneState::Active, AlarmState::None));
        assert!(payloads(&rx).is_empty());
        assert_eq!(zone.active_sources(), vec!["door-1".to_string(), "door-2".to_string()]);
    }

    #[test]
    fn test_blank_source_is_ignored() {
        let (_timers, zone, _rx) = setup(T, T);
        assert!(!zone.activate_from_external_source("   "));
        assert_eq!(zone.zone_state(), ZoneState::Inactive);
        assert!(zone.active_sources().is_empty());
    }

    #[test]
    fn test_known_source_deactivates_even_with_others_registered() {
        let (_timers, zone, _rx) = setup(Duration::ZERO, Duration::ZERO);
        zone.activate_from_external_source("a");
        zone.activate_from_external_source("b");
        assert_eq!(zone.zone_state(), ZoneState::Active);

        assert!(zone.deactivate_from_external_source("a"));
        assert_eq!(zone.zone_state(), ZoneState::Inactive);
        assert_eq!(zone.active_sources(), vec!["b".to_string()]);
    }

    /// Drives a fresh zone into one of its five observable states
    fn arrange(stage: usize, timers: &VirtualTimerFactory, zone: &HazardZone) {
        if stage >= 1 {
            zone.manually_activate();
        }
        if stage >= 2 {
            timers.advance(T);
        }
        if stage >= 3 {
            zone.handle_person_created("p1", Location::new(1.0, 1.0));
        }
        if stage >= 4 {
            timers.advance(T);
        }
    }

    #[test]
    fn test_unknown_source_deactivation_never_changes_state() {
        let expected = [
            (ZoneState::Inactive, AlarmState::None),
            (ZoneState::Activating, AlarmState::None),
            (ZoneState::Active, AlarmState::None),
            (ZoneState::Active, AlarmState::PreAlarm),
            (ZoneState::Active, AlarmState::Alarm),
        ];

        for (stage, expected) in expected.into_iter().enumerate() {
            let (timers, zone, _rx) = setup(T, T);
            zone.activate_from_external_source("known");
            zone.manually_deactivate();
            arrange(stage, &timers, &zone);
            assert_eq!(states(&zone), expected);

            assert!(!zone.deactivate_from_external_source("never-registered"));
            assert_eq!(states(&zone), expected);
        }
    }

    #[test]
    fn test_location_changes_drive_membership() {
        let (_timers, zone, rx) = setup(Duration::ZERO, Duration::ZERO);

        zone.handle_person_created("p1", Location::new(15.0, 5.0));
        assert_eq!(zone.person_count(), 0);

        zone.handle_person_location_changed("p1", Location::new(5.0, 5.0));
        zone.handle_person_location_changed("p1", Location::new(6.0, 5.0));
        assert!(zone.contains_person("p1"));

        zone.handle_person_location_changed("p1", Location::new(12.0, 5.0));
        assert!(!zone.contains_person("p1"));

        zone.handle_person_expired("p1");
        zone.handle_person_location_changed("p2", Location::new(20.0, 20.0));

        assert_eq!(
            payloads(&rx),
            vec![
                EventPayload::PersonAddedToHazardZone {
                    zone: "Z1".into(),
                    person_id: "p1".into()
                },
                EventPayload::PersonRemovedFromHazardZone {
                    zone: "Z1".into(),
                    person_id: "p1".into()
                },
            ]
        );
    }

    #[test]
    fn test_dispose_releases_pending_timer() {
        let (timers, zone, _rx) = setup(T, T);
        zone.manually_activate();
        assert_eq!(timers.pending(), 1);

        zone.dispose();
        assert_eq!(timers.pending(), 0);

        timers.advance(T * 2);
        assert_eq!(zone.zone_state(), ZoneState::Activating);
        zone.manually_deactivate();
        assert_eq!(zone.zone_state(), ZoneState::Activating);
    }

    #[test]
    fn test_concurrent_operations_keep_alarm_consistent() {
        let (_timers, zone, _rx) = setup(Duration::ZERO, Duration::ZERO);
        zone.set_allowed_number_of_persons(3);
        zone.manually_activate();

        let consistent = |s: &ZoneSnapshot| {
            s.zone_state == ZoneState::Active
                && (s.alarm_state == AlarmState::Alarm) == (s.person_count > s.allowed_number_of_persons)
        };

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let zone = &zone;
                scope.spawn(move || {
                    for round in 0..200 {
                        let id = format!("w{}-{}", worker, round % 5);
                        zone.handle_person_created(&id, Location::new(5.0, 5.0));
                        assert!(consistent(&zone.snapshot()));

                        zone.set_allowed_number_of_persons(((worker + round) % 7) as i32);
                        assert!(consistent(&zone.snapshot()));

                        zone.handle_person_location_changed(&id, Location::new(50.0, 50.0));
                        assert!(consistent(&zone.snapshot()));

                        zone.handle_person_expired(&id);
                        assert!(consistent(&zone.snapshot()));
                    }
                });
            }
        });

        assert_eq!(zone.person_count(), 0);
        assert_eq!(zone.alarm_state(), AlarmState::None);
    }
}
