// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Hazard-zone phases and the transition function between them

use super::{AlarmState, ZoneState};

/// The five concrete behaviours of a hazard zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Inactive,
    Activating,
    /// Active, occupancy within the allowed number
    Monitoring,
    PreAlarm,
    Alarm,
}

impl Phase {
    pub(crate) fn zone_state(self) -> ZoneState {
        match self {
            Phase::Inactive => ZoneState::Inactive,
            Phase::Activating => ZoneState::Activating,
            Phase::Monitoring | Phase::PreAlarm | Phase::Alarm => ZoneState::Active,
        }
    }

    pub(crate) fn alarm_state(self) -> AlarmState {
        match self {
            Phase::PreAlarm => AlarmState::PreAlarm,
            Phase::Alarm => AlarmState::Alarm,
            Phase::Inactive | Phase::Activating | Phase::Monitoring => AlarmState::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    Activate,
    Deactivate,
    /// Person count or allowed number changed
    OccupancyChanged,
    ActivationElapsed,
    PreAlarmElapsed,
}

/// Zone facts the transition depends on, sampled under the zone lock
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Conditions {
    pub overcrowded: bool,
    pub activation_delay: bool,
    pub pre_alarm_delay: bool,
}

/// Next phase for `trigger`, or `None` when the trigger is ignored.
///
/// A zone always becomes active without an alarm. Crowding present at that
/// moment escalates only on the next occupancy change.
pub(crate) fn transition(phase: Phase, trigger: Trigger, c: Conditions) -> Option<Phase> {
    use Phase::*;
    use Trigger::*;

    match phase {
        Inactive => match trigger {
            Activate if c.activation_delay => Some(Activating),
            Activate => Some(Monitoring),
            Deactivate | OccupancyChanged | ActivationElapsed | PreAlarmElapsed => None,
        },
        Activating => match trigger {
            ActivationElapsed => Some(Monitoring),
            Deactivate => Some(Inactive),
            Activate | OccupancyChanged | PreAlarmElapsed => None,
        },
        Monitoring => match trigger {
            OccupancyChanged if c.overcrowded => Some(escalate(c)),
            Deactivate => Some(Inactive),
            Activate | OccupancyChanged | ActivationElapsed | PreAlarmElapsed => None,
        },
        PreAlarm => match trigger {
            PreAlarmElapsed => Some(Alarm),
            OccupancyChanged if !c.overcrowded => Some(Monitoring),
            Deactivate => Some(Inactive),
            Activate | OccupancyChanged | ActivationElapsed => None,
        },
        Alarm => match trigger {
            OccupancyChanged if !c.overcrowded => Some(Monitoring),
            Deactivate => Some(Inactive),
            Activate | OccupancyChanged | ActivationElapsed | PreAlarmElapsed => None,
        },
    }
}

fn escalate(c: Conditions) -> Phase {
    if c.pre_alarm_delay {
        Phase::PreAlarm
    } else {
        Phase::Alarm
    }
}
