// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Core module - time, timers, the event bus and the engine that wires
//! floors to hazard zones

mod clock;
mod engine;
mod event_bus;
mod timer;
mod virtual_time;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::Engine;
pub use event_bus::{DeliveryMode, Event, EventBus, EventPayload, Subscriber, SubscriptionId};
pub use timer::{ElapsedHandler, Timer, TimerFactory, TokioTimer, TokioTimerFactory};
pub use virtual_time::VirtualTimerFactory;

pub(crate) use clock::{add_duration, elapsed_since};

use std::sync::Arc;

/// Clock and timer factory handed to every time-dependent entity
#[derive(Clone)]
pub struct TimeSource {
    pub clock: Arc<dyn Clock>,
    pub timers: Arc<dyn TimerFactory>,
}

impl TimeSource {
    pub fn new(clock: Arc<dyn Clock>, timers: Arc<dyn TimerFactory>) -> Self {
        Self { clock, timers }
    }

    /// Wall clock with timers running as tokio tasks
    pub fn system() -> crate::Result<Self> {
        let timers = TokioTimerFactory::system()?;
        Ok(Self::new(Arc::new(SystemClock), Arc::new(timers)))
    }
}

impl std::fmt::Debug for TimeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeSource").finish_non_exhaustive()
    }
}
