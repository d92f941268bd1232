// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Event bus for inter-component communication

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::clock::Clock;
use crate::geometry::Location;
use crate::tracking::PersonId;
use crate::zones::{AlarmState, ZoneState};

/// How published events reach subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Subscribers run on the publishing thread, before `publish` returns
    #[default]
    Inline,
    /// A single background thread delivers events in publish order
    Queued,
}

/// Generic event wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    PersonLocationChanged { floor: String, person_id: PersonId, location: Location },
    PersonExpired { floor: String, person_id: PersonId },
    PersonAddedToFloor { floor: String, person_id: PersonId, location: Location },
    PersonRemovedFromFloor { floor: String, person_id: PersonId },
    PersonAddedToHazardZone { zone: String, person_id: PersonId },
    PersonRemovedFromHazardZone { zone: String, person_id: PersonId },
    ZoneStateChanged { zone: String, state: ZoneState },
    AlarmStateChanged { zone: String, state: AlarmState },
    ActivationStarted { zone: String },
    Activated { zone: String },
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Subscriber = Arc<dyn Fn(&Event) + Send + Sync + 'static>;

type Subscribers = RwLock<Vec<(SubscriptionId, Subscriber)>>;

struct Worker {
    sender: Option<Sender<Event>>,
    handle: Option<JoinHandle<()>>,
    thread_id: Option<ThreadId>,
}

/// Explicitly constructed pub/sub channel shared by floors, zones and
/// whatever projects their notifications.
pub struct EventBus {
    clock: Arc<dyn Clock>,
    mode: DeliveryMode,
    subscribers: Arc<Subscribers>,
    event_counter: AtomicU64,
    subscription_counter: AtomicU64,
    // Held across id assignment and enqueue so ids follow queue order.
    worker: Mutex<Worker>,
}

impl EventBus {
    pub fn new(mode: DeliveryMode, clock: Arc<dyn Clock>) -> Self {
        let subscribers: Arc<Subscribers> = Arc::new(RwLock::new(Vec::new()));
        let mut worker = Worker {
            sender: None,
            handle: None,
            thread_id: None,
        };

        if mode == DeliveryMode::Queued {
            let (tx, rx) = channel::unbounded::<Event>();
            let consumers = subscribers.clone();
            let spawned = thread::Builder::new()
                .name("hazardwatch-events".to_string())
                .spawn(move || {
                    for event in rx.iter() {
                        dispatch(&consumers, &event);
                    }
                    debug!("Event consumer stopped");
                });

            match spawned {
                Ok(handle) => {
                    worker.thread_id = Some(handle.thread().id());
                    worker.handle = Some(handle);
                    worker.sender = Some(tx);
                }
                Err(e) => error!("Failed to spawn event consumer, delivering inline: {}", e),
            }
        }

        Self {
            clock,
            mode,
            subscribers,
            event_counter: AtomicU64::new(0),
            subscription_counter: AtomicU64::new(0),
            worker: Mutex::new(worker),
        }
    }

    pub fn inline(clock: Arc<dyn Clock>) -> Self {
        Self::new(DeliveryMode::Inline, clock)
    }

    pub fn queued(clock: Arc<dyn Clock>) -> Self {
        Self::new(DeliveryMode::Queued, clock)
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn publish(&self, payload: EventPayload) {
        let worker = self.worker.lock();
        let event = Event {
            id: self.event_counter.fetch_add(1, Ordering::Relaxed) + 1,
            timestamp: self.clock.utc_now(),
            payload,
        };

        if let Some(sender) = &worker.sender {
            if sender.send(event).is_err() {
                debug!("Event consumer gone, dropping event");
            }
            return;
        }

        drop(worker);
        dispatch(&self.subscribers, &event);
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.subscription_counter.fetch_add(1, Ordering::Relaxed) + 1);
        self.subscribers.write().push((id, Arc::new(handler)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Subscribes a channel that receives a copy of every event.
    ///
    /// Dropping the receiver does not unsubscribe; pass the returned id to
    /// [`EventBus::unsubscribe`] when done.
    pub fn subscribe_channel(&self) -> (SubscriptionId, Receiver<Event>) {
        let (tx, rx) = channel::unbounded();
        let id = self.subscribe(move |event| {
            if tx.send(event.clone()).is_err() {
                debug!("Channel receiver dropped, discarding event {}", event.id);
            }
        });
        (id, rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Stops the background consumer after it drains queued events
    pub fn shutdown(&self) {
        let (handle, thread_id) = {
            let mut worker = self.worker.lock();
            worker.sender = None;
            (worker.handle.take(), worker.thread_id)
        };

        if let Some(handle) = handle {
            // The consumer cannot wait for itself.
            if thread_id != Some(thread::current().id()) {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn dispatch(subscribers: &Subscribers, event: &Event) {
    // Snapshot so handlers may subscribe or unsubscribe while running.
    let handlers: Vec<Subscriber> = subscribers
        .read()
        .iter()
        .map(|(_, handler)| handler.clone())
        .collect();

    for handler in handlers {
        handler(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;
    use std::time::Duration;

    fn payload(zone: &str) -> EventPayload {
        EventPayload::Activated {
            zone: zone.to_string(),
        }
    }

    #[test]
    fn test_inline_delivery_is_synchronous() {
        let bus = EventBus::inline(Arc::new(ManualClock::at_epoch()));
        let (_, rx) = bus.subscribe_channel();

        bus.publish(payload("z1"));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.id, 1);
        assert_eq!(event.payload, payload("z1"));
    }

    #[test]
    fn test_queued_delivery_preserves_order() {
        let bus = EventBus::queued(Arc::new(ManualClock::at_epoch()));
        let (_, rx) = bus.subscribe_channel();

        for i in 0..100 {
            bus.publish(payload(&format!("z{}", i)));
        }

        let ids: Vec<u64> = (0..100)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap().id)
            .collect();
        assert_eq!(ids, (1..=100).collect::<Vec<_>>());
    }

    #[test]
    fn test_queued_delivery_runs_on_consumer_thread() {
        let bus = EventBus::queued(Arc::new(ManualClock::at_epoch()));
        let (tx, rx) = channel::unbounded();
        bus.subscribe(move |_| {
            let _ = tx.send(thread::current().id());
        });

        bus.publish(payload("z"));

        let consumer = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(consumer, thread::current().id());
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::inline(Arc::new(ManualClock::at_epoch()));
        let (_, rx) = bus.subscribe_channel();
        let (tx, other) = channel::unbounded();
        let id = bus.subscribe(move |e| {
            let _ = tx.send(e.id);
        });
        assert_eq!(bus.subscriber_count(), 2);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(payload("z"));

        assert!(rx.try_recv().is_ok());
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn test_channel_subscription_can_be_removed() {
        let bus = EventBus::inline(Arc::new(ManualClock::at_epoch()));
        let (id, rx) = bus.subscribe_channel();
        bus.publish(payload("a"));

        assert!(bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(payload("b"));

        assert_eq!(rx.try_iter().map(|e| e.payload).collect::<Vec<_>>(), vec![payload("a")]);
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let bus = EventBus::queued(Arc::new(ManualClock::at_epoch()));
        let (_, rx) = bus.subscribe_channel();
        bus.publish(payload("a"));
        bus.publish(payload("b"));

        bus.shutdown();

        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn test_payload_serializes_with_type_tag() {
        let json = serde_json::to_value(payload("z1")).unwrap();
        assert_eq!(json["type"], "activated");
        assert_eq!(json["zone"], "z1");
    }
}
