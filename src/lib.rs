// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! HazardWatch - floor occupancy tracking and hazard-zone alarms
//!
//! Positioning systems report where persons are on a floor. Floors keep the
//! persons last seen inside their outline and forget anyone who goes quiet.
//! Hazard zones drawn on a floor count the persons inside them and escalate
//! from pre-alarm to alarm when more are present than allowed.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Engine                           │
//! ├──────────────────────────────────────────────────────────┤
//! │  location updates                                        │
//! │        ↓                                                 │
//! │  ┌─────────┐  owns   ┌─────────┐                         │
//! │  │  Floor  │ ──────→ │ Person  │ (expiry timer)          │
//! │  └─────────┘         └─────────┘                         │
//! │        ↓ added / moved / removed                         │
//! │  ┌─────────────────────────────────────────────────┐     │
//! │  │                   Event Bus                     │     │
//! │  └─────────────────────────────────────────────────┘     │
//! │        ↓ routed per floor            ↑ state changes     │
//! │  ┌────────────────────────────────────────────┐          │
//! │  │  HazardZone  Inactive → Activating → Active│          │
//! │  │              None → PreAlarm → Alarm       │          │
//! │  └────────────────────────────────────────────┘          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Time is injected through [`core::TimeSource`]; tests drive it with
//! [`core::VirtualTimerFactory`].

pub mod config;
pub mod core;
pub mod error;
pub mod geometry;
pub mod tracking;
pub mod zones;

// Re-exports for convenience
pub use config::Config;
pub use core::{Engine, EventBus, TimeSource};
pub use error::{ConfigViolation, Error, Result};
pub use geometry::{Location, Outline};
pub use tracking::{Floor, Person, PersonLocationUpdate};
pub use zones::{AlarmState, HazardZone, ZoneSnapshot, ZoneState};

/// HazardWatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// HazardWatch name
pub const NAME: &str = "HazardWatch";
