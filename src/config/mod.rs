// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Configuration module

mod validation;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::core::DeliveryMode;
use crate::geometry::{Location, Outline};
use crate::tracking::DEFAULT_PERSON_LIFESPAN;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Application version
    pub version: String,

    /// Log level
    pub log_level: String,

    /// Enable demo mode (simulated walkers)
    pub demo_mode: bool,

    /// Event delivery
    pub events: EventsConfig,

    /// Person tracking
    pub tracking: TrackingConfig,

    /// Extra checks applied by [`Config::validate`]
    pub validation: ValidationConfig,

    /// Demo walk simulator
    pub simulator: SimulatorConfig,

    /// Building layout
    pub floors: Vec<FloorConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "HazardWatch".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            demo_mode: true,
            events: EventsConfig::default(),
            tracking: TrackingConfig::default(),
            validation: ValidationConfig::default(),
            simulator: SimulatorConfig::default(),
            floors: vec![FloorConfig::demo()],
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("hazardwatch"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Checks the building layout, reporting every broken rule at once
    pub fn validate(&self) -> crate::Result<()> {
        let violations = validation::violations(self);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(crate::Error::InvalidConfiguration(violations))
        }
    }
}

/// Event delivery configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub delivery: DeliveryMode,
}

/// Person tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Silence after which a person is dropped from a floor
    pub person_lifespan_ms: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            person_lifespan_ms: DEFAULT_PERSON_LIFESPAN.as_millis() as u64,
        }
    }
}

impl TrackingConfig {
    pub fn person_lifespan(&self) -> Duration {
        Duration::from_millis(self.person_lifespan_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Require every zone to lie within its floor's outline
    pub require_zone_containment: bool,
}

/// Walk simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Walkers per floor
    pub persons: usize,

    /// Interval between movement ticks
    pub tick_ms: u64,

    /// Largest move per axis per tick
    pub step: f64,

    /// Fixed seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            persons: 8,
            tick_ms: 500,
            step: 1.5,
            seed: None,
        }
    }
}

impl SimulatorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

/// One floor and the hazard zones drawn on it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloorConfig {
    pub name: String,
    pub outline: Vec<[f64; 2]>,
    #[serde(default)]
    pub hazard_zones: Vec<HazardZoneConfig>,
}

impl FloorConfig {
    pub fn outline(&self) -> crate::Result<Outline> {
        build_outline(&self.outline)
    }

    fn demo() -> Self {
        Self {
            name: "Ground floor".to_string(),
            outline: vec![[0.0, 0.0], [40.0, 0.0], [40.0, 25.0], [0.0, 25.0]],
            hazard_zones: vec![
                HazardZoneConfig {
                    name: "Press line".to_string(),
                    outline: vec![[2.0, 2.0], [14.0, 2.0], [14.0, 12.0], [2.0, 12.0]],
                    activation_duration_ms: 5_000,
                    pre_alarm_duration_ms: 3_000,
                    allowed_number_of_persons: 1,
                    start_active: true,
                },
                HazardZoneConfig {
                    name: "Loading dock".to_string(),
                    outline: vec![[24.0, 10.0], [38.0, 10.0], [38.0, 23.0], [24.0, 23.0]],
                    activation_duration_ms: 0,
                    pre_alarm_duration_ms: 5_000,
                    allowed_number_of_persons: 2,
                    start_active: true,
                },
            ],
        }
    }
}

/// A hazard zone as declared in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardZoneConfig {
    pub name: String,
    pub outline: Vec<[f64; 2]>,
    #[serde(default)]
    pub activation_duration_ms: u64,
    #[serde(default)]
    pub pre_alarm_duration_ms: u64,
    #[serde(default)]
    pub allowed_number_of_persons: u32,
    /// Manually activate once the engine is built
    #[serde(default)]
    pub start_active: bool,
}

impl HazardZoneConfig {
    pub fn outline(&self) -> crate::Result<Outline> {
        build_outline(&self.outline)
    }

    pub fn activation_duration(&self) -> Duration {
        Duration::from_millis(self.activation_duration_ms)
    }

    pub fn pre_alarm_duration(&self) -> Duration {
        Duration::from_millis(self.pre_alarm_duration_ms)
    }
}

fn build_outline(points: &[[f64; 2]]) -> crate::Result<Outline> {
    Outline::new(points.iter().copied().map(Location::from))
}
