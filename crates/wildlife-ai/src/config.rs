//! Tunable parameters for animals.
//!
//! This module provides:
//! - Per-animal movement and idle tunables (`AnimalConfig`)
//! - Prey and predator role tunables
//! - Species tables loaded from TOML with validation on load

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use wildlife_common::{ConfigError, ConfigResult};

use crate::ports::DEFAULT_OVERLAP_LIMIT;

// ============================================================================
// Validation
// ============================================================================

/// Validation result for config blocks.
#[derive(Debug, Clone, Default)]
pub struct ConfigValidation {
    /// Error messages.
    pub errors: Vec<String>,
    /// Warning messages.
    pub warnings: Vec<String>,
}

impl ConfigValidation {
    /// Create empty validation result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error.
    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    /// Add a warning.
    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    /// Check if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Check if there are any warnings.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Merge another validation result, prefixing its messages with `scope`.
    pub fn merge_scoped(&mut self, scope: &str, other: Self) {
        self.errors
            .extend(other.errors.into_iter().map(|e| format!("{scope}: {e}")));
        self.warnings
            .extend(other.warnings.into_iter().map(|w| format!("{scope}: {w}")));
    }

    /// Converts into a `Result`, logging warnings on the way.
    pub fn into_result(self) -> ConfigResult<()> {
        for warning in &self.warnings {
            warn!("Config warning: {warning}");
        }
        if self.is_valid() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(self.errors))
        }
    }

    fn require_positive(&mut self, name: &str, value: f32) {
        if !value.is_finite() || value <= 0.0 {
            self.add_error(&format!("{name} must be a positive number, got {value}"));
        }
    }
}

// ============================================================================
// Animal tunables
// ============================================================================

/// Movement and idle tunables shared by every animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimalConfig {
    /// Radius of random wander destinations.
    pub wander_distance: f32,
    /// Navigation speed outside of a chase.
    pub walk_speed: f32,
    /// Navigation speed while chasing or fleeing.
    pub run_speed: f32,
    /// Longest time spent walking to one destination before giving up.
    pub max_walk_time: f32,
    /// Base idle time; actual waits are drawn from `[idle_time / 2, idle_time * 2]`.
    pub idle_time: f32,
    /// Starting health.
    pub health: i32,
}

impl Default for AnimalConfig {
    fn default() -> Self {
        Self {
            wander_distance: 50.0,
            walk_speed: 50.0,
            run_speed: 100.0,
            max_walk_time: 6.0,
            idle_time: 5.0,
            health: 10,
        }
    }
}

impl AnimalConfig {
    /// Shortest idle wait.
    #[must_use]
    pub fn min_idle_wait(&self) -> f32 {
        self.idle_time / 2.0
    }

    /// Longest idle wait.
    #[must_use]
    pub fn max_idle_wait(&self) -> f32 {
        self.idle_time * 2.0
    }

    /// Validate tunables.
    #[must_use]
    pub fn validate(&self) -> ConfigValidation {
        let mut validation = ConfigValidation::new();

        validation.require_positive("wander_distance", self.wander_distance);
        validation.require_positive("walk_speed", self.walk_speed);
        validation.require_positive("run_speed", self.run_speed);
        validation.require_positive("max_walk_time", self.max_walk_time);
        validation.require_positive("idle_time", self.idle_time);

        if self.health < 1 {
            validation.add_error("health must be at least 1");
        }

        if self.run_speed < self.walk_speed {
            validation.add_warning("run_speed is slower than walk_speed");
        }

        validation
    }
}

/// How a fleeing prey decides it is still in danger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FleeRule {
    /// Keep running while the predator exists and is within detection range.
    #[default]
    PresentAndInRange,
    /// Keep running while the predator exists, or while it is within range.
    ///
    /// An absent predator has no distance, so in practice this runs for as
    /// long as the predator is alive, wherever it is.
    PresentOrInRange,
}

/// Prey role tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreyConfig {
    /// Distance at which an alerting predator is noticed.
    pub detection_range: f32,
    /// Escape projection distance; destinations are sampled within this radius.
    pub escape_max_distance: f32,
    /// Time to wait for an alerting predator to close in before calming down.
    pub alert_timeout: f32,
    /// Danger test used while running away.
    pub flee_rule: FleeRule,
}

impl Default for PreyConfig {
    fn default() -> Self {
        Self {
            detection_range: 10.0,
            escape_max_distance: 80.0,
            alert_timeout: 10.0,
            flee_rule: FleeRule::default(),
        }
    }
}

impl PreyConfig {
    /// Validate tunables.
    #[must_use]
    pub fn validate(&self) -> ConfigValidation {
        let mut validation = ConfigValidation::new();

        validation.require_positive("detection_range", self.detection_range);
        validation.require_positive("escape_max_distance", self.escape_max_distance);
        validation.require_positive("alert_timeout", self.alert_timeout);

        if self.detection_range > self.escape_max_distance {
            validation.add_warning("detection_range exceeds escape_max_distance");
        }

        validation
    }
}

/// Predator role tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredatorConfig {
    /// Radius scanned for prey, and the range past which a pursuit is dropped.
    pub detection_range: f32,
    /// Longest pursuit before giving up.
    pub max_chase_time: f32,
    /// Damage dealt per bite.
    pub bite_damage: i32,
    /// Pause after each bite.
    pub bite_cooldown: f32,
    /// Maximum results requested from one proximity scan.
    pub scan_limit: usize,
}

impl Default for PredatorConfig {
    fn default() -> Self {
        Self {
            detection_range: 20.0,
            max_chase_time: 10.0,
            bite_damage: 3,
            bite_cooldown: 2.0,
            scan_limit: DEFAULT_OVERLAP_LIMIT,
        }
    }
}

impl PredatorConfig {
    /// Validate tunables.
    #[must_use]
    pub fn validate(&self) -> ConfigValidation {
        let mut validation = ConfigValidation::new();

        validation.require_positive("detection_range", self.detection_range);
        validation.require_positive("max_chase_time", self.max_chase_time);
        validation.require_positive("bite_cooldown", self.bite_cooldown);

        if self.bite_damage < 1 {
            validation.add_error("bite_damage must be at least 1");
        }
        if self.scan_limit == 0 {
            validation.add_error("scan_limit must be at least 1");
        }

        validation
    }
}

// ============================================================================
// Species tables
// ============================================================================

/// Tunables for one prey species.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreySpecies {
    /// Shared animal tunables.
    pub animal: AnimalConfig,
    /// Prey tunables.
    pub prey: PreyConfig,
}

/// Tunables for one predator species.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PredatorSpecies {
    /// Shared animal tunables.
    pub animal: AnimalConfig,
    /// Predator tunables.
    pub predator: PredatorConfig,
}

/// Default event bus capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Complete configuration for a wildlife simulation.
///
/// ```toml
/// seed = 7
///
/// [prey.deer.animal]
/// walk_speed = 3.5
///
/// [predators.wolf.predator]
/// bite_damage = 4
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WildlifeConfig {
    /// Seed for the behavior RNG.
    pub seed: u64,
    /// Capacity of the behavior event bus.
    pub event_capacity: usize,
    /// Prey species by name.
    pub prey: BTreeMap<String, PreySpecies>,
    /// Predator species by name.
    pub predators: BTreeMap<String, PredatorSpecies>,
}

impl Default for WildlifeConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            prey: BTreeMap::new(),
            predators: BTreeMap::new(),
        }
    }
}

impl WildlifeConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate().into_result()?;
        debug!(
            "Parsed wildlife config: {} prey species, {} predator species",
            config.prey.len(),
            config.predators.len()
        );
        Ok(config)
    }

    /// Loads and validates a TOML file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded wildlife config from {}", path.display());
        Ok(config)
    }

    /// Loads a TOML file, falling back to defaults when it is missing or invalid.
    #[must_use]
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Using default wildlife config: {e}");
                Self::default()
            },
        }
    }

    /// Looks up a prey species.
    #[must_use]
    pub fn prey_species(&self, name: &str) -> Option<&PreySpecies> {
        self.prey.get(name)
    }

    /// Looks up a predator species.
    #[must_use]
    pub fn predator_species(&self, name: &str) -> Option<&PredatorSpecies> {
        self.predators.get(name)
    }

    /// Validate every species table.
    #[must_use]
    pub fn validate(&self) -> ConfigValidation {
        let mut validation = ConfigValidation::new();

        if self.event_capacity == 0 {
            validation.add_error("event_capacity must be at least 1");
        }

        for (name, species) in &self.prey {
            validation.merge_scoped(&format!("prey.{name}.animal"), species.animal.validate());
            validation.merge_scoped(&format!("prey.{name}.prey"), species.prey.validate());
        }
        for (name, species) in &self.predators {
            validation.merge_scoped(
                &format!("predators.{name}.animal"),
                species.animal.validate(),
            );
            validation.merge_scoped(
                &format!("predators.{name}.predator"),
                species.predator.validate(),
            );
        }

        validation
    }
}
