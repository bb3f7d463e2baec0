//! Config surface (spec §6): every recognized option and its default,
//! loaded from a YAML document and validated before the engine runs.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PhaseTimings {
    pub setup_period_seconds: u64,
    pub countdown_seconds: u64,
    pub grace_seconds: u64,
    pub active_seconds: u64,
    pub deathmatch_seconds: u64,
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self {
            setup_period_seconds: 120,
            countdown_seconds: 30,
            grace_seconds: 30,
            active_seconds: 600,
            deathmatch_seconds: 180,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ContainerFillConfig {
    pub refill_interval_seconds: u64,
    pub items_per_container_min: u32,
    pub items_per_container_max: u32,
}

impl Default for ContainerFillConfig {
    fn default() -> Self {
        Self {
            refill_interval_seconds: 30,
            items_per_container_min: 4,
            items_per_container_max: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExplosiveConfig {
    pub fuse_ticks: u64,
    pub radius: f64,
    pub base_damage: f64,
    pub fire_duration_ticks: u64,
    pub damage_thrower: bool,
    pub throw_velocity: f64,
    pub cooldown_seconds: u64,
}

impl Default for ExplosiveConfig {
    fn default() -> Self {
        Self {
            fuse_ticks: 60,
            radius: 4.0,
            base_damage: 10.0,
            fire_duration_ticks: 100,
            damage_thrower: false,
            throw_velocity: 1.5,
            cooldown_seconds: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TrackerConfig {
    pub update_period_ticks: u64,
    pub max_range: f64,
    pub close_distance: f64,
    pub medium_distance: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            update_period_ticks: 10,
            max_range: 200.0,
            close_distance: 20.0,
            medium_distance: 75.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub phases: PhaseTimings,
    pub container_fill: ContainerFillConfig,
    pub explosive: ExplosiveConfig,
    pub tracker: TrackerConfig,
}

impl Config {
    pub fn load(source: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.container_fill.items_per_container_min > self.container_fill.items_per_container_max {
            return Err(ValidationError::BadConfigValue {
                key: "items-per-container".to_string(),
                reason: format!(
                    "min {} greater than max {}",
                    self.container_fill.items_per_container_min,
                    self.container_fill.items_per_container_max
                ),
            });
        }
        if self.explosive.radius <= 0.0 {
            return Err(ValidationError::InvalidBounds {
                radius: self.explosive.radius as i64,
            });
        }
        if self.tracker.close_distance > self.tracker.medium_distance {
            return Err(ValidationError::BadConfigValue {
                key: "tracker.close-distance".to_string(),
                reason: "must be <= medium-distance".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_phase_timings() {
        let config = Config::default();
        assert_eq!(config.phases.setup_period_seconds, 120);
        assert_eq!(config.phases.countdown_seconds, 30);
        assert_eq!(config.phases.grace_seconds, 30);
        assert_eq!(config.phases.active_seconds, 600);
        assert_eq!(config.phases.deathmatch_seconds, 180);
    }

    #[test]
    fn load_rejects_inverted_item_bounds() {
        let doc = r#"
container-fill:
  items-per-container-min: 8
  items-per-container-max: 2
"#;
        let err = Config::load(doc);
        assert!(err.is_err());
    }

    #[test]
    fn validate_rejects_nonpositive_explosive_radius() {
        let mut config = Config::default();
        config.explosive.radius = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidBounds { .. })
        ));
    }
}
