//! Session tuning knobs with serde defaults and range validation.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    AUTO_MOVE_STAY_CHANCE, DEFAULT_ACTION_POINTS, DEFAULT_MAX_DAYS, DEFAULT_REGION_SIZE,
    DEFAULT_ROSTER_SIZE, DEFAULT_SITE_COUNT, FORBIDDEN_REGION_PENALTY, INTRIGUE_CONTAGION_CHANCE,
    INTRIGUE_CURE_CHANCE, STORM_SKIP_CHANCE, SUNRISE_EXPOSURE_LOSS,
};

/// Configuration applied to every session built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "SessionConfig::default_max_days")]
    pub max_days: u32,
    #[serde(default = "SessionConfig::default_base_action_points")]
    pub base_action_points: u32,
    #[serde(default = "SessionConfig::default_roster_size")]
    pub roster_size: usize,
    #[serde(default = "SessionConfig::default_site_count")]
    pub site_count: u8,
    #[serde(default = "SessionConfig::default_region_size")]
    pub region_size: u8,
    /// Sanity lost when an arrival is bounced out of a forbidden region.
    #[serde(default = "SessionConfig::default_forbidden_penalty")]
    pub forbidden_penalty: i32,
    /// Sanity lost at sunrise by everyone outside the station.
    #[serde(default = "SessionConfig::default_exposure_loss")]
    pub exposure_loss: i32,
    #[serde(default = "SessionConfig::default_stay_chance")]
    pub stay_chance: f64,
    #[serde(default = "SessionConfig::default_contagion_chance")]
    pub contagion_chance: f64,
    #[serde(default = "SessionConfig::default_cure_chance")]
    pub cure_chance: f64,
    #[serde(default = "SessionConfig::default_storm_skip_chance")]
    pub storm_skip_chance: f64,
    /// Corrupt one random roster member when the scenario is built.
    #[serde(default = "SessionConfig::default_seed_intrigue")]
    pub seed_intrigue: bool,
}

/// Validation failures for [`SessionConfig`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: f64,
        value: f64,
    },
    #[error("{field} must be between {min:.2} and {max:.2} (got {value:.2})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{site_count} sites cannot be split into regions of {region_size}")]
    RegionLayout { site_count: u8, region_size: u8 },
    #[error("config could not be parsed: {0}")]
    Parse(String),
}

impl SessionConfig {
    const fn default_max_days() -> u32 {
        DEFAULT_MAX_DAYS
    }

    const fn default_base_action_points() -> u32 {
        DEFAULT_ACTION_POINTS
    }

    const fn default_roster_size() -> usize {
        DEFAULT_ROSTER_SIZE
    }

    const fn default_site_count() -> u8 {
        DEFAULT_SITE_COUNT
    }

    const fn default_region_size() -> u8 {
        DEFAULT_REGION_SIZE
    }

    const fn default_forbidden_penalty() -> i32 {
        FORBIDDEN_REGION_PENALTY
    }

    const fn default_exposure_loss() -> i32 {
        SUNRISE_EXPOSURE_LOSS
    }

    const fn default_stay_chance() -> f64 {
        AUTO_MOVE_STAY_CHANCE
    }

    const fn default_contagion_chance() -> f64 {
        INTRIGUE_CONTAGION_CHANCE
    }

    const fn default_cure_chance() -> f64 {
        INTRIGUE_CURE_CHANCE
    }

    const fn default_storm_skip_chance() -> f64 {
        STORM_SKIP_CHANCE
    }

    const fn default_seed_intrigue() -> bool {
        true
    }

    /// Parse a configuration from JSON and validate it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed JSON and the first
    /// violated bound otherwise.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate configuration bounds.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        min_u64("max_days", u64::from(self.max_days), 1)?;
        min_u64("base_action_points", u64::from(self.base_action_points), 1)?;
        min_u64(
            "roster_size",
            u64::try_from(self.roster_size).unwrap_or(u64::MAX),
            1,
        )?;
        if self.site_count < 3 {
            return Err(ConfigError::MinViolation {
                field: "site_count",
                min: 3.0,
                value: f64::from(self.site_count),
            });
        }
        if self.region_size == 0 || self.site_count % self.region_size != 0 {
            return Err(ConfigError::RegionLayout {
                site_count: self.site_count,
                region_size: self.region_size,
            });
        }
        if self.forbidden_penalty < 0 {
            return Err(ConfigError::MinViolation {
                field: "forbidden_penalty",
                min: 0.0,
                value: f64::from(self.forbidden_penalty),
            });
        }
        if self.exposure_loss < 0 {
            return Err(ConfigError::MinViolation {
                field: "exposure_loss",
                min: 0.0,
                value: f64::from(self.exposure_loss),
            });
        }
        probability("stay_chance", self.stay_chance)?;
        probability("contagion_chance", self.contagion_chance)?;
        probability("cure_chance", self.cure_chance)?;
        probability("storm_skip_chance", self.storm_skip_chance)?;
        Ok(())
    }

    /// Number of regions the ring is divided into.
    #[must_use]
    pub const fn region_count(&self) -> u8 {
        if self.region_size == 0 {
            0
        } else {
            self.site_count / self.region_size
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_days: Self::default_max_days(),
            base_action_points: Self::default_base_action_points(),
            roster_size: Self::default_roster_size(),
            site_count: Self::default_site_count(),
            region_size: Self::default_region_size(),
            forbidden_penalty: Self::default_forbidden_penalty(),
            exposure_loss: Self::default_exposure_loss(),
            stay_chance: Self::default_stay_chance(),
            contagion_chance: Self::default_contagion_chance(),
            cure_chance: Self::default_cure_chance(),
            storm_skip_chance: Self::default_storm_skip_chance(),
            seed_intrigue: Self::default_seed_intrigue(),
        }
    }
}

fn min_u64(field: &'static str, value: u64, min: u64) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::MinViolation {
            field,
            min: crate::numbers::u64_to_f64(min),
            value: crate::numbers::u64_to_f64(value),
        });
    }
    Ok(())
}

fn probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::RangeViolation {
            field,
            min: 0.0,
            max: 1.0,
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = SessionConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.region_count(), 4);
        assert_eq!(cfg.max_days, 4);
        assert_eq!(cfg.base_action_points, 5);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg = SessionConfig::from_json(r#"{ "max_days": 6 }"#).unwrap();
        assert_eq!(cfg.max_days, 6);
        assert_eq!(cfg.roster_size, 12);
        assert!(cfg.seed_intrigue);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = SessionConfig::from_json(r#"{ "stay_chance": 1.5 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::RangeViolation {
                field: "stay_chance",
                ..
            }
        ));

        let err = SessionConfig::from_json(r#"{ "max_days": 0 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MinViolation {
                field: "max_days",
                ..
            }
        ));

        let err = SessionConfig::from_json(r#"{ "site_count": 10, "region_size": 3 }"#)
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::RegionLayout {
                site_count: 10,
                region_size: 3
            }
        );
    }

    #[test]
    fn malformed_json_reports_parse_error() {
        assert!(matches!(
            SessionConfig::from_json("{ nope"),
            Err(ConfigError::Parse(_))
        ));
    }
}
