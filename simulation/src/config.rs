//! TOML configuration of a simulation.
//!
//! Every section is optional. Missing keys fall back to the built-in
//! defaults, so an empty document yields a working setup. Durations are
//! expressed in whole milliseconds.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use skirmish_system_builder::BuilderConfig;
use skirmish_system_combat::StrategyKind;
use skirmish_system_harvesting::HarvesterConfig;
use skirmish_world::WorldConfig;
use thiserror::Error;

use crate::{Archetype, CombatStats, UnitProfile};

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration at {}", path.display())]
    Io {
        /// Location that was read.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// The document is not valid TOML or does not match the schema.
    #[error("failed to parse configuration")]
    Parse(#[from] toml::de::Error),
    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete configuration of a simulation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Grid geometry.
    pub grid: GridSection,
    /// Harvester tunables shared by every worker.
    pub harvester: HarvesterSection,
    /// Builder tunables shared by every worker.
    pub builder: BuilderSection,
    /// Per-archetype stat overrides.
    pub units: UnitsSection,
}

impl SimConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the TOML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Checks value ranges that the schema alone cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.grid.cell_size.is_finite() || self.grid.cell_size <= 0.0 {
            return Err(invalid(format!(
                "grid.cell_size must be positive, got {}",
                self.grid.cell_size
            )));
        }
        if self.harvester.capacity == 0 || self.harvester.harvest_amount == 0 {
            return Err(invalid(
                "harvester.capacity and harvester.harvest_amount must be positive".to_owned(),
            ));
        }
        if self.builder.build_amount == 0 {
            return Err(invalid("builder.build_amount must be positive".to_owned()));
        }

        for archetype in Archetype::ALL {
            let profile = self.units.profile(archetype);
            let name = archetype.name();
            if !profile.speed.is_finite() || profile.speed < 0.0 {
                return Err(invalid(format!("units.{name}.speed must not be negative")));
            }
            if profile.max_health == 0 {
                return Err(invalid(format!("units.{name}.max_health must be positive")));
            }
            let Some(combat) = profile.combat else {
                if self.units.overrides(archetype).sets_combat() {
                    return Err(invalid(format!(
                        "units.{name} does not fight and takes no combat keys"
                    )));
                }
                continue;
            };
            if !combat.base_range.is_finite() || combat.base_range <= 0.0 {
                return Err(invalid(format!("units.{name}.base_range must be positive")));
            }
            if combat.strategy == StrategyKind::Projectile
                && (!combat.projectile_speed.is_finite() || combat.projectile_speed <= 0.0)
            {
                return Err(invalid(format!(
                    "units.{name}.projectile_speed must be positive for projectile units"
                )));
            }
        }
        Ok(())
    }

    /// World parameters derived from the grid section.
    #[must_use]
    pub fn world(&self) -> WorldConfig {
        WorldConfig {
            cell_size: self.grid.cell_size,
            search_radius: self.grid.search_radius,
        }
    }
}

fn invalid(reason: String) -> ConfigError {
    ConfigError::Invalid(reason)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// `[grid]` section.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridSection {
    /// Edge length of a cell in world units.
    pub cell_size: f32,
    /// Ring bound of the nearest-free-cell search.
    pub search_radius: u32,
}

impl Default for GridSection {
    fn default() -> Self {
        let world = WorldConfig::default();
        Self {
            cell_size: world.cell_size,
            search_radius: world.search_radius,
        }
    }
}

/// `[harvester]` section.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvesterSection {
    /// Amount carried before a deposit trip.
    pub capacity: u32,
    /// Amount requested per harvest action.
    pub harvest_amount: u32,
    /// Time between harvest actions.
    pub harvest_cooldown_ms: u64,
    /// Reach beyond a node's interaction radius.
    pub harvest_range: f32,
    /// Radius scanned for replacement nodes.
    pub search_radius: f32,
    /// Reach beyond a deposit point's interaction radius.
    pub deposit_range: f32,
    /// Delay before retrying a failed slot reservation.
    pub retry_cooldown_ms: u64,
    /// Stopping distance of approach moves.
    pub stopping_distance: f32,
}

impl HarvesterSection {
    /// Runtime form of the section.
    #[must_use]
    pub fn to_config(&self) -> HarvesterConfig {
        HarvesterConfig {
            capacity: self.capacity,
            harvest_amount: self.harvest_amount,
            harvest_cooldown: Duration::from_millis(self.harvest_cooldown_ms),
            harvest_range: self.harvest_range,
            search_radius: self.search_radius,
            deposit_range: self.deposit_range,
            retry_cooldown: Duration::from_millis(self.retry_cooldown_ms),
            stopping_distance: self.stopping_distance,
        }
    }
}

impl Default for HarvesterSection {
    fn default() -> Self {
        let config = HarvesterConfig::default();
        Self {
            capacity: config.capacity,
            harvest_amount: config.harvest_amount,
            harvest_cooldown_ms: millis(config.harvest_cooldown),
            harvest_range: config.harvest_range,
            search_radius: config.search_radius,
            deposit_range: config.deposit_range,
            retry_cooldown_ms: millis(config.retry_cooldown),
            stopping_distance: config.stopping_distance,
        }
    }
}

/// `[builder]` section.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuilderSection {
    /// Work applied per build action.
    pub build_amount: u32,
    /// Time between build actions.
    pub build_cooldown_ms: u64,
    /// Reach beyond a site's interaction radius.
    pub build_range: f32,
    /// Delay before retrying when every slot is taken.
    pub retry_cooldown_ms: u64,
    /// Stopping distance of approach moves.
    pub stopping_distance: f32,
}

impl BuilderSection {
    /// Runtime form of the section.
    #[must_use]
    pub fn to_config(&self) -> BuilderConfig {
        BuilderConfig {
            build_amount: self.build_amount,
            build_cooldown: Duration::from_millis(self.build_cooldown_ms),
            build_range: self.build_range,
            retry_cooldown: Duration::from_millis(self.retry_cooldown_ms),
            stopping_distance: self.stopping_distance,
        }
    }
}

impl Default for BuilderSection {
    fn default() -> Self {
        let config = BuilderConfig::default();
        Self {
            build_amount: config.build_amount,
            build_cooldown_ms: millis(config.build_cooldown),
            build_range: config.build_range,
            retry_cooldown_ms: millis(config.retry_cooldown),
            stopping_distance: config.stopping_distance,
        }
    }
}

/// `[units]` section holding one optional table per archetype.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UnitsSection {
    /// `[units.worker]`.
    pub worker: UnitOverrides,
    /// `[units.soldier]`.
    pub soldier: UnitOverrides,
    /// `[units.archer]`.
    pub archer: UnitOverrides,
    /// `[units.catapult]`.
    pub catapult: UnitOverrides,
}

impl UnitsSection {
    /// Stats of `archetype` with the configured overrides applied.
    #[must_use]
    pub fn profile(&self, archetype: Archetype) -> UnitProfile {
        self.overrides(archetype).apply(archetype.defaults())
    }

    /// Table configured for `archetype`.
    #[must_use]
    pub fn overrides(&self, archetype: Archetype) -> &UnitOverrides {
        match archetype {
            Archetype::Worker => &self.worker,
            Archetype::Soldier => &self.soldier,
            Archetype::Archer => &self.archer,
            Archetype::Catapult => &self.catapult,
        }
    }
}

/// Per-archetype stats; keys left out keep the archetype's defaults.
///
/// Combat keys only apply to archetypes that fight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UnitOverrides {
    /// Travel speed in world units per second.
    pub speed: Option<f32>,
    /// Hit points on spawn.
    pub max_health: Option<u32>,
    /// Footprint edge length in cells.
    pub footprint: Option<u32>,
    /// Engagement policy.
    pub strategy: Option<StrategyKind>,
    /// Distance from which attacks can be made.
    pub base_range: Option<f32>,
    /// Hit points removed per attack.
    pub damage: Option<u32>,
    /// Radius scanned for replacement targets.
    pub chase_radius: Option<f32>,
    /// Time between attacks.
    pub cooldown_ms: Option<u64>,
    /// Wind-up before a projectile launches.
    pub spawn_delay_ms: Option<u64>,
    /// Projectile speed in world units per second.
    pub projectile_speed: Option<f32>,
}

impl UnitOverrides {
    /// Layers the overrides on top of `base`.
    #[must_use]
    pub fn apply(&self, base: UnitProfile) -> UnitProfile {
        UnitProfile {
            speed: self.speed.unwrap_or(base.speed),
            max_health: self.max_health.unwrap_or(base.max_health),
            footprint: self.footprint.unwrap_or(base.footprint),
            combat: base.combat.map(|stats| self.apply_combat(stats)),
        }
    }

    /// Reports whether any combat key is set.
    #[must_use]
    pub fn sets_combat(&self) -> bool {
        self.strategy.is_some()
            || self.base_range.is_some()
            || self.damage.is_some()
            || self.chase_radius.is_some()
            || self.cooldown_ms.is_some()
            || self.spawn_delay_ms.is_some()
            || self.projectile_speed.is_some()
    }

    fn apply_combat(&self, base: CombatStats) -> CombatStats {
        CombatStats {
            strategy: self.strategy.unwrap_or(base.strategy),
            base_range: self.base_range.unwrap_or(base.base_range),
            damage: self.damage.unwrap_or(base.damage),
            chase_radius: self.chase_radius.unwrap_or(base.chase_radius),
            cooldown: self
                .cooldown_ms
                .map_or(base.cooldown, Duration::from_millis),
            spawn_delay: self
                .spawn_delay_ms
                .map_or(base.spawn_delay, Duration::from_millis),
            projectile_speed: self.projectile_speed.unwrap_or(base.projectile_speed),
        }
    }
}
