use std::time::Duration;

use serde::{Deserialize, Serialize};
use skirmish_core::{Faction, Vec3};
use skirmish_system_combat::{CombatProfile, StrategyKind, StrategySpec};
use skirmish_world::AgentSpec;

/// Unit templates available to scenarios.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    /// Gathers resources and raises structures.
    Worker,
    /// Melee fighter.
    Soldier,
    /// Ranged fighter striking instantly.
    Archer,
    /// Siege engine launching slow projectiles.
    Catapult,
}

impl Archetype {
    /// Every archetype in declaration order.
    pub const ALL: [Archetype; 4] = [
        Archetype::Worker,
        Archetype::Soldier,
        Archetype::Archer,
        Archetype::Catapult,
    ];

    /// Lowercase name used in configuration files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Archetype::Worker => "worker",
            Archetype::Soldier => "soldier",
            Archetype::Archer => "archer",
            Archetype::Catapult => "catapult",
        }
    }

    /// Reports whether units of this archetype fight instead of working.
    #[must_use]
    pub fn is_combatant(self) -> bool {
        self.defaults().combat.is_some()
    }

    /// Built-in stats of the archetype.
    #[must_use]
    pub fn defaults(self) -> UnitProfile {
        match self {
            Archetype::Worker => UnitProfile {
                speed: 2.0,
                max_health: 20,
                footprint: 1,
                combat: None,
            },
            Archetype::Soldier => UnitProfile {
                speed: 2.5,
                max_health: 40,
                footprint: 1,
                combat: Some(CombatStats {
                    strategy: StrategyKind::CloseRange,
                    base_range: 1.5,
                    damage: 4,
                    chase_radius: 12.0,
                    cooldown: Duration::from_millis(800),
                    spawn_delay: Duration::ZERO,
                    projectile_speed: 0.0,
                }),
            },
            Archetype::Archer => UnitProfile {
                speed: 2.0,
                max_health: 25,
                footprint: 1,
                combat: Some(CombatStats {
                    strategy: StrategyKind::FarRange,
                    base_range: 6.0,
                    damage: 3,
                    chase_radius: 14.0,
                    cooldown: Duration::from_millis(1_200),
                    spawn_delay: Duration::ZERO,
                    projectile_speed: 0.0,
                }),
            },
            Archetype::Catapult => UnitProfile {
                speed: 1.0,
                max_health: 60,
                footprint: 2,
                combat: Some(CombatStats {
                    strategy: StrategyKind::Projectile,
                    base_range: 10.0,
                    damage: 10,
                    chase_radius: 16.0,
                    cooldown: Duration::from_millis(3_000),
                    spawn_delay: Duration::from_millis(500),
                    projectile_speed: 8.0,
                }),
            },
        }
    }
}

/// Resolved stats of a unit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnitProfile {
    /// Travel speed in world units per second.
    pub speed: f32,
    /// Hit points on spawn.
    pub max_health: u32,
    /// Footprint edge length in cells.
    pub footprint: u32,
    /// Fighting stats; absent for units that work instead of fighting.
    pub combat: Option<CombatStats>,
}

impl UnitProfile {
    /// Body parameters for spawning the unit.
    #[must_use]
    pub fn agent_spec(&self, faction: Faction, position: Vec3) -> AgentSpec {
        AgentSpec {
            faction,
            position,
            max_health: self.max_health,
            speed: self.speed,
            footprint: self.footprint,
        }
    }
}

/// Fighting stats of a combatant archetype.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CombatStats {
    /// Engagement policy.
    pub strategy: StrategyKind,
    /// Distance from which attacks can be made.
    pub base_range: f32,
    /// Hit points removed per attack.
    pub damage: u32,
    /// Radius scanned for replacement targets.
    pub chase_radius: f32,
    /// Time between attacks.
    pub cooldown: Duration,
    /// Wind-up before a projectile launches.
    pub spawn_delay: Duration,
    /// Projectile speed in world units per second.
    pub projectile_speed: f32,
}

impl CombatStats {
    /// Engagement geometry handed to the combat capability.
    #[must_use]
    pub fn combat_profile(&self) -> CombatProfile {
        CombatProfile {
            base_range: self.base_range,
            damage: self.damage,
            chase_radius: self.chase_radius,
        }
    }

    /// Parameters of the unit's combat strategy.
    #[must_use]
    pub fn strategy_spec(&self) -> StrategySpec {
        StrategySpec {
            kind: self.strategy,
            cooldown: self.cooldown,
            spawn_delay: self.spawn_delay,
            projectile_speed: self.projectile_speed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_workers_skip_combat() {
        let fighters: Vec<_> = Archetype::ALL
            .into_iter()
            .filter(|archetype| archetype.is_combatant())
            .collect();
        assert_eq!(
            fighters,
            vec![Archetype::Soldier, Archetype::Archer, Archetype::Catapult]
        );
    }

    #[test]
    fn catapult_defaults_describe_a_projectile_launcher() {
        let stats = Archetype::Catapult
            .defaults()
            .combat
            .expect("catapults fight");
        let spec = stats.strategy_spec();
        assert_eq!(spec.kind, StrategyKind::Projectile);
        assert!(spec.projectile_speed > 0.0);
        assert_eq!(spec.build().kind(), StrategyKind::Projectile);
    }
}
