use std::{fmt::Debug, time::Duration};

use serde::{Deserialize, Serialize};
use skirmish_core::{EntityId, Event};
use skirmish_world::{query, SimContext};

/// Engagement policy of a unit archetype.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Melee: closes in and strikes instantly.
    #[default]
    CloseRange,
    /// Ranged: keeps its distance and strikes instantly.
    FarRange,
    /// Launches a projectile after a wind-up; damage lands on arrival.
    Projectile,
}

/// Single attack resolved by a strategy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Strike {
    /// Agent performing the attack.
    pub attacker: EntityId,
    /// Entity being attacked.
    pub target: EntityId,
    /// Hit points removed on impact.
    pub damage: u32,
    /// Planar distance between attacker and target when the attack started.
    pub distance: f32,
}

/// Pluggable distance and attack policy of a combatant.
pub trait CombatStrategy: Debug {
    /// Policy implemented by the strategy.
    fn kind(&self) -> StrategyKind;

    /// Distance the combatant tries to keep from its target.
    fn optimal_distance(&self, base_range: f32) -> f32;

    /// Reports whether the combatant must move before attacking.
    fn needs_reposition(&self, distance: f32, base_range: f32) -> bool {
        distance > base_range
    }

    /// Reports whether the cooldown allows another attack.
    fn can_attack(&self) -> bool;

    /// Advances cooldowns and anything in flight.
    fn advance(&mut self, ctx: &mut SimContext<'_>);

    /// Performs an attack. Callers check [`CombatStrategy::can_attack`] first.
    fn execute(&mut self, strike: Strike, ctx: &mut SimContext<'_>);

    /// Drops pending attacks and rearms the cooldown.
    fn reset(&mut self);
}

/// Parameters used to build a strategy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrategySpec {
    /// Policy to build.
    pub kind: StrategyKind,
    /// Time between attacks.
    pub cooldown: Duration,
    /// Wind-up before a projectile leaves the launcher.
    pub spawn_delay: Duration,
    /// Projectile speed in world units per second.
    pub projectile_speed: f32,
}

impl StrategySpec {
    /// Instantiates the strategy described by the spec.
    #[must_use]
    pub fn build(&self) -> Box<dyn CombatStrategy> {
        match self.kind {
            StrategyKind::CloseRange => Box::new(CloseRangeStrategy::new(self.cooldown)),
            StrategyKind::FarRange => Box::new(FarRangeStrategy::new(self.cooldown)),
            StrategyKind::Projectile => Box::new(ProjectileStrategy::new(
                self.cooldown,
                self.spawn_delay,
                self.projectile_speed,
            )),
        }
    }
}

/// Attack timer that starts armed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cooldown {
    period: Duration,
    remaining: Duration,
}

impl Cooldown {
    /// Creates an armed cooldown with the provided period.
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            remaining: Duration::ZERO,
        }
    }

    /// Reports whether an attack is allowed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.remaining.is_zero()
    }

    /// Lets `dt` elapse.
    pub fn advance(&mut self, dt: Duration) {
        self.remaining = self.remaining.saturating_sub(dt);
    }

    /// Starts a new period.
    pub fn trigger(&mut self) {
        self.remaining = self.period;
    }

    /// Rearms the timer immediately.
    pub fn rearm(&mut self) {
        self.remaining = Duration::ZERO;
    }
}

fn strike_now(strike: Strike, ctx: &mut SimContext<'_>) {
    if let Some(target) = query::position(ctx.world, strike.target) {
        ctx.world.face(strike.attacker, target);
    }
    let _ = ctx
        .world
        .apply_damage(strike.attacker, strike.target, strike.damage, ctx.events);
}

/// Melee policy that closes to 80% of the base range.
#[derive(Clone, Debug)]
pub struct CloseRangeStrategy {
    cooldown: Cooldown,
}

impl CloseRangeStrategy {
    /// Creates the policy with the provided attack period.
    #[must_use]
    pub const fn new(cooldown: Duration) -> Self {
        Self {
            cooldown: Cooldown::new(cooldown),
        }
    }
}

impl CombatStrategy for CloseRangeStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CloseRange
    }

    fn optimal_distance(&self, base_range: f32) -> f32 {
        base_range * 0.8
    }

    fn can_attack(&self) -> bool {
        self.cooldown.is_ready()
    }

    fn advance(&mut self, ctx: &mut SimContext<'_>) {
        self.cooldown.advance(ctx.dt);
    }

    fn execute(&mut self, strike: Strike, ctx: &mut SimContext<'_>) {
        strike_now(strike, ctx);
        self.cooldown.trigger();
    }

    fn reset(&mut self) {
        self.cooldown.rearm();
    }
}

/// Ranged policy that holds at 90% of the base range.
#[derive(Clone, Debug)]
pub struct FarRangeStrategy {
    cooldown: Cooldown,
}

impl FarRangeStrategy {
    /// Creates the policy with the provided attack period.
    #[must_use]
    pub const fn new(cooldown: Duration) -> Self {
        Self {
            cooldown: Cooldown::new(cooldown),
        }
    }
}

impl CombatStrategy for FarRangeStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FarRange
    }

    fn optimal_distance(&self, base_range: f32) -> f32 {
        base_range * 0.9
    }

    fn can_attack(&self) -> bool {
        self.cooldown.is_ready()
    }

    fn advance(&mut self, ctx: &mut SimContext<'_>) {
        self.cooldown.advance(ctx.dt);
    }

    fn execute(&mut self, strike: Strike, ctx: &mut SimContext<'_>) {
        strike_now(strike, ctx);
        self.cooldown.trigger();
    }

    fn reset(&mut self) {
        self.cooldown.rearm();
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum ShotPhase {
    Winding { remaining: Duration },
    InFlight { remaining: Duration },
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct PendingShot {
    strike: Strike,
    flight: Duration,
    phase: ShotPhase,
}

/// Ranged policy whose damage travels as a projectile.
///
/// A shot winds up for the spawn delay, then flies for
/// `distance / projectile_speed` seconds. Damage lands only if the target is
/// still alive on arrival.
#[derive(Clone, Debug)]
pub struct ProjectileStrategy {
    cooldown: Cooldown,
    spawn_delay: Duration,
    projectile_speed: f32,
    pending: Vec<PendingShot>,
}

impl ProjectileStrategy {
    /// Creates the policy with the provided timings.
    #[must_use]
    pub fn new(cooldown: Duration, spawn_delay: Duration, projectile_speed: f32) -> Self {
        Self {
            cooldown: Cooldown::new(cooldown),
            spawn_delay,
            projectile_speed,
            pending: Vec::new(),
        }
    }

    /// Shots winding up or in flight.
    #[must_use]
    pub fn pending_shots(&self) -> usize {
        self.pending.len()
    }

    fn flight_time(&self, distance: f32) -> Duration {
        if self.projectile_speed > 0.0 && distance.is_finite() {
            Duration::try_from_secs_f32((distance / self.projectile_speed).max(0.0))
                .unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }
}

impl CombatStrategy for ProjectileStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Projectile
    }

    fn optimal_distance(&self, base_range: f32) -> f32 {
        base_range * 0.9
    }

    fn can_attack(&self) -> bool {
        self.cooldown.is_ready()
    }

    fn advance(&mut self, ctx: &mut SimContext<'_>) {
        self.cooldown.advance(ctx.dt);

        let dt = ctx.dt;
        let mut landed = Vec::new();
        self.pending.retain_mut(|shot| match shot.phase {
            ShotPhase::Winding { remaining } => {
                let remaining = remaining.saturating_sub(dt);
                if remaining.is_zero() {
                    ctx.events.push(Event::ProjectileLaunched {
                        attacker: shot.strike.attacker,
                        target: shot.strike.target,
                    });
                    shot.phase = ShotPhase::InFlight {
                        remaining: shot.flight,
                    };
                } else {
                    shot.phase = ShotPhase::Winding { remaining };
                }
                true
            }
            ShotPhase::InFlight { remaining } => {
                let remaining = remaining.saturating_sub(dt);
                if remaining.is_zero() {
                    landed.push(shot.strike);
                    false
                } else {
                    shot.phase = ShotPhase::InFlight { remaining };
                    true
                }
            }
        });

        for strike in landed {
            if query::is_alive(ctx.world, strike.target) {
                let _ = ctx
                    .world
                    .apply_damage(strike.attacker, strike.target, strike.damage, ctx.events);
            }
        }
    }

    fn execute(&mut self, strike: Strike, ctx: &mut SimContext<'_>) {
        if let Some(target) = query::position(ctx.world, strike.target) {
            ctx.world.face(strike.attacker, target);
        }
        self.pending.push(PendingShot {
            strike,
            flight: self.flight_time(strike.distance),
            phase: ShotPhase::Winding {
                remaining: self.spawn_delay,
            },
        });
        self.cooldown.trigger();
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.cooldown.rearm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimal_distances_follow_the_policy() {
        let base = 10.0;
        let close = CloseRangeStrategy::new(Duration::ZERO).optimal_distance(base);
        assert!((close - 8.0).abs() < 1e-5);
        assert!((FarRangeStrategy::new(Duration::ZERO).optimal_distance(base) - 9.0).abs() < 1e-5);
        let projectile = ProjectileStrategy::new(Duration::ZERO, Duration::ZERO, 1.0);
        assert!((projectile.optimal_distance(base) - 9.0).abs() < 1e-5);
    }

    #[test]
    fn repositioning_starts_beyond_the_base_range() {
        let strategy = FarRangeStrategy::new(Duration::ZERO);
        assert!(!strategy.needs_reposition(5.0, 5.0));
        assert!(strategy.needs_reposition(5.01, 5.0));
    }

    #[test]
    fn cooldown_starts_armed_and_rearms_after_its_period() {
        let mut cooldown = Cooldown::new(Duration::from_millis(300));
        assert!(cooldown.is_ready());
        cooldown.trigger();
        assert!(!cooldown.is_ready());
        cooldown.advance(Duration::from_millis(200));
        assert!(!cooldown.is_ready());
        cooldown.advance(Duration::from_millis(200));
        assert!(cooldown.is_ready());
    }

    #[test]
    fn flight_time_scales_with_distance() {
        let strategy = ProjectileStrategy::new(Duration::ZERO, Duration::ZERO, 4.0);
        assert_eq!(strategy.flight_time(8.0), Duration::from_secs(2));
        let stalled = ProjectileStrategy::new(Duration::ZERO, Duration::ZERO, 0.0);
        assert_eq!(stalled.flight_time(8.0), Duration::ZERO);
    }

    #[test]
    fn crawling_projectiles_saturate_instead_of_overflowing() {
        let crawling = ProjectileStrategy::new(Duration::ZERO, Duration::ZERO, 1e-20);
        assert_eq!(crawling.flight_time(5.0), Duration::MAX);
        assert_eq!(crawling.flight_time(f32::INFINITY), Duration::ZERO);
    }

    #[test]
    fn spec_builds_the_requested_policy() {
        let spec = StrategySpec {
            kind: StrategyKind::Projectile,
            cooldown: Duration::from_secs(2),
            spawn_delay: Duration::from_millis(500),
            projectile_speed: 8.0,
        };
        assert_eq!(spec.build().kind(), StrategyKind::Projectile);
    }
}
