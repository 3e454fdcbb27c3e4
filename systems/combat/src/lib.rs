#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Combat capability that chases hostile targets and attacks through a pluggable strategy.

mod strategy;

pub use strategy::{
    CloseRangeStrategy, CombatStrategy, Cooldown, FarRangeStrategy, ProjectileStrategy,
    StrategyKind, StrategySpec, Strike,
};

use skirmish_core::{planar_distance, EntityId};
use skirmish_world::{query, CombatCapability, SimContext};

/// Engagement geometry and damage of a combatant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CombatProfile {
    /// Distance from which attacks can be made.
    pub base_range: f32,
    /// Hit points removed per attack.
    pub damage: u32,
    /// Radius scanned for a replacement when the target becomes invalid.
    pub chase_radius: f32,
}

impl Default for CombatProfile {
    fn default() -> Self {
        Self {
            base_range: 1.5,
            damage: 1,
            chase_radius: 12.0,
        }
    }
}

/// Combat capability driving a [`CombatStrategy`].
#[derive(Debug)]
pub struct Combatant {
    profile: CombatProfile,
    strategy: Box<dyn CombatStrategy>,
    target: Option<EntityId>,
    finished: bool,
    chasing: bool,
}

impl Combatant {
    /// Creates a disengaged combatant.
    #[must_use]
    pub fn new(profile: CombatProfile, strategy: Box<dyn CombatStrategy>) -> Self {
        Self {
            profile,
            strategy,
            target: None,
            finished: false,
            chasing: false,
        }
    }

    /// Engagement geometry and damage.
    #[must_use]
    pub fn profile(&self) -> &CombatProfile {
        &self.profile
    }

    /// Strategy in use.
    #[must_use]
    pub fn strategy(&self) -> &dyn CombatStrategy {
        self.strategy.as_ref()
    }

    /// Current target if it is still a hostile, live entity; otherwise the
    /// nearest hostile within the chase radius.
    fn resolve_target(&mut self, agent: EntityId, ctx: &SimContext<'_>) -> Option<EntityId> {
        let faction = query::faction(ctx.world, agent)?;
        if let Some(target) = self.target {
            if query::is_hostile_target(ctx.world, faction, target) {
                return Some(target);
            }
        }

        let origin = query::position(ctx.world, agent)?;
        let replacement =
            query::nearest_hostile(ctx.world, faction, origin, self.profile.chase_radius);
        if replacement.is_some() {
            tracing::debug!(
                ?agent,
                previous = ?self.target,
                next = ?replacement,
                "target re-acquired"
            );
        }
        self.target = replacement;
        replacement
    }

    fn halt(&mut self, agent: EntityId, ctx: &mut SimContext<'_>) {
        if self.chasing {
            if let Some(movement) = ctx.world.movement(agent) {
                movement.stop_movement();
            }
            self.chasing = false;
        }
    }
}

impl CombatCapability for Combatant {
    fn set_attack_target(&mut self, agent: EntityId, target: EntityId, ctx: &mut SimContext<'_>) {
        self.target = Some(target);
        self.finished = self.resolve_target(agent, ctx).is_none();
    }

    fn attack_target(&self) -> Option<EntityId> {
        self.target
    }

    fn tick_attack(&mut self, agent: EntityId, ctx: &mut SimContext<'_>) {
        self.strategy.advance(ctx);
        if self.finished {
            return;
        }

        let Some(target) = self.resolve_target(agent, ctx) else {
            self.finished = true;
            self.halt(agent, ctx);
            return;
        };
        let (Some(origin), Some(goal)) = (
            query::position(ctx.world, agent),
            query::position(ctx.world, target),
        ) else {
            return;
        };

        let distance = planar_distance(origin, goal);
        if self
            .strategy
            .needs_reposition(distance, self.profile.base_range)
        {
            let stopping_distance = self.strategy.optimal_distance(self.profile.base_range);
            if let Some(movement) = ctx.world.movement(agent) {
                movement.move_to(goal, stopping_distance);
                self.chasing = true;
            }
            return;
        }

        self.halt(agent, ctx);
        if self.strategy.can_attack() {
            self.strategy.execute(
                Strike {
                    attacker: agent,
                    target,
                    damage: self.profile.damage,
                    distance,
                },
                ctx,
            );
        }
    }

    fn is_attack_finished(&self) -> bool {
        self.finished
    }

    fn stop_attacking(&mut self, agent: EntityId, ctx: &mut SimContext<'_>) {
        self.halt(agent, ctx);
        self.strategy.reset();
        self.target = None;
        self.finished = true;
    }
}
