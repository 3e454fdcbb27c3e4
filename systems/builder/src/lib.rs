#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Builder behaviour that parks on a perimeter slot and works a site to completion.

use std::{f32::consts::SQRT_2, time::Duration};

use skirmish_core::{planar_distance, BehaviorState, Cell, EntityId, Event};
use skirmish_system_reservation::PerimeterSlots;
use skirmish_world::{query, BuildCapability, SimContext};

const MAX_CHAINED_TRANSITIONS: usize = 8;

/// Tunables of the builder behaviour.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BuilderConfig {
    /// Work applied per build action.
    pub build_amount: u32,
    /// Time between build actions.
    pub build_cooldown: Duration,
    /// Reach beyond the site's interaction radius.
    pub build_range: f32,
    /// Delay before retrying when every slot is taken.
    pub retry_cooldown: Duration,
    /// Stopping distance handed to the movement capability.
    pub stopping_distance: f32,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            build_amount: 1,
            build_cooldown: Duration::from_secs(1),
            build_range: 1.5,
            retry_cooldown: Duration::from_millis(500),
            stopping_distance: 0.1,
        }
    }
}

/// Build capability backed by the builder state machine.
#[derive(Clone, Debug)]
pub struct Builder {
    config: BuilderConfig,
    state: BehaviorState,
    target: Option<EntityId>,
    slots: PerimeterSlots,
    slot: Option<Cell>,
    cooldown: Duration,
    retry: Duration,
}

impl Builder {
    /// Creates an idle builder.
    #[must_use]
    pub fn new(config: BuilderConfig) -> Self {
        Self {
            config,
            state: BehaviorState::Idle,
            target: None,
            slots: PerimeterSlots::default(),
            slot: None,
            cooldown: Duration::ZERO,
            retry: Duration::ZERO,
        }
    }

    /// Tunables in use.
    #[must_use]
    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Perimeter slot currently reserved.
    #[must_use]
    pub fn slot(&self) -> Option<Cell> {
        self.slot
    }

    fn change_state(&mut self, agent: EntityId, next: BehaviorState, ctx: &mut SimContext<'_>) {
        let mut pending = Some(next);
        let mut hops = 0;
        while let Some(to) = pending.take() {
            if hops == MAX_CHAINED_TRANSITIONS {
                tracing::warn!(?agent, state = ?to, "builder transitions did not settle");
                self.switch(agent, BehaviorState::Idle, ctx);
                let _ = self.enter(agent, BehaviorState::Idle, ctx);
                break;
            }
            hops += 1;
            self.switch(agent, to, ctx);
            pending = self.enter(agent, to, ctx);
        }
    }

    fn switch(&mut self, agent: EntityId, to: BehaviorState, ctx: &mut SimContext<'_>) {
        let from = self.state;
        self.exit(agent, from, ctx);
        self.state = to;
        tracing::debug!(?agent, ?from, ?to, "builder state changed");
        ctx.emit(Event::BehaviorChanged { agent, from, to });
    }

    fn enter(
        &mut self,
        agent: EntityId,
        state: BehaviorState,
        ctx: &mut SimContext<'_>,
    ) -> Option<BehaviorState> {
        match state {
            BehaviorState::Idle => {
                if let Some(cell) = self.slot.take() {
                    ctx.world.release_cell_held_by(cell, agent);
                }
                stop_moving(agent, ctx);
                self.target = None;
                None
            }
            BehaviorState::MovingToTarget => {
                let Some(site) = self.workable_site(agent, ctx) else {
                    return Some(BehaviorState::Idle);
                };
                if self.in_build_range(agent, site, ctx) {
                    return Some(BehaviorState::Acting);
                }
                if !ctx.world.has_movement(agent) {
                    return Some(BehaviorState::Idle);
                }
                self.claim_slot(agent, ctx);
                None
            }
            BehaviorState::Acting => {
                self.cooldown = self.config.build_cooldown;
                stop_moving(agent, ctx);
                if let Some(site) = self.target.and_then(|site| query::position(ctx.world, site)) {
                    ctx.world.face(agent, site);
                }
                None
            }
            // No search or deposit phase when building.
            BehaviorState::Searching
            | BehaviorState::MovingToDeposit
            | BehaviorState::Depositing => Some(BehaviorState::Idle),
        }
    }

    fn exit(&mut self, agent: EntityId, state: BehaviorState, ctx: &mut SimContext<'_>) {
        if state == BehaviorState::MovingToTarget {
            stop_moving(agent, ctx);
        }
    }

    fn tick_state(&mut self, agent: EntityId, ctx: &mut SimContext<'_>) -> Option<BehaviorState> {
        match self.state {
            BehaviorState::MovingToTarget => {
                let Some(site) = self.workable_site(agent, ctx) else {
                    return Some(BehaviorState::Idle);
                };
                if self.in_build_range(agent, site, ctx) {
                    return Some(BehaviorState::Acting);
                }
                self.follow_approach(agent, ctx);
                None
            }
            BehaviorState::Acting => {
                let Some(site) = self.workable_site(agent, ctx) else {
                    return Some(BehaviorState::Idle);
                };
                if !self.in_build_range(agent, site, ctx) {
                    return Some(BehaviorState::MovingToTarget);
                }

                self.cooldown = self.cooldown.saturating_sub(ctx.dt);
                if !self.cooldown.is_zero() {
                    return None;
                }
                self.cooldown = self.config.build_cooldown;

                let applied = ctx
                    .world
                    .construct(agent, site, self.config.build_amount, ctx.events);
                if applied.is_none() || self.workable_site(agent, ctx).is_none() {
                    Some(BehaviorState::Idle)
                } else {
                    None
                }
            }
            BehaviorState::Idle
            | BehaviorState::Searching
            | BehaviorState::MovingToDeposit
            | BehaviorState::Depositing => None,
        }
    }

    /// Target if it still exists, belongs to the builder's faction and needs work.
    fn workable_site(&self, agent: EntityId, ctx: &SimContext<'_>) -> Option<EntityId> {
        let site = self.target?;
        let buildable = ctx.world.buildable(site)?;
        let faction = query::faction(ctx.world, agent)?;
        (buildable.faction() == faction && !buildable.is_complete()).then_some(site)
    }

    fn in_build_range(&self, agent: EntityId, site: EntityId, ctx: &SimContext<'_>) -> bool {
        let Some(origin) = query::position(ctx.world, agent) else {
            return false;
        };
        ctx.world.buildable(site).map_or(false, |site| {
            planar_distance(origin, site.position())
                <= site.interaction_radius() + reach(self.config.build_range, ctx)
        })
    }

    fn claim_slot(&mut self, agent: EntityId, ctx: &mut SimContext<'_>) {
        let Some(origin) = query::position(ctx.world, agent) else {
            return;
        };
        let from = ctx.world.world_to_cell(origin);
        let Some(cell) = ctx.world.claim_perimeter_slot(&self.slots, from, agent) else {
            tracing::debug!(?agent, "no free build slot");
            self.slot = None;
            self.retry = self.config.retry_cooldown;
            return;
        };

        self.slot = Some(cell);
        let destination = ctx.world.cell_to_world(cell);
        let stopping_distance = self.config.stopping_distance;
        if let Some(movement) = ctx.world.movement(agent) {
            movement.move_to(destination, stopping_distance);
        }
    }

    fn follow_approach(&mut self, agent: EntityId, ctx: &mut SimContext<'_>) {
        match self.slot {
            None => {
                self.retry = self.retry.saturating_sub(ctx.dt);
                if self.retry.is_zero() {
                    self.claim_slot(agent, ctx);
                }
            }
            Some(cell) => {
                let moving = ctx
                    .world
                    .movement(agent)
                    .map_or(false, |movement| movement.is_moving());
                if !moving {
                    ctx.world.release_cell_held_by(cell, agent);
                    self.slot = None;
                    self.retry = self.config.retry_cooldown;
                }
            }
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new(BuilderConfig::default())
    }
}

impl BuildCapability for Builder {
    fn set_build_target(&mut self, agent: EntityId, target: EntityId, ctx: &mut SimContext<'_>) {
        let geometry = ctx.world.geometry();
        self.slots = ctx
            .world
            .buildable(target)
            .map(|site| PerimeterSlots::from_anchors(&geometry, site.anchors()))
            .unwrap_or_default();
        self.target = Some(target);
        self.change_state(agent, BehaviorState::MovingToTarget, ctx);
    }

    fn build_target(&self) -> Option<EntityId> {
        self.target
    }

    fn tick_build(&mut self, agent: EntityId, ctx: &mut SimContext<'_>) {
        if let Some(next) = self.tick_state(agent, ctx) {
            self.change_state(agent, next, ctx);
        }
    }

    fn stop_building(&mut self, agent: EntityId, ctx: &mut SimContext<'_>) {
        if self.state == BehaviorState::Idle {
            let _ = self.enter(agent, BehaviorState::Idle, ctx);
        } else {
            self.change_state(agent, BehaviorState::Idle, ctx);
        }
    }

    fn state(&self) -> BehaviorState {
        self.state
    }
}

fn stop_moving(agent: EntityId, ctx: &mut SimContext<'_>) {
    if let Some(movement) = ctx.world.movement(agent) {
        movement.stop_movement();
    }
}

/// Reach added to an interaction radius; never shorter than one diagonal
/// cell step so a snapped approach slot is always in range.
fn reach(range: f32, ctx: &SimContext<'_>) -> f32 {
    range.max(ctx.world.geometry().cell_size() * SQRT_2)
}
