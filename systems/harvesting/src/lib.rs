#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Harvester behaviour that gathers resources and hauls them to deposit points.
//!
//! The behaviour is an explicit state machine. Each state has an enter hook,
//! a per-tick hook and an exit hook; hooks report the next state instead of
//! switching directly so every transition funnels through one place that
//! emits [`Event::BehaviorChanged`](skirmish_core::Event::BehaviorChanged).

use std::{f32::consts::SQRT_2, time::Duration};

use skirmish_core::{
    planar_distance, BehaviorState, Cell, EntityId, Event, ResourceKind, Vec3,
};
use skirmish_world::{query, HarvestCapability, SimContext};

/// Upper bound on transitions chained from a single call.
const MAX_CHAINED_TRANSITIONS: usize = 8;

/// Tunables of the harvester behaviour.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HarvesterConfig {
    /// Amount carried before heading to a deposit point.
    pub capacity: u32,
    /// Amount requested per harvest action.
    pub harvest_amount: u32,
    /// Time between harvest actions.
    pub harvest_cooldown: Duration,
    /// Reach beyond the node's interaction radius.
    pub harvest_range: f32,
    /// Radius scanned for replacement nodes.
    pub search_radius: f32,
    /// Reach beyond the deposit point's interaction radius.
    pub deposit_range: f32,
    /// Delay before retrying a failed slot reservation.
    pub retry_cooldown: Duration,
    /// Stopping distance handed to the movement capability.
    pub stopping_distance: f32,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            harvest_amount: 1,
            harvest_cooldown: Duration::from_secs(1),
            harvest_range: 1.5,
            search_radius: 20.0,
            deposit_range: 1.5,
            retry_cooldown: Duration::from_millis(500),
            stopping_distance: 0.1,
        }
    }
}

/// Harvest capability backed by the harvester state machine.
#[derive(Clone, Debug)]
pub struct Harvester {
    config: HarvesterConfig,
    state: BehaviorState,
    target: Option<EntityId>,
    tracked: Option<ResourceKind>,
    carried: Option<(ResourceKind, u32)>,
    depot: Option<EntityId>,
    slot: Option<Cell>,
    cooldown: Duration,
    retry: Duration,
}

impl Harvester {
    /// Creates an idle harvester.
    #[must_use]
    pub fn new(config: HarvesterConfig) -> Self {
        Self {
            config,
            state: BehaviorState::Idle,
            target: None,
            tracked: None,
            carried: None,
            depot: None,
            slot: None,
            cooldown: Duration::ZERO,
            retry: Duration::ZERO,
        }
    }

    /// Tunables in use.
    #[must_use]
    pub fn config(&self) -> &HarvesterConfig {
        &self.config
    }

    /// Resource the harvester keeps looking for.
    #[must_use]
    pub fn tracked_kind(&self) -> Option<ResourceKind> {
        self.tracked
    }

    /// Deposit point chosen for the current trip.
    #[must_use]
    pub fn depot(&self) -> Option<EntityId> {
        self.depot
    }

    /// Cell reserved for the current approach.
    #[must_use]
    pub fn slot(&self) -> Option<Cell> {
        self.slot
    }

    fn load(&self) -> u32 {
        self.carried.map_or(0, |(_, amount)| amount)
    }

    fn is_full(&self) -> bool {
        self.load() >= self.config.capacity
    }

    fn change_state(&mut self, agent: EntityId, next: BehaviorState, ctx: &mut SimContext<'_>) {
        let mut pending = Some(next);
        let mut hops = 0;
        while let Some(to) = pending.take() {
            if hops == MAX_CHAINED_TRANSITIONS {
                tracing::warn!(?agent, state = ?to, "harvester transitions did not settle");
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
        tracing::debug!(?agent, ?from, ?to, "harvester state changed");
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
                self.release_slot(agent, ctx);
                stop_moving(agent, ctx);
                self.target = None;
                self.depot = None;
                None
            }
            BehaviorState::Searching => Some(self.search(agent, ctx)),
            BehaviorState::MovingToTarget => self.approach_target(agent, ctx),
            BehaviorState::Acting => {
                self.cooldown = self.config.harvest_cooldown;
                stop_moving(agent, ctx);
                if let Some(node) = self.target.and_then(|node| query::position(ctx.world, node)) {
                    ctx.world.face(agent, node);
                }
                None
            }
            BehaviorState::MovingToDeposit => self.approach_depot(agent, ctx),
            BehaviorState::Depositing => Some(self.unload(agent, ctx)),
        }
    }

    fn exit(&mut self, agent: EntityId, state: BehaviorState, ctx: &mut SimContext<'_>) {
        if matches!(
            state,
            BehaviorState::MovingToTarget | BehaviorState::MovingToDeposit
        ) {
            stop_moving(agent, ctx);
        }
    }

    fn tick_state(&mut self, agent: EntityId, ctx: &mut SimContext<'_>) -> Option<BehaviorState> {
        match self.state {
            BehaviorState::Idle | BehaviorState::Searching | BehaviorState::Depositing => None,
            BehaviorState::MovingToTarget => {
                let Some(goal) = self.harvest_goal(agent, ctx) else {
                    return Some(BehaviorState::Searching);
                };
                if self.in_harvest_range(agent, ctx) {
                    return Some(BehaviorState::Acting);
                }
                self.follow_approach(agent, goal, ctx);
                None
            }
            BehaviorState::Acting => self.act(agent, ctx),
            BehaviorState::MovingToDeposit => {
                let Some(goal) = self.deposit_goal(agent, ctx) else {
                    return Some(BehaviorState::MovingToDeposit);
                };
                if self.in_deposit_range(agent, ctx) {
                    return Some(BehaviorState::Depositing);
                }
                self.follow_approach(agent, goal, ctx);
                None
            }
        }
    }

    fn search(&mut self, agent: EntityId, ctx: &mut SimContext<'_>) -> BehaviorState {
        let Some(origin) = query::position(ctx.world, agent) else {
            return BehaviorState::Idle;
        };
        match query::nearest_harvestable(ctx.world, origin, self.config.search_radius, self.tracked)
        {
            Some(node) => {
                self.target = Some(node);
                BehaviorState::MovingToTarget
            }
            None => {
                self.target = None;
                if self.load() > 0 {
                    BehaviorState::MovingToDeposit
                } else {
                    BehaviorState::Idle
                }
            }
        }
    }

    fn approach_target(
        &mut self,
        agent: EntityId,
        ctx: &mut SimContext<'_>,
    ) -> Option<BehaviorState> {
        let Some(goal) = self.harvest_goal(agent, ctx) else {
            return Some(BehaviorState::Searching);
        };
        if self.in_harvest_range(agent, ctx) {
            return Some(BehaviorState::Acting);
        }
        if !ctx.world.has_movement(agent) {
            return Some(BehaviorState::Idle);
        }
        self.reserve_near(agent, goal, ctx);
        None
    }

    fn approach_depot(
        &mut self,
        agent: EntityId,
        ctx: &mut SimContext<'_>,
    ) -> Option<BehaviorState> {
        let Some((kind, _)) = self.carried else {
            return Some(self.resume_state(ctx));
        };
        let origin = query::position(ctx.world, agent)?;
        let faction = query::faction(ctx.world, agent)?;
        let Some(depot) = query::best_deposit_point(ctx.world, faction, kind, origin) else {
            tracing::warn!(?agent, ?kind, "no deposit point accepts the carried load");
            return Some(BehaviorState::Idle);
        };

        self.depot = Some(depot);
        if self.in_deposit_range(agent, ctx) {
            return Some(BehaviorState::Depositing);
        }
        if !ctx.world.has_movement(agent) {
            return Some(BehaviorState::Idle);
        }
        let goal = self.deposit_goal(agent, ctx)?;
        self.reserve_near(agent, goal, ctx);
        None
    }

    fn act(&mut self, agent: EntityId, ctx: &mut SimContext<'_>) -> Option<BehaviorState> {
        let Some((target, kind)) = self.target.and_then(|node| {
            ctx.world
                .harvestable(node)
                .map(|harvestable| (node, harvestable.resource_kind()))
        }) else {
            return Some(if self.is_full() {
                BehaviorState::MovingToDeposit
            } else {
                BehaviorState::Searching
            });
        };

        if self.carried.map_or(false, |(carried, _)| carried != kind) || self.is_full() {
            return Some(BehaviorState::MovingToDeposit);
        }
        if !self.in_harvest_range(agent, ctx) {
            return Some(BehaviorState::MovingToTarget);
        }

        self.cooldown = self.cooldown.saturating_sub(ctx.dt);
        if !self.cooldown.is_zero() {
            return None;
        }
        self.cooldown = self.config.harvest_cooldown;

        let request = self
            .config
            .harvest_amount
            .min(self.config.capacity.saturating_sub(self.load()));
        let Some((kind, taken)) = ctx.world.harvest(agent, target, request, ctx.events) else {
            return Some(BehaviorState::Searching);
        };
        if taken > 0 {
            self.carried = Some((kind, self.load() + taken));
            self.tracked = Some(kind);
        }

        if self.is_full() {
            Some(BehaviorState::MovingToDeposit)
        } else if ctx.world.harvestable(target).is_none() {
            Some(BehaviorState::Searching)
        } else {
            None
        }
    }

    fn unload(&mut self, agent: EntityId, ctx: &mut SimContext<'_>) -> BehaviorState {
        let Some((kind, amount)) = self.carried else {
            return self.resume_state(ctx);
        };
        let Some(depot) = self.depot else {
            return BehaviorState::MovingToDeposit;
        };
        if ctx.world.deposit(agent, depot, kind, amount, ctx.events) {
            self.carried = None;
            self.resume_state(ctx)
        } else {
            self.depot = None;
            BehaviorState::MovingToDeposit
        }
    }

    fn resume_state(&self, ctx: &SimContext<'_>) -> BehaviorState {
        let target_alive = self
            .target
            .and_then(|node| ctx.world.harvestable(node))
            .map_or(false, |node| node.is_active() && !node.is_depleted());
        if target_alive {
            BehaviorState::MovingToTarget
        } else {
            BehaviorState::Searching
        }
    }

    fn harvest_goal(&self, agent: EntityId, ctx: &SimContext<'_>) -> Option<Vec3> {
        let origin = query::position(ctx.world, agent)?;
        let node = ctx.world.harvestable(self.target?)?;
        if !node.is_active() || node.is_depleted() {
            return None;
        }
        Some(node.harvest_position(origin))
    }

    fn deposit_goal(&self, agent: EntityId, ctx: &SimContext<'_>) -> Option<Vec3> {
        let origin = query::position(ctx.world, agent)?;
        let depot = ctx.world.deposit_point(self.depot?)?;
        Some(depot.deposit_position(origin))
    }

    fn in_harvest_range(&self, agent: EntityId, ctx: &SimContext<'_>) -> bool {
        let Some(origin) = query::position(ctx.world, agent) else {
            return false;
        };
        self.target
            .and_then(|node| ctx.world.harvestable(node))
            .map_or(false, |node| {
                planar_distance(origin, node.position())
                    <= node.interaction_radius() + reach(self.config.harvest_range, ctx)
            })
    }

    fn in_deposit_range(&self, agent: EntityId, ctx: &SimContext<'_>) -> bool {
        let Some(origin) = query::position(ctx.world, agent) else {
            return false;
        };
        self.depot
            .and_then(|depot| ctx.world.deposit_point(depot))
            .map_or(false, |depot| {
                planar_distance(origin, depot.position())
                    <= depot.interaction_radius() + reach(self.config.deposit_range, ctx)
            })
    }

    /// Reserves the free cell nearest to `goal` and walks there.
    fn reserve_near(&mut self, agent: EntityId, goal: Vec3, ctx: &mut SimContext<'_>) {
        let wanted = ctx.world.world_to_cell(goal);
        let cell = ctx.world.find_nearest_free(wanted, agent);
        if !ctx.world.is_cell_available_for(cell, agent) || !ctx.world.reserve_cell(cell, agent) {
            self.slot = None;
            self.retry = self.config.retry_cooldown;
            return;
        }

        self.slot = Some(cell);
        let destination = ctx.world.cell_to_world(cell);
        let stopping_distance = self.config.stopping_distance;
        if let Some(movement) = ctx.world.movement(agent) {
            movement.move_to(destination, stopping_distance);
        }
    }

    /// Keeps an approach going: retries a missing slot and gives up a slot
    /// that was reached without getting in range.
    fn follow_approach(&mut self, agent: EntityId, goal: Vec3, ctx: &mut SimContext<'_>) {
        match self.slot {
            None => {
                self.retry = self.retry.saturating_sub(ctx.dt);
                if self.retry.is_zero() {
                    self.reserve_near(agent, goal, ctx);
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

    fn release_slot(&mut self, agent: EntityId, ctx: &mut SimContext<'_>) {
        if let Some(cell) = self.slot.take() {
            ctx.world.release_cell_held_by(cell, agent);
        }
    }
}

impl Default for Harvester {
    fn default() -> Self {
        Self::new(HarvesterConfig::default())
    }
}

impl HarvestCapability for Harvester {
    fn set_harvest_target(&mut self, agent: EntityId, target: EntityId, ctx: &mut SimContext<'_>) {
        match ctx.world.harvestable(target) {
            Some(node) => {
                self.tracked = Some(node.resource_kind());
                self.target = Some(target);
                self.change_state(agent, BehaviorState::MovingToTarget, ctx);
            }
            None => {
                self.target = None;
                self.change_state(agent, BehaviorState::Searching, ctx);
            }
        }
    }

    fn harvest_target(&self) -> Option<EntityId> {
        self.target
    }

    fn tick_harvest(&mut self, agent: EntityId, ctx: &mut SimContext<'_>) {
        if let Some(next) = self.tick_state(agent, ctx) {
            self.change_state(agent, next, ctx);
        }
    }

    fn stop_harvesting(&mut self, agent: EntityId, ctx: &mut SimContext<'_>) {
        if self.state == BehaviorState::Idle {
            let _ = self.enter(agent, BehaviorState::Idle, ctx);
        } else {
            self.change_state(agent, BehaviorState::Idle, ctx);
        }
    }

    fn state(&self) -> BehaviorState {
        self.state
    }

    fn carried(&self) -> Option<(ResourceKind, u32)> {
        self.carried
    }

    fn capacity(&self) -> u32 {
        self.config.capacity
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
