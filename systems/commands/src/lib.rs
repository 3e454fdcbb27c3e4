#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Interruptible per-agent commands and the executor that drives them.
//!
//! A [`Command`] wraps one goal and walks the lifecycle
//! `Created → Executing → (Completed | Cancelled)`. The first update runs the
//! start step, later updates advance the relevant capability, and
//! cancellation undoes every side effect the command caused before it
//! returns. [`CommandExecutor`] keeps at most one command active per agent.

mod executor;

pub use executor::CommandExecutor;

use skirmish_core::{
    planar_distance, BehaviorState, Cell, CommandKind, EntityId, Event, Order, Vec3,
};
use skirmish_world::{
    query, BuildCapability, CombatCapability, HarvestCapability, SimContext,
};

/// Stopping distance used by [`Command::move_to`].
pub const DEFAULT_STOPPING_DISTANCE: f32 = 0.1;

/// Capabilities an agent was spawned with, resolved once.
///
/// Movement lives on the agent body inside the world and is looked up
/// through [`World::movement`](skirmish_world::World::movement).
#[derive(Debug, Default)]
pub struct AgentCapabilities {
    /// Harvesting behaviour, if the agent can gather resources.
    pub harvest: Option<Box<dyn HarvestCapability>>,
    /// Construction behaviour, if the agent can build.
    pub build: Option<Box<dyn BuildCapability>>,
    /// Combat behaviour, if the agent can fight.
    pub combat: Option<Box<dyn CombatCapability>>,
}

impl AgentCapabilities {
    /// Adds a harvesting behaviour.
    #[must_use]
    pub fn with_harvest(mut self, harvest: Box<dyn HarvestCapability>) -> Self {
        self.harvest = Some(harvest);
        self
    }

    /// Adds a construction behaviour.
    #[must_use]
    pub fn with_build(mut self, build: Box<dyn BuildCapability>) -> Self {
        self.build = Some(build);
        self
    }

    /// Adds a combat behaviour.
    #[must_use]
    pub fn with_combat(mut self, combat: Box<dyn CombatCapability>) -> Self {
        self.combat = Some(combat);
        self
    }
}

/// Lifecycle phase of a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandStatus {
    /// Waiting for its first update.
    Created,
    /// Started and pursuing its goal.
    Executing,
    /// Goal reached; absorbing.
    Completed,
    /// Interrupted; absorbing.
    Cancelled,
}

impl CommandStatus {
    /// Reports whether the command will never be updated again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Goal {
    Move {
        destination: Vec3,
        stopping_distance: f32,
    },
    Harvest {
        target: EntityId,
    },
    Build {
        target: EntityId,
    },
    Attack {
        target: EntityId,
    },
    Idle,
}

/// Queued, interruptible unit of agent behaviour.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    goal: Goal,
    status: CommandStatus,
    reserved: Option<Cell>,
}

impl Command {
    fn with_goal(goal: Goal) -> Self {
        Self {
            goal,
            status: CommandStatus::Created,
            reserved: None,
        }
    }

    /// Walk to `destination`, stopping within the default distance.
    #[must_use]
    pub fn move_to(destination: Vec3) -> Self {
        Self::move_to_within(destination, DEFAULT_STOPPING_DISTANCE)
    }

    /// Walk to `destination`, stopping within `stopping_distance`.
    #[must_use]
    pub fn move_to_within(destination: Vec3, stopping_distance: f32) -> Self {
        Self::with_goal(Goal::Move {
            destination,
            stopping_distance: stopping_distance.max(0.0),
        })
    }

    /// Harvest `target` until the harvester gives up.
    #[must_use]
    pub fn harvest(target: EntityId) -> Self {
        Self::with_goal(Goal::Harvest { target })
    }

    /// Construct `target` until it is complete.
    #[must_use]
    pub fn build(target: EntityId) -> Self {
        Self::with_goal(Goal::Build { target })
    }

    /// Attack `target` and whatever hostile replaces it.
    #[must_use]
    pub fn attack(target: EntityId) -> Self {
        Self::with_goal(Goal::Attack { target })
    }

    /// Placeholder that never completes.
    #[must_use]
    pub fn idle() -> Self {
        Self::with_goal(Goal::Idle)
    }

    /// Variant of the command.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self.goal {
            Goal::Move { .. } => CommandKind::Move,
            Goal::Harvest { .. } => CommandKind::Harvest,
            Goal::Build { .. } => CommandKind::Build,
            Goal::Attack { .. } => CommandKind::Attack,
            Goal::Idle => CommandKind::Idle,
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn status(&self) -> CommandStatus {
        self.status
    }

    /// Reports whether the command has started and not yet terminated.
    #[must_use]
    pub fn is_executing(&self) -> bool {
        self.status == CommandStatus::Executing
    }

    /// Reports whether the goal was reached.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == CommandStatus::Completed
    }

    /// Reports whether the command was interrupted.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.status == CommandStatus::Cancelled
    }

    /// Cell reserved by a move command.
    #[must_use]
    pub const fn reserved_cell(&self) -> Option<Cell> {
        self.reserved
    }

    /// Destination of a move command, redirected to the reserved cell once started.
    #[must_use]
    pub const fn destination(&self) -> Option<Vec3> {
        match self.goal {
            Goal::Move { destination, .. } => Some(destination),
            _ => None,
        }
    }

    /// Advances the command by one tick and returns its resulting phase.
    ///
    /// The first call starts the command. Terminal commands ignore updates.
    pub fn update(
        &mut self,
        agent: EntityId,
        capabilities: &mut AgentCapabilities,
        ctx: &mut SimContext<'_>,
    ) -> CommandStatus {
        match self.status {
            CommandStatus::Completed | CommandStatus::Cancelled => return self.status,
            CommandStatus::Created => {
                self.status = CommandStatus::Executing;
                if self.kind() != CommandKind::Idle {
                    tracing::debug!(?agent, kind = ?self.kind(), "command started");
                    ctx.emit(Event::CommandStarted {
                        agent,
                        kind: self.kind(),
                    });
                }
                self.start(agent, capabilities, ctx);
            }
            CommandStatus::Executing => self.advance(agent, capabilities, ctx),
        }

        if self.status == CommandStatus::Executing && self.goal_reached(agent, capabilities, ctx)
        {
            self.complete(agent, ctx);
        }
        self.status
    }

    /// Interrupts the command, releasing its reservation and stopping the
    /// capability it drives. Terminal commands are left untouched.
    pub fn cancel(
        &mut self,
        agent: EntityId,
        capabilities: &mut AgentCapabilities,
        ctx: &mut SimContext<'_>,
    ) {
        if self.status.is_terminal() {
            return;
        }
        let started = self.status == CommandStatus::Executing;
        self.status = CommandStatus::Cancelled;

        if started {
            match self.goal {
                Goal::Move { .. } => {
                    if let Some(cell) = self.reserved.take() {
                        ctx.world.release_cell_held_by(cell, agent);
                    }
                    if let Some(movement) = ctx.world.movement(agent) {
                        movement.stop_movement();
                    }
                }
                Goal::Harvest { .. } => {
                    if let Some(harvest) = capabilities.harvest.as_mut() {
                        harvest.stop_harvesting(agent, ctx);
                    }
                }
                Goal::Build { .. } => {
                    if let Some(build) = capabilities.build.as_mut() {
                        build.stop_building(agent, ctx);
                    }
                }
                Goal::Attack { .. } => {
                    if let Some(combat) = capabilities.combat.as_mut() {
                        combat.stop_attacking(agent, ctx);
                    }
                }
                Goal::Idle => {}
            }
        }

        if self.kind() != CommandKind::Idle {
            tracing::debug!(?agent, kind = ?self.kind(), "command cancelled");
            ctx.emit(Event::CommandCancelled {
                agent,
                kind: self.kind(),
            });
        }
    }

    fn start(
        &mut self,
        agent: EntityId,
        capabilities: &mut AgentCapabilities,
        ctx: &mut SimContext<'_>,
    ) {
        match self.goal {
            Goal::Move {
                destination,
                stopping_distance,
            } => self.start_move(agent, destination, stopping_distance, ctx),
            Goal::Harvest { target } => match capabilities.harvest.as_mut() {
                Some(harvest) => harvest.set_harvest_target(agent, target, ctx),
                None => self.complete(agent, ctx),
            },
            Goal::Build { target } => match capabilities.build.as_mut() {
                Some(build) => build.set_build_target(agent, target, ctx),
                None => self.complete(agent, ctx),
            },
            Goal::Attack { target } => match capabilities.combat.as_mut() {
                Some(combat) => combat.set_attack_target(agent, target, ctx),
                None => self.complete(agent, ctx),
            },
            Goal::Idle => {}
        }
    }

    fn start_move(
        &mut self,
        agent: EntityId,
        destination: Vec3,
        stopping_distance: f32,
        ctx: &mut SimContext<'_>,
    ) {
        if !ctx.world.has_movement(agent) {
            self.complete(agent, ctx);
            return;
        }

        ctx.world.release(agent);
        let wanted = ctx.world.world_to_cell(destination);
        let cell = ctx.world.find_nearest_free(wanted, agent);
        if ctx.world.is_cell_available_for(cell, agent) && ctx.world.reserve_cell(cell, agent) {
            self.reserved = Some(cell);
        } else {
            tracing::debug!(?agent, x = cell.x(), z = cell.z(), "move target left unreserved");
        }

        let redirected = ctx.world.cell_to_world(cell);
        self.goal = Goal::Move {
            destination: redirected,
            stopping_distance,
        };
        if let Some(movement) = ctx.world.movement(agent) {
            movement.move_to(redirected, stopping_distance);
        }
    }

    fn advance(
        &mut self,
        agent: EntityId,
        capabilities: &mut AgentCapabilities,
        ctx: &mut SimContext<'_>,
    ) {
        match self.goal {
            Goal::Move { .. } | Goal::Idle => {}
            Goal::Harvest { .. } => {
                if let Some(harvest) = capabilities.harvest.as_mut() {
                    harvest.tick_harvest(agent, ctx);
                }
            }
            Goal::Build { .. } => {
                if let Some(build) = capabilities.build.as_mut() {
                    build.tick_build(agent, ctx);
                }
            }
            Goal::Attack { .. } => {
                if let Some(combat) = capabilities.combat.as_mut() {
                    combat.tick_attack(agent, ctx);
                }
            }
        }
    }

    fn goal_reached(
        &self,
        agent: EntityId,
        capabilities: &AgentCapabilities,
        ctx: &mut SimContext<'_>,
    ) -> bool {
        match self.goal {
            Goal::Move {
                destination,
                stopping_distance,
            } => {
                let Some(position) = query::position(ctx.world, agent) else {
                    return true;
                };
                let moving = ctx
                    .world
                    .movement(agent)
                    .map_or(false, |movement| movement.is_moving());
                !moving || planar_distance(position, destination) <= stopping_distance
            }
            Goal::Harvest { .. } => capabilities.harvest.as_ref().map_or(true, |harvest| {
                harvest.harvest_target().is_none() && harvest.state() == BehaviorState::Idle
            }),
            Goal::Build { .. } => capabilities.build.as_ref().map_or(true, |build| {
                build.build_target().map_or(true, |site| {
                    ctx.world
                        .buildable(site)
                        .map_or(true, |site| site.is_complete())
                })
            }),
            Goal::Attack { .. } => capabilities
                .combat
                .as_ref()
                .map_or(true, |combat| combat.is_attack_finished()),
            Goal::Idle => false,
        }
    }

    fn complete(&mut self, agent: EntityId, ctx: &mut SimContext<'_>) {
        self.status = CommandStatus::Completed;
        if self.kind() != CommandKind::Idle {
            tracing::debug!(?agent, kind = ?self.kind(), "command completed");
            ctx.emit(Event::CommandCompleted {
                agent,
                kind: self.kind(),
            });
        }
    }
}

impl From<Order> for Command {
    fn from(order: Order) -> Self {
        match order {
            Order::Move { destination } => Self::move_to(destination),
            Order::Harvest { target } => Self::harvest(target),
            Order::Build { target } => Self::build(target),
            Order::Attack { target } => Self::attack(target),
            Order::Idle => Self::idle(),
        }
    }
}
