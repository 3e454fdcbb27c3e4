#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Explicit simulation context tying the world to every agent's commands.
//!
//! A [`Simulation`] owns the [`World`], one [`CommandExecutor`] and one
//! [`AgentCapabilities`] table per agent, and the events raised since the
//! last tick. Nothing is global, so any number of simulations can run side
//! by side.

mod config;
mod units;

pub use config::{
    BuilderSection, ConfigError, GridSection, HarvesterSection, SimConfig, UnitOverrides,
    UnitsSection,
};
pub use units::{Archetype, CombatStats, UnitProfile};

use std::{collections::BTreeMap, time::Duration};

use skirmish_core::{CommandKind, EntityId, Event, Faction, Order, Vec3, WorldCommand};
use skirmish_system_builder::Builder;
use skirmish_system_combat::Combatant;
use skirmish_system_commands::{AgentCapabilities, Command, CommandExecutor};
use skirmish_system_harvesting::Harvester;
use skirmish_world::{
    apply, query, AgentSpec, DepotSpec, NodeSpec, SimContext, SiteSpec, World, WorldError,
};
use thiserror::Error;

/// Errors raised while constructing a simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The world rejected its parameters.
    #[error(transparent)]
    World(#[from] WorldError),
}

#[derive(Debug)]
struct AgentSlot {
    archetype: Option<Archetype>,
    executor: CommandExecutor,
    capabilities: AgentCapabilities,
}

/// Headless skirmish simulation.
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    world: World,
    agents: BTreeMap<EntityId, AgentSlot>,
    pending: Vec<Event>,
}

impl Simulation {
    /// Creates an empty simulation from a validated configuration.
    pub fn new(config: SimConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let world = World::new(config.world())?;
        Ok(Self {
            config,
            world,
            agents: BTreeMap::new(),
            pending: Vec::new(),
        })
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Read-only view of the world for [`query`] calls.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Spawns a unit of `archetype` with its configured stats and capabilities.
    pub fn spawn_unit(
        &mut self,
        archetype: Archetype,
        faction: Faction,
        position: Vec3,
    ) -> EntityId {
        let profile = self.config.units.profile(archetype);
        let capabilities = match profile.combat {
            Some(stats) => AgentCapabilities::default().with_combat(Box::new(Combatant::new(
                stats.combat_profile(),
                stats.strategy_spec().build(),
            ))),
            None => AgentCapabilities::default()
                .with_harvest(Box::new(Harvester::new(self.config.harvester.to_config())))
                .with_build(Box::new(Builder::new(self.config.builder.to_config()))),
        };

        let spec = profile.agent_spec(faction, position);
        let agent = self.insert_agent(spec, capabilities, Some(archetype));
        tracing::debug!(?agent, ?archetype, ?faction, "unit spawned");
        agent
    }

    /// Spawns an agent with a custom body and capability table.
    pub fn spawn_agent(&mut self, spec: AgentSpec, capabilities: AgentCapabilities) -> EntityId {
        self.insert_agent(spec, capabilities, None)
    }

    /// Places a resource node.
    pub fn spawn_resource_node(&mut self, spec: NodeSpec) -> EntityId {
        self.world.spawn_resource_node(spec, &mut self.pending)
    }

    /// Places a build site.
    pub fn place_build_site(&mut self, spec: SiteSpec) -> EntityId {
        self.world.place_build_site(spec, &mut self.pending)
    }

    /// Places a finished deposit point.
    pub fn place_depot(&mut self, spec: DepotSpec) -> EntityId {
        self.world.place_depot(spec, &mut self.pending)
    }

    /// Replaces whatever `agent` is doing with `order`.
    ///
    /// Returns `false` when the agent is unknown.
    pub fn issue(&mut self, agent: EntityId, order: Order) -> bool {
        let Some(slot) = self.agents.get_mut(&agent) else {
            return false;
        };
        let mut ctx = SimContext::new(&mut self.world, Duration::ZERO, &mut self.pending);
        slot.executor
            .set_command(Command::from(order), agent, &mut slot.capabilities, &mut ctx);
        true
    }

    /// Appends `order` to the agent's queue.
    ///
    /// Returns `false` when the agent is unknown.
    pub fn queue(&mut self, agent: EntityId, order: Order) -> bool {
        let Some(slot) = self.agents.get_mut(&agent) else {
            return false;
        };
        slot.executor.enqueue(Command::from(order));
        true
    }

    /// Cancels the agent's active command and drops its queue.
    ///
    /// Returns `false` when the agent is unknown.
    pub fn halt(&mut self, agent: EntityId) -> bool {
        let Some(slot) = self.agents.get_mut(&agent) else {
            return false;
        };
        let mut ctx = SimContext::new(&mut self.world, Duration::ZERO, &mut self.pending);
        slot.executor
            .clear(agent, &mut slot.capabilities, &mut ctx);
        true
    }

    /// Applies an out-of-band world mutation such as scripted damage.
    pub fn apply(&mut self, command: WorldCommand) {
        apply(&mut self.world, command, &mut self.pending);
        self.reap();
    }

    /// Advances the simulation by `dt` and returns every event raised since
    /// the previous tick.
    ///
    /// Locomotion runs first, then each live agent's executor in id order,
    /// then agents that died during the tick are torn down.
    pub fn tick(&mut self, dt: Duration) -> Vec<Event> {
        apply(&mut self.world, WorldCommand::Tick { dt }, &mut self.pending);
        for (&agent, slot) in &mut self.agents {
            if !query::is_alive(&self.world, agent) {
                continue;
            }
            let mut ctx = SimContext::new(&mut self.world, dt, &mut self.pending);
            slot.executor
                .tick(agent, &mut slot.capabilities, &mut ctx);
        }
        self.reap();
        std::mem::take(&mut self.pending)
    }

    /// Agents managed by the simulation in id order.
    #[must_use]
    pub fn agents(&self) -> Vec<EntityId> {
        self.agents.keys().copied().collect()
    }

    /// Number of managed agents.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Archetype the agent was spawned from, if any.
    #[must_use]
    pub fn archetype(&self, agent: EntityId) -> Option<Archetype> {
        self.agents.get(&agent).and_then(|slot| slot.archetype)
    }

    /// Command the agent is currently executing.
    #[must_use]
    pub fn active_command(&self, agent: EntityId) -> Option<CommandKind> {
        self.agents
            .get(&agent)
            .and_then(|slot| slot.executor.active_kind())
    }

    /// Reports whether the agent has nothing left to do.
    #[must_use]
    pub fn is_idle(&self, agent: EntityId) -> bool {
        self.agents
            .get(&agent)
            .map_or(true, |slot| slot.executor.is_idle())
    }

    /// Capability table of the agent.
    #[must_use]
    pub fn capabilities(&self, agent: EntityId) -> Option<&AgentCapabilities> {
        self.agents.get(&agent).map(|slot| &slot.capabilities)
    }

    fn insert_agent(
        &mut self,
        spec: AgentSpec,
        capabilities: AgentCapabilities,
        archetype: Option<Archetype>,
    ) -> EntityId {
        let agent = self.world.spawn_agent(spec, &mut self.pending);
        let _ = self.agents.insert(
            agent,
            AgentSlot {
                archetype,
                executor: CommandExecutor::new(),
                capabilities,
            },
        );
        agent
    }

    /// Cancels and drops the commands of agents that died, then sweeps any
    /// reservation still held by a dead entity.
    fn reap(&mut self) {
        let dead: Vec<EntityId> = self
            .agents
            .keys()
            .copied()
            .filter(|agent| !query::is_alive(&self.world, *agent))
            .collect();
        for agent in dead {
            if let Some(mut slot) = self.agents.remove(&agent) {
                let mut ctx = SimContext::new(&mut self.world, Duration::ZERO, &mut self.pending);
                slot.executor
                    .clear(agent, &mut slot.capabilities, &mut ctx);
                tracing::debug!(?agent, "agent reaped");
            }
        }

        let evicted = self.world.purge_stale();
        if evicted > 0 {
            tracing::debug!(evicted, "stale reservations swept");
        }
    }
}
