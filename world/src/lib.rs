#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for the Skirmish simulation.
//!
//! The world owns every entity (agents, resource nodes, build sites and
//! deposit points), the generation arena that decides which handles are
//! still alive, and the cell index through which all of them claim ground.
//! Commands and behaviours mutate it through the narrow methods exposed here
//! while adapters read it through the [`query`] module.

mod capability;
mod context;
mod entities;
mod locomotion;
mod structures;

pub use capability::{BuildCapability, CombatCapability, HarvestCapability};
pub use context::SimContext;
pub use structures::{AgentSpec, DepotProfile, DepotSpec, NodeSpec, SiteSpec};

use std::{collections::BTreeMap, time::Duration};

use skirmish_core::{
    Buildable, Cell, DepositPoint, EntityId, EntityKind, EntityLiveness, Event, Faction,
    Harvestable, MovementCapability, ResourceKind, Vec3, WorldCommand, WELCOME_BANNER,
};
use skirmish_system_reservation::{
    CellGeometry, CellIndex, GridError, PerimeterSlots, DEFAULT_SEARCH_RADIUS,
};
use thiserror::Error;

use entities::EntityArena;
use locomotion::Locomotion;
use structures::{BuildSite, Depot, Footprint, ResourceNode};

/// Grid parameters of a world.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldConfig {
    /// Edge length of a cell in world units.
    pub cell_size: f32,
    /// Ring bound of the nearest-free-cell search.
    pub search_radius: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            cell_size: 1.0,
            search_radius: DEFAULT_SEARCH_RADIUS,
        }
    }
}

/// Errors raised while constructing a world.
#[derive(Debug, Error)]
pub enum WorldError {
    /// The grid could not be configured.
    #[error("invalid grid configuration")]
    Grid(#[from] GridError),
}

#[derive(Clone, Debug)]
struct AgentBody {
    faction: Faction,
    health: u32,
    max_health: u32,
    body: Locomotion,
}

/// Represents the authoritative Skirmish world state.
#[derive(Debug)]
pub struct World {
    banner: &'static str,
    entities: EntityArena,
    cells: CellIndex,
    agents: BTreeMap<EntityId, AgentBody>,
    nodes: BTreeMap<EntityId, ResourceNode>,
    sites: BTreeMap<EntityId, BuildSite>,
    depots: BTreeMap<EntityId, Depot>,
    stockpiles: BTreeMap<(Faction, ResourceKind), u32>,
    tick_index: u64,
}

impl World {
    /// Creates an empty world over the configured grid.
    pub fn new(config: WorldConfig) -> Result<Self, WorldError> {
        let geometry = CellGeometry::new(config.cell_size)?;
        Ok(Self {
            banner: WELCOME_BANNER,
            entities: EntityArena::default(),
            cells: CellIndex::new(geometry, config.search_radius),
            agents: BTreeMap::new(),
            nodes: BTreeMap::new(),
            sites: BTreeMap::new(),
            depots: BTreeMap::new(),
            stockpiles: BTreeMap::new(),
            tick_index: 0,
        })
    }

    /// Geometry shared by every cell conversion in the world.
    #[must_use]
    pub fn geometry(&self) -> CellGeometry {
        self.cells.geometry()
    }

    /// Cell containing `position`.
    #[must_use]
    pub fn world_to_cell(&self, position: Vec3) -> Cell {
        self.cells.world_to_cell(position)
    }

    /// Centre of `cell`.
    #[must_use]
    pub fn cell_to_world(&self, cell: Cell) -> Vec3 {
        self.cells.cell_to_world(cell)
    }

    /// Spawns an agent body and reserves the ground under it.
    pub fn spawn_agent(&mut self, spec: AgentSpec, out_events: &mut Vec<Event>) -> EntityId {
        let id = self.entities.allocate();
        let body = Locomotion::new(spec.position, spec.speed, spec.footprint);
        let _ = self
            .cells
            .reserve_area(spec.position, body.footprint(), id, &self.entities);
        let max_health = spec.max_health.max(1);
        let _ = self.agents.insert(
            id,
            AgentBody {
                faction: spec.faction,
                health: max_health,
                max_health,
                body,
            },
        );
        tracing::debug!(?id, faction = spec.faction.get(), "agent spawned");
        out_events.push(Event::EntitySpawned {
            entity: id,
            kind: EntityKind::Agent,
        });
        id
    }

    /// Spawns a resource node and reserves its footprint.
    pub fn spawn_resource_node(&mut self, spec: NodeSpec, out_events: &mut Vec<Event>) -> EntityId {
        let id = self.entities.allocate();
        let footprint = Footprint::snap(&self.geometry(), spec.position, spec.footprint);
        let _ = self
            .cells
            .reserve_area(spec.position, footprint.size(), id, &self.entities);
        let _ = self.nodes.insert(
            id,
            ResourceNode {
                kind: spec.kind,
                remaining: spec.amount,
                active: true,
                footprint,
            },
        );
        out_events.push(Event::EntitySpawned {
            entity: id,
            kind: EntityKind::ResourceNode,
        });
        id
    }

    /// Places a build site and reserves its footprint.
    pub fn place_build_site(&mut self, spec: SiteSpec, out_events: &mut Vec<Event>) -> EntityId {
        let id = self.entities.allocate();
        let geometry = self.geometry();
        let footprint = Footprint::snap(&geometry, spec.position, spec.footprint);
        let _ = self
            .cells
            .reserve_area(spec.position, footprint.size(), id, &self.entities);
        let max_health = spec.max_health.max(1);
        let _ = self.sites.insert(
            id,
            BuildSite {
                faction: spec.faction,
                anchors: footprint.outline(&geometry),
                footprint,
                work_done: 0,
                work_required: spec.work_required,
                health: max_health,
                max_health,
                depot: spec.depot,
            },
        );
        out_events.push(Event::EntitySpawned {
            entity: id,
            kind: EntityKind::BuildSite,
        });
        id
    }

    /// Places a finished deposit point and reserves its footprint.
    pub fn place_depot(&mut self, spec: DepotSpec, out_events: &mut Vec<Event>) -> EntityId {
        let id = self.entities.allocate();
        let footprint = Footprint::snap(&self.geometry(), spec.position, spec.footprint);
        let _ = self
            .cells
            .reserve_area(spec.position, footprint.size(), id, &self.entities);
        let _ = self.depots.insert(
            id,
            Depot {
                faction: spec.faction,
                footprint,
                profile: spec.profile,
            },
        );
        out_events.push(Event::EntitySpawned {
            entity: id,
            kind: EntityKind::DepositPoint,
        });
        id
    }

    /// Removes an entity and every reservation it holds.
    ///
    /// Returns `false` when the handle no longer refers to a live entity.
    pub fn destroy(&mut self, entity: EntityId, out_events: &mut Vec<Event>) -> bool {
        if !self.entities.free(entity) {
            return false;
        }
        let _ = self.agents.remove(&entity);
        let _ = self.nodes.remove(&entity);
        let _ = self.sites.remove(&entity);
        let _ = self.depots.remove(&entity);
        self.cells.release(entity);
        tracing::debug!(?entity, "entity destroyed");
        out_events.push(Event::EntityDestroyed { entity });
        true
    }

    /// Removes hit points from an agent or build site, destroying it at zero.
    pub fn apply_damage(
        &mut self,
        attacker: EntityId,
        target: EntityId,
        amount: u32,
        out_events: &mut Vec<Event>,
    ) -> bool {
        let health = if let Some(agent) = self.agents.get_mut(&target) {
            &mut agent.health
        } else if let Some(site) = self.sites.get_mut(&target) {
            &mut site.health
        } else {
            return false;
        };

        *health = health.saturating_sub(amount);
        let destroyed = *health == 0;
        out_events.push(Event::DamageDealt {
            attacker,
            target,
            amount,
        });
        if destroyed {
            let _ = self.destroy(target, out_events);
        }
        true
    }

    /// Movement capability of `agent`, absent for immobile or unknown agents.
    pub fn movement(&mut self, agent: EntityId) -> Option<&mut dyn MovementCapability> {
        self.agents
            .get_mut(&agent)
            .map(|agent| &mut agent.body)
            .filter(|body| body.is_mobile())
            .map(|body| body as &mut dyn MovementCapability)
    }

    /// Reports whether `agent` can move.
    #[must_use]
    pub fn has_movement(&self, agent: EntityId) -> bool {
        self.agents
            .get(&agent)
            .map_or(false, |agent| agent.body.is_mobile())
    }

    /// Turns `agent` toward `point`; immobile agents can still turn.
    pub fn face(&mut self, agent: EntityId, point: Vec3) {
        if let Some(agent) = self.agents.get_mut(&agent) {
            agent.body.face_towards(point);
        }
    }

    /// Harvest contract of a resource node.
    #[must_use]
    pub fn harvestable(&self, node: EntityId) -> Option<&dyn Harvestable> {
        self.nodes.get(&node).map(|node| node as &dyn Harvestable)
    }

    /// Construction contract of a build site.
    #[must_use]
    pub fn buildable(&self, site: EntityId) -> Option<&dyn Buildable> {
        self.sites.get(&site).map(|site| site as &dyn Buildable)
    }

    /// Deposit contract of a deposit point.
    #[must_use]
    pub fn deposit_point(&self, depot: EntityId) -> Option<&dyn DepositPoint> {
        self.depots.get(&depot).map(|depot| depot as &dyn DepositPoint)
    }

    /// Opens or closes a resource node to harvesters.
    pub fn set_node_active(&mut self, node: EntityId, active: bool) -> bool {
        match self.nodes.get_mut(&node) {
            Some(node) => {
                node.active = active;
                true
            }
            None => false,
        }
    }

    /// Moves up to `amount` from `node` into the hands of `agent`.
    ///
    /// A node that runs dry is destroyed. Returns the kind and amount taken,
    /// or `None` when either party is missing or the node is inactive.
    pub fn harvest(
        &mut self,
        agent: EntityId,
        node: EntityId,
        amount: u32,
        out_events: &mut Vec<Event>,
    ) -> Option<(ResourceKind, u32)> {
        if !self.agents.contains_key(&agent) {
            return None;
        }
        let resource = self.nodes.get_mut(&node)?;
        if !resource.is_active() {
            return None;
        }

        let kind = resource.resource_kind();
        let taken = resource.take(amount);
        let depleted = resource.is_depleted();
        if taken > 0 {
            out_events.push(Event::ResourceHarvested {
                agent,
                node,
                kind,
                amount: taken,
            });
        }
        if depleted {
            tracing::debug!(?node, "resource node depleted");
            out_events.push(Event::NodeDepleted { node });
            let _ = self.destroy(node, out_events);
        }
        Some((kind, taken))
    }

    /// Applies up to `amount` work from `agent` to a friendly build site.
    ///
    /// A site completed with a depot profile turns into a deposit point that
    /// keeps its handle and footprint.
    pub fn construct(
        &mut self,
        agent: EntityId,
        site: EntityId,
        amount: u32,
        out_events: &mut Vec<Event>,
    ) -> Option<u32> {
        let faction = self.agents.get(&agent)?.faction;
        let target = self.sites.get_mut(&site)?;
        if target.faction != faction || target.is_complete() {
            return None;
        }

        let applied = target.apply_work(amount);
        out_events.push(Event::ConstructionProgressed {
            agent,
            site,
            work_done: target.work_done(),
            work_required: target.work_required(),
        });
        if !target.is_complete() {
            return Some(applied);
        }

        tracing::info!(?site, "construction completed");
        out_events.push(Event::ConstructionCompleted { site });
        let converted = target.depot.take().map(|profile| Depot {
            faction: target.faction,
            footprint: target.footprint.clone(),
            profile,
        });
        if let Some(depot) = converted {
            let _ = self.sites.remove(&site);
            let _ = self.depots.insert(site, depot);
        }
        Some(applied)
    }

    /// Credits `amount` of `kind` carried by `agent` to its faction stockpile.
    pub fn deposit(
        &mut self,
        agent: EntityId,
        depot: EntityId,
        kind: ResourceKind,
        amount: u32,
        out_events: &mut Vec<Event>,
    ) -> bool {
        let Some(faction) = self.agents.get(&agent).map(|agent| agent.faction) else {
            return false;
        };
        let Some(target) = self.depots.get(&depot) else {
            return false;
        };
        if target.faction != faction || !target.accepts(kind) {
            return false;
        }

        *self.stockpiles.entry((faction, kind)).or_insert(0) += amount;
        out_events.push(Event::ResourceDeposited {
            agent,
            depot,
            kind,
            amount,
        });
        true
    }

    /// Reports whether no live entity holds `cell`.
    pub fn is_cell_free(&mut self, cell: Cell) -> bool {
        self.cells.is_free(cell, &self.entities)
    }

    /// Reports whether `cell` is free or already held by `entity`.
    pub fn is_cell_available_for(&mut self, cell: Cell, entity: EntityId) -> bool {
        self.cells.is_available_for(cell, entity, &self.entities)
    }

    /// Claims `cell` for `entity`, dropping whatever it held before.
    pub fn reserve_cell(&mut self, cell: Cell, entity: EntityId) -> bool {
        self.cells.reserve(cell, entity, &self.entities)
    }

    /// Nearest cell to `target` that is free or held by `requester`.
    pub fn find_nearest_free(&mut self, target: Cell, requester: EntityId) -> Cell {
        self.cells.find_nearest_free(target, requester, &self.entities)
    }

    /// Reserves the closest free slot of `slots` for `requester`.
    pub fn claim_perimeter_slot(
        &mut self,
        slots: &PerimeterSlots,
        from: Cell,
        requester: EntityId,
    ) -> Option<Cell> {
        slots.claim(&mut self.cells, from, requester, &self.entities)
    }

    /// Drops every reservation held by `entity`.
    pub fn release(&mut self, entity: EntityId) {
        self.cells.release(entity);
    }

    /// Drops the reservation on `cell`, whoever holds it.
    pub fn release_cell(&mut self, cell: Cell) {
        self.cells.release_cell(cell);
    }

    /// Drops the reservation on `cell` only if `entity` holds it.
    pub fn release_cell_held_by(&mut self, cell: Cell, entity: EntityId) {
        self.cells.release_cell_held_by(cell, entity);
    }

    /// Evicts reservations whose owners are gone and returns how many cells were freed.
    pub fn purge_stale(&mut self) -> usize {
        self.cells.purge_stale(&self.entities)
    }

    /// Cells currently reserved by `entity`.
    #[must_use]
    pub fn cells_of(&self, entity: EntityId) -> Vec<Cell> {
        self.cells.cells_of(entity).collect()
    }

    fn advance(&mut self, dt: Duration) {
        self.tick_index = self.tick_index.saturating_add(1);
        for agent in self.agents.values_mut() {
            agent.body.advance(dt);
        }
    }
}

impl EntityLiveness for World {
    fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.is_alive(entity)
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: WorldCommand, out_events: &mut Vec<Event>) {
    match command {
        WorldCommand::Tick { dt } => {
            world.advance(dt);
            out_events.push(Event::TimeAdvanced { dt });
        }
        WorldCommand::Destroy { entity } => {
            let _ = world.destroy(entity, out_events);
        }
        WorldCommand::Damage {
            attacker,
            target,
            amount,
        } => {
            let _ = world.apply_damage(attacker, target, amount, out_events);
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use skirmish_core::{
        planar_distance, Buildable, Cell, DepositPoint, EntityId, EntityKind, EntityLiveness,
        Faction, Harvestable, ResourceKind, Vec3,
    };

    use super::World;

    /// Retrieves the welcome banner that adapters may display.
    #[must_use]
    pub fn welcome_banner(world: &World) -> &'static str {
        world.banner
    }

    /// Number of ticks applied so far.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Number of live entities of every kind.
    #[must_use]
    pub fn entity_count(world: &World) -> usize {
        world.entities.len()
    }

    /// Reports whether `entity` still exists.
    #[must_use]
    pub fn is_alive(world: &World, entity: EntityId) -> bool {
        world.is_alive(entity)
    }

    /// Category of a live entity.
    #[must_use]
    pub fn kind(world: &World, entity: EntityId) -> Option<EntityKind> {
        if world.agents.contains_key(&entity) {
            Some(EntityKind::Agent)
        } else if world.nodes.contains_key(&entity) {
            Some(EntityKind::ResourceNode)
        } else if world.sites.contains_key(&entity) {
            Some(EntityKind::BuildSite)
        } else if world.depots.contains_key(&entity) {
            Some(EntityKind::DepositPoint)
        } else {
            None
        }
    }

    /// World position of any live entity.
    #[must_use]
    pub fn position(world: &World, entity: EntityId) -> Option<Vec3> {
        if let Some(agent) = world.agents.get(&entity) {
            return Some(skirmish_core::MovementCapability::position(&agent.body));
        }
        if let Some(node) = world.nodes.get(&entity) {
            return Some(Harvestable::position(node));
        }
        if let Some(site) = world.sites.get(&entity) {
            return Some(Buildable::position(site));
        }
        world.depots.get(&entity).map(|depot| depot.position())
    }

    /// Allegiance of an agent or structure.
    #[must_use]
    pub fn faction(world: &World, entity: EntityId) -> Option<Faction> {
        if let Some(agent) = world.agents.get(&entity) {
            return Some(agent.faction);
        }
        if let Some(site) = world.sites.get(&entity) {
            return Some(site.faction);
        }
        world.depots.get(&entity).map(|depot| depot.faction)
    }

    /// Remaining hit points of an agent or build site.
    #[must_use]
    pub fn health(world: &World, entity: EntityId) -> Option<u32> {
        world
            .agents
            .get(&entity)
            .map(|agent| agent.health)
            .or_else(|| world.sites.get(&entity).map(|site| site.health))
    }

    /// Hit point ceiling of an agent or build site.
    #[must_use]
    pub fn max_health(world: &World, entity: EntityId) -> Option<u32> {
        world
            .agents
            .get(&entity)
            .map(|agent| agent.max_health)
            .or_else(|| world.sites.get(&entity).map(|site| site.max_health))
    }

    /// Closest active, non-depleted node within `radius` of `origin`.
    ///
    /// `kind` restricts the search to one resource. Ties resolve to the
    /// lowest handle.
    #[must_use]
    pub fn nearest_harvestable(
        world: &World,
        origin: Vec3,
        radius: f32,
        kind: Option<ResourceKind>,
    ) -> Option<EntityId> {
        let mut best: Option<(f32, EntityId)> = None;
        for (id, node) in &world.nodes {
            if !node.is_active() || node.is_depleted() {
                continue;
            }
            if kind.map_or(false, |kind| kind != node.resource_kind()) {
                continue;
            }
            let distance = planar_distance(origin, node.position());
            if distance > radius {
                continue;
            }
            if best.map_or(true, |(current, _)| distance < current) {
                best = Some((distance, *id));
            }
        }
        best.map(|(_, id)| id)
    }

    /// Preferred drop-off for `kind` carried by a member of `faction` at `from`.
    ///
    /// Lowest priority value wins, then the nearest, then the lowest handle.
    #[must_use]
    pub fn best_deposit_point(
        world: &World,
        faction: Faction,
        kind: ResourceKind,
        from: Vec3,
    ) -> Option<EntityId> {
        let mut best: Option<(u32, f32, EntityId)> = None;
        for (id, depot) in &world.depots {
            if depot.faction != faction || !depot.accepts(kind) {
                continue;
            }
            let priority = depot.priority();
            let distance = planar_distance(from, depot.position());
            let better = match best {
                None => true,
                Some((best_priority, best_distance, _)) => {
                    priority < best_priority
                        || (priority == best_priority && distance < best_distance)
                }
            };
            if better {
                best = Some((priority, distance, *id));
            }
        }
        best.map(|(_, _, id)| id)
    }

    /// Reports whether `target` is a live agent or build site hostile to `faction`.
    #[must_use]
    pub fn is_hostile_target(world: &World, faction: Faction, target: EntityId) -> bool {
        let owner = world
            .agents
            .get(&target)
            .map(|agent| agent.faction)
            .or_else(|| world.sites.get(&target).map(|site| site.faction));
        owner.map_or(false, |owner| owner.is_hostile_to(faction))
    }

    /// Closest hostile agent or build site within `radius` of `origin`.
    ///
    /// Distances compare by square; ties resolve to the lowest handle.
    #[must_use]
    pub fn nearest_hostile(
        world: &World,
        faction: Faction,
        origin: Vec3,
        radius: f32,
    ) -> Option<EntityId> {
        let agents = world.agents.iter().map(|(id, agent)| {
            (
                *id,
                agent.faction,
                skirmish_core::MovementCapability::position(&agent.body),
            )
        });
        let sites = world
            .sites
            .iter()
            .map(|(id, site)| (*id, site.faction, Buildable::position(site)));

        let limit = radius * radius;
        let mut best: Option<(f32, EntityId)> = None;
        for (id, owner, position) in agents.chain(sites) {
            if !owner.is_hostile_to(faction) {
                continue;
            }
            let dx = position.x - origin.x;
            let dz = position.z - origin.z;
            let distance = dx * dx + dz * dz;
            if distance > limit {
                continue;
            }
            let better = match best {
                None => true,
                Some((current, current_id)) => {
                    distance < current || (distance == current && id < current_id)
                }
            };
            if better {
                best = Some((distance, id));
            }
        }
        best.map(|(_, id)| id)
    }

    /// Amount of `kind` stockpiled by `faction`.
    #[must_use]
    pub fn stockpile(world: &World, faction: Faction, kind: ResourceKind) -> u32 {
        world
            .stockpiles
            .get(&(faction, kind))
            .copied()
            .unwrap_or(0)
    }

    /// Handles of every resource node in ascending order.
    #[must_use]
    pub fn resource_nodes(world: &World) -> Vec<EntityId> {
        world.nodes.keys().copied().collect()
    }

    /// Handles of every build site in ascending order.
    #[must_use]
    pub fn build_sites(world: &World) -> Vec<EntityId> {
        world.sites.keys().copied().collect()
    }

    /// Handles of every deposit point in ascending order.
    #[must_use]
    pub fn deposit_points(world: &World) -> Vec<EntityId> {
        world.depots.keys().copied().collect()
    }

    /// Entity holding `cell`, without checking liveness.
    #[must_use]
    pub fn cell_owner(world: &World, cell: Cell) -> Option<EntityId> {
        world.cells.owner(cell)
    }

    /// Captures a read-only view of every agent.
    #[must_use]
    pub fn agent_view(world: &World) -> AgentView {
        let snapshots = world
            .agents
            .iter()
            .map(|(id, agent)| AgentSnapshot {
                id: *id,
                faction: agent.faction,
                position: skirmish_core::MovementCapability::position(&agent.body),
                facing: agent.body.facing(),
                destination: agent.body.destination(),
                health: agent.health,
                max_health: agent.max_health,
            })
            .collect();
        AgentView { snapshots }
    }

    /// Read-only snapshot describing all agents.
    #[derive(Clone, Debug)]
    pub struct AgentView {
        snapshots: Vec<AgentSnapshot>,
    }

    impl AgentView {
        /// Iterator over the captured snapshots in ascending handle order.
        pub fn iter(&self) -> impl Iterator<Item = &AgentSnapshot> {
            self.snapshots.iter()
        }

        /// Consumes the view, yielding the underlying snapshots.
        pub fn into_vec(self) -> Vec<AgentSnapshot> {
            self.snapshots
        }
    }

    /// Immutable representation of a single agent.
    #[derive(Clone, Debug, PartialEq)]
    pub struct AgentSnapshot {
        /// Handle of the agent.
        pub id: EntityId,
        /// Allegiance of the agent.
        pub faction: Faction,
        /// Current world position.
        pub position: Vec3,
        /// Unit vector the agent faces.
        pub facing: Vec3,
        /// Destination being walked to, if any.
        pub destination: Option<Vec3>,
        /// Remaining hit points.
        pub health: u32,
        /// Hit points on spawn.
        pub max_health: u32,
    }
}
