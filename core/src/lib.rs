#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Skirmish simulation.
//!
//! This crate defines the vocabulary that connects the authoritative world,
//! the reservation index, the per-agent behaviours and the adapters. Gameplay
//! input turns player intent into [`Order`] values, the simulation converts
//! orders into commands and drives them once per tick, and every observable
//! state change is broadcast as an [`Event`]. Collaborator systems plug in
//! through the capability traits declared at the bottom of this crate.

use std::time::Duration;

pub use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Canonical banner emitted when the experience boots.
pub const WELCOME_BANNER: &str = "Skirmish simulation core.";

/// Generation-checked handle referring to an entity owned by the world.
///
/// The index addresses a slot in the world's entity arena while the
/// generation distinguishes successive occupants of that slot. A handle whose
/// generation no longer matches the slot refers to a destroyed entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    index: u32,
    generation: u32,
}

impl EntityId {
    /// Creates a handle from an arena index and generation counter.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot addressed by the handle.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot occupant the handle was issued for.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

/// Oracle answering whether an entity handle still refers to a live entity.
pub trait EntityLiveness {
    /// Reports whether `entity` is currently alive.
    fn is_alive(&self, entity: EntityId) -> bool;
}

/// Discrete ground cell derived from a continuous world position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    x: i32,
    z: i32,
}

impl Cell {
    /// Creates a new cell coordinate.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Cell index along the world x axis.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Cell index along the world z axis.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.z
    }

    /// Returns the cell displaced by the provided offsets.
    #[must_use]
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            z: self.z.saturating_add(dz),
        }
    }

    /// Squared Euclidean distance between two cells on the grid.
    #[must_use]
    pub fn distance_squared(self, other: Cell) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dz = i64::from(self.z) - i64::from(other.z);
        dx * dx + dz * dz
    }

    /// Chebyshev distance, i.e. the index of the square ring around `self`
    /// that contains `other`.
    #[must_use]
    pub fn ring_distance(self, other: Cell) -> u32 {
        self.x.abs_diff(other.x).max(self.z.abs_diff(other.z))
    }
}

/// Allegiance of an agent or structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Faction(u8);

impl Faction {
    /// Creates a faction from its numeric identifier.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Numeric identifier of the faction.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }

    /// Every other faction is hostile.
    #[must_use]
    pub const fn is_hostile_to(self, other: Faction) -> bool {
        self.0 != other.0
    }
}

/// Resources that can be harvested and deposited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Timber gathered from trees.
    Wood,
    /// Quarried stone.
    Stone,
    /// Gold ore.
    Gold,
}

/// Player intent produced by gameplay input resolution.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Order {
    /// Walk to the provided world position.
    Move {
        /// Requested destination in world units.
        destination: Vec3,
    },
    /// Harvest the provided resource node.
    Harvest {
        /// Resource node to harvest from.
        target: EntityId,
    },
    /// Construct the provided build site.
    Build {
        /// Build site to work on.
        target: EntityId,
    },
    /// Attack the provided entity.
    Attack {
        /// Entity to attack.
        target: EntityId,
    },
    /// Do nothing until told otherwise.
    Idle,
}

impl Order {
    /// Tag describing which command variant the order produces.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::Move { .. } => CommandKind::Move,
            Self::Harvest { .. } => CommandKind::Harvest,
            Self::Build { .. } => CommandKind::Build,
            Self::Attack { .. } => CommandKind::Attack,
            Self::Idle => CommandKind::Idle,
        }
    }
}

/// Tag identifying a command variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Move to a cell.
    Move,
    /// Harvest a resource node.
    Harvest,
    /// Construct a build site.
    Build,
    /// Attack an entity.
    Attack,
    /// Placeholder used while nothing else is queued.
    Idle,
}

/// Phase of the harvester and builder behaviour state machines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorState {
    /// Not pursuing any target.
    #[default]
    Idle,
    /// Looking for a new target nearby.
    Searching,
    /// Walking to a slot next to the target.
    MovingToTarget,
    /// Harvesting or building on a cooldown.
    Acting,
    /// Carrying resources to a deposit point.
    MovingToDeposit,
    /// Handing the carried resources over.
    Depositing,
}

/// Category of an entity stored in the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Mobile or static unit driven by a command executor.
    Agent,
    /// Harvestable resource node.
    ResourceNode,
    /// Structure under construction.
    BuildSite,
    /// Structure that accepts resource deposits.
    DepositPoint,
}

/// Mutations that external collaborators may request from the world.
#[derive(Clone, Debug, PartialEq)]
pub enum WorldCommand {
    /// Advances the simulation clock and integrates locomotion.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Destroys an entity, releasing every reservation it holds.
    Destroy {
        /// Entity to destroy.
        entity: EntityId,
    },
    /// Deals damage to an entity.
    Damage {
        /// Entity responsible for the damage.
        attacker: EntityId,
        /// Entity receiving the damage.
        target: EntityId,
        /// Hit points removed.
        amount: u32,
    },
}

/// Events broadcast while the simulation advances.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a new entity entered the world.
    EntitySpawned {
        /// Identifier assigned to the entity.
        entity: EntityId,
        /// Category of the spawned entity.
        kind: EntityKind,
    },
    /// Confirms that an entity left the world.
    EntityDestroyed {
        /// Identifier of the destroyed entity.
        entity: EntityId,
    },
    /// A command received its first update.
    CommandStarted {
        /// Agent executing the command.
        agent: EntityId,
        /// Variant of the command.
        kind: CommandKind,
    },
    /// A command reached its goal.
    CommandCompleted {
        /// Agent that executed the command.
        agent: EntityId,
        /// Variant of the command.
        kind: CommandKind,
    },
    /// A command was interrupted before reaching its goal.
    CommandCancelled {
        /// Agent that executed the command.
        agent: EntityId,
        /// Variant of the command.
        kind: CommandKind,
    },
    /// A harvester or builder changed behaviour state.
    BehaviorChanged {
        /// Agent owning the behaviour.
        agent: EntityId,
        /// State that was exited.
        from: BehaviorState,
        /// State that was entered.
        to: BehaviorState,
    },
    /// Resources moved from a node into an agent's load.
    ResourceHarvested {
        /// Harvesting agent.
        agent: EntityId,
        /// Node the resources came from.
        node: EntityId,
        /// Kind of resource harvested.
        kind: ResourceKind,
        /// Amount taken from the node.
        amount: u32,
    },
    /// A resource node ran out.
    NodeDepleted {
        /// Node that was depleted.
        node: EntityId,
    },
    /// An agent handed its load to a deposit point.
    ResourceDeposited {
        /// Depositing agent.
        agent: EntityId,
        /// Deposit point that received the load.
        depot: EntityId,
        /// Kind of resource deposited.
        kind: ResourceKind,
        /// Amount credited to the faction stockpile.
        amount: u32,
    },
    /// Construction work was applied to a build site.
    ConstructionProgressed {
        /// Agent that performed the work.
        agent: EntityId,
        /// Site that received the work.
        site: EntityId,
        /// Work accumulated so far.
        work_done: u32,
        /// Work required for completion.
        work_required: u32,
    },
    /// A build site reached full completion.
    ConstructionCompleted {
        /// Site that was completed.
        site: EntityId,
    },
    /// A projectile left its launcher.
    ProjectileLaunched {
        /// Agent that fired the projectile.
        attacker: EntityId,
        /// Entity the projectile is aimed at.
        target: EntityId,
    },
    /// Damage was dealt to an entity.
    DamageDealt {
        /// Entity responsible for the damage.
        attacker: EntityId,
        /// Entity that lost hit points.
        target: EntityId,
        /// Hit points removed.
        amount: u32,
    },
}

/// Distance between two points measured on the ground (x/z) plane.
#[must_use]
pub fn planar_distance(from: Vec3, to: Vec3) -> f32 {
    let dx = to.x - from.x;
    let dz = to.z - from.z;
    (dx * dx + dz * dz).sqrt()
}

/// Point at `distance` from `center`, on the side facing `from`.
///
/// When `from` coincides with `center` the point lies along the positive x
/// axis so callers always receive a usable position.
#[must_use]
pub fn approach_point(center: Vec3, from: Vec3, distance: f32) -> Vec3 {
    let offset = Vec3::new(from.x - center.x, 0.0, from.z - center.z);
    let direction = if offset.length_squared() > f32::EPSILON {
        offset.normalize()
    } else {
        Vec3::X
    };
    center + direction * distance
}

/// Locomotion exposed by an agent body.
pub trait MovementCapability {
    /// Starts moving toward `destination`, stopping within `stopping_distance`.
    fn move_to(&mut self, destination: Vec3, stopping_distance: f32);
    /// Cancels any pending destination.
    fn stop_movement(&mut self);
    /// Reports whether a destination is still being pursued.
    fn is_moving(&self) -> bool;
    /// Current world position.
    fn position(&self) -> Vec3;
    /// Footprint edge length measured in cells.
    fn footprint(&self) -> u32;
    /// Turns the body toward `point` without moving.
    fn face_towards(&mut self, point: Vec3);
}

/// Contract of an entity that can be harvested.
pub trait Harvestable {
    /// Kind of resource yielded.
    fn resource_kind(&self) -> ResourceKind;
    /// Amount left in the node.
    fn remaining(&self) -> u32;
    /// Whether the node is accepting harvesters.
    fn is_active(&self) -> bool;
    /// Centre of the node.
    fn position(&self) -> Vec3;
    /// Distance from the centre to the edge of the footprint.
    fn interaction_radius(&self) -> f32;
    /// Position next to the node from which `from` should harvest.
    fn harvest_position(&self, from: Vec3) -> Vec3;
    /// Removes up to `amount` and returns how much was taken.
    fn take(&mut self, amount: u32) -> u32;

    /// Whether the node ran out of resources.
    fn is_depleted(&self) -> bool {
        self.remaining() == 0
    }
}

/// Contract of an entity that can be constructed.
pub trait Buildable {
    /// Faction that owns the site.
    fn faction(&self) -> Faction;
    /// Centre of the site.
    fn position(&self) -> Vec3;
    /// Polygon vertices surrounding the footprint, used to derive build slots.
    fn anchors(&self) -> &[Vec3];
    /// Distance from the centre to the edge of the footprint.
    fn interaction_radius(&self) -> f32;
    /// Work accumulated so far.
    fn work_done(&self) -> u32;
    /// Work required to finish construction.
    fn work_required(&self) -> u32;
    /// Adds up to `amount` work and returns how much was applied.
    fn apply_work(&mut self, amount: u32) -> u32;

    /// Whether construction is finished.
    fn is_complete(&self) -> bool {
        self.work_done() >= self.work_required()
    }
}

/// Contract of a structure that accepts resource deposits.
pub trait DepositPoint {
    /// Faction allowed to deposit here.
    fn faction(&self) -> Faction;
    /// Preference rank; lower values are chosen first.
    fn priority(&self) -> u32;
    /// Whether `kind` can be deposited here.
    fn accepts(&self, kind: ResourceKind) -> bool;
    /// Centre of the structure.
    fn position(&self) -> Vec3;
    /// Distance from the centre to the edge of the footprint.
    fn interaction_radius(&self) -> f32;
    /// Position next to the structure from which `from` should deposit.
    fn deposit_position(&self, from: Vec3) -> Vec3;
}
