#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Exclusive-occupancy index that maps ground cells to the entity claiming them.
//!
//! The index is the single shared mutable resource of the simulation. Every
//! agent and structure claims cells through it, and because the lifecycle of
//! those entities is managed elsewhere the API is defensive: releases are
//! idempotent and reservations held by entities that no longer exist are
//! evicted lazily the next time anybody looks at them.

mod perimeter;

pub use perimeter::{rasterize_line, PerimeterSlots};

use std::collections::{BTreeMap, BTreeSet};

use skirmish_core::{Cell, EntityId, EntityLiveness, Vec3};
use thiserror::Error;

/// Default bound, in rings, of the nearest-free-cell search.
pub const DEFAULT_SEARCH_RADIUS: u32 = 50;

/// Errors raised while configuring the grid.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum GridError {
    /// The requested cell size cannot partition the world.
    #[error("cell size must be finite and positive, got {cell_size}")]
    InvalidCellSize {
        /// Rejected cell size.
        cell_size: f32,
    },
}

/// Conversion between continuous world positions and grid cells.
///
/// Positions map to the cell whose centre is nearest, rounding half away from
/// zero. Cell centres sit at integer multiples of the cell size on the ground
/// plane, so `world_to_cell(cell_to_world(c)) == c` for every cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellGeometry {
    cell_size: f32,
}

impl CellGeometry {
    /// Creates a geometry using the provided cell edge length.
    pub fn new(cell_size: f32) -> Result<Self, GridError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(GridError::InvalidCellSize { cell_size });
        }
        Ok(Self { cell_size })
    }

    /// Edge length of a cell in world units.
    #[must_use]
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Cell containing `position`.
    #[must_use]
    pub fn world_to_cell(&self, position: Vec3) -> Cell {
        Cell::new(
            (position.x / self.cell_size).round() as i32,
            (position.z / self.cell_size).round() as i32,
        )
    }

    /// Centre of `cell` on the ground plane.
    #[must_use]
    pub fn cell_to_world(&self, cell: Cell) -> Vec3 {
        Vec3::new(
            cell.x() as f32 * self.cell_size,
            0.0,
            cell.z() as f32 * self.cell_size,
        )
    }
}

/// Inclusive corners of the `size` x `size` block centred on `center`.
///
/// Even sizes extend one cell further toward +x/+z. A size of zero is
/// treated as a single cell.
#[must_use]
pub fn area_bounds(center: Cell, size: u32) -> (Cell, Cell) {
    let size = i32::try_from(size.max(1)).unwrap_or(i32::MAX);
    let low = -((size - 1) / 2);
    let high = size / 2;
    (center.offset(low, low), center.offset(high, high))
}

/// Cells of the block described by [`area_bounds`], row by row.
pub fn area_cells(center: Cell, size: u32) -> impl Iterator<Item = Cell> {
    let (low, high) = area_bounds(center, size);
    (low.z()..=high.z()).flat_map(move |z| (low.x()..=high.x()).map(move |x| Cell::new(x, z)))
}

/// Boundary of the square ring at Chebyshev distance `radius` around `center`.
///
/// The top row is visited first, then the bottom row, then both side
/// columns from low to high z.
fn ring(center: Cell, radius: i32) -> impl Iterator<Item = Cell> {
    let top = (-radius..=radius).map(move |dx| center.offset(dx, -radius));
    let bottom = (-radius..=radius).map(move |dx| center.offset(dx, radius));
    let sides = (-radius + 1..radius)
        .flat_map(move |dz| [center.offset(-radius, dz), center.offset(radius, dz)]);
    top.chain(bottom).chain(sides)
}

/// Authoritative map of cell reservations.
///
/// Two maps are kept in lock-step: `owners` answers "who holds this cell"
/// and `claims` answers "which cells does this entity hold" so releasing an
/// entity costs only as much as the cells it claimed.
#[derive(Clone, Debug)]
pub struct CellIndex {
    geometry: CellGeometry,
    search_radius: u32,
    owners: BTreeMap<Cell, EntityId>,
    claims: BTreeMap<EntityId, BTreeSet<Cell>>,
}

impl CellIndex {
    /// Creates an empty index over the provided geometry.
    #[must_use]
    pub fn new(geometry: CellGeometry, search_radius: u32) -> Self {
        Self {
            geometry,
            search_radius,
            owners: BTreeMap::new(),
            claims: BTreeMap::new(),
        }
    }

    /// Geometry used to convert between positions and cells.
    #[must_use]
    pub const fn geometry(&self) -> CellGeometry {
        self.geometry
    }

    /// Number of rings inspected by [`CellIndex::find_nearest_free`].
    #[must_use]
    pub const fn search_radius(&self) -> u32 {
        self.search_radius
    }

    /// Cell containing `position`.
    #[must_use]
    pub fn world_to_cell(&self, position: Vec3) -> Cell {
        self.geometry.world_to_cell(position)
    }

    /// Centre of `cell`.
    #[must_use]
    pub fn cell_to_world(&self, cell: Cell) -> Vec3 {
        self.geometry.cell_to_world(cell)
    }

    /// Recorded owner of `cell`, without checking whether it is still alive.
    #[must_use]
    pub fn owner(&self, cell: Cell) -> Option<EntityId> {
        self.owners.get(&cell).copied()
    }

    /// Cells currently recorded for `entity`, in ascending order.
    pub fn cells_of(&self, entity: EntityId) -> impl Iterator<Item = Cell> + '_ {
        self.claims.get(&entity).into_iter().flatten().copied()
    }

    /// Number of reserved cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Reports whether no cell is reserved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Reports whether no live entity holds `cell`.
    ///
    /// A reservation whose owner died is evicted on the spot, together with
    /// every other cell that owner still held.
    pub fn is_free<L>(&mut self, cell: Cell, liveness: &L) -> bool
    where
        L: EntityLiveness + ?Sized,
    {
        self.live_owner(cell, liveness).is_none()
    }

    /// Reports whether `cell` is free or already held by `requester`.
    pub fn is_available_for<L>(&mut self, cell: Cell, requester: EntityId, liveness: &L) -> bool
    where
        L: EntityLiveness + ?Sized,
    {
        match self.live_owner(cell, liveness) {
            None => true,
            Some(owner) => owner == requester,
        }
    }

    /// Claims `cell` for `entity`, dropping whatever `entity` held before.
    ///
    /// A previous holder of `cell` loses it. Returns `false` without touching
    /// the index when `entity` is not alive.
    pub fn reserve<L>(&mut self, cell: Cell, entity: EntityId, liveness: &L) -> bool
    where
        L: EntityLiveness + ?Sized,
    {
        if !liveness.is_alive(entity) {
            return false;
        }
        self.release(entity);
        self.claim(cell, entity);
        true
    }

    /// Claims the `size` x `size` block nearest to `position` for `entity`,
    /// replacing any block or cell it held before.
    pub fn reserve_area<L>(
        &mut self,
        position: Vec3,
        size: u32,
        entity: EntityId,
        liveness: &L,
    ) -> bool
    where
        L: EntityLiveness + ?Sized,
    {
        if !liveness.is_alive(entity) {
            return false;
        }
        self.release(entity);
        let center = self.world_to_cell(position);
        for cell in area_cells(center, size) {
            self.claim(cell, entity);
        }
        true
    }

    /// Nearest cell to `target` that is free or owned by `requester`.
    ///
    /// Rings of growing Chebyshev radius are inspected up to the configured
    /// bound. When every ring is taken the original `target` is returned and
    /// callers must cope with it being occupied.
    pub fn find_nearest_free<L>(&mut self, target: Cell, requester: EntityId, liveness: &L) -> Cell
    where
        L: EntityLiveness + ?Sized,
    {
        if self.is_available_for(target, requester, liveness) {
            return target;
        }

        let bound = i32::try_from(self.search_radius).unwrap_or(i32::MAX);
        for radius in 1..=bound {
            for cell in ring(target, radius) {
                if self.is_available_for(cell, requester, liveness) {
                    return cell;
                }
            }
        }

        tracing::warn!(
            x = target.x(),
            z = target.z(),
            radius = self.search_radius,
            "nearest free cell search exhausted"
        );
        target
    }

    /// Drops every reservation held by `entity`. Safe to call repeatedly.
    pub fn release(&mut self, entity: EntityId) {
        if let Some(cells) = self.claims.remove(&entity) {
            for cell in cells {
                if self.owners.get(&cell) == Some(&entity) {
                    let _ = self.owners.remove(&cell);
                }
            }
        }
    }

    /// Drops the reservation on `cell`, whoever holds it.
    pub fn release_cell(&mut self, cell: Cell) {
        if let Some(owner) = self.owners.remove(&cell) {
            self.forget(owner, cell);
        }
    }

    /// Drops the reservation on `cell` only if `entity` holds it.
    pub fn release_cell_held_by(&mut self, cell: Cell, entity: EntityId) {
        if self.owners.get(&cell) == Some(&entity) {
            self.release_cell(cell);
        }
    }

    /// Evicts every reservation whose owner is no longer alive and returns
    /// the number of cells released.
    pub fn purge_stale<L>(&mut self, liveness: &L) -> usize
    where
        L: EntityLiveness + ?Sized,
    {
        let stale: Vec<EntityId> = self
            .claims
            .keys()
            .copied()
            .filter(|entity| !liveness.is_alive(*entity))
            .collect();

        let before = self.owners.len();
        for entity in stale {
            self.release(entity);
        }
        before - self.owners.len()
    }

    fn live_owner<L>(&mut self, cell: Cell, liveness: &L) -> Option<EntityId>
    where
        L: EntityLiveness + ?Sized,
    {
        let owner = self.owner(cell)?;
        if liveness.is_alive(owner) {
            return Some(owner);
        }

        tracing::debug!(?owner, x = cell.x(), z = cell.z(), "evicting stale reservation");
        self.release(owner);
        None
    }

    fn claim(&mut self, cell: Cell, entity: EntityId) {
        if let Some(previous) = self.owners.insert(cell, entity) {
            if previous != entity {
                self.forget(previous, cell);
            }
        }
        let _ = self.claims.entry(entity).or_default().insert(cell);
    }

    fn forget(&mut self, entity: EntityId, cell: Cell) {
        if let Some(cells) = self.claims.get_mut(&entity) {
            let _ = cells.remove(&cell);
            if cells.is_empty() {
                let _ = self.claims.remove(&entity);
            }
        }
    }
}
