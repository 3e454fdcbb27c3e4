use std::collections::BTreeSet;

use skirmish_core::{Cell, EntityId, EntityLiveness, Vec3};

use crate::{CellGeometry, CellIndex};

/// Cells visited by a straight line from `from` to `to`, both ends included.
#[must_use]
pub fn rasterize_line(from: Cell, to: Cell) -> Vec<Cell> {
    let (mut x, mut z) = (from.x(), from.z());
    let dx = (to.x() - x).abs();
    let dz = -(to.z() - z).abs();
    let step_x = if x < to.x() { 1 } else { -1 };
    let step_z = if z < to.z() { 1 } else { -1 };
    let mut error = dx + dz;
    let mut cells = Vec::new();

    loop {
        cells.push(Cell::new(x, z));
        if x == to.x() && z == to.z() {
            break;
        }
        let doubled = 2 * error;
        if doubled >= dz {
            error += dz;
            x += step_x;
        }
        if doubled <= dx {
            error += dx;
            z += step_z;
        }
    }

    cells
}

/// Candidate standing cells traced along the outline of a structure.
///
/// Slots are derived once from the anchor polygon and then handed out one at
/// a time through the shared [`CellIndex`], so two workers never stand on the
/// same slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PerimeterSlots {
    cells: Vec<Cell>,
}

impl PerimeterSlots {
    /// Traces the closed polygon through `anchors` and collects its cells.
    ///
    /// Each edge contributes every cell it crosses except its final one, which
    /// the next edge starts from. Duplicates are dropped while preserving the
    /// order of first appearance.
    #[must_use]
    pub fn from_anchors(geometry: &CellGeometry, anchors: &[Vec3]) -> Self {
        let vertices: Vec<Cell> = anchors
            .iter()
            .map(|anchor| geometry.world_to_cell(*anchor))
            .collect();

        let mut seen = BTreeSet::new();
        let mut cells = Vec::new();
        for (index, start) in vertices.iter().enumerate() {
            let end = vertices[(index + 1) % vertices.len()];
            let mut edge = rasterize_line(*start, end);
            if edge.len() > 1 {
                let _ = edge.pop();
            }
            for cell in edge {
                if seen.insert(cell) {
                    cells.push(cell);
                }
            }
        }

        Self { cells }
    }

    /// Perimeter cells in tracing order.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Reports whether the outline produced no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Perimeter cell closest to `from` that is free or already held by
    /// `requester`. Ties resolve to the earliest cell in tracing order.
    pub fn closest_available<L>(
        &self,
        index: &mut CellIndex,
        from: Cell,
        requester: EntityId,
        liveness: &L,
    ) -> Option<Cell>
    where
        L: EntityLiveness + ?Sized,
    {
        let mut best: Option<(i64, Cell)> = None;
        for cell in &self.cells {
            if !index.is_available_for(*cell, requester, liveness) {
                continue;
            }
            let distance = cell.distance_squared(from);
            if best.map_or(true, |(current, _)| distance < current) {
                best = Some((distance, *cell));
            }
        }
        best.map(|(_, cell)| cell)
    }

    /// Reserves the closest available slot for `requester` and returns it.
    pub fn claim<L>(
        &self,
        index: &mut CellIndex,
        from: Cell,
        requester: EntityId,
        liveness: &L,
    ) -> Option<Cell>
    where
        L: EntityLiveness + ?Sized,
    {
        let cell = self.closest_available(index, from, requester, liveness)?;
        if index.reserve(cell, requester, liveness) {
            Some(cell)
        } else {
            None
        }
    }
}
