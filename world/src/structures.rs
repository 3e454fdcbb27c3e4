use std::f32::consts::FRAC_1_SQRT_2;

use skirmish_core::{
    approach_point, Buildable, Cell, DepositPoint, Faction, Harvestable, ResourceKind, Vec3,
};
use skirmish_system_reservation::{area_bounds, CellGeometry};

/// Parameters used to spawn an agent body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentSpec {
    /// Allegiance of the agent.
    pub faction: Faction,
    /// Initial world position.
    pub position: Vec3,
    /// Hit points on spawn.
    pub max_health: u32,
    /// Travel speed in world units per second; zero makes the agent immobile.
    pub speed: f32,
    /// Footprint edge length in cells.
    pub footprint: u32,
}

/// Parameters used to spawn a resource node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeSpec {
    /// Resource yielded by the node.
    pub kind: ResourceKind,
    /// Amount available before depletion.
    pub amount: u32,
    /// Requested centre; snapped to the grid.
    pub position: Vec3,
    /// Footprint edge length in cells.
    pub footprint: u32,
}

/// Deposit behaviour of a structure.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DepotProfile {
    /// Preference rank; lower values are chosen first.
    pub priority: u32,
    /// Accepted resources; empty accepts everything.
    pub accepts: Vec<ResourceKind>,
}

/// Parameters used to place a build site.
#[derive(Clone, Debug, PartialEq)]
pub struct SiteSpec {
    /// Owner of the site.
    pub faction: Faction,
    /// Requested centre; snapped to the grid.
    pub position: Vec3,
    /// Footprint edge length in cells.
    pub footprint: u32,
    /// Work needed to complete construction.
    pub work_required: u32,
    /// Hit points of the scaffolding.
    pub max_health: u32,
    /// Deposit behaviour acquired once construction completes.
    pub depot: Option<DepotProfile>,
}

/// Parameters used to place a finished deposit point.
#[derive(Clone, Debug, PartialEq)]
pub struct DepotSpec {
    /// Owner of the depot.
    pub faction: Faction,
    /// Requested centre; snapped to the grid.
    pub position: Vec3,
    /// Footprint edge length in cells.
    pub footprint: u32,
    /// Accepted resources and priority.
    pub profile: DepotProfile,
}

/// Grid-aligned block occupied by a static structure.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Footprint {
    center: Vec3,
    size: u32,
    radius: f32,
    standoff: f32,
    corners: (Cell, Cell),
}

impl Footprint {
    pub(crate) fn snap(geometry: &CellGeometry, position: Vec3, size: u32) -> Self {
        let size = size.max(1);
        let corners = area_bounds(geometry.world_to_cell(position), size);
        let center = (geometry.cell_to_world(corners.0) + geometry.cell_to_world(corners.1)) * 0.5;
        let radius = size as f32 * geometry.cell_size() * FRAC_1_SQRT_2;
        Self {
            center,
            size,
            radius,
            standoff: radius + geometry.cell_size() * 0.5,
            corners,
        }
    }

    pub(crate) fn center(&self) -> Vec3 {
        self.center
    }

    pub(crate) fn size(&self) -> u32 {
        self.size
    }

    /// Corners of the ring of cells just outside the block, clockwise.
    pub(crate) fn outline(&self, geometry: &CellGeometry) -> Vec<Vec3> {
        let (low, high) = self.corners;
        [
            Cell::new(low.x() - 1, low.z() - 1),
            Cell::new(high.x() + 1, low.z() - 1),
            Cell::new(high.x() + 1, high.z() + 1),
            Cell::new(low.x() - 1, high.z() + 1),
        ]
        .into_iter()
        .map(|cell| geometry.cell_to_world(cell))
        .collect()
    }

    fn approach(&self, from: Vec3) -> Vec3 {
        approach_point(self.center, from, self.standoff)
    }
}

/// Harvestable resource deposit.
#[derive(Clone, Debug)]
pub(crate) struct ResourceNode {
    pub(crate) kind: ResourceKind,
    pub(crate) remaining: u32,
    pub(crate) active: bool,
    pub(crate) footprint: Footprint,
}

impl Harvestable for ResourceNode {
    fn resource_kind(&self) -> ResourceKind {
        self.kind
    }

    fn remaining(&self) -> u32 {
        self.remaining
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn position(&self) -> Vec3 {
        self.footprint.center()
    }

    fn interaction_radius(&self) -> f32 {
        self.footprint.radius
    }

    fn harvest_position(&self, from: Vec3) -> Vec3 {
        self.footprint.approach(from)
    }

    fn take(&mut self, amount: u32) -> u32 {
        let taken = amount.min(self.remaining);
        self.remaining -= taken;
        taken
    }
}

/// Structure under construction.
#[derive(Clone, Debug)]
pub(crate) struct BuildSite {
    pub(crate) faction: Faction,
    pub(crate) footprint: Footprint,
    pub(crate) anchors: Vec<Vec3>,
    pub(crate) work_done: u32,
    pub(crate) work_required: u32,
    pub(crate) health: u32,
    pub(crate) max_health: u32,
    pub(crate) depot: Option<DepotProfile>,
}

impl Buildable for BuildSite {
    fn faction(&self) -> Faction {
        self.faction
    }

    fn position(&self) -> Vec3 {
        self.footprint.center()
    }

    fn anchors(&self) -> &[Vec3] {
        &self.anchors
    }

    fn interaction_radius(&self) -> f32 {
        self.footprint.radius
    }

    fn work_done(&self) -> u32 {
        self.work_done
    }

    fn work_required(&self) -> u32 {
        self.work_required
    }

    fn apply_work(&mut self, amount: u32) -> u32 {
        let applied = amount.min(self.work_required.saturating_sub(self.work_done));
        self.work_done += applied;
        applied
    }
}

/// Structure accepting resource deliveries.
#[derive(Clone, Debug)]
pub(crate) struct Depot {
    pub(crate) faction: Faction,
    pub(crate) footprint: Footprint,
    pub(crate) profile: DepotProfile,
}

impl DepositPoint for Depot {
    fn faction(&self) -> Faction {
        self.faction
    }

    fn priority(&self) -> u32 {
        self.profile.priority
    }

    fn accepts(&self, kind: ResourceKind) -> bool {
        self.profile.accepts.is_empty() || self.profile.accepts.contains(&kind)
    }

    fn position(&self) -> Vec3 {
        self.footprint.center()
    }

    fn interaction_radius(&self) -> f32 {
        self.footprint.radius
    }

    fn deposit_position(&self, from: Vec3) -> Vec3 {
        self.footprint.approach(from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> CellGeometry {
        CellGeometry::new(1.0).expect("valid size")
    }

    #[test]
    fn even_footprints_are_centred_between_cells() {
        let footprint = Footprint::snap(&geometry(), Vec3::new(4.2, 0.0, 3.9), 2);
        assert_eq!(footprint.center(), Vec3::new(4.5, 0.0, 4.5));
        assert_eq!(footprint.size(), 2);
    }

    #[test]
    fn outline_surrounds_the_block() {
        let footprint = Footprint::snap(&geometry(), Vec3::ZERO, 1);
        assert_eq!(
            footprint.outline(&geometry()),
            vec![
                Vec3::new(-1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(-1.0, 0.0, 1.0),
            ]
        );
    }

    #[test]
    fn nodes_never_yield_more_than_they_hold() {
        let mut node = ResourceNode {
            kind: ResourceKind::Stone,
            remaining: 3,
            active: true,
            footprint: Footprint::snap(&geometry(), Vec3::ZERO, 1),
        };
        assert_eq!(node.take(2), 2);
        assert_eq!(node.take(5), 1);
        assert!(node.is_depleted());
    }

    #[test]
    fn harvest_position_lies_outside_the_footprint() {
        let node = ResourceNode {
            kind: ResourceKind::Wood,
            remaining: 1,
            active: true,
            footprint: Footprint::snap(&geometry(), Vec3::new(5.0, 0.0, 5.0), 1),
        };
        let spot = node.harvest_position(Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(geometry().world_to_cell(spot), Cell::new(4, 5));
    }

    #[test]
    fn depots_with_empty_filters_accept_everything() {
        let depot = Depot {
            faction: Faction::new(0),
            footprint: Footprint::snap(&geometry(), Vec3::ZERO, 2),
            profile: DepotProfile::default(),
        };
        assert!(depot.accepts(ResourceKind::Gold));

        let picky = Depot {
            profile: DepotProfile {
                priority: 1,
                accepts: vec![ResourceKind::Wood],
            },
            ..depot
        };
        assert!(!picky.accepts(ResourceKind::Gold));
    }
}
