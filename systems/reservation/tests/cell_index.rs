use std::collections::BTreeSet;

use skirmish_core::{Cell, EntityId, EntityLiveness, Vec3};
use skirmish_system_reservation::{
    area_cells, CellGeometry, CellIndex, PerimeterSlots, DEFAULT_SEARCH_RADIUS,
};

#[derive(Default)]
struct Roster {
    alive: BTreeSet<EntityId>,
}

impl Roster {
    fn spawn(&mut self, index: u32) -> EntityId {
        let id = EntityId::new(index, 0);
        let _ = self.alive.insert(id);
        id
    }

    fn kill(&mut self, id: EntityId) {
        let _ = self.alive.remove(&id);
    }
}

impl EntityLiveness for Roster {
    fn is_alive(&self, entity: EntityId) -> bool {
        self.alive.contains(&entity)
    }
}

fn index() -> CellIndex {
    CellIndex::new(
        CellGeometry::new(1.0).expect("valid cell size"),
        DEFAULT_SEARCH_RADIUS,
    )
}

#[test]
fn reserving_replaces_the_previous_cell() {
    let mut roster = Roster::default();
    let agent = roster.spawn(1);
    let mut cells = index();

    assert!(cells.reserve(Cell::new(0, 0), agent, &roster));
    assert!(cells.reserve(Cell::new(4, 4), agent, &roster));

    assert!(cells.is_free(Cell::new(0, 0), &roster), "old cell must be released");
    assert_eq!(cells.owner(Cell::new(4, 4)), Some(agent));
    assert_eq!(cells.cells_of(agent).collect::<Vec<_>>(), vec![Cell::new(4, 4)]);
}

#[test]
fn reserving_an_area_replaces_the_previous_block() {
    let mut roster = Roster::default();
    let keep = roster.spawn(4);
    let mut cells = index();

    assert!(cells.reserve_area(Vec3::ZERO, 2, keep, &roster));
    let old: BTreeSet<Cell> = area_cells(Cell::new(0, 0), 2).collect();
    assert_eq!(cells.cells_of(keep).collect::<BTreeSet<_>>(), old);

    assert!(cells.reserve_area(Vec3::new(10.0, 0.0, 10.0), 3, keep, &roster));
    let new: BTreeSet<Cell> = area_cells(Cell::new(10, 10), 3).collect();
    assert_eq!(new.len(), 9);
    for cell in &old {
        assert!(cells.is_free(*cell, &roster), "{cell:?} still held");
    }
    assert_eq!(cells.cells_of(keep).collect::<BTreeSet<_>>(), new);
    assert_eq!(cells.len(), 9);

    roster.kill(keep);
    assert!(!cells.reserve_area(Vec3::ZERO, 2, keep, &roster));
    assert!(cells.is_free(Cell::new(0, 0), &roster));
}

#[test]
fn dead_entities_cannot_reserve() {
    let mut roster = Roster::default();
    let ghost = roster.spawn(9);
    roster.kill(ghost);
    let mut cells = index();

    assert!(!cells.reserve(Cell::new(1, 1), ghost, &roster));
    assert!(cells.is_empty());
}

#[test]
fn a_cell_has_at_most_one_owner() {
    let mut roster = Roster::default();
    let first = roster.spawn(1);
    let second = roster.spawn(2);
    let mut cells = index();

    assert!(cells.reserve(Cell::new(2, 2), first, &roster));
    assert!(cells.reserve(Cell::new(2, 2), second, &roster));

    assert_eq!(cells.owner(Cell::new(2, 2)), Some(second));
    assert_eq!(cells.cells_of(first).count(), 0, "previous holder loses the cell");
    assert_eq!(cells.len(), 1);
}

#[test]
fn stale_reservations_are_evicted_when_queried() {
    let mut roster = Roster::default();
    let agent = roster.spawn(1);
    let mut cells = index();
    assert!(cells.reserve_area(Vec3::new(5.0, 0.0, 5.0), 2, agent, &roster));
    assert_eq!(cells.len(), 4);

    roster.kill(agent);

    assert!(cells.is_free(Cell::new(5, 5), &roster));
    assert!(cells.is_empty(), "every cell of the dead owner is dropped");
}

#[test]
fn purge_counts_released_cells() {
    let mut roster = Roster::default();
    let survivor = roster.spawn(1);
    let casualty = roster.spawn(2);
    let mut cells = index();
    assert!(cells.reserve(Cell::new(0, 0), survivor, &roster));
    assert!(cells.reserve_area(Vec3::new(10.0, 0.0, 10.0), 3, casualty, &roster));

    roster.kill(casualty);

    assert_eq!(cells.purge_stale(&roster), 9);
    assert_eq!(cells.purge_stale(&roster), 0);
    assert_eq!(cells.owner(Cell::new(0, 0)), Some(survivor));
}

#[test]
fn nearest_free_prefers_the_target_then_the_closest_ring() {
    let mut roster = Roster::default();
    let blocker = roster.spawn(1);
    let mover = roster.spawn(2);
    let mut cells = index();
    let target = Cell::new(10, 10);

    assert_eq!(cells.find_nearest_free(target, mover, &roster), target);

    assert!(cells.reserve(target, blocker, &roster));
    let found = cells.find_nearest_free(target, mover, &roster);
    assert_ne!(found, target);
    assert_eq!(target.ring_distance(found), 1);
}

#[test]
fn nearest_free_accepts_cells_held_by_the_requester() {
    let mut roster = Roster::default();
    let mover = roster.spawn(2);
    let mut cells = index();
    let target = Cell::new(-3, 7);
    assert!(cells.reserve(target, mover, &roster));

    assert_eq!(cells.find_nearest_free(target, mover, &roster), target);
}

#[test]
fn exhausted_search_falls_back_to_the_target() {
    let mut roster = Roster::default();
    let blocker = roster.spawn(1);
    let mover = roster.spawn(2);
    let mut cells = CellIndex::new(CellGeometry::new(1.0).expect("valid cell size"), 1);
    assert!(cells.reserve_area(Vec3::ZERO, 3, blocker, &roster));

    assert_eq!(
        cells.find_nearest_free(Cell::new(0, 0), mover, &roster),
        Cell::new(0, 0)
    );
}

#[test]
fn releases_are_idempotent_and_owner_checked() {
    let mut roster = Roster::default();
    let first = roster.spawn(1);
    let second = roster.spawn(2);
    let mut cells = index();
    assert!(cells.reserve(Cell::new(3, 3), first, &roster));

    cells.release_cell_held_by(Cell::new(3, 3), second);
    assert_eq!(cells.owner(Cell::new(3, 3)), Some(first));

    cells.release_cell_held_by(Cell::new(3, 3), first);
    assert!(cells.is_empty());

    cells.release(first);
    cells.release_cell(Cell::new(3, 3));
    assert!(cells.is_empty());
}

#[test]
fn perimeter_slots_are_handed_out_exclusively() {
    let mut roster = Roster::default();
    let first = roster.spawn(1);
    let second = roster.spawn(2);
    let mut cells = index();
    let geometry = cells.geometry();
    let slots = PerimeterSlots::from_anchors(
        &geometry,
        &[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 2.0),
            Vec3::new(0.0, 0.0, 2.0),
        ],
    );

    let from = Cell::new(-5, 0);
    let a = slots.claim(&mut cells, from, first, &roster).expect("slot");
    let b = slots.claim(&mut cells, from, second, &roster).expect("slot");

    assert_eq!(a, Cell::new(0, 0));
    assert_ne!(a, b);
    assert_eq!(
        slots.claim(&mut cells, from, first, &roster),
        Some(a),
        "holder keeps its own slot"
    );
}
