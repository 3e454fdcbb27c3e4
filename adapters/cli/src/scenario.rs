//! Seeded skirmish layout used by the command-line runner.

use std::fmt;

use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use skirmish_core::{EntityId, Faction, Order, ResourceKind, Vec3};
use skirmish_simulation::{Archetype, Simulation};
use skirmish_world::{query, DepotProfile, DepotSpec, NodeSpec, SiteSpec};

pub(crate) const HOME: Faction = Faction::new(0);
pub(crate) const RAIDERS: Faction = Faction::new(1);

const RESOURCE_KINDS: [ResourceKind; 3] =
    [ResourceKind::Wood, ResourceKind::Stone, ResourceKind::Gold];

/// Entities placed by [`populate`].
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Roster {
    pub(crate) nodes: Vec<EntityId>,
    pub(crate) depot: EntityId,
    pub(crate) site: EntityId,
    pub(crate) workers: Vec<EntityId>,
    pub(crate) defenders: Vec<EntityId>,
    pub(crate) raiders: Vec<EntityId>,
}

/// Lays out both factions and hands out the opening orders.
///
/// Resource nodes are scattered over distinct cells east of the home base;
/// the layout depends only on `seed` and `node_count`.
pub(crate) fn populate(sim: &mut Simulation, seed: u64, node_count: usize) -> Roster {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut field: Vec<(i32, i32)> = (4..=16)
        .flat_map(|x| (-8..=8).map(move |z| (x, z)))
        .filter(|(x, z)| x % 2 == 0 && z % 2 == 0)
        .collect();
    field.shuffle(&mut rng);
    let nodes: Vec<EntityId> = field
        .into_iter()
        .take(node_count)
        .map(|(x, z)| {
            let kind = RESOURCE_KINDS[rng.gen_range(0..RESOURCE_KINDS.len())];
            sim.spawn_resource_node(NodeSpec {
                kind,
                amount: rng.gen_range(20..=60),
                position: Vec3::new(x as f32, 0.0, z as f32),
                footprint: 1,
            })
        })
        .collect();

    let depot = sim.place_depot(DepotSpec {
        faction: HOME,
        position: Vec3::new(-4.0, 0.0, 0.0),
        footprint: 2,
        profile: DepotProfile::default(),
    });
    let site = sim.place_build_site(SiteSpec {
        faction: HOME,
        position: Vec3::new(-4.0, 0.0, 6.0),
        footprint: 2,
        work_required: 12,
        max_health: 80,
        depot: Some(DepotProfile {
            priority: 1,
            accepts: Vec::new(),
        }),
    });

    let workers: Vec<EntityId> = (0..4)
        .map(|index| {
            let position = Vec3::new(0.0, 0.0, index as f32 * 2.0 - 3.0);
            sim.spawn_unit(Archetype::Worker, HOME, position)
        })
        .collect();
    for (index, worker) in workers.iter().enumerate() {
        let order = match nodes.get(index) {
            Some(&node) if index + 1 < workers.len() => Order::Harvest { target: node },
            _ => Order::Build { target: site },
        };
        let _ = sim.issue(*worker, order);
    }

    let defenders: Vec<EntityId> = [
        Archetype::Soldier,
        Archetype::Soldier,
        Archetype::Archer,
        Archetype::Archer,
        Archetype::Catapult,
    ]
    .into_iter()
    .enumerate()
    .map(|(index, archetype)| {
        sim.spawn_unit(archetype, HOME, Vec3::new(-10.0, 0.0, index as f32 * 3.0 - 6.0))
    })
    .collect();
    let raiders: Vec<EntityId> = (0..4)
        .map(|index| {
            let z = rng.gen_range(-8_i32..=8) as f32;
            let position = Vec3::new(24.0 + index as f32 * 2.0, 0.0, z);
            sim.spawn_unit(Archetype::Soldier, RAIDERS, position)
        })
        .collect();

    for (defender, raider) in defenders.iter().zip(raiders.iter().cycle()) {
        let _ = sim.issue(*defender, Order::Attack { target: *raider });
    }
    for (raider, defender) in raiders.iter().zip(defenders.iter()) {
        let _ = sim.issue(*raider, Order::Attack { target: *defender });
    }

    tracing::info!(
        seed,
        nodes = nodes.len(),
        workers = workers.len(),
        defenders = defenders.len(),
        raiders = raiders.len(),
        "scenario populated"
    );
    Roster {
        nodes,
        depot,
        site,
        workers,
        defenders,
        raiders,
    }
}

/// End-of-run report.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Summary {
    pub(crate) ticks: u64,
    pub(crate) stockpiles: Vec<(ResourceKind, u32)>,
    pub(crate) site_complete: bool,
    pub(crate) nodes_left: usize,
    pub(crate) home_survivors: usize,
    pub(crate) raider_survivors: usize,
}

impl Summary {
    pub(crate) fn collect(sim: &Simulation, roster: &Roster) -> Self {
        let world = sim.world();
        let survivors = |faction: Faction| {
            query::agent_view(world)
                .iter()
                .filter(|agent| agent.faction == faction)
                .count()
        };
        Self {
            ticks: query::tick_index(world),
            stockpiles: RESOURCE_KINDS
                .into_iter()
                .map(|kind| (kind, query::stockpile(world, HOME, kind)))
                .collect(),
            site_complete: query::deposit_points(world).contains(&roster.site),
            nodes_left: query::resource_nodes(world).len(),
            home_survivors: survivors(HOME),
            raider_survivors: survivors(RAIDERS),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ticks simulated: {}", self.ticks)?;
        for (kind, amount) in &self.stockpiles {
            writeln!(f, "stockpile {kind:?}: {amount}")?;
        }
        let site = if self.site_complete {
            "complete"
        } else {
            "under construction"
        };
        writeln!(f, "storehouse: {site}")?;
        writeln!(f, "resource nodes left: {}", self.nodes_left)?;
        write!(
            f,
            "survivors: home {} / raiders {}",
            self.home_survivors, self.raider_survivors
        )
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use skirmish_simulation::SimConfig;

    use super::*;

    fn simulation() -> Simulation {
        Simulation::new(SimConfig::default()).expect("default config is valid")
    }

    fn node_positions(sim: &Simulation, roster: &Roster) -> Vec<Vec3> {
        roster
            .nodes
            .iter()
            .filter_map(|node| query::position(sim.world(), *node))
            .collect()
    }

    #[test]
    fn same_seed_yields_the_same_layout() {
        let mut first = simulation();
        let mut second = simulation();
        let a = populate(&mut first, 11, 6);
        let b = populate(&mut second, 11, 6);

        assert_eq!(a, b);
        assert_eq!(node_positions(&first, &a), node_positions(&second, &b));
        assert_eq!(a.nodes.len(), 6);
    }

    #[test]
    fn requested_node_count_is_placed() {
        let mut sim = simulation();
        let roster = populate(&mut sim, 3, 12);

        let mut positions = node_positions(&sim, &roster);
        positions.dedup();
        assert_eq!(positions.len(), 12);
        assert_eq!(query::resource_nodes(sim.world()).len(), 12);
    }

    #[test]
    fn without_nodes_every_worker_builds() {
        let mut sim = simulation();
        let roster = populate(&mut sim, 5, 0);

        for worker in &roster.workers {
            assert_eq!(
                sim.active_command(*worker),
                None,
                "orders start on the first tick"
            );
        }
        let _ = sim.tick(Duration::from_millis(100));
        for worker in &roster.workers {
            assert_eq!(
                sim.active_command(*worker),
                Some(skirmish_core::CommandKind::Build)
            );
        }
    }

    #[test]
    fn summary_reports_the_opening_state() {
        let mut sim = simulation();
        let roster = populate(&mut sim, 9, 4);

        let summary = Summary::collect(&sim, &roster);

        assert_eq!(summary.ticks, 0);
        assert!(!summary.site_complete);
        assert_eq!(summary.nodes_left, 4);
        assert_eq!(summary.home_survivors, 9);
        assert_eq!(summary.raider_survivors, 4);
        assert!(summary.stockpiles.iter().all(|(_, amount)| *amount == 0));
        assert!(summary.to_string().contains("survivors: home 9 / raiders 4"));
    }
}
