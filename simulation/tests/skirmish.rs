use std::time::Duration;

use skirmish_core::{
    planar_distance, Cell, CommandKind, EntityId, Event, Faction, Order, ResourceKind, Vec3,
    WorldCommand,
};
use skirmish_simulation::{Archetype, ConfigError, SimConfig, Simulation, SimulationError};
use skirmish_world::{query, DepotProfile, DepotSpec, NodeSpec, SiteSpec};

const STEP: Duration = Duration::from_secs(1);
const HOME: Faction = Faction::new(0);
const RAIDERS: Faction = Faction::new(1);

fn simulation() -> Simulation {
    Simulation::new(SimConfig::default()).expect("default config is valid")
}

fn run(sim: &mut Simulation, ticks: usize) -> Vec<Event> {
    let mut events = Vec::new();
    for _ in 0..ticks {
        events.extend(sim.tick(STEP));
    }
    events
}

fn depot(sim: &mut Simulation, x: f32) -> EntityId {
    sim.place_depot(DepotSpec {
        faction: HOME,
        position: Vec3::new(x, 0.0, 0.0),
        footprint: 1,
        profile: DepotProfile::default(),
    })
}

#[test]
fn soldier_defeats_an_unarmed_raider_and_the_body_is_reaped() {
    let mut sim = simulation();
    let soldier = sim.spawn_unit(Archetype::Soldier, HOME, Vec3::ZERO);
    let raider = sim.spawn_unit(Archetype::Worker, RAIDERS, Vec3::new(4.0, 0.0, 0.0));
    assert!(sim.issue(soldier, Order::Attack { target: raider }));

    let events = run(&mut sim, 30);

    assert!(events.contains(&Event::EntityDestroyed { entity: raider }));
    assert!(events.contains(&Event::CommandCompleted {
        agent: soldier,
        kind: CommandKind::Attack,
    }));
    assert_eq!(sim.agents(), vec![soldier]);
    assert!(sim.is_idle(soldier));
    assert_eq!(query::cell_owner(sim.world(), Cell::new(4, 0)), None);
}

#[test]
fn workers_haul_a_full_load_to_the_depot() {
    let mut sim = simulation();
    let worker = sim.spawn_unit(Archetype::Worker, HOME, Vec3::ZERO);
    let _depot = depot(&mut sim, -3.0);
    let node = sim.spawn_resource_node(NodeSpec {
        kind: ResourceKind::Wood,
        amount: 100,
        position: Vec3::new(4.0, 0.0, 0.0),
        footprint: 1,
    });
    assert!(sim.issue(worker, Order::Harvest { target: node }));

    let events = run(&mut sim, 40);

    assert!(query::stockpile(sim.world(), HOME, ResourceKind::Wood) >= 5);
    assert!(events
        .iter()
        .any(|event| matches!(event, Event::ResourceDeposited { agent, .. } if *agent == worker)));
    assert_eq!(sim.active_command(worker), Some(CommandKind::Harvest));
}

#[test]
fn finished_sites_with_a_depot_profile_become_deposit_points() {
    let mut sim = simulation();
    let worker = sim.spawn_unit(Archetype::Worker, HOME, Vec3::ZERO);
    let site = sim.place_build_site(SiteSpec {
        faction: HOME,
        position: Vec3::new(5.0, 0.0, 0.0),
        footprint: 1,
        work_required: 3,
        max_health: 30,
        depot: Some(DepotProfile::default()),
    });
    assert!(sim.issue(worker, Order::Build { target: site }));

    let events = run(&mut sim, 20);

    assert!(events.contains(&Event::ConstructionCompleted { site }));
    assert!(events.contains(&Event::CommandCompleted {
        agent: worker,
        kind: CommandKind::Build,
    }));
    assert!(query::deposit_points(sim.world()).contains(&site));
    assert!(sim.is_idle(worker));
}

#[test]
fn halting_cancels_the_active_command() {
    let mut sim = simulation();
    let worker = sim.spawn_unit(Archetype::Worker, HOME, Vec3::ZERO);
    assert!(sim.issue(
        worker,
        Order::Move {
            destination: Vec3::new(8.0, 0.0, 0.0),
        }
    ));
    let _ = sim.tick(STEP);

    assert!(sim.halt(worker));
    let events = sim.tick(STEP);

    assert!(events.contains(&Event::CommandCancelled {
        agent: worker,
        kind: CommandKind::Move,
    }));
    assert!(sim.is_idle(worker));
    assert!(sim.world().cells_of(worker).is_empty());
}

#[test]
fn queued_orders_run_back_to_back() {
    let mut sim = simulation();
    let worker = sim.spawn_unit(Archetype::Worker, HOME, Vec3::ZERO);
    assert!(sim.queue(
        worker,
        Order::Move {
            destination: Vec3::new(2.0, 0.0, 0.0),
        }
    ));
    assert!(sim.queue(
        worker,
        Order::Move {
            destination: Vec3::new(2.0, 0.0, 4.0),
        }
    ));

    let events = run(&mut sim, 10);

    let completed = events
        .iter()
        .filter(|event| matches!(event, Event::CommandCompleted { kind: CommandKind::Move, .. }))
        .count();
    assert_eq!(completed, 2);
    let position = query::position(sim.world(), worker).expect("worker alive");
    assert!(planar_distance(position, Vec3::new(2.0, 0.0, 4.0)) <= 0.1);
}

#[test]
fn scripted_damage_tears_down_the_victim_immediately() {
    let mut sim = simulation();
    let archer = sim.spawn_unit(Archetype::Archer, HOME, Vec3::ZERO);
    let victim = sim.spawn_unit(Archetype::Soldier, RAIDERS, Vec3::new(3.0, 0.0, 0.0));
    assert_eq!(sim.agent_count(), 2);

    sim.apply(WorldCommand::Damage {
        attacker: archer,
        target: victim,
        amount: 1_000,
    });

    assert_eq!(sim.agents(), vec![archer]);
    assert_eq!(sim.archetype(victim), None);
    assert!(!sim.issue(victim, Order::Idle));
    assert_eq!(query::cell_owner(sim.world(), Cell::new(3, 0)), None);
    let events = sim.tick(STEP);
    assert!(events.contains(&Event::EntityDestroyed { entity: victim }));
}

#[test]
fn identical_setups_stay_in_lockstep() {
    fn battle() -> (Simulation, Vec<EntityId>) {
        let mut sim = simulation();
        let mut attackers = Vec::new();
        for (index, archetype) in [Archetype::Soldier, Archetype::Archer, Archetype::Catapult]
            .into_iter()
            .enumerate()
        {
            let z = index as f32 * 3.0;
            attackers.push(sim.spawn_unit(archetype, HOME, Vec3::new(0.0, 0.0, z)));
        }
        let defenders: Vec<EntityId> = (0..3)
            .map(|index| {
                let z = index as f32 * 3.0;
                sim.spawn_unit(Archetype::Soldier, RAIDERS, Vec3::new(12.0, 0.0, z))
            })
            .collect();
        for (attacker, defender) in attackers.iter().zip(&defenders) {
            assert!(sim.issue(*attacker, Order::Attack { target: *defender }));
        }
        for (defender, attacker) in defenders.iter().zip(&attackers) {
            assert!(sim.issue(*defender, Order::Attack { target: *attacker }));
        }
        (sim, attackers)
    }

    let (mut left, roster) = battle();
    let (mut right, mirrored) = battle();
    assert_eq!(roster, mirrored);

    for tick in 0..60 {
        let a = left.tick(STEP);
        let b = right.tick(STEP);
        assert_eq!(a, b, "event streams diverged on tick {tick}");
    }
    assert_eq!(left.agents(), right.agents());
    assert_eq!(
        query::agent_view(left.world()).into_vec(),
        query::agent_view(right.world()).into_vec()
    );
}

#[test]
fn invalid_configuration_is_rejected_up_front() {
    let mut config = SimConfig::default();
    config.grid.cell_size = 0.0;

    let error = Simulation::new(config).expect_err("zero cell size must fail");

    assert!(matches!(
        error,
        SimulationError::Config(ConfigError::Invalid(_))
    ));
}
