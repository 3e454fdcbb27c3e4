use std::time::Duration;

use skirmish_core::{EntityId, Event, Faction, Vec3, WorldCommand};
use skirmish_system_combat::{CombatProfile, Combatant, StrategyKind, StrategySpec};
use skirmish_world::{
    apply, query, AgentSpec, CombatCapability, SimContext, World, WorldConfig,
};

const STEP: Duration = Duration::from_secs(1);

fn world() -> World {
    World::new(WorldConfig::default()).expect("valid config")
}

fn unit(world: &mut World, faction: u8, x: f32, health: u32, speed: f32) -> EntityId {
    let mut events = Vec::new();
    world.spawn_agent(
        AgentSpec {
            faction: Faction::new(faction),
            position: Vec3::new(x, 0.0, 0.0),
            max_health: health,
            speed,
            footprint: 1,
        },
        &mut events,
    )
}

fn melee() -> Combatant {
    Combatant::new(
        CombatProfile {
            base_range: 1.5,
            damage: 1,
            chase_radius: 12.0,
        },
        StrategySpec {
            kind: StrategyKind::CloseRange,
            cooldown: STEP,
            spawn_delay: Duration::ZERO,
            projectile_speed: 0.0,
        }
        .build(),
    )
}

fn catapult() -> Combatant {
    Combatant::new(
        CombatProfile {
            base_range: 5.0,
            damage: 4,
            chase_radius: 12.0,
        },
        StrategySpec {
            kind: StrategyKind::Projectile,
            cooldown: Duration::from_secs(10),
            spawn_delay: Duration::from_secs(1),
            projectile_speed: 2.0,
        }
        .build(),
    )
}

fn engage(world: &mut World, combatant: &mut Combatant, agent: EntityId, target: EntityId) {
    let mut events = Vec::new();
    let mut ctx = SimContext::new(world, STEP, &mut events);
    combatant.set_attack_target(agent, target, &mut ctx);
}

fn step(world: &mut World, combatant: &mut Combatant, agent: EntityId) -> Vec<Event> {
    let mut events = Vec::new();
    apply(world, WorldCommand::Tick { dt: STEP }, &mut events);
    let mut ctx = SimContext::new(world, STEP, &mut events);
    combatant.tick_attack(agent, &mut ctx);
    events
}

fn damage_dealt(events: &[Event]) -> u32 {
    events
        .iter()
        .map(|event| match event {
            Event::DamageDealt { amount, .. } => *amount,
            _ => 0,
        })
        .sum()
}

#[test]
fn melee_defeats_its_target_then_reacquires_the_nearest_hostile() {
    let mut world = world();
    let knight = unit(&mut world, 0, 0.0, 10, 2.0);
    let first = unit(&mut world, 1, 1.0, 2, 0.0);
    let second = unit(&mut world, 1, 6.0, 2, 0.0);
    let mut combatant = melee();
    engage(&mut world, &mut combatant, knight, first);

    let _ = step(&mut world, &mut combatant, knight);
    assert_eq!(query::health(&world, first), Some(1));
    let _ = step(&mut world, &mut combatant, knight);
    assert!(!query::is_alive(&world, first), "second blow is lethal");

    let _ = step(&mut world, &mut combatant, knight);
    assert_eq!(combatant.attack_target(), Some(second));
    assert!(!combatant.is_attack_finished());
    let snapshot = query::agent_view(&world)
        .into_vec()
        .into_iter()
        .find(|agent| agent.id == knight)
        .expect("knight alive");
    assert!(snapshot.destination.is_some(), "knight chases the new target");
}

#[test]
fn engagement_finishes_when_no_hostile_remains() {
    let mut world = world();
    let knight = unit(&mut world, 0, 0.0, 10, 2.0);
    let lone = unit(&mut world, 1, 1.0, 1, 0.0);
    let mut combatant = melee();
    engage(&mut world, &mut combatant, knight, lone);

    let _ = step(&mut world, &mut combatant, knight);
    let _ = step(&mut world, &mut combatant, knight);

    assert!(!query::is_alive(&world, lone));
    assert!(combatant.is_attack_finished());
}

#[test]
fn friendly_targets_are_rejected_immediately() {
    let mut world = world();
    let knight = unit(&mut world, 0, 0.0, 10, 2.0);
    let squire = unit(&mut world, 0, 1.0, 10, 2.0);
    let mut combatant = melee();

    engage(&mut world, &mut combatant, knight, squire);

    assert!(combatant.is_attack_finished());
    assert_eq!(combatant.attack_target(), None);
}

#[test]
fn projectiles_wind_up_then_fly_before_dealing_damage() {
    let mut world = world();
    let launcher = unit(&mut world, 0, 0.0, 10, 0.0);
    let wall = unit(&mut world, 1, 4.0, 20, 0.0);
    let mut combatant = catapult();
    engage(&mut world, &mut combatant, launcher, wall);

    let fired = step(&mut world, &mut combatant, launcher);
    assert_eq!(damage_dealt(&fired), 0, "firing deals no damage");

    let launched = step(&mut world, &mut combatant, launcher);
    assert!(launched.contains(&Event::ProjectileLaunched {
        attacker: launcher,
        target: wall,
    }));
    assert_eq!(damage_dealt(&launched), 0);

    let midair = step(&mut world, &mut combatant, launcher);
    assert_eq!(damage_dealt(&midair), 0, "flight of 4 units at 2 u/s lasts two ticks");

    let impact = step(&mut world, &mut combatant, launcher);
    assert_eq!(damage_dealt(&impact), 4);
    assert_eq!(query::health(&world, wall), Some(16));
}

#[test]
fn stopping_drops_pending_projectiles() {
    let mut world = world();
    let launcher = unit(&mut world, 0, 0.0, 10, 0.0);
    let wall = unit(&mut world, 1, 4.0, 20, 0.0);
    let mut combatant = catapult();
    engage(&mut world, &mut combatant, launcher, wall);
    let _ = step(&mut world, &mut combatant, launcher);

    let mut events = Vec::new();
    let mut ctx = SimContext::new(&mut world, STEP, &mut events);
    combatant.stop_attacking(launcher, &mut ctx);

    let mut total = 0;
    for _ in 0..5 {
        total += damage_dealt(&step(&mut world, &mut combatant, launcher));
    }
    assert_eq!(total, 0);
    assert_eq!(query::health(&world, wall), Some(20));
}

#[test]
fn immobile_units_wait_for_targets_to_come_in_range() {
    let mut world = world();
    let sentry = unit(&mut world, 0, 0.0, 10, 0.0);
    let raider = unit(&mut world, 1, 4.0, 10, 0.0);
    let mut combatant = melee();
    engage(&mut world, &mut combatant, sentry, raider);

    for _ in 0..3 {
        let events = step(&mut world, &mut combatant, sentry);
        assert_eq!(damage_dealt(&events), 0);
    }
    assert!(!combatant.is_attack_finished());
    assert_eq!(combatant.attack_target(), Some(raider));
}
