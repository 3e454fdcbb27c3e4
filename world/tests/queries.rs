use skirmish_core::{EntityKind, Event, Faction, ResourceKind, Vec3};
use skirmish_world::{
    query, AgentSpec, DepotProfile, DepotSpec, NodeSpec, SiteSpec, World, WorldConfig,
};

fn world() -> World {
    World::new(WorldConfig::default()).expect("default config is valid")
}

fn agent(world: &mut World, faction: u8, x: f32, z: f32) -> skirmish_core::EntityId {
    let mut events = Vec::new();
    world.spawn_agent(
        AgentSpec {
            faction: Faction::new(faction),
            position: Vec3::new(x, 0.0, z),
            max_health: 10,
            speed: 1.0,
            footprint: 1,
        },
        &mut events,
    )
}

fn node(world: &mut World, kind: ResourceKind, x: f32, amount: u32) -> skirmish_core::EntityId {
    let mut events = Vec::new();
    world.spawn_resource_node(
        NodeSpec {
            kind,
            amount,
            position: Vec3::new(x, 0.0, 0.0),
            footprint: 1,
        },
        &mut events,
    )
}

fn depot(world: &mut World, x: f32, priority: u32) -> skirmish_core::EntityId {
    let mut events = Vec::new();
    world.place_depot(
        DepotSpec {
            faction: Faction::new(0),
            position: Vec3::new(x, 0.0, 10.0),
            footprint: 1,
            profile: DepotProfile {
                priority,
                accepts: Vec::new(),
            },
        },
        &mut events,
    )
}

#[test]
fn nearest_harvestable_filters_kind_range_and_activity() {
    let mut world = world();
    let far_wood = node(&mut world, ResourceKind::Wood, 9.0, 5);
    let near_stone = node(&mut world, ResourceKind::Stone, 2.0, 5);
    let near_wood = node(&mut world, ResourceKind::Wood, 4.0, 5);

    assert_eq!(
        query::nearest_harvestable(&world, Vec3::ZERO, 20.0, None),
        Some(near_stone)
    );
    assert_eq!(
        query::nearest_harvestable(&world, Vec3::ZERO, 20.0, Some(ResourceKind::Wood)),
        Some(near_wood)
    );

    assert!(world.set_node_active(near_wood, false));
    assert_eq!(
        query::nearest_harvestable(&world, Vec3::ZERO, 20.0, Some(ResourceKind::Wood)),
        Some(far_wood)
    );
    assert_eq!(
        query::nearest_harvestable(&world, Vec3::ZERO, 5.0, Some(ResourceKind::Wood)),
        None,
        "out-of-range nodes are ignored"
    );
}

#[test]
fn deposit_points_prefer_priority_then_distance() {
    let mut world = world();
    let near_low = depot(&mut world, 1.0, 1);
    let far_high = depot(&mut world, 30.0, 0);
    let near_high = depot(&mut world, 5.0, 0);

    assert_eq!(
        query::best_deposit_point(&world, Faction::new(0), ResourceKind::Gold, Vec3::ZERO),
        Some(near_high)
    );
    assert_eq!(
        query::best_deposit_point(&world, Faction::new(1), ResourceKind::Gold, Vec3::ZERO),
        None,
        "depots are faction scoped"
    );
    assert_ne!(near_low, far_high);
}

#[test]
fn nearest_hostile_skips_friends_and_includes_sites() {
    let mut world = world();
    let me = agent(&mut world, 0, 0.0, 0.0);
    let _friend = agent(&mut world, 0, 1.0, 0.0);
    let enemy = agent(&mut world, 1, 6.0, 0.0);
    let mut events = Vec::new();
    let enemy_site = world.place_build_site(
        SiteSpec {
            faction: Faction::new(1),
            position: Vec3::new(0.0, 0.0, 3.0),
            footprint: 1,
            work_required: 5,
            max_health: 5,
            depot: None,
        },
        &mut events,
    );
    let origin = query::position(&world, me).expect("agent exists");

    assert_eq!(
        query::nearest_hostile(&world, Faction::new(0), origin, 10.0),
        Some(enemy_site)
    );
    assert!(query::is_hostile_target(&world, Faction::new(0), enemy));
    assert!(!query::is_hostile_target(&world, Faction::new(1), enemy));
    assert_eq!(query::nearest_hostile(&world, Faction::new(0), origin, 2.0), None);
}

#[test]
fn harvesting_the_last_unit_destroys_the_node() {
    let mut world = world();
    let worker = agent(&mut world, 0, 0.0, 0.0);
    let tree = node(&mut world, ResourceKind::Wood, 2.0, 2);
    let mut events = Vec::new();

    assert_eq!(
        world.harvest(worker, tree, 5, &mut events),
        Some((ResourceKind::Wood, 2))
    );

    assert!(events.contains(&Event::NodeDepleted { node: tree }));
    assert!(events.contains(&Event::EntityDestroyed { entity: tree }));
    assert_eq!(query::kind(&world, tree), None);
    assert!(world.harvest(worker, tree, 1, &mut events).is_none());
}

#[test]
fn agent_view_is_sorted_by_handle() {
    let mut world = world();
    let first = agent(&mut world, 0, 0.0, 0.0);
    let second = agent(&mut world, 1, 3.0, 3.0);

    let ids: Vec<_> = query::agent_view(&world).iter().map(|agent| agent.id).collect();
    assert_eq!(ids, vec![first, second]);
    assert_eq!(query::kind(&world, first), Some(EntityKind::Agent));
    assert_eq!(query::entity_count(&world), 2);
}
