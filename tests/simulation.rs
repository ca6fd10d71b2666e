use std::path::PathBuf;

use homestead::{
    engine::{EngineBuilder, EngineSettings},
    scenario::{Scenario, ScenarioLoader},
    settlement::ResourceKind,
    World,
};

fn scenario_loader() -> ScenarioLoader {
    ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
}

fn frontier() -> Scenario {
    scenario_loader().load("scenarios/frontier.yaml").unwrap()
}

fn build_engine(scenario: &Scenario) -> EngineBuilder {
    let settings = EngineSettings {
        scenario_name: scenario.name.clone(),
        seed: scenario.seed,
        snapshot_interval_ticks: 0,
        snapshot_dir: PathBuf::from("snapshots_simulation_tests"),
    };
    EngineBuilder::new(settings).with_standard_systems()
}

fn assert_consistent(world: &World) {
    let settlement = &world.settlement;
    let population = &settlement.population;
    assert!(population.total >= 1);
    assert_eq!(
        population.groups.total(),
        population.total,
        "activity groups must cover the whole population at tick {}",
        world.tick()
    );
    assert!((settlement.preferences.sum() - 1.0).abs() < 1e-9);
    for (kind, amount) in settlement.resources.iter() {
        assert!(amount >= 0.0, "{kind} went negative: {amount}");
    }
    for (label, value) in [
        ("health", settlement.stats.health),
        ("happiness", settlement.stats.happiness),
        ("knowledge", settlement.stats.knowledge_level),
    ] {
        assert!((0.0..=100.0).contains(&value), "{label} out of range: {value}");
    }

    let research = &settlement.research;
    let discovered = research.discovered_ids();
    let in_progress = research.in_progress_ids();
    assert!(discovered.is_disjoint(&in_progress));
    for id in &in_progress {
        let def = world.catalog().get(id.as_str()).expect("known technology");
        assert!(
            def.requirements.iter().all(|req| discovered.contains(req)),
            "{id} is being researched without its requirements"
        );
        let progress = research.progress(id.as_str()).unwrap().progress_percent;
        assert!((0.0..100.0).contains(&progress));
    }

    let ecosystem = &world.ecosystem;
    assert!((0.0..=1.0).contains(&ecosystem.water_availability));
    assert!((0.0..=1.0).contains(&ecosystem.soil_fertility));
}

#[test]
fn a_year_keeps_the_settlement_consistent() {
    let scenario = frontier();
    let mut world = scenario.build_world().unwrap();
    let mut engine = build_engine(&scenario).build();

    let mut checked = 0;
    for _ in 0..scenario.ticks(None) {
        let day_fraction = world.day_fraction();
        engine.step(&mut world, day_fraction).unwrap();
        assert_consistent(&world);
        checked += 1;
    }

    assert_eq!(checked, 360);
    assert_eq!(world.environment.days_passed, 360.0);
    assert!(!world.events.is_empty(), "a year without a single event");
}

#[test]
fn same_seed_gives_the_same_history() {
    let scenario = frontier();
    let run = || {
        let mut world = scenario.build_world().unwrap();
        let mut engine = build_engine(&scenario).build();
        engine.run(&mut world, 120).unwrap();
        world
    };
    let first = run();
    let second = run();
    assert_eq!(first.settlement, second.settlement);
    assert_eq!(first.ecosystem, second.ecosystem);
    assert_eq!(first.environment, second.environment);
    assert_eq!(
        first.events.iter().cloned().collect::<Vec<_>>(),
        second.events.iter().cloned().collect::<Vec<_>>()
    );
}

#[test]
fn fractional_days_cover_the_same_calendar() {
    let scenario = scenario_loader()
        .load("scenarios/dry_valley.yaml")
        .unwrap();
    assert_eq!(scenario.day_fraction, 0.5);
    let mut world = scenario.build_world().unwrap();
    assert_eq!(world.settlement.population.total, 18);
    assert_eq!(world.settlement.resources.get(ResourceKind::Water), 40.0);
    assert!(world.settlement.research.is_discovered("stone_tools"));

    let mut engine = build_engine(&scenario).build();
    engine.run(&mut world, 40).unwrap();
    assert_eq!(world.tick(), 40);
    assert_eq!(world.environment.days_passed, 20.0);
    assert_consistent(&world);
}

#[test]
fn events_are_stamped_with_the_producing_tick() {
    let scenario = frontier();
    let mut world = scenario.build_world().unwrap();
    let mut engine = build_engine(&scenario).build();
    engine.run(&mut world, 90).unwrap();

    let mut last_tick = 0;
    for entry in world.events.iter() {
        assert!(entry.tick >= 1 && entry.tick <= 90);
        assert!(entry.tick >= last_tick, "events out of order");
        last_tick = entry.tick;
    }
}
