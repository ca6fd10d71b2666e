use homestead::{
    engine::{EngineBuilder, EngineSettings},
    scenario::ScenarioLoader,
};
use tempfile::tempdir;

#[test]
fn engine_runs_hook_each_tick() {
    let loader = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"));
    let scenario = loader
        .load("scenarios/frontier.yaml")
        .expect("scenario should load");
    let mut world = scenario.build_world().expect("world builds");
    let temp = tempdir().expect("tempdir");
    let settings = EngineSettings {
        scenario_name: scenario.name.clone(),
        seed: scenario.seed,
        snapshot_interval_ticks: 0,
        snapshot_dir: temp.path().to_path_buf(),
    };
    let mut engine = EngineBuilder::new(settings)
        .with_standard_systems()
        .build();

    let mut ticks = Vec::new();
    let mut days = Vec::new();
    engine
        .run_with_hook(&mut world, 6, |frame| {
            ticks.push(frame.tick);
            days.push(frame.days_passed);
        })
        .expect("run succeeds");

    assert_eq!(ticks, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(days.last().copied(), Some(6.0));
    assert_eq!(world.tick(), 6);
    assert!(
        std::fs::read_dir(temp.path())
            .expect("dir readable")
            .next()
            .is_none(),
        "interval zero writes nothing"
    );
}

#[test]
fn step_rejects_invalid_day_fractions() {
    let loader = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"));
    let scenario = loader.load("scenarios/frontier.yaml").unwrap();
    let mut world = scenario.build_world().unwrap();
    let before = world.settlement.clone();
    let mut engine = EngineBuilder::new(EngineSettings {
        scenario_name: scenario.name.clone(),
        seed: scenario.seed,
        snapshot_interval_ticks: 0,
        snapshot_dir: std::path::PathBuf::from("snapshots_engine_hook_tests"),
    })
    .with_standard_systems()
    .build();

    assert!(engine.step(&mut world, -1.0).is_err());
    assert!(engine.step(&mut world, f64::NAN).is_err());
    assert!(engine.step(&mut world, f64::INFINITY).is_err());
    assert_eq!(world.tick(), 0);
    assert_eq!(world.settlement, before);

    engine.step(&mut world, 0.0).unwrap();
    assert_eq!(world.tick(), 1);
    assert_eq!(world.environment.days_passed, 0.0);
}

#[test]
fn plain_run_matches_a_hooked_run() {
    let loader = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"));
    let scenario = loader.load("scenarios/frontier.yaml").unwrap();
    let engine = || {
        EngineBuilder::new(EngineSettings {
            scenario_name: scenario.name.clone(),
            seed: scenario.seed,
            snapshot_interval_ticks: 0,
            snapshot_dir: std::path::PathBuf::from("snapshots_engine_hook_tests"),
        })
        .with_standard_systems()
        .build()
    };

    let mut plain = scenario.build_world().unwrap();
    engine().run(&mut plain, 20).unwrap();

    let mut hooked = scenario.build_world().unwrap();
    let mut frames = 0;
    engine()
        .run_with_hook(&mut hooked, 20, |_| frames += 1)
        .unwrap();

    assert_eq!(frames, 20);
    assert_eq!(plain.tick(), 20);
    assert_eq!(plain.settlement, hooked.settlement);
    assert_eq!(plain.ecosystem, hooked.ecosystem);
    assert_eq!(plain.environment, hooked.environment);
}
