//! Headless demonstration of the snapshot synchronizer.
//!
//! Replays a short recorded run against the ECS scene and prints what each
//! snapshot did. Pass a TOML config path to override the defaults.
//!
//! Run with: cargo run --example headless_demo [config.toml]

use flashpoint_sync::{
    EcsScene, PrefabTable, ReplaySource, StepDriver, SyncConfig, SyncReport, WorldSynchronizer,
};

const FLOOR: &str = r#"{
    "width": 4, "height": 3,
    "tiles": [
        {"x":0,"y":0,"type":"spawn"},  {"x":1,"y":0,"type":"inside"},
        {"x":2,"y":0,"type":"kitchen"},{"x":3,"y":0,"type":"outside"},
        {"x":0,"y":1,"type":"inside"}, {"x":1,"y":1,"type":"inside"},
        {"x":2,"y":1,"type":"inside"}, {"x":3,"y":1,"type":"outside"},
        {"x":0,"y":2,"type":"garage"}, {"x":1,"y":2,"type":"garage"},
        {"x":2,"y":2,"type":"safe"},   {"x":3,"y":2,"type":"outside"}
    ],
    "edges": [
        {"ax":2,"ay":0,"bx":3,"by":0,"type":"wall"},
        {"ax":2,"ay":1,"bx":3,"by":1,"type":"door_closed"},
        {"ax":1,"ay":1,"bx":1,"by":2,"type":"wall"}
    ],
    "hazards": [{"x":1,"y":1,"kind":"fire"},{"x":2,"y":1,"kind":"smoke"}],
    "agents": [{"id":0,"x":3,"y":0},{"id":1,"x":3,"y":2}],
    "victims": [{"x":0,"y":1}],
    "episode": 1, "max_episodes": 1, "current_seed": 897
}"#;

const STEPS: [&str; 3] = [
    r#"{
    "width": 4, "height": 3,
    "edges": [
        {"ax":2,"ay":0,"bx":3,"by":0,"type":"wall"},
        {"ax":2,"ay":1,"bx":3,"by":1,"type":"door_open"},
        {"ax":1,"ay":1,"bx":1,"by":2,"type":"wall"}
    ],
    "hazards": [{"x":1,"y":1,"kind":"fire"}],
    "agents": [{"id":0,"x":2,"y":1},{"id":1,"x":3,"y":1}],
    "victims": [{"x":0,"y":1}],
    "episode": 1, "max_episodes": 1, "current_seed": 897
}"#,
    r#"{
    "width": 4, "height": 3,
    "edges": [
        {"ax":2,"ay":0,"bx":3,"by":0,"type":"wall"},
        {"ax":2,"ay":1,"bx":3,"by":1,"type":"door_open"}
    ],
    "hazards": [],
    "agents": [{"id":0,"x":0,"y":1},{"id":1,"x":1,"y":1}],
    "victims": [{"x":0,"y":1}],
    "episode": 1, "max_episodes": 1, "current_seed": 897
}"#,
    r#"{
    "width": 4, "height": 3,
    "edges": [
        {"ax":2,"ay":0,"bx":3,"by":0,"type":"wall"},
        {"ax":2,"ay":1,"bx":3,"by":1,"type":"door_open"}
    ],
    "hazards": [],
    "agents": [{"id":0,"x":3,"y":1},{"id":1,"x":1,"y":1}],
    "victims": [],
    "game_over": true, "result": "win",
    "simulation_done": true, "episode_finished": true,
    "episode": 1, "max_episodes": 1, "wins": 1, "current_seed": 897,
    "episode_stats": {"victims_rescued": 1, "fires_extinguished": 1,
        "doors_opened": 1, "action_points": 14},
    "total_stats": {"victims_rescued": 1, "fires_extinguished": 1,
        "doors_opened": 1, "action_points": 14}
}"#,
];

fn main() {
    println!("=== Flashpoint Rescue Viewer - Headless Sync Demo ===\n");

    let config = match std::env::args().nth(1) {
        Some(path) => match SyncConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => SyncConfig {
            prefabs: PrefabTable::with_standard_names(4),
            ..Default::default()
        },
    };

    let seed = config.server.seed;
    let source = ReplaySource::new(FLOOR, STEPS.iter().map(|s| s.to_string()));
    let sync = WorldSynchronizer::new(config, EcsScene::new());
    let mut driver = StepDriver::new(source, sync);

    match driver.load(seed) {
        Ok(report) => print_report("Load", &report),
        Err(e) => {
            eprintln!("Load failed: {}", e);
            std::process::exit(1);
        }
    }
    print_scene(&mut driver);

    loop {
        match driver.step() {
            Ok(Some(report)) => {
                print_report(&format!("Step {}", driver.steps()), &report);
                print_scene(&mut driver);
            }
            Ok(None) => break,
            Err(e) => {
                eprintln!("Step failed: {}", e);
                break;
            }
        }
    }

    let sync = driver.synchronizer();
    println!("\n=== Finished: {} ===", sync.is_finished());
    if let Some(totals) = &sync.episode().total_stats {
        println!("Totals: {}", totals);
    }
    println!("Step requests sent: {}", driver.source().step_requests);
}

fn print_report(label: &str, report: &SyncReport) {
    let total = report.total();
    println!(
        "--- {} ({:?}) --- created={} updated={} destroyed={} skipped={} cleared={}",
        label,
        report.phase,
        total.created,
        total.updated,
        total.destroyed,
        total.skipped,
        report.cleared
    );
}

fn print_scene(driver: &mut StepDriver<ReplaySource, EcsScene>) {
    let scene = driver.synchronizer_mut().host_mut();
    println!(
        "  visuals={} floor={} walls={} doors={} fire={} smoke={} agents={} victims={}",
        scene.visual_count(),
        scene.count_prefix("floor_"),
        scene.count_prefix("wall_"),
        scene.count_prefix("door_"),
        scene.count_archetype("fire"),
        scene.count_archetype("smoke"),
        scene.count_prefix("firefighter"),
        scene.count_prefix("victim"),
    );

    let sync = driver.synchronizer();
    let mut agents: Vec<_> = sync.registries().agents.iter().collect();
    agents.sort_by_key(|(id, _)| **id);
    for (id, entity) in agents {
        if let Some(pos) = sync.host().position_of(*entity) {
            println!("    agent {}: ({:.2}, {:.2}, {:.2})", id, pos.x, pos.y, pos.z);
        }
    }
}
