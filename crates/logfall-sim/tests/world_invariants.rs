use std::time::Instant;

use logfall_core::{LineParser, LogEvent, Method, ShapeKind, VisualizerConfig};
use logfall_sim::FunnelWorld;

fn seeded_config() -> VisualizerConfig {
    VisualizerConfig {
        rng_seed: Some(0xDEAD_BEEF),
        ..VisualizerConfig::default()
    }
}

#[test]
fn seeded_worlds_advance_deterministically() {
    let now = Instant::now();
    let mut world_a = FunnelWorld::new(seeded_config()).expect("world_a");
    let mut world_b = FunnelWorld::new(seeded_config()).expect("world_b");

    let parser = LineParser::new();
    let lines = [
        r#"127.0.0.1 - - [08/May/2025:12:00:00 +0000] "GET /index.html HTTP/1.1" 200 512"#,
        r#"127.0.0.1 - - [08/May/2025:12:00:01 +0000] "POST /login HTTP/1.1" 302 -"#,
        r#"127.0.0.1 - - [08/May/2025:12:00:02 +0000] "DELETE /cart/3 HTTP/1.1" 204 -"#,
        r#"127.0.0.1 - - [08/May/2025:12:00:03 +0000] "GET /missing HTTP/1.1" 404 162"#,
        r#"127.0.0.1 - - [08/May/2025:12:00:04 +0000] "GET /big.iso HTTP/1.1" 200 88064"#,
    ];
    for line in lines {
        let event = parser.parse(line, now).expect("line parses");
        world_a.ingest(&event);
        world_b.ingest(&event);
    }

    let dt = world_a.config().fixed_dt;
    for _ in 0..40 {
        world_a.step(dt * 6.2);
        world_b.step(dt * 6.2);
    }

    let a = world_a.snapshot(now);
    let b = world_b.snapshot(now);
    assert_eq!(a.sim_time, b.sim_time);
    assert_eq!(a.entities.len(), b.entities.len());
    for (left, right) in a.entities.iter().zip(b.entities.iter()) {
        assert_eq!(left.kind, right.kind);
        assert_eq!(left.x, right.x);
        assert_eq!(left.y, right.y);
        assert_eq!(left.angle, right.angle);
    }
}

#[test]
fn parsed_lines_map_to_the_expected_shapes() {
    let now = Instant::now();
    let mut world = FunnelWorld::new(seeded_config()).expect("world");
    let parser = LineParser::new();

    let cases = [
        (r#"h - - [x] "GET /a HTTP/1.1" 200 100"#, ShapeKind::Circle),
        (r#"h - - [x] "POST /b HTTP/1.1" 201 50"#, ShapeKind::PostArrow),
        (r#"h - - [x] "DELETE /c HTTP/1.1" 204 -"#, ShapeKind::DeleteCross),
        (r#"h - - [x] "GET /d HTTP/1.1" 404 162"#, ShapeKind::Square),
        (r#"h - - [x] "OPTIONS /e HTTP/1.1" 200 10"#, ShapeKind::Circle),
    ];
    for (line, _) in &cases {
        let event = parser.parse(line, now).expect("line parses");
        world.ingest(&event);
    }

    let snapshot = world.snapshot(now);
    let kinds: Vec<ShapeKind> = snapshot.entities.iter().map(|viz| viz.kind).collect();
    let expected: Vec<ShapeKind> = cases.iter().map(|(_, kind)| *kind).collect();
    assert_eq!(kinds, expected);
}

#[test]
fn a_burst_never_overshoots_the_cap_and_settles_empty() {
    let config = VisualizerConfig {
        max_entities: 25,
        ..seeded_config()
    };
    let despawn_after = config.despawn_after;
    let mut world = FunnelWorld::new(config).expect("world");
    let now = Instant::now();

    // A burst far beyond the cap arrives between two frames.
    for index in 0..200_u64 {
        world.ingest(&LogEvent::new(Method::Get, "/burst", 200, index, now));
        assert!(world.entity_count() <= 25);
    }
    assert_eq!(world.entity_count(), 25);
    assert_eq!(world.events_ingested(), 200);

    // With no further traffic every survivor either falls out through the
    // opening or ages out on the sim clock.
    while world.sim_time() < f64::from(despawn_after) + 1.0 {
        world.step(0.1);
    }
    assert_eq!(world.entity_count(), 0);
}
