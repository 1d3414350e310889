use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use logfall_app::command;
use logfall_core::{ControlCommand, LineParser, VisualizerConfig};
use logfall_sim::FunnelWorld;

fn seeded_config() -> VisualizerConfig {
    VisualizerConfig {
        rng_seed: Some(0xACCE_55),
        ..VisualizerConfig::default()
    }
}

#[test]
fn synthetic_events_flow_through_the_queue_into_the_world() {
    let config = seeded_config();
    let (sender, receiver) = command::create_event_queue();
    let stop = Arc::new(AtomicBool::new(false));
    let generator =
        logfall_app::ingest::spawn_synthetic_generator(&config, sender, Arc::clone(&stop));

    thread::sleep(Duration::from_secs(1));
    stop.store(true, Ordering::Relaxed);
    generator.join().expect("generator thread");

    let mut world = FunnelWorld::new(config.clone()).expect("world");
    let drained = command::drain_pending_events(&receiver, &mut world);

    // The band is 15-20 events/second; even a heavily loaded runner clears
    // a handful inside one second.
    assert!(drained >= 5, "expected a burst of synthetic events, got {drained}");
    assert_eq!(world.events_ingested(), drained as u64);
    assert!(world.entity_count() <= config.max_entities);

    let snapshot = world.snapshot(Instant::now());
    assert_eq!(
        snapshot.stats.requests_per_minute, drained,
        "every queued event reaches the stats window"
    );
    assert!(!snapshot.feed.is_empty());
    assert!(snapshot.feed.len() <= world.config().feed_capacity);
}

#[test]
fn no_parsed_line_is_lost_between_threads() {
    let (sender, receiver) = command::create_event_queue();
    let producer = thread::spawn(move || {
        let parser = LineParser::new();
        for index in 0..1_000_u32 {
            let line = format!(
                r#"10.0.0.7 - - [08/May/2025:12:00:00 +0000] "GET /asset/{index} HTTP/1.1" 200 {}"#,
                index * 3
            );
            let event = parser
                .parse(&line, Instant::now())
                .expect("generated line parses");
            sender.send(event).expect("queue accepts every event");
        }
    });
    producer.join().expect("producer thread");

    let mut world = FunnelWorld::new(seeded_config()).expect("world");
    let drained = command::drain_pending_events(&receiver, &mut world);
    assert_eq!(drained, 1_000, "the handoff queue never drops events");
    assert_eq!(world.events_ingested(), 1_000);
    // The entity cap trims the visual population, not the data.
    assert_eq!(world.entity_count(), world.config().max_entities);
}

#[test]
fn reset_command_travels_the_bus_into_the_world() {
    let (command_tx, command_rx) = command::create_command_bus(4);
    let submit = command::make_command_submit(command_tx);
    let drain = command::make_command_drain(command_rx);

    let mut world = FunnelWorld::new(seeded_config()).expect("world");
    let parser = LineParser::new();
    let event = parser
        .parse(
            r#"127.0.0.1 - - [x] "GET /big.iso HTTP/1.1" 200 900000"#,
            Instant::now(),
        )
        .expect("line parses");
    world.ingest(&event);
    assert_eq!(world.max_size_seen(), 900_000);

    assert!(submit(ControlCommand::ResetPeakSize));
    drain(&mut world);
    assert_eq!(world.max_size_seen(), 0);
}
