//! Ingestion scheduler: one source thread feeding the handoff queue.
//!
//! The two source modes are mutually exclusive and chosen once at startup.
//! Live mode blocks on stdin lines until EOF; test mode emits synthetic
//! traffic inside the configured rate band until asked to stop. Either way
//! the frame loop only ever sees `LogEvent`s arriving through the queue.

use std::io::{self, BufRead};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::{Rng, rngs::SmallRng};
use tracing::{debug, info};

use logfall_core::{LineParser, LogEvent, Method, VisualizerConfig};

use crate::command::EventSender;

const SYNTHETIC_METHODS: [Method; 3] = [Method::Get, Method::Post, Method::Delete];
const SYNTHETIC_STATUSES: [u16; 2] = [200, 404];
const SYNTHETIC_PATHS: [&str; 6] = [
    "/page1",
    "/page2",
    "/api/data",
    "/images/img.jpg",
    "/login",
    "/logout",
];
const SYNTHETIC_MAX_SIZE: u64 = 100_000;

/// Tail newline-delimited log lines from stdin until EOF.
///
/// Each line that matches the grammar becomes exactly one event, stamped
/// with its ingestion instant. Non-matching lines are counted and dropped,
/// never treated as fatal. The thread ends when the stream closes or the frame loop
/// drops its end of the queue.
pub fn spawn_stdin_tail(sender: EventSender) -> JoinHandle<()> {
    thread::spawn(move || {
        let parser = LineParser::new();
        let stdin = io::stdin();
        let mut skipped: u64 = 0;
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(_) => break,
            };
            match parser.parse(&line, Instant::now()) {
                Some(event) => {
                    if sender.send(event).is_err() {
                        break;
                    }
                }
                None => {
                    skipped += 1;
                    debug!(skipped, "skipped unparseable log line");
                }
            }
        }
        info!(skipped, "log stream closed");
    })
}

/// Emit synthetic traffic at a randomized rate inside the configured band
/// until `stop` is raised.
pub fn spawn_synthetic_generator(
    config: &VisualizerConfig,
    sender: EventSender,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    let min_interval = 1.0 / config.synthetic_max_hz;
    let max_interval = 1.0 / config.synthetic_min_hz;
    let mut rng = config.seeded_rng();
    thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            let interval = rng.random_range(min_interval..=max_interval);
            thread::sleep(Duration::from_secs_f32(interval));
            if sender.send(synthetic_event(&mut rng, Instant::now())).is_err() {
                break;
            }
        }
        info!("synthetic generator stopped");
    })
}

/// One synthetic event drawn from the fixed method/path/status tables.
#[must_use]
pub fn synthetic_event(rng: &mut SmallRng, now: Instant) -> LogEvent {
    let method = SYNTHETIC_METHODS[rng.random_range(0..SYNTHETIC_METHODS.len())];
    let status = SYNTHETIC_STATUSES[rng.random_range(0..SYNTHETIC_STATUSES.len())];
    let path = SYNTHETIC_PATHS[rng.random_range(0..SYNTHETIC_PATHS.len())];
    let size = rng.random_range(0..=SYNTHETIC_MAX_SIZE);
    LogEvent::new(method, path, status, size, now)
}
