//! Core types shared across the logfall workspace.
//!
//! Everything here is pure, synchronous logic: parsing one access-log line
//! into a [`LogEvent`], classifying an event into the shape it will fall as,
//! the rolling request-rate window, and the scrolling info feed. The physics
//! world in `logfall-sim` and the ingestion/render plumbing in `logfall-app`
//! consume these types but never reach back into them.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use rand::{SeedableRng, rngs::SmallRng};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width of the long rolling rate window (requests/minute).
pub const RATE_WINDOW: Duration = Duration::from_secs(60);
/// Width of the short rolling rate window (requests/second).
pub const SECOND_WINDOW: Duration = Duration::from_secs(1);

/// HTTP request method as far as classification cares about it.
///
/// Anything outside the three methods that map to a distinct shape collapses
/// into [`Method::Other`]; no event is ever unrenderable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
    Other,
}

impl Method {
    /// Map a raw request-method token onto the classification set.
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        match token {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "DELETE" => Self::Delete,
            _ => Self::Other,
        }
    }
}

/// One parsed access-log line, stamped with its time of ingestion.
///
/// Consumed exactly once by the frame loop: it updates the stats window and
/// the info feed and spawns one entity, then is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub method: Method,
    /// Request path with any query string stripped.
    pub path: String,
    pub status: u16,
    /// Response size in bytes; the log's `-` token maps to 0.
    pub size: u64,
    /// Time the line was ingested, not the timestamp printed in the line.
    pub timestamp: Instant,
}

impl LogEvent {
    /// Construct an event stamped at `timestamp`.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>, status: u16, size: u64, timestamp: Instant) -> Self {
        Self {
            method,
            path: path.into(),
            status,
            size,
            timestamp,
        }
    }
}

/// Closed set of physical silhouettes an event can fall as.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// GET (and fallback) requests; radius scales with response size.
    Circle,
    /// POST requests; triangle head plus thin tail, fixed unit mass.
    PostArrow,
    /// DELETE requests; two crossed bars, fixed unit mass.
    DeleteCross,
    /// Any request that answered 404, regardless of method.
    Square,
}

/// Classify an event into its shape. First match wins:
/// 404 beats method, GET beats POST/DELETE, unknown methods fall back to
/// the circle so nothing is ever dropped on the floor.
#[must_use]
pub fn classify(method: Method, status: u16) -> ShapeKind {
    if status == 404 {
        return ShapeKind::Square;
    }
    match method {
        Method::Get => ShapeKind::Circle,
        Method::Post => ShapeKind::PostArrow,
        Method::Delete => ShapeKind::DeleteCross,
        Method::Other => ShapeKind::Circle,
    }
}

/// Map a response size onto a circle radius.
///
/// Square-root scaling of `size / max_size_seen`, clamped to
/// `[min_radius, max_radius]`: the largest response seen so far always maps
/// to `max_radius`, an empty body to `min_radius`, and the curve keeps the
/// drawn area roughly proportional to the byte count in between.
#[must_use]
pub fn scaled_radius(size: u64, max_size_seen: u64, min_radius: f32, max_radius: f32) -> f32 {
    if max_size_seen == 0 || size == 0 {
        return min_radius;
    }
    let ratio = (size as f32 / max_size_seen as f32).clamp(0.0, 1.0);
    (min_radius + ratio.sqrt() * (max_radius - min_radius)).clamp(min_radius, max_radius)
}

/// Render a byte count as a short human-readable string.
#[must_use]
pub fn format_size(size: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Parser for the one fixed access-log grammar.
///
/// The pattern anchors on the quoted request section, so both the plain and
/// the vhost-prefixed common-log variants match; the leading ident and
/// timestamp fields are consumed and ignored. Parsing is a pure function of
/// the line text. Callers count the `None`s as skips.
#[derive(Debug, Clone)]
pub struct LineParser {
    pattern: Regex,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    /// Compile the fixed grammar.
    #[must_use]
    pub fn new() -> Self {
        // "<METHOD> <PATH> <PROTOCOL>" <STATUS> <SIZE|->
        let pattern = Regex::new(r#""(\S+) (\S+) \S+" (\d+) (\d+|-)"#)
            .expect("log grammar pattern is statically valid");
        Self { pattern }
    }

    /// Parse one raw line into an event stamped `now`, or `None` for a skip.
    #[must_use]
    pub fn parse(&self, line: &str, now: Instant) -> Option<LogEvent> {
        let captures = self.pattern.captures(line)?;
        let method = Method::from_token(captures.get(1)?.as_str());
        let raw_path = captures.get(2)?.as_str();
        let path = raw_path.split('?').next().unwrap_or(raw_path);
        let status: u16 = captures.get(3)?.as_str().parse().ok()?;
        let size_token = captures.get(4)?.as_str();
        let size: u64 = if size_token == "-" {
            0
        } else {
            size_token.parse().ok()?
        };
        Some(LogEvent::new(method, path, status, size, now))
    }
}

/// Errors that can occur when validating the visualizer configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Static configuration for a funnel world.
///
/// Constructed once at startup, validated, and passed by reference into the
/// physics world and the ingestion scheduler. Never mutated at runtime; the
/// peak-size reset travels as a [`ControlCommand`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizerConfig {
    /// Width of the physics area in world units.
    pub sim_width: f32,
    /// Height of the physics area in world units.
    pub sim_height: f32,
    /// Y coordinate where the funnel walls begin (y grows downward).
    pub funnel_top_y: f32,
    /// Width of the funnel's bottom opening.
    pub funnel_gap: f32,
    /// Half-thickness of the funnel wall capsules.
    pub wall_thickness: f32,
    /// Downward gravity magnitude.
    pub gravity: f32,
    /// Restitution applied to every shape and both walls.
    pub elasticity: f32,
    /// Friction applied to every shape and both walls.
    pub friction: f32,
    /// Hard cap on simultaneously live entities.
    pub max_entities: usize,
    /// Smallest circle radius; also the base half-extent for the fixed shapes.
    pub min_radius: f32,
    /// Largest circle radius.
    pub max_radius: f32,
    /// Base horizontal spawn velocity (negative: toward the funnel mouth).
    pub spawn_velocity_x: f32,
    /// Lower bound of the horizontal spawn-velocity jitter.
    pub spawn_jitter_x_min: f32,
    /// Upper bound of the horizontal spawn-velocity jitter.
    pub spawn_jitter_x_max: f32,
    /// Symmetric bound of the vertical spawn-velocity jitter.
    pub spawn_jitter_y: f32,
    /// Fixed physics timestep consumed from the wall-clock accumulator.
    pub fixed_dt: f32,
    /// Backlog guard: most substeps one `step` call may consume.
    pub max_substeps_per_step: u32,
    /// Entities older than this many sim-clock seconds are despawned.
    pub despawn_after: f32,
    /// Maximum number of info-feed entries retained.
    pub feed_capacity: usize,
    /// Info-feed entries older than this many seconds are dropped.
    pub feed_max_age: f32,
    /// Window over which an info-feed entry fades from 1.0 to 0.0.
    pub fade_window: f32,
    /// Lower bound of the synthetic generator's event rate (events/second).
    pub synthetic_min_hz: f32,
    /// Upper bound of the synthetic generator's event rate (events/second).
    pub synthetic_max_hz: f32,
    /// Optional RNG seed for reproducible worlds.
    pub rng_seed: Option<u64>,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            sim_width: 850.0,
            sim_height: 800.0,
            funnel_top_y: 300.0,
            funnel_gap: 150.0,
            wall_thickness: 10.0,
            gravity: 900.0,
            elasticity: 0.9,
            friction: 0.5,
            max_entities: 100,
            min_radius: 15.0,
            max_radius: 60.0,
            spawn_velocity_x: -250.0,
            spawn_jitter_x_min: -200.0,
            spawn_jitter_x_max: 100.0,
            spawn_jitter_y: 50.0,
            fixed_dt: 1.0 / 300.0,
            max_substeps_per_step: 48,
            despawn_after: 10.0,
            feed_capacity: 32,
            feed_max_age: 30.0,
            fade_window: 20.0,
            synthetic_min_hz: 15.0,
            synthetic_max_hz: 20.0,
            rng_seed: None,
        }
    }
}

impl VisualizerConfig {
    /// Validate every value a physics body or bounded collection is built
    /// from, so construction downstream can never fail at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sim_width <= 0.0 || self.sim_height <= 0.0 {
            return Err(ConfigError::InvalidConfig(
                "sim dimensions must be positive",
            ));
        }
        if self.funnel_top_y <= 0.0 || self.funnel_top_y >= self.sim_height {
            return Err(ConfigError::InvalidConfig(
                "funnel_top_y must sit inside the sim area",
            ));
        }
        if self.funnel_gap <= 0.0 || self.funnel_gap >= self.sim_width {
            return Err(ConfigError::InvalidConfig(
                "funnel_gap must be positive and narrower than the sim area",
            ));
        }
        if self.wall_thickness <= 0.0 {
            return Err(ConfigError::InvalidConfig(
                "wall_thickness must be positive",
            ));
        }
        if self.gravity <= 0.0 {
            return Err(ConfigError::InvalidConfig("gravity must be positive"));
        }
        if !(0.0..=1.0).contains(&self.elasticity) {
            return Err(ConfigError::InvalidConfig(
                "elasticity must be within [0, 1]",
            ));
        }
        if self.friction < 0.0 {
            return Err(ConfigError::InvalidConfig("friction must be non-negative"));
        }
        if self.max_entities == 0 {
            return Err(ConfigError::InvalidConfig("max_entities must be non-zero"));
        }
        if self.min_radius <= 0.0 || self.max_radius < self.min_radius {
            return Err(ConfigError::InvalidConfig(
                "radii must satisfy 0 < min_radius <= max_radius",
            ));
        }
        if self.spawn_jitter_x_min > self.spawn_jitter_x_max {
            return Err(ConfigError::InvalidConfig(
                "spawn jitter bounds must be ordered",
            ));
        }
        if self.spawn_jitter_y < 0.0 {
            return Err(ConfigError::InvalidConfig(
                "spawn_jitter_y must be non-negative",
            ));
        }
        if self.fixed_dt <= 0.0 {
            return Err(ConfigError::InvalidConfig("fixed_dt must be positive"));
        }
        if self.max_substeps_per_step == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_substeps_per_step must be non-zero",
            ));
        }
        if self.despawn_after <= 0.0 {
            return Err(ConfigError::InvalidConfig(
                "despawn_after must be positive",
            ));
        }
        if self.feed_capacity == 0 {
            return Err(ConfigError::InvalidConfig("feed_capacity must be non-zero"));
        }
        if self.feed_max_age <= 0.0 || self.fade_window <= 0.0 {
            return Err(ConfigError::InvalidConfig(
                "feed_max_age and fade_window must be positive",
            ));
        }
        if self.synthetic_min_hz <= 0.0 || self.synthetic_max_hz < self.synthetic_min_hz {
            return Err(ConfigError::InvalidConfig(
                "synthetic rate band must satisfy 0 < min <= max",
            ));
        }
        Ok(())
    }

    /// Returns the configured RNG, seeding from entropy when no seed is set.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// Derived view of the stats window, computed per frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub max_size_seen: u64,
    pub requests_per_second: usize,
    pub requests_per_minute: usize,
}

/// Rolling request-rate window plus the resettable peak response size.
///
/// Timestamps arrive in ingestion order and are pruned lazily on read, so
/// the derived rates stay correct even across long idle stretches.
#[derive(Debug, Clone, Default)]
pub struct StatsWindow {
    max_size_seen: u64,
    events: VecDeque<Instant>,
}

impl StatsWindow {
    /// Construct an empty window with a zero peak.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event: append its arrival instant and raise the peak.
    pub fn record(&mut self, event: &LogEvent) {
        self.events.push_back(event.timestamp);
        self.max_size_seen = self.max_size_seen.max(event.size);
    }

    /// Reset the peak size only. The rate window is deliberately untouched:
    /// re-scaling future radii must not erase rate history.
    pub fn reset_peak(&mut self) {
        self.max_size_seen = 0;
    }

    /// Largest response size recorded since the last reset.
    #[must_use]
    pub const fn max_size_seen(&self) -> u64 {
        self.max_size_seen
    }

    /// Prune entries older than the long window and count both subsets.
    pub fn snapshot(&mut self, now: Instant) -> StatsSnapshot {
        while let Some(front) = self.events.front() {
            if now.duration_since(*front) > RATE_WINDOW {
                self.events.pop_front();
            } else {
                break;
            }
        }
        let requests_per_second = self
            .events
            .iter()
            .rev()
            .take_while(|stamp| now.duration_since(**stamp) <= SECOND_WINDOW)
            .count();
        StatsSnapshot {
            max_size_seen: self.max_size_seen,
            requests_per_second,
            requests_per_minute: self.events.len(),
        }
    }
}

#[derive(Debug, Clone)]
struct FeedEntry {
    path: String,
    size: u64,
    created_at: Instant,
}

/// One info-feed line paired with its render-time fade weight.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedLine {
    pub path: String,
    pub size: u64,
    /// Opacity multiplier in `[0, 1]`, a pure function of entry age.
    pub fade: f32,
}

/// Append-only scrolling feed of `(path, size)` entries, newest first.
///
/// Bounded two ways: a hard capacity, and a maximum age. Fade weights are
/// never stored; they are recomputed from `now - created_at` at snapshot
/// time so entries rendered in different frames cannot drift apart.
#[derive(Debug, Clone)]
pub struct InfoFeed {
    entries: VecDeque<FeedEntry>,
    capacity: usize,
    max_age: Duration,
    fade_window: Duration,
}

impl InfoFeed {
    /// Construct an empty feed with the given bounds.
    #[must_use]
    pub fn new(capacity: usize, max_age: Duration, fade_window: Duration) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            max_age,
            fade_window,
        }
    }

    /// Construct a feed from the validated configuration.
    #[must_use]
    pub fn from_config(config: &VisualizerConfig) -> Self {
        Self::new(
            config.feed_capacity,
            Duration::from_secs_f32(config.feed_max_age),
            Duration::from_secs_f32(config.fade_window),
        )
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no entries are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prepend one entry, dropping the oldest past capacity or max age.
    pub fn push(&mut self, path: impl Into<String>, size: u64, now: Instant) {
        self.entries.push_front(FeedEntry {
            path: path.into(),
            size,
            created_at: now,
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
        while let Some(oldest) = self.entries.back() {
            if now.duration_since(oldest.created_at) > self.max_age {
                self.entries.pop_back();
            } else {
                break;
            }
        }
    }

    /// Entries in insertion order (newest first) with their fade weights.
    #[must_use]
    pub fn snapshot(&self, now: Instant) -> Vec<FeedLine> {
        self.entries
            .iter()
            .map(|entry| {
                let age = now.duration_since(entry.created_at).as_secs_f32();
                let fade = (1.0 - age / self.fade_window.as_secs_f32()).clamp(0.0, 1.0);
                FeedLine {
                    path: entry.path.clone(),
                    size: entry.size,
                    fade,
                }
            })
            .collect()
    }
}

/// Control signals applied between frames, queued with the same discipline
/// as ingested events so they never race the physics step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ControlCommand {
    /// Zero the peak response size; future radii re-scale from scratch.
    ResetPeakSize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(method: Method, status: u16, size: u64, at: Instant) -> LogEvent {
        LogEvent::new(method, "/index.html", status, size, at)
    }

    #[test]
    fn parser_round_trips_the_sample_line() {
        let parser = LineParser::new();
        let now = Instant::now();
        let line = r#"127.0.0.1 - - [08/May/2025:12:00:00 +0000] "GET /index.html HTTP/1.1" 200 512"#;
        let event = parser.parse(line, now).expect("sample line parses");
        assert_eq!(event.method, Method::Get);
        assert_eq!(event.path, "/index.html");
        assert_eq!(event.status, 200);
        assert_eq!(event.size, 512);
        assert_eq!(event.timestamp, now);
    }

    #[test]
    fn parser_accepts_the_vhost_prefixed_variant() {
        let parser = LineParser::new();
        let line = r#"example.com 10.0.0.1 - - [08/May/2025:12:00:00 +0000] "POST /login HTTP/1.1" 302 -"#;
        let event = parser.parse(line, Instant::now()).expect("vhost line parses");
        assert_eq!(event.method, Method::Post);
        assert_eq!(event.path, "/login");
        assert_eq!(event.status, 302);
        assert_eq!(event.size, 0, "dash size maps to zero");
    }

    #[test]
    fn parser_strips_query_strings() {
        let parser = LineParser::new();
        let line = r#"h - - [x] "GET /search?q=rust&page=2 HTTP/1.1" 200 100"#;
        let event = parser.parse(line, Instant::now()).expect("parses");
        assert_eq!(event.path, "/search");
    }

    #[test]
    fn parser_rejects_garbage() {
        let parser = LineParser::new();
        assert!(parser.parse("malformed garbage line", Instant::now()).is_none());
        assert!(parser.parse("", Instant::now()).is_none());
        assert!(
            parser
                .parse(r#""GET /x HTTP/1.1" notanumber 12"#, Instant::now())
                .is_none()
        );
    }

    #[test]
    fn unknown_methods_collapse_to_other() {
        assert_eq!(Method::from_token("GET"), Method::Get);
        assert_eq!(Method::from_token("PATCH"), Method::Other);
        assert_eq!(Method::from_token("get"), Method::Other);
    }

    #[test]
    fn classification_precedence_is_fixed() {
        assert_eq!(classify(Method::Get, 404), ShapeKind::Square);
        assert_eq!(classify(Method::Post, 404), ShapeKind::Square);
        assert_eq!(classify(Method::Delete, 404), ShapeKind::Square);
        assert_eq!(classify(Method::Other, 404), ShapeKind::Square);
        assert_eq!(classify(Method::Get, 200), ShapeKind::Circle);
        assert_eq!(classify(Method::Post, 201), ShapeKind::PostArrow);
        assert_eq!(classify(Method::Delete, 204), ShapeKind::DeleteCross);
        assert_eq!(classify(Method::Other, 500), ShapeKind::Circle);
    }

    #[test]
    fn radius_scaling_hits_both_boundaries() {
        assert_eq!(scaled_radius(4096, 4096, 15.0, 60.0), 60.0);
        assert_eq!(scaled_radius(0, 4096, 15.0, 60.0), 15.0);
        assert_eq!(scaled_radius(100, 0, 15.0, 60.0), 15.0);
    }

    #[test]
    fn radius_scaling_is_monotonic_and_clamped() {
        let mut previous = 0.0_f32;
        for size in [1_u64, 64, 512, 2048, 4096] {
            let radius = scaled_radius(size, 4096, 15.0, 60.0);
            assert!(radius >= previous);
            assert!((15.0..=60.0).contains(&radius));
            previous = radius;
        }
        // A size above the recorded peak still clamps to max_radius.
        assert_eq!(scaled_radius(9999, 4096, 15.0, 60.0), 60.0);
    }

    #[test]
    fn stats_rates_count_the_correct_windows() {
        let base = Instant::now();
        let mut stats = StatsWindow::new();
        // Five events inside the final second, one 30 s old, one 59 s old.
        let now = base + Duration::from_secs(60);
        stats.record(&event(Method::Get, 200, 10, base + Duration::from_secs(1)));
        stats.record(&event(Method::Get, 200, 10, base + Duration::from_secs(30)));
        for tenths in 0..5 {
            let at = now - Duration::from_millis(100 * (4 - tenths));
            stats.record(&event(Method::Get, 200, 10, at));
        }
        let snapshot = stats.snapshot(now);
        assert_eq!(snapshot.requests_per_second, 5);
        assert_eq!(snapshot.requests_per_minute, 7);
    }

    #[test]
    fn stats_prune_lazily_on_read() {
        let base = Instant::now();
        let mut stats = StatsWindow::new();
        for second in 0..10 {
            stats.record(&event(Method::Get, 200, 1, base + Duration::from_secs(second)));
        }
        // Long idle stretch: everything has aged out by read time.
        let snapshot = stats.snapshot(base + Duration::from_secs(300));
        assert_eq!(snapshot.requests_per_minute, 0);
        assert_eq!(snapshot.requests_per_second, 0);
    }

    #[test]
    fn peak_size_is_monotonic_between_resets() {
        let base = Instant::now();
        let mut stats = StatsWindow::new();
        stats.record(&event(Method::Get, 200, 500, base));
        assert_eq!(stats.max_size_seen(), 500);
        stats.record(&event(Method::Get, 200, 100, base));
        assert_eq!(stats.max_size_seen(), 500, "smaller sizes never lower the peak");
        stats.record(&event(Method::Get, 200, 900, base));
        assert_eq!(stats.max_size_seen(), 900);
    }

    #[test]
    fn reset_clears_the_peak_but_not_the_rate_window() {
        let base = Instant::now();
        let mut stats = StatsWindow::new();
        stats.record(&event(Method::Get, 200, 500, base));
        stats.record(&event(Method::Get, 200, 300, base));
        stats.reset_peak();
        assert_eq!(stats.max_size_seen(), 0);
        let snapshot = stats.snapshot(base);
        assert_eq!(snapshot.requests_per_minute, 2, "rate history survives a reset");
        stats.record(&event(Method::Get, 200, 42, base));
        assert_eq!(stats.max_size_seen(), 42, "next size becomes the new peak");
    }

    #[test]
    fn feed_keeps_insertion_order_newest_first() {
        let base = Instant::now();
        let mut feed = InfoFeed::new(8, Duration::from_secs(30), Duration::from_secs(20));
        feed.push("/first", 1, base);
        feed.push("/second", 2, base + Duration::from_secs(1));
        feed.push("/third", 3, base + Duration::from_secs(2));
        let lines = feed.snapshot(base + Duration::from_secs(2));
        let paths: Vec<&str> = lines.iter().map(|line| line.path.as_str()).collect();
        assert_eq!(paths, ["/third", "/second", "/first"]);
    }

    #[test]
    fn feed_evicts_past_capacity() {
        let base = Instant::now();
        let mut feed = InfoFeed::new(3, Duration::from_secs(300), Duration::from_secs(20));
        for index in 0..5_u64 {
            feed.push(format!("/page{index}"), index, base + Duration::from_secs(index));
        }
        assert_eq!(feed.len(), 3);
        let lines = feed.snapshot(base + Duration::from_secs(5));
        assert_eq!(lines[0].path, "/page4");
        assert_eq!(lines[2].path, "/page2");
    }

    #[test]
    fn feed_evicts_past_max_age() {
        let base = Instant::now();
        let mut feed = InfoFeed::new(8, Duration::from_secs(10), Duration::from_secs(10));
        feed.push("/old", 1, base);
        feed.push("/new", 2, base + Duration::from_secs(15));
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.snapshot(base + Duration::from_secs(15))[0].path, "/new");
    }

    #[test]
    fn fade_is_a_pure_function_of_age() {
        let base = Instant::now();
        let mut feed = InfoFeed::new(8, Duration::from_secs(60), Duration::from_secs(20));
        feed.push("/page", 64, base);
        let fresh = feed.snapshot(base)[0].fade;
        let halfway = feed.snapshot(base + Duration::from_secs(10))[0].fade;
        let gone = feed.snapshot(base + Duration::from_secs(25))[0].fade;
        assert!((fresh - 1.0).abs() < f32::EPSILON);
        assert!((halfway - 0.5).abs() < 1e-3);
        assert!(gone.abs() < f32::EPSILON);
    }

    #[test]
    fn default_config_validates() {
        assert!(VisualizerConfig::default().validate().is_ok());
    }

    #[test]
    fn config_rejects_degenerate_values() {
        let mut config = VisualizerConfig {
            min_radius: 0.0,
            ..VisualizerConfig::default()
        };
        assert!(config.validate().is_err());

        config = VisualizerConfig {
            max_radius: 5.0,
            ..VisualizerConfig::default()
        };
        assert!(config.validate().is_err(), "max below min is rejected");

        config = VisualizerConfig {
            fixed_dt: 0.0,
            ..VisualizerConfig::default()
        };
        assert!(config.validate().is_err());

        config = VisualizerConfig {
            funnel_gap: 2_000.0,
            ..VisualizerConfig::default()
        };
        assert!(config.validate().is_err(), "gap wider than the area is rejected");

        config = VisualizerConfig {
            max_entities: 0,
            ..VisualizerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn format_size_walks_the_unit_ladder() {
        assert_eq!(format_size(0), "0.0 B");
        assert_eq!(format_size(512), "512.0 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }
}
