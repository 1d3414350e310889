//! Funnel physics world for logfall.
//!
//! [`FunnelWorld`] owns every live entity's rigid body, the static funnel
//! boundary, and the derived stats and feed state. The frame loop locks
//! this one aggregate world to feed events in, step it, and snapshot it.
//! Simulation advances in fixed sub-steps consumed from a wall-clock
//! accumulator, so elasticity behavior never depends on frame duration or
//! bursty event arrival.

use std::collections::VecDeque;
use std::time::Instant;

use rand::{Rng, rngs::SmallRng};
use rapier2d::prelude::*;
use slotmap::{SlotMap, new_key_type};

use logfall_core::{
    ConfigError, ControlCommand, FeedLine, InfoFeed, LogEvent, ShapeKind, StatsSnapshot,
    StatsWindow, VisualizerConfig, classify, scaled_radius,
};

new_key_type! {
    /// Stable handle for live entities backed by a generational slot map.
    pub struct EntityId;
}

/// Number of palette slots a spawn may pick its color hint from.
pub const PALETTE_SIZE: u8 = 6;

/// One funnel wall in world coordinates (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallSegment {
    pub start: [f32; 2],
    pub end: [f32; 2],
}

/// Static collision boundary: two angled walls forming a V.
///
/// Computed once from the configured viewport; never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FunnelGeometry {
    pub left: WallSegment,
    pub right: WallSegment,
    /// X coordinate of the opening's left lip.
    pub opening_left: f32,
    /// X coordinate of the opening's right lip.
    pub opening_right: f32,
    /// Y coordinate below which entities have left the viewport.
    pub bottom_y: f32,
}

impl FunnelGeometry {
    /// Anchor the V to the configured sim area.
    #[must_use]
    pub fn from_config(config: &VisualizerConfig) -> Self {
        let center = config.sim_width / 2.0;
        let opening_left = center - config.funnel_gap / 2.0;
        let opening_right = center + config.funnel_gap / 2.0;
        Self {
            left: WallSegment {
                start: [0.0, config.funnel_top_y],
                end: [opening_left, config.sim_height],
            },
            right: WallSegment {
                start: [config.sim_width, config.funnel_top_y],
                end: [opening_right, config.sim_height],
            },
            opening_left,
            opening_right,
            bottom_y: config.sim_height,
        }
    }
}

/// Bookkeeping for one live entity. The rapier sets own the physical body;
/// this is the non-owning side the eviction policy operates on.
#[derive(Debug, Clone, Copy)]
pub struct EntityMeta {
    pub body: RigidBodyHandle,
    pub kind: ShapeKind,
    pub radius: f32,
    pub color_index: u8,
    pub status: u16,
    /// Sim-clock second at which the entity spawned.
    pub spawned_at: f64,
}

/// Bounded registry of live entities with oldest-first eviction.
///
/// Spawn order equals spawn-time order, so a FIFO of ids is the ordering
/// structure; removals elsewhere leave stale ids that are skipped lazily,
/// keeping every operation O(1) amortized.
#[derive(Debug, Default)]
pub struct EntityLedger {
    entities: SlotMap<EntityId, EntityMeta>,
    order: VecDeque<EntityId>,
}

impl EntityLedger {
    fn new(capacity: usize) -> Self {
        Self {
            entities: SlotMap::with_capacity_and_key(capacity),
            order: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true when no entities are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns true if `id` refers to a live entity.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Borrow the bookkeeping for `id`, if live.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&EntityMeta> {
        self.entities.get(id)
    }

    /// Iterate live entities in spawn order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &EntityMeta)> + '_ {
        self.order
            .iter()
            .filter_map(move |id| self.entities.get(*id).map(|meta| (*id, meta)))
    }

    fn insert(&mut self, meta: EntityMeta) -> EntityId {
        let id = self.entities.insert(meta);
        self.order.push_back(id);
        id
    }

    /// Id of the oldest live entity, discarding stale FIFO slots.
    fn oldest(&mut self) -> Option<EntityId> {
        while let Some(front) = self.order.front() {
            if self.entities.contains_key(*front) {
                return Some(*front);
            }
            self.order.pop_front();
        }
        None
    }

    fn remove(&mut self, id: EntityId) -> Option<EntityMeta> {
        self.entities.remove(id)
    }
}

/// Render-facing view of one live entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityViz {
    pub kind: ShapeKind,
    pub x: f32,
    pub y: f32,
    /// Body orientation in radians.
    pub angle: f32,
    pub radius: f32,
    pub color_index: u8,
    pub status: u16,
}

/// Everything the renderer reads, captured once per frame.
#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    /// Live entities in spawn order.
    pub entities: Vec<EntityViz>,
    pub stats: StatsSnapshot,
    /// Info-feed lines, newest first, with fade weights.
    pub feed: Vec<FeedLine>,
    pub funnel: FunnelGeometry,
    pub entity_count: usize,
    pub events_ingested: u64,
    pub sim_time: f64,
}

/// Events emitted by one `step` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepEvents {
    /// Fixed sub-steps consumed from the accumulator.
    pub substeps: u32,
    /// Entities removed for leaving the viewport or aging out.
    pub expired: usize,
}

/// Aggregate world state shared by ingestion and rendering.
pub struct FunnelWorld {
    config: VisualizerConfig,
    funnel: FunnelGeometry,
    ledger: EntityLedger,
    stats: StatsWindow,
    feed: InfoFeed,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    gravity: Vector,
    integration_parameters: IntegrationParameters,
    accumulator: f32,
    sim_time: f64,
    events_ingested: u64,
    rng: SmallRng,
}

impl std::fmt::Debug for FunnelWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunnelWorld")
            .field("entity_count", &self.ledger.len())
            .field("events_ingested", &self.events_ingested)
            .field("sim_time", &self.sim_time)
            .finish()
    }
}

impl FunnelWorld {
    /// Instantiate a world from a validated configuration.
    ///
    /// Wall colliders and the RNG are built here; an `Err` means the
    /// configuration itself is unusable, which is fatal at startup and
    /// distinct from any runtime event error.
    pub fn new(config: VisualizerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let funnel = FunnelGeometry::from_config(&config);
        let rng = config.seeded_rng();

        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();
        let anchor = bodies.insert(RigidBodyBuilder::fixed().build());
        for wall in [&funnel.left, &funnel.right] {
            let shape = SharedShape::capsule(
                Vector::new(wall.start[0], wall.start[1]),
                Vector::new(wall.end[0], wall.end[1]),
                config.wall_thickness,
            );
            let collider = ColliderBuilder::new(shape)
                .restitution(config.elasticity)
                .friction(config.friction)
                .build();
            colliders.insert_with_parent(collider, anchor, &mut bodies);
        }

        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = config.fixed_dt;

        Ok(Self {
            funnel,
            ledger: EntityLedger::new(config.max_entities),
            stats: StatsWindow::new(),
            feed: InfoFeed::from_config(&config),
            bodies,
            colliders,
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity: Vector::new(0.0, config.gravity),
            integration_parameters,
            accumulator: 0.0,
            sim_time: 0.0,
            events_ingested: 0,
            rng,
            config,
        })
    }

    /// Feed one parsed event into the world: stats first (so an event whose
    /// size sets a new peak maps exactly to the maximum radius), then the
    /// feed, then the physical entity. Stats and feed update even when the
    /// entity cap forces an eviction; the cap is a visual policy, not a
    /// data-loss point.
    pub fn ingest(&mut self, event: &LogEvent) {
        self.stats.record(event);
        self.feed.push(event.path.clone(), event.size, event.timestamp);
        self.spawn_entity(event);
        self.events_ingested += 1;
    }

    fn spawn_entity(&mut self, event: &LogEvent) -> EntityId {
        let kind = classify(event.method, event.status);
        let radius = match kind {
            ShapeKind::Circle => scaled_radius(
                event.size,
                self.stats.max_size_seen(),
                self.config.min_radius,
                self.config.max_radius,
            ),
            _ => self.config.min_radius,
        };

        // Strict cap: evict before admitting so the count never exceeds the
        // maximum, even transiently.
        while self.ledger.len() >= self.config.max_entities {
            if let Some(oldest) = self.ledger.oldest() {
                self.remove_entity(oldest);
            } else {
                break;
            }
        }

        let x = self.config.sim_width - 20.0 - radius;
        let y = self.rng.random_range(20.0..=50.0);
        let vx = self.config.spawn_velocity_x
            + self
                .rng
                .random_range(self.config.spawn_jitter_x_min..=self.config.spawn_jitter_x_max);
        let vy = self
            .rng
            .random_range(-self.config.spawn_jitter_y..=self.config.spawn_jitter_y);
        let color_index = self.rng.random_range(0..PALETTE_SIZE);

        let body = RigidBodyBuilder::dynamic()
            .translation(Vector::new(x, y))
            .linvel(Vector::new(vx, vy))
            .build();
        let handle = self.bodies.insert(body);
        for collider in self.build_colliders(kind, radius) {
            self.colliders
                .insert_with_parent(collider, handle, &mut self.bodies);
        }

        self.ledger.insert(EntityMeta {
            body: handle,
            kind,
            radius,
            color_index,
            status: event.status,
            spawned_at: self.sim_time,
        })
    }

    /// Collision shapes per kind. Circles and squares take their mass from
    /// density so larger responses dominate collisions; the arrow and cross
    /// compounds carry a fixed unit mass split across their parts.
    fn build_colliders(&self, kind: ShapeKind, radius: f32) -> Vec<Collider> {
        let base = self.config.min_radius;
        let surface = |builder: ColliderBuilder| {
            builder
                .restitution(self.config.elasticity)
                .friction(self.config.friction)
        };
        match kind {
            ShapeKind::Circle => {
                vec![surface(ColliderBuilder::ball(radius).density(1.0)).build()]
            }
            ShapeKind::Square => {
                vec![surface(ColliderBuilder::cuboid(base, base).density(1.0)).build()]
            }
            ShapeKind::PostArrow => {
                let head = ColliderBuilder::triangle(
                    Vector::new(0.0, -base),
                    Vector::new(base * 2.0 / 3.0, base / 3.0),
                    Vector::new(-base * 2.0 / 3.0, base / 3.0),
                )
                .mass(0.5);
                let tail = ColliderBuilder::cuboid(base / 3.0, base / 3.0)
                    .translation(Vector::new(0.0, base * 2.0 / 3.0))
                    .mass(0.5);
                vec![surface(head).build(), surface(tail).build()]
            }
            ShapeKind::DeleteCross => {
                let bar = |angle: f32| {
                    surface(
                        ColliderBuilder::cuboid(base, base / 3.0)
                            .rotation(angle)
                            .mass(0.5),
                    )
                    .build()
                };
                vec![
                    bar(std::f32::consts::FRAC_PI_4),
                    bar(-std::f32::consts::FRAC_PI_4),
                ]
            }
        }
    }

    fn remove_entity(&mut self, id: EntityId) -> bool {
        match self.ledger.remove(id) {
            Some(meta) => {
                self.bodies.remove(
                    meta.body,
                    &mut self.island_manager,
                    &mut self.colliders,
                    &mut self.impulse_joints,
                    &mut self.multibody_joints,
                    true,
                );
                true
            }
            None => false,
        }
    }

    /// Advance the simulation by `elapsed` wall-clock seconds.
    ///
    /// The elapsed time joins a remainder buffer; whole fixed timesteps are
    /// consumed from it until less than one remains, so results depend only
    /// on the accumulated total, not on how calls were split. The backlog is
    /// capped at `max_substeps_per_step` so a stall cannot trigger a
    /// spiral of catch-up work.
    pub fn step(&mut self, elapsed: f32) -> StepEvents {
        self.accumulator += elapsed.max(0.0);
        let dt = self.config.fixed_dt;
        let max_backlog = dt * self.config.max_substeps_per_step as f32;
        if self.accumulator > max_backlog {
            self.accumulator = max_backlog;
        }

        let mut substeps = 0;
        while self.accumulator >= dt && substeps < self.config.max_substeps_per_step {
            self.pipeline.step(
                self.gravity,
                &self.integration_parameters,
                &mut self.island_manager,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.bodies,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                &mut self.ccd_solver,
                &(),
                &(),
            );
            self.accumulator -= dt;
            self.sim_time += f64::from(dt);
            substeps += 1;
        }

        let expired = self.sweep_expired();
        StepEvents { substeps, expired }
    }

    /// Remove entities that fell below the viewport or outlived the despawn
    /// age (measured on the sim clock, so sweeps are deterministic).
    fn sweep_expired(&mut self) -> usize {
        let despawn_after = f64::from(self.config.despawn_after);
        let bottom = self.funnel.bottom_y;
        let mut expired = Vec::new();
        for (id, meta) in self.ledger.iter() {
            let below = self
                .bodies
                .get(meta.body)
                .map(|body| body.translation().y > bottom)
                .unwrap_or(true);
            if below || self.sim_time - meta.spawned_at > despawn_after {
                expired.push(id);
            }
        }
        for id in &expired {
            self.remove_entity(*id);
        }
        expired.len()
    }

    /// Apply one queued control command.
    pub fn apply_command(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::ResetPeakSize => self.stats.reset_peak(),
        }
    }

    /// Capture everything the renderer needs for one frame.
    pub fn snapshot(&mut self, now: Instant) -> WorldSnapshot {
        let mut entities = Vec::with_capacity(self.ledger.len());
        for (_, meta) in self.ledger.iter() {
            if let Some(body) = self.bodies.get(meta.body) {
                entities.push(EntityViz {
                    kind: meta.kind,
                    x: body.translation().x,
                    y: body.translation().y,
                    angle: body.rotation().angle(),
                    radius: meta.radius,
                    color_index: meta.color_index,
                    status: meta.status,
                });
            }
        }
        WorldSnapshot {
            entities,
            stats: self.stats.snapshot(now),
            feed: self.feed.snapshot(now),
            funnel: self.funnel,
            entity_count: self.ledger.len(),
            events_ingested: self.events_ingested,
            sim_time: self.sim_time,
        }
    }

    /// Returns an immutable reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &VisualizerConfig {
        &self.config
    }

    /// The static funnel boundary.
    #[must_use]
    pub fn funnel(&self) -> &FunnelGeometry {
        &self.funnel
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.ledger.len()
    }

    /// Read-only access to the entity ledger.
    #[must_use]
    pub fn ledger(&self) -> &EntityLedger {
        &self.ledger
    }

    /// Total events fed into the world since construction.
    #[must_use]
    pub const fn events_ingested(&self) -> u64 {
        self.events_ingested
    }

    /// Seconds of simulation consumed so far.
    #[must_use]
    pub const fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Largest response size recorded since the last reset.
    #[must_use]
    pub fn max_size_seen(&self) -> u64 {
        self.stats.max_size_seen()
    }
}
