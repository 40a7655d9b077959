//! A flat, obstacle-free reference environment.
//!
//! `FlatWorld` implements both ports over a square patch of ground. Agents
//! move in straight lines at their set speed and stop within their stopping
//! distance. It is deterministic and meant for headless runs and tests.

use std::cell::Cell;
use std::collections::BTreeMap;

use wildlife_common::{AnimalKind, EntityId, Vec3};

use crate::machine::Wildlife;
use crate::ports::{NavigationPort, SpatialQueryPort};

/// Default stopping distance of new agents.
pub const DEFAULT_STOPPING_DISTANCE: f32 = 1.0;

/// One navigation agent.
#[derive(Debug, Clone, PartialEq)]
pub struct SimAgent {
    /// Kind of the animal driving this agent
    pub kind: AnimalKind,
    /// Current position
    pub position: Vec3,
    /// Current destination, if a path is set
    pub destination: Option<Vec3>,
    /// Movement speed in units per second
    pub speed: f32,
    /// Arrival tolerance
    pub stopping_distance: f32,
    /// Disabled agents report inactive and never move
    pub enabled: bool,
    /// Blocked agents keep their path but never move
    pub blocked: bool,
    /// Ticks left before the requested path is ready
    pub pending_ticks: u32,
}

/// Flat square world centred on the origin.
#[derive(Debug)]
pub struct FlatWorld {
    agents: BTreeMap<EntityId, SimAgent>,
    half_extent: f32,
    ground_y: f32,
    navigable: bool,
    path_latency: u32,
    sample_calls: Cell<u32>,
}

impl FlatWorld {
    /// Creates a world spanning `[-half_extent, half_extent]` on x and z.
    #[must_use]
    pub fn new(half_extent: f32) -> Self {
        Self {
            agents: BTreeMap::new(),
            half_extent: half_extent.abs(),
            ground_y: 0.0,
            navigable: true,
            path_latency: 0,
            sample_calls: Cell::new(0),
        }
    }

    /// Number of ticks a path request stays pending.
    #[must_use]
    pub fn with_path_latency(mut self, ticks: u32) -> Self {
        self.path_latency = ticks;
        self
    }

    /// Makes the whole surface (un)navigable for position sampling.
    pub fn set_navigable(&mut self, navigable: bool) {
        self.navigable = navigable;
    }

    /// Enables or disables an agent.
    pub fn set_enabled(&mut self, agent: EntityId, enabled: bool) {
        if let Some(a) = self.agents.get_mut(&agent) {
            a.enabled = enabled;
        }
    }

    /// Blocks an agent in place without clearing its path.
    pub fn set_blocked(&mut self, agent: EntityId, blocked: bool) {
        if let Some(a) = self.agents.get_mut(&agent) {
            a.blocked = blocked;
        }
    }

    /// Moves an agent instantly, keeping its path.
    pub fn teleport(&mut self, agent: EntityId, position: Vec3) {
        let position = self.clamp_to_ground(position);
        if let Some(a) = self.agents.get_mut(&agent) {
            a.position = position;
        }
    }

    /// Agent by handle.
    #[must_use]
    pub fn agent(&self, agent: EntityId) -> Option<&SimAgent> {
        self.agents.get(&agent)
    }

    /// Number of `sample_position` calls so far.
    #[must_use]
    pub fn sample_calls(&self) -> u32 {
        self.sample_calls.get()
    }

    /// Moves every agent for `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        for agent in self.agents.values_mut() {
            let Some(destination) = agent.destination else {
                continue;
            };
            if agent.pending_ticks > 0 {
                agent.pending_ticks -= 1;
                continue;
            }
            if !agent.enabled || agent.blocked {
                continue;
            }

            let to_go = destination - agent.position;
            let distance = to_go.length();
            if distance <= agent.stopping_distance {
                continue;
            }
            let step = (agent.speed * dt).min(distance);
            agent.position += to_go / distance * step;
        }
    }

    fn clamp_to_ground(&self, point: Vec3) -> Vec3 {
        Vec3::new(
            point.x.clamp(-self.half_extent, self.half_extent),
            self.ground_y,
            point.z.clamp(-self.half_extent, self.half_extent),
        )
    }
}

impl NavigationPort for FlatWorld {
    fn place_agent(&mut self, agent: EntityId, kind: AnimalKind, position: Vec3) {
        let position = self.clamp_to_ground(position);
        self.agents.insert(
            agent,
            SimAgent {
                kind,
                position,
                destination: None,
                speed: 0.0,
                stopping_distance: DEFAULT_STOPPING_DISTANCE,
                enabled: true,
                blocked: false,
                pending_ticks: 0,
            },
        );
    }

    fn remove_agent(&mut self, agent: EntityId) {
        self.agents.remove(&agent);
    }

    fn position(&self, agent: EntityId) -> Option<Vec3> {
        self.agents.get(&agent).map(|a| a.position)
    }

    fn set_destination(&mut self, agent: EntityId, point: Vec3) {
        let latency = self.path_latency;
        if let Some(a) = self.agents.get_mut(&agent) {
            a.destination = Some(point);
            a.pending_ticks = latency;
        }
    }

    fn reset_path(&mut self, agent: EntityId) {
        if let Some(a) = self.agents.get_mut(&agent) {
            a.destination = None;
            a.pending_ticks = 0;
        }
    }

    fn remaining_distance(&self, agent: EntityId) -> f32 {
        self.agents
            .get(&agent)
            .and_then(|a| a.destination.map(|d| d.distance(a.position)))
            .unwrap_or(0.0)
    }

    fn stopping_distance(&self, agent: EntityId) -> f32 {
        self.agents.get(&agent).map_or(0.0, |a| a.stopping_distance)
    }

    fn path_pending(&self, agent: EntityId) -> bool {
        self.agents
            .get(&agent)
            .is_some_and(|a| a.destination.is_some() && a.pending_ticks > 0)
    }

    fn is_active_and_enabled(&self, agent: EntityId) -> bool {
        self.agents.get(&agent).is_some_and(|a| a.enabled)
    }

    fn speed(&self, agent: EntityId) -> f32 {
        self.agents.get(&agent).map_or(0.0, |a| a.speed)
    }

    fn set_speed(&mut self, agent: EntityId, speed: f32) {
        if let Some(a) = self.agents.get_mut(&agent) {
            a.speed = speed;
        }
    }

    fn sample_position(&self, point: Vec3, max_distance: f32) -> Option<Vec3> {
        self.sample_calls.set(self.sample_calls.get() + 1);
        if !self.navigable {
            return None;
        }
        let nearest = self.clamp_to_ground(point);
        (nearest.distance(point) <= max_distance).then_some(nearest)
    }
}

impl SpatialQueryPort for FlatWorld {
    fn overlap_sphere(
        &self,
        center: Vec3,
        radius: f32,
        kind: AnimalKind,
        limit: usize,
    ) -> Vec<EntityId> {
        let mut hits: Vec<(f32, EntityId)> = self
            .agents
            .iter()
            .filter(|(_, a)| a.kind == kind)
            .map(|(id, a)| (a.position.distance(center), *id))
            .filter(|(distance, _)| *distance <= radius)
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        hits.into_iter().take(limit).map(|(_, id)| id).collect()
    }
}

impl Wildlife<FlatWorld> {
    /// Moves agents then runs one behavior tick.
    pub fn step(&mut self, dt: f32) {
        self.env_mut().advance(dt);
        self.tick(dt);
    }

    /// Steps with a fixed `dt` until `seconds` of simulation time have passed.
    pub fn run_for(&mut self, seconds: f32, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let end = self.now() + f64::from(seconds);
        while self.now() < end {
            self.step(dt);
        }
    }
}
