//! Interfaces to the systems the behavior core drives but does not own.
//!
//! Navigation (path requests, agent positions, surface sampling) and proximity
//! queries are supplied by the host. Both report through plain values and
//! `Option`, never by panicking, so the behavior engine stays infallible.

use wildlife_common::{AnimalKind, EntityId, Vec3};

/// Default cap on proximity query results.
pub const DEFAULT_OVERLAP_LIMIT: usize = 10;

/// Path requests and agent state, keyed by the animal's handle.
///
/// An agent that is not known to the port reports as inactive with no
/// remaining distance.
pub trait NavigationPort {
    /// Creates the navigation agent for a freshly spawned animal.
    fn place_agent(&mut self, agent: EntityId, kind: AnimalKind, position: Vec3);
    /// Removes the agent of an animal that left the simulation.
    fn remove_agent(&mut self, agent: EntityId);
    /// Current agent position.
    fn position(&self, agent: EntityId) -> Option<Vec3>;
    /// Requests a path to `point`.
    fn set_destination(&mut self, agent: EntityId, point: Vec3);
    /// Clears the current path.
    fn reset_path(&mut self, agent: EntityId);
    /// Distance left along the current path.
    fn remaining_distance(&self, agent: EntityId) -> f32;
    /// Distance under which the destination counts as reached.
    fn stopping_distance(&self, agent: EntityId) -> f32;
    /// Whether a requested path is still being computed.
    fn path_pending(&self, agent: EntityId) -> bool;
    /// Whether the agent exists and is allowed to move.
    fn is_active_and_enabled(&self, agent: EntityId) -> bool;
    /// Current agent speed.
    fn speed(&self, agent: EntityId) -> f32;
    /// Sets the agent speed.
    fn set_speed(&mut self, agent: EntityId, speed: f32);
    /// Nearest navigable point within `max_distance` of `point`.
    fn sample_position(&self, point: Vec3, max_distance: f32) -> Option<Vec3>;
}

/// Proximity search over placed agents.
pub trait SpatialQueryPort {
    /// Agents of `kind` within `radius` of `center`, at most `limit` of them.
    fn overlap_sphere(
        &self,
        center: Vec3,
        radius: f32,
        kind: AnimalKind,
        limit: usize,
    ) -> Vec<EntityId>;
}

/// Everything a wildlife world needs from its host.
pub trait Environment: NavigationPort + SpatialQueryPort {}

impl<T: NavigationPort + SpatialQueryPort> Environment for T {}

/// Convenience queries built on the navigation port.
pub(crate) trait NavigationExt: NavigationPort {
    /// True while the agent is still travelling to its destination.
    fn is_travelling(&self, agent: EntityId) -> bool {
        self.path_pending(agent) || self.remaining_distance(agent) > self.stopping_distance(agent)
    }

    /// Distance between two agents, if both are placed.
    fn distance_between(&self, a: EntityId, b: EntityId) -> Option<f32> {
        Some(self.position(a)?.distance(self.position(b)?))
    }
}

impl<T: NavigationPort + ?Sized> NavigationExt for T {}
