//! Predator pursuit and bite combat.
//!
//! While wandering, a predator scans for prey. Locking a target alerts it and
//! schedules a [`PursuitTask`] that closes the distance, bites once in melee
//! range, waits out the cooldown and then looks for the next target.

use tracing::{debug, info, trace};
use wildlife_common::{AnimalKind, EntityId};

use crate::entity::{Animal, BehaviorState};
use crate::events::{BehaviorEvent, PursuitEnd};
use crate::machine::Wildlife;
use crate::ports::{Environment, NavigationExt};
use crate::task::Step;

/// Phase of a pursuit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PursuitPhase {
    /// Running towards the target
    Closing {
        /// Time the pursuit began
        started_at: f64,
    },
    /// A bite landed; resting until `until`
    Cooldown {
        /// End of the cooldown
        until: f64,
    },
}

/// Pursuit of one target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PursuitTask {
    /// Hunted prey
    pub target: EntityId,
    /// Current phase
    pub phase: PursuitPhase,
}

impl<E: Environment> Wildlife<E> {
    /// Keeps a live target, or locks onto the first live prey in detection range.
    pub(crate) fn predator_check_chase(&mut self, id: EntityId) {
        let Some(brain) = self.arena.get(id).and_then(Animal::as_predator) else {
            return;
        };
        if brain.target().is_some_and(|target| self.arena.contains(target)) {
            return;
        }
        let range = brain.config().detection_range;
        let limit = brain.config().scan_limit;
        let Some(center) = self.env.position(id) else {
            return;
        };

        let found = self
            .env
            .overlap_sphere(center, range, AnimalKind::Prey, limit)
            .into_iter()
            .find(|candidate| {
                *candidate != id
                    && self
                        .arena
                        .get(*candidate)
                        .is_some_and(|a| a.kind() == AnimalKind::Prey)
            });

        match found {
            Some(prey) => self.start_chase(id, prey),
            None => {
                if let Some(brain) = self.arena.get_mut(id).and_then(Animal::predator_mut) {
                    brain.target = None;
                }
            },
        }
    }

    fn start_chase(&mut self, id: EntityId, prey: EntityId) {
        if let Some(brain) = self.arena.get_mut(id).and_then(Animal::predator_mut) {
            brain.target = Some(prey);
        }
        info!("{} started chasing {}", id, prey);
        self.events.publish(BehaviorEvent::ChaseStarted { predator: id, prey });
        self.set_state(id, BehaviorState::Chase);
    }

    /// Alerts the target, starts a pursuit unless one is already running for
    /// it, then drops back to Idle.
    pub(crate) fn predator_handle_chase(&mut self, id: EntityId) {
        let target = self
            .arena
            .get(id)
            .and_then(Animal::as_predator)
            .and_then(|b| b.target())
            .filter(|target| self.arena.contains(*target));

        if let Some(target) = target {
            self.alert_prey(target, id);
            self.begin_pursuit(id, target);
        }
        self.set_state(id, BehaviorState::Idle);
    }

    fn begin_pursuit(&mut self, id: EntityId, target: EntityId) {
        let running = self
            .arena
            .get(id)
            .and_then(Animal::as_predator)
            .and_then(|b| b.pursuit)
            .is_some_and(|p| p.task.target == target);
        if running {
            return;
        }

        let started_at = self.now();
        let scheduled = self.schedule(PursuitTask {
            target,
            phase: PursuitPhase::Closing { started_at },
        });
        if let Some(brain) = self.arena.get_mut(id).and_then(Animal::predator_mut) {
            debug!("{}: pursuing {} ({})", id, target, scheduled.id);
            brain.pursuit = Some(scheduled);
        }
        self.refresh_speed(id);
    }

    pub(crate) fn step_pursuit(&mut self, id: EntityId) {
        let Some(scheduled) = self
            .arena
            .get(id)
            .and_then(Animal::as_predator)
            .and_then(|b| b.pursuit)
        else {
            return;
        };
        if !scheduled.is_due(self.tick_count()) {
            return;
        }

        let step = self.run_pursuit(id, scheduled.task);

        if let Some(brain) = self.arena.get_mut(id).and_then(Animal::predator_mut) {
            if brain.pursuit.map(|p| p.id) == Some(scheduled.id) {
                brain.pursuit = match step {
                    Step::Yield(task) => Some(scheduled.with_task(task)),
                    Step::Done => None,
                };
            }
        }
    }

    fn run_pursuit(&mut self, id: EntityId, task: PursuitTask) -> Step<PursuitTask> {
        let Some(config) = self
            .arena
            .get(id)
            .and_then(Animal::as_predator)
            .map(|b| b.config().clone())
        else {
            return Step::Done;
        };

        match task.phase {
            PursuitPhase::Closing { started_at } => {
                let Some(distance) = self
                    .is_alive(task.target)
                    .then(|| self.env.distance_between(id, task.target))
                    .flatten()
                else {
                    self.stop_chase(id, PursuitEnd::TargetLost);
                    return Step::Done;
                };

                if distance > self.env.stopping_distance(id) {
                    if self.now() - started_at >= f64::from(config.max_chase_time) {
                        self.stop_chase(id, PursuitEnd::Timeout);
                        return Step::Done;
                    }
                    if distance > config.detection_range {
                        self.stop_chase(id, PursuitEnd::OutOfRange);
                        return Step::Done;
                    }
                    self.renew_chase(id, task.target);
                    if let Some(position) = self.env.position(task.target) {
                        self.env.set_destination(id, position);
                    }
                    return Step::Yield(task);
                }

                trace!("{} bites {}", id, task.target);
                self.receive_damage(task.target, config.bite_damage, Some(id));
                Step::Yield(PursuitTask {
                    phase: PursuitPhase::Cooldown {
                        until: self.now() + f64::from(config.bite_cooldown),
                    },
                    ..task
                })
            },
            PursuitPhase::Cooldown { until } => {
                if self.now() < until {
                    return Step::Yield(task);
                }
                self.end_pursuit(id, PursuitEnd::Completed);
                self.handle_chase_state(id);
                self.check_chase_conditions(id);
                Step::Done
            },
        }
    }

    /// Repeats the chase dispatch while closing in.
    ///
    /// A predator already back in Idle stays there: the target is re-alerted
    /// and the idle wait restarts, but no state change is published.
    fn renew_chase(&mut self, id: EntityId, target: EntityId) {
        if self.state(id) != Some(BehaviorState::Idle) {
            self.set_state(id, BehaviorState::Chase);
            return;
        }
        self.alert_prey(target, id);
        self.refresh_speed(id);
        self.update_state(id);
    }

    /// Clears the target and the pursuit slot and drops back to walking speed.
    fn end_pursuit(&mut self, id: EntityId, reason: PursuitEnd) {
        if let Some(brain) = self.arena.get_mut(id).and_then(Animal::predator_mut) {
            brain.target = None;
            brain.pursuit = None;
        }
        debug!("{}: pursuit ended ({:?})", id, reason);
        self.events.publish(BehaviorEvent::PursuitEnded {
            predator: id,
            reason,
        });
        self.refresh_speed(id);
    }

    fn stop_chase(&mut self, id: EntityId, reason: PursuitEnd) {
        self.env.reset_path(id);
        self.end_pursuit(id, reason);
        self.set_state(id, BehaviorState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnimalConfig, PredatorConfig, PreyConfig};
    use crate::ports::NavigationPort;
    use crate::sim::FlatWorld;
    use wildlife_common::Vec3;

    const DT: f32 = 0.1;

    fn still() -> AnimalConfig {
        AnimalConfig {
            idle_time: 1000.0,
            walk_speed: 2.0,
            run_speed: 5.0,
            ..AnimalConfig::default()
        }
    }

    fn world() -> Wildlife<FlatWorld> {
        Wildlife::new(FlatWorld::new(1000.0), 3)
    }

    fn target_of(world: &Wildlife<FlatWorld>, id: EntityId) -> Option<EntityId> {
        world.animal(id).and_then(Animal::as_predator).and_then(|b| b.target())
    }

    #[test]
    fn test_detects_only_prey_in_range() {
        let mut world = world();
        let predator = world.spawn_predator(Vec3::ZERO, still(), PredatorConfig::default());
        let _rival = world.spawn_predator(Vec3::new(2.0, 0.0, 0.0), still(), PredatorConfig::default());
        let far = world.spawn_prey(Vec3::new(30.0, 0.0, 0.0), still(), PreyConfig::default());

        world.check_chase_conditions(predator);
        assert_eq!(target_of(&world, predator), None);
        assert_eq!(world.state(far), Some(BehaviorState::Idle));

        let near = world.spawn_prey(Vec3::new(15.0, 0.0, 0.0), still(), PreyConfig::default());
        world.check_chase_conditions(predator);
        assert_eq!(target_of(&world, predator), Some(near));
        assert_eq!(world.state(near), Some(BehaviorState::Chase));
        assert_eq!(world.state(predator), Some(BehaviorState::Idle));
        assert_eq!(world.env().speed(predator), 5.0);
    }

    #[test]
    fn test_live_target_is_kept() {
        let mut world = world();
        let predator = world.spawn_predator(Vec3::ZERO, still(), PredatorConfig::default());
        let first = world.spawn_prey(Vec3::new(10.0, 0.0, 0.0), still(), PreyConfig::default());
        world.check_chase_conditions(predator);
        let pursuit = world.animal(predator).and_then(|a| a.role().task_id());

        let closer = world.spawn_prey(Vec3::new(1.0, 0.0, 0.0), still(), PreyConfig::default());
        world.check_chase_conditions(predator);

        assert_eq!(target_of(&world, predator), Some(first));
        assert_eq!(world.animal(predator).and_then(|a| a.role().task_id()), pursuit);
        assert_eq!(world.state(closer), Some(BehaviorState::Idle));
    }

    #[test]
    fn test_prey_never_hunts() {
        let mut world = world();
        let prey = world.spawn_prey(Vec3::ZERO, still(), PreyConfig::default());
        world.spawn_prey(Vec3::new(1.0, 0.0, 0.0), still(), PreyConfig::default());

        world.check_chase_conditions(prey);
        assert_eq!(world.state(prey), Some(BehaviorState::Idle));
    }

    #[test]
    fn test_pursuit_aborts_when_target_vanishes() {
        let mut world = world();
        let predator = world.spawn_predator(Vec3::ZERO, still(), PredatorConfig::default());
        let prey = world.spawn_prey(Vec3::new(8.0, 0.0, 0.0), still(), PreyConfig::default());
        world.check_chase_conditions(predator);
        world.step(DT);
        assert!(world.env().agent(predator).and_then(|a| a.destination).is_some());

        world.despawn(prey);
        world.drain_events();
        world.step(DT);

        assert_eq!(target_of(&world, predator), None);
        assert_eq!(world.state(predator), Some(BehaviorState::Idle));
        assert!(world.env().agent(predator).and_then(|a| a.destination).is_none());
        assert_eq!(world.env().speed(predator), 2.0);
        assert!(world.drain_events().contains(&BehaviorEvent::PursuitEnded {
            predator,
            reason: PursuitEnd::TargetLost,
        }));
    }

    #[test]
    fn test_pursuit_times_out() {
        let mut world = world();
        let config = PredatorConfig {
            max_chase_time: 1.0,
            ..PredatorConfig::default()
        };
        let predator = world.spawn_predator(Vec3::ZERO, still(), config);
        let prey = world.spawn_prey(Vec3::new(8.0, 0.0, 0.0), still(), PreyConfig::default());
        world.env_mut().set_enabled(predator, false);
        world.env_mut().set_enabled(prey, false);
        world.check_chase_conditions(predator);

        let mut reason = None;
        while world.now() < 2.0 && reason.is_none() {
            world.step(DT);
            reason = world.drain_events().into_iter().find_map(|e| match e {
                BehaviorEvent::PursuitEnded { reason, .. } => Some(reason),
                _ => None,
            });
        }

        assert_eq!(reason, Some(PursuitEnd::Timeout));
        assert!(world.now() <= 1.0 + 2.0 * f64::from(DT));
        assert!(world.is_alive(prey));
    }

    #[test]
    fn test_long_chase_keeps_event_volume_flat() {
        let config = crate::config::WildlifeConfig {
            event_capacity: 32,
            ..crate::config::WildlifeConfig::default()
        };
        let mut world = Wildlife::from_config(FlatWorld::new(1000.0), &config);
        let chaser = PredatorConfig {
            max_chase_time: 600.0,
            ..PredatorConfig::default()
        };
        let predator = world.spawn_predator(Vec3::ZERO, still(), chaser);
        let prey = world.spawn_prey(Vec3::new(8.0, 0.0, 0.0), still(), PreyConfig::default());
        world.env_mut().set_blocked(predator, true);
        world.env_mut().set_enabled(prey, false);
        world.check_chase_conditions(predator);
        world.drain_events();

        for _ in 0..600 {
            world.step(DT);
        }

        let events = world.drain_events();
        assert!(events.len() < 32, "{} events queued", events.len());
        assert!(!events
            .iter()
            .any(|e| matches!(e, BehaviorEvent::StateChanged { id, .. } if *id == predator)));
        assert_eq!(target_of(&world, predator), Some(prey));
        assert_eq!(world.state(predator), Some(BehaviorState::Idle));
        assert!(world
            .animal(predator)
            .and_then(Animal::handler)
            .is_some_and(|h| matches!(h.task, crate::task::StateTask::WaitToMove { .. })));
        assert_eq!(world.env().speed(predator), 5.0);
    }

    #[test]
    fn test_bite_then_cooldown() {
        let mut world = world();
        let predator = world.spawn_predator(Vec3::ZERO, still(), PredatorConfig::default());
        let prey = world.spawn_prey(Vec3::new(0.5, 0.0, 0.0), still(), PreyConfig::default());
        world.env_mut().set_enabled(prey, false);
        world.check_chase_conditions(predator);

        world.step(DT);
        assert_eq!(world.health(prey), Some(7));
        let phase = world
            .animal(predator)
            .and_then(Animal::as_predator)
            .and_then(|b| b.pursuit)
            .map(|p| p.task.phase);
        assert!(matches!(phase, Some(PursuitPhase::Cooldown { .. })));

        // No second bite during the cooldown
        for _ in 0..10 {
            world.step(DT);
        }
        assert_eq!(world.health(prey), Some(7));
    }
}
