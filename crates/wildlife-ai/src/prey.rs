//! Prey flight.
//!
//! An alert puts the prey into Chase and schedules a [`FleeTask`]. The task
//! waits for the predator to come within detection range, runs directly away
//! from it while it stays there, then lets the last escape walk finish before
//! returning to Idle.

use tracing::{debug, info, trace};
use wildlife_common::EntityId;

use crate::config::{FleeRule, PreyConfig};
use crate::entity::{Animal, BehaviorState};
use crate::events::BehaviorEvent;
use crate::machine::Wildlife;
use crate::ports::{Environment, NavigationExt};
use crate::task::Step;

/// Phase of a flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FleePhase {
    /// Waiting for the predator to come within detection range
    Sensing,
    /// Running away while the predator is a danger
    Escaping,
    /// Finishing the last escape walk
    Settling {
        /// Time the danger passed
        since: f64,
    },
}

/// Flight from one predator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FleeTask {
    /// Predator being fled from
    pub predator: EntityId,
    /// Time the alert was accepted
    pub alerted_at: f64,
    /// Current phase
    pub phase: FleePhase,
}

impl<E: Environment> Wildlife<E> {
    /// Alerts `prey` that `predator` is hunting it.
    ///
    /// Returns false when the alert was ignored: the prey is gone, is not
    /// prey, or is already fleeing from a live predator.
    pub fn alert_prey(&mut self, prey: EntityId, predator: EntityId) -> bool {
        let Some(brain) = self.arena.get(prey).and_then(Animal::as_prey) else {
            trace!("Alert for {} ignored: not a live prey", prey);
            return false;
        };
        if let Some(flee) = brain.flee {
            let current = flee.task.predator;
            if self.arena.contains(current) {
                if current != predator {
                    debug!("{} already fleeing {}, ignoring {}", prey, current, predator);
                }
                return false;
            }
        }

        self.set_state(prey, BehaviorState::Chase);

        let alerted_at = self.now();
        let scheduled = self.schedule(FleeTask {
            predator,
            alerted_at,
            phase: FleePhase::Sensing,
        });
        let Some(brain) = self.arena.get_mut(prey).and_then(Animal::prey_mut) else {
            return false;
        };
        brain.threat = Some(predator);
        brain.flee = Some(scheduled);

        info!("{} alerted by {}", prey, predator);
        self.events.publish(BehaviorEvent::PreyAlerted { prey, predator });
        true
    }

    pub(crate) fn step_flee(&mut self, id: EntityId) {
        let Some(scheduled) = self
            .arena
            .get(id)
            .and_then(Animal::as_prey)
            .and_then(|b| b.flee)
        else {
            return;
        };
        if !scheduled.is_due(self.tick_count()) {
            return;
        }

        let step = self.run_flee(id, scheduled.task);

        if let Some(brain) = self.arena.get_mut(id).and_then(Animal::prey_mut) {
            if brain.flee.map(|f| f.id) == Some(scheduled.id) {
                brain.flee = match step {
                    Step::Yield(task) => Some(scheduled.with_task(task)),
                    Step::Done => None,
                };
            }
        }
    }

    fn run_flee(&mut self, id: EntityId, mut task: FleeTask) -> Step<FleeTask> {
        let Some(animal) = self.arena.get(id) else {
            return Step::Done;
        };
        let max_walk_time = animal.config().max_walk_time;
        let Some(config) = animal.as_prey().map(|b| b.config().clone()) else {
            return Step::Done;
        };

        loop {
            match task.phase {
                FleePhase::Sensing => {
                    if self.within_range(id, task.predator, config.detection_range) {
                        trace!("{}: {} in range, escaping", id, task.predator);
                        task.phase = FleePhase::Escaping;
                        continue;
                    }
                    let expired = self.now() - task.alerted_at >= f64::from(config.alert_timeout);
                    if expired || !self.is_alive(task.predator) {
                        self.finish_flee(id);
                        return Step::Done;
                    }
                    return Step::Yield(task);
                },
                FleePhase::Escaping => {
                    let present = self.is_alive(task.predator);
                    let danger = match config.flee_rule {
                        FleeRule::PresentAndInRange => {
                            present && self.within_range(id, task.predator, config.detection_range)
                        },
                        FleeRule::PresentOrInRange => present,
                    };
                    if danger {
                        self.run_away(id, task.predator, &config);
                        return Step::Yield(task);
                    }
                    task.phase = FleePhase::Settling { since: self.now() };
                },
                FleePhase::Settling { since } => {
                    let walking = self.env.is_active_and_enabled(id) && self.env.is_travelling(id);
                    if walking && self.now() - since < f64::from(max_walk_time) {
                        return Step::Yield(task);
                    }
                    self.finish_flee(id);
                    return Step::Done;
                },
            }
        }
    }

    fn within_range(&self, id: EntityId, other: EntityId, range: f32) -> bool {
        self.is_alive(other)
            && self
                .env
                .distance_between(id, other)
                .is_some_and(|distance| distance <= range)
    }

    /// Picks a new escape destination once the previous one is reached.
    fn run_away(&mut self, id: EntityId, predator: EntityId, config: &PreyConfig) {
        if !self.env.is_active_and_enabled(id) || self.env.is_travelling(id) {
            return;
        }
        let (Some(position), Some(threat)) = (self.env.position(id), self.env.position(predator)) else {
            return;
        };

        let away = (position - threat).normalize_or_zero();
        let projected = position + away * (config.escape_max_distance * 2.0);
        let destination = self.random_nav_position_for(id, projected, config.escape_max_distance);
        trace!("{}: escaping to {}", id, destination);
        self.env.set_destination(id, destination);
    }

    fn finish_flee(&mut self, id: EntityId) {
        if let Some(brain) = self.arena.get_mut(id).and_then(Animal::prey_mut) {
            brain.threat = None;
            brain.flee = None;
        }
        debug!("{} stopped fleeing", id);
        self.events.publish(BehaviorEvent::FleeEnded { prey: id });
        self.set_state(id, BehaviorState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnimalConfig, PredatorConfig};
    use crate::ports::NavigationPort;
    use crate::sim::FlatWorld;
    use wildlife_common::Vec3;

    const DT: f32 = 0.1;

    fn still() -> AnimalConfig {
        AnimalConfig {
            idle_time: 1000.0,
            walk_speed: 2.0,
            run_speed: 8.0,
            ..AnimalConfig::default()
        }
    }

    fn setup(prey_config: PreyConfig, gap: f32) -> (Wildlife<FlatWorld>, EntityId, EntityId) {
        let mut world = Wildlife::new(FlatWorld::new(1000.0), 11);
        let predator = world.spawn_predator(Vec3::ZERO, still(), PredatorConfig::default());
        let prey = world.spawn_prey(Vec3::new(gap, 0.0, 0.0), still(), prey_config);
        world.env_mut().set_enabled(predator, false);
        (world, predator, prey)
    }

    #[test]
    fn test_alert_enters_chase_and_runs() {
        let (mut world, predator, prey) = setup(PreyConfig::default(), 5.0);

        assert!(world.alert_prey(prey, predator));

        let animal = world.animal(prey).expect("alive");
        assert_eq!(animal.state(), BehaviorState::Chase);
        assert!(animal.handler().is_none());
        assert_eq!(animal.as_prey().and_then(|b| b.threat()), Some(predator));
        assert_eq!(world.env().speed(prey), 8.0);
    }

    #[test]
    fn test_duplicate_alerts_are_ignored() {
        let (mut world, predator, prey) = setup(PreyConfig::default(), 5.0);
        let other = world.spawn_predator(Vec3::new(0.0, 0.0, 3.0), still(), PredatorConfig::default());

        assert!(world.alert_prey(prey, predator));
        let task = world.animal(prey).and_then(|a| a.role().task_id());

        assert!(!world.alert_prey(prey, predator));
        assert!(!world.alert_prey(prey, other));
        assert_eq!(world.animal(prey).and_then(|a| a.role().task_id()), task);
        assert_eq!(
            world.animal(prey).and_then(Animal::as_prey).and_then(|b| b.threat()),
            Some(predator)
        );
    }

    #[test]
    fn test_alert_on_predator_or_dead_prey_is_noop() {
        let (mut world, predator, prey) = setup(PreyConfig::default(), 5.0);
        assert!(!world.alert_prey(predator, prey));
        assert_eq!(world.state(predator), Some(BehaviorState::Idle));

        world.despawn(prey);
        assert!(!world.alert_prey(prey, predator));
    }

    #[test]
    fn test_prey_moves_away_from_predator() {
        let (mut world, predator, prey) = setup(PreyConfig::default(), 5.0);
        world.alert_prey(prey, predator);

        for _ in 0..10 {
            world.step(DT);
        }

        let gap = world
            .env()
            .distance_between(prey, predator)
            .expect("both placed");
        assert!(gap > 5.0, "prey did not run: gap {gap}");
    }

    #[test]
    fn test_escape_is_not_reissued_while_path_pending() {
        let mut world = Wildlife::new(FlatWorld::new(1000.0).with_path_latency(4), 11);
        let predator = world.spawn_predator(Vec3::ZERO, still(), PredatorConfig::default());
        let prey = world.spawn_prey(Vec3::new(5.0, 0.0, 0.0), still(), PreyConfig::default());
        world.env_mut().set_enabled(predator, false);
        world.alert_prey(prey, predator);

        world.step(DT);
        let escape = world.env().agent(prey).and_then(|a| a.destination);
        assert!(escape.is_some());
        let samples = world.env().sample_calls();

        for _ in 0..3 {
            assert!(world.env().path_pending(prey));
            world.step(DT);
            assert_eq!(world.env().agent(prey).and_then(|a| a.destination), escape);
            assert_eq!(world.position(prey), Some(Vec3::new(5.0, 0.0, 0.0)));
        }
        assert_eq!(world.env().sample_calls(), samples);
        assert_eq!(world.state(prey), Some(BehaviorState::Chase));

        world.step(DT);
        world.step(DT);
        let gap = world.env().distance_between(prey, predator).expect("both placed");
        assert!(gap > 5.0, "prey did not run: gap {gap}");
    }

    #[test]
    fn test_flee_settles_when_predator_leaves_range() {
        let (mut world, predator, prey) = setup(PreyConfig::default(), 5.0);
        world.alert_prey(prey, predator);
        world.step(DT);
        let escape = world.env().agent(prey).and_then(|a| a.destination);
        assert!(escape.is_some());

        world.env_mut().teleport(predator, Vec3::new(-900.0, 0.0, 0.0));
        world.drain_events();

        let max_walk_time = world.animal(prey).map_or(0.0, |a| a.config().max_walk_time);
        let mut elapsed = 0.0;
        while world.state(prey) == Some(BehaviorState::Chase) && elapsed < max_walk_time + 1.0 {
            world.step(DT);
            elapsed += DT;
            if world.state(prey) == Some(BehaviorState::Chase) {
                assert_eq!(world.env().agent(prey).and_then(|a| a.destination), escape);
            }
        }

        assert_eq!(world.state(prey), Some(BehaviorState::Idle));
        assert!(world.drain_events().contains(&BehaviorEvent::FleeEnded { prey }));
        assert!(world
            .animal(prey)
            .and_then(Animal::as_prey)
            .is_some_and(|b| b.threat().is_none()));
    }

    #[test]
    fn test_alert_times_out_when_predator_stays_away() {
        let config = PreyConfig {
            alert_timeout: 1.0,
            ..PreyConfig::default()
        };
        let (mut world, predator, prey) = setup(config, 15.0);
        world.alert_prey(prey, predator);
        world.drain_events();

        for _ in 0..9 {
            world.step(DT);
        }
        assert_eq!(world.state(prey), Some(BehaviorState::Chase));

        for _ in 0..3 {
            world.step(DT);
        }
        assert_eq!(world.state(prey), Some(BehaviorState::Idle));
        let brain = world.animal(prey).and_then(Animal::as_prey).expect("prey");
        assert!(brain.threat().is_none());
        assert!(!brain.is_fleeing());
        assert!(world
            .drain_events()
            .contains(&BehaviorEvent::FleeEnded { prey }));
    }

    #[test]
    fn test_flee_ends_when_predator_vanishes() {
        let (mut world, predator, prey) = setup(PreyConfig::default(), 5.0);
        world.alert_prey(prey, predator);
        world.step(DT);
        world.despawn(predator);

        let max_walk_time = world.animal(prey).map_or(0.0, |a| a.config().max_walk_time);
        let mut elapsed = 0.0;
        while world.state(prey) == Some(BehaviorState::Chase) && elapsed < max_walk_time + 1.0 {
            world.step(DT);
            elapsed += DT;
        }

        assert_eq!(world.state(prey), Some(BehaviorState::Idle));
        assert!(elapsed <= max_walk_time + 3.0 * DT);
        assert_eq!(world.env().speed(prey), 2.0);
    }

    #[test]
    fn test_new_alert_after_predator_died() {
        let (mut world, predator, prey) = setup(PreyConfig::default(), 5.0);
        let other = world.spawn_predator(Vec3::new(0.0, 0.0, 3.0), still(), PredatorConfig::default());
        world.alert_prey(prey, predator);
        world.die(predator);

        assert!(world.alert_prey(prey, other));
        assert_eq!(
            world.animal(prey).and_then(Animal::as_prey).and_then(|b| b.threat()),
            Some(other)
        );
    }
}
