//! Behavior state machine shared by every animal.
//!
//! `Wildlife` owns the animals, the host environment and the clock. Each
//! animal has one active `BehaviorState`; all transitions go through
//! [`Wildlife::set_state`], which cancels the previous state's handler task
//! before dispatching the new one. Waiting is modelled as tasks stepped once
//! per [`Wildlife::tick`].

use std::f32::consts::TAU;

use tracing::{debug, info, trace, warn};
use wildlife_common::{AnimalKind, EntityId, Vec3, WildlifeError, WildlifeResult};

use crate::config::{
    AnimalConfig, PredatorConfig, PredatorSpecies, PreyConfig, PreySpecies, WildlifeConfig,
};
use crate::entity::{Animal, AnimalArena, BehaviorState, PredatorBrain, PreyBrain, Role};
use crate::events::{BehaviorEvent, EventBus};
use crate::ports::{Environment, NavigationExt};
use crate::task::{Scheduled, StateTask, Step, TaskId, TaskIds};

/// Attempts made by [`Wildlife::random_nav_position`] before falling back to the origin.
pub const NAV_SAMPLE_ATTEMPTS: u32 = 5;

/// Uniform random point inside the unit sphere.
pub fn random_in_unit_sphere(rng: &mut fastrand::Rng) -> Vec3 {
    let z = rng.f32() * 2.0 - 1.0;
    let theta = rng.f32() * TAU;
    let planar = (1.0 - z * z).max(0.0).sqrt();
    let radius = rng.f32().cbrt();
    Vec3::new(planar * theta.cos(), planar * theta.sin(), z) * radius
}

/// A population of animals driven through one environment.
#[derive(Debug)]
pub struct Wildlife<E> {
    pub(crate) env: E,
    pub(crate) arena: AnimalArena,
    rng: fastrand::Rng,
    pub(crate) events: EventBus,
    task_ids: TaskIds,
    now: f64,
    tick: u64,
}

impl<E: Environment> Wildlife<E> {
    /// Creates an empty world with a seeded RNG.
    #[must_use]
    pub fn new(env: E, seed: u64) -> Self {
        Self {
            env,
            arena: AnimalArena::new(),
            rng: fastrand::Rng::with_seed(seed),
            events: EventBus::default(),
            task_ids: TaskIds::default(),
            now: 0.0,
            tick: 0,
        }
    }

    /// Creates an empty world using the seed and bus capacity from `config`.
    #[must_use]
    pub fn from_config(env: E, config: &WildlifeConfig) -> Self {
        Self {
            events: EventBus::new(config.event_capacity),
            ..Self::new(env, config.seed)
        }
    }

    // ------------------------------------------------------------------
    // Read surface
    // ------------------------------------------------------------------

    /// Host environment.
    #[must_use]
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Mutable host environment.
    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    /// Simulation time in seconds.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Number of ticks run so far.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Number of live animals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Returns true if no animal is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Animal by handle; `None` once it left the simulation.
    #[must_use]
    pub fn animal(&self, id: EntityId) -> Option<&Animal> {
        self.arena.get(id)
    }

    /// Animal by handle, as an error when absent.
    pub fn try_animal(&self, id: EntityId) -> WildlifeResult<&Animal> {
        self.arena.get(id).ok_or(WildlifeError::UnknownEntity(id))
    }

    /// Animal by handle, requiring a specific kind.
    pub fn try_animal_of(&self, id: EntityId, kind: AnimalKind) -> WildlifeResult<&Animal> {
        let animal = self.try_animal(id)?;
        if animal.kind() == kind {
            Ok(animal)
        } else {
            Err(WildlifeError::WrongKind { id, expected: kind })
        }
    }

    /// Iterates over live animals.
    pub fn animals(&self) -> impl Iterator<Item = &Animal> {
        self.arena.iter()
    }

    /// Whether the handle still resolves.
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.arena.contains(id)
    }

    /// Current behavior state.
    #[must_use]
    pub fn state(&self, id: EntityId) -> Option<BehaviorState> {
        self.arena.get(id).map(Animal::state)
    }

    /// Current health.
    #[must_use]
    pub fn health(&self, id: EntityId) -> Option<i32> {
        self.arena.get(id).map(|a| a.health().current())
    }

    /// Current position as reported by navigation.
    #[must_use]
    pub fn position(&self, id: EntityId) -> Option<Vec3> {
        self.arena.get(id).and_then(|_| self.env.position(id))
    }

    /// Event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Drains pending events.
    pub fn drain_events(&self) -> Vec<BehaviorEvent> {
        self.events.drain()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Spawns and initializes a prey animal.
    pub fn spawn_prey(&mut self, position: Vec3, animal: AnimalConfig, prey: PreyConfig) -> EntityId {
        self.spawn(position, animal, Role::Prey(PreyBrain::new(prey)))
    }

    /// Spawns and initializes a predator.
    pub fn spawn_predator(
        &mut self,
        position: Vec3,
        animal: AnimalConfig,
        predator: PredatorConfig,
    ) -> EntityId {
        self.spawn(position, animal, Role::Predator(PredatorBrain::new(predator)))
    }

    /// Spawns a prey animal from a species table.
    pub fn spawn_prey_species(&mut self, position: Vec3, species: &PreySpecies) -> EntityId {
        self.spawn_prey(position, species.animal.clone(), species.prey.clone())
    }

    /// Spawns a predator from a species table.
    pub fn spawn_predator_species(&mut self, position: Vec3, species: &PredatorSpecies) -> EntityId {
        self.spawn_predator(position, species.animal.clone(), species.predator.clone())
    }

    fn spawn(&mut self, position: Vec3, config: AnimalConfig, role: Role) -> EntityId {
        let kind = role.kind();
        let walk_speed = config.walk_speed;
        let id = self.arena.insert_with(|id| Animal::new(id, config, role));

        self.env.place_agent(id, kind, position);
        self.env.set_speed(id, walk_speed);
        info!("Spawned {} {} at {}", kind, id, position);
        self.events.publish(BehaviorEvent::Spawned { id, kind });

        self.update_state(id);
        id
    }

    /// Removes an animal on behalf of the host. Returns false if it was already gone.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        if !self.remove_animal(id) {
            return false;
        }
        info!("Despawned {}", id);
        self.events.publish(BehaviorEvent::Despawned { id });
        true
    }

    /// Kills an animal: cancels its tasks and removes it from the simulation.
    ///
    /// Returns false if it was already gone, so death happens at most once.
    pub fn die(&mut self, id: EntityId) -> bool {
        if !self.remove_animal(id) {
            return false;
        }
        info!("{} died", id);
        self.events.publish(BehaviorEvent::Died { id });
        true
    }

    fn remove_animal(&mut self, id: EntityId) -> bool {
        let Some(mut animal) = self.arena.remove(id) else {
            return false;
        };
        let cancelled = animal.cancel_all_tasks();
        if !cancelled.is_empty() {
            debug!("Cancelled {} task(s) of {}", cancelled.len(), id);
        }
        self.env.remove_agent(id);
        true
    }

    /// Applies damage. Returns false when the animal is already gone.
    pub fn receive_damage(&mut self, id: EntityId, amount: i32, source: Option<EntityId>) -> bool {
        let Some(animal) = self.arena.get_mut(id) else {
            trace!("Damage to {} ignored: not alive", id);
            return false;
        };
        let remaining = animal.health.damage(amount);
        debug!("{} took {} damage, {} left", id, amount, remaining);
        self.events.publish(BehaviorEvent::Damaged {
            id,
            amount,
            remaining,
            source,
        });

        if remaining <= 0 {
            self.die(id);
        }
        true
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Changes state. No-op if unchanged; otherwise cancels the current
    /// handler task, applies role speed and dispatches the new state.
    pub fn set_state(&mut self, id: EntityId, new_state: BehaviorState) {
        let Some(animal) = self.arena.get_mut(id) else {
            return;
        };
        let from = animal.state;
        if from == new_state {
            return;
        }
        animal.state = new_state;
        if let Some(cancelled) = animal.handler.take() {
            trace!("{}: cancelled {} {}", id, cancelled.task.label(), cancelled.id);
        }

        debug!("{}: {} -> {}", id, from, new_state);
        self.events.publish(BehaviorEvent::StateChanged {
            id,
            from,
            to: new_state,
        });

        self.on_state_changed(id);
        self.update_state(id);
    }

    /// Dispatches the handler for the current state.
    pub fn update_state(&mut self, id: EntityId) {
        match self.state(id) {
            Some(BehaviorState::Idle) => self.handle_idle_state(id),
            Some(BehaviorState::Moving) => self.handle_moving_state(id),
            Some(BehaviorState::Chase) => self.handle_chase_state(id),
            None => {},
        }
    }

    fn on_state_changed(&mut self, id: EntityId) {
        self.refresh_speed(id);
    }

    /// Sets navigation speed from state and role.
    ///
    /// Chase runs; a predator also runs while a pursuit is scheduled.
    pub(crate) fn refresh_speed(&mut self, id: EntityId) {
        let Some(animal) = self.arena.get(id) else {
            return;
        };
        let running = match animal.role() {
            Role::Prey(_) => animal.state() == BehaviorState::Chase,
            Role::Predator(brain) => {
                animal.state() == BehaviorState::Chase || brain.is_pursuing()
            },
        };
        let speed = if running {
            animal.config().run_speed
        } else {
            animal.config().walk_speed
        };
        self.env.set_speed(id, speed);
    }

    fn handle_idle_state(&mut self, id: EntityId) {
        let Some(config) = self.arena.get(id).map(|a| a.config().clone()) else {
            return;
        };
        let wake_at = self.now + f64::from(self.draw_idle_wait(&config));
        self.schedule_handler(id, StateTask::WaitToMove { wake_at });
    }

    fn handle_moving_state(&mut self, id: EntityId) {
        let started_at = self.now;
        self.schedule_handler(id, StateTask::WatchDestination { started_at });
    }

    /// Chase dispatch: predators alert and pursue, prey drop every pending task.
    pub fn handle_chase_state(&mut self, id: EntityId) {
        match self.arena.get(id).map(Animal::kind) {
            Some(AnimalKind::Predator) => self.predator_handle_chase(id),
            Some(AnimalKind::Prey) => self.cancel_all_tasks(id),
            None => {},
        }
    }

    /// Looks for something to chase. Only predators hunt.
    pub fn check_chase_conditions(&mut self, id: EntityId) {
        if let Some(AnimalKind::Predator) = self.arena.get(id).map(Animal::kind) {
            self.predator_check_chase(id);
        }
    }

    /// Idle wait drawn uniformly from `[idle_time / 2, idle_time * 2]`.
    pub fn draw_idle_wait(&mut self, config: &AnimalConfig) -> f32 {
        let min = config.min_idle_wait();
        let max = config.max_idle_wait();
        (min + self.rng.f32() * (max - min)).min(max)
    }

    // ------------------------------------------------------------------
    // Navigation sampling
    // ------------------------------------------------------------------

    /// Random navigable point within `radius` of `origin`, or `origin`
    /// itself after [`NAV_SAMPLE_ATTEMPTS`] failed samples.
    pub fn random_nav_position(&mut self, origin: Vec3, radius: f32) -> Vec3 {
        self.sample_nav_position(origin, radius).unwrap_or(origin)
    }

    fn sample_nav_position(&mut self, origin: Vec3, radius: f32) -> Option<Vec3> {
        (0..NAV_SAMPLE_ATTEMPTS).find_map(|_| {
            let candidate = origin + random_in_unit_sphere(&mut self.rng) * radius;
            self.env.sample_position(candidate, radius)
        })
    }

    /// Like [`Self::random_nav_position`], reporting fallbacks for `id`.
    pub(crate) fn random_nav_position_for(&mut self, id: EntityId, origin: Vec3, radius: f32) -> Vec3 {
        match self.sample_nav_position(origin, radius) {
            Some(point) => point,
            None => {
                warn!(
                    "{}: no navigable point within {} of {} after {} attempts",
                    id, radius, origin, NAV_SAMPLE_ATTEMPTS
                );
                self.events.publish(BehaviorEvent::NavigationFallback { id });
                origin
            },
        }
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    /// Allocates a handle for a task created now.
    pub(crate) fn schedule<T>(&mut self, task: T) -> Scheduled<T> {
        Scheduled {
            id: self.task_ids.allocate(),
            scheduled_tick: self.tick,
            task,
        }
    }

    fn schedule_handler(&mut self, id: EntityId, task: StateTask) {
        let scheduled = self.schedule(task);
        if let Some(animal) = self.arena.get_mut(id) {
            trace!("{}: scheduled {} {}", id, task.label(), scheduled.id);
            animal.handler = Some(scheduled);
        }
    }

    pub(crate) fn cancel_all_tasks(&mut self, id: EntityId) {
        if let Some(animal) = self.arena.get_mut(id) {
            let cancelled = animal.cancel_all_tasks();
            if !cancelled.is_empty() {
                debug!("{}: cancelled {} task(s)", id, cancelled.len());
            }
        }
    }

    fn handler_id(&self, id: EntityId) -> Option<TaskId> {
        self.arena.get(id).and_then(|a| a.handler.map(|h| h.id))
    }

    /// Advances the clock by `dt` seconds and steps every animal's tasks once.
    pub fn tick(&mut self, dt: f32) {
        self.tick += 1;
        self.now += f64::from(dt.max(0.0));

        for id in self.arena.ids() {
            self.step_handler(id);
            self.step_role_task(id);
        }
    }

    fn step_handler(&mut self, id: EntityId) {
        let Some(scheduled) = self.arena.get(id).and_then(|a| a.handler) else {
            return;
        };
        if !scheduled.is_due(self.tick) {
            return;
        }

        let step = match scheduled.task {
            StateTask::WaitToMove { wake_at } => self.step_wait_to_move(id, scheduled.id, wake_at),
            StateTask::WatchDestination { started_at } => {
                self.step_watch_destination(id, scheduled.id, started_at)
            },
        };

        if let Some(animal) = self.arena.get_mut(id) {
            if animal.handler.map(|h| h.id) == Some(scheduled.id) {
                animal.handler = match step {
                    Step::Yield(task) => Some(scheduled.with_task(task)),
                    Step::Done => None,
                };
            }
        }
    }

    fn step_role_task(&mut self, id: EntityId) {
        match self.arena.get(id).map(Animal::kind) {
            Some(AnimalKind::Prey) => self.step_flee(id),
            Some(AnimalKind::Predator) => self.step_pursuit(id),
            None => {},
        }
    }

    fn step_wait_to_move(&mut self, id: EntityId, task: TaskId, wake_at: f64) -> Step<StateTask> {
        if self.now < wake_at {
            return Step::Yield(StateTask::WaitToMove { wake_at });
        }
        let Some(config) = self.arena.get(id).map(|a| a.config().clone()) else {
            return Step::Done;
        };
        let Some(origin) = self.env.position(id) else {
            trace!("{}: no agent position, idling again", id);
            let wake_at = self.now + f64::from(self.draw_idle_wait(&config));
            return Step::Yield(StateTask::WaitToMove { wake_at });
        };

        let destination = self.random_nav_position_for(id, origin, config.wander_distance);
        self.env.set_destination(id, destination);
        trace!("{}: wandering to {} ({})", id, destination, task);
        self.set_state(id, BehaviorState::Moving);
        Step::Done
    }

    fn step_watch_destination(&mut self, id: EntityId, task: TaskId, started_at: f64) -> Step<StateTask> {
        let travelling = self.env.is_active_and_enabled(id) && self.env.is_travelling(id);
        if !travelling {
            self.set_state(id, BehaviorState::Idle);
            return Step::Done;
        }

        self.check_chase_conditions(id);
        if self.handler_id(id) != Some(task) {
            // Chase took over and replaced this handler
            return Step::Done;
        }

        let max_walk_time = self
            .arena
            .get(id)
            .map_or(0.0, |a| a.config().max_walk_time);
        // Inclusive so the walk ends no later than max_walk_time
        if self.now - started_at >= f64::from(max_walk_time) {
            debug!("{}: walk exceeded {}s, giving up", id, max_walk_time);
            self.env.reset_path(id);
            self.events.publish(BehaviorEvent::StuckTimeout { id });
            self.set_state(id, BehaviorState::Idle);
            return Step::Done;
        }

        Step::Yield(StateTask::WatchDestination { started_at })
    }
}
