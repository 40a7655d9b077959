//! Animals and their generational arena.

use serde::{Deserialize, Serialize};
use std::fmt;
use wildlife_common::{AnimalKind, EntityId};

use crate::config::{AnimalConfig, PredatorConfig, PreyConfig};
use crate::predator::PursuitTask;
use crate::prey::FleeTask;
use crate::task::{Scheduled, StateTask, TaskId};

/// Behavior state of an animal. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BehaviorState {
    /// Waiting before the next wander
    #[default]
    Idle,
    /// Walking to a destination
    Moving,
    /// Chase trigger: pursuit for predators, flight for prey
    Chase,
}

impl fmt::Display for BehaviorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Moving => "Moving",
            Self::Chase => "Chase",
        };
        f.write_str(name)
    }
}

/// Health of an animal.
///
/// Damage is not clamped, so an overkill bite leaves a negative value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    current: i32,
    max: i32,
}

impl Health {
    /// Creates full health.
    #[must_use]
    pub const fn new(max: i32) -> Self {
        Self { current: max, max }
    }

    /// Returns current health.
    #[must_use]
    pub const fn current(&self) -> i32 {
        self.current
    }

    /// Returns maximum health.
    #[must_use]
    pub const fn max(&self) -> i32 {
        self.max
    }

    /// Applies damage and returns the remaining health.
    pub fn damage(&mut self, amount: i32) -> i32 {
        self.current = self.current.saturating_sub(amount);
        self.current
    }

    /// Checks if dead.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current <= 0
    }
}

/// Prey-specific state.
#[derive(Debug, Clone)]
pub struct PreyBrain {
    pub(crate) config: PreyConfig,
    pub(crate) threat: Option<EntityId>,
    pub(crate) flee: Option<Scheduled<FleeTask>>,
}

impl PreyBrain {
    pub(crate) fn new(config: PreyConfig) -> Self {
        Self {
            config,
            threat: None,
            flee: None,
        }
    }

    /// Prey tunables.
    #[must_use]
    pub fn config(&self) -> &PreyConfig {
        &self.config
    }

    /// Predator that last alerted this prey, if still tracked.
    #[must_use]
    pub fn threat(&self) -> Option<EntityId> {
        self.threat
    }

    /// Whether a flee task is scheduled.
    #[must_use]
    pub fn is_fleeing(&self) -> bool {
        self.flee.is_some()
    }
}

/// Predator-specific state.
#[derive(Debug, Clone)]
pub struct PredatorBrain {
    pub(crate) config: PredatorConfig,
    pub(crate) target: Option<EntityId>,
    pub(crate) pursuit: Option<Scheduled<PursuitTask>>,
}

impl PredatorBrain {
    pub(crate) fn new(config: PredatorConfig) -> Self {
        Self {
            config,
            target: None,
            pursuit: None,
        }
    }

    /// Predator tunables.
    #[must_use]
    pub fn config(&self) -> &PredatorConfig {
        &self.config
    }

    /// Locked chase target.
    #[must_use]
    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    /// Whether a pursuit task is scheduled.
    #[must_use]
    pub fn is_pursuing(&self) -> bool {
        self.pursuit.is_some()
    }
}

/// Role block of an animal.
#[derive(Debug, Clone)]
pub enum Role {
    /// Runs from predators
    Prey(PreyBrain),
    /// Hunts prey
    Predator(PredatorBrain),
}

impl Role {
    /// Kind tag of this role.
    #[must_use]
    pub const fn kind(&self) -> AnimalKind {
        match self {
            Self::Prey(_) => AnimalKind::Prey,
            Self::Predator(_) => AnimalKind::Predator,
        }
    }

    /// Handle of the role task currently scheduled, if any.
    #[must_use]
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::Prey(brain) => brain.flee.map(|t| t.id),
            Self::Predator(brain) => brain.pursuit.map(|t| t.id),
        }
    }

    /// Drops the role task.
    pub(crate) fn cancel_task(&mut self) -> Option<TaskId> {
        match self {
            Self::Prey(brain) => brain.flee.take().map(|t| t.id),
            Self::Predator(brain) => brain.pursuit.take().map(|t| t.id),
        }
    }
}

/// One simulated animal.
#[derive(Debug, Clone)]
pub struct Animal {
    id: EntityId,
    pub(crate) state: BehaviorState,
    pub(crate) health: Health,
    pub(crate) config: AnimalConfig,
    pub(crate) role: Role,
    pub(crate) handler: Option<Scheduled<StateTask>>,
}

impl Animal {
    pub(crate) fn new(id: EntityId, config: AnimalConfig, role: Role) -> Self {
        Self {
            id,
            state: BehaviorState::Idle,
            health: Health::new(config.health),
            config,
            role,
            handler: None,
        }
    }

    /// Returns the animal's handle.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the kind tag.
    #[must_use]
    pub const fn kind(&self) -> AnimalKind {
        self.role.kind()
    }

    /// Returns the current behavior state.
    #[must_use]
    pub const fn state(&self) -> BehaviorState {
        self.state
    }

    /// Returns health.
    #[must_use]
    pub const fn health(&self) -> Health {
        self.health
    }

    /// Returns the shared tunables.
    #[must_use]
    pub fn config(&self) -> &AnimalConfig {
        &self.config
    }

    /// Returns the role block.
    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Prey block, if this is prey.
    #[must_use]
    pub fn as_prey(&self) -> Option<&PreyBrain> {
        match &self.role {
            Role::Prey(brain) => Some(brain),
            Role::Predator(_) => None,
        }
    }

    /// Predator block, if this is a predator.
    #[must_use]
    pub fn as_predator(&self) -> Option<&PredatorBrain> {
        match &self.role {
            Role::Predator(brain) => Some(brain),
            Role::Prey(_) => None,
        }
    }

    pub(crate) fn prey_mut(&mut self) -> Option<&mut PreyBrain> {
        match &mut self.role {
            Role::Prey(brain) => Some(brain),
            Role::Predator(_) => None,
        }
    }

    pub(crate) fn predator_mut(&mut self) -> Option<&mut PredatorBrain> {
        match &mut self.role {
            Role::Predator(brain) => Some(brain),
            Role::Prey(_) => None,
        }
    }

    /// The state handler task currently scheduled.
    #[must_use]
    pub fn handler(&self) -> Option<&Scheduled<StateTask>> {
        self.handler.as_ref()
    }

    /// Drops every scheduled task and returns their handles.
    pub(crate) fn cancel_all_tasks(&mut self) -> Vec<TaskId> {
        self.handler
            .take()
            .map(|t| t.id)
            .into_iter()
            .chain(self.role.cancel_task())
            .collect()
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    animal: Option<Animal>,
}

/// Generational arena of animals.
///
/// Removing an animal bumps its slot generation, so handles to it stop
/// resolving. Freed slots are reused through a free list.
#[derive(Debug, Default)]
pub struct AnimalArena {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    len: usize,
}

impl AnimalArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an arena with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Returns the number of live animals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no animal is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of slots, free ones included.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Inserts an animal built for the handle it is about to receive.
    pub fn insert_with(&mut self, build: impl FnOnce(EntityId) -> Animal) -> EntityId {
        let index = match self.free_list.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            },
        };

        let slot = &mut self.slots[index as usize];
        let id = EntityId::new(index, slot.generation);
        slot.animal = Some(build(id));
        self.len += 1;
        id
    }

    /// Removes an animal, invalidating every handle to it.
    pub fn remove(&mut self, id: EntityId) -> Option<Animal> {
        let slot = self.slot_mut(id)?;
        let animal = slot.animal.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index());
        self.len -= 1;
        Some(animal)
    }

    /// Gets an animal by handle.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Animal> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.animal.as_ref())
    }

    /// Gets a mutable animal by handle.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Animal> {
        self.slot_mut(id).and_then(|slot| slot.animal.as_mut())
    }

    /// Checks if a handle resolves.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// Returns an iterator over live animals in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Animal> {
        self.slots.iter().filter_map(|slot| slot.animal.as_ref())
    }

    /// Returns live animals of one kind.
    pub fn iter_by_kind(&self, kind: AnimalKind) -> impl Iterator<Item = &Animal> {
        self.iter().filter(move |a| a.kind() == kind)
    }

    /// Snapshot of live handles in slot order.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.iter().map(Animal::id).collect()
    }

    fn slot_mut(&mut self, id: EntityId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
    }
}
