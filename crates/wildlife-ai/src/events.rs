//! Event bus for observing behavior from outside the core.

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use wildlife_common::{AnimalKind, EntityId};

use crate::config::DEFAULT_EVENT_CAPACITY;
use crate::entity::BehaviorState;

/// Why a predator stopped pursuing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PursuitEnd {
    /// Target was removed from the simulation
    TargetLost,
    /// `max_chase_time` elapsed
    Timeout,
    /// Target got farther than the detection range
    OutOfRange,
    /// Bite landed and the cooldown finished
    Completed,
}

/// Events published by the behavior core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BehaviorEvent {
    /// Animal entered the simulation
    Spawned {
        /// Animal
        id: EntityId,
        /// Kind tag
        kind: AnimalKind,
    },
    /// Behavior state changed
    StateChanged {
        /// Animal
        id: EntityId,
        /// Previous state
        from: BehaviorState,
        /// New state
        to: BehaviorState,
    },
    /// Predator locked onto a prey
    ChaseStarted {
        /// Hunter
        predator: EntityId,
        /// Hunted
        prey: EntityId,
    },
    /// Prey accepted an alert and began fleeing
    PreyAlerted {
        /// Alerted prey
        prey: EntityId,
        /// Alerting predator
        predator: EntityId,
    },
    /// Animal took damage
    Damaged {
        /// Animal hit
        id: EntityId,
        /// Damage amount
        amount: i32,
        /// Health after the hit
        remaining: i32,
        /// Source animal (if any)
        source: Option<EntityId>,
    },
    /// Pursuit task ended
    PursuitEnded {
        /// Hunter
        predator: EntityId,
        /// Why it ended
        reason: PursuitEnd,
    },
    /// Prey stopped fleeing and went back to idle
    FleeEnded {
        /// Prey
        prey: EntityId,
    },
    /// Walk exceeded `max_walk_time`
    StuckTimeout {
        /// Animal
        id: EntityId,
    },
    /// Random destination sampling failed and fell back to the origin
    NavigationFallback {
        /// Animal
        id: EntityId,
    },
    /// Animal died
    Died {
        /// Animal
        id: EntityId,
    },
    /// Animal removed by the host
    Despawned {
        /// Animal
        id: EntityId,
    },
}

/// Bounded event bus; publishing never blocks.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for broadcasting events
    sender: Sender<BehaviorEvent>,
    /// Receiver for collecting events
    receiver: Receiver<BehaviorEvent>,
    /// Channel capacity
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            capacity: capacity.max(1),
        }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: BehaviorEvent) {
        // Non-blocking send - if full, event is dropped
        let _ = self.sender.try_send(event);
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<BehaviorEvent> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a receiver handle for consuming events elsewhere.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<BehaviorEvent> {
        self.receiver.clone()
    }
}
