//! # Wildlife AI
//!
//! Behavior core for wildlife simulations.
//!
//! This crate drives animals through a small state machine on top of a
//! host-provided navigation and proximity layer:
//! - Base states (Idle, Moving, Chase) with random wandering and a stuck guard
//! - Predators that detect, pursue and bite prey with a cooldown
//! - Prey that flee directly away from an alerting predator
//! - Generational entity handles, so dead animals can never be touched again
//! - TOML species configuration with validation
//! - Event bus for observing behavior from outside the core
//!
//! Everything runs on one thread; [`machine::Wildlife::tick`] advances time.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod entity;
pub mod events;
pub mod machine;
pub mod ports;
pub mod predator;
pub mod prey;
pub mod sim;
pub mod task;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::entity::*;
    pub use crate::events::*;
    pub use crate::machine::*;
    pub use crate::ports::{Environment, NavigationPort, SpatialQueryPort, DEFAULT_OVERLAP_LIMIT};
    pub use crate::predator::*;
    pub use crate::prey::*;
    pub use crate::sim::*;
    pub use crate::task::*;
    pub use wildlife_common::{AnimalKind, EntityId, Vec3, WildlifeError, WildlifeResult};
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_from_default_config() {
        let config = WildlifeConfig::default();
        assert!(config.validate().is_valid());

        let mut world = Wildlife::from_config(FlatWorld::new(100.0), &config);
        let deer = world.spawn_prey(Vec3::ZERO, AnimalConfig::default(), PreyConfig::default());
        let wolf = world.spawn_predator(
            Vec3::new(5.0, 0.0, 0.0),
            AnimalConfig::default(),
            PredatorConfig::default(),
        );

        assert_eq!(world.len(), 2);
        assert_eq!(world.animal(deer).map(Animal::kind), Some(AnimalKind::Prey));
        assert_eq!(world.animal(wolf).map(Animal::kind), Some(AnimalKind::Predator));
    }

    #[test]
    fn test_species_spawn() {
        let config = WildlifeConfig::from_toml_str(
            r#"
            seed = 5

            [prey.rabbit.animal]
            walk_speed = 3.0
            run_speed = 9.0

            [predators.fox.predator]
            bite_damage = 2
            "#,
        )
        .expect("valid config");

        let mut world = Wildlife::from_config(FlatWorld::new(100.0), &config);
        let rabbit = config.prey_species("rabbit").expect("rabbit");
        let fox = config.predator_species("fox").expect("fox");

        let r = world.spawn_prey_species(Vec3::ZERO, rabbit);
        let f = world.spawn_predator_species(Vec3::new(3.0, 0.0, 0.0), fox);

        assert_eq!(world.env().speed(r), 3.0);
        let bite = world
            .animal(f)
            .and_then(Animal::as_predator)
            .map(|b| b.config().bite_damage);
        assert_eq!(bite, Some(2));
    }

    #[test]
    fn test_ticking_empty_world() {
        let mut world = Wildlife::new(FlatWorld::new(10.0), 0);
        world.run_for(1.0, 0.25);
        assert_eq!(world.tick_count(), 4);
        assert!(world.is_empty());
    }
}
