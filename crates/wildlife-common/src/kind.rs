//! Animal kind tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role an animal plays in the food chain.
///
/// Also used as the filter for proximity queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimalKind {
    /// Flees from predators when alerted
    Prey,
    /// Scans for prey, pursues and bites it
    Predator,
}

impl AnimalKind {
    /// Get display name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Prey => "Prey",
            Self::Predator => "Predator",
        }
    }

    /// Returns whether this kind looks for something to chase.
    #[must_use]
    pub const fn hunts(self) -> bool {
        matches!(self, Self::Predator)
    }

    /// Returns whether this kind runs away when alerted.
    #[must_use]
    pub const fn flees(self) -> bool {
        matches!(self, Self::Prey)
    }
}

impl fmt::Display for AnimalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
