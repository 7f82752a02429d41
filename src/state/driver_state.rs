/// Lifecycle states of the crawl driver
use std::fmt;

/// Represents where the crawl driver is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverState {
    /// Popping titles from the frontier and fetching them
    Running,

    /// Cancellation observed; finishing up and writing the final checkpoint
    Stopping,

    /// Frontier exhausted or final checkpoint written
    Stopped,
}

impl DriverState {
    /// Returns true if the driver has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns true if the driver may still pop titles from the frontier
    pub fn accepts_work(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    ///
    /// `Running -> Running` is the per-iteration self loop; `Stopped` has
    /// no outgoing transitions.
    pub fn can_transition_to(&self, next: DriverState) -> bool {
        matches!(
            (self, next),
            (Self::Running, Self::Running)
                | (Self::Running, Self::Stopping)
                | (Self::Running, Self::Stopped)
                | (Self::Stopping, Self::Stopped)
        )
    }

    /// Short lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
