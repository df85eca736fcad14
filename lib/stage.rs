//! Sweep stages and the state machine gating transformations.

use std::fmt;
use crate::stack::Side;

/// Stage of the DMRG run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Infinite-lattice algorithm: both blocks are still growing.
    Infinite,
    /// Finite sweep moving the boundary so that the system block grows.
    ExpandSystem,
    /// Finite sweep moving the boundary so that the environment block grows.
    ExpandEnviron,
}

impl Stage {
    /// Return `true` if a wave-function transformation is meaningful in this
    /// stage.
    pub fn allows_transform(&self) -> bool {
        match self {
            Self::Infinite => false,
            Self::ExpandSystem => true,
            Self::ExpandEnviron => true,
        }
    }

    /// Return the growth direction of a finite-sweep stage.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Self::Infinite => None,
            Self::ExpandSystem => Some(Direction::ExpandSystem),
            Self::ExpandEnviron => Some(Direction::ExpandEnviron),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infinite => write!(f, "INFINITE"),
            Self::ExpandSystem => write!(f, "EXPAND_SYSTEM"),
            Self::ExpandEnviron => write!(f, "EXPAND_ENVIRON"),
        }
    }
}

/// Which block a truncation transform belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    ExpandSystem,
    ExpandEnviron,
}

impl Direction {
    /// Return the side of the lattice grown in this direction.
    pub fn side(&self) -> Side {
        match self {
            Self::ExpandSystem => Side::System,
            Self::ExpandEnviron => Side::Environ,
        }
    }

    /// Return the finite-sweep stage corresponding to this direction.
    pub fn stage(&self) -> Stage {
        match self {
            Self::ExpandSystem => Stage::ExpandSystem,
            Self::ExpandEnviron => Stage::ExpandEnviron,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stage())
    }
}

/// Whether a stage change resets the step counter.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CounterPolicy {
    #[default]
    ResetCounter,
    DoNotResetCounter,
}

/// Sweep stage, step counter, and first-call flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WftStateMachine {
    stage: Stage,
    previous: Stage,
    counter: usize,
    first_call: bool,
}

impl Default for WftStateMachine {
    fn default() -> Self { Self::new() }
}

impl WftStateMachine {
    /// Create a new state machine in the `Infinite` stage.
    pub fn new() -> Self {
        Self {
            stage: Stage::Infinite,
            previous: Stage::Infinite,
            counter: 0,
            first_call: true,
        }
    }

    /// Set the current stage, resetting the step counter unless `policy` says
    /// otherwise.
    pub fn set_stage(&mut self, stage: Stage, policy: CounterPolicy) {
        if stage != self.stage { self.previous = self.stage; }
        self.stage = stage;
        if policy == CounterPolicy::ResetCounter { self.counter = 0; }
    }

    /// Return `true` if transformation is permitted in `stage`.
    pub fn allow(stage: Stage) -> bool { stage.allows_transform() }

    /// Return `true` if transformation is permitted in the current stage.
    pub fn allows_current(&self) -> bool { Self::allow(self.stage) }

    pub fn stage(&self) -> Stage { self.stage }

    pub fn counter(&self) -> usize { self.counter }

    pub fn is_first_call(&self) -> bool { self.first_call }

    /// Return `true` on the first step of a finite sweep that reverses the
    /// direction of the one before it, i.e. when the boundary bounces off an
    /// end of the lattice.
    pub fn is_turn(&self) -> bool {
        self.counter == 0
            && self.stage.direction().is_some()
            && self.previous.direction().is_some()
            && self.previous != self.stage
    }

    /// Record a completed transformation step.
    pub(crate) fn advance(&mut self) {
        self.first_call = false;
        self.counter += 1;
    }
}
