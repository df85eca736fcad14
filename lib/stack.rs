//! History of truncation transforms recorded while the lattice grows.
//!
//! Transforms pushed during growth are consumed in reverse order when a finite
//! sweep walks back over the same blocks, so each side of the lattice keeps
//! its own last-in-first-out stack.

use std::fmt;
use thiserror::Error;
use crate::wave::{ TransformMatrix, WaveStruct };

/// One of the two blocks of the superblock.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    System,
    Environ,
}

impl Side {
    /// Return the other side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::System => Self::Environ,
            Self::Environ => Self::System,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Environ => write!(f, "environ"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StackError {
    /// Returned when popping from an empty stack, i.e. the sweep has walked
    /// back over more blocks than were recorded while growing.
    #[error("{0} stack is empty")]
    StackUnderflow(Side),

    /// Returned when the first transformation of a sweep direction finds no
    /// recorded history for the opposite side.
    #[error("{0} stack is empty: no history to seed the first transformation")]
    EmptyHistory(Side),
}
use StackError::*;
pub type StackResult<T> = Result<T, StackError>;

/// A pair of LIFO stacks of truncation transforms, one per side.
#[derive(Clone, Debug)]
pub struct TransformStackPair<A> {
    ws_stack: Vec<TransformMatrix<A>>,
    we_stack: Vec<TransformMatrix<A>>,
}

impl<A> Default for TransformStackPair<A> {
    fn default() -> Self { Self::new() }
}

impl<A> TransformStackPair<A> {
    /// Create a new pair of empty stacks.
    pub fn new() -> Self {
        Self { ws_stack: Vec::new(), we_stack: Vec::new() }
    }

    fn stack(&self, side: Side) -> &Vec<TransformMatrix<A>> {
        match side {
            Side::System => &self.ws_stack,
            Side::Environ => &self.we_stack,
        }
    }

    fn stack_mut(&mut self, side: Side) -> &mut Vec<TransformMatrix<A>> {
        match side {
            Side::System => &mut self.ws_stack,
            Side::Environ => &mut self.we_stack,
        }
    }

    /// Record `matrix` on the stack of `side` and install it as the active
    /// transform of that side in `wave`.
    pub fn push(
        &mut self,
        side: Side,
        matrix: TransformMatrix<A>,
        wave: &mut WaveStruct<A>,
    ) {
        wave.install(side, matrix.clone());
        self.stack_mut(side).push(matrix);
    }

    /// Remove and return the top of the stack of `side`.
    ///
    /// Fails if the stack is empty.
    pub fn pop(&mut self, side: Side) -> StackResult<TransformMatrix<A>> {
        self.stack_mut(side).pop().ok_or(StackUnderflow(side))
    }

    /// Return the top of the stack of `side` without removing it.
    pub fn peek(&self, side: Side) -> Option<&TransformMatrix<A>> {
        self.stack(side).last()
    }

    /// Return the number of transforms recorded for `side`.
    pub fn depth(&self, side: Side) -> usize { self.stack(side).len() }

    /// Return `true` if no transforms are recorded for `side`.
    pub fn is_empty(&self, side: Side) -> bool { self.stack(side).is_empty() }

    /// Retrieve the transform for `side` needed by the first transformation of
    /// a new sweep direction.
    ///
    /// The top of the stack is removed; if more history remains underneath,
    /// the new top (left in place) is returned instead, since it describes the
    /// block one site shorter. Fails if the stack is empty.
    pub fn pop_seed(&mut self, side: Side) -> StackResult<TransformMatrix<A>> {
        if self.is_empty(side) { return Err(EmptyHistory(side)); }
        let top = self.pop(side)?;
        Ok(self.peek(side).cloned().unwrap_or(top))
    }
}
