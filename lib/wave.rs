//! Truncation transforms and the currently active transformation data.

use std::{ fmt, ops::Deref, sync::Arc };
use ndarray as nd;
use crate::{ basis::Basis, stack::Side };

/// A change-of-basis matrix produced by a truncation step.
///
/// Rows index the new (truncated) basis and columns index the old
/// (untruncated) one. The matrix is immutable once built; clones share the
/// same data.
#[derive(Debug, PartialEq)]
pub struct TransformMatrix<A>(Arc<nd::Array2<A>>);

impl<A> Clone for TransformMatrix<A> {
    fn clone(&self) -> Self { Self(Arc::clone(&self.0)) }
}

impl<A> TransformMatrix<A> {
    /// Wrap a matrix.
    pub fn new(data: nd::Array2<A>) -> Self { Self(Arc::new(data)) }

    /// Number of states kept by the truncation.
    pub fn n_new(&self) -> usize { self.0.nrows() }

    /// Number of states in the untruncated basis.
    pub fn n_old(&self) -> usize { self.0.ncols() }

    /// Return `true` if `self` and `other` share the same underlying data.
    pub fn ptr_eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.0, &other.0) }
}

impl<A> From<nd::Array2<A>> for TransformMatrix<A> {
    fn from(data: nd::Array2<A>) -> Self { Self::new(data) }
}

impl<A> Deref for TransformMatrix<A> {
    type Target = nd::Array2<A>;

    fn deref(&self) -> &Self::Target { &self.0 }
}

/// The active pair of transforms together with the bases needed to interpret
/// the state vector they act on.
///
/// `s_prime` is the system block plus one site, `e_prime` the environment
/// block plus one site, and `super_block` their combination. Outside of a
/// transformation step these describe the basis of the most recently computed
/// target state.
#[derive(Clone, Debug)]
pub struct WaveStruct<A> {
    pub ws: Option<TransformMatrix<A>>,
    pub we: Option<TransformMatrix<A>>,
    pub s_prime: Option<Arc<Basis>>,
    pub e_prime: Option<Arc<Basis>>,
    pub super_block: Option<Arc<Basis>>,
}

impl<A> Default for WaveStruct<A> {
    fn default() -> Self {
        Self { ws: None, we: None, s_prime: None, e_prime: None, super_block: None }
    }
}

impl<A> WaveStruct<A> {
    /// Install `matrix` as the active transform of `side`.
    pub fn install(&mut self, side: Side, matrix: TransformMatrix<A>) {
        match side {
            Side::System => { self.ws = Some(matrix); },
            Side::Environ => { self.we = Some(matrix); },
        }
    }

    /// Return the active transform of `side`, if any.
    pub fn transform(&self, side: Side) -> Option<&TransformMatrix<A>> {
        match side {
            Side::System => self.ws.as_ref(),
            Side::Environ => self.we.as_ref(),
        }
    }

    /// Return the recorded basis of the block on `side` plus one site.
    pub fn primed(&self, side: Side) -> Option<&Arc<Basis>> {
        match side {
            Side::System => self.s_prime.as_ref(),
            Side::Environ => self.e_prime.as_ref(),
        }
    }

    pub(crate) fn set_bases(
        &mut self,
        s_prime: &Arc<Basis>,
        e_prime: &Arc<Basis>,
        super_block: &Arc<Basis>,
    ) {
        self.s_prime = Some(Arc::clone(s_prime));
        self.e_prime = Some(Arc::clone(e_prime));
        self.super_block = Some(Arc::clone(super_block));
    }
}

fn shape<A>(m: &Option<TransformMatrix<A>>) -> String {
    m.as_ref()
        .map(|m| format!("{}x{}", m.n_new(), m.n_old()))
        .unwrap_or_else(|| "none".to_string())
}

fn size(b: &Option<Arc<Basis>>) -> String {
    b.as_ref()
        .map(|b| format!("{} (block {:?})", b.size(), b.block()))
        .unwrap_or_else(|| "none".to_string())
}

impl<A> fmt::Display for WaveStruct<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ws={}", shape(&self.ws))?;
        writeln!(f, "we={}", shape(&self.we))?;
        writeln!(f, "pSprime={}", size(&self.s_prime))?;
        writeln!(f, "pEprime={}", size(&self.e_prime))?;
        write!(f, "pSE={}", size(&self.super_block))
    }
}
