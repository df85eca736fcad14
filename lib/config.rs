//! Run-time configuration of the wave-function transformation.

use crate::basis::Basis;

/// Symmetry used to decompose product states, fixed for a whole run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Symmetry {
    /// Abelian quantum numbers only.
    #[default]
    Local,
    /// SU(2) multiplets coupled with Clebsch-Gordan coefficients.
    Su2,
}

impl Symmetry {
    /// Select the symmetry matching the structure of `basis`.
    pub fn of(basis: &Basis) -> Self {
        if basis.use_su2_symmetry() { Self::Su2 } else { Self::Local }
    }
}

/// Top-level configuration of a [`WftController`][crate::wft::WftController].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WftConfig {
    /// Whether transformations are performed at all. When `false`, every
    /// request for a transformed vector produces a random one instead.
    pub enabled: bool,
    /// Symmetry of the bases in the run.
    pub symmetry: Symmetry,
    /// Smallest norm a source vector may have to be transformed.
    pub norm_threshold: f64,
}

impl Default for WftConfig {
    fn default() -> Self {
        Self { enabled: true, symmetry: Symmetry::Local, norm_threshold: 1e-6 }
    }
}

impl WftConfig {
    /// Default configuration with the symmetry taken from `basis`.
    pub fn for_basis(basis: &Basis) -> Self {
        Self { symmetry: Symmetry::of(basis), ..Self::default() }
    }
}
