//! Renormalized bases and their symmetry-sector structure.
//!
//! A [`Basis`] is a list of states, each labelled by an integer quantum number
//! (particle number, twice the total *S*<sup>*z*</sup>, ...), with states of
//! equal quantum number stored contiguously as *sectors*. Bases built as the
//! tensor product of two smaller bases additionally remember how each of their
//! states decomposes over the two factors, which is what a wave-function
//! transformation needs in order to move a site from one block to the other.
//!
//! Two kinds of bases are available:
//! - *abelian* bases, where every product state is a single pair of factor
//!   states;
//! - *SU(2)* bases, whose states are grouped into spin multiplets, and whose
//!   product states are coupled to definite total spin, so that each is a
//!   Clebsch-Gordan superposition of factor pairs.
//!
//! ```
//! use dmrg_wft::Basis;
//!
//! // one spinless-fermion site: empty and occupied
//! let site = Basis::new([0], [0, 1]).unwrap();
//! let pair = Basis::product(&site, &site).unwrap();
//! assert_eq!(pair.qns(), &[0, 1, 1, 2]);
//! assert_eq!(pair.n_sectors(), 3);
//! assert_eq!(pair.split(3), Some((1, 1)));
//! ```

use std::ops::Range;
use itertools::Itertools;
use rustc_hash::FxHashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BasisError {
    /// Returned when attempting to create a basis with no states.
    #[error("error in basis creation: a basis must contain at least one state")]
    EmptyBasis,

    /// Returned when attempting to take the product of an abelian basis with
    /// an SU(2) basis.
    #[error("error in basis product: cannot combine abelian and SU(2) bases")]
    MixedSymmetry,
}
use BasisError::*;
pub type BasisResult<T> = Result<T, BasisError>;

/// Spin labels of a state in an SU(2) basis.
///
/// Spins are stored doubled so that half-integer values remain integers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Su2Label {
    /// Index of the multiplet the state belongs to.
    pub multiplet: usize,
    /// Twice the total spin *j* of the multiplet.
    pub j2: u32,
    /// Twice the projection *m*.
    pub m2: i32,
}

/// Multiplet structure of an SU(2) basis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Su2Layout {
    // doubled spin of each multiplet
    pub(crate) spins: Vec<u32>,
    // (multiplet, 2m) -> state index
    pub(crate) states: FxHashMap<(usize, i32), usize>,
}

impl Su2Layout {
    /// Return twice the spin of multiplet `mult`.
    pub fn spin(&self, mult: usize) -> Option<u32> { self.spins.get(mult).copied() }

    /// Return the index of the state with projection `m2` in multiplet `mult`.
    pub fn state(&self, mult: usize, m2: i32) -> Option<usize> {
        self.states.get(&(mult, m2)).copied()
    }

    /// Number of multiplets.
    pub fn n_multiplets(&self) -> usize { self.spins.len() }
}

/// How the states of a product basis decompose over its two factors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Coupling {
    /// Every state is a single pair of factor states.
    Abelian {
        // state -> (left, right)
        split: Vec<(usize, usize)>,
        // left + right * left_size -> state
        index: Vec<usize>,
    },
    /// Every state is a Clebsch-Gordan superposition of pairs drawn from one
    /// left and one right multiplet.
    Su2 {
        // state -> (left multiplet, right multiplet)
        parents: Vec<(usize, usize)>,
        left: Su2Layout,
        right: Su2Layout,
    },
}

/// Factor structure of a product basis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Factors {
    pub(crate) left_size: usize,
    pub(crate) right_size: usize,
    pub(crate) coupling: Coupling,
}

impl Factors {
    /// Number of states in the left factor.
    pub fn left_size(&self) -> usize { self.left_size }

    /// Number of states in the right factor.
    pub fn right_size(&self) -> usize { self.right_size }

    pub fn coupling(&self) -> &Coupling { &self.coupling }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Su2Data {
    labels: Vec<Su2Label>,
    layout: Su2Layout,
}

/// A renormalized basis of a block of lattice sites.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Basis {
    block: Vec<usize>,
    qns: Vec<i64>,
    // sector boundaries; sector `i` is `partitions[i]..partitions[i + 1]`
    partitions: Vec<usize>,
    factors: Option<Factors>,
    su2: Option<Su2Data>,
}

fn partitions(qns: &[i64]) -> Vec<usize> {
    let mut parts: Vec<usize> = vec![0];
    parts.extend((1..qns.len()).filter(|k| qns[*k] != qns[*k - 1]));
    parts.push(qns.len());
    parts
}

fn su2_layout(labels: &[Su2Label], spins: Vec<u32>) -> Su2Layout {
    let states: FxHashMap<(usize, i32), usize>
        = labels.iter().enumerate()
        .map(|(k, l)| ((l.multiplet, l.m2), k))
        .collect();
    Su2Layout { spins, states }
}

impl Basis {
    /// Create an abelian basis over the sites in `block`, with one quantum
    /// number per state.
    ///
    /// Sectors are the maximal runs of equal consecutive quantum numbers.
    ///
    /// Fails if no states are given.
    pub fn new<I, J>(block: I, qns: J) -> BasisResult<Self>
    where
        I: IntoIterator<Item = usize>,
        J: IntoIterator<Item = i64>,
    {
        let qns: Vec<i64> = qns.into_iter().collect();
        if qns.is_empty() { return Err(EmptyBasis); }
        let partitions = partitions(&qns);
        Ok(Self {
            block: block.into_iter().collect(),
            qns,
            partitions,
            factors: None,
            su2: None,
        })
    }

    /// Form the abelian tensor product `left ⊗ right`.
    ///
    /// Product states are ordered by total quantum number, ties broken by
    /// left-fastest enumeration of the pairs.
    ///
    /// Fails if either factor is an SU(2) basis.
    pub fn product(left: &Self, right: &Self) -> BasisResult<Self> {
        if left.use_su2_symmetry() || right.use_su2_symmetry() {
            return Err(MixedSymmetry);
        }
        let nl = left.size();
        let split: Vec<(usize, usize)>
            = (0..right.size())
            .flat_map(|b| (0..nl).map(move |a| (a, b)))
            .sorted_by_key(|(a, b)| left.qns[*a] + right.qns[*b])
            .collect();
        let mut index: Vec<usize> = vec![0; split.len()];
        split.iter().enumerate()
            .for_each(|(k, (a, b))| { index[a + b * nl] = k; });
        let qns: Vec<i64>
            = split.iter()
            .map(|(a, b)| left.qns[*a] + right.qns[*b])
            .collect();
        let partitions = partitions(&qns);
        let block: Vec<usize>
            = left.block.iter().chain(right.block.iter()).copied().collect();
        let factors = Factors {
            left_size: nl,
            right_size: right.size(),
            coupling: Coupling::Abelian { split, index },
        };
        Ok(Self { block, qns, partitions, factors: Some(factors), su2: None })
    }

    /// Create an SU(2) basis over the sites in `block` from a list of
    /// multiplets, each given by twice its spin.
    ///
    /// Every multiplet of spin *j* contributes 2*j* + 1 states. States are
    /// ordered by their projection, which also serves as the abelian quantum
    /// number (twice *S*<sup>*z*</sup>).
    ///
    /// Fails if no multiplets are given.
    pub fn su2<I, J>(block: I, spins: J) -> BasisResult<Self>
    where
        I: IntoIterator<Item = usize>,
        J: IntoIterator<Item = u32>,
    {
        let spins: Vec<u32> = spins.into_iter().collect();
        if spins.is_empty() { return Err(EmptyBasis); }
        let labels: Vec<Su2Label>
            = spins.iter().enumerate()
            .flat_map(|(multiplet, j2)| {
                let j2 = *j2;
                (-(j2 as i32)..=j2 as i32).step_by(2)
                    .map(move |m2| Su2Label { multiplet, j2, m2 })
            })
            .sorted_by_key(|l| l.m2)
            .collect();
        Ok(Self::from_su2_labels(block.into_iter().collect(), labels, spins, None))
    }

    /// Form the SU(2) tensor product `left ⊗ right`, coupling every pair of
    /// multiplets to each total spin allowed by the triangle rule.
    ///
    /// Fails if either factor is an abelian basis.
    pub fn su2_product(left: &Self, right: &Self) -> BasisResult<Self> {
        let (Some(l), Some(r)) = (&left.su2, &right.su2)
            else { return Err(MixedSymmetry); };
        let mut spins: Vec<u32> = Vec::new();
        let mut states: Vec<(Su2Label, (usize, usize))> = Vec::new();
        for (mb, jb) in r.layout.spins.iter().enumerate() {
            for (ma, ja) in l.layout.spins.iter().enumerate() {
                for j2 in (ja.abs_diff(*jb)..=ja + jb).step_by(2) {
                    let multiplet = spins.len();
                    spins.push(j2);
                    (-(j2 as i32)..=j2 as i32).step_by(2)
                        .for_each(|m2| {
                            states.push(
                                (Su2Label { multiplet, j2, m2 }, (ma, mb)));
                        });
                }
            }
        }
        let (labels, parents): (Vec<Su2Label>, Vec<(usize, usize)>)
            = states.into_iter()
            .sorted_by_key(|(l, _)| l.m2)
            .unzip();
        let block: Vec<usize>
            = left.block.iter().chain(right.block.iter()).copied().collect();
        let factors = Factors {
            left_size: left.size(),
            right_size: right.size(),
            coupling: Coupling::Su2 {
                parents,
                left: l.layout.clone(),
                right: r.layout.clone(),
            },
        };
        Ok(Self::from_su2_labels(block, labels, spins, Some(factors)))
    }

    fn from_su2_labels(
        block: Vec<usize>,
        labels: Vec<Su2Label>,
        spins: Vec<u32>,
        factors: Option<Factors>,
    ) -> Self
    {
        let qns: Vec<i64> = labels.iter().map(|l| l.m2 as i64).collect();
        let partitions = partitions(&qns);
        let layout = su2_layout(&labels, spins);
        Self { block, qns, partitions, factors, su2: Some(Su2Data { labels, layout }) }
    }

    /// Return `true` if `self` carries SU(2) multiplet structure.
    pub fn use_su2_symmetry(&self) -> bool { self.su2.is_some() }

    /// Number of states.
    pub fn size(&self) -> usize { self.qns.len() }

    /// Lattice sites covered by the basis.
    pub fn block(&self) -> &[usize] { &self.block }

    /// Quantum number of state `k`.
    pub fn qn(&self, k: usize) -> Option<i64> { self.qns.get(k).copied() }

    /// Quantum numbers of all states.
    pub fn qns(&self) -> &[i64] { &self.qns }

    /// Sector boundaries.
    pub fn partitions(&self) -> &[usize] { &self.partitions }

    /// Number of sectors.
    pub fn n_sectors(&self) -> usize { self.partitions.len() - 1 }

    /// Range of states in sector `i`.
    pub fn sector(&self, i: usize) -> Option<Range<usize>> {
        (i < self.n_sectors())
            .then(|| self.partitions[i] .. self.partitions[i + 1])
    }

    /// Index of the first sector with quantum number `qn`.
    pub fn sector_of_qn(&self, qn: i64) -> Option<usize> {
        self.partitions.iter().take(self.n_sectors())
            .position(|p| self.qns[*p] == qn)
    }

    /// Factor structure, if `self` is a product basis.
    pub fn factors(&self) -> Option<&Factors> { self.factors.as_ref() }

    /// Spin labels of state `k`, if `self` is an SU(2) basis.
    pub fn su2_label(&self, k: usize) -> Option<&Su2Label> {
        self.su2.as_ref().and_then(|s| s.labels.get(k))
    }

    /// Multiplet structure, if `self` is an SU(2) basis.
    pub fn su2_layout(&self) -> Option<&Su2Layout> {
        self.su2.as_ref().map(|s| &s.layout)
    }

    /// Decompose state `k` of an abelian product basis into its pair of factor
    /// states.
    pub fn split(&self, k: usize) -> Option<(usize, usize)> {
        match self.factors.as_ref().map(|f| &f.coupling) {
            Some(Coupling::Abelian { split, .. }) => split.get(k).copied(),
            _ => None,
        }
    }

    /// Return the state of an abelian product basis formed from the factor
    /// states `left` and `right`.
    pub fn index(&self, left: usize, right: usize) -> Option<usize> {
        let factors = self.factors.as_ref()?;
        if left >= factors.left_size || right >= factors.right_size {
            return None;
        }
        match &factors.coupling {
            Coupling::Abelian { index, .. } => {
                index.get(left + right * factors.left_size).copied()
            },
            Coupling::Su2 { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sectors_are_runs() {
        let b = Basis::new([0], [0, 0, 1, 2, 2, 2]).unwrap();
        assert_eq!(b.partitions(), &[0, 2, 3, 6]);
        assert_eq!(b.sector(2), Some(3..6));
        assert_eq!(b.sector(3), None);
        assert_eq!(b.sector_of_qn(1), Some(1));
        assert_eq!(b.sector_of_qn(5), None);
        assert_eq!(Basis::new([0], Vec::<i64>::new()).unwrap_err(), EmptyBasis);
    }

    #[test]
    fn abelian_product_is_sorted_and_invertible() {
        let left = Basis::new([0, 1], [0, 1, 1, 2]).unwrap();
        let site = Basis::new([2], [0, 1]).unwrap();
        let prod = Basis::product(&left, &site).unwrap();
        assert_eq!(prod.size(), 8);
        assert_eq!(prod.block(), &[0, 1, 2]);
        assert!(prod.qns().windows(2).all(|w| w[0] <= w[1]));
        for k in 0..prod.size() {
            let (a, b) = prod.split(k).unwrap();
            assert_eq!(prod.index(a, b), Some(k));
            assert_eq!(prod.qn(k), Some(left.qns()[a] + site.qns()[b]));
        }
        assert_eq!(prod.index(4, 0), None);
        let f = prod.factors().unwrap();
        assert_eq!((f.left_size(), f.right_size()), (4, 2));
    }

    #[test]
    fn su2_product_multiplets() {
        // two spin-1/2 sites couple to a singlet and a triplet
        let site = Basis::su2([0], [1]).unwrap();
        let site2 = Basis::su2([1], [1]).unwrap();
        assert_eq!(site.qns(), &[-1, 1]);
        let prod = Basis::su2_product(&site, &site2).unwrap();
        assert_eq!(prod.size(), 4);
        assert_eq!(prod.qns(), &[-2, 0, 0, 2]);
        let layout = prod.su2_layout().unwrap();
        assert_eq!(layout.n_multiplets(), 2);
        assert_eq!(layout.spin(0), Some(0));
        assert_eq!(layout.spin(1), Some(2));
        assert_eq!(prod.su2_label(0).unwrap().j2, 2);
        assert!(prod.use_su2_symmetry());
        assert_eq!(prod.split(0), None);
    }

    #[test]
    fn mixed_products_fail() {
        let a = Basis::new([0], [0, 1]).unwrap();
        let s = Basis::su2([1], [1]).unwrap();
        assert_eq!(Basis::product(&a, &s).unwrap_err(), MixedSymmetry);
        assert_eq!(Basis::su2_product(&a, &s).unwrap_err(), MixedSymmetry);
    }
}
