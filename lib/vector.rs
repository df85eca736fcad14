//! State vectors populated on a subset of symmetry sectors.

use std::ops::{ Index, IndexMut, Range };
use ndarray as nd;
use thiserror::Error;
use crate::{ ComplexFloatExt, basis::Basis };

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VectorError {
    /// Returned when a sector extends past the end of the vector.
    #[error("error in vector creation: sector {0:?} out of bounds for length {1}")]
    SectorOutOfBounds(Range<usize>, usize),

    /// Returned when two sectors share an index.
    #[error("error in vector creation: sectors {0:?} and {1:?} overlap")]
    OverlappingSectors(Range<usize>, Range<usize>),

    /// Returned when a sector id does not exist in the basis.
    #[error("error in vector creation: basis has no sector {0}")]
    UnknownSector(usize),

    /// Returned when a basis has no sector with a given quantum number.
    #[error("error in vector creation: basis has no sector with quantum number {0}")]
    UnknownQuantumNumber(i64),

    /// Returned when a vector has no populated entries to fill.
    #[error("error in vector fill: no populated sectors")]
    Unpopulated,
}
use VectorError::*;
pub type VectorResult<T> = Result<T, VectorError>;

/// A state vector over a (superblock) basis that is only populated on a set of
/// sectors.
///
/// Entries outside the populated sectors are held at zero and are neither read
/// nor written by transformations.
#[derive(Clone, Debug, PartialEq)]
pub struct SectorVector<A> {
    data: nd::Array1<A>,
    // sorted by start, non-overlapping
    sectors: Vec<Range<usize>>,
}

impl<A> SectorVector<A>
where A: ComplexFloatExt
{
    /// Create a zero vector of length `len` populated on `sectors`.
    ///
    /// Empty sectors are dropped. Fails if a sector is out of bounds or two
    /// sectors overlap.
    pub fn zeros<I>(len: usize, sectors: I) -> VectorResult<Self>
    where I: IntoIterator<Item = Range<usize>>
    {
        let mut sectors: Vec<Range<usize>>
            = sectors.into_iter()
            .filter(|r| !r.is_empty())
            .collect();
        sectors.sort_by_key(|r| r.start);
        if let Some(r) = sectors.iter().find(|r| r.end > len) {
            return Err(SectorOutOfBounds(r.clone(), len));
        }
        if let Some(w) = sectors.windows(2).find(|w| w[0].end > w[1].start) {
            return Err(OverlappingSectors(w[0].clone(), w[1].clone()));
        }
        Ok(Self { data: nd::Array1::zeros(len), sectors })
    }

    /// Create a zero vector over `basis` populated on the sectors with the
    /// given ids.
    pub fn from_basis<I>(basis: &Basis, ids: I) -> VectorResult<Self>
    where I: IntoIterator<Item = usize>
    {
        let sectors: Vec<Range<usize>>
            = ids.into_iter()
            .map(|i| basis.sector(i).ok_or(UnknownSector(i)))
            .collect::<VectorResult<_>>()?;
        Self::zeros(basis.size(), sectors)
    }

    /// Create a zero vector of length `len` with a single sector covering all
    /// entries.
    pub fn full(len: usize) -> Self {
        Self { data: nd::Array1::zeros(len), sectors: vec![0 .. len] }
    }

    /// Wrap an existing array as a single-sector vector.
    pub fn from_array(data: nd::Array1<A>) -> Self {
        let len = data.len();
        Self { data, sectors: vec![0 .. len] }
    }

    /// Return the Euclidean norm over all entries.
    pub fn norm(&self) -> f64 {
        self.data.iter()
            .map(|a| a.norm_sqr_f64())
            .sum::<f64>()
            .sqrt()
    }

    /// Set all entries to zero, keeping the sector layout.
    pub fn clear(&mut self) { self.data.fill(A::zero()); }

    pub(crate) fn data_mut(&mut self) -> &mut nd::Array1<A> { &mut self.data }
}

impl<A> SectorVector<A> {
    /// Total length, including unpopulated entries.
    pub fn len(&self) -> usize { self.data.len() }

    /// Return `true` if the vector has length zero.
    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    /// Populated sectors, ordered by position.
    pub fn sectors(&self) -> &[Range<usize>] { &self.sectors }

    /// Number of populated sectors.
    pub fn n_sectors(&self) -> usize { self.sectors.len() }

    /// Iterate over all populated indices in order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.sectors.iter().flat_map(|r| r.clone())
    }

    /// Number of populated entries.
    pub fn populated(&self) -> usize { self.sectors.iter().map(|r| r.len()).sum() }

    pub fn as_array(&self) -> &nd::Array1<A> { &self.data }

    pub fn into_array(self) -> nd::Array1<A> { self.data }
}

impl<A> Index<usize> for SectorVector<A> {
    type Output = A;

    fn index(&self, k: usize) -> &A { &self.data[k] }
}

impl<A> IndexMut<usize> for SectorVector<A> {
    fn index_mut(&mut self, k: usize) -> &mut A { &mut self.data[k] }
}
