//! Contraction of a state vector from one superblock basis into the next.
//!
//! A superblock basis is `S' ⊗ E'`, where `S' = S ⊗ site` and
//! `E' = site ⊗ E`. When the boundary moves by one site, one block absorbs a
//! site (its truncation `ws` or `we` projects onto the new, smaller basis) and
//! the other block releases one (its recorded truncation is used in reverse to
//! expand the old block state over `site ⊗ smaller block`).
//!
//! Growing the system (`ExpandSystem`):
//! ```text
//! ψ'[(s, x), b'] = Σ ws[s, a] ψ[a, (x, e)] conj(we[e, b'])
//! ```
//! Growing the environment (`ExpandEnviron`):
//! ```text
//! ψ'[a', (x, e)] = Σ conj(ws[s, a']) ψ[(s, x), b] we[e, b]
//! ```
//!
//! Product states are decomposed over their factors differently depending on
//! the symmetry of the run, which is what distinguishes [`LocalTransform`]
//! from [`Su2Transform`].

use ndarray as nd;
use thiserror::Error;
use crate::{
    WftScalar,
    basis::{ Basis, Coupling, Factors },
    config::Symmetry,
    stack::Side,
    stage::Stage,
    su2::CgTable,
    vector::SectorVector,
    wave::WaveStruct,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    /// Returned when no transform is installed for a side.
    #[error("error in transformation: no {0} transform installed")]
    MissingTransform(Side),

    /// Returned when the previous configuration lacks a basis.
    #[error("error in transformation: no previous {0} basis recorded")]
    MissingBasis(&'static str),

    /// Returned when a basis that should be a product of two factors is not.
    #[error("error in transformation: {0} is not a product basis")]
    NotAProduct(&'static str),

    /// Returned when the local transformation meets an SU(2)-coupled basis.
    #[error("error in transformation: {0} is not an abelian product basis")]
    NotAbelian(&'static str),

    /// Returned when the SU(2) transformation meets a basis without multiplet
    /// structure, or with inconsistent multiplet structure.
    #[error("error in transformation: {0} carries no usable SU(2) structure")]
    NotSu2(&'static str),

    /// Returned when the dimensions of transforms, bases, and vectors do not
    /// agree.
    #[error("error in transformation: dimension mismatch in {what}: expected {expected}, got {got}")]
    DimensionMismatch { what: &'static str, expected: usize, got: usize },

    /// Returned when initializing with a zero single-site dimension.
    #[error("error in initialization: single-site dimension must be non-zero")]
    ZeroSiteDimension,

    /// Returned when asked to transform in a stage that has no transformation.
    #[error("error in transformation: no transformation defined in stage {0}")]
    NoTransformInStage(Stage),
}
use TransformError::*;
pub type TransformResult<T> = Result<T, TransformError>;

/// The three bases describing one superblock configuration.
#[derive(Copy, Clone, Debug)]
pub struct Frame<'a> {
    /// System block plus one site.
    pub s_prime: &'a Basis,
    /// Environment block plus one site.
    pub e_prime: &'a Basis,
    /// Superblock.
    pub super_block: &'a Basis,
}

impl<'a> Frame<'a> {
    pub fn new(s_prime: &'a Basis, e_prime: &'a Basis, super_block: &'a Basis)
        -> Self
    {
        Self { s_prime, e_prime, super_block }
    }

    fn from_wave<A>(wave: &'a WaveStruct<A>) -> TransformResult<Self> {
        let s_prime = wave.s_prime.as_deref().ok_or(MissingBasis("pSprime"))?;
        let e_prime = wave.e_prime.as_deref().ok_or(MissingBasis("pEprime"))?;
        let super_block = wave.super_block.as_deref().ok_or(MissingBasis("pSE"))?;
        Ok(Self { s_prime, e_prime, super_block })
    }

    fn check(&self) -> TransformResult<()> {
        let f = factors(self.super_block, "pSE")?;
        check("pSE left factor", self.s_prime.size(), f.left_size())?;
        check("pSE right factor", self.e_prime.size(), f.right_size())?;
        Ok(())
    }
}

fn factors<'b>(basis: &'b Basis, name: &'static str) -> TransformResult<&'b Factors> {
    basis.factors().ok_or(NotAProduct(name))
}

fn check(what: &'static str, expected: usize, got: usize) -> TransformResult<()> {
    if expected == got {
        Ok(())
    } else {
        Err(DimensionMismatch { what, expected, got })
    }
}

// Decomposition of a product state `k` into `(left, right, coefficient)`
// terms.
trait Decompose {
    // single-site dimension set by `init`
    fn site_dim(&self) -> Option<usize>;

    fn terms(&self, basis: &Basis, name: &'static str, k: usize)
        -> TransformResult<Vec<(usize, usize, f64)>>;
}

/// Transformation for bases with abelian quantum numbers only.
///
/// Product states map one-to-one onto pairs of factor states, and symmetry
/// sectors are treated as independent blocks: only the populated sectors of
/// the source are read and only those of the destination are written.
#[derive(Clone, Debug, Default)]
pub struct LocalTransform {
    site_dim: Option<usize>,
}

impl LocalTransform {
    pub fn new() -> Self { Self::default() }
}

impl Decompose for LocalTransform {
    fn site_dim(&self) -> Option<usize> { self.site_dim }

    fn terms(&self, basis: &Basis, name: &'static str, k: usize)
        -> TransformResult<Vec<(usize, usize, f64)>>
    {
        let f = factors(basis, name)?;
        match f.coupling() {
            Coupling::Abelian { split, .. } => {
                let (a, b) = split.get(k).copied()
                    .ok_or(DimensionMismatch { what: name, expected: split.len(), got: k })?;
                Ok(vec![(a, b, 1.0)])
            },
            Coupling::Su2 { .. } => Err(NotAbelian(name)),
        }
    }
}

/// Transformation for bases with SU(2) multiplet structure.
///
/// Coupled product states are expanded over factor pairs with
/// Clebsch-Gordan coefficients, so that moving a site from one block to the
/// other recouples the angular momenta consistently.
#[derive(Clone, Debug, Default)]
pub struct Su2Transform {
    site_dim: Option<usize>,
    table: CgTable,
}

impl Su2Transform {
    pub fn new() -> Self { Self::default() }

    /// Memoized Clebsch-Gordan coefficients.
    pub fn table(&self) -> &CgTable { &self.table }
}

impl Decompose for Su2Transform {
    fn site_dim(&self) -> Option<usize> { self.site_dim }

    fn terms(&self, basis: &Basis, name: &'static str, k: usize)
        -> TransformResult<Vec<(usize, usize, f64)>>
    {
        let f = factors(basis, name)?;
        let Coupling::Su2 { parents, left, right } = f.coupling()
            else { return Err(NotSu2(name)); };
        let label = basis.su2_label(k).ok_or(NotSu2(name))?;
        let (ma, mb) = parents.get(k).copied().ok_or(NotSu2(name))?;
        let ja = left.spin(ma).ok_or(NotSu2(name))?;
        let jb = right.spin(mb).ok_or(NotSu2(name))?;
        let mut terms: Vec<(usize, usize, f64)> = Vec::new();
        for m1 in (-(ja as i32)..=ja as i32).step_by(2) {
            let m2 = label.m2 - m1;
            if m2.unsigned_abs() > jb { continue; }
            let c = self.table.get(ja, m1, jb, m2, label.j2, label.m2);
            if c == 0.0 { continue; }
            let a = left.state(ma, m1).ok_or(NotSu2(name))?;
            let b = right.state(mb, m2).ok_or(NotSu2(name))?;
            terms.push((a, b, c));
        }
        Ok(terms)
    }
}

// ψ'[(s, x), b'] = Σ ws[s, a] ψ[a, (x, e)] conj(we[e, b'])
fn expand_system<A, D>(
    dec: &D,
    wave: &WaveStruct<A>,
    src: &SectorVector<A>,
    dest: &SectorVector<A>,
    new: Frame<'_>,
) -> TransformResult<Vec<A>>
where
    A: WftScalar,
    D: Decompose,
{
    let ws = wave.ws.as_ref().ok_or(MissingTransform(Side::System))?;
    let we = wave.we.as_ref().ok_or(MissingTransform(Side::Environ))?;
    let old = Frame::from_wave(wave)?;
    old.check()?;
    new.check()?;
    let fe_old = factors(old.e_prime, "previous pEprime")?;
    let fs_new = factors(new.s_prime, "pSprime")?;
    let (nx, ne) = (fe_old.left_size(), fe_old.right_size());
    check("source vector", old.super_block.size(), src.len())?;
    check("destination vector", new.super_block.size(), dest.len())?;
    check("ws columns", old.s_prime.size(), ws.n_old())?;
    check("ws rows", fs_new.left_size(), ws.n_new())?;
    check("we rows", ne, we.n_new())?;
    check("we columns", new.e_prime.size(), we.n_old())?;
    check("moving site", nx, fs_new.right_size())?;
    if let Some(d) = dec.site_dim() { check("site dimension", d, nx)?; }

    let mut psi: nd::Array3<A> = nd::Array3::zeros((old.s_prime.size(), nx, ne));
    for k in src.indices() {
        let v = src[k];
        if v == A::zero() { continue; }
        for (a, b, c) in dec.terms(old.super_block, "previous pSE", k)? {
            for (x, e, c2) in dec.terms(old.e_prime, "previous pEprime", b)? {
                psi[[a, x, e]] = psi[[a, x, e]] + v * A::from_f64(c * c2);
            }
        }
    }
    let we_conj: nd::Array2<A> = we.mapv(|w| w.conj());
    let blocks: Vec<nd::Array2<A>>
        = psi.axis_iter(nd::Axis(1))
        .map(|psi_x| ws.dot(&psi_x).dot(&we_conj))
        .collect();

    dest.indices()
        .map(|k| {
            let mut acc = A::zero();
            for (ap, bp, c) in dec.terms(new.super_block, "pSE", k)? {
                for (s, x, c2) in dec.terms(new.s_prime, "pSprime", ap)? {
                    acc = acc + blocks[x][[s, bp]] * A::from_f64(c * c2);
                }
            }
            Ok(acc)
        })
        .collect()
}

// ψ'[a', (x, e)] = Σ conj(ws[s, a']) ψ[(s, x), b] we[e, b]
fn expand_environ<A, D>(
    dec: &D,
    wave: &WaveStruct<A>,
    src: &SectorVector<A>,
    dest: &SectorVector<A>,
    new: Frame<'_>,
) -> TransformResult<Vec<A>>
where
    A: WftScalar,
    D: Decompose,
{
    let ws = wave.ws.as_ref().ok_or(MissingTransform(Side::System))?;
    let we = wave.we.as_ref().ok_or(MissingTransform(Side::Environ))?;
    let old = Frame::from_wave(wave)?;
    old.check()?;
    new.check()?;
    let fs_old = factors(old.s_prime, "previous pSprime")?;
    let fe_new = factors(new.e_prime, "pEprime")?;
    let (ns, nx) = (fs_old.left_size(), fs_old.right_size());
    check("source vector", old.super_block.size(), src.len())?;
    check("destination vector", new.super_block.size(), dest.len())?;
    check("ws rows", ns, ws.n_new())?;
    check("ws columns", new.s_prime.size(), ws.n_old())?;
    check("we columns", old.e_prime.size(), we.n_old())?;
    check("we rows", fe_new.right_size(), we.n_new())?;
    check("moving site", nx, fe_new.left_size())?;
    if let Some(d) = dec.site_dim() { check("site dimension", d, nx)?; }

    let mut psi: nd::Array3<A> = nd::Array3::zeros((ns, nx, old.e_prime.size()));
    for k in src.indices() {
        let v = src[k];
        if v == A::zero() { continue; }
        for (a, b, c) in dec.terms(old.super_block, "previous pSE", k)? {
            for (s, x, c2) in dec.terms(old.s_prime, "previous pSprime", a)? {
                psi[[s, x, b]] = psi[[s, x, b]] + v * A::from_f64(c * c2);
            }
        }
    }
    let ws_h: nd::Array2<A> = ws.t().mapv(|w| w.conj());
    let blocks: Vec<nd::Array2<A>>
        = psi.axis_iter(nd::Axis(1))
        .map(|psi_x| ws_h.dot(&psi_x).dot(&we.t()))
        .collect();

    dest.indices()
        .map(|k| {
            let mut acc = A::zero();
            for (ap, bp, c) in dec.terms(new.super_block, "pSE", k)? {
                for (x, e, c2) in dec.terms(new.e_prime, "pEprime", bp)? {
                    acc = acc + blocks[x][[ap, e]] * A::from_f64(c * c2);
                }
            }
            Ok(acc)
        })
        .collect()
}

fn transform_with<A, D>(
    dec: &D,
    stage: Stage,
    wave: &WaveStruct<A>,
    dest: &mut SectorVector<A>,
    src: &SectorVector<A>,
    new: Frame<'_>,
) -> TransformResult<()>
where
    A: WftScalar,
    D: Decompose,
{
    let values: Vec<A> = match stage {
        Stage::Infinite => { return Err(NoTransformInStage(stage)); },
        Stage::ExpandSystem => expand_system(dec, wave, src, dest, new)?,
        Stage::ExpandEnviron => expand_environ(dec, wave, src, dest, new)?,
    };
    dest.clear();
    let indices: Vec<usize> = dest.indices().collect();
    let data = dest.data_mut();
    indices.into_iter().zip(values)
        .for_each(|(k, v)| { data[k] = v; });
    Ok(())
}

/// The transformation used for a whole run, chosen once from the symmetry of
/// the bases.
#[derive(Clone, Debug)]
pub enum TransformStrategy {
    Local(LocalTransform),
    Su2(Su2Transform),
}

impl TransformStrategy {
    /// Create the strategy for `symmetry`.
    pub fn new(symmetry: Symmetry) -> Self {
        match symmetry {
            Symmetry::Local => Self::Local(LocalTransform::new()),
            Symmetry::Su2 => Self::Su2(Su2Transform::new()),
        }
    }

    pub fn symmetry(&self) -> Symmetry {
        match self {
            Self::Local(_) => Symmetry::Local,
            Self::Su2(_) => Symmetry::Su2,
        }
    }

    /// Precompute anything depending on the dimension of a single site.
    ///
    /// Fails if `site_dim` is zero.
    pub fn init(&mut self, site_dim: usize) -> TransformResult<()> {
        if site_dim == 0 { return Err(ZeroSiteDimension); }
        match self {
            Self::Local(local) => { local.site_dim = Some(site_dim); },
            Self::Su2(su2) => {
                su2.site_dim = Some(site_dim);
                su2.table.prepare(site_dim as u32 - 1);
            },
        }
        Ok(())
    }

    /// Re-express `src`, a state over the superblock recorded in `wave`, as
    /// `dest`, a state over the superblock described by `new`.
    ///
    /// Only the populated sectors of `dest` are written; everything else in
    /// `dest` is set to zero. `dest` is left untouched if the transformation
    /// fails.
    pub fn transform_vector<A>(
        &self,
        stage: Stage,
        wave: &WaveStruct<A>,
        dest: &mut SectorVector<A>,
        src: &SectorVector<A>,
        new: Frame<'_>,
    ) -> TransformResult<()>
    where A: WftScalar
    {
        match self {
            Self::Local(local) => transform_with(local, stage, wave, dest, src, new),
            Self::Su2(su2) => transform_with(su2, stage, wave, dest, src, new),
        }
    }
}
