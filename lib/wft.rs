//! Orchestration of wave-function transformations over a DMRG run.
//!
//! The sweep engine drives a [`WftController`] through the following protocol:
//!
//! 1. While the lattice grows (`Stage::Infinite`), every truncation step calls
//!    [`WftController::push`] for both blocks. Transforms are recorded but no
//!    transformation is ever attempted; trial vectors are random.
//! 2. Before every step of a finite sweep, the engine calls
//!    [`WftController::set_stage`] with the direction of growth, then
//!    brackets the diagonalization with
//!    [`trigger_on`][WftController::trigger_on],
//!    [`set_initial_vector`][WftController::set_initial_vector], and
//!    [`trigger_off`][WftController::trigger_off]. The block that grows
//!    already has its transform from the preceding `push`; the block that
//!    shrinks takes its transform back off the history recorded while it grew.
//! 3. After diagonalizing, the engine truncates and calls `push` again.
//!
//! ```
//! use std::sync::Arc;
//! use ndarray as nd;
//! use dmrg_wft::*;
//!
//! let mut wft: WftController<f64> = WftController::new(WftConfig::default(), NullSink);
//! let site = Arc::new(Basis::new([0], [0, 1]).unwrap());
//! let pair = Arc::new(Basis::product(&site, &site).unwrap());
//! let sup = Arc::new(Basis::product(&pair, &pair).unwrap());
//!
//! // growth: transforms are only recorded
//! let a = TransformMatrix::new(nd::Array2::<f64>::eye(4));
//! wft.push(a, Direction::ExpandSystem, &pair, &pair, &sup).unwrap();
//! let mut psi: SectorVector<f64> = SectorVector::full(sup.size());
//! wft.set_initial_vector(&mut psi, &SectorVector::full(sup.size()), &pair, &pair, &sup)
//!     .unwrap();
//! assert!((psi.norm() - 1.0).abs() < 1e-12);
//! ```

use std::sync::Arc;
use ndarray as nd;
use thiserror::Error;
use crate::{
    WftScalar,
    basis::{ Basis, BasisError },
    config::{ Symmetry, WftConfig },
    progress::{ ProgressIndicator, ProgressSink },
    stack::{ Side, StackError, TransformStackPair },
    stage::{ CounterPolicy, Direction, Stage, WftStateMachine },
    transform::{ Frame, TransformError, TransformStrategy },
    vector::{ SectorVector, VectorError },
    wave::{ TransformMatrix, WaveStruct },
};

#[derive(Debug, Error, PartialEq)]
pub enum WftError {
    /// Returned when the transform history is inconsistent with the sweep.
    #[error("{0}")]
    Stack(#[from] StackError),

    /// Returned when the contraction itself fails.
    #[error("{0}")]
    Transform(#[from] TransformError),

    #[error("{0}")]
    InvalidBasis(#[from] BasisError),

    #[error("{0}")]
    InvalidVector(#[from] VectorError),

    /// Returned when pushing a transform for the block that is not growing in
    /// the current finite-sweep stage.
    #[error("error in push: direction {direction} does not match stage {stage}")]
    InvalidDirection { stage: Stage, direction: Direction },

    /// Returned when asked to transform a vector of (nearly) zero norm.
    #[error("error in transformation: source vector has norm {0:e}")]
    DegenerateInputVector(f64),

    /// Returned when a random vector is requested over an invalid range.
    #[error("error in random vector: range {start}..{end} out of bounds for length {len}")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },
}
use WftError::*;
pub type WftResult<T> = Result<T, WftError>;

const CALLER: &str = "WaveFunctionTransformation";

/// Keeps the transform history and sweep state of a DMRG run, and produces
/// initial vectors for the eigensolver.
///
/// Transformations are only attempted in the finite-sweep stages and while the
/// controller is enabled; otherwise every request for an initial vector is
/// answered with a random unit vector. Disabling is permanent.
///
/// All failures reported by this type indicate that the sequence of calls made
/// by the sweep engine is inconsistent with the recorded history (or that the
/// bases handed in do not fit the recorded transforms); none of them are worth
/// retrying.
#[derive(Debug)]
pub struct WftController<A> {
    enabled: bool,
    norm_threshold: f64,
    machine: WftStateMachine,
    stacks: TransformStackPair<A>,
    wave: WaveStruct<A>,
    strategy: TransformStrategy,
    progress: ProgressIndicator,
}

impl<A> WftController<A>
where A: WftScalar
{
    /// Create a new controller in the `Infinite` stage, writing status lines
    /// to `sink`.
    pub fn new<S>(config: WftConfig, sink: S) -> Self
    where S: ProgressSink + 'static
    {
        Self {
            enabled: config.enabled,
            norm_threshold: config.norm_threshold,
            machine: WftStateMachine::new(),
            stacks: TransformStackPair::new(),
            wave: WaveStruct::default(),
            strategy: TransformStrategy::new(config.symmetry),
            progress: ProgressIndicator::new(CALLER, sink),
        }
    }

    /// Create a new controller with the default configuration and the
    /// symmetry of `basis`.
    pub fn for_basis<S>(basis: &Basis, sink: S) -> Self
    where S: ProgressSink + 'static
    {
        Self::new(WftConfig::for_basis(basis), sink)
    }

    /// Precompute anything depending on the dimension of a single site.
    ///
    /// Fails if `site_dim` is zero.
    pub fn init(&mut self, site_dim: usize) -> WftResult<()> {
        self.strategy.init(site_dim)?;
        Ok(())
    }

    /// Set the stage of the run, resetting the step counter unless `policy`
    /// says otherwise.
    pub fn set_stage(&mut self, stage: Stage, policy: CounterPolicy) {
        if stage != self.machine.stage() {
            log::debug!("{CALLER}: stage {} -> {stage}", self.machine.stage());
        }
        self.machine.set_stage(stage, policy);
    }

    fn allowed(&self) -> bool { self.enabled && self.machine.allows_current() }

    /// Prepare for the transformation of the upcoming step.
    ///
    /// Retrieves the transform of the block that shrinks in the current stage
    /// from its history. On the first step of a stage, the history must not be
    /// empty; the entry recorded last is discarded and the one underneath is
    /// used, if there is one.
    ///
    /// When the sweep turns at an end of the lattice, the block that grows is
    /// at its smallest and was never truncated, so its transform is the
    /// identity over the recorded block-plus-site basis.
    ///
    /// Does nothing if transformation is not allowed.
    pub fn trigger_on(
        &mut self,
        s_prime: &Arc<Basis>,
        e_prime: &Arc<Basis>,
        super_block: &Arc<Basis>,
    ) -> WftResult<()>
    {
        if !self.allowed() { return Ok(()); }
        let Some(direction) = self.machine.stage().direction()
            else { return Ok(()); };
        let side = direction.side().opposite();
        let transform
            = if self.machine.counter() == 0 {
                self.stacks.pop_seed(side)?
            } else {
                self.stacks.pop(side)?
            };
        log::debug!(
            "{CALLER}: took {}x{} {side} transform, {} left; bases {}/{}/{}",
            transform.n_new(), transform.n_old(), self.stacks.depth(side),
            s_prime.size(), e_prime.size(), super_block.size(),
        );
        self.wave.install(side, transform);
        if self.machine.is_turn() {
            let growing = direction.side();
            if let Some(n) = self.wave.primed(growing).map(|b| b.size()) {
                log::debug!("{CALLER}: sweep turns, {growing} transform reset to {n}x{n} identity");
                self.wave.install(growing, TransformMatrix::new(nd::Array2::eye(n)));
            }
        }
        self.progress.print_line("ready to transform");
        Ok(())
    }

    /// Fill `dest` with an initial vector for the eigensolver over the
    /// superblock `super_block`.
    ///
    /// If transformation is allowed, `src` (the target state of the previous
    /// step) is transformed into the new basis. Otherwise `dest` is filled with
    /// a random unit vector, irrespective of `src`.
    ///
    /// Fails if `src` has norm below the configured threshold, or if the
    /// transformation itself fails, in which case the state of the controller
    /// is logged first. Fails without transforming if `dest` has no populated
    /// sectors. `dest` is not written on failure.
    pub fn set_initial_vector(
        &self,
        dest: &mut SectorVector<A>,
        src: &SectorVector<A>,
        s_prime: &Basis,
        e_prime: &Basis,
        super_block: &Basis,
    ) -> WftResult<()>
    {
        if !self.allowed() { return self.create_random_vector(dest); }
        let norm = src.norm();
        if norm < self.norm_threshold { return Err(DegenerateInputVector(norm)); }
        self.transform(dest, src, Frame::new(s_prime, e_prime, super_block))?;
        self.progress.print_line("transformation completed");
        Ok(())
    }

    /// Like [`Self::set_initial_vector`], but for several target states at
    /// once.
    ///
    /// Every vector is transformed before any of `dests` is written, so that
    /// nothing is written on failure. Fails if `dests` and `srcs` have
    /// different lengths.
    pub fn set_initial_vectors(
        &self,
        dests: &mut [SectorVector<A>],
        srcs: &[SectorVector<A>],
        s_prime: &Basis,
        e_prime: &Basis,
        super_block: &Basis,
    ) -> WftResult<()>
    {
        if dests.len() != srcs.len() {
            return Err(TransformError::DimensionMismatch {
                what: "number of vectors",
                expected: dests.len(),
                got: srcs.len(),
            }.into());
        }
        if !self.allowed() {
            if dests.iter().any(|dest| dest.populated() == 0) {
                return Err(VectorError::Unpopulated.into());
            }
            return dests.iter_mut()
                .try_for_each(|dest| self.create_random_vector(dest));
        }
        if let Some(norm)
            = srcs.iter().map(|src| src.norm()).find(|n| *n < self.norm_threshold)
        {
            return Err(DegenerateInputVector(norm));
        }
        let new = Frame::new(s_prime, e_prime, super_block);
        let results: Vec<SectorVector<A>>
            = dests.iter().zip(srcs)
            .map(|(dest, src)| {
                let mut tmp = dest.clone();
                self.transform(&mut tmp, src, new)?;
                Ok(tmp)
            })
            .collect::<WftResult<_>>()?;
        dests.iter_mut().zip(results)
            .for_each(|(dest, tmp)| { *dest = tmp; });
        self.progress.print_line(&format!("{} transformations completed", srcs.len()));
        Ok(())
    }

    fn transform(
        &self,
        dest: &mut SectorVector<A>,
        src: &SectorVector<A>,
        new: Frame<'_>,
    ) -> WftResult<()>
    {
        self.strategy
            .transform_vector(self.machine.stage(), &self.wave, dest, src, new)
            .map_err(|err| {
                self.dump_state(&err);
                err.into()
            })
    }

    /// Close the transformation of the current step, recording the bases of
    /// the new superblock.
    ///
    /// Does nothing if transformation is not allowed.
    pub fn trigger_off(
        &mut self,
        s_prime: &Arc<Basis>,
        e_prime: &Arc<Basis>,
        super_block: &Arc<Basis>,
    ) {
        if !self.allowed() { return; }
        self.wave.set_bases(s_prime, e_prime, super_block);
        self.machine.advance();
        self.progress.print_line("transformation step closed");
    }

    /// Record the truncation transform computed for the block growing in
    /// `direction`.
    ///
    /// `growing` is the basis of the growing block plus one site (the basis the
    /// transform truncates), `summed` is the corresponding basis of the other
    /// block, and `super_block` the superblock of the step just diagonalized.
    ///
    /// While the lattice grows, the transform is recorded and installed for its
    /// own side only. In a finite-sweep stage it is installed for both sides
    /// and recorded for the growing one.
    ///
    /// Does nothing if the controller is disabled. Fails if `direction` does
    /// not match the current finite-sweep stage.
    pub fn push<T>(
        &mut self,
        transform: T,
        direction: Direction,
        growing: &Arc<Basis>,
        summed: &Arc<Basis>,
        super_block: &Arc<Basis>,
    ) -> WftResult<()>
    where T: Into<TransformMatrix<A>>
    {
        if !self.enabled { return Ok(()); }
        let stage = self.machine.stage();
        let side = direction.side();
        let transform: TransformMatrix<A> = transform.into();
        match stage.direction() {
            None => {
                self.stacks.push(side, transform, &mut self.wave);
            },
            Some(d) if d == direction => {
                self.wave.install(side.opposite(), transform.clone());
                self.stacks.push(side, transform, &mut self.wave);
            },
            Some(_) => { return Err(InvalidDirection { stage, direction }); },
        }
        let (s_prime, e_prime)
            = match side {
                Side::System => (growing, summed),
                Side::Environ => (summed, growing),
            };
        self.wave.set_bases(s_prime, e_prime, super_block);
        log::debug!(
            "{CALLER}: pushed {side} transform, depths {}/{}",
            self.stacks.depth(Side::System), self.stacks.depth(Side::Environ),
        );
        self.progress.print_line(&format!("pushed {direction} in stage {stage}"));
        Ok(())
    }

    /// Fill the populated sectors of `dest` with random values and normalize
    /// them jointly to unit norm. All other entries are set to zero.
    ///
    /// Fails if `dest` has no populated sectors, in which case it is not
    /// touched.
    pub fn create_random_vector(&self, dest: &mut SectorVector<A>) -> WftResult<()> {
        if dest.populated() == 0 { return Err(VectorError::Unpopulated.into()); }
        let indices: Vec<usize> = dest.indices().collect();
        dest.clear();
        fill_random(dest, &indices);
        if self.enabled {
            self.progress.print_line("no transformation available, using a random vector");
        }
        Ok(())
    }

    /// Fill the entries `start..end` of `dest` with random values and
    /// normalize them to unit norm. Entries outside the range are not touched.
    ///
    /// Fails if the range is out of bounds.
    pub fn create_random_vector_range(
        &self,
        dest: &mut SectorVector<A>,
        start: usize,
        end: usize,
    ) -> WftResult<()>
    {
        if start > end || end > dest.len() {
            return Err(RangeOutOfBounds { start, end, len: dest.len() });
        }
        let indices: Vec<usize> = (start..end).collect();
        fill_random(dest, &indices);
        Ok(())
    }

    /// Create a zero vector over `super_block`, populated on the sectors with
    /// total quantum number in `qns`.
    ///
    /// Fails if `super_block` has no sector for one of the quantum numbers.
    pub fn sector_vector<I>(&self, super_block: &Basis, qns: I)
        -> WftResult<SectorVector<A>>
    where I: IntoIterator<Item = i64>
    {
        let ids: Vec<usize>
            = qns.into_iter()
            .map(|qn| {
                super_block.sector_of_qn(qn)
                    .ok_or(VectorError::UnknownQuantumNumber(qn))
            })
            .collect::<Result<_, _>>()?;
        Ok(SectorVector::from_basis(super_block, ids)?)
    }

    /// Permanently turn off transformations.
    pub fn disable(&mut self) {
        if self.enabled { log::debug!("{CALLER}: disabled"); }
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool { self.enabled }

    pub fn stage(&self) -> Stage { self.machine.stage() }

    /// Number of transformation steps completed since the last counter reset.
    pub fn counter(&self) -> usize { self.machine.counter() }

    /// Return `true` until the first transformation step has been completed.
    pub fn is_first_call(&self) -> bool { self.machine.is_first_call() }

    /// Currently active transforms and bases.
    pub fn wave(&self) -> &WaveStruct<A> { &self.wave }

    /// Return the number of recorded transforms for the system and environment
    /// blocks.
    pub fn stack_depths(&self) -> (usize, usize) {
        (self.stacks.depth(Side::System), self.stacks.depth(Side::Environ))
    }

    pub fn symmetry(&self) -> Symmetry { self.strategy.symmetry() }

    fn dump_state(&self, err: &TransformError) {
        let (ns, ne) = self.stack_depths();
        let report = format!(
            "transformation failed: {err}\n{}\nwsStack={ns}\nweStack={ne}\ncounter={}\nstage={}",
            self.wave, self.machine.counter(), self.machine.stage(),
        );
        log::error!("{CALLER}: {report}");
        self.progress.print_line(&report);
    }
}

fn fill_random<A>(dest: &mut SectorVector<A>, indices: &[usize])
where A: WftScalar
{
    let mut rng = rand::thread_rng();
    let data = dest.data_mut();
    indices.iter()
        .for_each(|k| { data[*k] = A::sample_uniform(&mut rng); });
    let norm: f64
        = indices.iter()
        .map(|k| data[*k].norm_sqr_f64())
        .sum::<f64>()
        .sqrt();
    if norm > 0.0 {
        let scale = A::from_f64(norm.recip());
        indices.iter()
            .for_each(|k| { data[*k] = data[*k] * scale; });
    } else if let Some(k) = indices.first() {
        data[*k] = A::one();
    }
}
