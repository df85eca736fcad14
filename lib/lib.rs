//! Wave-function transformation for finite-lattice DMRG sweeps.
//!
//! During a sweep, the superblock is repeatedly re-partitioned into a system
//! block, two single sites, and an environment block. Every re-partitioning
//! changes the renormalized basis in which the target state lives, and the
//! eigensolver for the next step converges much faster when it is seeded with
//! the previous target state expressed in the new basis instead of a random
//! vector. This crate keeps the bookkeeping needed to do that: the truncation
//! matrices recorded while the lattice grows, the stage of the sweep, and the
//! contraction that carries a state vector from one superblock basis to the
//! next.
//!
//! ```text
//!   old:  [ S_l  ] x_l+1 | x_l+2 [ E_l+3 ]
//!              \__ ws __/         \_ we _/
//!   new:  [ S_l+1    ] x_l+2 | x_l+3 [ E_l+4 ]
//! ```
//!
//! The central type is [`WftController`][wft::WftController]; see its
//! documentation for the protocol expected from the sweep engine.

use num_complex::{ ComplexFloat, Complex };
use rand::Rng;

pub mod basis;
pub mod config;
pub mod progress;
pub mod stack;
pub mod stage;
pub mod su2;
pub mod transform;
pub mod vector;
pub mod wave;
pub mod wft;

pub use basis::Basis;
pub use config::{ Symmetry, WftConfig };
pub use progress::{ LogSink, MemorySink, NullSink, ProgressSink };
pub use stack::Side;
pub use stage::{ CounterPolicy, Direction, Stage };
pub use vector::SectorVector;
pub use wave::{ TransformMatrix, WaveStruct };
pub use wft::{ WftController, WftError, WftResult };

/// Extension trait for [`ComplexFloat`], describing the scalar field over
/// which state vectors and transformation matrices are defined.
pub trait ComplexFloatExt: ComplexFloat {
    /// Convert from `Self::Real`.
    ///
    /// Should adhere to the usual relationship between ordinary complex and
    /// real numbers, i.e. the result should have imaginary part equal to zero.
    fn from_re(x: Self::Real) -> Self;

    /// Convert from an `f64`, possibly with loss of precision.
    fn from_f64(x: f64) -> Self;

    /// Return the squared modulus as an `f64`.
    fn norm_sqr_f64(self) -> f64;

    /// Draw a value with all real components uniform in [–1/2, 1/2).
    fn sample_uniform<R>(rng: &mut R) -> Self
    where R: Rng + ?Sized;
}

macro_rules! impl_complexfloatext_real {
    ( $t:ty ) => {
        impl ComplexFloatExt for $t {
            fn from_re(x: Self::Real) -> Self { x }

            fn from_f64(x: f64) -> Self { x as $t }

            fn norm_sqr_f64(self) -> f64 { (self as f64).powi(2) }

            fn sample_uniform<R>(rng: &mut R) -> Self
            where R: Rng + ?Sized
            {
                rng.gen::<$t>() - 0.5
            }
        }
    }
}
impl_complexfloatext_real!(f32);
impl_complexfloatext_real!(f64);

macro_rules! impl_complexfloatext_complex {
    ( $t:ty ) => {
        impl ComplexFloatExt for Complex<$t> {
            fn from_re(x: Self::Real) -> Self { Self { re: x, im: 0.0 } }

            fn from_f64(x: f64) -> Self { Self { re: x as $t, im: 0.0 } }

            fn norm_sqr_f64(self) -> f64 { self.norm_sqr() as f64 }

            fn sample_uniform<R>(rng: &mut R) -> Self
            where R: Rng + ?Sized
            {
                let re = rng.gen::<$t>() - 0.5;
                let im = rng.gen::<$t>() - 0.5;
                Self { re, im }
            }
        }
    }
}
impl_complexfloatext_complex!(f32);
impl_complexfloatext_complex!(f64);

/// Convenience trait to identify scalar types that can be used in the
/// matrix-vector contractions of a transformation.
pub trait WftScalar
where Self: ComplexFloatExt + ndarray::LinalgScalar + std::fmt::Debug
{ }

impl<A> WftScalar for A
where A: ComplexFloatExt + ndarray::LinalgScalar + std::fmt::Debug
{ }
