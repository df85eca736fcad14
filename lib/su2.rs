//! Clebsch-Gordan coefficients for coupling SU(2) multiplets.
//!
//! All spins and projections are passed doubled, so that `(1, -1)` means
//! *j* = 1/2, *m* = –1/2. The Condon-Shortley phase convention is used.

use std::cell::RefCell;
use rustc_hash::FxHashMap;
use statrs::function::factorial::ln_factorial;

fn lf(n: i64) -> f64 { ln_factorial(n as u64) }

/// Compute ⟨*j*<sub>1</sub> *m*<sub>1</sub>; *j*<sub>2</sub> *m*<sub>2</sub> |
/// *j* *m*⟩ by the Racah formula.
///
/// Returns zero for any combination of arguments that is not allowed (broken
/// triangle rule, mismatched projections or parities, |*m*| > *j*).
pub fn clebsch_gordan(j1: u32, m1: i32, j2: u32, m2: i32, j: u32, m: i32) -> f64 {
    let (j1, m1, j2, m2, j, m)
        = (j1 as i64, m1 as i64, j2 as i64, m2 as i64, j as i64, m as i64);
    if m1 + m2 != m { return 0.0; }
    if m1.abs() > j1 || m2.abs() > j2 || m.abs() > j { return 0.0; }
    if (j1 + m1) % 2 != 0 || (j2 + m2) % 2 != 0 || (j + m) % 2 != 0 {
        return 0.0;
    }
    if j < (j1 - j2).abs() || j > j1 + j2 || (j1 + j2 + j) % 2 != 0 {
        return 0.0;
    }
    let ln_pre: f64
        = lf((j1 + j2 - j) / 2) + lf((j1 - j2 + j) / 2) + lf((-j1 + j2 + j) / 2)
        - lf((j1 + j2 + j) / 2 + 1)
        + lf((j + m) / 2) + lf((j - m) / 2)
        + lf((j1 - m1) / 2) + lf((j1 + m1) / 2)
        + lf((j2 - m2) / 2) + lf((j2 + m2) / 2);
    let k_min = 0_i64.max(-(j - j2 + m1) / 2).max(-(j - j1 - m2) / 2);
    let k_max = ((j1 + j2 - j) / 2).min((j1 - m1) / 2).min((j2 + m2) / 2);
    let sum: f64
        = (k_min..=k_max)
        .map(|k| {
            let ln_den
                = lf(k) + lf((j1 + j2 - j) / 2 - k)
                + lf((j1 - m1) / 2 - k) + lf((j2 + m2) / 2 - k)
                + lf((j - j2 + m1) / 2 + k) + lf((j - j1 - m2) / 2 + k);
            let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
            sign * (0.5 * ln_pre - ln_den).exp()
        })
        .sum();
    ((j + 1) as f64).sqrt() * sum
}

/// Memoized Clebsch-Gordan coefficients.
///
/// The table is filled lazily; [`Self::prepare`] fills it ahead of time for
/// all couplings of two spins up to a given bound.
#[derive(Clone, Debug, Default)]
pub struct CgTable {
    cache: RefCell<FxHashMap<[i32; 6], f64>>,
}

impl CgTable {
    pub fn new() -> Self { Self::default() }

    /// Return ⟨*j*<sub>1</sub> *m*<sub>1</sub>; *j*<sub>2</sub>
    /// *m*<sub>2</sub> | *j* *m*⟩, computing it if not yet known.
    pub fn get(&self, j1: u32, m1: i32, j2: u32, m2: i32, j: u32, m: i32) -> f64 {
        let key = [j1 as i32, m1, j2 as i32, m2, j as i32, m];
        if let Some(c) = self.cache.borrow().get(&key) { return *c; }
        let c = clebsch_gordan(j1, m1, j2, m2, j, m);
        self.cache.borrow_mut().insert(key, c);
        c
    }

    /// Compute all non-trivial coefficients coupling two doubled spins up to
    /// `j2_max`.
    pub fn prepare(&self, j2_max: u32) {
        for ja in 0..=j2_max {
            for jb in 0..=j2_max {
                for j in (ja.abs_diff(jb)..=ja + jb).step_by(2) {
                    for ma in (-(ja as i32)..=ja as i32).step_by(2) {
                        for mb in (-(jb as i32)..=jb as i32).step_by(2) {
                            self.get(ja, ma, jb, mb, j, ma + mb);
                        }
                    }
                }
            }
        }
    }

    /// Number of stored coefficients.
    pub fn len(&self) -> usize { self.cache.borrow().len() }

    pub fn is_empty(&self) -> bool { self.cache.borrow().is_empty() }
}
