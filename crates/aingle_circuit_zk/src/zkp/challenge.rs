//! Challenge-dependent values
//!
//! Everything that depends on y is computed once into a [`ChallengeContext`]
//! and handed to whoever needs it, so powers from two different challenges
//! can never be mixed.

use num_bigint::BigUint;
use num_traits::Zero;

use super::LinearConstraints;
use crate::error::{Result, ZkError};
use crate::field::Field;
use crate::matrix::SparseMatrix;

/// Powers of y used by s(X), r′(X) and K(y)
///
/// * `Y[i] = y^i` for `0 ≤ i ≤ m`
/// * `Y′[j] = y^(m·(j+1))` for `0 ≤ j < n`
/// * `Y_Mq[q] = y^(M+q+1)` with `M = m·n + m`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeContext {
    y: BigUint,
    y_inv: BigUint,
    y_powers: Vec<BigUint>,
    y_prime: SparseMatrix,
    y_mq: Vec<BigUint>,
    m: usize,
    n: usize,
}

impl ChallengeContext {
    /// Derive all powers for challenge `y`; y must be invertible mod p
    pub fn new(y: &BigUint, m: usize, n: usize, linear_count: usize, field: &Field) -> Result<Self> {
        if m == 0 || n == 0 {
            return Err(ZkError::invalid("witness shape must be non-zero"));
        }
        let y = field.reduce(y);
        let y_inv = field.inv(&y)?;
        let y_powers = field.power_vector(&y, m + 1);

        let y_m = &y_powers[m];
        let mut y_prime = SparseMatrix::new(1, n)?;
        let mut acc = y_m.clone();
        for j in 0..n {
            y_prime.set(0, j, acc.clone())?;
            acc = field.mul(&acc, y_m);
        }

        let big_m = (m * n + m) as u64;
        let mut y_mq = Vec::with_capacity(linear_count);
        let mut acc = field.pow_u64(&y, big_m + 1);
        for _ in 0..linear_count {
            y_mq.push(acc.clone());
            acc = field.mul(&acc, &y);
        }

        Ok(Self {
            y,
            y_inv,
            y_powers,
            y_prime,
            y_mq,
            m,
            n,
        })
    }

    pub fn y(&self) -> &BigUint {
        &self.y
    }

    pub fn y_inv(&self) -> &BigUint {
        &self.y_inv
    }

    /// y^i for `i ≤ m`
    pub fn y_power(&self, i: usize) -> &BigUint {
        &self.y_powers[i]
    }

    /// Y′ as a `1 × n` row
    pub fn y_prime(&self) -> &SparseMatrix {
        &self.y_prime
    }

    /// Per-constraint weights y^(M+q+1)
    pub fn y_mq(&self) -> &[BigUint] {
        &self.y_mq
    }

    /// Witness shape `(m, n)` the powers were derived for
    pub fn shape(&self) -> (usize, usize) {
        (self.m, self.n)
    }
}

/// The Q linear constraints folded into one row per witness row
///
/// Row `i-1` of `a` is `Wai(y)`, the sum over q of row `i-1` of `Wqa[q]`
/// weighted by `Y_Mq[q]`; likewise for `b` and `c`. `c` also carries the
/// `−Y[i]·Y′` term that ties A∘B to C.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintWeights {
    a: SparseMatrix,
    b: SparseMatrix,
    c: SparseMatrix,
    k: BigUint,
}

impl ConstraintWeights {
    pub fn fold(constraints: &LinearConstraints, ctx: &ChallengeContext, field: &Field) -> Result<Self> {
        let (m, n) = ctx.shape();
        if constraints.len() != ctx.y_mq().len() {
            return Err(ZkError::invalid(format!(
                "challenge context covers {} constraints, got {}",
                ctx.y_mq().len(),
                constraints.len()
            )));
        }

        let fold_side = |ws: &[SparseMatrix]| -> Result<Vec<BigUint>> {
            let mut acc = vec![BigUint::zero(); m * n];
            for (w, weight) in ws.iter().zip(ctx.y_mq()) {
                for (i, j, v) in w.entries() {
                    if i >= m || j >= n {
                        return Err(ZkError::invalid(format!(
                            "constraint weight at ({i}, {j}) outside {m}x{n} witness"
                        )));
                    }
                    acc[i * n + j] += v * weight;
                }
            }
            Ok(acc)
        };

        let a = fold_side(constraints.wqa.as_slice())?;
        let b = fold_side(constraints.wqb.as_slice())?;
        let mut c = fold_side(constraints.wqc.as_slice())?;
        for i in 0..m {
            for j in 0..n {
                let tie = field.mul(ctx.y_power(i + 1), &ctx.y_prime().get(0, j));
                let cell = &mut c[i * n + j];
                *cell = field.sub(&field.reduce(cell), &tie);
            }
        }

        let k = constraints
            .kq
            .iter()
            .zip(ctx.y_mq())
            .fold(BigUint::zero(), |acc, (kq, w)| acc + kq * w);

        Ok(Self {
            a: to_matrix(a, m, n, field)?,
            b: to_matrix(b, m, n, field)?,
            c: to_matrix(c, m, n, field)?,
            k: field.reduce(&k),
        })
    }

    /// `Wai(y)` as a `1 × n` row, for `1 ≤ i ≤ m`
    pub fn wai(&self, i: usize) -> SparseMatrix {
        self.a.row_matrix(i - 1)
    }

    /// `Wbi(y)` as a `1 × n` row, for `1 ≤ i ≤ m`
    pub fn wbi(&self, i: usize) -> SparseMatrix {
        self.b.row_matrix(i - 1)
    }

    /// `Wci(y)` as a `1 × n` row, for `1 ≤ i ≤ m`
    pub fn wci(&self, i: usize) -> SparseMatrix {
        self.c.row_matrix(i - 1)
    }

    /// `K(y) = Σ Kq·Y_Mq[q]`
    pub fn k(&self) -> &BigUint {
        &self.k
    }
}

fn to_matrix(dense: Vec<BigUint>, m: usize, n: usize, field: &Field) -> Result<SparseMatrix> {
    let mut out = SparseMatrix::new(m, n)?;
    for (idx, v) in dense.into_iter().enumerate() {
        out.set(idx / n, idx % n, field.reduce(&v))?;
    }
    Ok(out)
}
