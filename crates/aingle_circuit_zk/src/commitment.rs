//! Pedersen vector commitments and the polynomial commitment built on them
//!
//! A commitment to `v = (v_1, …, v_n)` with randomness `r` is
//!
//! `C = g_0^r · Π g_i^(v_i) mod Q`
//!
//! where every `g_i` lies in the order-p subgroup, so exponents are taken
//! mod p. A polynomial whose coefficients are laid out as a matrix `T` is
//! committed row by row; opening at `x` reveals `Z(x)·T` and `Z(x)·r`,
//! which the verifier checks against the product of the row commitments
//! raised to `Z(x)`.

use log::trace;
use num_bigint::BigUint;
use num_traits::One;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::{Result, ZkError};
use crate::field::{to_fixed_bytes, Field, GroupParams};
use crate::matrix::SparseMatrix;
use crate::transcript::Transcript;

const GENERATOR_LABEL: &[u8] = b"aingle_circuit_zk/generators";

/// How the generator list g_0 … g_n is produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GeneratorSetup {
    /// `g_i = g^(i+1)`; discrete logs between generators are public, so the
    /// commitment is not binding. Suited to the small test groups.
    #[default]
    Sequential,
    /// Each `g_i` hashed into the order-p subgroup from a domain tag and `i`
    HashDerived {
        /// Domain separation tag
        domain: Vec<u8>,
    },
}

/// Shape of the coefficient matrix holding t(X)
///
/// `m1` rows hold the negative-degree band, `m2` rows the positive band,
/// each row `n` coefficients wide; one extra masking row follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentShape {
    pub m1: usize,
    pub m2: usize,
    pub n: usize,
}

impl CommitmentShape {
    /// Shape for a witness matrix with `m` rows
    ///
    /// t(X) spans degrees −3m … 4m+2 (7m+2 non-constant coefficients).
    pub fn for_rows(m: usize) -> Self {
        let total = 7 * m + 2;
        let n = crate::field::ceil_sqrt(total);
        Self {
            m1: (3 * m).div_ceil(n),
            m2: (4 * m + 2).div_ceil(n),
            n,
        }
    }

    /// Number of committed rows, including the masking row
    pub fn row_count(&self) -> usize {
        self.m1 + self.m2 + 1
    }

    /// Z(x): x^-(m1-i)·n for the negative rows, x^(i·n+1) for the positive
    /// rows, x² for the masking row
    pub fn evaluation_powers(&self, x: &BigUint, field: &Field) -> Result<Vec<BigUint>> {
        let n = self.n as i64;
        let mut z = Vec::with_capacity(self.row_count());
        for i in 0..self.m1 {
            z.push(field.pow_signed(x, -((self.m1 - i) as i64) * n)?);
        }
        for i in 0..self.m2 {
            z.push(field.pow_signed(x, i as i64 * n + 1)?);
        }
        z.push(field.pow_u64(x, 2));
        Ok(z)
    }
}

/// Pedersen vector commitment over a [`GroupParams`] group
#[derive(Debug, Clone)]
pub struct PolynomialCommitment {
    group: GroupParams,
    field: Field,
    generators: Vec<BigUint>,
}

impl PolynomialCommitment {
    /// Sequential generators able to commit to `capacity` values
    pub fn new(group: GroupParams, capacity: usize) -> Result<Self> {
        Self::with_setup(group, capacity, &GeneratorSetup::Sequential)
    }

    /// Generators produced by `setup`, able to commit to `capacity` values
    pub fn with_setup(group: GroupParams, capacity: usize, setup: &GeneratorSetup) -> Result<Self> {
        if capacity == 0 {
            return Err(ZkError::invalid("commitment capacity must be non-zero"));
        }
        let generators = match setup {
            GeneratorSetup::Sequential => {
                let mut gens = Vec::with_capacity(capacity + 1);
                let mut acc = group.g.clone();
                for _ in 0..=capacity {
                    gens.push(acc.clone());
                    acc = group.mul(&acc, &group.g);
                }
                gens
            }
            GeneratorSetup::HashDerived { domain } => derive_generators(&group, capacity, domain),
        };
        Self::with_generators(group, generators)
    }

    /// Externally supplied generators; `generators[0]` blinds
    pub fn with_generators(group: GroupParams, generators: Vec<BigUint>) -> Result<Self> {
        if generators.len() < 2 {
            return Err(ZkError::invalid("need a blinding generator and at least one value generator"));
        }
        for (i, g) in generators.iter().enumerate() {
            if g.is_one() || g >= &group.q || !group.exp(g, &group.p).is_one() {
                return Err(ZkError::invalid(format!(
                    "generator {i} is not in the order-p subgroup"
                )));
            }
        }
        let field = group.scalar_field();
        Ok(Self {
            group,
            field,
            generators,
        })
    }

    pub fn group(&self) -> &GroupParams {
        &self.group
    }

    /// Circuit field ℤ_p
    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn generators(&self) -> &[BigUint] {
        &self.generators
    }

    /// Maximum vector length this scheme commits to
    pub fn capacity(&self) -> usize {
        self.generators.len() - 1
    }

    /// `g_0^r · Π g_(i+1)^(values[i]) mod Q`
    pub fn commit(&self, values: &[BigUint], r: &BigUint) -> Result<BigUint> {
        if values.len() > self.capacity() {
            return Err(ZkError::invalid(format!(
                "cannot commit to {} values with {} generators",
                values.len(),
                self.capacity()
            )));
        }
        let p = &self.group.p;
        let mut acc = self.group.exp(&self.generators[0], &(r % p));
        for (g, v) in self.generators[1..].iter().zip(values) {
            if v.bits() == 0 {
                continue;
            }
            acc = self.group.mul(&acc, &self.group.exp(g, &(v % p)));
        }
        Ok(acc)
    }

    /// Commit to a sparse row, skipping zero cells
    pub fn commit_row(&self, m: &SparseMatrix, row: usize, r: &BigUint) -> Result<BigUint> {
        if m.cols() > self.capacity() {
            return Err(ZkError::invalid(format!(
                "row width {} exceeds commitment capacity {}",
                m.cols(),
                self.capacity()
            )));
        }
        let p = &self.group.p;
        let mut acc = self.group.exp(&self.generators[0], &(r % p));
        for (j, v) in m.row_entries(row) {
            acc = self
                .group
                .mul(&acc, &self.group.exp(&self.generators[j + 1], &(v % p)));
        }
        Ok(acc)
    }

    /// One commitment per row of `t`, blinded by `randomness[row]`
    pub fn commit_matrix(&self, t: &SparseMatrix, randomness: &[BigUint]) -> Result<Vec<BigUint>> {
        if randomness.len() != t.rows() {
            return Err(ZkError::invalid(format!(
                "{} rows but {} blinding values",
                t.rows(),
                randomness.len()
            )));
        }
        (0..t.rows())
            .map(|i| self.commit_row(t, i, &randomness[i]))
            .collect()
    }

    /// Opening at Z(x): `Z·T` (one value per column) followed by `Z·r`
    pub fn eval(&self, t: &SparseMatrix, randomness: &[BigUint], z: &[BigUint]) -> Result<Vec<BigUint>> {
        if z.len() != t.rows() || randomness.len() != t.rows() {
            return Err(ZkError::invalid(format!(
                "evaluation vector length {} does not match {} committed rows",
                z.len(),
                t.rows()
            )));
        }
        let weights = SparseMatrix::from_row(z.to_vec())?;
        let combined = weights.dot(&t.transpose(), &self.field)?;
        let mut out = combined.row(0);
        out.push(self.field.inner_product(z, randomness));
        Ok(out)
    }

    /// Check an opening against row commitments
    ///
    /// Recomputes the commitment of the opened values directly and as
    /// `Π pc_i^(z_i)`; both must agree.
    pub fn verify(&self, pc: &[BigUint], opening: &[BigUint], z: &[BigUint]) -> Result<bool> {
        if pc.len() != z.len() {
            return Err(ZkError::invalid(format!(
                "{} commitments but {} evaluation powers",
                pc.len(),
                z.len()
            )));
        }
        let (r, values) = opening
            .split_last()
            .ok_or_else(|| ZkError::invalid("empty opening"))?;
        let direct = self.commit(values, r)?;
        let combined = self.combine(pc.iter().zip(z))?;
        trace!("polynomial commitment opening checked over {} rows", pc.len());
        Ok(self.elements_match(&direct, &combined))
    }

    /// `Π base^(exp mod p) mod Q`
    pub fn combine<'a, I>(&self, terms: I) -> Result<BigUint>
    where
        I: IntoIterator<Item = (&'a BigUint, &'a BigUint)>,
    {
        let mut acc = BigUint::one();
        for (base, exp) in terms {
            if base >= &self.group.q {
                return Err(ZkError::invalid("commitment outside the group"));
            }
            acc = self
                .group
                .mul(&acc, &self.group.exp(base, &(exp % &self.group.p)));
        }
        Ok(acc)
    }

    /// Constant-time comparison of two group elements
    pub fn elements_match(&self, a: &BigUint, b: &BigUint) -> bool {
        let width = self.group.element_bytes();
        let a = to_fixed_bytes(a, width);
        let b = to_fixed_bytes(b, width);
        a.len() == b.len() && bool::from(a.ct_eq(&b))
    }
}

fn derive_generators(group: &GroupParams, capacity: usize, domain: &[u8]) -> Vec<BigUint> {
    let cofactor = (&group.q - 1u32) / &group.p;
    let width = group.element_bytes() + 16;
    let mut gens = Vec::with_capacity(capacity + 1);
    let mut counter = 0u64;
    while gens.len() <= capacity {
        let mut t = Transcript::new(GENERATOR_LABEL);
        t.append_bytes(domain);
        t.append_bytes(&counter.to_be_bytes());
        counter += 1;
        let h = BigUint::from_bytes_be(&t.expand(width)) % &group.q;
        let g = group.exp(&h, &cofactor);
        if g.bits() > 1 && !gens.contains(&g) {
            gens.push(g);
        }
    }
    gens
}
