//! Prover side of the circuit argument

use log::{debug, trace};
use num_bigint::BigUint;
use num_traits::Zero;
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};

use super::verifier::CircuitZkpVerifier;
use crate::error::{Result, ZkError};
use crate::instrument::{observe, SharedObserver};
use crate::matrix::SparseMatrix;
use crate::polynomial::Polynomial;

/// Blinding chosen in [`CircuitZkpProver::commit`]
struct Blinding {
    rand_a: Vec<BigUint>,
    rand_b: Vec<BigUint>,
    rand_c: Vec<BigUint>,
    d: SparseMatrix,
    rand_d: BigUint,
}

/// State kept between the polynomial commitment and its opening
struct Opening {
    y: BigUint,
    r: Polynomial,
    t: SparseMatrix,
    randomness: Vec<BigUint>,
}

/// Proves knowledge of A, B, C with A∘B = C satisfying the linear constraints
///
/// Holds its own copy of the verifier, so challenges are derived exactly as
/// the other side derives them.
pub struct CircuitZkpProver {
    zkp: CircuitZkpVerifier,
    a: SparseMatrix,
    b: SparseMatrix,
    c: SparseMatrix,
    blinding: Option<Blinding>,
    opening: Option<Opening>,
}

impl std::fmt::Debug for CircuitZkpProver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitZkpProver")
            .field("zkp", &self.zkp)
            .field("committed", &self.blinding.is_some())
            .field("poly_committed", &self.opening.is_some())
            .finish_non_exhaustive()
    }
}

impl CircuitZkpProver {
    /// Prover for the witness `a`, `b`, `c`, each `m × n`
    pub fn new(
        zkp: CircuitZkpVerifier,
        a: SparseMatrix,
        b: SparseMatrix,
        c: SparseMatrix,
    ) -> Result<Self> {
        let (m, n) = (zkp.m(), zkp.n());
        for (name, w) in [("A", &a), ("B", &b), ("C", &c)] {
            if w.rows() != m || w.cols() != n {
                return Err(ZkError::invalid(format!(
                    "witness {name} is {}x{}, constraints expect {m}x{n}",
                    w.rows(),
                    w.cols()
                )));
            }
        }
        Ok(Self {
            zkp,
            a,
            b,
            c,
            blinding: None,
            opening: None,
        })
    }

    /// Report phase timings to `observer`
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.zkp = self.zkp.with_observer(observer);
        self
    }

    /// The prover's own verifier view
    pub fn zkp(&self) -> &CircuitZkpVerifier {
        &self.zkp
    }

    pub fn zkp_mut(&mut self) -> &mut CircuitZkpVerifier {
        &mut self.zkp
    }

    /// Commit to the rows of A, B, C and a random row D
    ///
    /// Returns `cA_1..cA_m, cB_1..cB_m, cC_1..cC_m, cD`.
    pub fn commit(&mut self) -> Result<Vec<BigUint>> {
        self.commit_with_rng(&mut OsRng)
    }

    pub fn commit_with_rng<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<Vec<BigUint>> {
        let observer = self.zkp.observer().cloned();
        observe(observer.as_ref(), "prover.commit", || self.commit_inner(&mut *rng))
    }

    fn commit_inner<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<Vec<BigUint>> {
        let (m, n) = (self.zkp.m(), self.zkp.n());
        let field = self.zkp.field().clone();
        let scheme = self.zkp.commitment();

        let mut sample = |len: usize| (0..len).map(|_| field.random(&mut *rng)).collect::<Vec<_>>();
        let rand_a = sample(m);
        let rand_b = sample(m);
        let rand_c = sample(m);
        let d = SparseMatrix::from_row(sample(n))?;
        let rand_d = field.random(rng);

        let mut commits = Vec::with_capacity(3 * m + 1);
        for (w, rand) in [(&self.a, &rand_a), (&self.b, &rand_b), (&self.c, &rand_c)] {
            for (i, r) in rand.iter().enumerate() {
                commits.push(scheme.commit_row(w, i, r)?);
            }
        }
        commits.push(scheme.commit_row(&d, 0, &rand_d)?);
        debug!("prover committed to {m} witness rows per wire");

        self.zkp.set_commits(commits.clone())?;
        self.blinding = Some(Blinding {
            rand_a,
            rand_b,
            rand_c,
            d,
            rand_d,
        });
        self.opening = None;
        Ok(commits)
    }

    /// Commit to t(X) = r(X)·r′(X) − 2K(y)
    ///
    /// Fails with [`ZkError::InconsistentWitness`] when the constant term of
    /// t(X) is non-zero, i.e. the witness does not satisfy the constraints.
    pub fn poly_commit(&mut self, y: &BigUint) -> Result<Vec<BigUint>> {
        self.poly_commit_with_rng(y, &mut OsRng)
    }

    pub fn poly_commit_with_rng<R: RngCore + CryptoRng>(
        &mut self,
        y: &BigUint,
        rng: &mut R,
    ) -> Result<Vec<BigUint>> {
        let observer = self.zkp.observer().cloned();
        observe(observer.as_ref(), "prover.poly_commit", || {
            self.poly_commit_inner(y, &mut *rng)
        })
    }

    fn poly_commit_inner<R: RngCore + CryptoRng>(
        &mut self,
        y: &BigUint,
        rng: &mut R,
    ) -> Result<Vec<BigUint>> {
        let blinding = self
            .blinding
            .as_ref()
            .ok_or_else(|| ZkError::Protocol("poly_commit called before commit".into()))?;
        let zkp = &self.zkp;
        let field = zkp.field();
        let m = zkp.m();
        let mi = m as i64;

        let ctx = zkp.challenge_context(y)?;
        let weights = zkp.weights(&ctx)?;

        let mut r = Polynomial::new(1, zkp.n())?;
        for i in 1..=m {
            let d = i as i64;
            r.put(d, self.a.row_matrix(i - 1).scale(ctx.y_power(i), field))?;
            r.put(-d, self.b.row_matrix(i - 1))?;
            r.put(mi + d, self.c.row_matrix(i - 1))?;
        }
        r.put(2 * mi + 1, blinding.d.clone())?;

        let sx = zkp.create_sx(&ctx, &weights)?;
        let r_prime = r
            .hadamard(ctx.y_prime(), field)?
            .add(&sx.scale(&BigUint::from(2u32), field), field)?;
        let t = r.mul(&r_prime, field)?;

        let two_k = field.mul(&BigUint::from(2u32), weights.k());
        let t0 = field.sub(&t.get(0).get(0, 0), &two_k);
        if !t0.is_zero() {
            return Err(ZkError::InconsistentWitness(
                "constant term of t(X) is non-zero".into(),
            ));
        }
        trace!(
            "t(X) spans degrees {:?}..{:?}",
            t.lsd(),
            t.msd()
        );

        let shape = zkp.shape();
        let tx_n = shape.n;
        let mut tm = SparseMatrix::new(shape.row_count(), tx_n)?;
        for (d, coeff) in t.terms() {
            let v = coeff.get(0, 0);
            let (row, col) = if d < 0 {
                let k = usize::try_from(d + (shape.m1 * tx_n) as i64)
                    .map_err(|_| ZkError::invalid(format!("t(X) degree {d} below the committed band")))?;
                (k / tx_n, k % tx_n)
            } else if d > 0 {
                let k = (d - 1) as usize;
                (shape.m1 + k / tx_n, k % tx_n)
            } else {
                continue;
            };
            if row >= shape.m1 + shape.m2 {
                return Err(ZkError::invalid(format!(
                    "t(X) degree {d} above the committed band"
                )));
            }
            tm.set(row, col, v)?;
        }

        // masking row u, cancelled inside the first positive row
        let mask_row = shape.m1 + shape.m2;
        for j in 0..tx_n - 1 {
            let u = field.random_nonzero(rng);
            let shifted = field.sub(&tm.get(shape.m1, j + 1), &u);
            tm.set(shape.m1, j + 1, shifted)?;
            tm.set(mask_row, j, u)?;
        }

        let randomness: Vec<BigUint> = (0..shape.row_count()).map(|_| field.random(&mut *rng)).collect();
        let pc = zkp.commitment().commit_matrix(&tm, &randomness)?;
        debug!("prover committed to t(X) in {} rows", pc.len());

        self.zkp.set_poly_commits(pc.clone())?;
        self.opening = Some(Opening {
            y: ctx.y().clone(),
            r,
            t: tm,
            randomness,
        });
        Ok(pc)
    }

    /// Open t(X) and r(X) at `x`
    ///
    /// Returns `Z(x)·T ++ Z(x)·randomness ++ r(x) ++ blinding of r(x)`.
    pub fn prove(&self, y: &BigUint, x: &BigUint) -> Result<Vec<BigUint>> {
        observe(self.zkp.observer(), "prover.prove", || self.prove_inner(y, x))
    }

    fn prove_inner(&self, y: &BigUint, x: &BigUint) -> Result<Vec<BigUint>> {
        let (blinding, opening) = match (&self.blinding, &self.opening) {
            (Some(b), Some(o)) => (b, o),
            _ => {
                return Err(ZkError::Protocol(
                    "prove called before commit and poly_commit".into(),
                ))
            }
        };
        let zkp = &self.zkp;
        let field = zkp.field();
        if field.reduce(y) != opening.y {
            return Err(ZkError::Protocol(
                "y differs from the one t(X) was committed under".into(),
            ));
        }
        let ctx = zkp.challenge_context(y)?;
        let x = field.reduce(x);
        let m = zkp.m();

        let z = zkp.shape().evaluation_powers(&x, field)?;
        let mut proofs = zkp.commitment().eval(&opening.t, &opening.randomness, &z)?;
        proofs.extend(opening.r.eval(&x, field)?.row(0));

        let mut rr = BigUint::zero();
        for i in 1..=m {
            let d = i as i64;
            let xa = field.mul(&field.pow_signed(&x, d)?, ctx.y_power(i));
            rr += field.mul(&blinding.rand_a[i - 1], &xa);
            rr += field.mul(&blinding.rand_b[i - 1], &field.pow_signed(&x, -d)?);
            rr += field.mul(&blinding.rand_c[i - 1], &field.pow_signed(&x, (m + i) as i64)?);
        }
        rr += field.mul(&blinding.rand_d, &field.pow_signed(&x, (2 * m + 1) as i64)?);
        proofs.push(field.reduce(&rr));

        trace!("proof vector of {} elements", proofs.len());
        Ok(proofs)
    }
}
