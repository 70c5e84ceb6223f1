//! Verifier side of the circuit argument

use log::{debug, trace};
use num_bigint::BigUint;
use num_traits::Zero;

use super::challenge::{ChallengeContext, ConstraintWeights};
use super::{generators_required, LinearConstraints, ProtocolStage};
use crate::commitment::{CommitmentShape, PolynomialCommitment};
use crate::error::{Result, ZkError};
use crate::field::{to_hex, Field, GroupParams};
use crate::instrument::{observe, SharedObserver};
use crate::matrix::SparseMatrix;
use crate::polynomial::Polynomial;
use crate::transcript::{Transcript, CHALLENGE_X, CHALLENGE_Y};

/// Checks a proof of satisfiability for a fixed constraint system
///
/// The verifier only ever sees public data: the linear constraints, the
/// commitments and the opened proof vector.
#[derive(Clone)]
pub struct CircuitZkpVerifier {
    commitment: PolynomialCommitment,
    field: Field,
    constraints: LinearConstraints,
    m: usize,
    n: usize,
    shape: CommitmentShape,
    commits: Option<Vec<BigUint>>,
    y: Option<BigUint>,
    poly_commits: Option<Vec<BigUint>>,
    x: Option<BigUint>,
    verdict: Option<bool>,
    observer: Option<SharedObserver>,
}

impl std::fmt::Debug for CircuitZkpVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitZkpVerifier")
            .field("m", &self.m)
            .field("n", &self.n)
            .field("linear_count", &self.constraints.len())
            .field("shape", &self.shape)
            .field("stage", &self.stage())
            .finish()
    }
}

impl CircuitZkpVerifier {
    /// Verifier over `group` with sequential generators
    ///
    /// The witness shape `(m, n)` is read from the constraint matrices.
    pub fn new(group: GroupParams, constraints: LinearConstraints) -> Result<Self> {
        let (m, n) = witness_shape(&constraints)?;
        let commitment = PolynomialCommitment::new(group, generators_required(m, n))?;
        Self::with_commitment(commitment, constraints)
    }

    /// Verifier using an existing commitment scheme
    pub fn with_commitment(commitment: PolynomialCommitment, constraints: LinearConstraints) -> Result<Self> {
        let (m, n) = witness_shape(&constraints)?;
        constraints.validate(m, n)?;
        let needed = generators_required(m, n);
        if commitment.capacity() < needed {
            return Err(ZkError::invalid(format!(
                "commitment supports {} values, {m}x{n} witness needs {needed}",
                commitment.capacity()
            )));
        }
        let shape = CommitmentShape::for_rows(m);
        debug!(
            "circuit verifier: m={m} n={n} Q={} commitment rows={}",
            constraints.len(),
            shape.row_count()
        );
        Ok(Self {
            field: commitment.field().clone(),
            commitment,
            constraints,
            m,
            n,
            shape,
            commits: None,
            y: None,
            poly_commits: None,
            x: None,
            verdict: None,
            observer: None,
        })
    }

    /// Report phase timings to `observer`
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub(crate) fn observer(&self) -> Option<&SharedObserver> {
        self.observer.as_ref()
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of linear constraints Q
    pub fn linear_count(&self) -> usize {
        self.constraints.len()
    }

    /// M = N + m where N = m·n
    pub fn big_m(&self) -> usize {
        self.m * self.n + self.m
    }

    pub fn shape(&self) -> CommitmentShape {
        self.shape
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn commitment(&self) -> &PolynomialCommitment {
        &self.commitment
    }

    pub fn constraints(&self) -> &LinearConstraints {
        &self.constraints
    }

    /// Length of a well-formed proof vector
    pub fn proof_len(&self) -> usize {
        self.shape.n + 1 + self.n + 1
    }

    pub fn stage(&self) -> ProtocolStage {
        if self.verdict.is_some() {
            ProtocolStage::Verified
        } else if self.x.is_some() {
            ProtocolStage::ChallengeXFixed
        } else if self.poly_commits.is_some() {
            ProtocolStage::PolyCommitReceived
        } else if self.y.is_some() {
            ProtocolStage::ChallengeYFixed
        } else if self.commits.is_some() {
            ProtocolStage::CommitsReceived
        } else {
            ProtocolStage::Constructed
        }
    }

    /// Outcome of the last [`verify`](Self::verify)
    pub fn verdict(&self) -> Option<bool> {
        self.verdict
    }

    pub fn commits(&self) -> Option<&[BigUint]> {
        self.commits.as_deref()
    }

    pub fn poly_commits(&self) -> Option<&[BigUint]> {
        self.poly_commits.as_deref()
    }

    /// Accept the A/B/C/D commitments (3m+1 elements)
    ///
    /// Everything received or derived afterwards is discarded.
    pub fn set_commits(&mut self, commits: Vec<BigUint>) -> Result<()> {
        let expected = 3 * self.m + 1;
        if commits.len() != expected {
            return Err(ZkError::invalid(format!(
                "expected {expected} commitments, got {}",
                commits.len()
            )));
        }
        self.commits = Some(commits);
        self.y = None;
        self.poly_commits = None;
        self.x = None;
        self.verdict = None;
        Ok(())
    }

    /// Accept the polynomial commitment (m1+m2+1 elements)
    pub fn set_poly_commits(&mut self, pc: Vec<BigUint>) -> Result<()> {
        if self.commits.is_none() {
            return Err(ZkError::Protocol(
                "polynomial commitment received before the witness commitments".into(),
            ));
        }
        let expected = self.shape.row_count();
        if pc.len() != expected {
            return Err(ZkError::invalid(format!(
                "expected {expected} polynomial commitments, got {}",
                pc.len()
            )));
        }
        self.poly_commits = Some(pc);
        self.x = None;
        self.verdict = None;
        Ok(())
    }

    /// y = H(cD, cA_1, cB_1, cC_1, …, cA_m, cB_m, cC_m)
    pub fn calculate_y(&mut self) -> Result<BigUint> {
        let commits = self
            .commits
            .as_ref()
            .ok_or_else(|| ZkError::Protocol("y requested before commitments were received".into()))?;
        let m = self.m;
        let width = self.commitment.group().element_bytes();
        let mut t = Transcript::new(CHALLENGE_Y);
        t.append_element(&commits[3 * m], width);
        for i in 0..m {
            t.append_element(&commits[i], width);
            t.append_element(&commits[m + i], width);
            t.append_element(&commits[2 * m + i], width);
        }
        let y = t.challenge_scalar(&self.field);
        debug!("challenge y = {}", short_hex(&y));
        self.y = Some(y.clone());
        Ok(y)
    }

    /// x = H(pc_0, …, pc_(m1+m2))
    pub fn calculate_x(&mut self) -> Result<BigUint> {
        let pc = self.poly_commits.as_ref().ok_or_else(|| {
            ZkError::Protocol("x requested before the polynomial commitment was received".into())
        })?;
        let width = self.commitment.group().element_bytes();
        let mut t = Transcript::new(CHALLENGE_X);
        t.append_elements(pc, width);
        let x = t.challenge_scalar(&self.field);
        debug!("challenge x = {}", short_hex(&x));
        self.x = Some(x.clone());
        Ok(x)
    }

    /// Powers of `y` for this constraint system
    pub fn challenge_context(&self, y: &BigUint) -> Result<ChallengeContext> {
        ChallengeContext::new(y, self.m, self.n, self.constraints.len(), &self.field)
    }

    /// Constraints folded under `ctx`
    pub fn weights(&self, ctx: &ChallengeContext) -> Result<ConstraintWeights> {
        ConstraintWeights::fold(&self.constraints, ctx, &self.field)
    }

    /// s(X) = Σ Wai·y^-i·X^-i + Σ Wbi·X^i + Σ Wci·X^(-m-i)
    pub fn create_sx(&self, ctx: &ChallengeContext, weights: &ConstraintWeights) -> Result<Polynomial> {
        let m = self.m as i64;
        let mut sx = Polynomial::new(1, self.n)?;
        let mut y_inv_i = BigUint::from(1u32);
        for i in 1..=self.m {
            y_inv_i = self.field.mul(&y_inv_i, ctx.y_inv());
            let d = i as i64;
            sx.put(-d, weights.wai(i).scale(&y_inv_i, &self.field))?;
            sx.put(d, weights.wbi(i))?;
            sx.put(-m - d, weights.wci(i))?;
        }
        Ok(sx)
    }

    /// Check a proof vector against the received commitments
    ///
    /// Any failure, including malformed input, yields `false`.
    pub fn verify(&mut self, proofs: &[BigUint], y: &BigUint, x: &BigUint) -> bool {
        let observer = self.observer.clone();
        let accepted = observe(observer.as_ref(), "verifier.verify", || {
            match self.check(proofs, y, x) {
                Ok(ok) => ok,
                Err(e) => {
                    debug!("proof rejected: {e}");
                    false
                }
            }
        });
        self.verdict = Some(accepted);
        accepted
    }

    fn check(&self, proofs: &[BigUint], y: &BigUint, x: &BigUint) -> Result<bool> {
        let (commits, pc) = match (&self.commits, &self.poly_commits) {
            (Some(c), Some(pc)) => (c, pc),
            _ => {
                return Err(ZkError::Protocol(
                    "verify called before both commitments were received".into(),
                ))
            }
        };
        if proofs.len() != self.proof_len() {
            debug!(
                "proof rejected: length {} instead of {}",
                proofs.len(),
                self.proof_len()
            );
            return Ok(false);
        }
        if !proofs.iter().all(|v| self.field.contains(v)) {
            debug!("proof rejected: value not reduced mod p");
            return Ok(false);
        }
        let group = self.commitment.group();
        if !commits.iter().chain(pc).all(|c| group.is_element(c)) {
            debug!("proof rejected: commitment outside [1, Q)");
            return Ok(false);
        }

        let field = &self.field;
        let tx_n = self.shape.n;
        let (opening, rest) = proofs.split_at(tx_n + 1);
        let (r_values, rr) = rest.split_at(self.n);
        let rr = &rr[0];
        let x = field.reduce(x);
        if !field.is_unit(&x) {
            return Err(ZkError::NotInvertible("challenge x".into()));
        }

        // 1. polynomial commitment opening
        let z = self.shape.evaluation_powers(&x, field)?;
        if !self.commitment.verify(pc, opening, &z)? {
            debug!("proof rejected: polynomial commitment opening mismatch");
            return Ok(false);
        }

        // 2. t(x) from the opening against r(x)·r′(x) − 2K
        let x_powers = field.power_vector(&x, tx_n);
        let v1 = field.inner_product(&opening[..tx_n], &x_powers);

        let ctx = self.challenge_context(y)?;
        let weights = self.weights(&ctx)?;
        let sx = self.create_sx(&ctx, &weights)?;
        let s_at_x = sx.eval(&x, field)?;
        let r_at_x = SparseMatrix::from_row(r_values.iter().map(|v| field.reduce(v)).collect())?;
        let two = BigUint::from(2u32);
        let r_prime = r_at_x
            .hadamard(ctx.y_prime(), field)?
            .add(&s_at_x.scale(&two, field), field)?;
        let rr_prime = r_at_x.dot(&r_prime, field)?.get(0, 0);
        let v2 = field.sub(&rr_prime, &field.mul(&two, weights.k()));
        trace!("t(x) from opening and from r(x) compared");
        if v1 != v2 {
            debug!("proof rejected: t(x) does not match r(x)·r′(x) − 2K");
            return Ok(false);
        }

        // 3. r(x) against the witness commitments
        let direct = self.commitment.commit(r_at_x.row(0).as_slice(), rr)?;
        let exponents = self.commit_exponents(commits, &ctx, &x)?;
        let combined = self
            .commitment
            .combine(exponents.iter().map(|(c, e)| (*c, e)))?;
        if !self.commitment.elements_match(&direct, &combined) {
            debug!("proof rejected: r(x) does not open the witness commitments");
            return Ok(false);
        }
        Ok(true)
    }

    /// Pairs `(commitment, exponent)` whose product commits to r(x)
    fn commit_exponents<'a>(
        &self,
        commits: &'a [BigUint],
        ctx: &ChallengeContext,
        x: &BigUint,
    ) -> Result<Vec<(&'a BigUint, BigUint)>> {
        let field = &self.field;
        let m = self.m;
        let mut out = Vec::with_capacity(commits.len());
        for i in 1..=m {
            let d = i as i64;
            let xa = field.mul(&field.pow_signed(x, d)?, ctx.y_power(i));
            out.push((&commits[i - 1], xa));
            out.push((&commits[m + i - 1], field.pow_signed(x, -d)?));
            out.push((&commits[2 * m + i - 1], field.pow_signed(x, (m + i) as i64)?));
        }
        out.push((&commits[3 * m], field.pow_signed(x, (2 * m + 1) as i64)?));
        Ok(out)
    }
}

/// Witness shape from the first constraint's weight matrices
fn witness_shape(constraints: &LinearConstraints) -> Result<(usize, usize)> {
    let first = constraints
        .wqa
        .first()
        .ok_or_else(|| ZkError::invalid("constraint system has no linear constraints"))?;
    Ok((first.rows(), first.cols()))
}

fn short_hex(v: &BigUint) -> String {
    if v.is_zero() {
        return "0".into();
    }
    let hex = to_hex(v);
    hex.chars().take(16).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> GroupParams {
        GroupParams::from_u64(607, 101, 8).unwrap()
    }

    fn constraints(m: usize, n: usize, count: usize) -> LinearConstraints {
        let mut lc = LinearConstraints::new();
        for _ in 0..count {
            let w = SparseMatrix::new(m, n).unwrap();
            lc.push(w.clone(), w.clone(), w, BigUint::zero());
        }
        lc
    }

    #[test]
    fn test_shape_from_constraints() {
        let v = CircuitZkpVerifier::new(group(), constraints(2, 3, 6)).unwrap();
        assert_eq!((v.m(), v.n(), v.linear_count()), (2, 3, 6));
        assert_eq!(v.big_m(), 8);
        assert_eq!(v.proof_len(), 4 + 1 + 3 + 1);
        assert_eq!(v.stage(), ProtocolStage::Constructed);
    }

    #[test]
    fn test_empty_constraints_rejected() {
        assert!(CircuitZkpVerifier::new(group(), LinearConstraints::new()).is_err());
    }

    #[test]
    fn test_commit_counts_enforced() {
        let mut v = CircuitZkpVerifier::new(group(), constraints(2, 3, 6)).unwrap();
        assert!(matches!(v.calculate_y(), Err(ZkError::Protocol(_))));
        assert!(v.set_commits(vec![BigUint::from(8u32); 6]).is_err());
        assert!(matches!(
            v.set_poly_commits(vec![BigUint::from(8u32); 6]),
            Err(ZkError::Protocol(_))
        ));
        v.set_commits(vec![BigUint::from(8u32); 7]).unwrap();
        assert_eq!(v.stage(), ProtocolStage::CommitsReceived);
        v.calculate_y().unwrap();
        assert_eq!(v.stage(), ProtocolStage::ChallengeYFixed);
        assert!(v.set_poly_commits(vec![BigUint::from(8u32); 5]).is_err());
        v.set_poly_commits(vec![BigUint::from(8u32); 6]).unwrap();
        assert_eq!(v.stage(), ProtocolStage::PolyCommitReceived);
        v.calculate_x().unwrap();
        assert_eq!(v.stage(), ProtocolStage::ChallengeXFixed);
    }

    #[test]
    fn test_malformed_proof_is_false() {
        let mut v = CircuitZkpVerifier::new(group(), constraints(2, 3, 6)).unwrap();
        let one = BigUint::from(1u32);
        // no commitments yet
        assert!(!v.verify(&vec![one.clone(); 9], &one, &one));
        v.set_commits(vec![BigUint::from(8u32); 7]).unwrap();
        v.set_poly_commits(vec![BigUint::from(8u32); 6]).unwrap();
        assert!(!v.verify(&vec![one.clone(); 3], &one, &one));
        assert_eq!(v.stage(), ProtocolStage::Verified);
        assert_eq!(v.verdict(), Some(false));
    }

    #[test]
    fn test_create_sx_degrees() {
        let f = Field::new(BigUint::from(101u32)).unwrap();
        let mut lc = constraints(2, 3, 1);
        lc.wqa[0].set(1, 2, BigUint::from(1u32)).unwrap();
        let v = CircuitZkpVerifier::new(group(), lc).unwrap();
        let ctx = v.challenge_context(&BigUint::from(5u32)).unwrap();
        let w = v.weights(&ctx).unwrap();
        let sx = v.create_sx(&ctx, &w).unwrap();
        // Wa only in row 2 -> X^-2; Wc always non-zero -> X^-3, X^-4
        assert_eq!(sx.lsd(), Some(-4));
        assert_eq!(sx.msd(), Some(-2));
        assert!(sx.coefficient(-1).is_none());
        let coeff = sx.get(-2).get(0, 2);
        let expected = f.mul(&f.pow_u64(&BigUint::from(5u32), 9), &f.inv(&BigUint::from(25u32)).unwrap());
        assert_eq!(coeff, expected);
    }
}
