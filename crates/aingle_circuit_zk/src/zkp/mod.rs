//! Zero-knowledge argument for arithmetic circuit satisfiability
//!
//! The statement is a set of `N = m·n` multiplication gates `A ∘ B = C`
//! laid out as `m × n` matrices, plus `Q` linear constraints
//! `Wqa·A + Wqb·B + Wqc·C = Kq`. The exchange is
//!
//! ```text
//!   Prover                                   Verifier
//!   commit()           ── commits (3m+1) ──▶  set_commits
//!                                             y = H(commits)
//!   poly_commit(y)     ── pc (m1+m2+1) ────▶  set_poly_commits
//!                                             x = H(pc)
//!   prove(y, x)        ── proofs ──────────▶  verify(proofs, y, x) -> bool
//! ```
//!
//! Both sides derive y and x themselves, so the exchange is non-interactive.

pub mod challenge;
pub mod prover;
pub mod verifier;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::commitment::CommitmentShape;
use crate::error::{Result, ZkError};
use crate::field::ceil_sqrt;
use crate::matrix::SparseMatrix;

pub use challenge::{ChallengeContext, ConstraintWeights};
pub use prover::CircuitZkpProver;
pub use verifier::CircuitZkpVerifier;

/// Witness matrix shape `(m, n)` for `gate_count` gates: n = ⌈√N⌉, m = ⌈N/n⌉
pub fn calc_mn(gate_count: usize) -> (usize, usize) {
    let n = ceil_sqrt(gate_count.max(1));
    (gate_count.max(1).div_ceil(n), n)
}

/// Generators needed to commit to witness rows and t(X) rows
pub fn generators_required(m: usize, n: usize) -> usize {
    CommitmentShape::for_rows(m).n.max(n)
}

/// Where a verifier stands in the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProtocolStage {
    /// Shape fixed, nothing received
    Constructed,
    /// A/B/C/D commitments received
    CommitsReceived,
    /// y derived from the commitments
    ChallengeYFixed,
    /// Polynomial commitment received
    PolyCommitReceived,
    /// x derived from the polynomial commitment
    ChallengeXFixed,
    /// A proof has been checked
    Verified,
}

/// Linear constraints `Wqa[q]·A + Wqb[q]·B + Wqc[q]·C = Kq[q]`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinearConstraints {
    pub wqa: Vec<SparseMatrix>,
    pub wqb: Vec<SparseMatrix>,
    pub wqc: Vec<SparseMatrix>,
    pub kq: Vec<BigUint>,
}

impl LinearConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of constraints
    pub fn len(&self) -> usize {
        self.kq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kq.is_empty()
    }

    /// Append one constraint
    pub fn push(&mut self, wa: SparseMatrix, wb: SparseMatrix, wc: SparseMatrix, k: BigUint) {
        self.wqa.push(wa);
        self.wqb.push(wb);
        self.wqc.push(wc);
        self.kq.push(k);
    }

    /// Check that every weight matrix has shape `rows × cols`
    pub fn validate(&self, rows: usize, cols: usize) -> Result<()> {
        let q = self.kq.len();
        if self.wqa.len() != q || self.wqb.len() != q || self.wqc.len() != q {
            return Err(ZkError::invalid(format!(
                "constraint lists disagree: {} / {} / {} weights for {} constants",
                self.wqa.len(),
                self.wqb.len(),
                self.wqc.len(),
                q
            )));
        }
        let all = self.wqa.iter().chain(&self.wqb).chain(&self.wqc);
        for (idx, w) in all.enumerate() {
            if w.rows() != rows || w.cols() != cols {
                return Err(ZkError::invalid(format!(
                    "weight matrix {idx} is {}x{}, expected {rows}x{cols}",
                    w.rows(),
                    w.cols()
                )));
            }
        }
        Ok(())
    }

    /// Nested decimal-string dump
    pub fn to_json(&self) -> serde_json::Value {
        let dump = |ws: &[SparseMatrix]| {
            serde_json::Value::Array(ws.iter().map(SparseMatrix::to_json).collect())
        };
        serde_json::json!({
            "Wqa": dump(self.wqa.as_slice()),
            "Wqb": dump(self.wqb.as_slice()),
            "Wqc": dump(self.wqc.as_slice()),
            "Kq": self.kq.iter().map(|k| k.to_str_radix(10)).collect::<Vec<_>>(),
        })
    }
}
