#![doc = include_str!("../README.md")]
//! # AIngle Circuit ZK
//!
//! Arithmetic-circuit zero-knowledge proofs that a batch of Paillier
//! ciphertexts encrypts well-formed slotted messages.
//!
//! ## Features
//!
//! - **Circuits**: multiplication gates with linear constraints over ℤ_p,
//!   composable by appending and shifting
//! - **Encryption circuit**: proves `C = (1 + mN)·r^N mod N²` for hidden m, r
//! - **Batch statement**: bit-valued slots, dense packing and randomized
//!   range checks across many encryptions
//! - **Circuit ZKP**: commit / challenge / prove protocol with a Pedersen
//!   polynomial commitment, made non-interactive with SHA-256
//! - **Aggregation**: weighted homomorphic slot sums over proven messages
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     AIngle Circuit ZK                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  protocol  │  circuit  │   zkp   │ commitment │ aggregation  │
//! └──────────────────────────────────────────────────────────────┘
//!        │           │          │           │             │
//!        ├─ prove    ├─ gates   ├─ commit   ├─ Pedersen   ├─ weights
//!        └─ verify   ├─ enc     ├─ y, x     └─ open       └─ slot sums
//!                    └─ batch   └─ verify
//!
//!  matrix · polynomial · field · transcript · paillier
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use aingle_circuit_zk::{Circuit, GroupParams, Wire};
//! use num_bigint::BigUint;
//!
//! // prove knowledge of a, b with a·b = 24 and a = 6
//! let group = GroupParams::from_u64(607, 101, 8)?;
//! let mut circuit = Circuit::new(group);
//! let g = circuit.add_gate();
//! let q = circuit.add_linear();
//! circuit.constrain_i64(q, Wire::C, g, 1)?;
//! circuit.set_constant(q, BigUint::from(24u32))?;
//! let q = circuit.add_linear();
//! circuit.constrain_i64(q, Wire::A, g, 1)?;
//! circuit.set_constant(q, BigUint::from(6u32))?;
//!
//! circuit.set_value(Wire::A, g, BigUint::from(6u32))?;
//! circuit.set_value(Wire::B, g, BigUint::from(4u32))?;
//! circuit.set_value(Wire::C, g, BigUint::from(24u32))?;
//! circuit.check_satisfied()?;
//!
//! let mut prover = circuit.into_prover()?;
//! let commits = prover.commit()?;
//! let y = prover.zkp_mut().calculate_y()?;
//! prover.poly_commit(&y)?;
//! let x = prover.zkp_mut().calculate_x()?;
//! let proofs = prover.prove(&y, &x)?;
//! assert_eq!(commits.len(), 3 * prover.zkp().m() + 1);
//! assert!(prover.zkp_mut().verify(&proofs, &y, &x));
//! # Ok::<(), aingle_circuit_zk::ZkError>(())
//! ```
//!
//! ## Security Considerations
//!
//! - Test groups (p = 101) and short Paillier keys are for tests only
//! - Big-integer arithmetic is not constant-time
//! - Never log or expose witness values, blinding rows or private keys
//! - Prover and verifier must agree on the [`GeneratorSetup`]
//!
//! ## Logging
//!
//! The crate logs through the `log` facade: protocol steps at `debug`,
//! per-row work at `trace`. Install any logger (for example `env_logger`)
//! in the embedding binary to see them.

pub mod aggregation;
pub mod circuit;
pub mod commitment;
pub mod config;
pub mod error;
pub mod field;
pub mod instrument;
pub mod matrix;
pub mod paillier;
pub mod polynomial;
pub mod protocol;
pub mod transcript;
pub mod zkp;

// Re-export main types
pub use aggregation::{Aggregator, SlotTotals};
pub use circuit::{
    BatchCiphertexts, BatchEncryptionCircuit, BatchLayout, Circuit, EncryptionCircuit, SlotLayout,
    Violation, Wire,
};
pub use commitment::{CommitmentShape, GeneratorSetup, PolynomialCommitment};
pub use config::BatchConfig;
pub use error::{Result, ZkError};
pub use field::{Field, GroupParams};
pub use instrument::{LogObserver, PhaseObserver, PhaseRecorder, SharedObserver};
pub use matrix::SparseMatrix;
pub use paillier::PaillierEncryption;
pub use polynomial::Polynomial;
pub use protocol::{BatchProof, BatchProver, BatchVerifier};
pub use zkp::{
    calc_mn, generators_required, CircuitZkpProver, CircuitZkpVerifier, LinearConstraints,
    ProtocolStage,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
