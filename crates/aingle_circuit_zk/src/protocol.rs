//! End-to-end batch proving sessions
//!
//! [`BatchProver`] turns a list of slotted messages into ciphertexts plus a
//! non-interactive proof that they are well formed. [`BatchVerifier`]
//! rebuilds the public circuit from the ciphertexts and checks the proof.
//!
//! # Example
//!
//! ```no_run
//! use aingle_circuit_zk::{BatchConfig, BatchProver, BatchVerifier, PaillierEncryption};
//! # fn main() -> aingle_circuit_zk::Result<()> {
//! let config = BatchConfig::test_mode();
//! let crypto = PaillierEncryption::generate(config.key_bytes)?;
//!
//! let prover = BatchProver::new(crypto.clone(), config.clone())?;
//! let messages = prover.encode_messages(&vec![vec![true, false]; config.msg_count])?;
//! let proof = prover.prove(&messages)?;
//!
//! let verifier = BatchVerifier::new(crypto.to_public(), config)?;
//! assert!(verifier.verify(&proof));
//! # Ok(())
//! # }
//! ```

use log::debug;
use num_bigint::BigUint;
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::circuit::{BatchCiphertexts, BatchEncryptionCircuit};
use crate::commitment::GeneratorSetup;
use crate::config::BatchConfig;
use crate::error::Result;
use crate::field::{byte_len, decimal_vec};
use crate::instrument::{observe, SharedObserver};
use crate::paillier::PaillierEncryption;

/// Everything the verifier receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProof {
    pub ciphertexts: BatchCiphertexts,
    /// L_j, one per range proof
    #[serde(with = "decimal_vec")]
    pub lj: Vec<BigUint>,
    /// cA ++ cB ++ cC ++ cD
    #[serde(with = "decimal_vec")]
    pub commits: Vec<BigUint>,
    #[serde(with = "decimal_vec")]
    pub poly_commits: Vec<BigUint>,
    #[serde(with = "decimal_vec")]
    pub proofs: Vec<BigUint>,
}

impl BatchProof {
    /// Bytes on the wire with every element at its minimal big-endian width
    pub fn size_in_bytes(&self) -> usize {
        let cts = &self.ciphertexts;
        cts.cm
            .iter()
            .chain(&cts.cm_star)
            .chain(&cts.crj)
            .chain(&self.lj)
            .chain(&self.commits)
            .chain(&self.poly_commits)
            .chain(&self.proofs)
            .map(byte_len)
            .sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Produces batch proofs under one key and configuration
pub struct BatchProver {
    crypto: PaillierEncryption,
    config: BatchConfig,
    setup: GeneratorSetup,
    observer: Option<SharedObserver>,
}

impl BatchProver {
    pub fn new(crypto: PaillierEncryption, config: BatchConfig) -> Result<Self> {
        config.validate()?;
        // fail early on layouts the key cannot hold
        BatchEncryptionCircuit::new(crypto.to_public(), &config)?;
        Ok(Self {
            crypto,
            config,
            setup: GeneratorSetup::Sequential,
            observer: None,
        })
    }

    /// Commitment generators shared with the verifier
    pub fn with_setup(mut self, setup: GeneratorSetup) -> Self {
        self.setup = setup;
        self
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Messages whose slot `r` is 1 exactly when `flags[i][r]`
    pub fn encode_messages(&self, flags: &[Vec<bool>]) -> Result<Vec<BigUint>> {
        let batch = BatchEncryptionCircuit::new(self.crypto.to_public(), &self.config)?;
        let slots = batch.layout().slot_layout()?;
        flags.iter().map(|f| slots.encode(f)).collect()
    }

    pub fn prove(&self, messages: &[BigUint]) -> Result<BatchProof> {
        self.prove_with_rng(messages, &mut OsRng)
    }

    pub fn prove_with_rng<R: RngCore + CryptoRng>(
        &self,
        messages: &[BigUint],
        rng: &mut R,
    ) -> Result<BatchProof> {
        let obs = self.observer.as_ref();
        let mut batch = BatchEncryptionCircuit::new(self.crypto.clone(), &self.config)?;

        let ciphertexts = observe(obs, "batch.encrypt", || {
            batch.encrypt_with_rng(messages, &mut *rng)
        })?;
        let lj = observe(obs, "batch.wire_up", || -> Result<Vec<BigUint>> {
            let ljir = batch.calculate_ljir()?;
            let lj = batch.calculate_lj(&ljir)?;
            batch.wire_up(&ljir, &lj)?;
            Ok(lj)
        })?;
        observe(obs, "batch.run", || batch.run())?;

        let mut prover = batch.generate_prover_with(&self.setup)?;
        drop(batch);
        if let Some(o) = &self.observer {
            prover = prover.with_observer(o.clone());
        }

        let commits = prover.commit_with_rng(rng)?;
        let y = prover.zkp_mut().calculate_y()?;
        let poly_commits = prover.poly_commit_with_rng(&y, rng)?;
        let x = prover.zkp_mut().calculate_x()?;
        let proofs = prover.prove(&y, &x)?;
        drop(prover);

        let proof = BatchProof {
            ciphertexts,
            lj,
            commits,
            poly_commits,
            proofs,
        };
        debug!("batch proof produced: {} bytes", proof.size_in_bytes());
        Ok(proof)
    }
}

/// Checks batch proofs under one public key and configuration
pub struct BatchVerifier {
    crypto: PaillierEncryption,
    config: BatchConfig,
    setup: GeneratorSetup,
    observer: Option<SharedObserver>,
}

impl BatchVerifier {
    /// `crypto` only needs the public key
    pub fn new(crypto: PaillierEncryption, config: BatchConfig) -> Result<Self> {
        config.validate()?;
        BatchEncryptionCircuit::new(crypto.to_public(), &config)?;
        Ok(Self {
            crypto: crypto.to_public(),
            config,
            setup: GeneratorSetup::Sequential,
            observer: None,
        })
    }

    pub fn with_setup(mut self, setup: GeneratorSetup) -> Self {
        self.setup = setup;
        self
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Any malformed or inconsistent proof is rejected with `false`
    pub fn verify(&self, proof: &BatchProof) -> bool {
        match self.check(proof) {
            Ok(accepted) => accepted,
            Err(e) => {
                debug!("batch proof rejected: {e}");
                false
            }
        }
    }

    fn check(&self, proof: &BatchProof) -> Result<bool> {
        let obs = self.observer.as_ref();
        let mut batch = BatchEncryptionCircuit::new(self.crypto.clone(), &self.config)?;
        batch.set_ciphertexts(proof.ciphertexts.clone())?;
        observe(obs, "batch.wire_up", || -> Result<()> {
            let ljir = batch.calculate_ljir()?;
            batch.wire_up(&ljir, &proof.lj)
        })?;

        let mut zkp = batch.generate_verifier_with(&self.setup)?;
        if let Some(o) = &self.observer {
            zkp = zkp.with_observer(o.clone());
        }
        zkp.set_commits(proof.commits.clone())?;
        let y = zkp.calculate_y()?;
        zkp.set_poly_commits(proof.poly_commits.clone())?;
        let x = zkp.calculate_x()?;
        Ok(zkp.verify(&proof.proofs, &y, &x))
    }
}
