//! Weighted homomorphic aggregation of proven messages
//!
//! Once a batch proof has been accepted every `cm_i` is known to encrypt
//! 0/1 slots. An aggregator multiplies `cm_i^(w_i)` for random weights and
//! decrypts once: slot `r` of the result is `Σ w_i·bit_ir`. Weights are
//! small enough that no slot sum carries into its neighbour.
//!
//! ## Example
//!
//! ```rust
//! use aingle_circuit_zk::{Aggregator, BatchConfig, PaillierEncryption};
//! use num_bigint::BigUint;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(3);
//! let crypto = PaillierEncryption::generate_with_rng(8, &mut rng).unwrap();
//! let aggregator = Aggregator::new(crypto.clone(), &BatchConfig::test_mode()).unwrap();
//!
//! // four messages, slot 0 set in each
//! let cts: Vec<BigUint> = (0..4)
//!     .map(|_| {
//!         let r = crypto.pick_random_with_rng(&mut rng);
//!         crypto.encrypt(&BigUint::from(1u32), &r).unwrap()
//!     })
//!     .collect();
//! let weights = vec![BigUint::from(1u32); 4];
//! let totals = aggregator.aggregate(&cts, &weights).unwrap();
//! assert_eq!(totals.sums[0], BigUint::from(4u32));
//! assert_eq!(totals.averages[0], 1.0);
//! ```

use log::debug;
use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, ToPrimitive};
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::circuit::{BatchLayout, SlotLayout};
use crate::config::BatchConfig;
use crate::error::{Result, ZkError};
use crate::field::decimal_vec;
use crate::paillier::PaillierEncryption;

/// Decrypted per-slot totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotTotals {
    /// Σ w_i·bit_ir for each slot r
    #[serde(with = "decimal_vec")]
    pub sums: Vec<BigUint>,
    /// sums[r] / msg_count
    pub averages: Vec<f64>,
}

/// Combines and decrypts message ciphertexts slot-wise
#[derive(Debug, Clone)]
pub struct Aggregator {
    crypto: PaillierEncryption,
    slots: SlotLayout,
    msg_count: usize,
    weight_bits: usize,
}

impl Aggregator {
    /// Aggregator for messages laid out per `config`
    ///
    /// Decryption in [`aggregate`](Self::aggregate) needs the private key;
    /// a public handle can still [`combine`](Self::combine).
    pub fn new(crypto: PaillierEncryption, config: &BatchConfig) -> Result<Self> {
        let layout = BatchLayout::new(config, crypto.public_key())?;
        let slots = layout.slot_layout()?;
        let slot_max = (BigUint::one() << slots.slot_bits()) - 1u32;
        let weight_bits = ((slot_max / layout.msg_count as u64).bits() as usize).saturating_sub(1);
        if weight_bits == 0 {
            return Err(ZkError::Config(format!(
                "{} messages leave no room for weights in {}-bit slots",
                layout.msg_count,
                slots.slot_bits()
            )));
        }
        Ok(Self {
            crypto,
            slots,
            msg_count: layout.msg_count,
            weight_bits,
        })
    }

    /// Bit length of each weight
    pub fn weight_bits(&self) -> usize {
        self.weight_bits
    }

    pub fn random_weights(&self) -> Vec<BigUint> {
        self.random_weights_with_rng(&mut OsRng)
    }

    pub fn random_weights_with_rng<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Vec<BigUint> {
        (0..self.msg_count)
            .map(|_| rng.gen_biguint(self.weight_bits as u64))
            .collect()
    }

    /// Π cm_i^(w_i) mod N²
    pub fn combine(&self, cm: &[BigUint], weights: &[BigUint]) -> Result<BigUint> {
        if cm.len() != self.msg_count || weights.len() != self.msg_count {
            return Err(ZkError::invalid(format!(
                "expected {} ciphertexts and weights, got {} and {}",
                self.msg_count,
                cm.len(),
                weights.len()
            )));
        }
        if let Some(w) = weights.iter().find(|w| w.bits() as usize > self.weight_bits) {
            return Err(ZkError::invalid(format!(
                "weight {w} exceeds {} bits",
                self.weight_bits
            )));
        }
        Ok(cm
            .iter()
            .zip(weights)
            .fold(BigUint::one(), |acc, (c, w)| {
                self.crypto.add_ciphertexts(&acc, &self.crypto.mul(c, w))
            }))
    }

    /// Combine, decrypt and split into per-slot totals
    pub fn aggregate(&self, cm: &[BigUint], weights: &[BigUint]) -> Result<SlotTotals> {
        let combined = self.combine(cm, weights)?;
        let plain = self.crypto.decrypt(&combined)?;
        let sums = self.slots.split(&plain);
        let averages = sums
            .iter()
            .map(|s| s.to_f64().unwrap_or(f64::NAN) / self.msg_count as f64)
            .collect();
        debug!(
            "aggregated {} messages into {} slots",
            self.msg_count,
            sums.len()
        );
        Ok(SlotTotals { sums, averages })
    }
}
