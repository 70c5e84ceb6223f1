//! Circuit for one Paillier encryption `C = (1 + mN)·r^N mod N²`
//!
//! Gate layout, for a modulus N with bit length ℓ and `s` set bits:
//!
//! ```text
//! gate 0            m · N = mN                    b_0 = N
//! gate 1            r · r = r²                    a_1 = b_1
//! gate i (2..ℓ-1)   r^(2^(i-1))² = r^(2^i)        a_i = b_i = c_(i-1)
//! s - 1 gates       running product of r^(2^i) over the set bits of N
//! last gate         (1 + mN) · r^N = C            a = c_0 + 1, c = C
//! ```
//!
//! That is `ℓ + s` gates and `2ℓ + 2s - 1` linear constraints in all. The
//! ciphertext only appears as the constant of the last constraint, so one
//! wired-up circuit serves every ciphertext under the same key via
//! [`EncryptionCircuit::update_cipher`].

use log::trace;
use num_bigint::BigUint;
use num_traits::{One, Zero};

use super::{Circuit, Wire};
use crate::error::{Result, ZkError};
use crate::field::GroupParams;

/// Square-and-multiply plan for r^N
#[derive(Debug, Clone, PartialEq, Eq)]
struct Ladder {
    max_pow: usize,
    set_bits: Vec<usize>,
}

impl Ladder {
    fn for_modulus(n: &BigUint) -> Result<Self> {
        let bits = n.bits() as usize;
        if bits < 3 {
            return Err(ZkError::invalid(format!(
                "modulus {n} is too small for the encryption circuit"
            )));
        }
        let set_bits = (0..bits).filter(|&i| n.bit(i as u64)).collect();
        Ok(Self {
            max_pow: bits - 1,
            set_bits,
        })
    }

    fn gate_count(&self) -> usize {
        self.max_pow + self.set_bits.len() + 1
    }

    /// Wire holding the left input of the k-th product gate (k ≥ 1)
    fn product_input(&self, k: usize, gate: usize) -> (Wire, usize) {
        let first = self.set_bits[0];
        match (k, first) {
            (1, 0) => (Wire::A, 1),
            (1, _) => (Wire::C, first),
            _ => (Wire::C, gate - 1),
        }
    }
}

/// The encryption circuit for a fixed public key
#[derive(Debug, Clone)]
pub struct EncryptionCircuit {
    circuit: Circuit,
    n: BigUint,
    n_squared: BigUint,
    ladder: Ladder,
    cipher: BigUint,
    cipher_row: usize,
}

impl EncryptionCircuit {
    /// Build the constraints for encryptions under `n` yielding `cipher`
    ///
    /// `group.p` must be N² so that circuit arithmetic matches ciphertext
    /// arithmetic.
    pub fn wire_up(n: &BigUint, group: GroupParams, cipher: &BigUint) -> Result<Self> {
        let n_squared = n * n;
        if group.p != n_squared {
            return Err(ZkError::invalid("circuit group order must equal N^2"));
        }
        let ladder = Ladder::for_modulus(n)?;
        let mut c = Circuit::new(group);

        // m·N
        let g0 = c.add_gate();
        let q = c.add_linear();
        c.constrain_i64(q, Wire::B, g0, 1)?;
        c.set_constant(q, n.clone())?;

        // r·r
        let g1 = c.add_gate();
        let q = c.add_linear();
        c.constrain_i64(q, Wire::A, g1, 1)?;
        c.constrain_i64(q, Wire::B, g1, -1)?;

        // squarings
        for _ in 2..=ladder.max_pow {
            let g = c.add_gate();
            for wire in [Wire::A, Wire::B] {
                let q = c.add_linear();
                c.constrain_i64(q, wire, g, 1)?;
                c.constrain_i64(q, Wire::C, g - 1, -1)?;
            }
        }

        // product over set bits
        for (k, &bit) in ladder.set_bits.iter().enumerate().skip(1) {
            let g = c.add_gate();
            let (wire, src) = ladder.product_input(k, g);
            let q = c.add_linear();
            c.constrain_i64(q, Wire::A, g, 1)?;
            c.constrain_i64(q, wire, src, -1)?;
            let q = c.add_linear();
            c.constrain_i64(q, Wire::B, g, 1)?;
            c.constrain_i64(q, Wire::C, bit, -1)?;
        }

        // (1 + mN)·r^N
        let g = c.add_gate();
        let q = c.add_linear();
        c.constrain_i64(q, Wire::A, g, 1)?;
        c.constrain_i64(q, Wire::C, g0, -1)?;
        c.set_constant(q, BigUint::one())?;
        let q = c.add_linear();
        c.constrain_i64(q, Wire::B, g, 1)?;
        c.constrain_i64(q, Wire::C, g - 1, -1)?;
        let cipher_row = c.add_linear();
        c.constrain_i64(cipher_row, Wire::C, g, 1)?;
        c.set_constant(cipher_row, cipher.clone())?;

        trace!(
            "encryption circuit: {} gates, {} constraints",
            c.gate_count(),
            c.linear_count()
        );
        Ok(Self {
            circuit: c,
            n: n.clone(),
            n_squared,
            ladder,
            cipher: cipher.clone(),
            cipher_row,
        })
    }

    /// Gates needed for an encryption under `n`
    pub fn gate_count_for(n: &BigUint) -> Result<usize> {
        Ok(Ladder::for_modulus(n)?.gate_count())
    }

    /// Point the final constraint at another ciphertext
    pub fn update_cipher(&mut self, cipher: &BigUint) -> Result<()> {
        self.circuit.set_constant(self.cipher_row, cipher.clone())?;
        self.cipher = cipher.clone();
        Ok(())
    }

    pub fn cipher(&self) -> &BigUint {
        &self.cipher
    }

    /// Gate whose left wire carries the plaintext
    pub fn message_gate(&self) -> usize {
        0
    }

    pub fn gate_count(&self) -> usize {
        self.circuit.gate_count()
    }

    pub fn linear_count(&self) -> usize {
        self.circuit.linear_count()
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn into_circuit(self) -> Circuit {
        self.circuit
    }

    /// Assign every wire for plaintext `m` and randomness `r`; returns C
    pub fn run(&mut self, m: &BigUint, r: &BigUint) -> Result<BigUint> {
        if m >= &self.n {
            return Err(ZkError::invalid("plaintext must be smaller than N"));
        }
        if r.is_zero() || r >= &self.n {
            return Err(ZkError::invalid("randomness must lie in [1, N)"));
        }
        let modulus = &self.n_squared;
        let c = &mut self.circuit;
        let gate = |c: &mut Circuit, g: usize, a: BigUint, b: BigUint| -> Result<BigUint> {
            let out = (&a * &b) % modulus;
            c.set_value(Wire::A, g, a)?;
            c.set_value(Wire::B, g, b)?;
            c.set_value(Wire::C, g, out.clone())?;
            Ok(out)
        };

        let mn = gate(c, 0, m.clone(), self.n.clone())?;
        let mut prev = gate(c, 1, r.clone(), r.clone())?;
        let mut g = 2;
        while g <= self.ladder.max_pow {
            prev = gate(c, g, prev.clone(), prev)?;
            g += 1;
        }
        for (k, &bit) in self.ladder.set_bits.iter().enumerate().skip(1) {
            let (wire, src) = self.ladder.product_input(k, g);
            let left = c.value(wire, src);
            let right = c.value(Wire::C, bit);
            prev = gate(c, g, left, right)?;
            g += 1;
        }
        gate(c, g, (mn + 1u32) % modulus, prev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paillier::PaillierEncryption;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Q = 22·101² + 1 with a generator of order 101²
    fn toy_group() -> GroupParams {
        GroupParams::from_u64(224_423, 10_201, 154_690).unwrap()
    }

    #[test]
    fn test_counts_for_small_modulus() {
        // 101 = 0b1100101: ℓ = 7, four set bits
        let n = BigUint::from(101u32);
        assert_eq!(EncryptionCircuit::gate_count_for(&n).unwrap(), 11);
        let circuit = EncryptionCircuit::wire_up(&n, toy_group(), &BigUint::one()).unwrap();
        assert_eq!(circuit.gate_count(), 11);
        assert_eq!(circuit.linear_count(), 21);
    }

    #[test]
    fn test_toy_modulus_round_trip() {
        let n = BigUint::from(101u32);
        let n2 = BigUint::from(10_201u32);
        for (m, r) in [(0u32, 1u32), (7, 3), (100, 100), (55, 64)] {
            let (m, r) = (BigUint::from(m), BigUint::from(r));
            let expected = ((&m * &n + 1u32) * r.modpow(&n, &n2)) % &n2;
            let mut circuit = EncryptionCircuit::wire_up(&n, toy_group(), &expected).unwrap();
            assert_eq!(circuit.run(&m, &r).unwrap(), expected);
            assert!(circuit.circuit().is_satisfied());
        }
    }

    #[test]
    fn test_group_must_match_modulus() {
        let n = BigUint::from(103u32);
        assert!(EncryptionCircuit::wire_up(&n, toy_group(), &BigUint::one()).is_err());
    }

    #[test]
    fn test_tiny_modulus_rejected() {
        assert!(EncryptionCircuit::gate_count_for(&BigUint::from(3u32)).is_err());
    }

    #[test]
    fn test_run_matches_encrypt() {
        let mut rng = StdRng::seed_from_u64(42);
        let crypto = PaillierEncryption::generate_with_rng(8, &mut rng).unwrap();
        let m = BigUint::from(123_456u32);
        let r = crypto.pick_random_with_rng(&mut rng);
        let c = crypto.encrypt(&m, &r).unwrap();

        let mut circuit =
            EncryptionCircuit::wire_up(crypto.public_key(), crypto.group_params().clone(), &c)
                .unwrap();
        let out = circuit.run(&m, &r).unwrap();
        assert_eq!(out, c);
        assert!(circuit.circuit().is_satisfied());

        let expected = EncryptionCircuit::gate_count_for(crypto.public_key()).unwrap();
        assert_eq!(circuit.gate_count(), expected);
        let bits = crypto.public_key().bits() as usize;
        let ones = crypto.public_key().count_ones() as usize;
        assert_eq!(circuit.linear_count(), 2 * (bits - 1) + 2 * ones + 1);
    }

    #[test]
    fn test_update_cipher() {
        let mut rng = StdRng::seed_from_u64(42);
        let crypto = PaillierEncryption::generate_with_rng(8, &mut rng).unwrap();
        let (m1, m2) = (BigUint::from(5u32), BigUint::from(6u32));
        let r = crypto.pick_random_with_rng(&mut rng);
        let c1 = crypto.encrypt(&m1, &r).unwrap();
        let c2 = crypto.encrypt(&m2, &r).unwrap();

        let mut circuit =
            EncryptionCircuit::wire_up(crypto.public_key(), crypto.group_params().clone(), &c1)
                .unwrap();
        circuit.run(&m2, &r).unwrap();
        assert!(!circuit.circuit().is_satisfied());
        circuit.update_cipher(&c2).unwrap();
        assert_eq!(circuit.cipher(), &c2);
        assert!(circuit.circuit().is_satisfied());
    }
}
