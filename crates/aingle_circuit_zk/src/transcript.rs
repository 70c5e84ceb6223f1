//! Fiat–Shamir challenge derivation
//!
//! Challenges are pure functions of public transcript data: a domain label
//! and a sequence of group elements, each written as a fixed-width
//! big-endian integer. The absorbed bytes are hashed once with SHA-256 and
//! then expanded in counter mode.

use num_bigint::BigUint;
use sha2::{Digest, Sha256};

use crate::field::{to_fixed_bytes, Field};

/// Label for the challenge y (hash of the A/B/C/D commitments)
pub const CHALLENGE_Y: &[u8] = b"aingle_circuit_zk/challenge-y";
/// Label for the challenge x (hash of the polynomial commitment)
pub const CHALLENGE_X: &[u8] = b"aingle_circuit_zk/challenge-x";
/// Label for the range-proof bit mask ℓ
pub const RANGE_MASK: &[u8] = b"aingle_circuit_zk/range-mask";

/// Extra bytes drawn beyond the modulus width when reducing into ℤ_p
const REDUCTION_MARGIN: usize = 16;

/// Accumulates public data for one challenge
#[derive(Debug, Clone)]
pub struct Transcript {
    label: &'static [u8],
    data: Vec<u8>,
}

impl Transcript {
    pub fn new(label: &'static [u8]) -> Self {
        Self {
            label,
            data: Vec::new(),
        }
    }

    /// Absorb an element as `width` big-endian bytes
    pub fn append_element(&mut self, value: &BigUint, width: usize) {
        self.data.extend_from_slice(&to_fixed_bytes(value, width));
    }

    pub fn append_elements<'a, I>(&mut self, values: I, width: usize)
    where
        I: IntoIterator<Item = &'a BigUint>,
    {
        for v in values {
            self.append_element(v, width);
        }
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    fn seed(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update((self.label.len() as u64).to_be_bytes());
        hasher.update(self.label);
        hasher.update(&self.data);
        hasher.finalize().into()
    }

    fn expand_with(seed: &[u8; 32], attempt: u32, len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len + 32);
        let mut block = 0u32;
        while out.len() < len {
            let mut hasher = Sha256::new();
            hasher.update(seed);
            hasher.update(attempt.to_be_bytes());
            hasher.update(block.to_be_bytes());
            out.extend_from_slice(&hasher.finalize());
            block += 1;
        }
        out.truncate(len);
        out
    }

    /// Deterministic pseudorandom bytes
    pub fn expand(&self, len: usize) -> Vec<u8> {
        Self::expand_with(&self.seed(), 0, len)
    }

    /// Non-zero challenge invertible mod p
    ///
    /// Candidates sharing a factor with p are discarded and the next counter
    /// value is tried.
    pub fn challenge_scalar(&self, field: &Field) -> BigUint {
        let seed = self.seed();
        let width = field.byte_len() + REDUCTION_MARGIN;
        let mut attempt = 0u32;
        loop {
            let bytes = Self::expand_with(&seed, attempt, width);
            let candidate = field.reduce(&BigUint::from_bytes_be(&bytes));
            if field.is_unit(&candidate) {
                return candidate;
            }
            attempt = attempt.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Zero;

    fn field() -> Field {
        Field::new(BigUint::from(101u32)).unwrap()
    }

    #[test]
    fn test_challenge_is_deterministic() {
        let mut t1 = Transcript::new(CHALLENGE_Y);
        let mut t2 = Transcript::new(CHALLENGE_Y);
        for v in [5u32, 17, 300] {
            t1.append_element(&BigUint::from(v), 2);
            t2.append_element(&BigUint::from(v), 2);
        }
        assert_eq!(t1.challenge_scalar(&field()), t2.challenge_scalar(&field()));
        assert_eq!(t1.expand(100), t2.expand(100));
    }

    #[test]
    fn test_label_separates_domains() {
        let mut ty = Transcript::new(CHALLENGE_Y);
        let mut tx = Transcript::new(CHALLENGE_X);
        ty.append_bytes(b"same data");
        tx.append_bytes(b"same data");
        assert_ne!(ty.expand(32), tx.expand(32));
    }

    #[test]
    fn test_fixed_width_encoding_matters() {
        let mut a = Transcript::new(RANGE_MASK);
        let mut b = Transcript::new(RANGE_MASK);
        a.append_element(&BigUint::from(1u32), 2);
        b.append_element(&BigUint::from(1u32), 3);
        assert_ne!(a.expand(16), b.expand(16));
    }

    #[test]
    fn test_challenge_is_unit() {
        let f = Field::new(BigUint::from(143u32 * 143)).unwrap();
        for seed in 0u32..50 {
            let mut t = Transcript::new(CHALLENGE_X);
            t.append_element(&BigUint::from(seed), 4);
            let c = t.challenge_scalar(&f);
            assert!(!c.is_zero());
            assert!(f.is_unit(&c));
        }
    }

    #[test]
    fn test_expand_length() {
        let t = Transcript::new(RANGE_MASK);
        assert_eq!(t.expand(0).len(), 0);
        assert_eq!(t.expand(33).len(), 33);
    }
}
