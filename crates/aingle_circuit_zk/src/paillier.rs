//! Paillier encryption with ZKP group parameters
//!
//! Besides the key pair, [`PaillierEncryption`] carries the commitment group
//! used by the circuit prover: P = N², Q = f·N² + 1 prime, and a generator G
//! of order exactly N² in ℤ_Q*.
//!
//! ```rust
//! use aingle_circuit_zk::PaillierEncryption;
//! use num_bigint::BigUint;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(1);
//! let crypto = PaillierEncryption::generate_with_rng(8, &mut rng).unwrap();
//! let r = crypto.pick_random_with_rng(&mut rng);
//! let c = crypto.encrypt(&BigUint::from(42u32), &r).unwrap();
//! assert_eq!(crypto.decrypt(&c).unwrap(), BigUint::from(42u32));
//! ```

use log::debug;
use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ZkError};
use crate::field::{byte_len, decimal, Field, GroupParams};

const MILLER_RABIN_ROUNDS: usize = 40;

const SMALL_PRIMES: [u32; 24] = [
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

/// Decryption key material
#[derive(Clone)]
struct SecretKey {
    lambda: BigUint,
    mu: BigUint,
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Paillier cryptosystem handle
///
/// A handle built with [`PaillierEncryption::to_public`] or
/// [`PaillierEncryption::from_public`] can encrypt and combine ciphertexts
/// but not decrypt. Serialization only ever carries the public half.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaillierEncryption {
    #[serde(with = "decimal")]
    n: BigUint,
    #[serde(with = "decimal")]
    n_squared: BigUint,
    group: GroupParams,
    #[serde(skip)]
    secret: Option<SecretKey>,
}

impl PaillierEncryption {
    /// Generate a key pair whose modulus is exactly `key_bytes` bytes
    pub fn generate(key_bytes: usize) -> Result<Self> {
        Self::generate_with_rng(key_bytes, &mut OsRng)
    }

    /// Generate a key pair from a caller-supplied RNG
    pub fn generate_with_rng<R: RngCore + CryptoRng>(
        key_bytes: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if key_bytes < 2 || key_bytes % 2 != 0 {
            return Err(ZkError::invalid(format!(
                "key byte length must be even and at least 2, got {key_bytes}"
            )));
        }
        let prime_bits = (key_bytes * 4) as u64;
        let (p, q) = loop {
            let p = gen_prime(prime_bits, rng);
            let q = gen_prime(prime_bits, rng);
            if p != q && byte_len(&(&p * &q)) == key_bytes {
                break (p, q);
            }
        };
        let n = &p * &q;
        let phi = (&p - 1u32) * (&q - 1u32);
        let group = derive_group(&n, &p, &q, rng)?;
        debug!(
            "generated {}-bit Paillier key, group Q has {} bits",
            n.bits(),
            group.q.bits()
        );
        Self::with_secret(n, phi, group)
    }

    /// Import a key pair from N, λ and the group parameters
    pub fn with_secret(n: BigUint, lambda: BigUint, group: GroupParams) -> Result<Self> {
        let mut handle = Self::from_public(n, group)?;
        let mu = Field::new(handle.n.clone())?
            .inv(&lambda)
            .map_err(|_| ZkError::Crypto("lambda is not invertible mod N".into()))?;
        handle.secret = Some(SecretKey { lambda, mu });
        Ok(handle)
    }

    /// Import a public key with its group parameters
    pub fn from_public(n: BigUint, group: GroupParams) -> Result<Self> {
        let n_squared = &n * &n;
        if group.p != n_squared {
            return Err(ZkError::invalid("group order must equal N^2"));
        }
        Ok(Self {
            n,
            n_squared,
            group,
            secret: None,
        })
    }

    /// Copy without the decryption key
    pub fn to_public(&self) -> Self {
        Self {
            secret: None,
            ..self.clone()
        }
    }

    /// Whether this handle can decrypt
    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Public modulus N
    pub fn public_key(&self) -> &BigUint {
        &self.n
    }

    /// N²
    pub fn n_squared(&self) -> &BigUint {
        &self.n_squared
    }

    /// Byte length of N
    pub fn byte_len(&self) -> usize {
        byte_len(&self.n)
    }

    /// Commitment group (Q, P = N², G)
    pub fn group_params(&self) -> &GroupParams {
        &self.group
    }

    pub fn group_q(&self) -> &BigUint {
        &self.group.q
    }

    pub fn group_p(&self) -> &BigUint {
        &self.group.p
    }

    pub fn group_g(&self) -> &BigUint {
        &self.group.g
    }

    /// Uniform r in [1, N) with gcd(r, N) = 1
    pub fn pick_random(&self) -> BigUint {
        self.pick_random_with_rng(&mut OsRng)
    }

    pub fn pick_random_with_rng<R: RngCore + CryptoRng>(&self, rng: &mut R) -> BigUint {
        loop {
            let r = rng.gen_biguint_range(&BigUint::one(), &self.n);
            if r.gcd(&self.n).is_one() {
                return r;
            }
        }
    }

    /// c = (1 + mN) · r^N mod N²
    pub fn encrypt(&self, m: &BigUint, r: &BigUint) -> Result<BigUint> {
        if m >= &self.n {
            return Err(ZkError::invalid("plaintext must be smaller than N"));
        }
        if r.is_zero() || r >= &self.n {
            return Err(ZkError::invalid("randomness must lie in [1, N)"));
        }
        let rn = r.modpow(&self.n, &self.n_squared);
        Ok(((&self.n * m + 1u32) * rn) % &self.n_squared)
    }

    /// m = L(c^λ mod N²) · μ mod N
    pub fn decrypt(&self, c: &BigUint) -> Result<BigUint> {
        let secret = self
            .secret
            .as_ref()
            .ok_or_else(|| ZkError::Crypto("decryption needs the private key".into()))?;
        let u = c.modpow(&secret.lambda, &self.n_squared);
        if u.is_zero() {
            return Err(ZkError::invalid("ciphertext is not a unit mod N^2"));
        }
        let l = (u - 1u32) / &self.n;
        Ok((l * &secret.mu) % &self.n)
    }

    /// Ciphertext of m1 + m2 from c1 and a plaintext m2
    pub fn add(&self, c: &BigUint, m: &BigUint) -> BigUint {
        // (N+1)^m = 1 + mN mod N²
        let gm = (&self.n * m + 1u32) % &self.n_squared;
        (c * gm) % &self.n_squared
    }

    /// Ciphertext of m1 + m2 from two ciphertexts
    pub fn add_ciphertexts(&self, c1: &BigUint, c2: &BigUint) -> BigUint {
        (c1 * c2) % &self.n_squared
    }

    /// Ciphertext of k·m
    pub fn mul(&self, c: &BigUint, k: &BigUint) -> BigUint {
        c.modpow(k, &self.n_squared)
    }
}

/// Q = f·N² + 1 prime for the least f ≥ 2, and G of order exactly N²
fn derive_group<R: RngCore + CryptoRng>(
    n: &BigUint,
    p: &BigUint,
    q: &BigUint,
    rng: &mut R,
) -> Result<GroupParams> {
    let n_squared = n * n;
    let mut f = BigUint::from(2u32);
    let group_q = loop {
        let candidate = &f * &n_squared + 1u32;
        if is_probable_prime(&candidate, rng) {
            break candidate;
        }
        f += 1u32;
    };
    // maximal proper divisors of p²q²
    let below_p = p * q * q;
    let below_q = p * p * q;
    let two = BigUint::from(2u32);
    for _ in 0..1024 {
        let h = rng.gen_biguint_range(&two, &(&group_q - 1u32));
        let g = h.modpow(&f, &group_q);
        if g.is_one() {
            continue;
        }
        if g.modpow(&below_p, &group_q).is_one() || g.modpow(&below_q, &group_q).is_one() {
            continue;
        }
        return GroupParams::new(group_q, n_squared, g);
    }
    Err(ZkError::Crypto("failed to find a generator of order N^2".into()))
}

/// Random prime of exactly `bits` bits with the top two bits set
pub(crate) fn gen_prime<R: RngCore + CryptoRng>(bits: u64, rng: &mut R) -> BigUint {
    let top = (BigUint::one() << (bits - 1)) | (BigUint::one() << (bits - 2));
    loop {
        let candidate = rng.gen_biguint(bits) | &top | BigUint::one();
        if is_probable_prime(&candidate, rng) {
            return candidate;
        }
    }
}

/// Trial division by small primes, then Miller–Rabin with random bases
pub(crate) fn is_probable_prime<R: RngCore + CryptoRng>(n: &BigUint, rng: &mut R) -> bool {
    let two = BigUint::from(2u32);
    if n < &two {
        return false;
    }
    if n.is_even() {
        return n == &two;
    }
    for &sp in &SMALL_PRIMES {
        let sp = BigUint::from(sp);
        if n == &sp {
            return true;
        }
        if (n % &sp).is_zero() {
            return false;
        }
    }

    let n_minus_one = n - 1u32;
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;

    'witness: for _ in 0..MILLER_RABIN_ROUNDS {
        let a = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = a.modpow(&d, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn keypair() -> (PaillierEncryption, StdRng) {
        let mut rng = StdRng::seed_from_u64(42);
        let crypto = PaillierEncryption::generate_with_rng(8, &mut rng).unwrap();
        (crypto, rng)
    }

    #[test]
    fn test_primality() {
        let mut rng = StdRng::seed_from_u64(1);
        for p in [2u32, 3, 97, 101, 607, 7919] {
            assert!(is_probable_prime(&BigUint::from(p), &mut rng), "{p}");
        }
        for c in [1u32, 9, 561, 1105, 7917] {
            assert!(!is_probable_prime(&BigUint::from(c), &mut rng), "{c}");
        }
    }

    #[test]
    fn test_key_shape() {
        let (crypto, _) = keypair();
        assert_eq!(crypto.byte_len(), 8);
        let group = crypto.group_params();
        assert_eq!(&group.p, crypto.n_squared());
        assert!(((&group.q - 1u32) % &group.p).is_zero());
        assert!(group.g.modpow(&group.p, &group.q).is_one());
    }

    #[test]
    fn test_encrypt_decrypt() {
        let (crypto, mut rng) = keypair();
        for m in [0u64, 1, 12345, 1 << 40] {
            let r = crypto.pick_random_with_rng(&mut rng);
            let c = crypto.encrypt(&BigUint::from(m), &r).unwrap();
            assert_eq!(crypto.decrypt(&c).unwrap(), BigUint::from(m));
        }
    }

    #[test]
    fn test_homomorphic_operations() {
        let (crypto, mut rng) = keypair();
        let r1 = crypto.pick_random_with_rng(&mut rng);
        let r2 = crypto.pick_random_with_rng(&mut rng);
        let c1 = crypto.encrypt(&BigUint::from(20u32), &r1).unwrap();
        let c2 = crypto.encrypt(&BigUint::from(22u32), &r2).unwrap();

        let sum = crypto.add_ciphertexts(&c1, &c2);
        assert_eq!(crypto.decrypt(&sum).unwrap(), BigUint::from(42u32));

        let plus = crypto.add(&c1, &BigUint::from(5u32));
        assert_eq!(crypto.decrypt(&plus).unwrap(), BigUint::from(25u32));

        let scaled = crypto.mul(&c1, &BigUint::from(3u32));
        assert_eq!(crypto.decrypt(&scaled).unwrap(), BigUint::from(60u32));
    }

    #[test]
    fn test_public_handle_cannot_decrypt() {
        let (crypto, mut rng) = keypair();
        let public = crypto.to_public();
        let r = public.pick_random_with_rng(&mut rng);
        let c = public.encrypt(&BigUint::from(7u32), &r).unwrap();
        assert!(public.decrypt(&c).is_err());
        assert_eq!(crypto.decrypt(&c).unwrap(), BigUint::from(7u32));
    }

    #[test]
    fn test_encrypt_rejects_out_of_range() {
        let (crypto, _) = keypair();
        let n = crypto.public_key().clone();
        assert!(crypto.encrypt(&n, &BigUint::one()).is_err());
        assert!(crypto.encrypt(&BigUint::one(), &BigUint::zero()).is_err());
    }

    #[test]
    fn test_invalid_byte_length() {
        assert!(PaillierEncryption::generate(3).is_err());
        assert!(PaillierEncryption::generate(0).is_err());
    }
}
