//! Modular arithmetic for the two coupled groups
//!
//! Circuit values live in ℤ_p, where p is the order of the commitment
//! generator (p = N² for a Paillier modulus N). Commitments are elements of
//! ℤ_Q* with p | Q−1. [`Field`] carries the p-modulus, [`GroupParams`]
//! carries both.

use num_bigint::{BigInt, BigUint, RandBigInt};
use num_integer::{Integer, Roots};
use num_traits::{One, Zero};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ZkError};

/// Arithmetic modulo a fixed integer p
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    #[serde(with = "decimal")]
    modulus: BigUint,
}

impl Field {
    /// Create a field helper for modulus `p` (p > 1)
    pub fn new(modulus: BigUint) -> Result<Self> {
        if modulus <= BigUint::one() {
            return Err(ZkError::invalid("modulus must be greater than 1"));
        }
        Ok(Self { modulus })
    }

    /// The modulus p
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Byte length of the modulus
    pub fn byte_len(&self) -> usize {
        byte_len(&self.modulus)
    }

    pub fn reduce(&self, a: &BigUint) -> BigUint {
        a % &self.modulus
    }

    pub fn add(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a + b) % &self.modulus
    }

    pub fn sub(&self, a: &BigUint, b: &BigUint) -> BigUint {
        let a = a % &self.modulus;
        let b = b % &self.modulus;
        if a >= b {
            a - b
        } else {
            &self.modulus - b + a
        }
    }

    pub fn neg(&self, a: &BigUint) -> BigUint {
        let a = a % &self.modulus;
        if a.is_zero() {
            a
        } else {
            &self.modulus - a
        }
    }

    pub fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.modulus
    }

    pub fn pow(&self, base: &BigUint, exp: &BigUint) -> BigUint {
        base.modpow(exp, &self.modulus)
    }

    pub fn pow_u64(&self, base: &BigUint, exp: u64) -> BigUint {
        base.modpow(&BigUint::from(exp), &self.modulus)
    }

    /// `base^exp` for a signed exponent; negative exponents go through the inverse
    pub fn pow_signed(&self, base: &BigUint, exp: i64) -> Result<BigUint> {
        if exp >= 0 {
            Ok(self.pow_u64(base, exp.unsigned_abs()))
        } else {
            let inv = self.inv(base)?;
            Ok(self.pow_u64(&inv, exp.unsigned_abs()))
        }
    }

    /// Multiplicative inverse, if `a` is a unit
    pub fn inv(&self, a: &BigUint) -> Result<BigUint> {
        let modulus = BigInt::from(self.modulus.clone());
        let a = BigInt::from(a % &self.modulus);
        let egcd = a.extended_gcd(&modulus);
        if !egcd.gcd.is_one() {
            return Err(ZkError::NotInvertible(format!(
                "{} shares a factor with the modulus",
                a
            )));
        }
        Ok(egcd.x.mod_floor(&modulus).magnitude().clone())
    }

    /// Whether `a` is invertible mod p
    /// Whether `a` is a canonical residue, i.e. `a < p`
    pub fn contains(&self, a: &BigUint) -> bool {
        a < &self.modulus
    }

    pub fn is_unit(&self, a: &BigUint) -> bool {
        !a.is_zero() && (a % &self.modulus).gcd(&self.modulus).is_one()
    }

    /// Map a signed integer into ℤ_p
    pub fn from_i64(&self, v: i64) -> BigUint {
        let magnitude = BigUint::from(v.unsigned_abs()) % &self.modulus;
        if v < 0 {
            self.neg(&magnitude)
        } else {
            magnitude
        }
    }

    pub fn random<R: RngCore + CryptoRng>(&self, rng: &mut R) -> BigUint {
        rng.gen_biguint_below(&self.modulus)
    }

    pub fn random_nonzero<R: RngCore + CryptoRng>(&self, rng: &mut R) -> BigUint {
        loop {
            let v = self.random(rng);
            if !v.is_zero() {
                return v;
            }
        }
    }

    /// `[1, base, base², …, base^(len-1)]`
    pub fn power_vector(&self, base: &BigUint, len: usize) -> Vec<BigUint> {
        let mut out = Vec::with_capacity(len);
        let mut acc = BigUint::one() % &self.modulus;
        for _ in 0..len {
            out.push(acc.clone());
            acc = self.mul(&acc, base);
        }
        out
    }

    /// Inner product of two equal-length vectors
    pub fn inner_product(&self, a: &[BigUint], b: &[BigUint]) -> BigUint {
        let sum = a
            .iter()
            .zip(b)
            .fold(BigUint::zero(), |acc, (x, y)| acc + x * y);
        sum % &self.modulus
    }
}

/// Parameters of the commitment group
///
/// `g` generates a subgroup of order `p` in ℤ_Q*. Circuit arithmetic is done
/// mod `p`, exponentiation of commitments mod `q`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupParams {
    /// Outer modulus Q
    #[serde(with = "decimal")]
    pub q: BigUint,
    /// Subgroup order p (p | Q−1)
    #[serde(with = "decimal")]
    pub p: BigUint,
    /// Generator of the order-p subgroup
    #[serde(with = "decimal")]
    pub g: BigUint,
}

impl GroupParams {
    /// Validate and build group parameters
    pub fn new(q: BigUint, p: BigUint, g: BigUint) -> Result<Self> {
        if q <= BigUint::from(2u32) || p <= BigUint::one() {
            return Err(ZkError::invalid("group moduli too small"));
        }
        if !((&q - 1u32) % &p).is_zero() {
            return Err(ZkError::invalid("p must divide Q-1"));
        }
        if g <= BigUint::one() || g >= q {
            return Err(ZkError::invalid("generator out of range"));
        }
        if !g.modpow(&p, &q).is_one() {
            return Err(ZkError::invalid("generator order does not divide p"));
        }
        Ok(Self { q, p, g })
    }

    pub fn from_u64(q: u64, p: u64, g: u64) -> Result<Self> {
        Self::new(BigUint::from(q), BigUint::from(p), BigUint::from(g))
    }

    /// The scalar field ℤ_p
    pub fn scalar_field(&self) -> Field {
        Field {
            modulus: self.p.clone(),
        }
    }

    /// `base^exp mod Q`
    pub fn exp(&self, base: &BigUint, exp: &BigUint) -> BigUint {
        base.modpow(exp, &self.q)
    }

    pub fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.q
    }

    /// Whether `a` lies in [1, Q)
    pub fn is_element(&self, a: &BigUint) -> bool {
        !a.is_zero() && a < &self.q
    }

    /// Fixed width of an encoded group element
    pub fn element_bytes(&self) -> usize {
        byte_len(&self.q)
    }
}

/// Number of bytes needed to represent `v` (at least 1)
pub fn byte_len(v: &BigUint) -> usize {
    (v.bits() as usize).div_ceil(8).max(1)
}

/// Big-endian encoding left-padded to `width` bytes
pub fn to_fixed_bytes(v: &BigUint, width: usize) -> Vec<u8> {
    let raw = v.to_bytes_be();
    if raw.len() >= width {
        return raw;
    }
    let mut out = vec![0u8; width - raw.len()];
    out.extend_from_slice(&raw);
    out
}

/// Lowercase hex of the big-endian encoding
pub fn to_hex(v: &BigUint) -> String {
    hex::encode(v.to_bytes_be())
}

/// ⌈√n⌉
pub fn ceil_sqrt(n: usize) -> usize {
    let root = n.sqrt();
    if root * root == n {
        root
    } else {
        root + 1
    }
}

/// Serde adapter writing a `BigUint` as a decimal string
pub mod decimal {
    use num_bigint::BigUint;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &BigUint, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BigUint, D::Error> {
        let s = String::deserialize(d)?;
        BigUint::parse_bytes(s.as_bytes(), 10)
            .ok_or_else(|| de::Error::custom(format!("invalid decimal integer: {s}")))
    }
}

/// Serde adapter for `Vec<BigUint>` as decimal strings
pub mod decimal_vec {
    use num_bigint::BigUint;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &[BigUint], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(v.iter().map(|x| x.to_str_radix(10)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<BigUint>, D::Error> {
        let raw = Vec::<String>::deserialize(d)?;
        raw.iter()
            .map(|s| {
                BigUint::parse_bytes(s.as_bytes(), 10)
                    .ok_or_else(|| de::Error::custom(format!("invalid decimal integer: {s}")))
            })
            .collect()
    }
}
