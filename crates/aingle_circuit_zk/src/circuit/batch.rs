//! Batch encryption statement
//!
//! The prover encrypts `msg_count` slotted messages `m_i`, packs their slot
//! flags into `batch_count` dense plaintexts `m*_b`, and encrypts
//! `range_proof_count` random masks `R_j`. The circuit proves, without
//! revealing any plaintext, that
//!
//! * every ciphertext is a correct encryption of its plaintext,
//! * every slot of every `m_i` holds a single bit,
//! * `m*_b` packs exactly the bits of messages `b·mpb .. (b+1)·mpb`,
//! * `L_j = R_j + Σ ℓ_jir·bit_ir`, where the mask bits ℓ are derived from
//!   the ciphertexts, so the bits were fixed before ℓ was known.
//!
//! Gate layout: one encryption circuit per `cm`, then per `crj`, then per
//! `cm*`, followed by one bit gate per message slot.

use log::debug;
use num_bigint::{BigUint, RandBigInt};
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use super::encryption::EncryptionCircuit;
use super::slots::SlotLayout;
use super::{Circuit, Wire};
use crate::commitment::GeneratorSetup;
use crate::config::BatchConfig;
use crate::error::{Result, ZkError};
use crate::field::{byte_len, decimal, decimal_vec};
use crate::paillier::PaillierEncryption;
use crate::transcript::{Transcript, RANGE_MASK};
use crate::zkp::{calc_mn, generators_required, CircuitZkpProver, CircuitZkpVerifier};

/// Sizes derived from a [`BatchConfig`] and a Paillier modulus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLayout {
    pub msg_count: usize,
    pub range_proof_count: usize,
    /// Slot width in bytes
    pub slot_size: usize,
    pub msg_per_batch: usize,
    /// Message width in bytes, the byte length of N
    pub msg_size: usize,
    /// ⌈msg_count / msg_per_batch⌉
    pub batch_count: usize,
    /// ⌊msg_size / slot_size⌋
    pub slots_per_msg: usize,
    /// Exclusive bound on the range-proof masks R_j
    #[serde(with = "decimal")]
    pub rj_max: BigUint,
}

impl BatchLayout {
    /// Layout for `config` under modulus `n`
    pub fn new(config: &BatchConfig, n: &BigUint) -> Result<Self> {
        for (name, value) in [
            ("msg_count", config.msg_count),
            ("range_proof_count", config.range_proof_count),
            ("slot_size", config.slot_size),
            ("msg_per_batch", config.msg_per_batch),
        ] {
            if value == 0 {
                return Err(ZkError::Config(format!("{name} must be non-zero")));
            }
        }
        let msg_size = byte_len(n);
        let slots_per_msg = msg_size / config.slot_size;
        if slots_per_msg == 0 {
            return Err(ZkError::Config(format!(
                "slot_size {} exceeds the {msg_size}-byte message",
                config.slot_size
            )));
        }
        let packed_bits = slots_per_msg * config.msg_per_batch;
        if packed_bits as u64 >= n.bits() {
            return Err(ZkError::Config(format!(
                "{packed_bits} packed slot bits do not fit below a {}-bit modulus",
                n.bits()
            )));
        }
        let rj_bits = (packed_bits as f64 / 3.4).round() as usize;
        let rj_max = BigUint::from(1u32) << rj_bits;
        if &rj_max >= n {
            return Err(ZkError::Config(format!(
                "range mask bound 2^{rj_bits} is not below N"
            )));
        }
        Ok(Self {
            msg_count: config.msg_count,
            range_proof_count: config.range_proof_count,
            slot_size: config.slot_size,
            msg_per_batch: config.msg_per_batch,
            msg_size,
            batch_count: config.msg_count.div_ceil(config.msg_per_batch),
            slots_per_msg,
            rj_max,
        })
    }

    pub fn slot_layout(&self) -> Result<SlotLayout> {
        SlotLayout::new(self.slot_size, self.slots_per_msg)
    }

    /// Encryption circuits in the statement
    pub fn encryption_count(&self) -> usize {
        self.msg_count + self.range_proof_count + self.batch_count
    }

    /// Bit gates in the statement, one per message slot
    pub fn bit_count(&self) -> usize {
        self.msg_count * self.slots_per_msg
    }

    /// Bytes of mask material: one bit per (range proof, message, slot)
    pub fn ljir_len(&self) -> usize {
        (self.bit_count() * self.range_proof_count).div_ceil(8)
    }

    /// Messages packed into batch `b`
    pub fn batch_members(&self, b: usize) -> std::ops::Range<usize> {
        let start = b * self.msg_per_batch;
        start..(start + self.msg_per_batch).min(self.msg_count)
    }
}

/// The public ciphertexts of a batch statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCiphertexts {
    /// One ciphertext per message
    #[serde(with = "decimal_vec")]
    pub cm: Vec<BigUint>,
    /// One ciphertext per packed batch
    #[serde(with = "decimal_vec")]
    pub cm_star: Vec<BigUint>,
    /// One ciphertext per range-proof mask
    #[serde(with = "decimal_vec")]
    pub crj: Vec<BigUint>,
}

/// Prover-only plaintexts and randomness
struct BatchWitness {
    flags: Vec<Vec<bool>>,
    messages: Vec<BigUint>,
    msg_rand: Vec<BigUint>,
    packed: Vec<BigUint>,
    packed_rand: Vec<BigUint>,
    rj: Vec<BigUint>,
    rj_rand: Vec<BigUint>,
}

/// Builds and assigns the circuit for a batch statement
///
/// Prover: [`encrypt`](Self::encrypt), [`calculate_ljir`](Self::calculate_ljir),
/// [`calculate_lj`](Self::calculate_lj), [`wire_up`](Self::wire_up),
/// [`run`](Self::run), [`generate_prover`](Self::generate_prover).
///
/// Verifier: [`set_ciphertexts`](Self::set_ciphertexts),
/// [`calculate_ljir`](Self::calculate_ljir), [`wire_up`](Self::wire_up) with
/// the received `L_j`, [`generate_verifier`](Self::generate_verifier).
pub struct BatchEncryptionCircuit {
    crypto: PaillierEncryption,
    layout: BatchLayout,
    enc_gates: usize,
    ciphertexts: Option<BatchCiphertexts>,
    witness: Option<BatchWitness>,
    template: Option<EncryptionCircuit>,
    circuit: Option<Circuit>,
}

impl std::fmt::Debug for BatchEncryptionCircuit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEncryptionCircuit")
            .field("layout", &self.layout)
            .field("enc_gates", &self.enc_gates)
            .field("has_ciphertexts", &self.ciphertexts.is_some())
            .field("wired", &self.circuit.is_some())
            .finish_non_exhaustive()
    }
}

impl BatchEncryptionCircuit {
    pub fn new(crypto: PaillierEncryption, config: &BatchConfig) -> Result<Self> {
        let layout = BatchLayout::new(config, crypto.public_key())?;
        let enc_gates = EncryptionCircuit::gate_count_for(crypto.public_key())?;
        debug!(
            "batch statement: {} messages, {} batches, {} slots each, {} range proofs",
            layout.msg_count, layout.batch_count, layout.slots_per_msg, layout.range_proof_count
        );
        Ok(Self {
            crypto,
            layout,
            enc_gates,
            ciphertexts: None,
            witness: None,
            template: None,
            circuit: None,
        })
    }

    pub fn layout(&self) -> &BatchLayout {
        &self.layout
    }

    pub fn crypto(&self) -> &PaillierEncryption {
        &self.crypto
    }

    pub fn ciphertexts(&self) -> Option<&BatchCiphertexts> {
        self.ciphertexts.as_ref()
    }

    /// Gates per encryption circuit
    pub fn encryption_gates(&self) -> usize {
        self.enc_gates
    }

    /// Gate count of the wired-up circuit
    pub fn estimate_gate_count(&self) -> usize {
        self.enc_gates * self.layout.encryption_count() + self.layout.bit_count()
    }

    /// Commitment generators the proof will need
    pub fn estimate_generators_required(&self) -> usize {
        let (m, n) = calc_mn(self.estimate_gate_count());
        generators_required(m, n)
    }

    /// Encrypt `messages`, pack them into batches and draw the range masks
    pub fn encrypt(&mut self, messages: &[BigUint]) -> Result<BatchCiphertexts> {
        self.encrypt_with_rng(messages, &mut OsRng)
    }

    pub fn encrypt_with_rng<R: RngCore + CryptoRng>(
        &mut self,
        messages: &[BigUint],
        rng: &mut R,
    ) -> Result<BatchCiphertexts> {
        let layout = &self.layout;
        if messages.len() != layout.msg_count {
            return Err(ZkError::invalid(format!(
                "expected {} messages, got {}",
                layout.msg_count,
                messages.len()
            )));
        }
        let slots = layout.slot_layout()?;
        let flags = messages
            .iter()
            .map(|m| slots.decode(m))
            .collect::<Result<Vec<_>>>()?;

        let packed: Vec<BigUint> = (0..layout.batch_count)
            .map(|b| slots.pack(&flags[layout.batch_members(b)]))
            .collect();
        let rj: Vec<BigUint> = (0..layout.range_proof_count)
            .map(|_| rng.gen_biguint_below(&layout.rj_max))
            .collect();

        let crypto = &self.crypto;
        let mut encrypt_all = |plain: &[BigUint]| -> Result<(Vec<BigUint>, Vec<BigUint>)> {
            let mut cts = Vec::with_capacity(plain.len());
            let mut rands = Vec::with_capacity(plain.len());
            for m in plain {
                let r = crypto.pick_random_with_rng(&mut *rng);
                cts.push(crypto.encrypt(m, &r)?);
                rands.push(r);
            }
            Ok((cts, rands))
        };
        let (cm, msg_rand) = encrypt_all(messages)?;
        let (cm_star, packed_rand) = encrypt_all(&packed)?;
        let (crj, rj_rand) = encrypt_all(&rj)?;

        let ciphertexts = BatchCiphertexts { cm, cm_star, crj };
        self.witness = Some(BatchWitness {
            flags,
            messages: messages.to_vec(),
            msg_rand,
            packed,
            packed_rand,
            rj,
            rj_rand,
        });
        self.ciphertexts = Some(ciphertexts.clone());
        self.template = None;
        self.circuit = None;
        Ok(ciphertexts)
    }

    /// Accept ciphertexts produced elsewhere (verifier side)
    pub fn set_ciphertexts(&mut self, ciphertexts: BatchCiphertexts) -> Result<()> {
        let layout = &self.layout;
        let n_squared = self.crypto.n_squared();
        for (name, list, expected) in [
            ("message", &ciphertexts.cm, layout.msg_count),
            ("batch", &ciphertexts.cm_star, layout.batch_count),
            ("range", &ciphertexts.crj, layout.range_proof_count),
        ] {
            if list.len() != expected {
                return Err(ZkError::invalid(format!(
                    "expected {expected} {name} ciphertexts, got {}",
                    list.len()
                )));
            }
            if list.iter().any(|c| c >= n_squared) {
                return Err(ZkError::invalid(format!("{name} ciphertext outside Z_N^2")));
            }
        }
        self.ciphertexts = Some(ciphertexts);
        self.witness = None;
        self.template = None;
        self.circuit = None;
        Ok(())
    }

    /// Byte length of the mask material ℓ
    pub fn lj_length(&self) -> usize {
        self.layout.ljir_len()
    }

    /// Mask bits ℓ_jir derived from `cm ++ cm* ++ crj`
    ///
    /// Bit `j·msg_count·slots_per_msg + i·slots_per_msg + r`, little-endian
    /// within each byte, is ℓ_jir.
    pub fn calculate_ljir(&self) -> Result<Vec<u8>> {
        let cts = self.require_ciphertexts()?;
        let width = byte_len(self.crypto.n_squared());
        let mut t = Transcript::new(RANGE_MASK);
        t.append_elements(&cts.cm, width);
        t.append_elements(&cts.cm_star, width);
        t.append_elements(&cts.crj, width);
        Ok(t.expand(self.lj_length()))
    }

    /// `L_j = R_j + Σ ℓ_jir·bit_ir mod N²`
    pub fn calculate_lj(&self, ljir: &[u8]) -> Result<Vec<BigUint>> {
        let witness = self
            .witness
            .as_ref()
            .ok_or_else(|| ZkError::Protocol("L_j needs the plaintexts; call encrypt first".into()))?;
        self.check_ljir(ljir)?;
        let p = self.crypto.n_squared();
        let lj = (0..self.layout.range_proof_count)
            .map(|j| {
                let mut acc = witness.rj[j].clone();
                for (i, flags) in witness.flags.iter().enumerate() {
                    for (r, &bit) in flags.iter().enumerate() {
                        if bit && self.mask_bit(ljir, j, i, r) {
                            acc += 1u32;
                        }
                    }
                }
                acc % p
            })
            .collect();
        Ok(lj)
    }

    fn require_ciphertexts(&self) -> Result<&BatchCiphertexts> {
        self.ciphertexts
            .as_ref()
            .ok_or_else(|| ZkError::Protocol("no ciphertexts; call encrypt or set_ciphertexts".into()))
    }

    fn check_ljir(&self, ljir: &[u8]) -> Result<()> {
        if ljir.len() != self.lj_length() {
            return Err(ZkError::invalid(format!(
                "mask material is {} bytes, expected {}",
                ljir.len(),
                self.lj_length()
            )));
        }
        Ok(())
    }

    fn mask_bit(&self, ljir: &[u8], j: usize, i: usize, r: usize) -> bool {
        let spm = self.layout.slots_per_msg;
        let k = j * self.layout.msg_count * spm + i * spm + r;
        (ljir[k >> 3] >> (k & 7)) & 1 == 1
    }

    fn bit_gate(&self, i: usize, r: usize) -> usize {
        self.enc_gates * self.layout.encryption_count() + i * self.layout.slots_per_msg + r
    }

    fn range_offset(&self) -> usize {
        self.enc_gates * self.layout.msg_count
    }

    fn batch_offset(&self) -> usize {
        self.range_offset() + self.enc_gates * self.layout.range_proof_count
    }

    /// Build every gate and constraint of the statement
    pub fn wire_up(&mut self, ljir: &[u8], lj: &[BigUint]) -> Result<()> {
        self.check_ljir(ljir)?;
        if lj.len() != self.layout.range_proof_count {
            return Err(ZkError::invalid(format!(
                "expected {} range values, got {}",
                self.layout.range_proof_count,
                lj.len()
            )));
        }
        let cts = self.require_ciphertexts()?.clone();
        let group = self.crypto.group_params().clone();
        let n = self.crypto.public_key();
        let layout = &self.layout;
        let slots = layout.slot_layout()?;

        let mut template = EncryptionCircuit::wire_up(n, group.clone(), &cts.cm[0])?;
        let mut circuit = Circuit::new(group);
        for c in cts.cm.iter().chain(&cts.crj).chain(&cts.cm_star) {
            template.update_cipher(c)?;
            circuit.append(template.circuit())?;
        }

        // b·(b − 1) = 0 via a − b = 1, c = 0
        let first_bit = circuit.add_gates(layout.bit_count());
        for g in first_bit..first_bit + layout.bit_count() {
            let q = circuit.add_linear();
            circuit.constrain_i64(q, Wire::A, g, 1)?;
            circuit.constrain_i64(q, Wire::B, g, -1)?;
            circuit.set_constant(q, BigUint::from(1u32))?;
            let q = circuit.add_linear();
            circuit.constrain_i64(q, Wire::C, g, 1)?;
        }

        // m_i = Σ_r 2^(slot_bits·r)·bit_ir
        for i in 0..layout.msg_count {
            let q = circuit.add_linear();
            circuit.constrain_i64(q, Wire::A, self.enc_gates * i, -1)?;
            for r in 0..layout.slots_per_msg {
                circuit.constrain(q, Wire::A, self.bit_gate(i, r), &slots.slot_weight(r))?;
            }
        }

        // R_j + Σ ℓ_jir·bit_ir = L_j
        for (j, l) in lj.iter().enumerate() {
            let q = circuit.add_linear();
            circuit.constrain_i64(q, Wire::A, self.range_offset() + self.enc_gates * j, 1)?;
            for i in 0..layout.msg_count {
                for r in 0..layout.slots_per_msg {
                    if self.mask_bit(ljir, j, i, r) {
                        circuit.constrain_i64(q, Wire::A, self.bit_gate(i, r), 1)?;
                    }
                }
            }
            circuit.set_constant(q, l.clone())?;
        }

        // m*_b = Σ 2^(j·slots_per_msg + r)·bit_(b·mpb+j),r
        for b in 0..layout.batch_count {
            let q = circuit.add_linear();
            circuit.constrain_i64(q, Wire::A, self.batch_offset() + self.enc_gates * b, -1)?;
            for (j, i) in layout.batch_members(b).enumerate() {
                for r in 0..layout.slots_per_msg {
                    let weight = BigUint::from(1u32) << (j * layout.slots_per_msg + r);
                    circuit.constrain(q, Wire::A, self.bit_gate(i, r), &weight)?;
                }
            }
        }

        debug!(
            "batch circuit wired: {} gates, {} constraints",
            circuit.gate_count(),
            circuit.linear_count()
        );
        self.template = Some(template);
        self.circuit = Some(circuit);
        Ok(())
    }

    /// Assign every wire from the plaintexts and randomness
    pub fn run(&mut self) -> Result<()> {
        let witness = self
            .witness
            .as_ref()
            .ok_or_else(|| ZkError::Protocol("run needs the plaintexts; call encrypt first".into()))?;
        let (template, circuit) = match (self.template.as_mut(), self.circuit.as_mut()) {
            (Some(t), Some(c)) => (t, c),
            _ => return Err(ZkError::Protocol("run called before wire_up".into())),
        };
        let enc_gates = self.enc_gates;
        let range_offset = enc_gates * self.layout.msg_count;
        let batch_offset = range_offset + enc_gates * self.layout.range_proof_count;

        let runs = [
            (0, &witness.messages, &witness.msg_rand),
            (range_offset, &witness.rj, &witness.rj_rand),
            (batch_offset, &witness.packed, &witness.packed_rand),
        ];
        for (offset, plain, rand) in runs {
            for (k, (m, r)) in plain.iter().zip(rand).enumerate() {
                template.run(m, r)?;
                circuit.assign_values(template.circuit(), offset + enc_gates * k)?;
            }
        }

        let field = circuit.field().clone();
        let one = BigUint::from(1u32);
        let first_bit = enc_gates * self.layout.encryption_count();
        for (i, flags) in witness.flags.iter().enumerate() {
            for (r, &bit) in flags.iter().enumerate() {
                let g = first_bit + i * self.layout.slots_per_msg + r;
                let b = if bit { one.clone() } else { BigUint::from(0u32) };
                circuit.set_value(Wire::B, g, field.sub(&b, &one))?;
                circuit.set_value(Wire::A, g, b)?;
            }
        }
        Ok(())
    }

    /// The wired-up circuit, for inspection
    pub fn circuit(&self) -> Option<&Circuit> {
        self.circuit.as_ref()
    }

    /// Hand the assigned circuit to a prover; plaintexts are dropped
    pub fn generate_prover(&mut self) -> Result<CircuitZkpProver> {
        self.generate_prover_with(&GeneratorSetup::Sequential)
    }

    pub fn generate_prover_with(&mut self, setup: &GeneratorSetup) -> Result<CircuitZkpProver> {
        let circuit = self.take_circuit()?;
        self.witness = None;
        circuit.into_prover_with(setup)
    }

    /// Hand the wired-up circuit to a verifier
    pub fn generate_verifier(&mut self) -> Result<CircuitZkpVerifier> {
        self.generate_verifier_with(&GeneratorSetup::Sequential)
    }

    pub fn generate_verifier_with(&mut self, setup: &GeneratorSetup) -> Result<CircuitZkpVerifier> {
        self.take_circuit()?.into_verifier_with(setup)
    }

    fn take_circuit(&mut self) -> Result<Circuit> {
        self.template = None;
        self.circuit
            .take()
            .ok_or_else(|| ZkError::Protocol("circuit has not been wired up".into()))
    }
}
