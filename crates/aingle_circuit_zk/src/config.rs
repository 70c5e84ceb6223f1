//! Batch proof configuration
//!
//! [`BatchConfig`] fixes the statement being proven: how many messages are
//! encrypted, how they are sliced into slots, how many range proofs bind
//! them, and the Paillier key size.
//!
//! # Presets
//!
//! - [`BatchConfig::default()`] - 150 messages of 4-byte slots, 15 per
//!   batch, 3 range proofs, 256-byte key
//! - [`BatchConfig::test_mode()`] - a handful of messages under a 64-bit key
//! - [`BatchConfig::from_env()`] - defaults overridden from `AINGLE_ZK_*`
//!
//! # Examples
//!
//! ```
//! # use aingle_circuit_zk::BatchConfig;
//! let mut config = BatchConfig::test_mode();
//! config.msg_count = 6;
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, ZkError};

/// Overrides [`BatchConfig::msg_count`]
pub const ENV_MSG_COUNT: &str = "AINGLE_ZK_MSG_COUNT";
/// Overrides [`BatchConfig::range_proof_count`]
pub const ENV_RANGE_PROOFS: &str = "AINGLE_ZK_RANGE_PROOFS";
/// Overrides [`BatchConfig::slot_size`]
pub const ENV_SLOT_SIZE: &str = "AINGLE_ZK_SLOT_SIZE";
/// Overrides [`BatchConfig::msg_per_batch`]
pub const ENV_MSG_PER_BATCH: &str = "AINGLE_ZK_MSG_PER_BATCH";
/// Overrides [`BatchConfig::key_bytes`]
pub const ENV_KEY_BYTES: &str = "AINGLE_ZK_KEY_BYTES";

/// Parameters of a batch encryption statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of encrypted messages
    pub msg_count: usize,
    /// Number of randomized range proofs over the slot bits
    pub range_proof_count: usize,
    /// Slot width in bytes
    pub slot_size: usize,
    /// Messages packed into each batch ciphertext
    pub msg_per_batch: usize,
    /// Paillier modulus length in bytes
    pub key_bytes: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            msg_count: 150,
            range_proof_count: 3,
            slot_size: 4,
            msg_per_batch: 15,
            key_bytes: 256,
        }
    }
}

impl BatchConfig {
    /// Small statement for tests: 4 messages, 8 one-byte slots, 64-bit key
    pub fn test_mode() -> Self {
        Self {
            msg_count: 4,
            range_proof_count: 2,
            slot_size: 1,
            msg_per_batch: 2,
            key_bytes: 8,
        }
    }

    /// Defaults overridden by any parseable `AINGLE_ZK_*` variable
    ///
    /// - `AINGLE_ZK_MSG_COUNT`
    /// - `AINGLE_ZK_RANGE_PROOFS`
    /// - `AINGLE_ZK_SLOT_SIZE`
    /// - `AINGLE_ZK_MSG_PER_BATCH`
    /// - `AINGLE_ZK_KEY_BYTES`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let read = |name: &str| std::env::var(name).ok().and_then(|v| v.trim().parse::<usize>().ok());

        if let Some(v) = read(ENV_MSG_COUNT) {
            config.msg_count = v;
        }
        if let Some(v) = read(ENV_RANGE_PROOFS) {
            config.range_proof_count = v;
        }
        if let Some(v) = read(ENV_SLOT_SIZE) {
            config.slot_size = v;
        }
        if let Some(v) = read(ENV_MSG_PER_BATCH) {
            config.msg_per_batch = v;
        }
        if let Some(v) = read(ENV_KEY_BYTES) {
            config.key_bytes = v;
        }
        config
    }

    /// Slots per message for this key and slot size
    pub fn slots_per_msg(&self) -> usize {
        if self.slot_size == 0 {
            0
        } else {
            self.key_bytes / self.slot_size
        }
    }

    /// Rejects zero counts, slots wider than a message and batches whose
    /// packed slot bits would not fit below the modulus
    ///
    /// # Errors
    ///
    /// Returns [`ZkError::Config`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("msg_count", self.msg_count),
            ("range_proof_count", self.range_proof_count),
            ("slot_size", self.slot_size),
            ("msg_per_batch", self.msg_per_batch),
            ("key_bytes", self.key_bytes),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(ZkError::Config(format!("{name} must be non-zero")));
            }
        }
        if self.key_bytes % 2 != 0 {
            return Err(ZkError::Config(format!(
                "key_bytes must be even, got {}",
                self.key_bytes
            )));
        }
        if self.slot_size > self.key_bytes {
            return Err(ZkError::Config(format!(
                "slot_size {} exceeds the {}-byte message",
                self.slot_size, self.key_bytes
            )));
        }
        // the key is generated with exactly key_bytes bytes, so its bit
        // length is at least 8·key_bytes − 7
        let packed = self.slots_per_msg() * self.msg_per_batch;
        if packed >= 8 * self.key_bytes - 7 {
            return Err(ZkError::Config(format!(
                "{} messages of {} slots do not fit below a {}-byte modulus",
                self.msg_per_batch,
                self.slots_per_msg(),
                self.key_bytes
            )));
        }
        Ok(())
    }
}
