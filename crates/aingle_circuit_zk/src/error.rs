//! Error types for circuit and proof operations

use thiserror::Error;

/// Result type for circuit ZK operations
pub type Result<T> = std::result::Result<T, ZkError>;

/// Circuit ZK errors
///
/// Verification failures are not errors: [`crate::CircuitZkpVerifier::verify`]
/// reports them as `false`.
#[derive(Debug, Error)]
pub enum ZkError {
    /// Precondition violation (dimensions, element counts, reshape overflow)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The prover's witness does not satisfy its own constraint system
    #[error("Inconsistent witness: {0}")]
    InconsistentWitness(String),

    /// Operation invoked out of protocol order
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Element has no inverse under the working modulus
    #[error("Not invertible: {0}")]
    NotInvertible(String),

    /// Key or group parameter generation failed
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for ZkError {
    fn from(err: serde_json::Error) -> Self {
        ZkError::SerializationError(err.to_string())
    }
}

impl ZkError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ZkError::InvalidArgument(msg.into())
    }
}
