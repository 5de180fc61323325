//! Admission rejection reasons.

use thiserror::Error;

/// Why an admission request was rejected.
///
/// Every variant is per-request: the store's shared state is unchanged when
/// one of these is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// Submitted key material does not decode as a key.
    #[error("invalid {0}")]
    InvalidCredential(&'static str),

    /// The public key was admitted before.
    #[error("rejected: public key already admitted")]
    DuplicateKey,

    /// The allocation index exceeds what the address scheme can express.
    #[error("network filled, no more peers can be added (index {index})")]
    PoolExhausted { index: usize },

    /// A derived address fell outside its source prefix.
    #[error("error deducing new address in {prefix}")]
    AllocationError { prefix: String },

    /// The processor queue is full; retry later.
    #[error("buffer full, retry later")]
    Backpressure,

    /// The processor is gone (shutting down or failed).
    #[error("processor unavailable")]
    ProcessorClosed,
}

impl AdmissionError {
    /// Short stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            AdmissionError::InvalidCredential(_) => "invalid_credential",
            AdmissionError::DuplicateKey => "duplicate_key",
            AdmissionError::PoolExhausted { .. } => "pool_exhausted",
            AdmissionError::AllocationError { .. } => "allocation_error",
            AdmissionError::Backpressure => "backpressure",
            AdmissionError::ProcessorClosed => "processor_closed",
        }
    }
}
