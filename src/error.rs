use crate::domain::channel::ChannelResult;
use crate::domain::order::OrderState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    /// Rejected input or configuration. Reported to the caller verbatim.
    #[error("{0}")]
    ValidationError(String),

    #[error("merchant order [{mch_order_no}] already exists for merchant {mch_no}")]
    DuplicateOrder { mch_no: String, mch_order_no: String },

    /// A fault raised by a channel adapter. Carries the channel's own verdict.
    #[error("channel error: {message}")]
    ChannelError {
        message: String,
        result: ChannelResult,
    },

    /// A conditional state update found the order outside the expected state.
    #[error("order {pay_order_id} is no longer in state {expected}")]
    StateConflict {
        pay_order_id: String,
        expected: OrderState,
    },

    #[error("channel contract violation: {0}")]
    ContractViolation(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),

    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl PaymentError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(Box::new(std::io::Error::other(message.into())))
    }

    /// Business failures are safe to echo back to the merchant.
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_) | Self::DuplicateOrder { .. } | Self::ContractViolation(_)
        )
    }
}

pub type Result<T, E = PaymentError> = std::result::Result<T, E>;
