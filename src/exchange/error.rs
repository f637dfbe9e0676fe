use thiserror::Error;

/// Errors produced while encoding or signing an action.
#[derive(Error, Debug)]
pub enum Error {
    /// An amount cannot be put on the wire without losing precision.
    #[error("{value} cannot be represented on the wire: {reason}")]
    Precision { value: f64, reason: &'static str },

    /// A required field is missing or semantically invalid.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The signer refused or failed to sign.
    #[error("signing failed: {0}")]
    Signing(#[from] alloy::signers::Error),

    /// A signature could not be recovered to an address.
    #[error("signature recovery failed: {0}")]
    Recovery(#[from] alloy::primitives::SignatureError),

    /// MessagePack encoding of the canonical action failed.
    #[error("encoding action: {0}")]
    Encoding(#[from] rmp_serde::encode::Error),

    /// A typed-data document could not be resolved or hashed.
    #[error("typed data: {0}")]
    Eip712(#[from] alloy::dyn_abi::Error),

    /// JSON encoding of a typed-data message failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn precision(value: f64, reason: &'static str) -> Self {
        Error::Precision { value, reason }
    }

    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Error::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Whether the error was raised before any key material was touched.
    ///
    /// Precision and validation failures describe the caller's input; fixing the
    /// input and signing again with a fresh nonce is the only way forward.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Error::Precision { .. } | Error::Validation { .. })
    }
}

/// Result type alias for signing operations.
pub type Result<T> = std::result::Result<T, Error>;
