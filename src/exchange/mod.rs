//! Signing core for the Aster exchange.
//!
//! Every state-changing request to the exchange is authorized by an EIP-712
//! signature. Two signing families exist:
//!
//! - **Agent-signed (L1) actions** (orders, cancels, leverage, referrer,
//!   sub-accounts, multi-sig envelopes): the canonical action is MessagePack
//!   encoded, hashed together with the nonce, vault address and expiry, and the
//!   hash is signed through a phantom `Agent` struct.
//! - **User-signed actions** (transfers, withdrawals, agent and builder
//!   approvals, delegation, multi-sig conversion): the action itself is the
//!   EIP-712 message, with a field schema chosen by action kind.
//!
//! The pipeline is a pure function of its inputs. Nonces are owned by the
//! caller; [`NonceHandler`] is provided for callers that sign concurrently.
//!
//! ```
//! use astersdk::exchange::{
//!     Chain, PrivateKeySigner, SigningConfig,
//!     signing::Signable,
//!     types::{Action, BatchCancel, CancelRequest},
//! };
//!
//! let signer = PrivateKeySigner::random();
//! let config = SigningConfig::default();
//!
//! let request = Action::Cancel(BatchCancel {
//!     cancels: vec![CancelRequest { asset: 0, oid: 42 }],
//! })
//! .sign(&signer, 1_700_000_000_000, None, None, Chain::Mainnet, &config)
//! .unwrap();
//!
//! assert_eq!(request.nonce, 1_700_000_000_000);
//! ```

use std::{
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
};

use alloy::primitives::Address;
use chrono::Utc;
use serde::{Deserialize, Serialize};

pub mod client;
pub mod error;
pub mod signing;
pub mod types;
pub mod wire;

pub use alloy::signers::local::PrivateKeySigner;
pub use client::Client;
pub use error::{Error, Result};
pub use types::{Cloid, Signature};

use types::{Domain, SchemaRegistry};

/// Chain id bound into the L1 signing domain.
pub const ASTER_CHAIN_ID: u64 = 592;

/// Domain name of agent-signed actions.
pub const ASTER_DOMAIN_NAME: &str = "AsterDEX";

/// Domain name of user-signed actions.
pub const ASTER_SIGN_DOMAIN_NAME: &str = "AsterSignTransaction";

/// Domain version shared by both families.
pub const ASTER_VERSION: &str = "1";

/// Prefix of user-signed primary types, as in `AsterTransaction:Transfer`.
pub const ASTER_TYPE_PREFIX: &str = "AsterTransaction";

/// Signature chain id carried by multi-sig envelopes.
pub const MULTI_SIG_SIGNATURE_CHAIN_ID: &str = "0x66eee";

/// Network the signature is meant for.
///
/// The chain is part of every signature: agent-signed actions encode it as the
/// phantom agent `source` and user-signed actions carry it as `asterChain`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::IsVariant,
)]
pub enum Chain {
    #[default]
    Mainnet,
    Testnet,
}

impl Chain {
    /// Phantom agent source: `"a"` on mainnet, `"b"` on testnet.
    pub const fn source(self) -> &'static str {
        match self {
            Chain::Mainnet => "a",
            Chain::Testnet => "b",
        }
    }
}

/// Error returned when parsing an unknown chain name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown chain: {0}")]
pub struct ParseChainError(String);

impl FromStr for Chain {
    type Err = ParseChainError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Chain::Mainnet),
            "testnet" => Ok(Chain::Testnet),
            _ => Err(ParseChainError(s.to_owned())),
        }
    }
}

/// Venue constants used to build signing domains and typed-data schemas.
///
/// Built once and passed by reference into every signing call. The default is
/// the Aster mainnet configuration; overrides can be deserialized from a
/// caller's own configuration file:
///
/// ```
/// use astersdk::exchange::SigningConfig;
///
/// let config: SigningConfig = serde_json::from_str(r#"{"chainId": 1337}"#).unwrap();
/// assert_eq!(config.chain_id(), 1337);
/// assert_eq!(config.signature_chain_id(), "0x539");
/// assert_eq!(config.domain_name(), "AsterDEX");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ConfigFields", into = "ConfigFields")]
pub struct SigningConfig {
    fields: ConfigFields,
    schemas: SchemaRegistry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConfigFields {
    chain_id: u64,
    domain_name: String,
    sign_domain_name: String,
    version: String,
    type_prefix: String,
    multi_sig_signature_chain_id: String,
}

impl Default for ConfigFields {
    fn default() -> Self {
        Self {
            chain_id: ASTER_CHAIN_ID,
            domain_name: ASTER_DOMAIN_NAME.to_owned(),
            sign_domain_name: ASTER_SIGN_DOMAIN_NAME.to_owned(),
            version: ASTER_VERSION.to_owned(),
            type_prefix: ASTER_TYPE_PREFIX.to_owned(),
            multi_sig_signature_chain_id: MULTI_SIG_SIGNATURE_CHAIN_ID.to_owned(),
        }
    }
}

impl From<ConfigFields> for SigningConfig {
    fn from(fields: ConfigFields) -> Self {
        let schemas = SchemaRegistry::new(&fields.type_prefix);
        Self { fields, schemas }
    }
}

impl From<SigningConfig> for ConfigFields {
    fn from(config: SigningConfig) -> Self {
        config.fields
    }
}

impl Default for SigningConfig {
    fn default() -> Self {
        ConfigFields::default().into()
    }
}

impl SigningConfig {
    /// Same constants as the default, bound to another chain id.
    pub fn with_chain_id(chain_id: u64) -> Self {
        ConfigFields {
            chain_id,
            ..Default::default()
        }
        .into()
    }

    #[inline(always)]
    pub fn chain_id(&self) -> u64 {
        self.fields.chain_id
    }

    #[inline(always)]
    pub fn domain_name(&self) -> &str {
        &self.fields.domain_name
    }

    #[inline(always)]
    pub fn version(&self) -> &str {
        &self.fields.version
    }

    #[inline(always)]
    pub fn multi_sig_signature_chain_id(&self) -> &str {
        &self.fields.multi_sig_signature_chain_id
    }

    /// Hex chain id injected into user-signed actions, e.g. `0x250`.
    pub fn signature_chain_id(&self) -> String {
        format!("{:#x}", self.fields.chain_id)
    }

    /// Typed-data schemas derived from this configuration.
    #[inline(always)]
    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    /// Domain of agent-signed actions.
    pub fn l1_domain(&self) -> Domain {
        Domain {
            name: self.fields.domain_name.clone(),
            version: self.fields.version.clone(),
            chain_id: self.fields.chain_id,
            verifying_contract: Address::ZERO,
        }
    }

    /// Domain of user-signed actions for the given signature chain id.
    pub fn user_domain(&self, chain_id: u64) -> Domain {
        Domain {
            name: self.fields.sign_domain_name.clone(),
            version: self.fields.version.clone(),
            chain_id,
            verifying_contract: Address::ZERO,
        }
    }
}

/// Strictly increasing millisecond nonces.
///
/// The exchange rejects reused nonces, so callers that sign concurrently for
/// the same account must draw from a single handler. Each call returns the
/// current wall-clock millisecond, or the previous nonce plus one when the
/// clock has not moved forward.
#[derive(Debug, Default)]
pub struct NonceHandler {
    last: AtomicU64,
}

impl NonceHandler {
    /// Returns the next nonce.
    pub fn next(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}
