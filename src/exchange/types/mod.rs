//! Exchange action types.
//!
//! - [`request`]: what callers build, with plain `f64` amounts.
//! - [`wire`]: the canonical mappings the exchange hashes and receives.
//! - [`eip712`]: typed-data schemas, domains and hashing.

use std::str::FromStr;

use alloy::primitives::{self, Address, B128, B256, U256, keccak256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::{
    Chain,
    error::{Error, Result},
};

pub mod eip712;
pub mod request;
pub mod solidity;
pub mod wire;

pub use alloy::dyn_abi::TypedData;
pub use eip712::{
    CHAIN_FIELD, Domain, Field, FieldType, Schema, SchemaRegistry, document, typed_data,
};
pub use request::*;
pub use wire::*;

/// Every action the exchange accepts.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub enum ActionKind {
    Order,
    Cancel,
    CancelByCloid,
    UpdateLeverage,
    UpdateIsolatedMargin,
    SetReferrer,
    CreateSubAccount,
    UsdTransfer,
    SpotTransfer,
    Withdraw,
    ApproveAgent,
    ApproveBuilderFee,
    ConvertToMultiSigUser,
    TokenDelegate,
    SendAsset,
    UsdClassTransfer,
    UserDexAbstraction,
    MultiSig,
}

impl ActionKind {
    /// Whether the action is signed as its own typed-data message rather than
    /// through a phantom agent.
    pub const fn is_user_signed(self) -> bool {
        matches!(
            self,
            ActionKind::UsdTransfer
                | ActionKind::SpotTransfer
                | ActionKind::Withdraw
                | ActionKind::ApproveAgent
                | ActionKind::ApproveBuilderFee
                | ActionKind::ConvertToMultiSigUser
                | ActionKind::TokenDelegate
                | ActionKind::SendAsset
                | ActionKind::UsdClassTransfer
                | ActionKind::UserDexAbstraction
        )
    }

    /// The `type` tag of the action on the wire.
    pub const fn wire_type(self) -> &'static str {
        match self {
            ActionKind::Order => "order",
            ActionKind::Cancel => "cancel",
            ActionKind::CancelByCloid => "cancelByCloid",
            ActionKind::UpdateLeverage => "updateLeverage",
            ActionKind::UpdateIsolatedMargin => "updateIsolatedMargin",
            ActionKind::SetReferrer => "setReferrer",
            ActionKind::CreateSubAccount => "createSubAccount",
            ActionKind::UsdTransfer => "usdSend",
            ActionKind::SpotTransfer => "spotSend",
            ActionKind::Withdraw => "withdraw3",
            ActionKind::ApproveAgent => "approveAgent",
            ActionKind::ApproveBuilderFee => "approveBuilderFee",
            ActionKind::ConvertToMultiSigUser => "convertToMultiSigUser",
            ActionKind::TokenDelegate => "tokenDelegate",
            ActionKind::SendAsset => "sendAsset",
            ActionKind::UsdClassTransfer => "usdClassTransfer",
            ActionKind::UserDexAbstraction => "userDexAbstraction",
            ActionKind::MultiSig => "multiSig",
        }
    }
}

/// Client order id. Opaque to the exchange, conventionally 16 bytes of hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(transparent)]
pub struct Cloid(String);

impl Cloid {
    pub fn new(cloid: impl Into<String>) -> Self {
        Self(cloid.into())
    }

    /// A random 16-byte id, `0x` followed by 32 hex digits.
    pub fn random() -> Self {
        Self(const_hex::encode_prefixed(B128::random()))
    }

    #[inline(always)]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<B128> for Cloid {
    fn from(value: B128) -> Self {
        Self(const_hex::encode_prefixed(value))
    }
}

/// ECDSA signature as submitted to the exchange.
///
/// `r` and `s` are 32-byte big-endian words rendered as `0x` hex; `v` is 27 or
/// 28.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    #[serde(with = "word_hex")]
    pub r: B256,
    #[serde(with = "word_hex")]
    pub s: B256,
    pub v: u64,
}

impl From<primitives::Signature> for Signature {
    fn from(sig: primitives::Signature) -> Self {
        Self {
            r: B256::from(sig.r().to_be_bytes::<32>()),
            s: B256::from(sig.s().to_be_bytes::<32>()),
            v: 27 + sig.v() as u64,
        }
    }
}

impl Signature {
    /// Recovers the address that signed `prehash`.
    pub fn recover_address(&self, prehash: &B256) -> Result<Address> {
        let y_parity = match self.v {
            0 | 27 => false,
            1 | 28 => true,
            v => {
                return Err(Error::validation(
                    "v",
                    format!("{v} is not a recovery id"),
                ));
            }
        };
        let sig = primitives::Signature::new(
            U256::from_be_bytes(self.r.0),
            U256::from_be_bytes(self.s.0),
            y_parity,
        );
        Ok(sig.recover_address_from_prehash(prehash)?)
    }
}

mod word_hex {
    use super::*;

    pub fn serialize<S: Serializer>(word: &B256, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&const_hex::encode_prefixed(word))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<B256, D::Error> {
        let s = String::deserialize(deserializer)?;
        B256::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A signed action, ready for submission.
///
/// Serializes to `{"action", "nonce", "signature", "vaultAddress",
/// "expiresAfter"}`, with `null` for absent optional fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub action: WireAction,
    pub nonce: u64,
    pub signature: Signature,
    pub vault_address: Option<Address>,
    pub expires_after: Option<u64>,
}

/// Synthetic `Agent` message signed in place of an agent-signed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhantomAgent {
    pub source: String,
    pub connection_id: B256,
}

impl PhantomAgent {
    pub fn new(connection_id: B256, chain: Chain) -> Self {
        Self {
            source: chain.source().to_owned(),
            connection_id,
        }
    }

    pub(crate) fn message(&self) -> Map<String, Value> {
        let mut message = Map::new();
        message.insert("source".to_owned(), Value::String(self.source.clone()));
        message.insert(
            "connectionId".to_owned(),
            Value::String(const_hex::encode_prefixed(self.connection_id)),
        );
        message
    }
}

/// Hashes a value the way the exchange derives connection ids:
///
/// ```text
/// keccak256(msgpack(value) ‖ nonce_be ‖ 0x00 | 0x01 ‖ vault ‖ [0x00 ‖ expires_be])
/// ```
pub fn rmp_hash<T: Serialize>(
    value: &T,
    nonce: u64,
    maybe_vault_address: Option<Address>,
    maybe_expires_after: Option<u64>,
) -> Result<B256> {
    let mut bytes = rmp_serde::to_vec_named(value)?;
    bytes.extend(nonce.to_be_bytes());

    if let Some(vault_address) = maybe_vault_address {
        bytes.push(1);
        bytes.extend(vault_address.as_slice());
    } else {
        bytes.push(0);
    }

    if let Some(expires_after) = maybe_expires_after {
        bytes.push(0);
        bytes.extend(expires_after.to_be_bytes());
    }

    Ok(keccak256(bytes))
}

/// Lower-case `0x` rendering of an address.
pub(crate) fn lower_hex(address: &Address) -> String {
    const_hex::encode_prefixed(address)
}
