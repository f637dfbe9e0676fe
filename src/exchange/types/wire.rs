//! Canonical wire actions.
//!
//! These are the exact mappings the exchange hashes and receives: key names,
//! key order and value types are fixed here. Field order matters, since
//! MessagePack encodes struct fields in declaration order.

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ActionKind, Cloid, Signature, rmp_hash};
use crate::exchange::{
    Chain,
    error::{Error, Result},
};

/// Time in force of a limit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum TimeInForce {
    /// Add liquidity only (post-only).
    Alo,
    /// Immediate or cancel.
    Ioc,
    /// Good till cancel.
    Gtc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LimitOrder {
    pub tif: TimeInForce,
}

/// `{"limit": {"tif": ...}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderType {
    pub limit: LimitOrder,
}

impl OrderType {
    pub const fn limit(tif: TimeInForce) -> Self {
        Self {
            limit: LimitOrder { tif },
        }
    }
}

/// A single order as the exchange receives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWire {
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "b")]
    pub is_buy: bool,
    #[serde(rename = "p")]
    pub limit_px: String,
    #[serde(rename = "s")]
    pub sz: String,
    #[serde(rename = "r")]
    pub reduce_only: bool,
    #[serde(rename = "t")]
    pub order_type: OrderType,
}

/// Builder attached to an order batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderWire {
    /// Lower-case builder address.
    #[serde(rename = "b")]
    pub builder: String,
    #[serde(rename = "maxFee")]
    pub max_fee: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAction {
    pub orders: Vec<OrderWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder: Option<BuilderWire>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelWire {
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "o")]
    pub oid: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAction {
    pub cancels: Vec<CancelWire>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelByCloidWire {
    pub asset: u32,
    pub cloid: Cloid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelByCloidAction {
    pub cancels: Vec<CancelByCloidWire>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeverageAction {
    pub asset: u32,
    pub is_cross: bool,
    pub leverage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIsolatedMarginAction {
    pub asset: u32,
    pub is_buy: bool,
    /// Margin delta in micro-dollars.
    pub ntli: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetReferrerAction {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSubAccountAction {
    pub name: String,
}

// User-signed actions. Each one carries the signature chain id and the
// network it was signed for, and is itself the EIP-712 message.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsdSendAction {
    pub signature_chain_id: String,
    pub aster_chain: Chain,
    pub destination: String,
    pub amount: String,
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotSendAction {
    pub signature_chain_id: String,
    pub aster_chain: Chain,
    pub destination: String,
    pub token: String,
    pub amount: String,
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawAction {
    pub signature_chain_id: String,
    pub aster_chain: Chain,
    pub destination: String,
    pub amount: String,
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveAgentAction {
    pub signature_chain_id: String,
    pub aster_chain: Chain,
    pub agent_address: String,
    /// Omitted from the wire when unnamed, signed as `""`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveBuilderFeeAction {
    pub signature_chain_id: String,
    pub aster_chain: Chain,
    pub max_fee_rate: String,
    pub builder: String,
    pub nonce: u64,
}

/// Signer set of a multi-sig account, embedded as a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSigSigners {
    pub authorized_users: Vec<String>,
    pub threshold: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertToMultiSigUserAction {
    pub signature_chain_id: String,
    pub aster_chain: Chain,
    /// Compact JSON of [`MultiSigSigners`].
    pub signers: String,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDelegateAction {
    pub signature_chain_id: String,
    pub aster_chain: Chain,
    pub validator: String,
    pub wei: u64,
    pub is_undelegate: bool,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAssetAction {
    pub signature_chain_id: String,
    pub aster_chain: Chain,
    pub destination: String,
    pub source_dex: String,
    pub destination_dex: String,
    pub token: String,
    pub amount: String,
    pub from_sub_account: String,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsdClassTransferAction {
    pub signature_chain_id: String,
    pub aster_chain: Chain,
    pub amount: String,
    pub to_perp: bool,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDexAbstractionAction {
    pub signature_chain_id: String,
    pub aster_chain: Chain,
    pub user: String,
    pub enabled: bool,
    pub nonce: u64,
}

/// Payload of a multi-sig envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSigPayload {
    pub multi_sig_user: String,
    pub outer_signer: String,
    pub action: Box<WireAction>,
}

/// An inner action plus the co-signer signatures authorizing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSigAction {
    pub signature_chain_id: String,
    pub signatures: Vec<Signature>,
    pub payload: MultiSigPayload,
}

/// Canonical action, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WireAction {
    Order(OrderAction),
    Cancel(CancelAction),
    CancelByCloid(CancelByCloidAction),
    UpdateLeverage(UpdateLeverageAction),
    UpdateIsolatedMargin(UpdateIsolatedMarginAction),
    SetReferrer(SetReferrerAction),
    CreateSubAccount(CreateSubAccountAction),
    UsdSend(UsdSendAction),
    SpotSend(SpotSendAction),
    #[serde(rename = "withdraw3")]
    Withdraw(WithdrawAction),
    ApproveAgent(ApproveAgentAction),
    ApproveBuilderFee(ApproveBuilderFeeAction),
    ConvertToMultiSigUser(ConvertToMultiSigUserAction),
    TokenDelegate(TokenDelegateAction),
    SendAsset(SendAssetAction),
    UsdClassTransfer(UsdClassTransferAction),
    UserDexAbstraction(UserDexAbstractionAction),
    MultiSig(MultiSigAction),
}

impl WireAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            WireAction::Order(_) => ActionKind::Order,
            WireAction::Cancel(_) => ActionKind::Cancel,
            WireAction::CancelByCloid(_) => ActionKind::CancelByCloid,
            WireAction::UpdateLeverage(_) => ActionKind::UpdateLeverage,
            WireAction::UpdateIsolatedMargin(_) => ActionKind::UpdateIsolatedMargin,
            WireAction::SetReferrer(_) => ActionKind::SetReferrer,
            WireAction::CreateSubAccount(_) => ActionKind::CreateSubAccount,
            WireAction::UsdSend(_) => ActionKind::UsdTransfer,
            WireAction::SpotSend(_) => ActionKind::SpotTransfer,
            WireAction::Withdraw(_) => ActionKind::Withdraw,
            WireAction::ApproveAgent(_) => ActionKind::ApproveAgent,
            WireAction::ApproveBuilderFee(_) => ActionKind::ApproveBuilderFee,
            WireAction::ConvertToMultiSigUser(_) => ActionKind::ConvertToMultiSigUser,
            WireAction::TokenDelegate(_) => ActionKind::TokenDelegate,
            WireAction::SendAsset(_) => ActionKind::SendAsset,
            WireAction::UsdClassTransfer(_) => ActionKind::UsdClassTransfer,
            WireAction::UserDexAbstraction(_) => ActionKind::UserDexAbstraction,
            WireAction::MultiSig(_) => ActionKind::MultiSig,
        }
    }

    #[inline(always)]
    pub fn is_user_signed(&self) -> bool {
        self.kind().is_user_signed()
    }

    /// Returns the action hash used as the phantom agent's connection id.
    ///
    /// See [`rmp_hash`] for the byte layout.
    pub fn hash(
        &self,
        nonce: u64,
        maybe_vault_address: Option<Address>,
        maybe_expires_after: Option<u64>,
    ) -> Result<B256> {
        rmp_hash(self, nonce, maybe_vault_address, maybe_expires_after)
    }

    /// Signature chain id and network of a user-signed action.
    pub fn user_signed_header(&self) -> Option<(&str, Chain)> {
        match self {
            WireAction::UsdSend(UsdSendAction {
                signature_chain_id,
                aster_chain,
                ..
            })
            | WireAction::SpotSend(SpotSendAction {
                signature_chain_id,
                aster_chain,
                ..
            })
            | WireAction::Withdraw(WithdrawAction {
                signature_chain_id,
                aster_chain,
                ..
            })
            | WireAction::ApproveAgent(ApproveAgentAction {
                signature_chain_id,
                aster_chain,
                ..
            })
            | WireAction::ApproveBuilderFee(ApproveBuilderFeeAction {
                signature_chain_id,
                aster_chain,
                ..
            })
            | WireAction::ConvertToMultiSigUser(ConvertToMultiSigUserAction {
                signature_chain_id,
                aster_chain,
                ..
            })
            | WireAction::TokenDelegate(TokenDelegateAction {
                signature_chain_id,
                aster_chain,
                ..
            })
            | WireAction::SendAsset(SendAssetAction {
                signature_chain_id,
                aster_chain,
                ..
            })
            | WireAction::UsdClassTransfer(UsdClassTransferAction {
                signature_chain_id,
                aster_chain,
                ..
            })
            | WireAction::UserDexAbstraction(UserDexAbstractionAction {
                signature_chain_id,
                aster_chain,
                ..
            }) => Some((signature_chain_id.as_str(), *aster_chain)),
            _ => None,
        }
    }

    /// The action as a typed-data message.
    ///
    /// An unnamed agent approval is signed with an empty `agentName`.
    pub fn typed_message(&self) -> Result<Map<String, Value>> {
        let Value::Object(mut message) = serde_json::to_value(self)? else {
            return Err(Error::validation("action", "not a JSON object"));
        };

        if let WireAction::ApproveAgent(ApproveAgentAction {
            agent_name: None, ..
        }) = self
        {
            message.insert("agentName".to_owned(), Value::String(String::new()));
        }

        Ok(message)
    }
}

/// Parses a `0x`-prefixed hex chain id.
pub fn parse_chain_id(signature_chain_id: &str) -> Result<u64> {
    signature_chain_id
        .strip_prefix("0x")
        .and_then(|hex| u64::from_str_radix(hex, 16).ok())
        .ok_or_else(|| {
            Error::validation(
                "signatureChainId",
                format!("{signature_chain_id:?} is not a hex chain id"),
            )
        })
}
