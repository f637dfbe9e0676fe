//! Caller-facing action requests.
//!
//! Requests carry amounts as `f64` and addresses as [`Address`]. They are
//! validated and converted to their canonical [`WireAction`] by
//! [`Action::canonicalize`]; nothing is hashed or signed before that step
//! succeeds.

use alloy::primitives::Address;

use super::{
    ActionKind, Cloid, lower_hex,
    wire::{
        ApproveAgentAction, ApproveBuilderFeeAction, BuilderWire, CancelAction,
        CancelByCloidAction, CancelByCloidWire, CancelWire, ConvertToMultiSigUserAction,
        CreateSubAccountAction, MultiSigAction, MultiSigSigners, OrderAction, OrderType, OrderWire,
        SendAssetAction, SetReferrerAction, SpotSendAction, TokenDelegateAction,
        UpdateIsolatedMarginAction, UpdateLeverageAction, UsdClassTransferAction, UsdSendAction,
        UserDexAbstractionAction, WireAction, WithdrawAction,
    },
};
use crate::exchange::{
    Chain, SigningConfig,
    error::{Error, Result},
    wire::{float_to_usd_int, float_to_wire},
};

/// A single limit order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub asset: u32,
    pub is_buy: bool,
    pub limit_px: f64,
    pub sz: f64,
    pub reduce_only: bool,
    pub order_type: OrderType,
    /// Caller-side tag for tracking the order. The exchange order carries no
    /// client id, so it is neither sent nor signed; cancel by cloid with
    /// [`CancelByCloidRequest`].
    pub cloid: Option<Cloid>,
}

/// Builder fee attached to an order batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderInfo {
    pub builder: Address,
    pub max_fee: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOrder {
    pub orders: Vec<OrderRequest>,
    pub builder: Option<BuilderInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelRequest {
    pub asset: u32,
    pub oid: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCancel {
    pub cancels: Vec<CancelRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelByCloidRequest {
    pub asset: u32,
    pub cloid: Cloid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCancelCloid {
    pub cancels: Vec<CancelByCloidRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateLeverage {
    pub asset: u32,
    pub is_cross: bool,
    pub leverage: u32,
}

/// Adds (positive) or removes (negative) isolated margin, in USD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateIsolatedMargin {
    pub asset: u32,
    pub is_buy: bool,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetReferrer {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSubAccount {
    pub name: String,
}

/// USD transfer to another account. `time` doubles as the nonce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsdSend {
    pub destination: Address,
    pub amount: f64,
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpotSend {
    pub destination: Address,
    pub token: String,
    pub amount: f64,
    pub time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Withdraw {
    pub destination: Address,
    pub amount: f64,
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproveAgent {
    pub agent_address: Address,
    pub agent_name: Option<String>,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproveBuilderFee {
    pub builder: Address,
    /// Percentage string, e.g. `0.001%`.
    pub max_fee_rate: String,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertToMultiSigUser {
    pub authorized_users: Vec<Address>,
    pub threshold: usize,
    pub nonce: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenDelegate {
    pub validator: Address,
    pub wei: u64,
    pub is_undelegate: bool,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendAsset {
    pub destination: Address,
    pub source_dex: String,
    pub destination_dex: String,
    pub token: String,
    pub amount: f64,
    /// Sub-account the asset leaves from, if any.
    pub from_sub_account: Option<Address>,
    pub nonce: u64,
}

/// Moves USD between the spot and perp balances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsdClassTransfer {
    pub amount: f64,
    pub to_perp: bool,
    /// Sub-account the transfer applies to, if any.
    pub sub_account: Option<Address>,
    pub nonce: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserDexAbstraction {
    pub user: Address,
    pub enabled: bool,
    pub nonce: u64,
}

/// Action requested by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Order(BatchOrder),
    Cancel(BatchCancel),
    CancelByCloid(BatchCancelCloid),
    UpdateLeverage(UpdateLeverage),
    UpdateIsolatedMargin(UpdateIsolatedMargin),
    SetReferrer(SetReferrer),
    CreateSubAccount(CreateSubAccount),
    UsdSend(UsdSend),
    SpotSend(SpotSend),
    Withdraw(Withdraw),
    ApproveAgent(ApproveAgent),
    ApproveBuilderFee(ApproveBuilderFee),
    ConvertToMultiSigUser(ConvertToMultiSigUser),
    TokenDelegate(TokenDelegate),
    SendAsset(SendAsset),
    UsdClassTransfer(UsdClassTransfer),
    UserDexAbstraction(UserDexAbstraction),
    /// Already canonical: the inner action was signed by the co-signers.
    MultiSig(MultiSigAction),
}

impl From<BatchOrder> for Action {
    fn from(value: BatchOrder) -> Self {
        Action::Order(value)
    }
}

impl From<BatchCancel> for Action {
    fn from(value: BatchCancel) -> Self {
        Action::Cancel(value)
    }
}

impl From<BatchCancelCloid> for Action {
    fn from(value: BatchCancelCloid) -> Self {
        Action::CancelByCloid(value)
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Order(_) => ActionKind::Order,
            Action::Cancel(_) => ActionKind::Cancel,
            Action::CancelByCloid(_) => ActionKind::CancelByCloid,
            Action::UpdateLeverage(_) => ActionKind::UpdateLeverage,
            Action::UpdateIsolatedMargin(_) => ActionKind::UpdateIsolatedMargin,
            Action::SetReferrer(_) => ActionKind::SetReferrer,
            Action::CreateSubAccount(_) => ActionKind::CreateSubAccount,
            Action::UsdSend(_) => ActionKind::UsdTransfer,
            Action::SpotSend(_) => ActionKind::SpotTransfer,
            Action::Withdraw(_) => ActionKind::Withdraw,
            Action::ApproveAgent(_) => ActionKind::ApproveAgent,
            Action::ApproveBuilderFee(_) => ActionKind::ApproveBuilderFee,
            Action::ConvertToMultiSigUser(_) => ActionKind::ConvertToMultiSigUser,
            Action::TokenDelegate(_) => ActionKind::TokenDelegate,
            Action::SendAsset(_) => ActionKind::SendAsset,
            Action::UsdClassTransfer(_) => ActionKind::UsdClassTransfer,
            Action::UserDexAbstraction(_) => ActionKind::UserDexAbstraction,
            Action::MultiSig(_) => ActionKind::MultiSig,
        }
    }

    /// Validates the request and produces its canonical wire action.
    ///
    /// User-signed actions get the configured signature chain id and `chain`
    /// injected; agent-signed actions do not depend on either.
    pub fn canonicalize(&self, chain: Chain, config: &SigningConfig) -> Result<WireAction> {
        let signature_chain_id = config.signature_chain_id();

        let wire = match self {
            Action::Order(batch) => {
                non_empty_batch("orders", batch.orders.len())?;
                let orders = batch
                    .orders
                    .iter()
                    .map(order_wire)
                    .collect::<Result<Vec<_>>>()?;
                let builder = batch
                    .builder
                    .as_ref()
                    .map(|info| -> Result<BuilderWire> {
                        non_empty("maxFee", &info.max_fee)?;
                        Ok(BuilderWire {
                            builder: lower_hex(&info.builder),
                            max_fee: info.max_fee.clone(),
                        })
                    })
                    .transpose()?;
                WireAction::Order(OrderAction { orders, builder })
            }
            Action::Cancel(batch) => {
                non_empty_batch("cancels", batch.cancels.len())?;
                WireAction::Cancel(CancelAction {
                    cancels: batch
                        .cancels
                        .iter()
                        .map(|cancel| CancelWire {
                            asset: cancel.asset,
                            oid: cancel.oid,
                        })
                        .collect(),
                })
            }
            Action::CancelByCloid(batch) => {
                non_empty_batch("cancels", batch.cancels.len())?;
                let cancels = batch
                    .cancels
                    .iter()
                    .map(|cancel| {
                        non_empty("cloid", cancel.cloid.as_str())?;
                        Ok(CancelByCloidWire {
                            asset: cancel.asset,
                            cloid: cancel.cloid.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                WireAction::CancelByCloid(CancelByCloidAction { cancels })
            }
            Action::UpdateLeverage(update) => {
                if update.leverage == 0 {
                    return Err(Error::validation("leverage", "must be at least 1"));
                }
                WireAction::UpdateLeverage(UpdateLeverageAction {
                    asset: update.asset,
                    is_cross: update.is_cross,
                    leverage: update.leverage,
                })
            }
            Action::UpdateIsolatedMargin(update) => {
                let ntli = float_to_usd_int(update.amount)?;
                if ntli == 0 {
                    return Err(Error::validation("amount", "must not be zero"));
                }
                WireAction::UpdateIsolatedMargin(UpdateIsolatedMarginAction {
                    asset: update.asset,
                    is_buy: update.is_buy,
                    ntli,
                })
            }
            Action::SetReferrer(referrer) => {
                non_empty("code", &referrer.code)?;
                WireAction::SetReferrer(SetReferrerAction {
                    code: referrer.code.clone(),
                })
            }
            Action::CreateSubAccount(sub_account) => {
                non_empty("name", &sub_account.name)?;
                WireAction::CreateSubAccount(CreateSubAccountAction {
                    name: sub_account.name.clone(),
                })
            }
            Action::UsdSend(send) => WireAction::UsdSend(UsdSendAction {
                signature_chain_id,
                aster_chain: chain,
                destination: lower_hex(&send.destination),
                amount: positive_amount(send.amount)?,
                time: send.time,
            }),
            Action::SpotSend(send) => {
                non_empty("token", &send.token)?;
                WireAction::SpotSend(SpotSendAction {
                    signature_chain_id,
                    aster_chain: chain,
                    destination: lower_hex(&send.destination),
                    token: send.token.clone(),
                    amount: positive_amount(send.amount)?,
                    time: send.time,
                })
            }
            Action::Withdraw(withdraw) => WireAction::Withdraw(WithdrawAction {
                signature_chain_id,
                aster_chain: chain,
                destination: lower_hex(&withdraw.destination),
                amount: positive_amount(withdraw.amount)?,
                time: withdraw.time,
            }),
            Action::ApproveAgent(approve) => WireAction::ApproveAgent(ApproveAgentAction {
                signature_chain_id,
                aster_chain: chain,
                agent_address: lower_hex(&approve.agent_address),
                agent_name: approve.agent_name.clone(),
                nonce: approve.nonce,
            }),
            Action::ApproveBuilderFee(approve) => {
                non_empty("maxFeeRate", &approve.max_fee_rate)?;
                WireAction::ApproveBuilderFee(ApproveBuilderFeeAction {
                    signature_chain_id,
                    aster_chain: chain,
                    max_fee_rate: approve.max_fee_rate.clone(),
                    builder: lower_hex(&approve.builder),
                    nonce: approve.nonce,
                })
            }
            Action::ConvertToMultiSigUser(convert) => {
                let signers = multi_sig_signers(&convert.authorized_users, convert.threshold)?;
                WireAction::ConvertToMultiSigUser(ConvertToMultiSigUserAction {
                    signature_chain_id,
                    aster_chain: chain,
                    signers: serde_json::to_string(&signers)?,
                    nonce: convert.nonce,
                })
            }
            Action::TokenDelegate(delegate) => {
                if delegate.wei == 0 {
                    return Err(Error::validation("wei", "must be positive"));
                }
                WireAction::TokenDelegate(TokenDelegateAction {
                    signature_chain_id,
                    aster_chain: chain,
                    validator: lower_hex(&delegate.validator),
                    wei: delegate.wei,
                    is_undelegate: delegate.is_undelegate,
                    nonce: delegate.nonce,
                })
            }
            Action::SendAsset(send) => {
                non_empty("token", &send.token)?;
                WireAction::SendAsset(SendAssetAction {
                    signature_chain_id,
                    aster_chain: chain,
                    destination: lower_hex(&send.destination),
                    source_dex: send.source_dex.clone(),
                    destination_dex: send.destination_dex.clone(),
                    token: send.token.clone(),
                    amount: positive_amount(send.amount)?,
                    from_sub_account: send
                        .from_sub_account
                        .as_ref()
                        .map(lower_hex)
                        .unwrap_or_default(),
                    nonce: send.nonce,
                })
            }
            Action::UsdClassTransfer(transfer) => {
                let mut amount = positive_amount(transfer.amount)?;
                if let Some(sub_account) = &transfer.sub_account {
                    amount = format!("{amount} subaccount:{}", lower_hex(sub_account));
                }
                WireAction::UsdClassTransfer(UsdClassTransferAction {
                    signature_chain_id,
                    aster_chain: chain,
                    amount,
                    to_perp: transfer.to_perp,
                    nonce: transfer.nonce,
                })
            }
            Action::UserDexAbstraction(abstraction) => {
                WireAction::UserDexAbstraction(UserDexAbstractionAction {
                    signature_chain_id,
                    aster_chain: chain,
                    user: lower_hex(&abstraction.user),
                    enabled: abstraction.enabled,
                    nonce: abstraction.nonce,
                })
            }
            Action::MultiSig(multi_sig) => {
                validate_multi_sig(multi_sig)?;
                WireAction::MultiSig(multi_sig.clone())
            }
        };

        Ok(wire)
    }
}

fn order_wire(order: &OrderRequest) -> Result<OrderWire> {
    if order.sz.is_nan() || order.sz <= 0.0 {
        return Err(Error::validation("sz", format!("{} is not positive", order.sz)));
    }
    if order.limit_px.is_nan() || order.limit_px <= 0.0 {
        return Err(Error::validation(
            "limitPx",
            format!("{} is not positive", order.limit_px),
        ));
    }
    Ok(OrderWire {
        asset: order.asset,
        is_buy: order.is_buy,
        limit_px: float_to_wire(order.limit_px)?,
        sz: float_to_wire(order.sz)?,
        reduce_only: order.reduce_only,
        order_type: order.order_type,
    })
}

fn positive_amount(amount: f64) -> Result<String> {
    if amount.is_nan() || amount <= 0.0 {
        return Err(Error::validation("amount", format!("{amount} is not positive")));
    }
    float_to_wire(amount)
}

fn non_empty(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::validation(field, "must not be empty"));
    }
    Ok(())
}

fn non_empty_batch(field: &'static str, len: usize) -> Result<()> {
    if len == 0 {
        return Err(Error::validation(field, "batch is empty"));
    }
    Ok(())
}

/// Lower-cased, sorted and deduplicated signer set.
fn multi_sig_signers(authorized_users: &[Address], threshold: usize) -> Result<MultiSigSigners> {
    let mut users: Vec<String> = authorized_users.iter().map(lower_hex).collect();
    users.sort();
    users.dedup();

    if users.len() != authorized_users.len() {
        return Err(Error::validation("authorizedUsers", "contains duplicates"));
    }
    if threshold == 0 || threshold > users.len() {
        return Err(Error::validation(
            "threshold",
            format!("{threshold} is outside 1..={}", users.len()),
        ));
    }

    Ok(MultiSigSigners {
        authorized_users: users,
        threshold,
    })
}

pub(crate) fn validate_multi_sig(action: &MultiSigAction) -> Result<()> {
    if matches!(*action.payload.action, WireAction::MultiSig(_)) {
        return Err(Error::validation("action", "multi-sig actions cannot be nested"));
    }
    if action.signatures.is_empty() {
        return Err(Error::validation("signatures", "no co-signer signatures"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;
    use crate::exchange::types::{MultiSigPayload, Signature, TimeInForce};

    const DESTINATION: Address = address!("0x0D1d9635D0640821d15e323ac8AdADfA9c111414");

    fn order(sz: f64, limit_px: f64) -> OrderRequest {
        OrderRequest {
            asset: 0,
            is_buy: true,
            limit_px,
            sz,
            reduce_only: false,
            order_type: OrderType::limit(TimeInForce::Gtc),
            cloid: None,
        }
    }

    fn canonicalize(action: Action) -> Result<WireAction> {
        action.canonicalize(Chain::Mainnet, &SigningConfig::default())
    }

    fn to_json(action: Action) -> String {
        serde_json::to_string(&canonicalize(action).unwrap()).unwrap()
    }

    #[test]
    fn test_order_wire() {
        let json = to_json(Action::Order(BatchOrder {
            orders: vec![order(0.5, 50000.0)],
            builder: None,
        }));
        assert_eq!(
            json,
            r#"{"type":"order","orders":[{"a":0,"b":true,"p":"50000","s":"0.5","r":false,"t":{"limit":{"tif":"Gtc"}}}]}"#
        );
    }

    #[test]
    fn test_order_cloid_is_not_on_the_wire() {
        let config = SigningConfig::default();
        let batch = |cloid: Option<Cloid>| {
            Action::Order(BatchOrder {
                orders: vec![OrderRequest {
                    cloid,
                    ..order(1.0, 2.5)
                }],
                builder: None,
            })
            .canonicalize(Chain::Mainnet, &config)
            .unwrap()
        };

        let plain = batch(None);
        let tagged = batch(Some(Cloid::new("0x00000000000000000000000000000001")));
        assert_eq!(tagged, plain);
        assert_eq!(
            tagged.hash(1, None, None).unwrap(),
            plain.hash(1, None, None).unwrap()
        );

        let json = serde_json::to_value(&tagged).unwrap();
        let keys: Vec<&str> = json["orders"][0]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys.len(), 6);
        for key in ["a", "b", "p", "s", "r", "t"] {
            assert!(keys.contains(&key), "{key}");
        }
    }

    #[test]
    fn test_order_with_builder() {
        let json = to_json(Action::Order(BatchOrder {
            orders: vec![order(1.0, 2.5)],
            builder: Some(BuilderInfo {
                builder: DESTINATION,
                max_fee: "10".to_owned(),
            }),
        }));
        assert_eq!(
            json,
            r#"{"type":"order","orders":[{"a":0,"b":true,"p":"2.5","s":"1","r":false,"t":{"limit":{"tif":"Gtc"}}}],"builder":{"b":"0x0d1d9635d0640821d15e323ac8adadfa9c111414","maxFee":"10"}}"#
        );

        let err = Action::Order(BatchOrder {
            orders: vec![order(1.0, 2.5)],
            builder: Some(BuilderInfo {
                builder: DESTINATION,
                max_fee: String::new(),
            }),
        })
        .canonicalize(Chain::Mainnet, &SigningConfig::default())
        .unwrap_err();
        assert!(matches!(err, Error::Validation { field: "maxFee", .. }));
    }

    #[test]
    fn test_cancel_wire() {
        let json = to_json(Action::Cancel(BatchCancel {
            cancels: vec![CancelRequest { asset: 0, oid: 42 }],
        }));
        assert_eq!(json, r#"{"type":"cancel","cancels":[{"a":0,"o":42}]}"#);

        let json = to_json(Action::CancelByCloid(BatchCancelCloid {
            cancels: vec![CancelByCloidRequest {
                asset: 7,
                cloid: Cloid::new("0xabc"),
            }],
        }));
        assert_eq!(
            json,
            r#"{"type":"cancelByCloid","cancels":[{"asset":7,"cloid":"0xabc"}]}"#
        );
    }

    #[test]
    fn test_order_validation() {
        let err = canonicalize(Action::Order(BatchOrder {
            orders: vec![],
            builder: None,
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Validation { field: "orders", .. }));

        for (sz, px) in [(0.0, 1.0), (-1.0, 1.0), (1.0, 0.0), (f64::NAN, 1.0)] {
            let err = canonicalize(Action::Order(BatchOrder {
                orders: vec![order(sz, px)],
                builder: None,
            }))
            .unwrap_err();
            assert!(err.is_input_error(), "{sz} {px}");
        }

        let err = canonicalize(Action::Order(BatchOrder {
            orders: vec![order(0.123456789, 1.0)],
            builder: None,
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Precision { .. }));
    }

    #[test]
    fn test_leverage_and_margin() {
        let err = canonicalize(Action::UpdateLeverage(UpdateLeverage {
            asset: 1,
            is_cross: true,
            leverage: 0,
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Validation { field: "leverage", .. }));

        let json = to_json(Action::UpdateIsolatedMargin(UpdateIsolatedMargin {
            asset: 1,
            is_buy: true,
            amount: -12.5,
        }));
        assert_eq!(
            json,
            r#"{"type":"updateIsolatedMargin","asset":1,"isBuy":true,"ntli":-12500000}"#
        );
    }

    #[test]
    fn test_user_signed_injection() {
        let action = Action::UsdSend(UsdSend {
            destination: DESTINATION,
            amount: 1.0,
            time: 1690393044548,
        })
        .canonicalize(Chain::Testnet, &SigningConfig::default())
        .unwrap();
        assert_eq!(
            serde_json::to_string(&action).unwrap(),
            r#"{"type":"usdSend","signatureChainId":"0x250","asterChain":"Testnet","destination":"0x0d1d9635d0640821d15e323ac8adadfa9c111414","amount":"1","time":1690393044548}"#
        );
    }

    #[test]
    fn test_convert_to_multi_sig_signers() {
        let second = address!("0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
        let action = canonicalize(Action::ConvertToMultiSigUser(ConvertToMultiSigUser {
            authorized_users: vec![second, DESTINATION],
            threshold: 2,
            nonce: 3,
        }))
        .unwrap();

        let WireAction::ConvertToMultiSigUser(convert) = action else {
            panic!("unexpected action");
        };
        assert_eq!(
            convert.signers,
            r#"{"authorizedUsers":["0x0d1d9635d0640821d15e323ac8adadfa9c111414","0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"],"threshold":2}"#
        );

        for (users, threshold) in [
            (vec![DESTINATION], 0),
            (vec![DESTINATION], 2),
            (vec![DESTINATION, DESTINATION], 1),
        ] {
            let err = canonicalize(Action::ConvertToMultiSigUser(ConvertToMultiSigUser {
                authorized_users: users,
                threshold,
                nonce: 3,
            }))
            .unwrap_err();
            assert!(err.is_input_error());
        }
    }

    #[test]
    fn test_sub_account_fields() {
        let vault = address!("0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB");

        let action = canonicalize(Action::UsdClassTransfer(UsdClassTransfer {
            amount: 100.0,
            to_perp: true,
            sub_account: Some(vault),
            nonce: 1,
        }))
        .unwrap();
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(
            json["amount"],
            "100 subaccount:0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"
        );

        let action = canonicalize(Action::SendAsset(SendAsset {
            destination: DESTINATION,
            source_dex: String::new(),
            destination_dex: "spot".to_owned(),
            token: "USDT".to_owned(),
            amount: 2.5,
            from_sub_account: None,
            nonce: 1,
        }))
        .unwrap();
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["fromSubAccount"], "");
        assert_eq!(json["amount"], "2.5");
    }

    #[test]
    fn test_nested_multi_sig_rejected() {
        let signature = Signature {
            r: Default::default(),
            s: Default::default(),
            v: 27,
        };
        let inner = MultiSigAction {
            signature_chain_id: "0x66eee".to_owned(),
            signatures: vec![signature],
            payload: MultiSigPayload {
                multi_sig_user: lower_hex(&DESTINATION),
                outer_signer: lower_hex(&DESTINATION),
                action: Box::new(WireAction::SetReferrer(SetReferrerAction {
                    code: "A".to_owned(),
                })),
            },
        };
        assert!(canonicalize(Action::MultiSig(inner.clone())).is_ok());

        let nested = MultiSigAction {
            payload: MultiSigPayload {
                action: Box::new(WireAction::MultiSig(inner.clone())),
                ..inner.payload.clone()
            },
            ..inner
        };
        let err = canonicalize(Action::MultiSig(nested)).unwrap_err();
        assert!(matches!(err, Error::Validation { field: "action", .. }));
    }
}
