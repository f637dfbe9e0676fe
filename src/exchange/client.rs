use alloy::{
    primitives::Address,
    signers::{Signer, SignerSync, local::PrivateKeySigner},
};
use chrono::{DateTime, Utc};

use super::{
    Chain, SigningConfig,
    error::{Error, Result},
    signing::{Signable, multi_sig_action},
    types::{
        Action, ActionRequest, ApproveAgent, ApproveBuilderFee, BatchCancel, BatchCancelCloid,
        BatchOrder, BuilderInfo, CancelByCloidRequest, CancelRequest, Cloid,
        ConvertToMultiSigUser, CreateSubAccount, OrderRequest, OrderType, SendAsset, SetReferrer,
        Signature, SpotSend, TimeInForce, TokenDelegate, UpdateIsolatedMargin, UpdateLeverage,
        UsdClassTransfer, UsdSend, UserDexAbstraction, WireAction, Withdraw, lower_hex,
    },
    wire::slippage_price,
};

/// Spot asset ids start here; everything below is a perp.
pub const SPOT_ASSET_OFFSET: u32 = 10_000;

/// Parameters of a market order: an aggressive IOC limit order priced off a
/// reference price.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketOrder {
    pub asset: u32,
    pub is_buy: bool,
    pub sz: f64,
    /// Reference price, usually the mid.
    pub px: f64,
    /// Fraction of `px` the fill may move against the taker.
    pub slippage: f64,
    pub sz_decimals: u32,
    pub cloid: Option<Cloid>,
    pub builder: Option<BuilderInfo>,
}

/// Offline signing client.
///
/// Holds a signer and the signing context, and produces one signed
/// [`ActionRequest`] per exchange operation. Submitting the request is left to
/// the caller's transport. Every operation takes the nonce explicitly; see
/// [`NonceHandler`](super::NonceHandler).
///
/// ```
/// use astersdk::exchange::{Chain, Client, NonceHandler, PrivateKeySigner};
///
/// let client = Client::new(PrivateKeySigner::random(), Chain::Testnet);
/// let nonces = NonceHandler::default();
///
/// let request = client.update_leverage(1, 10, true, nonces.next()).unwrap();
/// let body = serde_json::to_value(&request).unwrap();
/// assert_eq!(body["action"]["type"], "updateLeverage");
/// ```
pub struct Client<S> {
    signer: S,
    chain: Chain,
    config: SigningConfig,
    vault_address: Option<Address>,
    expires_after: Option<DateTime<Utc>>,
}

impl<S> Client<S> {
    /// Creates a client with the default signing configuration.
    pub fn new(signer: S, chain: Chain) -> Self {
        Self {
            signer,
            chain,
            config: SigningConfig::default(),
            vault_address: None,
            expires_after: None,
        }
    }

    /// Replaces the signing configuration.
    pub fn with_config(mut self, config: SigningConfig) -> Self {
        self.config = config;
        self
    }

    /// Acts on behalf of a vault or sub-account.
    pub fn with_vault_address(mut self, vault_address: Address) -> Self {
        self.vault_address = Some(vault_address);
        self
    }

    /// Sets or clears the expiry applied to agent-signed actions.
    pub fn set_expires_after(&mut self, expires_after: Option<DateTime<Utc>>) {
        self.expires_after = expires_after;
    }

    #[inline(always)]
    pub fn chain(&self) -> Chain {
        self.chain
    }

    #[inline(always)]
    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    #[inline(always)]
    pub fn vault_address(&self) -> Option<Address> {
        self.vault_address
    }

    #[inline(always)]
    pub fn signer(&self) -> &S {
        &self.signer
    }
}

impl<S> Client<S>
where
    S: Signer + SignerSync,
{
    /// Address of the signing key.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    fn sign_action(
        &self,
        action: impl Signable,
        nonce: u64,
        maybe_vault_address: Option<Address>,
    ) -> Result<ActionRequest> {
        action.sign(
            &self.signer,
            nonce,
            maybe_vault_address,
            self.expires_after,
            self.chain,
            &self.config,
        )
    }

    /// Places a batch of orders.
    pub fn place(&self, batch: BatchOrder, nonce: u64) -> Result<ActionRequest> {
        self.sign_action(batch, nonce, self.vault_address)
    }

    /// Places a single order.
    pub fn order(
        &self,
        order: OrderRequest,
        builder: Option<BuilderInfo>,
        nonce: u64,
    ) -> Result<ActionRequest> {
        self.place(
            BatchOrder {
                orders: vec![order],
                builder,
            },
            nonce,
        )
    }

    /// Opens a position with a slippage-priced IOC order.
    pub fn market_open(&self, order: MarketOrder, nonce: u64) -> Result<ActionRequest> {
        self.market(order, false, nonce)
    }

    /// Reduces a position with a slippage-priced reduce-only IOC order.
    ///
    /// `order.is_buy` must oppose the position and `order.sz` must not exceed
    /// it.
    pub fn market_close(&self, order: MarketOrder, nonce: u64) -> Result<ActionRequest> {
        self.market(order, true, nonce)
    }

    fn market(&self, order: MarketOrder, reduce_only: bool, nonce: u64) -> Result<ActionRequest> {
        let limit_px = slippage_price(
            order.px,
            order.is_buy,
            order.slippage,
            order.sz_decimals,
            order.asset >= SPOT_ASSET_OFFSET,
        )?;

        self.order(
            OrderRequest {
                asset: order.asset,
                is_buy: order.is_buy,
                limit_px,
                sz: order.sz,
                reduce_only,
                order_type: OrderType::limit(TimeInForce::Ioc),
                cloid: order.cloid,
            },
            order.builder,
            nonce,
        )
    }

    /// Cancels an order by id.
    pub fn cancel(&self, asset: u32, oid: u64, nonce: u64) -> Result<ActionRequest> {
        self.bulk_cancel(vec![CancelRequest { asset, oid }], nonce)
    }

    pub fn bulk_cancel(&self, cancels: Vec<CancelRequest>, nonce: u64) -> Result<ActionRequest> {
        self.sign_action(BatchCancel { cancels }, nonce, self.vault_address)
    }

    /// Cancels an order by client order id.
    pub fn cancel_by_cloid(&self, asset: u32, cloid: Cloid, nonce: u64) -> Result<ActionRequest> {
        self.bulk_cancel_by_cloid(vec![CancelByCloidRequest { asset, cloid }], nonce)
    }

    pub fn bulk_cancel_by_cloid(
        &self,
        cancels: Vec<CancelByCloidRequest>,
        nonce: u64,
    ) -> Result<ActionRequest> {
        self.sign_action(BatchCancelCloid { cancels }, nonce, self.vault_address)
    }

    pub fn update_leverage(
        &self,
        asset: u32,
        leverage: u32,
        is_cross: bool,
        nonce: u64,
    ) -> Result<ActionRequest> {
        self.sign_action(
            Action::UpdateLeverage(UpdateLeverage {
                asset,
                is_cross,
                leverage,
            }),
            nonce,
            self.vault_address,
        )
    }

    /// Adds (positive `amount`) or removes isolated margin, in USD.
    pub fn update_isolated_margin(
        &self,
        asset: u32,
        amount: f64,
        nonce: u64,
    ) -> Result<ActionRequest> {
        self.sign_action(
            Action::UpdateIsolatedMargin(UpdateIsolatedMargin {
                asset,
                is_buy: true,
                amount,
            }),
            nonce,
            self.vault_address,
        )
    }

    /// Registers a referral code. Never signed for a vault.
    pub fn set_referrer(&self, code: impl Into<String>, nonce: u64) -> Result<ActionRequest> {
        self.sign_action(
            Action::SetReferrer(SetReferrer { code: code.into() }),
            nonce,
            None,
        )
    }

    /// Creates a named sub-account. Never signed for a vault.
    pub fn create_sub_account(&self, name: impl Into<String>, nonce: u64) -> Result<ActionRequest> {
        self.sign_action(
            Action::CreateSubAccount(CreateSubAccount { name: name.into() }),
            nonce,
            None,
        )
    }

    /// Sends USD to another account. The nonce doubles as the transfer time.
    pub fn usd_transfer(
        &self,
        destination: Address,
        amount: f64,
        nonce: u64,
    ) -> Result<ActionRequest> {
        self.sign_action(
            Action::UsdSend(UsdSend {
                destination,
                amount,
                time: nonce,
            }),
            nonce,
            self.vault_address,
        )
    }

    /// Sends a spot token to another account.
    pub fn spot_transfer(
        &self,
        destination: Address,
        token: impl Into<String>,
        amount: f64,
        nonce: u64,
    ) -> Result<ActionRequest> {
        self.sign_action(
            Action::SpotSend(SpotSend {
                destination,
                token: token.into(),
                amount,
                time: nonce,
            }),
            nonce,
            self.vault_address,
        )
    }

    /// Withdraws USD through the bridge.
    pub fn withdraw_from_bridge(
        &self,
        destination: Address,
        amount: f64,
        nonce: u64,
    ) -> Result<ActionRequest> {
        self.sign_action(
            Action::Withdraw(Withdraw {
                destination,
                amount,
                time: nonce,
            }),
            nonce,
            self.vault_address,
        )
    }

    /// Approves a freshly generated agent key and returns it with the request.
    pub fn approve_agent(
        &self,
        name: Option<String>,
        nonce: u64,
    ) -> Result<(ActionRequest, PrivateKeySigner)> {
        let agent = PrivateKeySigner::random();
        let request = self.approve_agent_address(agent.address(), name, nonce)?;
        Ok((request, agent))
    }

    /// Approves an existing agent address.
    pub fn approve_agent_address(
        &self,
        agent_address: Address,
        name: Option<String>,
        nonce: u64,
    ) -> Result<ActionRequest> {
        self.sign_action(
            Action::ApproveAgent(ApproveAgent {
                agent_address,
                agent_name: name,
                nonce,
            }),
            nonce,
            self.vault_address,
        )
    }

    /// Approves a builder to charge up to `max_fee_rate` (e.g. `0.001%`).
    pub fn approve_builder_fee(
        &self,
        builder: Address,
        max_fee_rate: impl Into<String>,
        nonce: u64,
    ) -> Result<ActionRequest> {
        self.sign_action(
            Action::ApproveBuilderFee(ApproveBuilderFee {
                builder,
                max_fee_rate: max_fee_rate.into(),
                nonce,
            }),
            nonce,
            self.vault_address,
        )
    }

    /// Converts this account into a multi-sig account.
    pub fn convert_to_multi_sig_user(
        &self,
        authorized_users: Vec<Address>,
        threshold: usize,
        nonce: u64,
    ) -> Result<ActionRequest> {
        self.sign_action(
            Action::ConvertToMultiSigUser(ConvertToMultiSigUser {
                authorized_users,
                threshold,
                nonce,
            }),
            nonce,
            self.vault_address,
        )
    }

    /// Delegates `wei` to a validator, or undelegates it.
    pub fn token_delegate(
        &self,
        validator: Address,
        wei: u64,
        is_undelegate: bool,
        nonce: u64,
    ) -> Result<ActionRequest> {
        self.sign_action(
            Action::TokenDelegate(TokenDelegate {
                validator,
                wei,
                is_undelegate,
                nonce,
            }),
            nonce,
            self.vault_address,
        )
    }

    /// Moves a token between dexes. A configured vault is the source
    /// sub-account; the envelope never carries a vault.
    pub fn send_asset(
        &self,
        destination: Address,
        source_dex: impl Into<String>,
        destination_dex: impl Into<String>,
        token: impl Into<String>,
        amount: f64,
        nonce: u64,
    ) -> Result<ActionRequest> {
        self.sign_action(
            Action::SendAsset(SendAsset {
                destination,
                source_dex: source_dex.into(),
                destination_dex: destination_dex.into(),
                token: token.into(),
                amount,
                from_sub_account: self.vault_address,
                nonce,
            }),
            nonce,
            None,
        )
    }

    /// Moves USD between the spot and perp balances. A configured vault is
    /// named in the amount; the envelope never carries a vault.
    pub fn usd_class_transfer(
        &self,
        amount: f64,
        to_perp: bool,
        nonce: u64,
    ) -> Result<ActionRequest> {
        self.sign_action(
            Action::UsdClassTransfer(UsdClassTransfer {
                amount,
                to_perp,
                sub_account: self.vault_address,
                nonce,
            }),
            nonce,
            None,
        )
    }

    pub fn user_dex_abstraction(
        &self,
        user: Address,
        enabled: bool,
        nonce: u64,
    ) -> Result<ActionRequest> {
        self.sign_action(
            Action::UserDexAbstraction(UserDexAbstraction {
                user,
                enabled,
                nonce,
            }),
            nonce,
            self.vault_address,
        )
    }

    /// This client's co-signature of `inner_action` for a multi-sig account
    /// whose transaction will be submitted by `outer_signer`.
    pub fn multi_sig_signature(
        &self,
        inner_action: &WireAction,
        multi_sig_user: Address,
        outer_signer: Address,
        nonce: u64,
    ) -> Result<Signature> {
        inner_action.multi_sig_single(
            &self.signer,
            nonce,
            multi_sig_user,
            outer_signer,
            self.chain,
            &self.config,
        )
    }

    /// Submits a co-signed action for `multi_sig_user`, with this client as
    /// the outer signer.
    pub fn multi_sig(
        &self,
        multi_sig_user: Address,
        inner_action: WireAction,
        signatures: Vec<Signature>,
        nonce: u64,
        maybe_vault_address: Option<Address>,
    ) -> Result<ActionRequest> {
        if signatures.iter().any(|sig| !matches!(sig.v, 27 | 28)) {
            return Err(Error::validation("signatures", "v must be 27 or 28"));
        }

        let action = multi_sig_action(
            multi_sig_user,
            self.address(),
            inner_action,
            signatures,
            &self.config,
        )?;
        log::debug!(
            "submitting multi-sig for {} as {}",
            action.payload.multi_sig_user,
            lower_hex(&self.address())
        );
        self.sign_action(action, nonce, maybe_vault_address)
    }
}
