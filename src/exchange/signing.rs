//! Signing pipeline for exchange actions.
//!
//! Two signing families share one entry point, [`Signable::sign`]:
//!
//! ## Agent-signed (L1) actions
//!
//! Orders, cancels, leverage and margin updates, referrer, sub-accounts and
//! multi-sig envelopes:
//! 1. Serialize the canonical action to MessagePack
//! 2. Append the nonce, vault address and expiry (see [`rmp_hash`])
//! 3. Keccak-256 the bytes into a connection id
//! 4. Sign a phantom `Agent { source, connectionId }` under the L1 domain
//!
//! ## User-signed actions
//!
//! Transfers, withdrawals, approvals, delegation and account conversion: the
//! canonical action, with its signature chain id and network, is the EIP-712
//! message, typed by the schema registered for its kind.

use alloy::{
    primitives::{Address, B256},
    signers::{Signer, SignerSync},
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::{
    Chain, SigningConfig,
    error::{Error, Result},
    types::{
        Action, ActionRequest, BatchCancel, BatchCancelCloid, BatchOrder, Domain,
        MultiSigAction, MultiSigPayload, PhantomAgent, Schema, Signature, TypedData, WireAction,
        lower_hex, parse_chain_id, request::validate_multi_sig, rmp_hash, solidity, typed_data,
    },
};

/// Trait for signing actions that modify state on the exchange.
///
/// Implemented for caller requests ([`Action`] and the batch types), which are
/// canonicalized first, and for canonical [`WireAction`]s. The signing family
/// is chosen from the action kind.
///
/// # Example
///
/// ```
/// use astersdk::exchange::{
///     Chain, PrivateKeySigner, SigningConfig,
///     signing::Signable,
///     types::{BatchOrder, OrderRequest, OrderType, TimeInForce},
/// };
///
/// let signer = PrivateKeySigner::random();
/// let order = BatchOrder {
///     orders: vec![OrderRequest {
///         asset: 0,
///         is_buy: true,
///         limit_px: 50000.0,
///         sz: 0.5,
///         reduce_only: false,
///         order_type: OrderType::limit(TimeInForce::Gtc),
///         cloid: None,
///     }],
///     builder: None,
/// };
///
/// let request = order
///     .sign(&signer, 1, None, None, Chain::Testnet, &SigningConfig::default())
///     .unwrap();
/// assert!(matches!(request.signature.v, 27 | 28));
/// ```
pub trait Signable {
    /// Signs this action and wraps it into a submittable request.
    ///
    /// - `nonce`: unique per signing key, typically the current time in ms
    /// - `maybe_vault_address`: trade on behalf of a vault or sub-account
    /// - `maybe_expires_after`: reject the action after this time
    ///
    /// For user-signed actions the vault and expiry are carried in the request
    /// envelope only; they are not part of the signed message.
    fn sign<S: SignerSync>(
        self,
        signer: &S,
        nonce: u64,
        maybe_vault_address: Option<Address>,
        maybe_expires_after: Option<DateTime<Utc>>,
        chain: Chain,
        config: &SigningConfig,
    ) -> Result<ActionRequest>;
}

impl Signable for WireAction {
    fn sign<S: SignerSync>(
        self,
        signer: &S,
        nonce: u64,
        maybe_vault_address: Option<Address>,
        maybe_expires_after: Option<DateTime<Utc>>,
        chain: Chain,
        config: &SigningConfig,
    ) -> Result<ActionRequest> {
        if self.is_user_signed() {
            sign_eip712(
                signer,
                self,
                nonce,
                maybe_vault_address,
                maybe_expires_after,
                chain,
                config,
            )
        } else {
            sign_rmp(
                signer,
                self,
                nonce,
                maybe_vault_address,
                maybe_expires_after,
                chain,
                config,
            )
        }
    }
}

impl Signable for Action {
    fn sign<S: SignerSync>(
        self,
        signer: &S,
        nonce: u64,
        maybe_vault_address: Option<Address>,
        maybe_expires_after: Option<DateTime<Utc>>,
        chain: Chain,
        config: &SigningConfig,
    ) -> Result<ActionRequest> {
        self.canonicalize(chain, config)?.sign(
            signer,
            nonce,
            maybe_vault_address,
            maybe_expires_after,
            chain,
            config,
        )
    }
}

impl Signable for BatchOrder {
    fn sign<S: SignerSync>(
        self,
        signer: &S,
        nonce: u64,
        maybe_vault_address: Option<Address>,
        maybe_expires_after: Option<DateTime<Utc>>,
        chain: Chain,
        config: &SigningConfig,
    ) -> Result<ActionRequest> {
        Action::Order(self).sign(
            signer,
            nonce,
            maybe_vault_address,
            maybe_expires_after,
            chain,
            config,
        )
    }
}

impl Signable for BatchCancel {
    fn sign<S: SignerSync>(
        self,
        signer: &S,
        nonce: u64,
        maybe_vault_address: Option<Address>,
        maybe_expires_after: Option<DateTime<Utc>>,
        chain: Chain,
        config: &SigningConfig,
    ) -> Result<ActionRequest> {
        Action::Cancel(self).sign(
            signer,
            nonce,
            maybe_vault_address,
            maybe_expires_after,
            chain,
            config,
        )
    }
}

impl Signable for BatchCancelCloid {
    fn sign<S: SignerSync>(
        self,
        signer: &S,
        nonce: u64,
        maybe_vault_address: Option<Address>,
        maybe_expires_after: Option<DateTime<Utc>>,
        chain: Chain,
        config: &SigningConfig,
    ) -> Result<ActionRequest> {
        Action::CancelByCloid(self).sign(
            signer,
            nonce,
            maybe_vault_address,
            maybe_expires_after,
            chain,
            config,
        )
    }
}

impl Signable for MultiSigAction {
    fn sign<S: SignerSync>(
        self,
        signer: &S,
        nonce: u64,
        maybe_vault_address: Option<Address>,
        maybe_expires_after: Option<DateTime<Utc>>,
        chain: Chain,
        config: &SigningConfig,
    ) -> Result<ActionRequest> {
        sign_rmp(
            signer,
            WireAction::MultiSig(self),
            nonce,
            maybe_vault_address,
            maybe_expires_after,
            chain,
            config,
        )
    }
}

fn expires_after_ms(maybe_expires_after: Option<DateTime<Utc>>) -> Result<Option<u64>> {
    maybe_expires_after
        .map(|after| {
            u64::try_from(after.timestamp_millis())
                .map_err(|_| Error::validation("expiresAfter", format!("{after} is before the epoch")))
        })
        .transpose()
}

/// Typed data of an agent-signed action.
pub fn l1_payload(phantom_agent: &PhantomAgent, config: &SigningConfig) -> Result<TypedData> {
    typed_data(
        &config.l1_domain(),
        config.schemas().agent(),
        &phantom_agent.message(),
    )
}

/// Typed data of a user-signed action.
///
/// The domain chain id is the action's own `signatureChainId`.
pub fn user_signed_payload(action: &WireAction, config: &SigningConfig) -> Result<TypedData> {
    let (domain, schema, message) = user_signed_parts(action, config)?;
    typed_data(&domain, schema, &message)
}

fn user_signed_parts<'a>(
    action: &WireAction,
    config: &'a SigningConfig,
) -> Result<(Domain, &'a Schema, Map<String, Value>)> {
    let kind = action.kind();
    let schema = config
        .schemas()
        .user_signed(kind)
        .ok_or_else(|| Error::validation("action", format!("{kind} is not user-signed")))?;
    let (signature_chain_id, _) = action
        .user_signed_header()
        .ok_or_else(|| Error::validation("signatureChainId", "missing"))?;

    Ok((
        config.user_domain(parse_chain_id(signature_chain_id)?),
        schema,
        action.typed_message()?,
    ))
}

/// Signs `typed_data` with the EIP-712 scheme.
pub fn sign_typed_data<S: SignerSync>(signer: &S, typed_data: &TypedData) -> Result<Signature> {
    let sig = signer.sign_dynamic_typed_data_sync(typed_data)?;
    Ok(sig.into())
}

/// Signs an L1 action's connection id through the phantom agent.
#[inline(always)]
pub fn sign_l1_action<S: SignerSync>(
    signer: &S,
    chain: Chain,
    connection_id: B256,
    config: &SigningConfig,
) -> Result<Signature> {
    let sig = signer.sign_typed_data_sync(
        &solidity::Agent {
            source: chain.source().to_string(),
            connectionId: connection_id,
        },
        &config.l1_domain().to_eip712(),
    )?;
    Ok(sig.into())
}

/// Signs an agent-signed action using RMP (MessagePack) hashing.
pub fn sign_rmp<S: SignerSync>(
    signer: &S,
    action: WireAction,
    nonce: u64,
    maybe_vault_address: Option<Address>,
    maybe_expires_after: Option<DateTime<Utc>>,
    chain: Chain,
    config: &SigningConfig,
) -> Result<ActionRequest> {
    if action.is_user_signed() {
        return Err(Error::validation(
            "action",
            format!("{} must be signed as typed data", action.kind()),
        ));
    }
    if let WireAction::MultiSig(multi_sig) = &action {
        validate_multi_sig(multi_sig)?;
    }

    let expires_after = expires_after_ms(maybe_expires_after)?;
    log::debug!(
        "signing {} action: nonce={nonce} vault={} expires={}",
        action.kind(),
        maybe_vault_address.is_some(),
        expires_after.is_some()
    );

    let connection_id = action.hash(nonce, maybe_vault_address, expires_after)?;
    log::trace!("connection id {connection_id}");

    let signature = sign_l1_action(signer, chain, connection_id, config)?;

    Ok(ActionRequest {
        action,
        nonce,
        signature,
        vault_address: maybe_vault_address,
        expires_after,
    })
}

/// Signs a user-signed action as typed data.
pub fn sign_eip712<S: SignerSync>(
    signer: &S,
    action: WireAction,
    nonce: u64,
    maybe_vault_address: Option<Address>,
    maybe_expires_after: Option<DateTime<Utc>>,
    chain: Chain,
    config: &SigningConfig,
) -> Result<ActionRequest> {
    match action.user_signed_header() {
        Some((_, aster_chain)) if aster_chain != chain => {
            return Err(Error::validation(
                "asterChain",
                format!("action is bound to {aster_chain}, signing for {chain}"),
            ));
        }
        Some(_) => {}
        None => {
            return Err(Error::validation(
                "action",
                format!("{} must be signed through the agent", action.kind()),
            ));
        }
    }

    let expires_after = expires_after_ms(maybe_expires_after)?;
    log::debug!(
        "signing {} typed data: nonce={nonce} vault={} expires={}",
        action.kind(),
        maybe_vault_address.is_some(),
        expires_after.is_some()
    );

    let typed_data = user_signed_payload(&action, config)?;
    let signature = sign_typed_data(signer, &typed_data)?;

    Ok(ActionRequest {
        action,
        nonce,
        signature,
        vault_address: maybe_vault_address,
        expires_after,
    })
}

impl WireAction {
    /// Signs this action as one co-signer of a multi-sig account.
    ///
    /// Every co-signer must use the same nonce, multi-sig user and outer
    /// signer. Agent-signed actions hash `[multiSigUser, outerSigner, action]`
    /// and go through the phantom agent; user-signed actions are signed as
    /// typed data with `payloadMultiSigUser` and `outerSigner` added after the
    /// chain field. Addresses are lower-cased before hashing.
    pub fn multi_sig_single<S: SignerSync>(
        &self,
        signer: &S,
        nonce: u64,
        multi_sig_user: Address,
        outer_signer: Address,
        chain: Chain,
        config: &SigningConfig,
    ) -> Result<Signature> {
        if let WireAction::MultiSig(_) = self {
            return Err(Error::validation(
                "action",
                "multi-sig actions cannot be nested",
            ));
        }

        let multi_sig_user = lower_hex(&multi_sig_user);
        let outer_signer = lower_hex(&outer_signer);

        if self.is_user_signed() {
            let (domain, schema, mut message) = user_signed_parts(self, config)?;
            message.insert("payloadMultiSigUser".to_owned(), Value::String(multi_sig_user));
            message.insert("outerSigner".to_owned(), Value::String(outer_signer));

            let payload = typed_data(&domain, &schema.for_multi_sig(), &message)?;
            sign_typed_data(signer, &payload)
        } else {
            let connection_id = rmp_hash(&(&multi_sig_user, &outer_signer, self), nonce, None, None)?;
            sign_l1_action(signer, chain, connection_id, config)
        }
    }
}

/// Wraps an inner action and its co-signer signatures into a multi-sig action.
pub fn multi_sig_action(
    multi_sig_user: Address,
    outer_signer: Address,
    inner_action: WireAction,
    signatures: Vec<Signature>,
    config: &SigningConfig,
) -> Result<MultiSigAction> {
    let action = MultiSigAction {
        signature_chain_id: config.multi_sig_signature_chain_id().to_owned(),
        signatures,
        payload: MultiSigPayload {
            multi_sig_user: lower_hex(&multi_sig_user),
            outer_signer: lower_hex(&outer_signer),
            action: Box::new(inner_action),
        },
    };
    validate_multi_sig(&action)?;
    Ok(action)
}

/// Collects a signature from every co-signer and builds the multi-sig action.
///
/// The result still has to be signed by `outer_signer`, see
/// [`Signable::sign`] on [`MultiSigAction`].
pub fn collect_multi_sig_signatures<'a, S: SignerSync + Signer + 'a>(
    outer_signer: Address,
    multi_sig_user: Address,
    signers: impl IntoIterator<Item = &'a S>,
    inner_action: WireAction,
    nonce: u64,
    chain: Chain,
    config: &SigningConfig,
) -> Result<MultiSigAction> {
    let mut signatures = vec![];

    for signer in signers {
        log::debug!(
            "collecting {} co-signature from {}",
            inner_action.kind(),
            signer.address()
        );
        let sig = inner_action.multi_sig_single(
            signer,
            nonce,
            multi_sig_user,
            outer_signer,
            chain,
            config,
        )?;
        signatures.push(sig);
    }

    multi_sig_action(multi_sig_user, outer_signer, inner_action, signatures, config)
}

#[cfg(test)]
mod tests {
    use alloy::{
        primitives::{U256, address},
        signers::local::PrivateKeySigner,
        sol_types::SolStruct,
    };

    use super::*;
    use crate::exchange::types::{CancelRequest, UsdClassTransfer, UsdSend};

    const DESTINATION: Address = address!("0x0D1d9635D0640821d15e323ac8AdADfA9c111414");
    const NONCE: u64 = 1690393044548;

    fn get_signer() -> PrivateKeySigner {
        let priv_key = "e908f86dbb4d55ac876378565aafeabc187f6690f046459397b17d9b9a19688e";
        priv_key.parse::<PrivateKeySigner>().unwrap()
    }

    fn cancel() -> WireAction {
        Action::Cancel(BatchCancel {
            cancels: vec![CancelRequest { asset: 0, oid: 42 }],
        })
        .canonicalize(Chain::Mainnet, &SigningConfig::default())
        .unwrap()
    }

    fn usd_send(chain: Chain) -> WireAction {
        Action::UsdSend(UsdSend {
            destination: DESTINATION,
            amount: 1.0,
            time: NONCE,
        })
        .canonicalize(chain, &SigningConfig::default())
        .unwrap()
    }

    #[test]
    fn test_sign_l1_action_recovers() {
        let signer = get_signer();
        let config = SigningConfig::default();

        let request = cancel()
            .sign(&signer, NONCE, None, None, Chain::Mainnet, &config)
            .unwrap();

        let connection_id = request.action.hash(NONCE, None, None).unwrap();
        let typed_data = l1_payload(&PhantomAgent::new(connection_id, Chain::Mainnet), &config).unwrap();
        let recovered = request
            .signature
            .recover_address(&typed_data.eip712_signing_hash().unwrap())
            .unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn test_phantom_agent_payload_matches_solidity() {
        let config = SigningConfig::default();
        let connection_id = cancel().hash(NONCE, None, None).unwrap();

        for chain in [Chain::Mainnet, Chain::Testnet] {
            let agent = solidity::Agent {
                source: chain.source().to_owned(),
                connectionId: connection_id,
            };
            let typed_data = l1_payload(&PhantomAgent::new(connection_id, chain), &config).unwrap();
            assert_eq!(
                typed_data.eip712_signing_hash().unwrap(),
                agent.eip712_signing_hash(&config.l1_domain().to_eip712())
            );
        }
    }

    #[test]
    fn test_sign_is_deterministic() {
        let signer = get_signer();
        let config = SigningConfig::default();

        let first = cancel()
            .sign(&signer, NONCE, None, None, Chain::Mainnet, &config)
            .unwrap();
        let second = cancel()
            .sign(&signer, NONCE, None, None, Chain::Mainnet, &config)
            .unwrap();
        assert_eq!(first.signature, second.signature);

        let testnet = cancel()
            .sign(&signer, NONCE, None, None, Chain::Testnet, &config)
            .unwrap();
        assert_ne!(first.signature, testnet.signature);
    }

    #[test]
    fn test_vault_and_expiry_in_envelope() {
        let signer = get_signer();
        let config = SigningConfig::default();
        let expires = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();

        let request = cancel()
            .sign(
                &signer,
                NONCE,
                Some(DESTINATION),
                Some(expires),
                Chain::Mainnet,
                &config,
            )
            .unwrap();
        assert_eq!(request.vault_address, Some(DESTINATION));
        assert_eq!(request.expires_after, Some(1_700_000_000_000));

        let plain = cancel()
            .sign(&signer, NONCE, None, None, Chain::Mainnet, &config)
            .unwrap();
        assert_ne!(plain.signature, request.signature);
    }

    #[test]
    fn test_sign_user_signed_recovers() {
        let signer = get_signer();
        let config = SigningConfig::default();

        let request = usd_send(Chain::Mainnet)
            .sign(&signer, NONCE, None, None, Chain::Mainnet, &config)
            .unwrap();

        let typed_data = user_signed_payload(&request.action, &config).unwrap();
        assert_eq!(typed_data.primary_type, "AsterTransaction:Transfer");
        assert_eq!(typed_data.domain.chain_id, Some(U256::from(592)));
        assert_eq!(typed_data.message["asterChain"], "Mainnet");

        let recovered = request
            .signature
            .recover_address(&typed_data.eip712_signing_hash().unwrap())
            .unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn test_user_signed_chain_mismatch() {
        let signer = get_signer();
        let err = usd_send(Chain::Testnet)
            .sign(
                &signer,
                NONCE,
                None,
                None,
                Chain::Mainnet,
                &SigningConfig::default(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation { field: "asterChain", .. }));
    }

    #[test]
    fn test_families_are_not_interchangeable() {
        let signer = get_signer();
        let config = SigningConfig::default();

        let err = sign_rmp(&signer, usd_send(Chain::Mainnet), 1, None, None, Chain::Mainnet, &config)
            .unwrap_err();
        assert!(err.is_input_error());

        let err = sign_eip712(&signer, cancel(), 1, None, None, Chain::Mainnet, &config).unwrap_err();
        assert!(err.is_input_error());

        assert!(user_signed_payload(&cancel(), &config).is_err());
    }

    #[test]
    fn test_multi_sig_single_recovers() {
        let config = SigningConfig::default();
        let cosigner = get_signer();
        let outer = PrivateKeySigner::random();
        let multi_sig_user = address!("0x1111111111111111111111111111111111111111");

        // agent-signed inner action
        let sig = cancel()
            .multi_sig_single(
                &cosigner,
                NONCE,
                multi_sig_user,
                outer.address(),
                Chain::Mainnet,
                &config,
            )
            .unwrap();
        let connection_id = rmp_hash(
            &(
                lower_hex(&multi_sig_user),
                lower_hex(&outer.address()),
                cancel(),
            ),
            NONCE,
            None,
            None,
        )
        .unwrap();
        let hash = l1_payload(&PhantomAgent::new(connection_id, Chain::Mainnet), &config)
            .unwrap()
            .eip712_signing_hash()
            .unwrap();
        assert_eq!(sig.recover_address(&hash).unwrap(), cosigner.address());

        // user-signed inner action
        let inner = Action::UsdClassTransfer(UsdClassTransfer {
            amount: 5.0,
            to_perp: true,
            sub_account: None,
            nonce: NONCE,
        })
        .canonicalize(Chain::Mainnet, &config)
        .unwrap();
        let sig = inner
            .multi_sig_single(
                &cosigner,
                NONCE,
                multi_sig_user,
                outer.address(),
                Chain::Mainnet,
                &config,
            )
            .unwrap();

        let (domain, schema, mut message) = user_signed_parts(&inner, &config).unwrap();
        message.insert("payloadMultiSigUser".to_owned(), lower_hex(&multi_sig_user).into());
        message.insert("outerSigner".to_owned(), lower_hex(&outer.address()).into());
        let payload = typed_data(&domain, &schema.for_multi_sig(), &message).unwrap();
        assert_eq!(
            payload.encode_type().unwrap(),
            "AsterTransaction:UsdClassTransfer(string asterChain,address payloadMultiSigUser,address outerSigner,string amount,bool toPerp,uint64 nonce)"
        );
        assert_eq!(
            sig.recover_address(&payload.eip712_signing_hash().unwrap())
                .unwrap(),
            cosigner.address()
        );
    }

    #[test]
    fn test_collect_and_sign_multi_sig() {
        let config = SigningConfig::default();
        let cosigners = [get_signer(), PrivateKeySigner::random()];
        let outer = PrivateKeySigner::random();
        let multi_sig_user = address!("0x1111111111111111111111111111111111111111");

        let action = collect_multi_sig_signatures(
            outer.address(),
            multi_sig_user,
            cosigners.iter(),
            cancel(),
            NONCE,
            Chain::Mainnet,
            &config,
        )
        .unwrap();
        assert_eq!(action.signatures.len(), 2);
        assert_eq!(action.signature_chain_id, "0x66eee");
        assert_eq!(action.payload.multi_sig_user, lower_hex(&multi_sig_user));
        assert_eq!(*action.payload.action, cancel());

        let request = action
            .clone()
            .sign(&outer, NONCE, None, None, Chain::Mainnet, &config)
            .unwrap();
        assert!(matches!(request.action, WireAction::MultiSig(_)));

        let connection_id = request.action.hash(NONCE, None, None).unwrap();
        let hash = l1_payload(&PhantomAgent::new(connection_id, Chain::Mainnet), &config)
            .unwrap()
            .eip712_signing_hash()
            .unwrap();
        assert_eq!(
            request.signature.recover_address(&hash).unwrap(),
            outer.address()
        );
    }

    #[test]
    fn test_multi_sig_rejects_nesting_and_empty() {
        let config = SigningConfig::default();
        let signer = get_signer();
        let user = address!("0x1111111111111111111111111111111111111111");

        assert!(multi_sig_action(user, signer.address(), cancel(), vec![], &config).is_err());

        let sig = cancel()
            .multi_sig_single(&signer, NONCE, user, signer.address(), Chain::Mainnet, &config)
            .unwrap();
        let inner = multi_sig_action(user, signer.address(), cancel(), vec![sig], &config).unwrap();
        let nested = WireAction::MultiSig(inner);
        assert!(
            nested
                .multi_sig_single(&signer, NONCE, user, signer.address(), Chain::Mainnet, &config)
                .is_err()
        );
        assert!(multi_sig_action(user, signer.address(), nested, vec![sig], &config).is_err());
    }
}
