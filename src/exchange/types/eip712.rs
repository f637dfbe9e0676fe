//! EIP-712 schemas and typed-data documents.
//!
//! User-signed primary types are namespaced with a colon
//! (`AsterTransaction:Transfer`), so each kind's fields are kept as a plain
//! list and bound to a domain and message as an
//! [`alloy::dyn_abi::TypedData`], which does the encoding and hashing.

use std::collections::BTreeMap;

use alloy::{
    dyn_abi::TypedData,
    primitives::{Address, U256},
    sol_types::Eip712Domain,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ActionKind;
use crate::exchange::error::{Error, Result};

/// Name of the field that binds a user-signed message to a network.
pub const CHAIN_FIELD: &str = "asterChain";

/// Solidity types used by the exchange schemas.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
pub enum FieldType {
    #[serde(rename = "string")]
    #[display("string")]
    String,
    #[serde(rename = "bool")]
    #[display("bool")]
    Bool,
    #[serde(rename = "uint64")]
    #[display("uint64")]
    Uint64,
    #[serde(rename = "uint256")]
    #[display("uint256")]
    Uint256,
    #[serde(rename = "address")]
    #[display("address")]
    Address,
    #[serde(rename = "bytes32")]
    #[display("bytes32")]
    Bytes32,
}

/// One member of a struct type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A primary type and its ordered fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub primary_type: String,
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(primary_type: impl Into<String>, fields: &[(&str, FieldType)]) -> Self {
        Self {
            primary_type: primary_type.into(),
            fields: fields
                .iter()
                .map(|(name, ty)| Field::new(*name, *ty))
                .collect(),
        }
    }

    /// Keeps only the schema's fields, failing on any that are missing.
    pub fn project(&self, message: &Map<String, Value>) -> Result<Map<String, Value>> {
        self.fields
            .iter()
            .map(|field| {
                message
                    .get(&field.name)
                    .map(|value| (field.name.clone(), value.clone()))
                    .ok_or_else(|| {
                        Error::validation(
                            "message",
                            format!("missing typed-data field `{}`", field.name),
                        )
                    })
            })
            .collect()
    }

    /// Variant used by multi-sig co-signers: the multi-sig user and the outer
    /// signer are inserted right after the chain field.
    pub fn for_multi_sig(&self) -> Schema {
        let at = self
            .fields
            .iter()
            .position(|field| field.name == CHAIN_FIELD)
            .map_or(0, |idx| idx + 1);

        let mut fields = self.fields.clone();
        fields.insert(at, Field::new("outerSigner", FieldType::Address));
        fields.insert(at, Field::new("payloadMultiSigUser", FieldType::Address));

        Schema {
            primary_type: self.primary_type.clone(),
            fields,
        }
    }
}

/// Agent schema and the per-kind schemas of user-signed actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRegistry {
    agent: Schema,
    user_signed: BTreeMap<ActionKind, Schema>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(crate::exchange::ASTER_TYPE_PREFIX)
    }
}

impl SchemaRegistry {
    /// Builds the registry, naming user-signed types `<type_prefix>:<Name>`.
    pub fn new(type_prefix: &str) -> Self {
        use FieldType as T;

        let agent = Schema::new("Agent", &[("source", T::String), ("connectionId", T::Bytes32)]);

        let chain = (CHAIN_FIELD, T::String);
        let table: [(ActionKind, &str, Vec<(&str, FieldType)>); 10] = [
            (
                ActionKind::UsdTransfer,
                "Transfer",
                vec![chain, ("destination", T::String), ("amount", T::String), ("time", T::Uint64)],
            ),
            (
                ActionKind::SpotTransfer,
                "Transfer",
                vec![
                    chain,
                    ("destination", T::String),
                    ("token", T::String),
                    ("amount", T::String),
                    ("time", T::Uint64),
                ],
            ),
            (
                ActionKind::Withdraw,
                "Withdraw",
                vec![chain, ("destination", T::String), ("amount", T::String), ("time", T::Uint64)],
            ),
            (
                ActionKind::ApproveAgent,
                "Agent",
                vec![
                    chain,
                    ("agentAddress", T::Address),
                    ("agentName", T::String),
                    ("nonce", T::Uint64),
                ],
            ),
            (
                ActionKind::ApproveBuilderFee,
                "ApproveBuilderFee",
                vec![
                    chain,
                    ("maxFeeRate", T::String),
                    ("builder", T::Address),
                    ("nonce", T::Uint64),
                ],
            ),
            (
                ActionKind::ConvertToMultiSigUser,
                "ConvertToMultiSig",
                vec![chain, ("signers", T::String), ("nonce", T::Uint64)],
            ),
            (
                ActionKind::TokenDelegate,
                "Delegate",
                vec![
                    chain,
                    ("validator", T::Address),
                    ("wei", T::Uint64),
                    ("isUndelegate", T::Bool),
                    ("nonce", T::Uint64),
                ],
            ),
            (
                ActionKind::SendAsset,
                "SendAsset",
                vec![
                    chain,
                    ("destination", T::String),
                    ("sourceDex", T::String),
                    ("destinationDex", T::String),
                    ("token", T::String),
                    ("amount", T::String),
                    ("fromSubAccount", T::String),
                    ("nonce", T::Uint64),
                ],
            ),
            (
                ActionKind::UsdClassTransfer,
                "UsdClassTransfer",
                vec![chain, ("amount", T::String), ("toPerp", T::Bool), ("nonce", T::Uint64)],
            ),
            (
                ActionKind::UserDexAbstraction,
                "UserDexAbstraction",
                vec![chain, ("user", T::Address), ("enabled", T::Bool), ("nonce", T::Uint64)],
            ),
        ];

        let user_signed = table
            .into_iter()
            .map(|(kind, name, fields)| {
                (kind, Schema::new(format!("{type_prefix}:{name}"), &fields))
            })
            .collect();

        Self { agent, user_signed }
    }

    #[inline(always)]
    pub fn agent(&self) -> &Schema {
        &self.agent
    }

    /// Schema of a user-signed action kind, `None` for agent-signed kinds.
    pub fn user_signed(&self, kind: ActionKind) -> Option<&Schema> {
        self.user_signed.get(&kind)
    }

    /// Iterates the user-signed schemas.
    pub fn iter(&self) -> impl Iterator<Item = &Schema> {
        self.user_signed.values()
    }
}

/// EIP-712 domain of the exchange. Only the four fields the exchange uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Domain {
    pub fn to_eip712(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(self.name.clone().into()),
            Some(self.version.clone().into()),
            Some(U256::from(self.chain_id)),
            Some(self.verifying_contract),
            None,
        )
    }

    fn fields() -> Vec<Field> {
        vec![
            Field::new("name", FieldType::String),
            Field::new("version", FieldType::String),
            Field::new("chainId", FieldType::Uint256),
            Field::new("verifyingContract", FieldType::Address),
        ]
    }
}

/// The `{domain, types, primaryType, message}` document accepted by
/// `eth_signTypedData_v4`. Message fields outside `schema` are dropped.
pub fn document(domain: &Domain, schema: &Schema, message: &Map<String, Value>) -> Result<Value> {
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Document<'a> {
        domain: &'a Domain,
        types: BTreeMap<&'a str, &'a [Field]>,
        primary_type: &'a str,
        message: Map<String, Value>,
    }

    let domain_fields = Domain::fields();
    let mut types = BTreeMap::new();
    types.insert("EIP712Domain", domain_fields.as_slice());
    types.insert(schema.primary_type.as_str(), schema.fields.as_slice());

    let document = Document {
        domain,
        types,
        primary_type: &schema.primary_type,
        message: schema.project(message)?,
    };
    Ok(serde_json::to_value(document)?)
}

/// Binds `message` to `domain` and `schema` as alloy typed data.
pub fn typed_data(
    domain: &Domain,
    schema: &Schema,
    message: &Map<String, Value>,
) -> Result<TypedData> {
    Ok(serde_json::from_value(document(domain, schema, message)?)?)
}
