//! # astersdk
//!
//! Deterministic action encoding and EIP-712 signing for the Aster exchange.
//!
//! The crate turns a trading or account action into the exact bytes the
//! exchange verifies and signs them with a local key:
//!
//! - Numeric canonicalization of prices, sizes and USD amounts
//! - MessagePack action hashing for agent-signed actions
//! - EIP-712 typed data for user-signed actions
//! - Multi-sig co-signing and envelopes
//!
//! Nothing here talks to the network. Every operation returns a signed
//! [`ActionRequest`](exchange::types::ActionRequest) that serializes to the
//! JSON body the exchange expects.
//!
//! ## Quick Start
//!
//! ```
//! use astersdk::exchange::{
//!     Chain, Client, NonceHandler, PrivateKeySigner,
//!     types::{OrderRequest, OrderType, TimeInForce},
//! };
//!
//! let client = Client::new(PrivateKeySigner::random(), Chain::Mainnet);
//! let nonces = NonceHandler::default();
//!
//! let request = client
//!     .order(
//!         OrderRequest {
//!             asset: 0,
//!             is_buy: true,
//!             limit_px: 50_000.0,
//!             sz: 0.01,
//!             reduce_only: false,
//!             order_type: OrderType::limit(TimeInForce::Gtc),
//!             cloid: None,
//!         },
//!         None,
//!         nonces.next(),
//!     )
//!     .unwrap();
//!
//! let body = serde_json::to_string(&request).unwrap();
//! assert!(body.contains(r#""p":"50000""#));
//! ```
//!
//! ## Modules
//!
//! - [`exchange`]: action types, encoding, signing and the signing client

pub mod exchange;

/// Re-exported Ethereum primitives from Alloy.
pub use alloy::primitives::{Address, B256, address};
/// Re-exported decimal type from rust_decimal.
///
/// Used by the numeric codec to render prices and sizes without float noise.
pub use rust_decimal::Decimal;
