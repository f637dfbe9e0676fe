//! Solidity struct definitions for EIP-712 signing.
//!
//! Only the phantom agent is expressible as a solidity struct; user-signed
//! types carry a namespaced primary type and live in [`super::eip712`].

use alloy::sol;

sol! {
    /// Phantom agent signed for every agent-signed action. `source` is `"a"`
    /// on mainnet and `"b"` on testnet, `connectionId` is the action hash.
    struct Agent {
        string source;
        bytes32 connectionId;
    }
}
