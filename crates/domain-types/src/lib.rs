//! Value types flowing between the mempool feed, the decoders and the
//! strategy layer. Everything here is immutable once constructed; the
//! pipeline hands these around by value or `Arc`.

use {
    alloy_primitives::{Address, B256, Bytes, U256},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// Well-known sentinel for a token address the calldata does not name.
///
/// 1inch `unoswap` calls only carry the source token on the wire, so intents
/// decoded from them use this marker as their output token. Consumers must
/// treat it as "unknown" and never build arbitrage edges across it.
pub const UNKNOWN_TOKEN: Address = Address::repeat_byte(0xff);

/// Gas pricing of a pending transaction, either legacy or EIP-1559.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GasPricing {
    Legacy {
        gas_price: U256,
    },
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}

impl GasPricing {
    /// The maximum price per gas the sender is willing to pay.
    pub fn price_cap(&self) -> U256 {
        match self {
            Self::Legacy { gas_price } => *gas_price,
            Self::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }
}

/// A transaction observed in the mempool, not yet included in a block.
///
/// The chain id is carried verbatim from the wire, including `0`; the feed
/// never substitutes a default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub hash: B256,
    pub from: Address,
    /// `None` for contract creations.
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
    pub gas: u64,
    pub gas_pricing: GasPricing,
    pub nonce: u64,
    pub chain_id: u64,
}

impl PendingTransaction {
    /// The 4-byte function selector, if the calldata is long enough to carry
    /// one.
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.input.get(..4).map(|bytes| {
            let mut selector = [0; 4];
            selector.copy_from_slice(bytes);
            selector
        })
    }
}

/// The DEX protocol family a swap intent was decoded from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Protocol {
    UniswapV2,
    UniswapV3,
    Curve,
    OneInch,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UniswapV2 => "uniswapV2",
            Self::UniswapV3 => "uniswapV3",
            Self::Curve => "curve",
            Self::OneInch => "oneInch",
        }
    }
}

/// A normalized description of the swap a pending transaction attempts.
///
/// `expected_amount_out` carries `amountOutMin` for exact-input calls and the
/// required `amountOut` for exact-output calls; `is_exact_output`
/// distinguishes the two.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwapIntent {
    pub tx_hash: B256,
    pub protocol: Protocol,
    pub router: Address,
    pub sender: Address,
    pub token_in: Address,
    pub token_out: Address,
    /// Ordered token path, always at least 2 entries.
    pub path: Vec<Address>,
    pub amount_in: U256,
    pub expected_amount_out: U256,
    pub is_exact_output: bool,
    /// Per-hop fee tiers; only populated for the V3 family.
    pub fee_tiers: Vec<u32>,
    /// Unix seconds. Synthetic (`now + 1h`) where the call carries none.
    pub deadline: u64,
    pub gas_pricing: GasPricing,
    pub nonce: u64,
    pub chain_id: u64,
    pub first_seen: DateTime<Utc>,
}

impl SwapIntent {
    /// Whether the output token could not be derived from calldata.
    pub fn has_unknown_token_out(&self) -> bool {
        self.token_out == UNKNOWN_TOKEN
    }
}

#[cfg(test)]
mod tests {
    use {super::*, hex_literal::hex};

    #[test]
    fn selector_of_short_calldata() {
        let tx = PendingTransaction {
            hash: B256::ZERO,
            from: Address::ZERO,
            to: None,
            value: U256::ZERO,
            input: Bytes::from_static(&[0x38, 0xed]),
            gas: 21_000,
            gas_pricing: GasPricing::Legacy {
                gas_price: U256::from(1u64),
            },
            nonce: 0,
            chain_id: 1,
        };
        assert_eq!(tx.selector(), None);
    }

    #[test]
    fn selector_of_swap_calldata() {
        let tx = PendingTransaction {
            hash: B256::ZERO,
            from: Address::ZERO,
            to: Some(Address::ZERO),
            value: U256::ZERO,
            input: Bytes::copy_from_slice(&hex!("38ed17390011")),
            gas: 200_000,
            gas_pricing: GasPricing::Eip1559 {
                max_fee_per_gas: U256::from(30u64),
                max_priority_fee_per_gas: U256::from(2u64),
            },
            nonce: 7,
            chain_id: 1,
        };
        assert_eq!(tx.selector(), Some(hex!("38ed1739")));
    }

    #[test]
    fn unknown_token_sentinel() {
        assert_eq!(
            format!("{UNKNOWN_TOKEN:?}"),
            "0xffffffffffffffffffffffffffffffffffffffff"
        );
    }
}
