//! 1inch aggregation router calls. Only the canonical `swap` form names both
//! tokens on the wire; `unoswap` identifies its route through opaque pool
//! words, so intents decoded from it carry the unknown-token sentinel.

use {
    crate::{error::DecodeError, time::synthetic_deadline},
    alloy_primitives::{Address, U256},
    alloy_sol_types::{SolCall, sol},
    chrono::{DateTime, Utc},
    domain_types::{PendingTransaction, Protocol, SwapIntent, UNKNOWN_TOKEN},
};

sol! {
    struct SwapDescription {
        address srcToken;
        address dstToken;
        address srcReceiver;
        address dstReceiver;
        uint256 amount;
        uint256 minReturnAmount;
        uint256 flags;
    }

    function swap(address executor, SwapDescription desc, bytes permit, bytes data) returns (uint256 returnAmount, uint256 spentAmount);
    function unoswap(address srcToken, uint256 amount, uint256 minReturn, uint256[] pools) returns (uint256 returnAmount);
}

pub(crate) const SELECTORS: [[u8; 4]; 2] = [swapCall::SELECTOR, unoswapCall::SELECTOR];

pub(crate) fn decode(
    tx: &PendingTransaction,
    router: Address,
    now: DateTime<Utc>,
) -> Result<SwapIntent, DecodeError> {
    let selector = tx.selector().ok_or(DecodeError::ShortCalldata)?;
    let (token_in, token_out, amount_in, expected_amount_out) = match selector {
        swapCall::SELECTOR => {
            let desc = swapCall::abi_decode(&tx.input)?.desc;
            (desc.srcToken, desc.dstToken, desc.amount, desc.minReturnAmount)
        }
        unoswapCall::SELECTOR => {
            let call = unoswapCall::abi_decode(&tx.input)?;
            tracing::debug!(
                tx = ?tx.hash,
                "unoswap carries no destination token, emitting sentinel"
            );
            (call.srcToken, UNKNOWN_TOKEN, call.amount, call.minReturn)
        }
        _ => return Err(DecodeError::UnknownSelector),
    };

    Ok(SwapIntent {
        tx_hash: tx.hash,
        protocol: Protocol::OneInch,
        router,
        sender: tx.from,
        token_in,
        token_out,
        path: vec![token_in, token_out],
        amount_in,
        expected_amount_out,
        is_exact_output: false,
        fee_tiers: Vec::new(),
        deadline: synthetic_deadline(now),
        gas_pricing: tx.gas_pricing,
        nonce: tx.nonce,
        chain_id: tx.chain_id,
        first_seen: now,
    })
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        alloy_primitives::{B256, Bytes, address},
        domain_types::GasPricing,
        hex_literal::hex,
    };

    const ROUTER: Address = address!("1111111254eeb25477b68fb85ed929f73a960582");
    const WETH: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
    const USDC: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");

    fn pending(input: Vec<u8>) -> PendingTransaction {
        PendingTransaction {
            hash: B256::repeat_byte(0x44),
            from: address!("00000000000000000000000000000000000000dd"),
            to: Some(ROUTER),
            value: U256::ZERO,
            input: Bytes::from(input),
            gas: 500_000,
            gas_pricing: GasPricing::Legacy {
                gas_price: U256::from(20_000_000_000u64),
            },
            nonce: 9,
            chain_id: 1,
        }
    }

    #[test]
    fn selectors_match_the_onchain_abi() {
        assert_eq!(swapCall::SELECTOR, hex!("12aa3caf"));
        assert_eq!(unoswapCall::SELECTOR, hex!("0502b1c5"));
    }

    #[test]
    fn swap_extracts_description() {
        let call = swapCall {
            executor: Address::ZERO,
            desc: SwapDescription {
                srcToken: USDC,
                dstToken: WETH,
                srcReceiver: Address::ZERO,
                dstReceiver: Address::ZERO,
                amount: U256::from(2_500_000_000u64),
                minReturnAmount: U256::from(1_000_000_000_000_000_000u128),
                flags: U256::ZERO,
            },
            permit: Bytes::new(),
            data: Bytes::new(),
        };
        let tx = pending(call.abi_encode());
        let intent = decode(&tx, ROUTER, Utc::now()).unwrap();

        assert_eq!(intent.protocol, Protocol::OneInch);
        assert_eq!(intent.token_in, USDC);
        assert_eq!(intent.token_out, WETH);
        assert_eq!(intent.amount_in, U256::from(2_500_000_000u64));
        assert!(!intent.has_unknown_token_out());
    }

    #[test]
    fn unoswap_emits_sentinel_token_out() {
        let call = unoswapCall {
            srcToken: WETH,
            amount: U256::from(1u64),
            minReturn: U256::ZERO,
            pools: vec![U256::from(42u64)],
        };
        let tx = pending(call.abi_encode());
        let intent = decode(&tx, ROUTER, Utc::now()).unwrap();

        assert_eq!(intent.token_out, UNKNOWN_TOKEN);
        assert!(intent.has_unknown_token_out());
    }
}
