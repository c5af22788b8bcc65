//! Uniswap-V2-family router calls. Calldata is self-describing (the token
//! path is an explicit `address[]`), so these decode even for routers the
//! registry has never heard of.

use {
    crate::error::DecodeError,
    alloy_primitives::{Address, U256},
    alloy_sol_types::{SolCall, sol},
    chrono::{DateTime, Utc},
    domain_types::{PendingTransaction, Protocol, SwapIntent},
};

sol! {
    function swapExactTokensForTokens(uint256 amountIn, uint256 amountOutMin, address[] path, address to, uint256 deadline) returns (uint256[] amounts);
    function swapExactETHForTokens(uint256 amountOutMin, address[] path, address to, uint256 deadline) returns (uint256[] amounts);
    function swapExactTokensForETH(uint256 amountIn, uint256 amountOutMin, address[] path, address to, uint256 deadline) returns (uint256[] amounts);
    function swapTokensForExactTokens(uint256 amountOut, uint256 amountInMax, address[] path, address to, uint256 deadline) returns (uint256[] amounts);
    function swapETHForExactTokens(uint256 amountOut, address[] path, address to, uint256 deadline) returns (uint256[] amounts);
    function swapTokensForExactETH(uint256 amountOut, uint256 amountInMax, address[] path, address to, uint256 deadline) returns (uint256[] amounts);
    function swapExactTokensForTokensSupportingFeeOnTransferTokens(uint256 amountIn, uint256 amountOutMin, address[] path, address to, uint256 deadline);
}

pub(crate) const SELECTORS: [[u8; 4]; 7] = [
    swapExactTokensForTokensCall::SELECTOR,
    swapExactETHForTokensCall::SELECTOR,
    swapExactTokensForETHCall::SELECTOR,
    swapTokensForExactTokensCall::SELECTOR,
    swapETHForExactTokensCall::SELECTOR,
    swapTokensForExactETHCall::SELECTOR,
    swapExactTokensForTokensSupportingFeeOnTransferTokensCall::SELECTOR,
];

/// The amounts and flags one V2 call shape contributes to the intent.
struct Decoded {
    amount_in: U256,
    expected_amount_out: U256,
    is_exact_output: bool,
    path: Vec<Address>,
    deadline: U256,
}

pub(crate) fn decode(
    tx: &PendingTransaction,
    router: Address,
    now: DateTime<Utc>,
) -> Result<SwapIntent, DecodeError> {
    let selector = tx.selector().ok_or(DecodeError::ShortCalldata)?;
    let decoded = match selector {
        swapExactTokensForTokensCall::SELECTOR => {
            let call = swapExactTokensForTokensCall::abi_decode(&tx.input)?;
            Decoded {
                amount_in: call.amountIn,
                expected_amount_out: call.amountOutMin,
                is_exact_output: false,
                path: call.path,
                deadline: call.deadline,
            }
        }
        swapExactTokensForTokensSupportingFeeOnTransferTokensCall::SELECTOR => {
            let call =
                swapExactTokensForTokensSupportingFeeOnTransferTokensCall::abi_decode(&tx.input)?;
            Decoded {
                amount_in: call.amountIn,
                expected_amount_out: call.amountOutMin,
                is_exact_output: false,
                path: call.path,
                deadline: call.deadline,
            }
        }
        swapExactETHForTokensCall::SELECTOR => {
            let call = swapExactETHForTokensCall::abi_decode(&tx.input)?;
            // The input amount of ETH-in calls only exists in the
            // transaction value.
            Decoded {
                amount_in: tx.value,
                expected_amount_out: call.amountOutMin,
                is_exact_output: false,
                path: call.path,
                deadline: call.deadline,
            }
        }
        swapExactTokensForETHCall::SELECTOR => {
            let call = swapExactTokensForETHCall::abi_decode(&tx.input)?;
            Decoded {
                amount_in: call.amountIn,
                expected_amount_out: call.amountOutMin,
                is_exact_output: false,
                path: call.path,
                deadline: call.deadline,
            }
        }
        swapTokensForExactTokensCall::SELECTOR => {
            let call = swapTokensForExactTokensCall::abi_decode(&tx.input)?;
            Decoded {
                amount_in: call.amountInMax,
                expected_amount_out: call.amountOut,
                is_exact_output: true,
                path: call.path,
                deadline: call.deadline,
            }
        }
        swapTokensForExactETHCall::SELECTOR => {
            let call = swapTokensForExactETHCall::abi_decode(&tx.input)?;
            Decoded {
                amount_in: call.amountInMax,
                expected_amount_out: call.amountOut,
                is_exact_output: true,
                path: call.path,
                deadline: call.deadline,
            }
        }
        swapETHForExactTokensCall::SELECTOR => {
            let call = swapETHForExactTokensCall::abi_decode(&tx.input)?;
            Decoded {
                amount_in: tx.value,
                expected_amount_out: call.amountOut,
                is_exact_output: true,
                path: call.path,
                deadline: call.deadline,
            }
        }
        _ => return Err(DecodeError::UnknownSelector),
    };

    if decoded.path.len() < 2 {
        return Err(DecodeError::ShortPath);
    }

    Ok(SwapIntent {
        tx_hash: tx.hash,
        protocol: Protocol::UniswapV2,
        router,
        sender: tx.from,
        token_in: decoded.path[0],
        token_out: *decoded.path.last().unwrap(),
        path: decoded.path,
        amount_in: decoded.amount_in,
        expected_amount_out: decoded.expected_amount_out,
        is_exact_output: decoded.is_exact_output,
        fee_tiers: Vec::new(),
        deadline: decoded.deadline.try_into().unwrap_or(u64::MAX),
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
        alloy_sol_types::SolCall,
        domain_types::GasPricing,
        hex_literal::hex,
    };

    const WETH: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
    const USDC: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");

    fn pending(input: Vec<u8>, value: U256) -> PendingTransaction {
        PendingTransaction {
            hash: B256::repeat_byte(0x11),
            from: address!("00000000000000000000000000000000000000aa"),
            to: Some(address!("7a250d5630b4cf539739df2c5dacb4c659f2488d")),
            value,
            input: Bytes::from(input),
            gas: 250_000,
            gas_pricing: GasPricing::Legacy {
                gas_price: U256::from(30_000_000_000u64),
            },
            nonce: 3,
            chain_id: 1,
        }
    }

    #[test]
    fn selectors_match_the_onchain_abi() {
        assert_eq!(swapExactTokensForTokensCall::SELECTOR, hex!("38ed1739"));
        assert_eq!(swapExactETHForTokensCall::SELECTOR, hex!("7ff36ab5"));
        assert_eq!(swapExactTokensForETHCall::SELECTOR, hex!("18cbafe5"));
        assert_eq!(swapTokensForExactTokensCall::SELECTOR, hex!("8803dbee"));
        assert_eq!(swapETHForExactTokensCall::SELECTOR, hex!("fb3bdb41"));
        assert_eq!(swapTokensForExactETHCall::SELECTOR, hex!("4a25d94a"));
        assert_eq!(
            swapExactTokensForTokensSupportingFeeOnTransferTokensCall::SELECTOR,
            hex!("5c11d795")
        );
    }

    #[test]
    fn exact_eth_for_tokens_takes_amount_from_value() {
        let call = swapExactETHForTokensCall {
            amountOutMin: U256::from(1_000_000u64),
            path: vec![WETH, USDC],
            to: address!("00000000000000000000000000000000000000aa"),
            deadline: U256::from(1_700_000_000u64),
        };
        // 0.1 ETH
        let value = U256::from(0x16345785d8a0000u128);
        let tx = pending(call.abi_encode(), value);
        let intent = decode(&tx, tx.to.unwrap(), Utc::now()).unwrap();

        assert_eq!(intent.protocol, Protocol::UniswapV2);
        assert_eq!(intent.token_in, WETH);
        assert_eq!(intent.token_out, USDC);
        assert_eq!(intent.amount_in, U256::from(100_000_000_000_000_000u128));
        assert_eq!(intent.path.len(), 2);
        assert!(!intent.is_exact_output);
    }

    #[test]
    fn exact_output_mirror_records_max_in() {
        let call = swapTokensForExactTokensCall {
            amountOut: U256::from(5_000u64),
            amountInMax: U256::from(6_000u64),
            path: vec![USDC, WETH],
            to: address!("00000000000000000000000000000000000000aa"),
            deadline: U256::from(1_700_000_000u64),
        };
        let tx = pending(call.abi_encode(), U256::ZERO);
        let intent = decode(&tx, tx.to.unwrap(), Utc::now()).unwrap();

        assert!(intent.is_exact_output);
        assert_eq!(intent.amount_in, U256::from(6_000u64));
        assert_eq!(intent.expected_amount_out, U256::from(5_000u64));
        assert_eq!(intent.deadline, 1_700_000_000);
    }

    #[test]
    fn single_token_path_is_rejected() {
        let call = swapExactTokensForTokensCall {
            amountIn: U256::from(1u64),
            amountOutMin: U256::ZERO,
            path: vec![WETH],
            to: Address::ZERO,
            deadline: U256::ZERO,
        };
        let tx = pending(call.abi_encode(), U256::ZERO);
        assert!(matches!(
            decode(&tx, tx.to.unwrap(), Utc::now()),
            Err(DecodeError::ShortPath)
        ));
    }

    #[test]
    fn truncated_calldata_is_malformed() {
        let call = swapExactTokensForTokensCall {
            amountIn: U256::from(1u64),
            amountOutMin: U256::ZERO,
            path: vec![WETH, USDC],
            to: Address::ZERO,
            deadline: U256::ZERO,
        };
        let mut data = call.abi_encode();
        data.truncate(40);
        let tx = pending(data, U256::ZERO);
        assert!(matches!(
            decode(&tx, tx.to.unwrap(), Utc::now()),
            Err(DecodeError::MalformedAbi(_))
        ));
    }
}
