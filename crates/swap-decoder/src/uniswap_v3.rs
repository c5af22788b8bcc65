//! Uniswap-V3-family router calls, covering both the original `SwapRouter`
//! and `SwapRouter02` shapes. Multi-hop calls carry the route in the packed
//! `address ‖ fee ‖ address ‖ …` layout which is validated strictly.

use {
    crate::error::DecodeError,
    alloy_primitives::{Address, U256},
    alloy_sol_types::SolCall,
    chrono::{DateTime, Utc},
    domain_types::{PendingTransaction, Protocol, SwapIntent},
};

/// Calls of the original `SwapRouter`, all carrying a deadline in the params
/// struct.
mod swap_router {
    alloy_sol_types::sol! {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 deadline;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        struct ExactOutputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 deadline;
            uint256 amountOut;
            uint256 amountInMaximum;
            uint160 sqrtPriceLimitX96;
        }

        struct ExactInputParams {
            bytes path;
            address recipient;
            uint256 deadline;
            uint256 amountIn;
            uint256 amountOutMinimum;
        }

        struct ExactOutputParams {
            bytes path;
            address recipient;
            uint256 deadline;
            uint256 amountOut;
            uint256 amountInMaximum;
        }

        function exactInputSingle(ExactInputSingleParams params) returns (uint256 amountOut);
        function exactOutputSingle(ExactOutputSingleParams params) returns (uint256 amountIn);
        function exactInput(ExactInputParams params) returns (uint256 amountOut);
        function exactOutput(ExactOutputParams params) returns (uint256 amountIn);
    }
}

/// `SwapRouter02` dropped the deadline from the single-hop params struct
/// (deadlines moved to the `multicall(deadline, …)` wrapper).
mod swap_router_02 {
    alloy_sol_types::sol! {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        function exactInputSingle(ExactInputSingleParams params) returns (uint256 amountOut);
    }
}

use {self::swap_router as v3, self::swap_router_02 as v3_02, crate::time::synthetic_deadline};

pub(crate) const SELECTORS: [[u8; 4]; 5] = [
    v3::exactInputSingleCall::SELECTOR,
    v3::exactOutputSingleCall::SELECTOR,
    v3::exactInputCall::SELECTOR,
    v3::exactOutputCall::SELECTOR,
    v3_02::exactInputSingleCall::SELECTOR,
];

struct Decoded {
    token_in: Address,
    token_out: Address,
    path: Vec<Address>,
    fee_tiers: Vec<u32>,
    amount_in: U256,
    expected_amount_out: U256,
    is_exact_output: bool,
    deadline: u64,
}

pub(crate) fn decode(
    tx: &PendingTransaction,
    router: Address,
    now: DateTime<Utc>,
) -> Result<SwapIntent, DecodeError> {
    let selector = tx.selector().ok_or(DecodeError::ShortCalldata)?;
    let decoded = match selector {
        v3::exactInputSingleCall::SELECTOR => {
            let params = v3::exactInputSingleCall::abi_decode(&tx.input)?.params;
            Decoded {
                token_in: params.tokenIn,
                token_out: params.tokenOut,
                path: vec![params.tokenIn, params.tokenOut],
                fee_tiers: vec![params.fee.to::<u32>()],
                amount_in: params.amountIn,
                expected_amount_out: params.amountOutMinimum,
                is_exact_output: false,
                deadline: params.deadline.try_into().unwrap_or(u64::MAX),
            }
        }
        v3_02::exactInputSingleCall::SELECTOR => {
            let params = v3_02::exactInputSingleCall::abi_decode(&tx.input)?.params;
            Decoded {
                token_in: params.tokenIn,
                token_out: params.tokenOut,
                path: vec![params.tokenIn, params.tokenOut],
                fee_tiers: vec![params.fee.to::<u32>()],
                amount_in: params.amountIn,
                expected_amount_out: params.amountOutMinimum,
                is_exact_output: false,
                deadline: synthetic_deadline(now),
            }
        }
        v3::exactOutputSingleCall::SELECTOR => {
            let params = v3::exactOutputSingleCall::abi_decode(&tx.input)?.params;
            Decoded {
                token_in: params.tokenIn,
                token_out: params.tokenOut,
                path: vec![params.tokenIn, params.tokenOut],
                fee_tiers: vec![params.fee.to::<u32>()],
                amount_in: params.amountInMaximum,
                expected_amount_out: params.amountOut,
                is_exact_output: true,
                deadline: params.deadline.try_into().unwrap_or(u64::MAX),
            }
        }
        v3::exactInputCall::SELECTOR => {
            let params = v3::exactInputCall::abi_decode(&tx.input)?.params;
            let (path, fee_tiers) = parse_packed_path(&params.path)?;
            Decoded {
                token_in: path[0],
                token_out: *path.last().unwrap(),
                path,
                fee_tiers,
                amount_in: params.amountIn,
                expected_amount_out: params.amountOutMinimum,
                is_exact_output: false,
                deadline: params.deadline.try_into().unwrap_or(u64::MAX),
            }
        }
        v3::exactOutputCall::SELECTOR => {
            let params = v3::exactOutputCall::abi_decode(&tx.input)?.params;
            // Exact-output paths are packed output token first; flip them so
            // intents always read input to output.
            let (mut path, mut fee_tiers) = parse_packed_path(&params.path)?;
            path.reverse();
            fee_tiers.reverse();
            Decoded {
                token_in: path[0],
                token_out: *path.last().unwrap(),
                path,
                fee_tiers,
                amount_in: params.amountInMaximum,
                expected_amount_out: params.amountOut,
                is_exact_output: true,
                deadline: params.deadline.try_into().unwrap_or(u64::MAX),
            }
        }
        _ => return Err(DecodeError::UnknownSelector),
    };

    Ok(SwapIntent {
        tx_hash: tx.hash,
        protocol: Protocol::UniswapV3,
        router,
        sender: tx.from,
        token_in: decoded.token_in,
        token_out: decoded.token_out,
        path: decoded.path,
        amount_in: decoded.amount_in,
        expected_amount_out: decoded.expected_amount_out,
        is_exact_output: decoded.is_exact_output,
        fee_tiers: decoded.fee_tiers,
        deadline: decoded.deadline,
        gas_pricing: tx.gas_pricing,
        nonce: tx.nonce,
        chain_id: tx.chain_id,
        first_seen: now,
    })
}

/// Parses the packed `(address, uint24 fee, address, …, address)` route.
/// Only the exact layout `20 + 23k` bytes with `k ≥ 1` is accepted.
fn parse_packed_path(path: &[u8]) -> Result<(Vec<Address>, Vec<u32>), DecodeError> {
    if path.len() < 20 + 23 || (path.len() - 20) % 23 != 0 {
        return Err(DecodeError::InvalidPackedPath(path.len()));
    }
    let hops = (path.len() - 20) / 23;
    let mut tokens = Vec::with_capacity(hops + 1);
    let mut fees = Vec::with_capacity(hops);
    tokens.push(Address::from_slice(&path[..20]));
    let mut offset = 20;
    for _ in 0..hops {
        let fee = &path[offset..offset + 3];
        fees.push(u32::from_be_bytes([0, fee[0], fee[1], fee[2]]));
        tokens.push(Address::from_slice(&path[offset + 3..offset + 23]));
        offset += 23;
    }
    Ok((tokens, fees))
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        alloy_primitives::{
            B256, Bytes, address,
            aliases::{U24, U160},
        },
        domain_types::GasPricing,
        hex_literal::hex,
    };

    const WETH: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
    const USDC: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
    const DAI: Address = address!("6b175474e89094c44da98b954eedeac495271d0f");

    fn pending(input: Vec<u8>) -> PendingTransaction {
        PendingTransaction {
            hash: B256::repeat_byte(0x22),
            from: address!("00000000000000000000000000000000000000bb"),
            to: Some(address!("68b3465833fb72a70ecdf485e0e4c7bd8665fc45")),
            value: U256::ZERO,
            input: Bytes::from(input),
            gas: 300_000,
            gas_pricing: GasPricing::Eip1559 {
                max_fee_per_gas: U256::from(40_000_000_000u64),
                max_priority_fee_per_gas: U256::from(1_000_000_000u64),
            },
            nonce: 12,
            chain_id: 1,
        }
    }

    #[test]
    fn selectors_match_the_onchain_abi() {
        assert_eq!(v3::exactInputSingleCall::SELECTOR, hex!("414bf389"));
        assert_eq!(v3::exactOutputSingleCall::SELECTOR, hex!("db3e2198"));
        assert_eq!(v3::exactInputCall::SELECTOR, hex!("c04b8d59"));
        assert_eq!(v3::exactOutputCall::SELECTOR, hex!("f28c0498"));
        assert_eq!(v3_02::exactInputSingleCall::SELECTOR, hex!("04e45aaf"));
    }

    #[test]
    fn router_02_single_gets_synthetic_deadline() {
        let call = v3_02::exactInputSingleCall {
            params: v3_02::ExactInputSingleParams {
                tokenIn: USDC,
                tokenOut: WETH,
                fee: U24::from(3000u32),
                recipient: Address::ZERO,
                amountIn: U256::from(3_000_000_000u64),
                amountOutMinimum: U256::ZERO,
                sqrtPriceLimitX96: U160::ZERO,
            },
        };
        let now = Utc::now();
        let tx = pending(call.abi_encode());
        let intent = decode(&tx, tx.to.unwrap(), now).unwrap();

        assert!(!intent.is_exact_output);
        assert_eq!(intent.fee_tiers, vec![3000]);
        assert_eq!(intent.amount_in, U256::from(3_000_000_000u64));
        let expected = now.timestamp() as u64 + 3600;
        assert!(intent.deadline.abs_diff(expected) <= 10);
    }

    #[test]
    fn packed_path_multi_hop() {
        // WETH -0.3%-> USDC -0.05%-> DAI
        let mut path = Vec::new();
        path.extend_from_slice(WETH.as_slice());
        path.extend_from_slice(&[0x00, 0x0b, 0xb8]); // 3000
        path.extend_from_slice(USDC.as_slice());
        path.extend_from_slice(&[0x00, 0x01, 0xf4]); // 500
        path.extend_from_slice(DAI.as_slice());

        let call = v3::exactInputCall {
            params: v3::ExactInputParams {
                path: path.into(),
                recipient: Address::ZERO,
                deadline: U256::from(1_700_000_000u64),
                amountIn: U256::from(10u64).pow(U256::from(18u64)),
                amountOutMinimum: U256::ZERO,
            },
        };
        let tx = pending(call.abi_encode());
        let intent = decode(&tx, tx.to.unwrap(), Utc::now()).unwrap();

        assert_eq!(intent.path.len(), 3);
        assert_eq!(intent.fee_tiers, vec![3000, 500]);
        assert_eq!(intent.token_in, WETH);
        assert_eq!(intent.token_out, DAI);
    }

    #[test]
    fn exact_output_path_is_flipped() {
        // Packed output-first: DAI <-0.05%- USDC <-0.3%- WETH
        let mut path = Vec::new();
        path.extend_from_slice(DAI.as_slice());
        path.extend_from_slice(&[0x00, 0x01, 0xf4]);
        path.extend_from_slice(USDC.as_slice());
        path.extend_from_slice(&[0x00, 0x0b, 0xb8]);
        path.extend_from_slice(WETH.as_slice());

        let call = v3::exactOutputCall {
            params: v3::ExactOutputParams {
                path: path.into(),
                recipient: Address::ZERO,
                deadline: U256::from(1_700_000_000u64),
                amountOut: U256::from(500u64),
                amountInMaximum: U256::from(1_000u64),
            },
        };
        let tx = pending(call.abi_encode());
        let intent = decode(&tx, tx.to.unwrap(), Utc::now()).unwrap();

        assert!(intent.is_exact_output);
        assert_eq!(intent.token_in, WETH);
        assert_eq!(intent.token_out, DAI);
        assert_eq!(intent.fee_tiers, vec![3000, 500]);
        assert_eq!(intent.amount_in, U256::from(1_000u64));
    }

    #[test]
    fn malformed_packed_path_is_rejected() {
        for len in [0usize, 19, 20, 21, 42, 44] {
            let call = v3::exactInputCall {
                params: v3::ExactInputParams {
                    path: vec![0xab; len].into(),
                    recipient: Address::ZERO,
                    deadline: U256::ZERO,
                    amountIn: U256::from(1u64),
                    amountOutMinimum: U256::ZERO,
                },
            };
            let tx = pending(call.abi_encode());
            assert!(
                matches!(
                    decode(&tx, tx.to.unwrap(), Utc::now()),
                    Err(DecodeError::InvalidPackedPath(_))
                ),
                "length {len} must be rejected"
            );
        }
    }
}
