//! Curve pool and router calls. Pool `exchange` calls identify tokens by
//! small integer indices, so decoding depends on the per-chain pool registry;
//! pools the registry does not know are dropped rather than emitted with
//! placeholder tokens.

use {
    crate::{error::DecodeError, registry::CurvePoolRegistry, time::synthetic_deadline},
    alloy_primitives::{Address, U256},
    alloy_sol_types::{SolCall, SolValue},
    chrono::{DateTime, Utc},
    domain_types::{PendingTransaction, Protocol, SwapIntent},
    hex_literal::hex,
};

/// StableSwap pools index coins with `int128`.
mod stable {
    alloy_sol_types::sol! {
        function exchange(int128 i, int128 j, uint256 dx, uint256 min_dy) returns (uint256);
        function exchange_underlying(int128 i, int128 j, uint256 dx, uint256 min_dy) returns (uint256);
    }
}

/// CryptoSwap pools index coins with `uint256`.
mod crypto {
    alloy_sol_types::sol! {
        function exchange(uint256 i, uint256 j, uint256 dx, uint256 min_dy) returns (uint256);
    }
}

/// Multi-pool `exchange` of the Router-NG deployment. The selector does not
/// derive from any canonical text signature, so it is pinned as a constant;
/// the parameter tuple is `(address[11] route, uint256[5][5] swap_params,
/// uint256 amount, uint256 expected)`.
pub(crate) const ROUTER_NG_EXCHANGE: [u8; 4] = hex!("37ed3a7a");

type RouterNgParams = ([Address; 11], [[U256; 5]; 5], U256, U256);

pub(crate) const SELECTORS: [[u8; 4]; 4] = [
    stable::exchangeCall::SELECTOR,
    stable::exchange_underlyingCall::SELECTOR,
    crypto::exchangeCall::SELECTOR,
    ROUTER_NG_EXCHANGE,
];

pub(crate) fn decode(
    tx: &PendingTransaction,
    router: Address,
    pools: &CurvePoolRegistry,
    now: DateTime<Utc>,
) -> Result<SwapIntent, DecodeError> {
    let selector = tx.selector().ok_or(DecodeError::ShortCalldata)?;
    let (path, amount_in, expected_amount_out) = match selector {
        stable::exchangeCall::SELECTOR => {
            let call = stable::exchangeCall::abi_decode(&tx.input)?;
            let (token_in, token_out) =
                resolve_pair(pools, tx.chain_id, router, int_index(call.i)?, int_index(call.j)?)?;
            (vec![token_in, token_out], call.dx, call.min_dy)
        }
        stable::exchange_underlyingCall::SELECTOR => {
            let call = stable::exchange_underlyingCall::abi_decode(&tx.input)?;
            let (token_in, token_out) =
                resolve_pair(pools, tx.chain_id, router, int_index(call.i)?, int_index(call.j)?)?;
            (vec![token_in, token_out], call.dx, call.min_dy)
        }
        crypto::exchangeCall::SELECTOR => {
            let call = crypto::exchangeCall::abi_decode(&tx.input)?;
            let (token_in, token_out) = resolve_pair(
                pools,
                tx.chain_id,
                router,
                uint_index(call.i)?,
                uint_index(call.j)?,
            )?;
            (vec![token_in, token_out], call.dx, call.min_dy)
        }
        ROUTER_NG_EXCHANGE => {
            let calldata = tx.input.get(4..).ok_or(DecodeError::ShortCalldata)?;
            let (route, _swap_params, amount, expected) =
                RouterNgParams::abi_decode_params(calldata)?;
            (route_tokens(&route)?, amount, expected)
        }
        _ => return Err(DecodeError::UnknownSelector),
    };

    Ok(SwapIntent {
        tx_hash: tx.hash,
        protocol: Protocol::Curve,
        router,
        sender: tx.from,
        token_in: path[0],
        token_out: *path.last().unwrap(),
        path,
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

fn int_index(index: i128) -> Result<usize, DecodeError> {
    usize::try_from(index).map_err(|_| DecodeError::InvalidPoolIndex)
}

fn uint_index(index: U256) -> Result<usize, DecodeError> {
    usize::try_from(index).map_err(|_| DecodeError::InvalidPoolIndex)
}

fn resolve_pair(
    pools: &CurvePoolRegistry,
    chain_id: u64,
    pool: Address,
    i: usize,
    j: usize,
) -> Result<(Address, Address), DecodeError> {
    let token_in = pools.token(chain_id, pool, i).ok_or(DecodeError::UnknownPool(pool))?;
    let token_out = pools.token(chain_id, pool, j).ok_or(DecodeError::UnknownPool(pool))?;
    Ok((token_in, token_out))
}

/// Extracts the token hops of an 11-slot route. The route alternates
/// `token, pool, token, pool, …` and is right-padded with the zero address,
/// so the tokens sit at the even slots up to the first padding entry.
fn route_tokens(route: &[Address; 11]) -> Result<Vec<Address>, DecodeError> {
    let mut tokens = Vec::new();
    for (index, address) in route.iter().enumerate() {
        if *address == Address::ZERO {
            break;
        }
        if index % 2 == 0 {
            tokens.push(*address);
        }
    }
    if tokens.len() < 2 {
        return Err(DecodeError::ShortPath);
    }
    Ok(tokens)
}
