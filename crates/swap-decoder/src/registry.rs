use {
    crate::{curve, error::DecodeError, oneinch, uniswap_v2, uniswap_v3},
    alloy_primitives::{Address, address},
    chrono::Utc,
    domain_types::{PendingTransaction, Protocol, SwapIntent},
    std::collections::HashMap,
};

/// Per-chain mapping of Curve pools to their coin lists, resolving the small
/// integer indices `exchange` calls identify tokens with.
#[derive(Debug, Default, Clone)]
pub struct CurvePoolRegistry {
    pools: HashMap<(u64, Address), Vec<Address>>,
}

impl CurvePoolRegistry {
    pub fn register(&mut self, chain_id: u64, pool: Address, coins: Vec<Address>) {
        self.pools.insert((chain_id, pool), coins);
    }

    pub fn token(&self, chain_id: u64, pool: Address, index: usize) -> Option<Address> {
        self.pools.get(&(chain_id, pool))?.get(index).copied()
    }
}

/// Selector-dispatched decoding of pending transactions into swap intents.
///
/// Lookup is O(1): the 4-byte selector indexes into a protocol table, the
/// destination into a chain-keyed router table. V2/V3 calldata is
/// self-describing, so those decoders also accept routers the table has
/// never seen; Curve and 1inch require a registered router.
pub struct DecoderRegistry {
    selectors: HashMap<[u8; 4], Protocol>,
    routers: HashMap<u64, HashMap<Address, Protocol>>,
    curve_pools: CurvePoolRegistry,
}

impl DecoderRegistry {
    /// A registry with no routers registered.
    pub fn empty() -> Self {
        let mut selectors = HashMap::new();
        for selector in uniswap_v2::SELECTORS {
            selectors.insert(selector, Protocol::UniswapV2);
        }
        for selector in uniswap_v3::SELECTORS {
            selectors.insert(selector, Protocol::UniswapV3);
        }
        for selector in curve::SELECTORS {
            selectors.insert(selector, Protocol::Curve);
        }
        for selector in oneinch::SELECTORS {
            selectors.insert(selector, Protocol::OneInch);
        }
        Self {
            selectors,
            routers: HashMap::new(),
            curve_pools: CurvePoolRegistry::default(),
        }
    }

    /// A registry seeded with the well-known mainnet routers and pools.
    pub fn new() -> Self {
        const MAINNET: u64 = 1;
        let mut registry = Self::empty();

        // Uniswap V2 router02 and the Sushi fork.
        registry.register_router(
            MAINNET,
            address!("7a250d5630b4cf539739df2c5dacb4c659f2488d"),
            Protocol::UniswapV2,
        );
        registry.register_router(
            MAINNET,
            address!("d9e1ce17f2641f24ae83637ab66a2cca9c378b9f"),
            Protocol::UniswapV2,
        );
        // Uniswap V3 SwapRouter and SwapRouter02.
        registry.register_router(
            MAINNET,
            address!("e592427a0aece92de3edee1f18e0157c05861564"),
            Protocol::UniswapV3,
        );
        registry.register_router(
            MAINNET,
            address!("68b3465833fb72a70ecdf485e0e4c7bd8665fc45"),
            Protocol::UniswapV3,
        );
        // 1inch AggregationRouterV5.
        registry.register_router(
            MAINNET,
            address!("1111111254eeb25477b68fb85ed929f73a960582"),
            Protocol::OneInch,
        );

        // Curve: the router plus the large stable/crypto pools. Pool
        // `exchange` calls go directly to the pool contract, so pools are
        // registered as routers too.
        let three_pool = address!("bebc44782c7db0a1a60cb6fe97d0b483032ff1c7");
        let tricrypto2 = address!("d51a44d3fae010294c616388b506acda1bfaae46");
        registry.register_router(
            MAINNET,
            address!("f0d4c12a5768d806021f80a262b4d39d26c58b8d"),
            Protocol::Curve,
        );
        registry.register_router(MAINNET, three_pool, Protocol::Curve);
        registry.register_router(MAINNET, tricrypto2, Protocol::Curve);
        registry.register_curve_pool(
            MAINNET,
            three_pool,
            vec![
                address!("6b175474e89094c44da98b954eedeac495271d0f"), // DAI
                address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"), // USDC
                address!("dac17f958d2ee523a2206206994597c13d831ec7"), // USDT
            ],
        );
        registry.register_curve_pool(
            MAINNET,
            tricrypto2,
            vec![
                address!("dac17f958d2ee523a2206206994597c13d831ec7"), // USDT
                address!("2260fac5e5542a773aa44fbcfedf7c193bc2c599"), // WBTC
                address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"), // WETH
            ],
        );

        registry
    }

    pub fn register_router(&mut self, chain_id: u64, router: Address, protocol: Protocol) {
        self.routers.entry(chain_id).or_default().insert(router, protocol);
    }

    pub fn register_curve_pool(&mut self, chain_id: u64, pool: Address, coins: Vec<Address>) {
        self.curve_pools.register(chain_id, pool, coins);
    }

    /// Decodes a pending transaction into a swap intent.
    ///
    /// Every failure (unknown selector, short calldata, malformed ABI,
    /// unresolvable pool, …) is logged at debug and reported as `None`; this
    /// never panics on untrusted calldata.
    pub fn decode(&self, tx: &PendingTransaction) -> Option<SwapIntent> {
        match self.try_decode(tx) {
            Ok(intent) => Some(intent),
            Err(err) => {
                tracing::debug!(tx = ?tx.hash, ?err, "dropping undecodable transaction");
                None
            }
        }
    }

    fn try_decode(&self, tx: &PendingTransaction) -> Result<SwapIntent, DecodeError> {
        let selector = tx.selector().ok_or(DecodeError::ShortCalldata)?;
        let to = tx.to.ok_or(DecodeError::NoDestination)?;
        let protocol = *self
            .selectors
            .get(&selector)
            .ok_or(DecodeError::UnknownSelector)?;
        let registered = self
            .routers
            .get(&tx.chain_id)
            .and_then(|table| table.get(&to))
            .copied();

        let now = Utc::now();
        match protocol {
            // V2/V3 calldata names its tokens, so unknown routers decode too.
            Protocol::UniswapV2 => uniswap_v2::decode(tx, to, now),
            Protocol::UniswapV3 => uniswap_v3::decode(tx, to, now),
            Protocol::Curve => {
                if registered != Some(Protocol::Curve) {
                    return Err(DecodeError::UnknownRouter(to));
                }
                curve::decode(tx, to, &self.curve_pools, now)
            }
            Protocol::OneInch => {
                if registered != Some(Protocol::OneInch) {
                    return Err(DecodeError::UnknownRouter(to));
                }
                oneinch::decode(tx, to, now)
            }
        }
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        alloy_primitives::{B256, Bytes, U256},
        alloy_sol_types::{SolCall, sol},
        domain_types::GasPricing,
    };

    sol! {
        function swapExactETHForTokens(uint256 amountOutMin, address[] path, address to, uint256 deadline) returns (uint256[] amounts);
    }

    const WETH: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
    const USDC: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");

    fn pending(to: Option<Address>, input: Vec<u8>, value: U256) -> PendingTransaction {
        PendingTransaction {
            hash: B256::repeat_byte(0x55),
            from: address!("00000000000000000000000000000000000000ee"),
            to,
            value,
            input: Bytes::from(input),
            gas: 250_000,
            gas_pricing: GasPricing::Legacy {
                gas_price: U256::from(10_000_000_000u64),
            },
            nonce: 0,
            chain_id: 1,
        }
    }

    fn eth_for_tokens_calldata() -> Vec<u8> {
        swapExactETHForTokensCall {
            amountOutMin: U256::from(1u64),
            path: vec![WETH, USDC],
            to: Address::ZERO,
            deadline: U256::from(1_700_000_000u64),
        }
        .abi_encode()
    }

    #[test]
    fn decodes_registered_v2_router() {
        let registry = DecoderRegistry::new();
        let router = address!("7a250d5630b4cf539739df2c5dacb4c659f2488d");
        let value = U256::from(0x16345785d8a0000u128);
        let tx = pending(Some(router), eth_for_tokens_calldata(), value);

        let intent = registry.decode(&tx).unwrap();
        assert_eq!(intent.protocol, Protocol::UniswapV2);
        assert_eq!(intent.token_in, WETH);
        assert_eq!(intent.token_out, USDC);
        assert_eq!(intent.amount_in, value);
    }

    #[test]
    fn v2_calldata_decodes_for_unknown_router() {
        let registry = DecoderRegistry::new();
        let router = address!("00000000000000000000000000000000000beef0");
        let tx = pending(Some(router), eth_for_tokens_calldata(), U256::from(1u64));
        assert!(registry.decode(&tx).is_some());
    }

    #[test]
    fn oneinch_requires_registered_router() {
        let registry = DecoderRegistry::new();
        let calldata = {
            use crate::oneinch::SELECTORS;
            let mut data = SELECTORS[1].to_vec();
            data.extend_from_slice(&[0u8; 32]);
            data
        };
        let tx = pending(
            Some(address!("00000000000000000000000000000000000beef0")),
            calldata,
            U256::ZERO,
        );
        assert!(registry.decode(&tx).is_none());
    }

    #[test]
    fn boundary_calldata_is_dropped() {
        let registry = DecoderRegistry::new();
        let router = address!("7a250d5630b4cf539739df2c5dacb4c659f2488d");

        // Empty calldata.
        assert!(registry.decode(&pending(Some(router), vec![], U256::ZERO)).is_none());
        // 3-byte calldata.
        assert!(
            registry
                .decode(&pending(Some(router), vec![0x38, 0xed, 0x17], U256::ZERO))
                .is_none()
        );
        // Unknown selector.
        assert!(
            registry
                .decode(&pending(Some(router), vec![0xde, 0xad, 0xbe, 0xef], U256::ZERO))
                .is_none()
        );
        // Contract creation.
        assert!(
            registry
                .decode(&pending(None, eth_for_tokens_calldata(), U256::ZERO))
                .is_none()
        );
    }

    #[test]
    fn chain_id_zero_uses_its_own_router_table() {
        let mut registry = DecoderRegistry::empty();
        let router = address!("00000000000000000000000000000000000000aa");
        registry.register_router(0, router, Protocol::UniswapV2);

        let mut tx = pending(Some(router), eth_for_tokens_calldata(), U256::from(1u64));
        tx.chain_id = 0;
        // Self-describing calldata still decodes and keeps the zero chain id.
        let intent = registry.decode(&tx).unwrap();
        assert_eq!(intent.chain_id, 0);
    }
}
