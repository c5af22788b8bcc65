use {
    serde::de::{self, Deserialize, Deserializer},
    std::sync::Once,
    thiserror::Error,
};

/// Represents each chain the engine can be configured for.
///
/// Raw feed transactions carry their chain id verbatim as a `u64` (including
/// `0`); this enum only exists for components that are explicitly configured
/// per chain, like simulation providers and the router registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum Chain {
    Mainnet = 1,
    Goerli = 5,
    Optimism = 10,
    Bsc = 56,
    Solana = 101,
    Polygon = 137,
    Fantom = 250,
    ZkSync = 324,
    Base = 8453,
    ArbitrumOne = 42161,
    Avalanche = 43114,
    Linea = 59144,
    Sepolia = 11155111,
}

impl Chain {
    /// Returns the chain's chain ID
    pub fn id(&self) -> u64 {
        *self as u64
    }

    /// Returns the canonical name of the chain.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mainnet => "Ethereum / Mainnet",
            Self::Goerli => "Ethereum / Goerli",
            Self::Optimism => "Optimism",
            Self::Bsc => "BNB Smart Chain",
            Self::Solana => "Solana",
            Self::Polygon => "Polygon",
            Self::Fantom => "Fantom",
            Self::ZkSync => "zkSync Era",
            Self::Base => "Base",
            Self::ArbitrumOne => "Arbitrum One",
            Self::Avalanche => "Avalanche C-Chain",
            Self::Linea => "Linea",
            Self::Sepolia => "Ethereum / Sepolia",
        }
    }

    /// Whether the chain is still supported for new deployments.
    pub fn is_deprecated(&self) -> bool {
        matches!(self, Self::Goerli)
    }

    /// Logs a warning the first time a component gets configured for a
    /// deprecated chain. Repeated calls are silent.
    pub fn warn_if_deprecated(&self) {
        static WARNED: Once = Once::new();
        if self.is_deprecated() {
            WARNED.call_once(|| {
                tracing::warn!(
                    chain = self.name(),
                    id = self.id(),
                    "configured for a deprecated chain"
                );
            });
        }
    }
}

impl TryFrom<u64> for Chain {
    type Error = Error;

    /// Initializes `Chain` from a chain ID, returns error if the chain id is
    /// not supported
    fn try_from(value: u64) -> Result<Self, Self::Error> {
        let chain = match value {
            x if x == Self::Mainnet as u64 => Self::Mainnet,
            x if x == Self::Goerli as u64 => Self::Goerli,
            x if x == Self::Optimism as u64 => Self::Optimism,
            x if x == Self::Bsc as u64 => Self::Bsc,
            x if x == Self::Solana as u64 => Self::Solana,
            x if x == Self::Polygon as u64 => Self::Polygon,
            x if x == Self::Fantom as u64 => Self::Fantom,
            x if x == Self::ZkSync as u64 => Self::ZkSync,
            x if x == Self::Base as u64 => Self::Base,
            x if x == Self::ArbitrumOne as u64 => Self::ArbitrumOne,
            x if x == Self::Avalanche as u64 => Self::Avalanche,
            x if x == Self::Linea as u64 => Self::Linea,
            x if x == Self::Sepolia as u64 => Self::Sepolia,
            _ => Err(Error::ChainIdNotSupported)?,
        };
        Ok(chain)
    }
}

impl<'de> Deserialize<'de> for Chain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ChainVisitor;

        impl<'de> de::Visitor<'de> for ChainVisitor {
            type Value = Chain;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a u64, a decimal string or a 0x-prefixed hex string")
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Chain::try_from(value).map_err(de::Error::custom)
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let id = match value.strip_prefix("0x") {
                    Some(hex) => u64::from_str_radix(hex, 16).map_err(de::Error::custom)?,
                    None => value.parse::<u64>().map_err(de::Error::custom)?,
                };
                Chain::try_from(id).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_any(ChainVisitor)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("chain id not supported")]
    ChainIdNotSupported,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chain_ids() {
        assert_eq!(Chain::Mainnet.id(), 1);
        assert_eq!(Chain::Sepolia.id(), 11155111);
        assert_eq!(Chain::ArbitrumOne.id(), 42161);
        assert_eq!(Chain::Optimism.id(), 10);
        assert_eq!(Chain::Polygon.id(), 137);
        assert_eq!(Chain::Base.id(), 8453);
        assert_eq!(Chain::Bsc.id(), 56);
        assert_eq!(Chain::Avalanche.id(), 43114);
        assert_eq!(Chain::ZkSync.id(), 324);
        assert_eq!(Chain::Linea.id(), 59144);
        assert_eq!(Chain::Fantom.id(), 250);
        assert_eq!(Chain::Solana.id(), 101);
    }

    #[test]
    fn deserialize_from_u64() {
        let chain: Chain = serde_json::from_str("1").unwrap();
        assert_eq!(chain, Chain::Mainnet);

        let chain: Chain = serde_json::from_str("8453").unwrap();
        assert_eq!(chain, Chain::Base);

        // Not a supported chain.
        let result: Result<Chain, _> = serde_json::from_str("9999999");
        assert!(result.is_err());
    }

    #[test]
    fn deserialize_from_str() {
        let chain: Chain = serde_json::from_str("\"42161\"").unwrap();
        assert_eq!(chain, Chain::ArbitrumOne);

        let chain: Chain = serde_json::from_str("\"0xa\"").unwrap();
        assert_eq!(chain, Chain::Optimism);

        let result: Result<Chain, _> = serde_json::from_str("\"invalid\"");
        assert!(result.is_err());
    }

    #[test]
    fn goerli_is_deprecated() {
        assert!(Chain::Goerli.is_deprecated());
        assert!(!Chain::Mainnet.is_deprecated());
    }
}
