//! Supported networks
//!
//! Fixed registry of chains secrets can be redeemed on. An unknown chain id
//! is a hard error at every call site, never a silent default.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChainNetwork {
    ScrollMainnet,
    ScrollSepolia,
    Sepolia,
}

impl ChainNetwork {
    pub const ALL: [ChainNetwork; 3] = [
        ChainNetwork::ScrollMainnet,
        ChainNetwork::ScrollSepolia,
        ChainNetwork::Sepolia,
    ];

    pub fn chain_id(&self) -> u64 {
        match self {
            Self::ScrollMainnet => 534352,
            Self::ScrollSepolia => 534351,
            Self::Sepolia => 11_155_111,
        }
    }

    pub fn rpc_url(&self) -> &'static str {
        match self {
            Self::ScrollMainnet => "https://rpc.scroll.io/",
            Self::ScrollSepolia => "https://sepolia-rpc.scroll.io/",
            Self::Sepolia => "https://ethereum-sepolia-rpc.publicnode.com/",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ScrollMainnet => "scroll-mainnet",
            Self::ScrollSepolia => "scroll-sepolia",
            Self::Sepolia => "sepolia",
        }
    }

    /// Look up a network by chain id.
    pub fn for_chain_id(chain_id: u64) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.chain_id() == chain_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        assert_eq!(
            ChainNetwork::for_chain_id(534351),
            Some(ChainNetwork::ScrollSepolia)
        );
        assert_eq!(
            ChainNetwork::for_chain_id(11_155_111),
            Some(ChainNetwork::Sepolia)
        );
        assert_eq!(ChainNetwork::for_chain_id(1), None);
    }

    #[test]
    fn test_ids_are_unique() {
        for (i, a) in ChainNetwork::ALL.iter().enumerate() {
            for b in &ChainNetwork::ALL[i + 1..] {
                assert_ne!(a.chain_id(), b.chain_id());
            }
        }
    }
}
