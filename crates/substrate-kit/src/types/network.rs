//! Network identification for Substrate chains.

use std::fmt;

use super::account::GENERIC_SS58_PREFIX;

/// The chain the client is connected to.
///
/// Used for SS58 address formatting and default RPC endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Network {
    /// Polkadot relay chain.
    #[default]
    Polkadot,
    /// Kusama relay chain.
    Kusama,
    /// Westend test network.
    Westend,
    /// Any other chain, identified by its SS58 prefix.
    Custom { ss58_prefix: u16 },
}

impl Network {
    /// Returns the SS58 address prefix of this network.
    pub fn ss58_prefix(&self) -> u16 {
        match self {
            Network::Polkadot => 0,
            Network::Kusama => 2,
            Network::Westend => GENERIC_SS58_PREFIX,
            Network::Custom { ss58_prefix } => *ss58_prefix,
        }
    }

    /// Default public RPC endpoint, if this is a known network.
    pub fn default_rpc_url(&self) -> Option<&'static str> {
        match self {
            Network::Polkadot => Some("https://rpc.polkadot.io"),
            Network::Kusama => Some("https://kusama-rpc.polkadot.io"),
            Network::Westend => Some("https://westend-rpc.polkadot.io"),
            Network::Custom { .. } => None,
        }
    }

    /// Returns the network identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Polkadot => "polkadot",
            Network::Kusama => "kusama",
            Network::Westend => "westend",
            Network::Custom { .. } => "custom",
        }
    }

    /// Look up a known network by name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "polkadot" => Some(Network::Polkadot),
            "kusama" => Some(Network::Kusama),
            "westend" => Some(Network::Westend),
            _ => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_display() {
        assert_eq!(Network::Polkadot.to_string(), "polkadot");
        assert_eq!(Network::Kusama.to_string(), "kusama");
        assert_eq!(Network::Custom { ss58_prefix: 7 }.to_string(), "custom");
    }

    #[test]
    fn test_ss58_prefixes() {
        assert_eq!(Network::Polkadot.ss58_prefix(), 0);
        assert_eq!(Network::Kusama.ss58_prefix(), 2);
        assert_eq!(Network::Westend.ss58_prefix(), 42);
        assert_eq!(Network::Custom { ss58_prefix: 1284 }.ss58_prefix(), 1284);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Network::from_name("Kusama"), Some(Network::Kusama));
        assert_eq!(Network::from_name("rococo"), None);
        assert!(Network::Custom { ss58_prefix: 0 }.default_rpc_url().is_none());
    }

    #[test]
    fn test_default_is_polkadot() {
        assert_eq!(Network::default(), Network::Polkadot);
    }
}
