//! Explorer link rendering for log output

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

/// Cluster selector appended to explorer URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cluster {
    MainnetBeta,
    Devnet,
    Testnet,
    /// Local validator; the explorer needs the RPC endpoint to proxy to.
    Localnet(String),
}

impl Cluster {
    /// Infer the cluster from an RPC endpoint URL. Unknown hosts are
    /// treated as localnet since that is the only case where the explorer
    /// needs a custom cluster parameter anyway.
    pub fn from_endpoint(endpoint: &str) -> Self {
        if endpoint.contains("mainnet") {
            Self::MainnetBeta
        } else if endpoint.contains("devnet") {
            Self::Devnet
        } else if endpoint.contains("testnet") {
            Self::Testnet
        } else {
            Self::Localnet(endpoint.to_string())
        }
    }

    fn query(&self) -> String {
        match self {
            Self::MainnetBeta => String::new(),
            Self::Devnet => "?cluster=devnet".to_string(),
            Self::Testnet => "?cluster=testnet".to_string(),
            Self::Localnet(endpoint) => {
                format!("?cluster=custom&customUrl={}", encode_component(endpoint))
            }
        }
    }
}

/// Percent-encode everything outside the URL-safe unreserved set.
fn encode_component(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push('%');
                encoded.push_str(&format!("{byte:02X}"));
            }
        }
    }
    encoded
}

pub fn transaction_url(signature: &Signature, cluster: &Cluster) -> String {
    format!("https://explorer.solana.com/tx/{signature}{}", cluster.query())
}

pub fn account_url(address: &Pubkey, cluster: &Cluster) -> String {
    format!(
        "https://explorer.solana.com/address/{address}{}",
        cluster.query()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_cluster_from_endpoint() {
        assert_eq!(
            Cluster::from_endpoint("https://api.mainnet-beta.solana.com"),
            Cluster::MainnetBeta
        );
        assert_eq!(
            Cluster::from_endpoint("https://api.devnet.solana.com"),
            Cluster::Devnet
        );
        assert_eq!(
            Cluster::from_endpoint("http://127.0.0.1:8899"),
            Cluster::Localnet("http://127.0.0.1:8899".to_string())
        );
    }

    #[test]
    fn mainnet_urls_have_no_cluster_param() {
        let sig = Signature::default();
        let url = transaction_url(&sig, &Cluster::MainnetBeta);
        assert!(url.starts_with("https://explorer.solana.com/tx/"));
        assert!(!url.contains('?'));
    }

    #[test]
    fn devnet_account_url_carries_cluster() {
        let url = account_url(&Pubkey::new_unique(), &Cluster::Devnet);
        assert!(url.ends_with("?cluster=devnet"));
    }

    #[test]
    fn localnet_urls_point_the_explorer_at_the_endpoint() {
        let cluster = Cluster::from_endpoint("http://127.0.0.1:8899");
        let url = account_url(&Pubkey::new_unique(), &cluster);
        assert!(url.ends_with("?cluster=custom&customUrl=http%3A%2F%2F127.0.0.1%3A8899"));
    }
}
