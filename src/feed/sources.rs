/// A syndication source polled by the ingestion loop.
#[derive(Debug, Clone)]
pub struct FeedSource {
    pub name: &'static str,
    pub url: &'static str,
    pub category: &'static str,
    /// Pre-assigned network for single-project feeds; general outlets get
    /// the network inferred from the item title instead.
    pub network: Option<&'static str>,
}

pub const FEED_SOURCES: &[FeedSource] = &[
    FeedSource {
        name: "CoinDesk",
        url: "https://www.coindesk.com/arc/outboundfeeds/rss/",
        category: "markets",
        network: None,
    },
    FeedSource {
        name: "Cointelegraph",
        url: "https://cointelegraph.com/rss",
        category: "markets",
        network: None,
    },
    FeedSource {
        name: "Decrypt",
        url: "https://decrypt.co/feed",
        category: "technology",
        network: None,
    },
    FeedSource {
        name: "The Block",
        url: "https://www.theblock.co/rss.xml",
        category: "markets",
        network: None,
    },
    FeedSource {
        name: "Hedera Blog",
        url: "https://hedera.com/blog/rss.xml",
        category: "networks",
        network: Some("hedera"),
    },
    FeedSource {
        name: "Algorand Newsroom",
        url: "https://algorand.co/blog/rss.xml",
        category: "networks",
        network: Some("algorand"),
    },
    FeedSource {
        name: "Constellation Network",
        url: "https://constellationnetwork.io/feed.xml",
        category: "networks",
        network: Some("constellation"),
    },
];

/// Networks recognized in headlines of general outlets.
const KNOWN_NETWORKS: &[(&str, &[&str])] = &[
    ("bitcoin", &["bitcoin", "btc"]),
    ("ethereum", &["ethereum", "eth "]),
    ("hedera", &["hedera", "hbar"]),
    ("algorand", &["algorand", "algo "]),
    ("constellation", &["constellation", "dag "]),
    ("solana", &["solana", "sol "]),
    ("xrp", &["xrp", "ripple"]),
    ("cardano", &["cardano", "ada "]),
    ("polkadot", &["polkadot", "dot "]),
    ("chainlink", &["chainlink", "link "]),
    ("avalanche", &["avalanche", "avax"]),
];

const TOPIC_TAGS: &[(&str, &[&str])] = &[
    ("defi", &["defi", "decentralized finance", "liquidity", "yield"]),
    ("nft", &["nft", "non-fungible"]),
    ("regulation", &["sec ", "regulation", "regulator", "lawsuit", "compliance"]),
    ("etf", &["etf"]),
    ("stablecoin", &["stablecoin", "usdc", "usdt", "tether"]),
    ("security", &["hack", "exploit", "breach", "stolen"]),
    ("partnership", &["partnership", "partners with", "collaboration"]),
    ("mainnet", &["mainnet", "testnet", "upgrade", "hard fork"]),
    ("adoption", &["adoption", "integration", "launches"]),
];

const BREAKING_MARKERS: &[&str] = &["breaking", "just in", "urgent", "alert:"];

/// Infer the network an item is about from its title, if any.
pub fn infer_network(title: &str) -> Option<String> {
    let haystack = format!("{} ", title.to_lowercase());
    KNOWN_NETWORKS
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| haystack.contains(n)))
        .map(|(network, _)| network.to_string())
}

pub fn extract_tags(title: &str) -> Vec<String> {
    let haystack = title.to_lowercase();
    TOPIC_TAGS
        .iter()
        .filter(|(_, needles)| needles.iter().any(|n| haystack.contains(n)))
        .map(|(tag, _)| tag.to_string())
        .collect()
}

pub fn is_breaking(title: &str) -> bool {
    let haystack = title.to_lowercase();
    BREAKING_MARKERS.iter().any(|m| haystack.contains(m))
}
