// ---------------------------------------------------------------------------
// Volume thresholds
// ---------------------------------------------------------------------------

/// USD value at ingest time above which a trade or transfer is promoted into
/// the big-transaction log.
pub const BIG_VOLUME_USD: f64 = 50_000.0;

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Maximum rows fetched per page from the source database.
pub const PAGE_SIZE: i64 = 200_000;

// ---------------------------------------------------------------------------
// Quote assets (Base)
// ---------------------------------------------------------------------------

/// Tokens treated as the pricing side of a swap. A swap whose `token_out`
/// is one of these is a sell of the non-quote asset.
pub const QUOTE_TOKENS: &[&str] = &[
    "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee", // ETH
    "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", // WETH
    "0xdac17f958d2ee523a2206206994597c13d831ec7", // USDT
    "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", // USDC
    "0x6b175474e89094c44da98b954eedeac495271d0f", // DAI
    "0x853d955acef822db058eb8505911ed77f175b99e", // FXS
];

/// Case-insensitive membership test against [`QUOTE_TOKENS`].
pub fn is_quote(token_address: &str) -> bool {
    QUOTE_TOKENS
        .iter()
        .any(|q| q.eq_ignore_ascii_case(token_address))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_lookup_is_case_insensitive() {
        assert!(is_quote("0xDAC17F958D2EE523A2206206994597C13D831EC7"));
        assert!(is_quote("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"));
        assert!(!is_quote("0x0000000000000000000000000000000000000001"));
    }
}
