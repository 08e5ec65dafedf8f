use once_cell::sync::Lazy;
use regex::Regex;

/// Symbol reported when no pattern matches a title.
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

/// Ordered by priority; the first pattern that matches wins.
static SYMBOL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // "(ABC)"
        r"\(([A-Z0-9]{2,10})\)",
        // "ABC/KRW", "ABC / KRW"
        r"([A-Z]{2,10})\s*/\s*KRW",
        // "ABC 마켓"
        r"([A-Z]{2,10})\s*마켓",
        // "ABC 원화"
        r"([A-Z]{2,10})\s*원화",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid symbol pattern"))
    .collect()
});

/// Pulls a coin ticker out of a free-text announcement title.
///
/// Matching runs against the upper-cased title, so lower-case tickers are
/// reported upper-cased. Returns `None` when nothing matches.
pub fn extract_coin_symbol(title: &str) -> Option<String> {
    let normalized = title.to_uppercase();

    SYMBOL_PATTERNS.iter().find_map(|re| {
        re.captures(&normalized)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// Like [`extract_coin_symbol`] but falls back to [`UNKNOWN_SYMBOL`].
pub fn coin_symbol_or_unknown(title: &str) -> String {
    extract_coin_symbol(title).unwrap_or_else(|| UNKNOWN_SYMBOL.to_string())
}
