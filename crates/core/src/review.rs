/// Tokens marking informal lot/block addresses that need a manual check.
pub const REVIEW_KEYWORDS: &[&str] = &["mza", "mz", "mzn", "mzna", "manzana", "casa", "lote"];

/// Returns `true` when any whitespace-separated token of the address equals
/// one of [`REVIEW_KEYWORDS`], ignoring case.
///
/// Matching is exact per token: `"mza,"` or `"123mza"` do not match.
pub fn should_flag(address: &str) -> bool {
    let lowered = address.to_lowercase();
    lowered
        .split_whitespace()
        .any(|token| REVIEW_KEYWORDS.contains(&token))
}
