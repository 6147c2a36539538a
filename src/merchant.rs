// 🏪 Merchant Extractor
// Pulls a short merchant token sequence out of a normalized description.
//
// Bank descriptions are noisy:
//   "pos purchase 1234 starbucks 5521 seattle wa"
// The merchant is usually in the leading tokens once boilerplate is gone.

/// Generic banking words that never identify a merchant
pub const STOP_TOKENS: &[&str] = &[
    "purchase", "pos", "card", "debit", "credit", "sale", "online", "payment", "venmo", "zelle",
];

/// How many tokens survive into the merchant string
pub const MERCHANT_TOKENS: usize = 3;

/// MerchantExtractor - derive a merchant from normalized description text
///
/// An empty result means "unknown merchant". Callers must treat it as such,
/// never as a failure.
pub trait MerchantExtractor: Send + Sync {
    fn extract_merchant(&self, description_norm: &str) -> String;
}

/// Drops stop tokens, keeps the first three remaining tokens
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicExtractor;

impl MerchantExtractor for BasicExtractor {
    fn extract_merchant(&self, description_norm: &str) -> String {
        description_norm
            .split_whitespace()
            .filter(|t| !is_stop_token(t))
            .take(MERCHANT_TOKENS)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Like [`BasicExtractor`] but also strips digits inside each token
///
/// "1234" disappears entirely, "7eleven" becomes "eleven".
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictExtractor;

impl MerchantExtractor for StrictExtractor {
    fn extract_merchant(&self, description_norm: &str) -> String {
        description_norm
            .split_whitespace()
            .filter(|t| !is_stop_token(t))
            .map(|t| t.chars().filter(|c| !c.is_ascii_digit()).collect::<String>())
            .filter(|t| !t.is_empty() && !is_stop_token(t))
            .take(MERCHANT_TOKENS)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Pick the extractor variant by flag
pub fn extractor_for(strict: bool) -> Box<dyn MerchantExtractor> {
    if strict {
        Box::new(StrictExtractor)
    } else {
        Box::new(BasicExtractor)
    }
}

fn is_stop_token(token: &str) -> bool {
    STOP_TOKENS.contains(&token)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_text;

    #[test]
    fn test_basic_strips_boilerplate() {
        let desc = normalize_text("POS PURCHASE 1234 STARBUCKS #5521 SEATTLE WA");
        assert_eq!(BasicExtractor.extract_merchant(&desc), "1234 starbucks 5521");
    }

    #[test]
    fn test_strict_strips_digits() {
        let desc = normalize_text("POS PURCHASE 1234 STARBUCKS #5521 SEATTLE WA");
        assert_eq!(StrictExtractor.extract_merchant(&desc), "starbucks seattle wa");
    }

    #[test]
    fn test_strict_strips_digits_inside_tokens() {
        assert_eq!(StrictExtractor.extract_merchant("7eleven store42"), "eleven store");
    }

    #[test]
    fn test_takes_first_three_tokens() {
        assert_eq!(
            BasicExtractor.extract_merchant("trader joe s 552 brooklyn"),
            "trader joe s"
        );
    }

    #[test]
    fn test_all_tokens_stripped_is_empty() {
        assert_eq!(BasicExtractor.extract_merchant("online payment debit"), "");
        assert_eq!(StrictExtractor.extract_merchant("card 1234 5678"), "");
        assert_eq!(BasicExtractor.extract_merchant(""), "");
    }

    #[test]
    fn test_extractor_for_flag() {
        let desc = "zelle 4411 landlord";
        assert_eq!(extractor_for(false).extract_merchant(desc), "4411 landlord");
        assert_eq!(extractor_for(true).extract_merchant(desc), "landlord");
    }
}
