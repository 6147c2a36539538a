// 🏦 Bank-Category Mapper
// Maps the bank's own category label onto our canonical category names.

use crate::config::CategorizerConfig;
use crate::normalize::normalize_text;
use std::collections::{HashMap, HashSet};

/// Lookup tables keyed by normalized label
#[derive(Debug, Clone, Default)]
pub struct BankCategoryMapper {
    labels: HashMap<String, String>,
    unknown: HashSet<String>,
}

impl BankCategoryMapper {
    pub fn from_config(config: &CategorizerConfig) -> Self {
        let mut labels = HashMap::new();
        for rule in &config.bank_category_map {
            // Later entries for the same label override earlier ones
            labels.insert(normalize_text(&rule.label), rule.category.clone());
        }

        let unknown = config
            .bank_unknown_labels
            .iter()
            .map(|l| normalize_text(l))
            .collect();

        BankCategoryMapper { labels, unknown }
    }

    /// Canonical category for a raw bank label
    ///
    /// - missing / unknown sentinel → ""
    /// - known label → mapped category
    /// - anything else → the raw label, trimmed
    pub fn map(&self, raw: Option<&str>) -> String {
        let Some(raw) = raw else {
            return String::new();
        };

        let key = normalize_text(raw);
        if self.unknown.contains(&key) {
            return String::new();
        }

        match self.labels.get(&key) {
            Some(category) => category.clone(),
            None => raw.trim().to_string(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BankLabelRule;

    fn mapper() -> BankCategoryMapper {
        BankCategoryMapper::from_config(&CategorizerConfig::default())
    }

    #[test]
    fn test_known_labels() {
        let m = mapper();
        assert_eq!(m.map(Some("Restaurants")), "Dining");
        assert_eq!(m.map(Some("  GAS ")), "Transport");
        assert_eq!(m.map(Some("Food & Drink")), "Dining");
        assert_eq!(m.map(Some("Bills_&_Utilities")), "Bills");
    }

    #[test]
    fn test_unknown_sentinels_are_empty() {
        let m = mapper();
        for label in ["", "NaN", "None", "Uncategorized", "unknown", "Other", "MISC", "Miscellaneous", "   "] {
            assert_eq!(m.map(Some(label)), "", "label {:?}", label);
        }
        assert_eq!(m.map(None), "");
    }

    #[test]
    fn test_unmapped_label_passes_through_trimmed() {
        let m = mapper();
        assert_eq!(m.map(Some("  Pet Care ")), "Pet Care");
    }

    #[test]
    fn test_health_remap_is_configurable() {
        assert_eq!(mapper().map(Some("Health")), "Health");

        let config = CategorizerConfig::default().with_bank_label("health", "Groceries");
        let m = BankCategoryMapper::from_config(&config);
        assert_eq!(m.map(Some("Health")), "Groceries");

        let config = CategorizerConfig::default().with_bank_label("Health", "Groceries");
        let m = BankCategoryMapper::from_config(&config);
        assert_eq!(m.map(Some("health")), "Groceries");
    }

    #[test]
    fn test_later_entry_overrides_earlier() {
        // A config file that repeats the defaults and then appends a remap
        let mut config = CategorizerConfig::default();
        config.bank_category_map.push(BankLabelRule {
            label: "HEALTH".to_string(),
            category: "Groceries".to_string(),
        });
        let m = BankCategoryMapper::from_config(&config);
        assert_eq!(m.map(Some("Health")), "Groceries");
        assert_eq!(m.map(Some("Pharmacy")), "Health");
    }
}
