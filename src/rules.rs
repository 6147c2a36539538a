// 🏷️ Override Rules - Rules as Data
// Two user-edited override layers, re-read from disk on every categorization run:
//   - merchant overrides: normalized merchant substring → category (JSON object)
//   - one-off overrides:  txn_id → category (CSV: txn_id,category)
//
// Unreadable or corrupt files degrade to an empty map. Categorization must
// keep working with zero overrides.

use crate::error::Result;
use crate::normalize::normalize_text;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// ============================================================================
// MERCHANT OVERRIDES
// ============================================================================

/// Ordered merchant → category map
///
/// Keys match by substring containment against the extracted merchant.
/// Iteration follows insertion (file) order and the first containing key wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MerchantOverrides {
    entries: Vec<(String, String)>,
}

impl MerchantOverrides {
    pub fn new() -> Self {
        MerchantOverrides::default()
    }

    /// Parse a JSON object `{ "merchant": "Category", ... }`, keeping key order
    pub fn from_json_str(content: &str) -> Result<Self> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(content)?;

        let mut overrides = MerchantOverrides::new();
        for (key, value) in map {
            match value.as_str() {
                Some(category) => overrides.insert(&key, category),
                None => warn!(merchant = %key, "Ignoring merchant override with non-string category"),
            }
        }
        Ok(overrides)
    }

    pub fn to_json_string(&self) -> Result<String> {
        let map: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        Ok(serde_json::to_string_pretty(&map)?)
    }

    /// Add or replace a rule. Replacing keeps the rule in place.
    /// Empty keys are ignored since they would match every merchant.
    pub fn insert(&mut self, merchant: &str, category: &str) {
        let key = normalize_text(merchant);
        if key.is_empty() {
            return;
        }
        let category = category.trim().to_string();

        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = category,
            None => self.entries.push((key, category)),
        }
    }

    pub fn remove(&mut self, merchant: &str) -> bool {
        let key = normalize_text(merchant);
        let before = self.entries.len();
        self.entries.retain(|(k, _)| *k != key);
        self.entries.len() != before
    }

    /// First rule whose key is contained in the merchant
    pub fn find(&self, merchant: &str) -> Option<&str> {
        if merchant.is_empty() {
            return None;
        }

        let mut hits = self.entries.iter().filter(|(k, _)| merchant.contains(k.as_str()));
        let first = hits.next()?;

        let extra = hits.count();
        if extra > 0 {
            debug!(
                merchant,
                chosen = %first.0,
                other_matches = extra,
                "Ambiguous merchant override; first key in file order wins"
            );
        }

        Some(first.1.as_str())
    }

    /// Every key that matches the merchant, in precedence order
    pub fn matching_keys(&self, merchant: &str) -> Vec<&str> {
        if merchant.is_empty() {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|(k, _)| merchant.contains(k.as_str()))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// ONE-OFF OVERRIDES
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct OneOffRow {
    txn_id: String,
    category: String,
}

/// txn_id → category for exactly one transaction each
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OneOffOverrides {
    map: HashMap<String, String>,
}

impl OneOffOverrides {
    pub fn new() -> Self {
        OneOffOverrides::default()
    }

    /// Parse CSV with header `txn_id,category`
    pub fn from_csv_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut overrides = OneOffOverrides::new();

        for result in rdr.deserialize() {
            let row: OneOffRow = result?;
            overrides.insert(&row.txn_id, &row.category);
        }
        Ok(overrides)
    }

    /// Written sorted by txn_id so the file diffs cleanly
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let mut rows: Vec<_> = self.map.iter().collect();
        rows.sort();

        // An empty map still gets a header row
        if rows.is_empty() {
            wtr.write_record(["txn_id", "category"])?;
        }
        for (txn_id, category) in rows {
            wtr.serialize(OneOffRow {
                txn_id: txn_id.clone(),
                category: category.clone(),
            })?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn insert(&mut self, txn_id: &str, category: &str) {
        let txn_id = txn_id.trim();
        if txn_id.is_empty() {
            return;
        }
        self.map.insert(txn_id.to_string(), category.trim().to_string());
    }

    pub fn remove(&mut self, txn_id: &str) -> bool {
        self.map.remove(txn_id.trim()).is_some()
    }

    pub fn get(&self, txn_id: &str) -> Option<&str> {
        self.map.get(txn_id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ============================================================================
// RULE SNAPSHOT
// ============================================================================

/// Immutable view of both override layers for the duration of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSnapshot {
    pub merchant: MerchantOverrides,
    pub one_off: OneOffOverrides,
}

impl RuleSnapshot {
    pub fn new(merchant: MerchantOverrides, one_off: OneOffOverrides) -> Self {
        RuleSnapshot { merchant, one_off }
    }

    pub fn empty() -> Self {
        RuleSnapshot::default()
    }
}

// ============================================================================
// RULE STORE
// ============================================================================

/// File-backed override store. Holds paths only, never cached contents.
#[derive(Debug, Clone)]
pub struct RuleStore {
    merchant_path: PathBuf,
    one_off_path: PathBuf,
}

impl RuleStore {
    pub fn new(merchant_path: impl Into<PathBuf>, one_off_path: impl Into<PathBuf>) -> Self {
        RuleStore {
            merchant_path: merchant_path.into(),
            one_off_path: one_off_path.into(),
        }
    }

    pub fn merchant_path(&self) -> &Path {
        &self.merchant_path
    }

    pub fn one_off_path(&self) -> &Path {
        &self.one_off_path
    }

    /// Read both layers fresh from disk
    pub fn snapshot(&self) -> RuleSnapshot {
        RuleSnapshot::new(self.load_merchant_overrides(), self.load_one_off_overrides())
    }

    /// Missing or corrupt file → empty map
    pub fn load_merchant_overrides(&self) -> MerchantOverrides {
        match self.try_load_merchant_overrides() {
            Ok(overrides) => {
                debug!(path = ?self.merchant_path, rules = overrides.len(), "Loaded merchant overrides");
                overrides
            }
            Err(e) => {
                warn!(path = ?self.merchant_path, error = %e, "Corrupt merchant override file; using no overrides");
                MerchantOverrides::new()
            }
        }
    }

    /// Missing file → empty map; unreadable or corrupt file → Err
    pub fn try_load_merchant_overrides(&self) -> Result<MerchantOverrides> {
        match fs::read_to_string(&self.merchant_path) {
            Ok(content) => MerchantOverrides::from_json_str(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(MerchantOverrides::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Missing or corrupt file → empty map
    pub fn load_one_off_overrides(&self) -> OneOffOverrides {
        match self.try_load_one_off_overrides() {
            Ok(overrides) => {
                debug!(path = ?self.one_off_path, rules = overrides.len(), "Loaded one-off overrides");
                overrides
            }
            Err(e) => {
                warn!(path = ?self.one_off_path, error = %e, "Corrupt one-off override file; using no overrides");
                OneOffOverrides::new()
            }
        }
    }

    /// Missing file → empty map; unreadable or corrupt file → Err
    pub fn try_load_one_off_overrides(&self) -> Result<OneOffOverrides> {
        match fs::File::open(&self.one_off_path) {
            Ok(file) => OneOffOverrides::from_csv_reader(file),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(OneOffOverrides::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save_merchant_overrides(&self, overrides: &MerchantOverrides) -> Result<()> {
        ensure_parent(&self.merchant_path)?;
        fs::write(&self.merchant_path, overrides.to_json_string()?)?;
        Ok(())
    }

    pub fn save_one_off_overrides(&self, overrides: &OneOffOverrides) -> Result<()> {
        ensure_parent(&self.one_off_path)?;
        let file = fs::File::create(&self.one_off_path)?;
        overrides.write_csv(file)
    }

    // Edits below read strictly: a corrupt file is reported, never overwritten.

    /// "Apply to all": every transaction whose merchant contains this key
    pub fn set_merchant_override(&self, merchant: &str, category: &str) -> Result<()> {
        let mut overrides = self.try_load_merchant_overrides()?;
        overrides.insert(merchant, category);
        self.save_merchant_overrides(&overrides)
    }

    pub fn remove_merchant_override(&self, merchant: &str) -> Result<bool> {
        let mut overrides = self.try_load_merchant_overrides()?;
        let removed = overrides.remove(merchant);
        if removed {
            self.save_merchant_overrides(&overrides)?;
        }
        Ok(removed)
    }

    /// "One-time fix": exactly one transaction
    pub fn set_one_off_override(&self, txn_id: &str, category: &str) -> Result<()> {
        let mut overrides = self.try_load_one_off_overrides()?;
        overrides.insert(txn_id, category);
        self.save_one_off_overrides(&overrides)
    }

    pub fn remove_one_off_override(&self, txn_id: &str) -> Result<bool> {
        let mut overrides = self.try_load_one_off_overrides()?;
        let removed = overrides.remove(txn_id);
        if removed {
            self.save_one_off_overrides(&overrides)?;
        }
        Ok(removed)
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(dir: &tempfile::TempDir) -> RuleStore {
        RuleStore::new(
            dir.path().join("config/overrides.json"),
            dir.path().join("config/one_off_overrides.csv"),
        )
    }

    #[test]
    fn test_merchant_substring_match() {
        let mut overrides = MerchantOverrides::new();
        overrides.insert("Trader Joe", "Groceries");

        assert_eq!(overrides.find("trader joe s"), Some("Groceries"));
        assert_eq!(overrides.find("trader"), None);
        assert_eq!(overrides.find(""), None);
    }

    #[test]
    fn test_merchant_first_match_in_insertion_order() {
        let overrides = MerchantOverrides::from_json_str(
            r#"{"uber": "Transport", "uber eats": "Dining", "eats": "Dining"}"#,
        )
        .unwrap();

        // Two keys match: the earlier one wins, and the ambiguity is visible
        assert_eq!(overrides.find("uber eats 8812"), Some("Transport"));
        assert_eq!(overrides.matching_keys("uber eats 8812"), vec!["uber", "uber eats", "eats"]);
        assert_eq!(overrides.matching_keys("lyft"), Vec::<&str>::new());
    }

    #[test]
    fn test_merchant_keys_normalized() {
        let overrides =
            MerchantOverrides::from_json_str(r#"{"  WHOLE-FOODS ": " Groceries "}"#).unwrap();
        assert_eq!(overrides.iter().collect::<Vec<_>>(), vec![("whole foods", "Groceries")]);
    }

    #[test]
    fn test_merchant_empty_key_ignored() {
        let mut overrides = MerchantOverrides::new();
        overrides.insert("  ", "Shopping");
        overrides.insert("#", "Shopping");
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_merchant_replace_keeps_position() {
        let mut overrides = MerchantOverrides::new();
        overrides.insert("a", "One");
        overrides.insert("b", "Two");
        overrides.insert("a", "Three");
        assert_eq!(overrides.iter().collect::<Vec<_>>(), vec![("a", "Three"), ("b", "Two")]);
    }

    #[test]
    fn test_non_string_values_skipped() {
        let overrides =
            MerchantOverrides::from_json_str(r#"{"netflix": 3, "hulu": "Entertainment"}"#).unwrap();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides.find("hulu"), Some("Entertainment"));
    }

    #[test]
    fn test_one_off_csv_parse() {
        let csv = "txn_id,category\nabc123,Travel\ndef456,Gifts\n";
        let overrides = OneOffOverrides::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(overrides.get("abc123"), Some("Travel"));
        assert_eq!(overrides.get("def456"), Some("Gifts"));
        assert_eq!(overrides.get("zzz"), None);
    }

    #[test]
    fn test_missing_files_degrade_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        let snapshot = store.snapshot();
        assert!(snapshot.merchant.is_empty());
        assert!(snapshot.one_off.is_empty());
        // Reading never creates files
        assert!(!store.merchant_path().exists());
    }

    #[test]
    fn test_corrupt_files_degrade_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        fs::create_dir_all(dir.path().join("config")).unwrap();
        fs::write(store.merchant_path(), "{not json").unwrap();
        fs::write(store.one_off_path(), "txn_id,category\nabc\n").unwrap();

        let snapshot = store.snapshot();
        assert!(snapshot.merchant.is_empty());
        assert!(snapshot.one_off.is_empty());

        fs::write(store.merchant_path(), "[1, 2, 3]").unwrap();
        assert!(store.load_merchant_overrides().is_empty());
    }

    #[test]
    fn test_edits_refuse_to_overwrite_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        fs::create_dir_all(dir.path().join("config")).unwrap();

        // Trailing comma from a hand edit
        let merchant_json = r#"{"netflix": "Entertainment", "hulu": "Entertainment",}"#;
        fs::write(store.merchant_path(), merchant_json).unwrap();
        assert!(store.set_merchant_override("starbucks", "Coffee").is_err());
        assert!(store.remove_merchant_override("netflix").is_err());
        assert_eq!(fs::read_to_string(store.merchant_path()).unwrap(), merchant_json);

        let one_off_csv = "txn_id,category\nabc\n";
        fs::write(store.one_off_path(), one_off_csv).unwrap();
        assert!(store.set_one_off_override("def", "Travel").is_err());
        assert!(store.remove_one_off_override("abc").is_err());
        assert_eq!(fs::read_to_string(store.one_off_path()).unwrap(), one_off_csv);

        // Reads for categorization still degrade
        assert!(store.snapshot().merchant.is_empty());
    }

    #[test]
    fn test_edits_create_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        assert!(store.try_load_merchant_overrides().unwrap().is_empty());
        assert!(!store.remove_one_off_override("abc").unwrap());

        store.set_merchant_override("netflix", "Entertainment").unwrap();
        store.set_merchant_override("hulu", "Entertainment").unwrap();
        let loaded = store.try_load_merchant_overrides().unwrap();
        assert_eq!(
            loaded.iter().collect::<Vec<_>>(),
            vec![("netflix", "Entertainment"), ("hulu", "Entertainment")]
        );
    }

    #[test]
    fn test_one_off_wrong_header_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        fs::create_dir_all(dir.path().join("config")).unwrap();
        fs::write(store.one_off_path(), "id,cat\nabc,Travel\n").unwrap();
        assert!(store.load_one_off_overrides().is_empty());
    }

    #[test]
    fn test_store_round_trip_and_fresh_reads() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);

        let before = store.snapshot();
        assert!(before.merchant.is_empty());

        store.set_merchant_override("Starbucks", "Coffee").unwrap();
        store.set_one_off_override("abc123", "Travel").unwrap();

        // A rule added between runs shows up in the next snapshot
        let after = store.snapshot();
        assert_eq!(after.merchant.find("starbucks store"), Some("Coffee"));
        assert_eq!(after.one_off.get("abc123"), Some("Travel"));
        assert!(before.merchant.is_empty());

        assert!(store.remove_merchant_override("starbucks").unwrap());
        assert!(!store.remove_merchant_override("starbucks").unwrap());
        assert!(store.remove_one_off_override("abc123").unwrap());

        let cleared = store.snapshot();
        assert!(cleared.merchant.is_empty());
        assert!(cleared.one_off.is_empty());
    }
}
