//! Flat JSON key-value files: manual prices and the remembered session.
//!
//! Both stores are re-read on every access. Nothing is cached across a refresh.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::pricing::UNSET_PRICE;
use crate::types::root_symbol;

const MANUAL_PRICES_FILE: &str = "manual_prices.json";
const SESSION_FILE: &str = "session.json";

/// Roots pre-populated at the unset price so they show up in `prices list`.
pub const DEFAULT_ROOTS: &[&str] = &["/MNQ", "/MES", "/MCL", "/RTY", "/M2K", "/ZB", "/MGC"];

/// Manual price table keyed by normalized root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManualPrices {
    prices: BTreeMap<String, f64>,
}

impl ManualPrices {
    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.prices.get(&root_symbol(symbol)).copied()
    }

    /// Insert or overwrite. Returns the normalized key.
    pub fn set(&mut self, symbol: &str, price: f64) -> Result<String, StoreError> {
        if !price.is_finite() || price < 0.0 {
            return Err(StoreError::InvalidPrice(price));
        }
        let root = root_symbol(symbol);
        self.prices.insert(root.clone(), price);
        Ok(root)
    }

    pub fn remove(&mut self, symbol: &str) -> Option<f64> {
        self.prices.remove(&root_symbol(symbol))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.prices.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Re-key entries written by hand or by older versions.
    /// When two keys share a root, the later key in sort order wins.
    fn normalized(self) -> Self {
        let mut prices = BTreeMap::new();
        for (key, price) in self.prices {
            let root = root_symbol(&key);
            if let Some(previous) = prices.insert(root.clone(), price) {
                warn!(
                    "[STORE] {} normalizes to {}, replacing {} with {}",
                    key, root, previous, price
                );
            }
        }
        Self { prices }
    }
}

/// File-backed manual price store.
#[derive(Debug, Clone)]
pub struct ManualPriceStore {
    path: PathBuf,
}

impl ManualPriceStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(MANUAL_PRICES_FILE),
        }
    }

    /// Read the current table. A missing file is an empty table.
    pub fn load(&self) -> Result<ManualPrices, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ManualPrices::default()),
            Err(e) => return Err(e.into()),
        };
        let prices: ManualPrices = serde_json::from_str(&text)?;
        debug!("[STORE] {} manual prices in {}", prices.len(), self.path.display());
        for (root, price) in prices.iter() {
            if !price.is_finite() || price < 0.0 {
                debug!("[STORE] Rejecting {} = {}", root, price);
                return Err(StoreError::InvalidPrice(price));
            }
        }
        Ok(prices.normalized())
    }

    fn save(&self, prices: &ManualPrices) -> Result<(), StoreError> {
        write_json(&self.path, prices)
    }

    pub fn set(&self, symbol: &str, price: f64) -> Result<String, StoreError> {
        let mut prices = self.load()?;
        let root = prices.set(symbol, price)?;
        self.save(&prices)?;
        info!("[STORE] Saved manual price {} = {}", root, price);
        Ok(root)
    }

    /// Returns false when there was nothing to delete.
    pub fn delete(&self, symbol: &str) -> Result<bool, StoreError> {
        let mut prices = self.load()?;
        let removed = prices.remove(symbol).is_some();
        if removed {
            self.save(&prices)?;
            info!("[STORE] Deleted manual price {}", root_symbol(symbol));
        }
        Ok(removed)
    }

    /// Add the default roots at the unset price without touching existing entries.
    pub fn seed_defaults(&self) -> Result<usize, StoreError> {
        let mut prices = self.load()?;
        let mut added = 0;
        for root in DEFAULT_ROOTS {
            if prices.get(root).is_none() {
                prices.set(root, UNSET_PRICE)?;
                added += 1;
            }
        }
        if added > 0 {
            self.save(&prices)?;
            debug!("[STORE] Seeded {} default roots", added);
        }
        Ok(added)
    }
}

/// Credentials kept between runs. The password is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RememberedSession {
    pub login: String,
    pub remember_token: String,
}

/// File-backed remember-token store.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SESSION_FILE),
        }
    }

    pub fn load(&self) -> Result<Option<RememberedSession>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, session: &RememberedSession) -> Result<(), StoreError> {
        write_json(&self.path, session)
    }

    /// Returns false when no session was stored.
    pub fn clear(&self) -> Result<bool, StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_prices_normalize_keys() {
        let mut prices = ManualPrices::default();
        assert_eq!(prices.set("es", 4500.0).unwrap(), "/ES");
        assert_eq!(prices.set("/ESZ5", 4600.0).unwrap(), "/ES");
        assert_eq!(prices.len(), 1);
        assert_eq!(prices.get("/es"), Some(4600.0));
    }

    #[test]
    fn test_manual_prices_reject_bad_values() {
        let mut prices = ManualPrices::default();
        assert!(matches!(
            prices.set("/ES", -1.0),
            Err(StoreError::InvalidPrice(_))
        ));
        assert!(prices.set("/ES", f64::INFINITY).is_err());
        assert!(prices.set("/ES", 0.0).is_ok());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManualPriceStore::new(dir.path());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_set_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManualPriceStore::new(&dir.path().join("nested"));

        store.set("mesz5", 5010.5).unwrap();
        store.set("/ZB", 116.0).unwrap();

        let prices = store.load().unwrap();
        assert_eq!(prices.get("/MES"), Some(5010.5));
        assert_eq!(prices.get("ZBU5"), Some(116.0));

        assert!(store.delete("/mes").unwrap());
        assert!(!store.delete("/MES").unwrap());
        assert_eq!(store.load().unwrap().get("/MES"), None);
    }

    #[test]
    fn test_seed_defaults_keeps_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManualPriceStore::new(dir.path());
        store.set("/MES", 5000.0).unwrap();

        let added = store.seed_defaults().unwrap();
        assert_eq!(added, DEFAULT_ROOTS.len() - 1);

        let prices = store.load().unwrap();
        assert_eq!(prices.get("/MES"), Some(5000.0));
        assert_eq!(prices.get("/MNQ"), Some(UNSET_PRICE));
        assert_eq!(store.seed_defaults().unwrap(), 0);
    }

    #[test]
    fn test_load_rekeys_hand_edited_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManualPriceStore::new(dir.path());
        fs::write(&store.path, r#"{"mes": 5000.0, "/ZBU5": 115.0}"#).unwrap();

        let prices = store.load().unwrap();
        assert_eq!(prices.get("/MES"), Some(5000.0));
        assert_eq!(prices.get("/ZB"), Some(115.0));
    }

    #[test]
    fn test_load_collapses_colliding_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManualPriceStore::new(dir.path());
        fs::write(&store.path, r#"{"/ES": 4500.0, "ESZ5": 4600.0, "/M2K": 2000.0}"#).unwrap();

        let prices = store.load().unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices.get("/ES"), Some(4600.0));
        assert_eq!(prices.get("/M2KZ5"), Some(2000.0));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManualPriceStore::new(dir.path());
        fs::write(&store.path, "not json").unwrap();
        assert!(matches!(store.load(), Err(StoreError::Json(_))));

        fs::write(&store.path, r#"{"/ES": -5}"#).unwrap();
        assert!(matches!(store.load(), Err(StoreError::InvalidPrice(_))));
    }

    #[test]
    fn test_session_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert_eq!(store.load().unwrap(), None);

        let session = RememberedSession {
            login: "trader".into(),
            remember_token: "rt-123".into(),
        };
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), Some(session));

        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
        assert_eq!(store.load().unwrap(), None);
    }
}
