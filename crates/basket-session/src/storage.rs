//! # Storage Module
//!
//! The storage collaborator a cart session reads from and writes to.
//!
//! ## Store Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Snapshot Storage                                     │
//! │                                                                         │
//! │  CartSession                                                            │
//! │       │                                                                 │
//! │       │  store.get("main")  → Option<CartSnapshot>   (read on access)   │
//! │       │  store.put("main", Some(&snapshot))          (write on mutate)  │
//! │       ▼                                                                 │
//! │  dyn CartStore                                                          │
//! │  ├── MemoryStore     JSON text in a map (tests, short-lived carts)      │
//! │  └── JsonFileStore   <root>/<instance>.json, replaced atomically        │
//! │                                                                         │
//! │  put(instance, None) is the same as forget(instance).                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Instance names are limited to letters, digits, `-`, `_` and `.` (not
//! leading) so that every backend can use them as keys or file names.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use basket_core::CartSnapshot;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

// =============================================================================
// Collaborator Trait
// =============================================================================

/// Persists one snapshot per cart instance.
pub trait CartStore {
    fn has(&self, instance: &str) -> StoreResult<bool>;

    fn get(&self, instance: &str) -> StoreResult<Option<CartSnapshot>>;

    /// Writes a snapshot; `None` removes it.
    fn put(&mut self, instance: &str, snapshot: Option<&CartSnapshot>) -> StoreResult<()>;

    fn forget(&mut self, instance: &str) -> StoreResult<()>;

    /// Names of every stored instance, sorted.
    fn list_instances(&self) -> StoreResult<Vec<String>>;
}

impl<S: CartStore + ?Sized> CartStore for Box<S> {
    fn has(&self, instance: &str) -> StoreResult<bool> {
        (**self).has(instance)
    }

    fn get(&self, instance: &str) -> StoreResult<Option<CartSnapshot>> {
        (**self).get(instance)
    }

    fn put(&mut self, instance: &str, snapshot: Option<&CartSnapshot>) -> StoreResult<()> {
        (**self).put(instance, snapshot)
    }

    fn forget(&mut self, instance: &str) -> StoreResult<()> {
        (**self).forget(instance)
    }

    fn list_instances(&self) -> StoreResult<Vec<String>> {
        (**self).list_instances()
    }
}

/// Checks that an instance name is usable as a storage key.
pub fn validate_instance_name(instance: &str) -> StoreResult<()> {
    let valid = !instance.is_empty()
        && instance.len() <= 128
        && !instance.starts_with('.')
        && instance
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidInstanceName(instance.to_string()))
    }
}

// =============================================================================
// Memory Store
// =============================================================================

/// Keeps snapshots as JSON text in memory.
///
/// Snapshots go through the same encoding as the file store, so a cart
/// that survives a memory round-trip survives a disk round-trip too.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    snapshots: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CartStore for MemoryStore {
    fn has(&self, instance: &str) -> StoreResult<bool> {
        Ok(self.snapshots.contains_key(instance))
    }

    fn get(&self, instance: &str) -> StoreResult<Option<CartSnapshot>> {
        self.snapshots
            .get(instance)
            .map(|json| serde_json::from_str(json))
            .transpose()
            .map_err(StoreError::from)
    }

    fn put(&mut self, instance: &str, snapshot: Option<&CartSnapshot>) -> StoreResult<()> {
        validate_instance_name(instance)?;
        match snapshot {
            Some(snapshot) => {
                let json = serde_json::to_string(snapshot)?;
                self.snapshots.insert(instance.to_string(), json);
            }
            None => {
                self.snapshots.remove(instance);
            }
        }
        Ok(())
    }

    fn forget(&mut self, instance: &str) -> StoreResult<()> {
        self.snapshots.remove(instance);
        Ok(())
    }

    fn list_instances(&self) -> StoreResult<Vec<String>> {
        Ok(self.snapshots.keys().cloned().collect())
    }
}

// =============================================================================
// JSON File Store
// =============================================================================

/// One pretty-printed JSON file per instance under a root directory.
///
/// ## Example
/// ```rust,no_run
/// use basket_session::storage::{CartStore, JsonFileStore};
///
/// let store = JsonFileStore::new("./carts");
/// for instance in store.list_instances().unwrap() {
///     println!("{}", instance);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    const EXTENSION: &'static str = "json";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        JsonFileStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, instance: &str) -> StoreResult<PathBuf> {
        validate_instance_name(instance)?;
        Ok(self.root.join(format!("{}.{}", instance, Self::EXTENSION)))
    }
}

impl CartStore for JsonFileStore {
    fn has(&self, instance: &str) -> StoreResult<bool> {
        Ok(self.path_for(instance)?.is_file())
    }

    fn get(&self, instance: &str) -> StoreResult<Option<CartSnapshot>> {
        let path = self.path_for(instance)?;
        if !path.is_file() {
            return Ok(None);
        }

        debug!(?path, "Reading cart snapshot");
        let contents = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn put(&mut self, instance: &str, snapshot: Option<&CartSnapshot>) -> StoreResult<()> {
        let Some(snapshot) = snapshot else {
            return self.forget(instance);
        };

        let path = self.path_for(instance)?;
        fs::create_dir_all(&self.root)?;

        // Write to a sibling file first so readers never see half a snapshot
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_string_pretty(snapshot)?)?;
        fs::rename(&staging, &path)?;

        debug!(?path, "Cart snapshot written");
        Ok(())
    }

    fn forget(&mut self, instance: &str) -> StoreResult<()> {
        let path = self.path_for(instance)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list_instances(&self) -> StoreResult<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut instances = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(Self::EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                instances.push(stem.to_string());
            }
        }
        instances.sort();
        Ok(instances)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use basket_core::{Cart, Condition, ItemInput, Priceable, Target, TAX};

    fn sample_snapshot() -> CartSnapshot {
        let mut cart = Cart::new();
        cart.add(ItemInput::new("sku-1", "Mug", 12.5, 2).attribute("colour", "blue", 0.0))
            .unwrap();
        cart.add_condition(Condition::new("VAT", TAX, Target::Subtotal).with_action("10%"));
        cart.to_snapshot()
    }

    fn exercise(store: &mut dyn CartStore) {
        assert!(!store.has("main").unwrap());
        assert!(store.get("main").unwrap().is_none());

        let snapshot = sample_snapshot();
        store.put("main", Some(&snapshot)).unwrap();
        store.put("wishlist", Some(&CartSnapshot::default())).unwrap();

        assert!(store.has("main").unwrap());
        let loaded = store.get("main").unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert!((Cart::from_snapshot(loaded).total() - 27.5).abs() < 1e-9);

        assert_eq!(store.list_instances().unwrap(), vec!["main", "wishlist"]);

        store.put("main", None).unwrap();
        assert!(!store.has("main").unwrap());

        store.forget("wishlist").unwrap();
        store.forget("wishlist").unwrap();
        assert!(store.list_instances().unwrap().is_empty());

        assert!(matches!(
            store.put("../escape", Some(&snapshot)),
            Err(StoreError::InvalidInstanceName(_))
        ));
    }

    #[test]
    fn test_memory_store() {
        exercise(&mut MemoryStore::new());
    }

    #[test]
    fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("carts"));
        assert!(store.list_instances().unwrap().is_empty());
        exercise(&mut store);
    }

    #[test]
    fn test_file_store_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path());
        store.put("main", Some(&sample_snapshot())).unwrap();

        let raw = fs::read_to_string(dir.path().join("main.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(json["items"].is_object());
        assert_eq!(json["cartConditions"][0]["name"], "VAT");
        assert!(!dir.path().join("main.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.json"), "{ not json").unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(matches!(
            store.get("main"),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_boxed_store() {
        let mut store: Box<dyn CartStore> = Box::new(MemoryStore::new());
        store.put("main", Some(&sample_snapshot())).unwrap();
        assert!(store.has("main").unwrap());
    }

    #[test]
    fn test_instance_names() {
        assert!(validate_instance_name("main").is_ok());
        assert!(validate_instance_name("user-42.wishlist").is_ok());
        assert!(validate_instance_name("").is_err());
        assert!(validate_instance_name(".hidden").is_err());
        assert!(validate_instance_name("a/b").is_err());
    }
}
