//! # Persistent Pin Storage
//!
//! Durable home for [`ToolManifestPin`] records, backed by Sled. Pins survive
//! restarts so that drift is detected against the surface an operator
//! actually reviewed, not against whatever the server reports on boot.
//!
//! ## Storage Structure
//!
//! | Tree | Key | Value |
//! |------|-----|-------|
//! | `manifest_pins` | server id | JSON-serialized pin |
//!
//! ## Security Notes
//!
//! - Every pin read back is validated; a pin edited at rest fails with
//!   `RegistryError::MalformedPin`
//! - File permissions should restrict access to the warden process
//!
//! ## References
//!
//! - Sled documentation: <https://sled.rs/>

use std::path::Path;

use tracing::debug;

use crate::manifest::validate_pin;
use crate::models::{RegistryError, Result, ToolManifestPin};

/// Tree name for manifest pins.
const PIN_TREE: &str = "manifest_pins";

/// Sled-backed store of manifest pins keyed by server id.
///
/// # Example
///
/// ```rust
/// use warden_registry::manifest::pin_manifest;
/// use warden_registry::storage::PinStore;
///
/// let store = PinStore::temporary().unwrap();
/// let pin = pin_manifest("files", &["read", "write"]).unwrap();
/// store.store_pin(&pin).unwrap();
///
/// let loaded = store.load_pin("files").unwrap().unwrap();
/// assert_eq!(loaded.tools_hash, pin.tools_hash);
/// ```
#[derive(Clone)]
pub struct PinStore {
    db: sled::Db,
    pins: sled::Tree,
}

impl PinStore {
    /// Opens or creates a pin database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Database` if the path is unusable or the
    /// database is corrupted.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let pins = db.open_tree(PIN_TREE)?;
        Ok(PinStore { db, pins })
    }

    /// In-memory store, lost on drop.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        let pins = db.open_tree(PIN_TREE)?;
        Ok(PinStore { db, pins })
    }

    /// Stores a pin, replacing any previous pin for the same server.
    ///
    /// # Errors
    ///
    /// Rejects malformed pins before writing.
    pub fn store_pin(&self, pin: &ToolManifestPin) -> Result<()> {
        validate_pin(pin)?;
        let bytes = serde_json::to_vec(pin)?;
        self.pins.insert(pin.server_id.as_bytes(), bytes)?;
        debug!(server_id = %pin.server_id, "pin stored");
        Ok(())
    }

    /// Loads and validates the pin for `server_id`.
    pub fn load_pin(&self, server_id: &str) -> Result<Option<ToolManifestPin>> {
        match self.pins.get(server_id.as_bytes())? {
            Some(bytes) => {
                let pin: ToolManifestPin = serde_json::from_slice(&bytes)?;
                validate_pin(&pin)?;
                Ok(Some(pin))
            }
            None => Ok(None),
        }
    }

    /// Loads every stored pin in server-id order.
    pub fn list_pins(&self) -> Result<Vec<ToolManifestPin>> {
        let mut pins = Vec::new();
        for entry in self.pins.iter() {
            let (key, bytes) = entry?;
            let pin: ToolManifestPin = serde_json::from_slice(&bytes)?;
            if pin.server_id.as_bytes() != key.as_ref() {
                return Err(RegistryError::MalformedPin {
                    server_id: String::from_utf8_lossy(&key).into_owned(),
                    reason: "stored under a different server id".to_string(),
                });
            }
            validate_pin(&pin)?;
            pins.push(pin);
        }
        Ok(pins)
    }

    /// Removes a pin. Returns `true` if one existed.
    pub fn remove_pin(&self, server_id: &str) -> Result<bool> {
        Ok(self.pins.remove(server_id.as_bytes())?.is_some())
    }

    pub fn contains(&self, server_id: &str) -> Result<bool> {
        Ok(self.pins.contains_key(server_id.as_bytes())?)
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Flushes pending writes to disk. Returns the number of bytes flushed.
    pub fn flush(&self) -> Result<usize> {
        Ok(self.db.flush()?)
    }
}

impl std::fmt::Debug for PinStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinStore")
            .field("pins", &self.len())
            .finish()
    }
}
