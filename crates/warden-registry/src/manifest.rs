//! # Tool Manifest Pinning
//!
//! An operator pins the list of tool names a server exposes after reviewing
//! it. At scan time any tool that is not part of the pinned surface is
//! reported as drift.
//!
//! ## Hashing
//!
//! Names are sorted and deduplicated, serialized as a JSON array and hashed
//! with SHA-256. Input order and repeats therefore never change the hash:
//!
//! ```text
//! ["write", "read", "read"] ─▶ ["read","write"] ─▶ sha256 ─▶ hex
//! ```
//!
//! ## Security Notes
//!
//! - Verification reports added and removed names by set difference against
//!   the pin, so an operator can see exactly what changed
//! - [`validate_pin`] recomputes the hash, catching pins edited at rest

use std::collections::BTreeSet;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::models::{ManifestDrift, RegistryError, Result, ToolManifestPin};

/// Sorted, deduplicated copy of `names`.
pub fn normalize_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    names
        .iter()
        .map(|n| n.as_ref().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Hex SHA-256 over the JSON array of already normalized names.
fn hash_normalized(names: &[String]) -> Result<String> {
    let bytes = serde_json::to_vec(names)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Hash a tool-name list, independent of order and duplicates.
pub fn hash_tools<S: AsRef<str>>(names: &[S]) -> Result<String> {
    hash_normalized(&normalize_names(names))
}

/// Pin the current tool surface of `server_id`.
///
/// # Errors
///
/// Only fails if serialization fails.
///
/// # Example
///
/// ```rust
/// use warden_registry::manifest::{pin_manifest, verify_manifest};
///
/// let pin = pin_manifest("files", &["read", "write"]).unwrap();
/// let drift = verify_manifest(&pin, &["write", "read", "delete"]).unwrap();
/// assert_eq!(drift.added, vec!["delete".to_string()]);
/// ```
pub fn pin_manifest<S: AsRef<str>>(server_id: &str, names: &[S]) -> Result<ToolManifestPin> {
    let known_tools = normalize_names(names);
    let tools_hash = hash_normalized(&known_tools)?;
    let now = Utc::now();

    info!(
        server_id,
        tool_count = known_tools.len(),
        hash = %&tools_hash[..12],
        "manifest pinned"
    );

    Ok(ToolManifestPin {
        server_id: server_id.to_string(),
        tools_hash,
        tool_count: known_tools.len(),
        known_tools,
        pinned_at: now,
        updated_at: now,
    })
}

/// Replace the pinned surface, keeping the original `pinned_at`.
pub fn repin<S: AsRef<str>>(pin: &ToolManifestPin, names: &[S]) -> Result<ToolManifestPin> {
    let mut updated = pin_manifest(&pin.server_id, names)?;
    updated.pinned_at = pin.pinned_at;
    Ok(updated)
}

/// Compare a candidate name list against a pin.
pub fn verify_manifest<S: AsRef<str>>(pin: &ToolManifestPin, names: &[S]) -> Result<ManifestDrift> {
    let current = normalize_names(names);
    let actual_hash = hash_normalized(&current)?;
    let valid = actual_hash == pin.tools_hash;

    let (added, removed) = if valid {
        (Vec::new(), Vec::new())
    } else {
        let pinned: BTreeSet<&str> = pin.known_tools.iter().map(String::as_str).collect();
        let now: BTreeSet<&str> = current.iter().map(String::as_str).collect();
        (
            now.difference(&pinned).map(|s| s.to_string()).collect(),
            pinned.difference(&now).map(|s| s.to_string()).collect(),
        )
    };

    if !valid {
        warn!(
            server_id = %pin.server_id,
            added = added.len(),
            removed = removed.len(),
            "manifest drift detected"
        );
    }

    Ok(ManifestDrift {
        server_id: pin.server_id.clone(),
        valid,
        expected_hash: pin.tools_hash.clone(),
        actual_hash,
        added,
        removed,
    })
}

/// Check a pin's internal consistency.
///
/// # Errors
///
/// Returns `RegistryError::MalformedPin` when the server id is empty, the
/// tool list is unsorted or has duplicates, the count disagrees with the
/// list, or the hash does not match the list.
pub fn validate_pin(pin: &ToolManifestPin) -> Result<()> {
    let malformed = |reason: &str| RegistryError::MalformedPin {
        server_id: pin.server_id.clone(),
        reason: reason.to_string(),
    };

    if pin.server_id.is_empty() {
        return Err(malformed("empty server id"));
    }
    if pin.known_tools.windows(2).any(|w| w[0] >= w[1]) {
        return Err(malformed("known tools not sorted and unique"));
    }
    if pin.tool_count != pin.known_tools.len() {
        return Err(malformed("tool count does not match tool list"));
    }
    if hash_normalized(&pin.known_tools)? != pin.tools_hash {
        return Err(malformed("hash does not match tool list"));
    }
    Ok(())
}
