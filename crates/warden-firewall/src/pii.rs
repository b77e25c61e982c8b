//! # PII Scanner
//!
//! Regex detection with checksum validation, deterministic overlap
//! resolution, per-type actions and masking.
//!
//! ## Pipeline
//!
//! ```text
//! text ─▶ catalogue (in order) ─▶ validators ─▶ dedup ─▶ allow-list ─▶ actions ─▶ mask
//! ```
//!
//! ## Catalogue
//!
//! | Order | Type | Validation | Confidence |
//! |-------|------|------------|------------|
//! | 1 | IBAN | MOD-97 | 0.95 |
//! | 2 | Payment card (4x4 digits) | Luhn | 0.95 |
//! | 3 | Tax id (11 digits) | leading digit nonzero | 0.80 |
//! | 4 | Social insurance number | structural | 0.70 |
//! | 5 | Email | structural | 0.90 |
//! | 6 | Phone | 7-15 digits | 0.70 |
//! | 7 | IPv4 | public unicast only | 0.85 |
//! | 8 | URL with credentials | structural | 0.95 |
//!
//! ## Overlap Resolution
//!
//! Raw hits are stably sorted by start offset ascending, then span length
//! descending, and kept greedily if they do not overlap an already kept hit.
//! Catalogue order therefore breaks exact ties: reordering the catalogue
//! changes precedence.
//!
//! ## Security Notes
//!
//! - Raw matched values never appear in violations or logs
//! - Entities resolving to `block` are still masked in `sanitized`

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use warden_policy::{
    Decision, PiiAction, PiiType, ScanContext, Scanner, ScannerOutput, Violation,
    ViolationCategory,
};

use crate::error::Result;
use crate::mask;
use crate::validators;

/// Name reported in `scanners_run`.
pub const SCANNER_NAME: &str = "pii";

/// Minimum confidence for an entity to be reported; also the violation
/// threshold.
pub const MIN_CONFIDENCE: f64 = 0.5;

/// A detected entity. Offsets are byte offsets into the scanned text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiEntity {
    pub pii_type: PiiType,
    pub value: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
}

impl PiiEntity {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    fn overlaps(&self, other: &PiiEntity) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// PII scanner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PiiConfig {
    /// Action for types without an explicit override.
    pub default_action: PiiAction,
    /// Per-type overrides.
    pub actions: HashMap<PiiType, PiiAction>,
    /// Types that are never reported.
    pub allow_list: HashSet<PiiType>,
}

impl Default for PiiConfig {
    fn default() -> Self {
        Self {
            default_action: PiiAction::Mask,
            actions: HashMap::new(),
            allow_list: HashSet::new(),
        }
    }
}

impl PiiConfig {
    #[must_use]
    pub fn with_default_action(mut self, action: PiiAction) -> Self {
        self.default_action = action;
        self
    }

    #[must_use]
    pub fn with_action(mut self, pii_type: PiiType, action: PiiAction) -> Self {
        self.actions.insert(pii_type, action);
        self
    }

    #[must_use]
    pub fn allow(mut self, pii_type: PiiType) -> Self {
        self.allow_list.insert(pii_type);
        self
    }

    /// Override first, then the default.
    pub fn action_for(&self, pii_type: PiiType) -> PiiAction {
        self.actions
            .get(&pii_type)
            .copied()
            .unwrap_or(self.default_action)
    }
}

struct PiiPattern {
    pii_type: PiiType,
    regex: Regex,
    confidence: f64,
    validate: Option<fn(&str) -> bool>,
}

// Order matters: see "Overlap Resolution" above.
const CATALOGUE: &[(PiiType, &str, f64)] = &[
    (
        PiiType::Iban,
        r"\b[A-Z]{2}\d{2}(?: ?[A-Z0-9]{4}){2,7}(?: ?[A-Z0-9]{1,3})?\b",
        0.95,
    ),
    (
        PiiType::CreditCard,
        r"\b\d{4}[ -]?\d{4}[ -]?\d{4}[ -]?\d{4}\b",
        0.95,
    ),
    (PiiType::TaxId, r"\b[1-9]\d{10}\b", 0.8),
    (PiiType::SocialSecurity, r"\b\d{2} ?\d{6} ?[A-Z] ?\d{3}\b", 0.7),
    (
        PiiType::Email,
        r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        0.9,
    ),
    (
        PiiType::Phone,
        r"(?:\+\d{1,3}[ .-]?)?(?:\(\d{1,5}\)|\b\d{2,5})[ .-]?\d{3,4}[ .-]?\d{3,5}\b",
        0.7,
    ),
    (
        PiiType::IpAddress,
        r"\b(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|1?\d?\d)\b",
        0.85,
    ),
    (
        PiiType::UrlCredentials,
        r"\b[A-Za-z][A-Za-z0-9+.-]*://[^\s:/@]+:[^\s@/]+@[^\s/]+",
        0.95,
    ),
];

fn validator_for(pii_type: PiiType) -> Option<fn(&str) -> bool> {
    match pii_type {
        PiiType::Iban => Some(validators::iban_valid),
        PiiType::CreditCard => Some(validators::luhn_valid),
        PiiType::TaxId => Some(validators::tax_id_valid),
        PiiType::Phone => Some(validators::phone_valid),
        PiiType::IpAddress => Some(validators::public_ipv4),
        PiiType::SocialSecurity | PiiType::Email | PiiType::UrlCredentials => None,
    }
}

/// Regex + checksum PII detector.
pub struct PiiScanner {
    config: PiiConfig,
    patterns: Vec<PiiPattern>,
}

impl PiiScanner {
    /// Build the scanner and compile the catalogue.
    ///
    /// # Errors
    ///
    /// Returns `FirewallError::Pattern` if a catalogue pattern fails to
    /// compile.
    pub fn new(config: PiiConfig) -> Result<Self> {
        let patterns = CATALOGUE
            .iter()
            .map(|(pii_type, source, confidence)| -> Result<PiiPattern> {
                Ok(PiiPattern {
                    pii_type: *pii_type,
                    regex: Regex::new(source)?,
                    confidence: *confidence,
                    validate: validator_for(*pii_type),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { config, patterns })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(PiiConfig::default())
    }

    pub fn config(&self) -> &PiiConfig {
        &self.config
    }

    /// Detect entities in `text`.
    ///
    /// The returned list is sorted by start offset and contains no two
    /// overlapping entities.
    pub fn detect(&self, text: &str) -> Vec<PiiEntity> {
        let mut raw = Vec::new();
        for pattern in &self.patterns {
            for m in pattern.regex.find_iter(text) {
                let value = m.as_str();
                if pattern.validate.is_some_and(|valid| !valid(value)) {
                    continue;
                }
                if pattern.confidence < MIN_CONFIDENCE {
                    continue;
                }
                raw.push(PiiEntity {
                    pii_type: pattern.pii_type,
                    value: value.to_string(),
                    start: m.start(),
                    end: m.end(),
                    confidence: pattern.confidence,
                });
            }
        }
        dedup(raw)
    }
}

/// Stable sort by (start asc, len desc), then greedy non-overlap.
fn dedup(mut raw: Vec<PiiEntity>) -> Vec<PiiEntity> {
    raw.sort_by(|a, b| a.start.cmp(&b.start).then(b.len().cmp(&a.len())));

    let mut kept: Vec<PiiEntity> = Vec::with_capacity(raw.len());
    for entity in raw {
        if kept.iter().all(|k| !k.overlaps(&entity)) {
            kept.push(entity);
        }
    }
    kept
}

impl Scanner for PiiScanner {
    fn name(&self) -> &str {
        SCANNER_NAME
    }

    fn scan(&self, input: &str, _context: &ScanContext) -> warden_policy::Result<ScannerOutput> {
        let started = Instant::now();

        let reported: Vec<(PiiEntity, PiiAction)> = self
            .detect(input)
            .into_iter()
            .filter(|e| !self.config.allow_list.contains(&e.pii_type))
            .map(|e| {
                let action = self.config.action_for(e.pii_type);
                (e, action)
            })
            .filter(|(_, action)| *action != PiiAction::Allow)
            .collect();

        if reported.is_empty() {
            return Ok(ScannerOutput::allow().with_duration(started.elapsed()));
        }

        let decision = if reported.iter().any(|(_, a)| *a == PiiAction::Block) {
            Decision::Block
        } else {
            Decision::Warn
        };

        let violations = reported
            .iter()
            .map(|(e, action)| {
                Violation::new(
                    ViolationCategory::PiiDetected,
                    SCANNER_NAME,
                    e.confidence,
                    MIN_CONFIDENCE,
                    format!("PII detected: {}", e.pii_type),
                )
                .with_detail(format!("{} at {}..{} ({:?})", e.pii_type, e.start, e.end, action))
            })
            .collect();

        // Descending start keeps earlier offsets valid while replacing.
        let mut sanitized = input.to_string();
        for (entity, action) in reported.iter().rev() {
            let replacement = match action {
                PiiAction::Tokenize => mask::tokenize(entity.pii_type, &entity.value),
                _ => mask::mask(entity.pii_type, &entity.value),
            };
            sanitized.replace_range(entity.start..entity.end, &replacement);
        }

        debug!(
            entities = reported.len(),
            decision = %decision,
            "pii detected"
        );

        Ok(ScannerOutput::new(decision, violations)
            .with_sanitized(sanitized)
            .with_duration(started.elapsed()))
    }
}
