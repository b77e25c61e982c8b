//! Type-specific redactions for detected PII.

use sha2::{Digest, Sha256};

use warden_policy::PiiType;

/// Replace `value` with a partial redaction that keeps enough context for a
/// human to recognise the kind of data without exposing it.
///
/// | Type | Example output |
/// |------|----------------|
/// | Email | `j***@example.com` |
/// | Phone | `+49***67` |
/// | IBAN | `DE89****` |
/// | Card | `****-****-****-1111` |
/// | Other | `[TAX_ID]` |
pub fn mask(pii_type: PiiType, value: &str) -> String {
    match pii_type {
        PiiType::Email => mask_email(value),
        PiiType::Phone => mask_phone(value),
        PiiType::Iban => {
            let head: String = value.chars().take(4).collect();
            format!("{}****", head)
        }
        PiiType::CreditCard => {
            let digits: Vec<char> = value.chars().filter(|c| c.is_ascii_digit()).collect();
            let last4: String = digits[digits.len().saturating_sub(4)..].iter().collect();
            format!("****-****-****-{}", last4)
        }
        other => format!("[{}]", other.tag()),
    }
}

fn mask_email(value: &str) -> String {
    match value.split_once('@') {
        Some((local, domain)) => {
            let first: String = local.chars().take(1).collect();
            format!("{}***@{}", first, domain)
        }
        None => format!("[{}]", PiiType::Email.tag()),
    }
}

fn mask_phone(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 5 {
        return "***".to_string();
    }
    let prefix: String = chars[..3].iter().collect();
    let suffix: String = chars[chars.len() - 2..].iter().collect();
    format!("{}***{}", prefix, suffix)
}

/// Deterministic token `[TYPE:xxxxxxxx]`: the first eight hex characters of
/// the SHA-256 of the raw value.
pub fn tokenize(pii_type: PiiType, value: &str) -> String {
    let digest = hex::encode(Sha256::digest(value.as_bytes()));
    format!("[{}:{}]", pii_type.tag(), &digest[..8])
}
