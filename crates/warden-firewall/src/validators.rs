//! Checksum and structural validators applied after a regex hit.
//!
//! - **Payment cards**: Luhn (ISO/IEC 7812)
//! - **IBAN**: MOD-97 (ISO 7064 / ISO 13616)
//! - **Tax id**: 11 digits, leading digit nonzero
//! - **Phone**: digit-count sanity check
//! - **IPv4**: public unicast only
//!
//! A regex match that fails its validator is dropped, which keeps random
//! digit runs from being reported as PII.

use std::net::Ipv4Addr;

/// Luhn checksum over a card number. Spaces and dashes are ignored.
pub fn luhn_valid(input: &str) -> bool {
    let digits: Option<Vec<u32>> = input
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .map(|c| c.to_digit(10))
        .collect();

    let Some(digits) = digits else {
        return false;
    };
    if !(12..=19).contains(&digits.len()) {
        return false;
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

/// MOD-97 check: move the first four characters to the end, expand letters
/// to two-digit numbers (`A` = 10) and require a remainder of 1.
pub fn iban_valid(input: &str) -> bool {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();

    if !(15..=34).contains(&cleaned.len()) || !cleaned.is_ascii() {
        return false;
    }

    let bytes = cleaned.as_bytes();
    if !bytes[0].is_ascii_alphabetic()
        || !bytes[1].is_ascii_alphabetic()
        || !bytes[2].is_ascii_digit()
        || !bytes[3].is_ascii_digit()
    {
        return false;
    }

    let rearranged = cleaned[4..].chars().chain(cleaned[..4].chars());

    // Running remainder, one digit at a time; never overflows u32.
    let mut remainder: u32 = 0;
    for c in rearranged {
        match c {
            '0'..='9' => {
                remainder = (remainder * 10 + (c as u32 - '0' as u32)) % 97;
            }
            'A'..='Z' => {
                let value = c as u32 - 'A' as u32 + 10;
                remainder = (remainder * 100 + value) % 97;
            }
            _ => return false,
        }
    }
    remainder == 1
}

/// 11 digits with a nonzero leading digit.
pub fn tax_id_valid(input: &str) -> bool {
    input.len() == 11
        && input.bytes().all(|b| b.is_ascii_digit())
        && !input.starts_with('0')
}

/// Between 7 and 15 digits, ignoring separators.
pub fn phone_valid(input: &str) -> bool {
    let digits = input.chars().filter(|c| c.is_ascii_digit()).count();
    (7..=15).contains(&digits)
}

/// A syntactically valid IPv4 address that is not private, loopback,
/// link-local, broadcast or unspecified.
pub fn public_ipv4(input: &str) -> bool {
    match input.parse::<Ipv4Addr>() {
        Ok(ip) => {
            !(ip.is_private()
                || ip.is_loopback()
                || ip.is_link_local()
                || ip.is_broadcast()
                || ip.is_unspecified())
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luhn_known_numbers() {
        assert!(luhn_valid("4111111111111111"));
        assert!(luhn_valid("4111 1111 1111 1111"));
        assert!(luhn_valid("5500-0000-0000-0004"));
        assert!(!luhn_valid("4111111111111112"));
        assert!(!luhn_valid("4111"));
        assert!(!luhn_valid("4111a11111111111"));
    }

    #[test]
    fn test_iban_known_values() {
        assert!(iban_valid("DE89370400440532013000"));
        assert!(iban_valid("DE89 3704 0044 0532 0130 00"));
        assert!(iban_valid("GB29NWBK60161331926819"));
        assert!(!iban_valid("DE00000000000000000000"));
        assert!(!iban_valid("DE89"));
    }

    #[test]
    fn test_iban_single_digit_mutation_fails() {
        let valid = "DE89370400440532013000";
        for (i, c) in valid.char_indices().skip(2) {
            let Some(d) = c.to_digit(10) else { continue };
            let mutated = format!(
                "{}{}{}",
                &valid[..i],
                (d + 1) % 10,
                &valid[i + 1..]
            );
            assert!(!iban_valid(&mutated), "mutation at {} passed", i);
        }
    }

    #[test]
    fn test_tax_id() {
        assert!(tax_id_valid("12345678901"));
        assert!(!tax_id_valid("02345678901"));
        assert!(!tax_id_valid("1234567890"));
    }

    #[test]
    fn test_phone_digit_count() {
        assert!(phone_valid("+49 30 1234567"));
        assert!(!phone_valid("12-34"));
        assert!(!phone_valid("1234567890123456"));
    }

    #[test]
    fn test_public_ipv4() {
        assert!(public_ipv4("8.8.8.8"));
        assert!(public_ipv4("203.0.113.7"));
        assert!(!public_ipv4("10.0.0.1"));
        assert!(!public_ipv4("192.168.1.1"));
        assert!(!public_ipv4("172.16.0.5"));
        assert!(!public_ipv4("127.0.0.1"));
        assert!(!public_ipv4("169.254.0.1"));
        assert!(!public_ipv4("0.0.0.0"));
        assert!(!public_ipv4("999.1.1.1"));
    }
}
