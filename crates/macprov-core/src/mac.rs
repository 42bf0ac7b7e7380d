// ── Address codec ──
//
// Parsing, normalization and validation of MAC address text, vendor prefix
// derivation, and consecutive-address generation. A `MacAddress` is the
// 48-bit integer itself, so sequence arithmetic is exact integer math with an
// explicit upper bound and never wraps.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Largest representable address, `FF:FF:FF:FF:FF:FF`.
pub const MAX_ADDRESS: u64 = 0xFFFF_FFFF_FFFF;

/// Hex digits in a complete address.
pub const HEX_DIGITS: usize = 12;

/// Length of `XX:XX:XX:XX:XX:XX`.
pub const CANONICAL_LEN: usize = 17;

/// Sequence length used by the multi-address workflow.
pub const DEFAULT_SEQUENCE_LEN: usize = 4;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MacParseError {
    #[error("incomplete MAC address: {digits} of 12 hex digits")]
    Incomplete { digits: usize },

    #[error("malformed MAC address: {input}")]
    Malformed { input: String },

    #[error("invalid vendor prefix {input:?}: expected 6 hex digits")]
    InvalidPrefix { input: String },
}

/// Raised when a sequence member would pass `FF:FF:FF:FF:FF:FF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("address sequence overflows at {base} + {offset}: beyond FF:FF:FF:FF:FF:FF")]
pub struct OverflowError {
    pub base: MacAddress,
    /// First offset that did not fit.
    pub offset: u64,
}

// ── Text operations ─────────────────────────────────────────────────

/// Keep only hex digits, uppercase them, and re-insert a colon every two.
///
/// Works on partial input: normalizing any prefix of what the user is typing
/// yields a prefix of the final canonical form.
pub fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(CANONICAL_LEN);
    for (i, c) in input.chars().filter(char::is_ascii_hexdigit).enumerate() {
        if i > 0 && i % 2 == 0 {
            out.push(':');
        }
        out.push(c.to_ascii_uppercase());
    }
    out
}

/// True iff `text` without separators is exactly 12 hex digits.
pub fn is_complete(text: &str) -> bool {
    let stripped = strip_separators(text);
    stripped.len() == HEX_DIGITS && stripped.chars().all(|c| c.is_ascii_hexdigit())
}

/// True iff `text` is exactly `XX:XX:XX:XX:XX:XX` with uppercase hex pairs.
pub fn validate_format(text: &str) -> bool {
    text.len() == CANONICAL_LEN
        && text.bytes().enumerate().all(|(i, b)| {
            if i % 3 == 2 {
                b == b':'
            } else {
                b.is_ascii_digit() || (b'A'..=b'F').contains(&b)
            }
        })
}

/// First six hex digits of `mac`, separators removed and uppercased.
/// Shorter input yields a shorter prefix; nothing is validated.
pub fn extract_vendor_prefix(mac: &str) -> String {
    mac.chars()
        .filter(char::is_ascii_hexdigit)
        .take(6)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// `count` consecutive addresses starting at `base`.
///
/// Fails as a whole, with the first offending offset, if any member would
/// exceed the 48-bit space. No partial sequence is ever returned.
pub fn generate_sequence(base: MacAddress, count: usize) -> Result<Vec<MacAddress>, OverflowError> {
    (0..count)
        .map(|i| {
            let offset = u64::try_from(i).unwrap_or(u64::MAX);
            base.checked_add(offset)
                .ok_or(OverflowError { base, offset })
        })
        .collect()
}

fn strip_separators(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, ':' | '-' | '.') && !c.is_whitespace())
        .collect()
}

// ── MacAddress ──────────────────────────────────────────────────────

/// A complete 48-bit MAC address. Displays as `AA:BB:CC:DD:EE:FF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddress(u64);

impl MacAddress {
    pub const MAX: Self = Self(MAX_ADDRESS);

    /// `None` if `value` does not fit in 48 bits.
    pub fn from_value(value: u64) -> Option<Self> {
        (value <= MAX_ADDRESS).then_some(Self(value))
    }

    /// Big-endian integer value.
    pub fn value(self) -> u64 {
        self.0
    }

    pub fn octets(self) -> [u8; 6] {
        let [_, _, octets @ ..] = self.0.to_be_bytes();
        octets
    }

    pub fn vendor_prefix(self) -> VendorPrefix {
        let [a, b, c, ..] = self.octets();
        VendorPrefix([a, b, c])
    }

    pub fn checked_add(self, offset: u64) -> Option<Self> {
        self.0.checked_add(offset).and_then(Self::from_value)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.octets();
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for MacAddress {
    type Err = MacParseError;

    /// normalize -> completeness -> strict format.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        let digits: String = normalized.chars().filter(char::is_ascii_hexdigit).collect();
        if digits.len() < HEX_DIGITS {
            return Err(MacParseError::Incomplete {
                digits: digits.len(),
            });
        }
        let malformed = || MacParseError::Malformed { input: s.to_owned() };
        if !is_complete(&normalized) || !validate_format(&normalized) {
            return Err(malformed());
        }
        u64::from_str_radix(&digits, 16)
            .map(Self)
            .map_err(|_| malformed())
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── VendorPrefix ────────────────────────────────────────────────────

/// Organizationally unique identifier: the first three octets of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VendorPrefix([u8; 3]);

impl fmt::Display for VendorPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{a:02X}{b:02X}{c:02X}")
    }
}

impl FromStr for VendorPrefix {
    type Err = MacParseError;

    /// Accepts `A1B2C3`, `a1:b2:c3`, `A1-B2-C3`. Anything else is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = strip_separators(s);
        let invalid = || MacParseError::InvalidPrefix { input: s.to_owned() };
        if stripped.len() != 6 || !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let value = u32::from_str_radix(&stripped, 16).map_err(|_| invalid())?;
        let [_, a, b, c] = value.to_be_bytes();
        Ok(Self([a, b, c]))
    }
}

impl Serialize for VendorPrefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VendorPrefix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mac(s: &str) -> MacAddress {
        s.parse().unwrap()
    }

    #[test]
    fn normalize_accepts_common_styles() {
        for input in [
            "a1b2c3d4e5f6",
            "A1-B2-C3-D4-E5-F6",
            "a1b2.c3d4.e5f6",
            "a1 b2 c3 d4 e5 f6",
            "A1:b2:C3:d4:E5:f6",
        ] {
            assert_eq!(normalize(input), "A1:B2:C3:D4:E5:F6", "{input}");
        }
    }

    #[test]
    fn normalize_partial_input_is_a_stable_prefix() {
        let full = normalize("a1b2c3d4e5f6");
        let mut typed = String::new();
        for c in "a1b2c3d4e5f6".chars() {
            typed.push(c);
            let partial = normalize(&typed);
            assert!(full.starts_with(&partial), "{partial} vs {full}");
            // Re-normalizing what is on screen plus the next keystroke is stable.
            assert_eq!(normalize(&partial), partial);
        }
        assert_eq!(normalize("A1:B"), "A1:B");
        assert_eq!(normalize("A1:"), "A1");
    }

    #[test]
    fn normalize_keeps_excess_digits() {
        assert_eq!(normalize("A1B2C3D4E5F6AB"), "A1:B2:C3:D4:E5:F6:AB");
        assert!(!is_complete(&normalize("A1B2C3D4E5F6AB")));
    }

    #[test]
    fn completeness_ignores_separators_and_case() {
        assert!(is_complete("a1-b2-c3-d4-e5-f6"));
        assert!(is_complete("A1B2C3D4E5F6"));
        assert!(!is_complete("A1:B2:C3:D4:E5"));
        assert!(!is_complete("G1:B2:C3:D4:E5:F6"));
    }

    #[test]
    fn format_check_is_strict() {
        assert!(validate_format("A1:B2:C3:D4:E5:F6"));
        assert!(!validate_format("a1:b2:c3:d4:e5:f6"));
        assert!(!validate_format("A1-B2-C3-D4-E5-F6"));
        assert!(!validate_format("A1B2C3D4E5F6"));
        assert!(!validate_format("A1:B2:C3:D4:E5:F6:"));
    }

    #[test]
    fn vendor_prefix_extraction() {
        assert_eq!(extract_vendor_prefix("a1:b2:c3:d4:e5:f6"), "A1B2C3");
        assert_eq!(extract_vendor_prefix("A1:B2"), "A1B2");
        assert_eq!(mac("A1:B2:C3:D4:E5:F6").vendor_prefix().to_string(), "A1B2C3");
    }

    #[test]
    fn parse_distinguishes_incomplete_and_malformed() {
        assert_eq!(
            "A1:B2:C3".parse::<MacAddress>(),
            Err(MacParseError::Incomplete { digits: 6 })
        );
        assert_eq!(
            "".parse::<MacAddress>(),
            Err(MacParseError::Incomplete { digits: 0 })
        );
        assert!(matches!(
            "A1:B2:C3:D4:E5:F6:07".parse::<MacAddress>(),
            Err(MacParseError::Malformed { .. })
        ));
    }

    #[test]
    fn display_is_canonical() {
        let m = mac("a1b2c3000000");
        assert_eq!(m.to_string(), "A1:B2:C3:00:00:00");
        assert_eq!(m.value(), 0xA1B2_C300_0000);
        assert_eq!(m.octets(), [0xA1, 0xB2, 0xC3, 0, 0, 0]);
    }

    #[test]
    fn sequence_is_consecutive() {
        let seq = generate_sequence(mac("A1:B2:C3:00:00:FF"), 4).unwrap();
        let text: Vec<String> = seq.iter().map(ToString::to_string).collect();
        assert_eq!(
            text,
            ["A1:B2:C3:00:00:FF", "A1:B2:C3:00:01:00", "A1:B2:C3:00:01:01", "A1:B2:C3:00:01:02"]
        );
    }

    #[test]
    fn sequence_up_to_the_last_address_fits() {
        let seq = generate_sequence(mac("FF:FF:FF:FF:FF:FC"), 4).unwrap();
        assert_eq!(seq.last().copied(), Some(MacAddress::MAX));
    }

    #[test]
    fn sequence_overflow_names_first_bad_offset() {
        let base = mac("FF:FF:FF:FF:FF:FD");
        let err = generate_sequence(base, 4).unwrap_err();
        assert_eq!(err, OverflowError { base, offset: 3 });

        let err = generate_sequence(MacAddress::MAX, 4).unwrap_err();
        assert_eq!(err.offset, 1);
    }

    #[test]
    fn empty_sequence() {
        assert!(generate_sequence(MacAddress::MAX, 0).unwrap().is_empty());
    }

    #[test]
    fn vendor_prefix_parsing() {
        assert_eq!("a1:b2:c3".parse::<VendorPrefix>().unwrap().to_string(), "A1B2C3");
        assert!("A1B2C".parse::<VendorPrefix>().is_err());
        assert!("A1B2CG".parse::<VendorPrefix>().is_err());
        assert!("A1B2C3D4".parse::<VendorPrefix>().is_err());
    }

    #[test]
    fn serde_uses_canonical_text() {
        let json = serde_json::to_string(&mac("a1b2c3000001")).unwrap();
        assert_eq!(json, "\"A1:B2:C3:00:00:01\"");
        let back: MacAddress = serde_json::from_str("\"a1-b2-c3-00-00-01\"").unwrap();
        assert_eq!(back, mac("A1:B2:C3:00:00:01"));
        assert!(serde_json::from_str::<MacAddress>("\"A1:B2\"").is_err());
    }
}
