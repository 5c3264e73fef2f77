use crate::error::PolicyError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const SIZE_PATTERN: &str = r"(?i)^\s*([0-9]+)(?:\.([0-9]+))?\s*(b|kb|mb|gb|tb|pb)?\s*$";

static SIZE_RE: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new(SIZE_PATTERN));

fn size_regex() -> Result<&'static Regex, PolicyError> {
    SIZE_RE
        .as_ref()
        .map_err(|e| PolicyError::InvalidSize(e.to_string()))
}

/// How unit suffixes such as `mb` are scaled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitBase {
    /// 1 kb = 1024 bytes
    #[default]
    Binary,
    /// 1 kb = 1000 bytes
    Decimal,
}

impl UnitBase {
    fn step(&self) -> u64 {
        match self {
            UnitBase::Binary => 1024,
            UnitBase::Decimal => 1000,
        }
    }

    /// Byte multiplier for a unit suffix
    pub fn multiplier(&self, unit: &str) -> Option<u64> {
        let exponent = match unit.to_ascii_lowercase().as_str() {
            "" | "b" => 0,
            "kb" => 1,
            "mb" => 2,
            "gb" => 3,
            "tb" => 4,
            "pb" => 5,
            _ => return None,
        };
        self.step().checked_pow(exponent)
    }
}

/// Parse a human size like `2mb`, `512 KB` or `1.5mb` into a byte count.
///
/// A bare number is a byte count. Fractions are floored to whole bytes.
/// Zero is rejected: a limit must admit at least one byte.
pub fn parse_byte_size(input: &str, base: UnitBase) -> Result<u64, PolicyError> {
    let caps = size_regex()?
        .captures(input)
        .ok_or_else(|| PolicyError::InvalidSize(input.to_string()))?;

    let whole: u64 = caps[1]
        .parse()
        .map_err(|_| PolicyError::InvalidSize(input.to_string()))?;
    let unit = caps.get(3).map(|m| m.as_str()).unwrap_or("");
    let multiplier = base
        .multiplier(unit)
        .ok_or_else(|| PolicyError::InvalidSize(input.to_string()))?;

    let mut bytes = whole
        .checked_mul(multiplier)
        .ok_or_else(|| PolicyError::InvalidSize(input.to_string()))?;

    if let Some(fraction) = caps.get(2) {
        bytes = bytes
            .checked_add(scale_fraction(fraction.as_str(), multiplier))
            .ok_or_else(|| PolicyError::InvalidSize(input.to_string()))?;
    }

    if bytes == 0 {
        return Err(PolicyError::InvalidSize(input.to_string()));
    }

    Ok(bytes)
}

/// floor(0.<digits> * multiplier) without going through floats
fn scale_fraction(digits: &str, multiplier: u64) -> u64 {
    let mut numerator: u128 = 0;
    let mut denominator: u128 = 1;
    // Digits past the multiplier's precision can't change the floor
    for digit in digits.bytes().take(20) {
        numerator = numerator * 10 + u128::from(digit - b'0');
        denominator *= 10;
    }
    (numerator * u128::from(multiplier) / denominator) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_regex_compiled_once() {
        let first = size_regex().expect("regex failed") as *const Regex;
        for input in ["1kb", "2mb", "3 GB"] {
            parse_byte_size(input, UnitBase::Binary).expect("parse failed");
        }
        let second = size_regex().expect("regex failed") as *const Regex;
        assert_eq!(first, second);
    }

    #[test]
    fn test_binary_megabytes() {
        assert_eq!(parse_byte_size("2mb", UnitBase::Binary).unwrap(), 2 * 1024 * 1024);
    }

    #[test]
    fn test_decimal_megabytes() {
        assert_eq!(parse_byte_size("2mb", UnitBase::Decimal).unwrap(), 2_000_000);
    }

    #[test]
    fn test_units_are_case_insensitive() {
        assert_eq!(parse_byte_size("2MB", UnitBase::Decimal).unwrap(), 2_000_000);
        assert_eq!(parse_byte_size("512 Kb", UnitBase::Binary).unwrap(), 512 * 1024);
    }

    #[test]
    fn test_bare_number_is_bytes() {
        assert_eq!(parse_byte_size("4096", UnitBase::Binary).unwrap(), 4096);
        assert_eq!(parse_byte_size("4096b", UnitBase::Decimal).unwrap(), 4096);
    }

    #[test]
    fn test_fraction_is_floored() {
        assert_eq!(parse_byte_size("1.5mb", UnitBase::Decimal).unwrap(), 1_500_000);
        assert_eq!(parse_byte_size("1.5kb", UnitBase::Binary).unwrap(), 1536);
        assert_eq!(parse_byte_size("1.0001kb", UnitBase::Decimal).unwrap(), 1000);
    }

    #[test]
    fn test_whitespace_is_tolerated() {
        assert_eq!(parse_byte_size("  10 kb ", UnitBase::Decimal).unwrap(), 10_000);
    }

    #[test]
    fn test_zero_rejected() {
        assert!(parse_byte_size("0", UnitBase::Binary).is_err());
        assert!(parse_byte_size("0mb", UnitBase::Binary).is_err());
        assert!(parse_byte_size("0.0001b", UnitBase::Binary).is_err());
    }

    #[test]
    fn test_malformed_sizes_rejected() {
        assert!(parse_byte_size("", UnitBase::Binary).is_err());
        assert!(parse_byte_size("mb", UnitBase::Binary).is_err());
        assert!(parse_byte_size("-1mb", UnitBase::Binary).is_err());
        assert!(parse_byte_size("2 megabytes", UnitBase::Binary).is_err());
        assert!(parse_byte_size("2mb2", UnitBase::Binary).is_err());
    }

    #[test]
    fn test_overflow_rejected() {
        assert!(parse_byte_size("99999999999pb", UnitBase::Binary).is_err());
        assert!(parse_byte_size("99999999999999999999999", UnitBase::Binary).is_err());
    }

    #[test]
    fn test_unit_base_yaml_parse() {
        let base: UnitBase = serde_yaml::from_str("decimal").expect("parse failed");
        assert_eq!(base, UnitBase::Decimal);
        assert_eq!(UnitBase::default(), UnitBase::Binary);
    }
}
