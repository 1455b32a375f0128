//! Numeric validation codes with a Luhn check digit.
//!
//! The last digit is a checksum over the others, so a mistyped code can be
//! rejected before the store is queried. Uniqueness is the store's concern.

use rand::{Rng, rng};

/// Shortest code that still carries a payload digit.
pub const MIN_LENGTH: usize = 2;

/// Generate a code of `length` digits, the last one being the check digit.
///
/// Lengths below [`MIN_LENGTH`] are raised to it.
pub fn generate(length: usize) -> String {
    let length = length.max(MIN_LENGTH);
    let mut rng = rng();
    let mut digits: Vec<u8> = (0..length - 1).map(|_| rng.random_range(0..10)).collect();
    digits.push(check_digit(&digits));
    digits.iter().map(|d| char::from(b'0' + d)).collect()
}

/// Offline checksum verification. Pure: no store access.
pub fn verify(code: &str) -> bool {
    if code.len() < MIN_LENGTH || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<u8> = code.bytes().map(|b| b - b'0').collect();
    luhn_sum(&digits, false) % 10 == 0
}

/// Check digit that makes `payload` followed by it a valid Luhn sequence.
fn check_digit(payload: &[u8]) -> u8 {
    let sum = luhn_sum(payload, true);
    ((10 - sum % 10) % 10) as u8
}

/// Luhn sum from the rightmost digit. `double_first` doubles the rightmost
/// digit, which is what the payload needs before its check digit exists.
fn luhn_sum(digits: &[u8], double_first: bool) -> u32 {
    digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            let d = u32::from(d);
            if (i % 2 == 0) == double_first {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum()
}
