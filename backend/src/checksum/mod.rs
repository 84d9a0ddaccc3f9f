//! Luhn check digits for numeric identifiers (ICCID and friends).
//!
//! The digit string is read right to left: digits at even positions
//! (0, 2, 4, ... counting from the rightmost) are doubled, doubled values
//! above 9 lose 9, and the check digit tops the sum up to a multiple of 10.
//!
//! ```rust
//! use reestr::compute_check_digit;
//!
//! assert_eq!(compute_check_digit("7992739871").unwrap(), 3);
//! ```

use crate::error::{ChecksumError, ChecksumResult};

/// Convert a digit string to its digit values, rejecting anything else.
fn digits_of(digits: &str) -> ChecksumResult<Vec<u32>> {
    if digits.is_empty() {
        return Err(ChecksumError::Empty);
    }

    digits
        .chars()
        .enumerate()
        .map(|(position, c)| {
            c.to_digit(10)
                .ok_or(ChecksumError::NonDigit { position, found: c })
        })
        .collect()
}

/// Weighted Luhn sum. `double_even` selects whether the rightmost digit
/// (reversed index 0) is doubled.
fn luhn_sum(digits: &[u32], double_even: bool) -> u32 {
    digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if (i % 2 == 0) == double_even {
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
        .sum()
}

/// Compute the check digit to append to `digits`.
///
/// `digits` must be non-empty and contain only `0-9`. Callers holding
/// free-form values strip non-digits first (see
/// [`Operation::StripNonDigits`](crate::transform::Operation::StripNonDigits)).
///
/// # Errors
///
/// [`ChecksumError::Empty`] for an empty string,
/// [`ChecksumError::NonDigit`] for the first character outside `0-9`.
pub fn compute_check_digit(digits: &str) -> ChecksumResult<u8> {
    let values = digits_of(digits)?;
    let sum = luhn_sum(&values, true);
    Ok(((10 - sum % 10) % 10) as u8)
}

/// Check a complete number whose last digit is its Luhn check digit.
pub fn is_luhn_valid(number: &str) -> ChecksumResult<bool> {
    let values = digits_of(number)?;
    Ok(luhn_sum(&values, false) % 10 == 0)
}

/// Append the check digit of `digits` to it.
pub fn with_check_digit(digits: &str) -> ChecksumResult<String> {
    let check = compute_check_digit(digits)?;
    let mut out = String::with_capacity(digits.len() + 1);
    out.push_str(digits);
    out.push(char::from(b'0' + check));
    Ok(out)
}
