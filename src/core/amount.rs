//! Whole-unit amounts as typed and displayed by the client.
//!
//! Amounts carry no fractional part; `.` is only ever a thousands separator.

use crate::core::errors::ChiaTienError;

const THOUSANDS_SEPARATOR: char = '.';

/// Reads an amount out of free-form input, ignoring every non-digit.
///
/// Empty input reads as 0.
pub fn parse_amount(text: &str) -> Result<u64, ChiaTienError> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Ok(0);
    }
    digits.parse::<u64>().map_err(|_| {
        ChiaTienError::invalid_input("amount", "Amount too large", format!("{} does not fit an amount", digits))
    })
}

/// Formats an amount with `.` between thousands groups, e.g. `1.250.000`.
pub fn format_amount(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(THOUSANDS_SEPARATOR);
        }
        out.push(ch);
    }
    out
}

/// Re-renders raw keyboard input in display form.
pub fn normalize_amount_input(text: &str) -> Result<String, ChiaTienError> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Ok(String::new());
    }
    parse_amount(&digits).map(format_amount)
}
