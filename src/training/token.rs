//! Numeric tokens embedded in file and directory names.
//!
//! Learning rates and scores end up in names such as `lr1e-05_epoch5.pth`.
//! Floats are spelled the way Python's `str(float)` spells them, so runs
//! written by earlier tooling keep matching; callers that already hold a
//! spelling (`"3e-4"`) pass it through untouched.

use std::fmt;

/// A learning rate or score as it appears in a name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameToken(String);

impl NameToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of the token, if it has one
    pub fn value(&self) -> Option<f64> {
        self.0.parse().ok()
    }
}

impl From<f64> for NameToken {
    fn from(value: f64) -> Self {
        NameToken(format_float(value))
    }
}

impl From<&str> for NameToken {
    fn from(token: &str) -> Self {
        NameToken(token.to_string())
    }
}

impl From<String> for NameToken {
    fn from(token: String) -> Self {
        NameToken(token)
    }
}

impl fmt::Display for NameToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shortest round-trip spelling with Python's layout: scientific notation
/// below 1e-4 and from 1e16 up (`1e-05`, `1e+16`), otherwise positional with
/// at least one fractional digit (`1.0`, `0.0003`).
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{:e}", value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if value != 0.0 && !(-4..16).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exponent.abs());
    }

    let positional = format!("{}", value);
    if positional.contains('.') {
        positional
    } else {
        format!("{}.0", positional)
    }
}
