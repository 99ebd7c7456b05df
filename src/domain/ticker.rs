//! Ticker normalization
//!
//! Announcement texts quote symbols the way the derivatives desk lists them:
//! `1MBABYDOGEUSDT`, `1000PEPEUSDT`, `10000SATSUSDT`. The spot book lists the
//! same coins without the contract-multiplier marker, so every raw token is
//! canonicalized before it is traded.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Leading marker for "one million units" contracts
const MILLION_PREFIX: &str = "1M";

/// Canonicalize a raw ticker token.
///
/// Strips a leading `1M` marker, then drops a leading numeric run when that
/// number is divisible by 10 (`1000PEPE` -> `PEPE`). A run that is not a
/// multiple of ten is part of the real symbol and stays (`1INCH`, `15ABC`).
/// Both rules are applied until neither changes the token, so the result is
/// idempotent. Never returns an empty string for a non-empty input.
pub fn normalize(raw: &str) -> String {
    let mut ticker = raw.trim().to_ascii_uppercase();

    loop {
        let before = ticker.len();

        if let Some(rest) = ticker.strip_prefix(MILLION_PREFIX) {
            if !rest.is_empty() {
                ticker = rest.to_string();
            }
        }

        if let Some(rest) = strip_multiplier_numeral(&ticker) {
            ticker = rest.to_string();
        }

        if ticker.len() == before {
            return ticker;
        }
    }
}

/// Returns the symbol after a leading multiple-of-ten numeral, if there is one.
fn strip_multiplier_numeral(ticker: &str) -> Option<&str> {
    let digits = ticker.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || digits == ticker.len() {
        return None;
    }

    // divisible by 10 <=> last digit is zero; avoids overflow on long runs
    if ticker.as_bytes()[digits - 1] == b'0' {
        Some(&ticker[digits..])
    } else {
        None
    }
}

/// A normalized spot trading pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    base: String,
    quote: String,
}

impl Instrument {
    /// Build from a base asset symbol, e.g. the `PEPE` in `(PEPE)`.
    pub fn new(base: &str, quote: &str) -> Option<Self> {
        Self::from_pair(&format!("{}{}", base, quote), quote)
    }

    /// Build from a pair token such as `1000PEPEUSDT`.
    ///
    /// Returns `None` when the normalized token does not end with the quote
    /// asset or has nothing in front of it.
    pub fn from_pair(token: &str, quote: &str) -> Option<Self> {
        let quote = quote.to_ascii_uppercase();
        let symbol = normalize(token);
        let base = symbol.strip_suffix(quote.as_str())?;
        if base.is_empty() {
            return None;
        }

        Some(Self {
            base: base.to_string(),
            quote,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Exchange symbol, `BASEQUOTE`
    pub fn symbol(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base, self.quote)
    }
}
