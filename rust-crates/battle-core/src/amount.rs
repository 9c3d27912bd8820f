use crate::error::Rejection;
use std::fmt;

pub const ETHER_DECIMALS: usize = 18;
const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Native-currency amount in its smallest unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Wei(pub u128);

impl Wei {
    pub const ZERO: Wei = Wei(0);

    /// Parses a decimal ether string such as `"0.01"` into wei.
    pub fn parse_ether(raw: &str) -> Result<Wei, Rejection> {
        let invalid = || Rejection::InvalidAmount(raw.to_string());
        let trimmed = raw.trim();
        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
            || fraction.len() > ETHER_DECIMALS
        {
            return Err(invalid());
        }

        let whole_wei = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u128>()
                .ok()
                .and_then(|w| w.checked_mul(WEI_PER_ETHER))
                .ok_or_else(invalid)?
        };
        let fraction_wei = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{fraction:0<width$}", width = ETHER_DECIMALS);
            padded.parse::<u128>().map_err(|_| invalid())?
        };
        whole_wei
            .checked_add(fraction_wei)
            .map(Wei)
            .ok_or_else(invalid)
    }

    pub fn format_ether(&self) -> String {
        let whole = self.0 / WEI_PER_ETHER;
        let fraction = self.0 % WEI_PER_ETHER;
        let digits = format!("{fraction:0>width$}", width = ETHER_DECIMALS);
        let trimmed = digits.trim_end_matches('0');
        if trimmed.is_empty() {
            format!("{whole}.0")
        } else {
            format!("{whole}.{trimmed}")
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_ether())
    }
}
