//! Amounts of money as stored on plans and transactions.
//!
//! Amounts are kept in the smallest currency unit (cents) alongside an
//! ISO 4217 code, matching the `period_amount`/`unit` columns.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Currency used when a provider has not priced anything yet.
pub const DEFAULT_UNIT: CurrencyCode = CurrencyCode::Usd;

/// ISO 4217 currency codes accepted for plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyCode {
    #[default]
    Usd,
    Eur,
    Gbp,
    Cad,
    Aud,
}

impl CurrencyCode {
    /// Lowercase code as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Usd => "usd",
            Self::Eur => "eur",
            Self::Gbp => "gbp",
            Self::Cad => "cad",
            Self::Aud => "aud",
        }
    }

    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Usd | Self::Cad | Self::Aud => "$",
            Self::Eur => "€",
            Self::Gbp => "£",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "usd" => Ok(Self::Usd),
            "eur" => Ok(Self::Eur),
            "gbp" => Ok(Self::Gbp),
            "cad" => Ok(Self::Cad),
            "aud" => Ok(Self::Aud),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

/// A price in the smallest unit of its currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in cents.
    pub cents: i64,
    /// Currency of the amount.
    pub unit: CurrencyCode,
}

impl Price {
    /// Create a new price from an amount in cents.
    #[must_use]
    pub const fn from_cents(cents: i64, unit: CurrencyCode) -> Self {
        Self { cents, unit }
    }

    /// Amount in the currency's standard unit (e.g. dollars).
    #[must_use]
    pub fn amount(&self) -> Decimal {
        Decimal::new(self.cents, 2)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:.2}", self.unit.symbol(), self.amount())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_price_display() {
        assert_eq!(Price::from_cents(12000, CurrencyCode::Usd).to_string(), "$120.00");
        assert_eq!(Price::from_cents(995, CurrencyCode::Eur).to_string(), "€9.95");
    }

    #[test]
    fn test_currency_parse_is_case_insensitive() {
        assert_eq!("USD".parse::<CurrencyCode>().unwrap(), CurrencyCode::Usd);
        assert_eq!("gbp".parse::<CurrencyCode>().unwrap(), CurrencyCode::Gbp);
        assert!("xyz".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn test_currency_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&CurrencyCode::Cad).unwrap(), "\"cad\"");
    }
}
