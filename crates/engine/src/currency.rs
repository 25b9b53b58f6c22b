//! Currency codes used by groups and their events.

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Supported currency of an event's amounts.
///
/// Amounts stay plain integer units of whichever currency the event uses;
/// the engine never converts between currencies. The reference rates below
/// exist only so callers can scale a total by a rate before allocating
/// (see [`scale_total`]); real conversion is out of scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Jpy,
    Usd,
    Eur,
    Gbp,
    Krw,
    Cny,
}

impl Currency {
    /// Canonical currency code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Jpy => "JPY",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Krw => "KRW",
            Currency::Cny => "CNY",
        }
    }

    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Currency::Jpy | Currency::Cny => "¥",
            Currency::Usd => "$",
            Currency::Eur => "€",
            Currency::Gbp => "£",
            Currency::Krw => "₩",
        }
    }

    /// Reference exchange rate relative to JPY.
    ///
    /// A convenience default; callers supply their own rate to
    /// [`scale_total`] when they have a better one.
    #[must_use]
    pub const fn default_rate(self) -> f64 {
        match self {
            Currency::Jpy => 1.0,
            Currency::Usd => 0.0067,
            Currency::Eur => 0.0062,
            Currency::Gbp => 0.0053,
            Currency::Krw => 8.9,
            Currency::Cny => 0.048,
        }
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Currency {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "JPY" => Ok(Currency::Jpy),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "KRW" => Ok(Currency::Krw),
            "CNY" => Ok(Currency::Cny),
            other => Err(EngineError::UnsupportedCurrency(other.to_string())),
        }
    }
}

/// Scales a total by an externally supplied rate, rounding to the nearest
/// integer unit.
#[must_use]
pub fn scale_total(total: i64, rate: f64) -> i64 {
    (total as f64 * rate).round() as i64
}
