//! Rounding policy applied when a share does not divide evenly.

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// How fractional shares are mapped back to integer currency units.
///
/// The wire/storage codes (`floor`, `ceil`, `round`) are fixed; clients and
/// the database both use them, so the serde names must not change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    /// Truncate toward negative infinity.
    Floor,
    /// Round toward positive infinity.
    Ceil,
    /// Round to the nearest integer, `.5` away from zero.
    #[default]
    #[serde(rename = "round")]
    Nearest,
}

impl Rounding {
    /// Canonical storage code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Rounding::Floor => "floor",
            Rounding::Ceil => "ceil",
            Rounding::Nearest => "round",
        }
    }

    /// Applies the policy to a fractional amount.
    #[must_use]
    pub fn apply(self, value: f64) -> i64 {
        match self {
            Rounding::Floor => value.floor() as i64,
            Rounding::Ceil => value.ceil() as i64,
            Rounding::Nearest => value.round() as i64,
        }
    }
}

impl core::fmt::Display for Rounding {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Rounding {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "floor" => Ok(Rounding::Floor),
            "ceil" => Ok(Rounding::Ceil),
            "round" => Ok(Rounding::Nearest),
            other => Err(EngineError::UnsupportedRounding(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_truncates_toward_negative_infinity() {
        assert_eq!(Rounding::Floor.apply(333.9), 333);
        assert_eq!(Rounding::Floor.apply(-0.5), -1);
    }

    #[test]
    fn ceil_rounds_toward_positive_infinity() {
        assert_eq!(Rounding::Ceil.apply(333.1), 334);
        assert_eq!(Rounding::Ceil.apply(-0.5), 0);
    }

    #[test]
    fn nearest_rounds_half_away_from_zero() {
        assert_eq!(Rounding::Nearest.apply(333.2), 333);
        assert_eq!(Rounding::Nearest.apply(333.5), 334);
    }

    #[test]
    fn codes_round_trip() {
        for mode in [Rounding::Floor, Rounding::Ceil, Rounding::Nearest] {
            assert_eq!(Rounding::try_from(mode.as_str()), Ok(mode));
        }
        assert!(Rounding::try_from("banker").is_err());
    }
}
