//! Currency pair.

use std::fmt;
use std::str::FromStr;

use super::error::CoinratError;

/// Ordered pair of currency codes: `left` is the base currency prices are
/// quoted in, `right` is the traded currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pair {
    left: String,
    right: String,
}

impl Pair {
    pub fn new(left: &str, right: &str) -> Self {
        Pair {
            left: left.to_uppercase(),
            right: right.to_uppercase(),
        }
    }

    pub fn base_currency(&self) -> &str {
        &self.left
    }

    pub fn market_currency(&self) -> &str {
        &self.right
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.left, self.right)
    }
}

impl FromStr for Pair {
    type Err = CoinratError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoinratError::InvalidPair {
            value: s.to_string(),
        };
        let (left, right) = s.trim().split_once('_').ok_or_else(invalid)?;
        if left.is_empty() || right.is_empty() || right.contains('_') {
            return Err(invalid());
        }
        Ok(Pair::new(left, right))
    }
}

pub fn serialize_pair(pair: &Pair) -> String {
    pair.to_string()
}

pub fn deserialize_pair(serialized: &str) -> Result<Pair, CoinratError> {
    serialized.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_with_underscore() {
        assert_eq!(Pair::new("USD", "BTC").to_string(), "USD_BTC");
    }

    #[test]
    fn parse_upper_cases() {
        let pair: Pair = "usd_btc".parse().unwrap();
        assert_eq!(pair.base_currency(), "USD");
        assert_eq!(pair.market_currency(), "BTC");
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in ["USDBTC", "_BTC", "USD_", "USD_BTC_ETH", ""] {
            assert!(
                matches!(bad.parse::<Pair>(), Err(CoinratError::InvalidPair { .. })),
                "{bad} should not parse"
            );
        }
    }

    #[test]
    fn serialize_round_trip() {
        let pair = Pair::new("USD", "LTC");
        assert_eq!(deserialize_pair(&serialize_pair(&pair)).unwrap(), pair);
    }
}
