//! Variable keys
//!
//! A key is a symbol character plus an index, printed as `x1`, `l3`, `p42`.
//! Keys order by symbol first and index second.

use crate::core::CoreError;
use std::fmt;
use std::str::FromStr;

/// Identifier of one variable in a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    symbol: char,
    index: u64,
}

impl Key {
    pub const fn new(symbol: char, index: u64) -> Self {
        Key { symbol, index }
    }

    pub fn symbol(&self) -> char {
        self.symbol
    }

    pub fn index(&self) -> u64 {
        self.index
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.symbol, self.index)
    }
}

impl FromStr for Key {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let symbol = chars
            .next()
            .filter(|c| c.is_ascii_alphabetic())
            .ok_or_else(|| CoreError::InvalidKey(s.to_string()))?;
        let index = chars
            .as_str()
            .parse::<u64>()
            .map_err(|_| CoreError::InvalidKey(s.to_string()))?;
        Ok(Key::new(symbol, index))
    }
}

/// Robot pose key `x{i}`.
pub const fn x(index: u64) -> Key {
    Key::new('x', index)
}

/// Landmark key `l{i}`.
pub const fn l(index: u64) -> Key {
    Key::new('l', index)
}

/// Structure point key `p{i}`.
pub const fn p(index: u64) -> Key {
    Key::new('p', index)
}

/// Camera pose key `c{i}`.
pub const fn c(index: u64) -> Key {
    Key::new('c', index)
}

/// Camera calibration key `k{i}`.
pub const fn k(index: u64) -> Key {
    Key::new('k', index)
}

/// Rotation key `r{i}`.
pub const fn r(index: u64) -> Key {
    Key::new('r', index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display_and_parse() -> Result<(), Box<dyn std::error::Error>> {
        assert_eq!(x(1).to_string(), "x1");
        assert_eq!("l42".parse::<Key>()?, l(42));
        assert!("42".parse::<Key>().is_err());
        assert!("x".parse::<Key>().is_err());
        assert!("x-1".parse::<Key>().is_err());
        Ok(())
    }

    #[test]
    fn test_key_ordering() {
        let mut keys = vec![x(2), l(10), x(1), l(2)];
        keys.sort();
        assert_eq!(keys, vec![l(2), l(10), x(1), x(2)]);
    }
}
