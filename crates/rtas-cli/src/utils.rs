use core::fmt::Display;
use std::str::FromStr;

use anyhow::Context;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl FromStr for Dimensions {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((a, b)) = s.split_once('x') else {
            return Err(anyhow::anyhow!("Incorrect format, expected `width`x`height`"));
        };
        let width: u32 = a.parse().context("invalid width")?;
        let height: u32 = b.parse().context("invalid height")?;

        Ok(Dimensions { width, height })
    }
}

impl Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}x{}", self.width, self.height))
    }
}

/// Accepts decimal or `0x` prefixed hexadecimal
pub fn parse_seed(s: &str) -> Result<u64, std::num::ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_seed, Dimensions};

    #[test]
    fn dimensions() {
        let dims: Dimensions = "128x64".parse().unwrap();
        assert_eq!(dims, Dimensions { width: 128, height: 64 });
        assert_eq!(dims.to_string(), "128x64");
        assert!("128".parse::<Dimensions>().is_err());
        assert!("12x4x5".parse::<Dimensions>().is_err());
        assert!("ax4".parse::<Dimensions>().is_err());
    }

    #[test]
    fn seed() {
        assert_eq!(parse_seed("0x56FE238A"), Ok(0x56FE238A));
        assert_eq!(parse_seed("42"), Ok(42));
        assert!(parse_seed("0xZZ").is_err());
    }
}
