use crate::ConfigError;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A `u32` that (de)serializes either as a `"0xHEX"` string or a plain
/// TOML/JSON integer (§6: "Integer forms of `address` and `value` are also
/// accepted").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HexInt(pub u32);

impl HexInt {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let s = s.trim();
        let (digits, radix) = if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            (rest, 16)
        } else {
            (s, 10)
        };
        u32::from_str_radix(digits, radix)
            .map(HexInt)
            .map_err(|_| ConfigError::BadInteger(s.to_string()))
    }
}

impl From<HexInt> for u32 {
    fn from(h: HexInt) -> u32 {
        h.0
    }
}

impl From<u32> for HexInt {
    fn from(v: u32) -> HexInt {
        HexInt(v)
    }
}

impl Serialize for HexInt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{:08X}", self.0))
    }
}

impl<'de> Deserialize<'de> for HexInt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(HexIntVisitor)
    }
}

struct HexIntVisitor;

impl<'de> Visitor<'de> for HexIntVisitor {
    type Value = HexInt;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a hex string like \"0x1234\" or an integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        HexInt::parse(v).map_err(|e| de::Error::custom(e.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(HexInt(v as u32))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(HexInt(v as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_decimal() {
        assert_eq!(HexInt::parse("0x10").unwrap().0, 16);
        assert_eq!(HexInt::parse("16").unwrap().0, 16);
    }

    #[test]
    fn rejects_garbage() {
        assert!(HexInt::parse("not a number").is_err());
    }
}
