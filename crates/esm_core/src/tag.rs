use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Four-byte record or sub-record identifier, compared as raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    pub const TES3: Tag = Tag(*b"TES3");
    pub const TES4: Tag = Tag(*b"TES4");
    pub const GRUP: Tag = Tag(*b"GRUP");
    /// Prefix announcing a 32-bit length for the sub-record that follows.
    pub const XXXX: Tag = Tag(*b"XXXX");

    pub const fn new(bytes: &[u8; 4]) -> Self {
        Self(*bytes)
    }

    pub const fn from_u32(value: u32) -> Self {
        Self(value.to_le_bytes())
    }

    pub const fn as_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02X}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !s.is_ascii() {
            return Err(format!("tag must be exactly 4 ASCII characters, got {s:?}"));
        }
        Ok(Self([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::Tag;

    #[test]
    fn display_escapes_non_printable_bytes() {
        assert_eq!(Tag(*b"EDID").to_string(), "EDID");
        assert_eq!(Tag([b'A', 0, b'B', 0xFF]).to_string(), "A\\x00B\\xFF");
    }

    #[test]
    fn u32_conversion_is_little_endian() {
        let tag = Tag::from_u32(0x4449_4445);
        assert_eq!(tag, Tag(*b"EDID"));
        assert_eq!(tag.as_u32(), 0x4449_4445);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!("ASP".parse::<Tag>().is_err());
        assert!("ASPCX".parse::<Tag>().is_err());
        assert_eq!("ASPC".parse::<Tag>(), Ok(Tag(*b"ASPC")));
    }
}
