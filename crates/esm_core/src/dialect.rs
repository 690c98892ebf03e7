use serde::{Deserialize, Serialize};

use crate::tag::Tag;

/// Wire-format generation of a plugin file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Morrowind,
    Skyrim,
}

/// Width of the length field in a sub-record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthWidth {
    U16,
    U32,
}

impl LengthWidth {
    pub fn bytes(self) -> u32 {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    pub fn max_len(self) -> u64 {
        match self {
            Self::U16 => u64::from(u16::MAX),
            Self::U32 => u64::from(u32::MAX),
        }
    }
}

impl Dialect {
    pub fn length_width(self) -> LengthWidth {
        match self {
            Self::Morrowind => LengthWidth::U32,
            Self::Skyrim => LengthWidth::U16,
        }
    }

    /// Record header length including tag and size.
    pub fn header_len(self) -> u32 {
        match self {
            Self::Morrowind => 16,
            Self::Skyrim => 24,
        }
    }

    pub fn file_header_tag(self) -> Tag {
        match self {
            Self::Morrowind => Tag::TES3,
            Self::Skyrim => Tag::TES4,
        }
    }

    pub fn detect(bytes: &[u8]) -> Option<Self> {
        match bytes.get(..4)? {
            b"TES3" => Some(Self::Morrowind),
            b"TES4" => Some(Self::Skyrim),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Morrowind => "morrowind",
            Self::Skyrim => "skyrim",
        }
    }
}
