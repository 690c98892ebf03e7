use serde::{Deserialize, Serialize};

use crate::plugin::{GroupFilter, GroupHeader};
use crate::tag::Tag;

pub const DEFAULT_MAX_RECORD_SIZE: u32 = 256 * 1024;
pub const DEFAULT_MAX_DECOMPRESSED_SIZE: u32 = 16 * 1024 * 1024;

/// Limits and overrides applied while reading a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadOptions {
    /// Largest record payload accepted before allocation.
    pub max_record_size: u32,
    pub max_decompressed_size: u32,
    /// Overrides the localized flag of the file header.
    pub localized: Option<bool>,
    /// Labels of top-level groups kept as raw bytes.
    pub skip_groups: Vec<Tag>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
            max_decompressed_size: DEFAULT_MAX_DECOMPRESSED_SIZE,
            localized: None,
            skip_groups: Vec::new(),
        }
    }
}

impl GroupFilter for ReadOptions {
    fn descend(&self, header: &GroupHeader) -> bool {
        !(header.is_top_level() && self.skip_groups.contains(&header.label))
    }
}
