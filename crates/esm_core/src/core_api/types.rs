use std::collections::BTreeMap;

use serde::Serialize;

use crate::dialect::Dialect;
use crate::tag::Tag;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub dialect: Dialect,
    pub file_version: f32,
    /// TES4 author, or the TES3 company name.
    pub author: String,
    pub description: Option<String>,
    pub masters: Vec<String>,
    pub is_master: bool,
    pub localized: bool,
    pub record_count: usize,
    pub group_count: usize,
    pub records_by_tag: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    pub tag: Tag,
    pub form_id: Option<u32>,
    pub flags: u32,
    pub editor_id: Option<String>,
    /// Body size in bytes, before compression.
    pub size: u32,
    pub deleted: bool,
    pub compressed: bool,
    /// Kept as raw bytes because no schema is registered for the tag.
    pub generic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundTripReport {
    pub input_len: usize,
    pub output_len: usize,
    pub identical: bool,
    /// Offset of the first differing byte, if any.
    pub first_difference: Option<usize>,
}

impl RoundTripReport {
    pub fn compare(input: &[u8], output: &[u8]) -> Self {
        let first_difference = input
            .iter()
            .zip(output)
            .position(|(a, b)| a != b)
            .or_else(|| (input.len() != output.len()).then_some(input.len().min(output.len())));
        Self {
            input_len: input.len(),
            output_len: output.len(),
            identical: first_difference.is_none(),
            first_difference,
        }
    }
}
