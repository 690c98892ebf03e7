use serde::Serialize;

use crate::error::{EsmError, Result};
use crate::tag::Tag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "tag")]
pub enum SectionId {
    FileHeader(Tag),
    Record(Tag),
    /// Top-level group, by label.
    Group(Tag),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectionLayout {
    pub id: SectionId,
    pub range: ByteRange,
}

/// Byte ranges of the top-level entries of a plugin file.
#[derive(Debug, Clone, Serialize)]
pub struct FileLayout {
    pub file_len: usize,
    pub sections: Vec<SectionLayout>,
}

impl FileLayout {
    pub fn validate(&self) -> Result<()> {
        let Some(first) = self.sections.first() else {
            return Err(EsmError::InvalidValue(
                "file layout must contain at least one section".to_string(),
            ));
        };

        if first.range.start != 0 {
            return Err(EsmError::InvalidValue(
                "layout does not start at byte 0".to_string(),
            ));
        }

        let mut expected = 0usize;
        for section in &self.sections {
            if section.range.start != expected {
                return Err(EsmError::InvalidValue(format!(
                    "layout gap/overlap around section {:?}: expected start {}, got {}",
                    section.id, expected, section.range.start
                )));
            }
            if section.range.end < section.range.start {
                return Err(EsmError::InvalidValue(format!(
                    "invalid section range {:?}: {}..{}",
                    section.id, section.range.start, section.range.end
                )));
            }
            expected = section.range.end;
        }

        if expected != self.file_len {
            return Err(EsmError::InvalidValue(format!(
                "layout ends at {}, file length is {}",
                expected, self.file_len
            )));
        }
        Ok(())
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }
}
