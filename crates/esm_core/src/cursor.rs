use tracing::trace;

use crate::blob::OpaqueBlob;
use crate::dialect::LengthWidth;
use crate::error::{EsmError, Result};
use crate::strings::decode_latin1;
use crate::tag::Tag;

/// Iterates the sub-records of one record payload.
///
/// The cursor is bounded by the payload slice, so no read can run past the
/// record's declared size. `consumed` counts every byte handed out, framing
/// included, and [`finish`](Self::finish) checks it against the declared size.
#[derive(Debug, Clone)]
pub struct SubRecordCursor<'a> {
    record: Tag,
    data: &'a [u8],
    pos: usize,
    width: LengthWidth,
}

/// One sub-record as delivered by the cursor. Borrowed, never retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubRecord<'a> {
    pub record: Tag,
    pub tag: Tag,
    pub data: &'a [u8],
}

impl<'a> SubRecordCursor<'a> {
    pub fn begin(record: Tag, payload: &'a [u8], width: LengthWidth) -> Self {
        Self {
            record,
            data: payload,
            pos: 0,
            width,
        }
    }

    pub fn record_tag(&self) -> Tag {
        self.record
    }

    pub fn width(&self) -> LengthWidth {
        self.width
    }

    pub fn declared_size(&self) -> u32 {
        u32::try_from(self.data.len()).unwrap_or(u32::MAX)
    }

    pub fn consumed(&self) -> u32 {
        u32::try_from(self.pos).unwrap_or(u32::MAX)
    }

    pub fn has_more(&self) -> bool {
        self.pos < self.data.len()
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                EsmError::eof(format!(
                    "{what} of {} at offset {}: need {n} bytes, {} left",
                    self.record,
                    self.pos,
                    self.data.len() - self.pos
                ))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn next_tag(&mut self) -> Result<Tag> {
        let bytes = self.take(4, "sub-record tag")?;
        Ok(Tag([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn peek_tag(&self) -> Option<Tag> {
        let bytes = self.data.get(self.pos..self.pos + 4)?;
        Some(Tag([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_length(&mut self) -> Result<u32> {
        match self.width {
            LengthWidth::U16 => {
                let b = self.take(2, "sub-record length")?;
                Ok(u32::from(u16::from_le_bytes([b[0], b[1]])))
            }
            LengthWidth::U32 => {
                let b = self.take(4, "sub-record length")?;
                Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            }
        }
    }

    pub fn read_value(&mut self, len: u32) -> Result<&'a [u8]> {
        self.take(len as usize, "sub-record value")
    }

    /// Reads the next tag, length and value, resolving an `XXXX` extended
    /// length prefix into the sub-record it announces.
    pub fn next_sub_record(&mut self) -> Result<SubRecord<'a>> {
        let mut tag = self.next_tag()?;
        let mut len = self.read_length()?;
        if tag == Tag::XXXX && self.width == LengthWidth::U16 {
            if len != 4 {
                return Err(EsmError::InvalidLength {
                    record: self.record,
                    sub: Tag::XXXX,
                    expected: 4,
                    found: len,
                });
            }
            let b = self.take(4, "extended sub-record size")?;
            let extended = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
            tag = self.next_tag()?;
            let short = self.read_length()?;
            if short != 0 {
                return Err(EsmError::InvalidLength {
                    record: self.record,
                    sub: tag,
                    expected: 0,
                    found: short,
                });
            }
            len = extended;
        }
        let data = self.read_value(len)?;
        trace!(record = %self.record, sub = %tag, len, "sub-record");
        Ok(SubRecord {
            record: self.record,
            tag,
            data,
        })
    }

    /// Reads the next sub-record and requires it to carry `tag`.
    pub fn expect(&mut self, tag: Tag) -> Result<SubRecord<'a>> {
        let sub = self.next_sub_record()?;
        if sub.tag != tag {
            return Err(EsmError::UnexpectedTag {
                record: self.record,
                expected: tag,
                found: sub.tag,
            });
        }
        Ok(sub)
    }

    /// Takes everything left in the payload without interpreting it.
    pub fn take_rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }

    pub fn finish(&self) -> Result<()> {
        if self.pos != self.data.len() {
            return Err(EsmError::SizeMismatch {
                record: self.record,
                declared: self.declared_size(),
                consumed: self.consumed(),
            });
        }
        Ok(())
    }
}

impl<'a> SubRecord<'a> {
    pub fn len(&self) -> u32 {
        u32::try_from(self.data.len()).unwrap_or(u32::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn expect_len(&self, expected: u32) -> Result<()> {
        if self.len() != expected {
            return Err(EsmError::InvalidLength {
                record: self.record,
                sub: self.tag,
                expected,
                found: self.len(),
            });
        }
        Ok(())
    }

    pub fn as_array<const N: usize>(&self) -> Result<[u8; N]> {
        self.expect_len(N as u32)?;
        let mut out = [0u8; N];
        out.copy_from_slice(self.data);
        Ok(out)
    }

    pub fn as_u8(&self) -> Result<u8> {
        Ok(self.as_array::<1>()?[0])
    }

    pub fn as_u32(&self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.as_array()?))
    }

    pub fn as_i32(&self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.as_array()?))
    }

    pub fn as_u64(&self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.as_array()?))
    }

    pub fn as_f32(&self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.as_array()?))
    }

    pub fn as_u32_vec(&self) -> Result<Vec<u32>> {
        if self.data.len() % 4 != 0 {
            return Err(EsmError::InvalidLength {
                record: self.record,
                sub: self.tag,
                expected: self.len() / 4 * 4,
                found: self.len(),
            });
        }
        Ok(self
            .data
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Decodes a NUL-terminated string whose declared length, terminator
    /// included, must not exceed `max_len`.
    pub fn as_zstring(&self, max_len: u32) -> Result<String> {
        if self.len() > max_len {
            return Err(EsmError::StringTooLong {
                record: self.record,
                sub: self.tag,
                length: self.len(),
                max: max_len,
            });
        }
        match self.data.iter().position(|&b| b == 0) {
            None => Err(EsmError::MissingTerminator {
                record: self.record,
                sub: self.tag,
            }),
            Some(end) if end + 1 != self.data.len() => Err(EsmError::InvalidLength {
                record: self.record,
                sub: self.tag,
                expected: end as u32 + 1,
                found: self.len(),
            }),
            Some(end) => Ok(decode_latin1(&self.data[..end])),
        }
    }

    pub fn to_blob(&self) -> OpaqueBlob {
        OpaqueBlob::from_bytes(self.data.to_vec())
    }
}
