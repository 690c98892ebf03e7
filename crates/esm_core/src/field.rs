//! Typed sub-record values and the optional-field convention.
//!
//! Every field kind reports its payload length and encodes itself through the
//! same [`FieldValue`] implementation, so [`field_size`]/[`optional_size`] on
//! the size path and [`SubRecordWriter::write_field`]/[`write_optional`] on the
//! write path cannot disagree about presence or length.
//!
//! [`SubRecordWriter::write_field`]: crate::writer::SubRecordWriter::write_field
//! [`write_optional`]: crate::writer::SubRecordWriter::write_optional

use std::num::NonZeroU32;

use crate::cursor::SubRecord;
use crate::dialect::LengthWidth;
use crate::error::{EsmError, Result};
use crate::strings::encode_latin1;
use crate::tag::Tag;

pub trait FieldValue {
    fn payload_len(&self) -> usize;
    fn encode(&self, out: &mut Vec<u8>) -> Result<()>;
}

macro_rules! le_field {
    ($($ty:ty),*) => {
        $(
            impl FieldValue for $ty {
                fn payload_len(&self) -> usize {
                    std::mem::size_of::<$ty>()
                }

                fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
                    out.extend_from_slice(&self.to_le_bytes());
                    Ok(())
                }
            }
        )*
    };
}

le_field!(u8, u16, i16, u32, i32, u64, f32);

impl FieldValue for NonZeroU32 {
    fn payload_len(&self) -> usize {
        4
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        self.get().encode(out)
    }
}

impl<const N: usize> FieldValue for [u8; N] {
    fn payload_len(&self) -> usize {
        N
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(self);
        Ok(())
    }
}

impl FieldValue for [u8] {
    fn payload_len(&self) -> usize {
        self.len()
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(self);
        Ok(())
    }
}

impl FieldValue for [u32] {
    fn payload_len(&self) -> usize {
        self.len() * 4
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        for value in self {
            out.extend_from_slice(&value.to_le_bytes());
        }
        Ok(())
    }
}

impl FieldValue for Vec<u32> {
    fn payload_len(&self) -> usize {
        self.as_slice().payload_len()
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        self.as_slice().encode(out)
    }
}

/// NUL-terminated string value; the terminator is part of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZString<'a>(pub &'a str);

impl FieldValue for ZString<'_> {
    fn payload_len(&self) -> usize {
        self.0.chars().count() + 1
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        if self.0.contains('\0') {
            return Err(EsmError::InvalidValue(format!(
                "string {:?} contains a NUL",
                self.0
            )));
        }
        out.extend_from_slice(&encode_latin1(self.0)?);
        out.push(0);
        Ok(())
    }
}

/// Applies the same limit the load path enforces, so a saved string can be
/// read back.
pub fn bounded_zstring<'a>(record: Tag, sub: Tag, text: &'a str, max_len: u32) -> Result<ZString<'a>> {
    let length = u32::try_from(text.chars().count() + 1).unwrap_or(u32::MAX);
    if length > max_len {
        return Err(EsmError::StringTooLong {
            record,
            sub,
            length,
            max: max_len,
        });
    }
    if text.contains('\0') {
        return Err(EsmError::InvalidValue(format!(
            "{record}: {sub} contains a NUL"
        )));
    }
    Ok(ZString(text))
}

impl FieldValue for String {
    fn payload_len(&self) -> usize {
        ZString(self).payload_len()
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        ZString(self).encode(out)
    }
}

/// Bytes a sub-record with `payload_len` bytes of value occupies on disk.
pub fn sub_record_size(width: LengthWidth, payload_len: usize) -> u32 {
    let len = u32::try_from(payload_len).unwrap_or(u32::MAX);
    match width {
        LengthWidth::U16 if payload_len > usize::from(u16::MAX) => {
            // XXXX 04 00 <size> followed by the real header with length 0
            10 + 6 + len
        }
        _ => 4 + width.bytes() + len,
    }
}

pub fn field_size<T: FieldValue + ?Sized>(width: LengthWidth, value: &T) -> u32 {
    sub_record_size(width, value.payload_len())
}

pub fn optional_size<T: FieldValue>(width: LengthWidth, value: &Option<T>) -> u32 {
    value.as_ref().map_or(0, |v| field_size(width, v))
}

/// Stores `value` unless the slot was already filled by an earlier
/// occurrence of the same sub-record.
pub fn set_once<T>(slot: &mut Option<T>, value: T, record: Tag, sub: Tag) -> Result<()> {
    if slot.is_some() {
        return Err(EsmError::DuplicateSubRecord { record, sub });
    }
    *slot = Some(value);
    Ok(())
}

pub fn require<T>(slot: Option<T>, record: Tag, sub: Tag) -> Result<T> {
    slot.ok_or(EsmError::MissingRequiredSubRecord { record, sub })
}

/// Reads a 4-byte value whose presence on the wire implies it is nonzero.
pub fn nonzero_u32(sub: &SubRecord<'_>) -> Result<NonZeroU32> {
    NonZeroU32::new(sub.as_u32()?).ok_or(EsmError::ZeroSentinelViolation {
        record: sub.record,
        sub: sub.tag,
    })
}
