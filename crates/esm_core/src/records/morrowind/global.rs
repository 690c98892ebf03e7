use crate::codec::{LoadContext, RecordCodec};
use crate::cursor::SubRecordCursor;
use crate::dialect::{Dialect, LengthWidth};
use crate::error::{EsmError, Result};
use crate::field::{ZString, bounded_zstring, field_size};
use crate::header::RecordHeader;
use crate::tag::Tag;
use crate::writer::SubRecordWriter;

use super::{MAX_ID_LEN, NAME};

pub const GLOB: Tag = Tag(*b"GLOB");
const FNAM: Tag = Tag(*b"FNAM");
const FLTV: Tag = Tag(*b"FLTV");

const WIDTH: LengthWidth = LengthWidth::U32;

/// Value of a global variable. Every kind is stored as a float on disk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GlobalValue {
    Short(i16),
    Long(i32),
    Float(f32),
}

impl GlobalValue {
    fn type_char(self) -> u8 {
        match self {
            Self::Short(_) => b's',
            Self::Long(_) => b'l',
            Self::Float(_) => b'f',
        }
    }

    fn as_stored(self) -> f32 {
        match self {
            Self::Short(v) => f32::from(v),
            Self::Long(v) => v as f32,
            Self::Float(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalRecord {
    pub header: RecordHeader,
    pub id: String,
    pub value: GlobalValue,
}

impl Default for GlobalRecord {
    fn default() -> Self {
        Self {
            header: RecordHeader::new(GLOB, Dialect::Morrowind),
            id: String::new(),
            value: GlobalValue::Float(0.0),
        }
    }
}

impl GlobalRecord {
    pub fn boxed() -> Box<dyn RecordCodec> {
        Box::new(Self::default())
    }
}

impl RecordCodec for GlobalRecord {
    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RecordHeader {
        &mut self.header
    }

    fn load_body(&mut self, cursor: &mut SubRecordCursor<'_>, _ctx: &LoadContext<'_>) -> Result<()> {
        self.id = cursor.expect(NAME)?.as_zstring(MAX_ID_LEN)?;
        let kind = cursor.expect(FNAM)?.as_u8()?;
        let stored = cursor.expect(FLTV)?.as_f32()?;
        self.value = match kind {
            b's' => GlobalValue::Short(stored as i16),
            b'l' => GlobalValue::Long(stored as i32),
            b'f' => GlobalValue::Float(stored),
            other => {
                return Err(EsmError::InvalidValue(format!(
                    "GLOB {}: type {:?} is not one of 's', 'l' or 'f'",
                    self.id,
                    char::from(other)
                )));
            }
        };
        Ok(())
    }

    fn body_size(&self) -> u32 {
        field_size(WIDTH, &ZString(&self.id)) + field_size(WIDTH, &0u8) + field_size(WIDTH, &0f32)
    }

    fn write_body(&self, out: &mut SubRecordWriter<'_>) -> Result<()> {
        out.write_field(NAME, &bounded_zstring(GLOB, NAME, &self.id, MAX_ID_LEN)?)?;
        out.write_field(FNAM, &self.value.type_char())?;
        out.write_field(FLTV, &self.value.as_stored())?;
        Ok(())
    }

    fn editor_id(&self) -> Option<String> {
        Some(self.id.clone())
    }
}
