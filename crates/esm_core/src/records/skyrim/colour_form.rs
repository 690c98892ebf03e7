use crate::codec::{LoadContext, RecordCodec};
use crate::cursor::SubRecordCursor;
use crate::dialect::{Dialect, LengthWidth};
use crate::error::{EsmError, Result};
use crate::field::{ZString, bounded_zstring, field_size, optional_size, require, set_once};
use crate::header::RecordHeader;
use crate::strings::LocalizedString;
use crate::tag::Tag;
use crate::writer::SubRecordWriter;

use super::{EDID, FULL, MAX_EDITOR_ID_LEN};

pub const CLFM: Tag = Tag(*b"CLFM");
const CNAM: Tag = Tag(*b"CNAM");
const FNAM: Tag = Tag(*b"FNAM");

const WIDTH: LengthWidth = LengthWidth::U16;

/// Colour definition used by character creation.
#[derive(Debug, Clone, PartialEq)]
pub struct ColourFormRecord {
    pub header: RecordHeader,
    pub editor_id: String,
    pub name: Option<LocalizedString>,
    /// Packed RGBA.
    pub colour: u32,
    pub playable_flags: u32,
}

impl Default for ColourFormRecord {
    fn default() -> Self {
        Self {
            header: RecordHeader::new(CLFM, Dialect::Skyrim),
            editor_id: String::new(),
            name: None,
            colour: 0,
            playable_flags: 0,
        }
    }
}

impl ColourFormRecord {
    pub fn boxed() -> Box<dyn RecordCodec> {
        Box::new(Self::default())
    }

    pub fn is_playable(&self) -> bool {
        self.playable_flags & 1 != 0
    }
}

impl RecordCodec for ColourFormRecord {
    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RecordHeader {
        &mut self.header
    }

    fn load_body(&mut self, cursor: &mut SubRecordCursor<'_>, ctx: &LoadContext<'_>) -> Result<()> {
        self.editor_id = cursor.expect(EDID)?.as_zstring(MAX_EDITOR_ID_LEN)?;

        let mut name = None;
        let mut colour = None;
        let mut playable = None;
        while cursor.has_more() {
            let sub = cursor.next_sub_record()?;
            match sub.tag {
                FULL => set_once(
                    &mut name,
                    LocalizedString::load(&sub, ctx.localized, ctx.strings)?,
                    CLFM,
                    FULL,
                )?,
                CNAM => set_once(&mut colour, sub.as_u32()?, CLFM, CNAM)?,
                FNAM => set_once(&mut playable, sub.as_u32()?, CLFM, FNAM)?,
                other => {
                    return Err(EsmError::UnknownSubRecord {
                        record: CLFM,
                        sub: other,
                    });
                }
            }
        }
        self.name = name;
        self.colour = require(colour, CLFM, CNAM)?;
        self.playable_flags = require(playable, CLFM, FNAM)?;
        Ok(())
    }

    fn body_size(&self) -> u32 {
        field_size(WIDTH, &ZString(&self.editor_id))
            + optional_size(WIDTH, &self.name)
            + field_size(WIDTH, &self.colour)
            + field_size(WIDTH, &self.playable_flags)
    }

    fn write_body(&self, out: &mut SubRecordWriter<'_>) -> Result<()> {
        out.write_field(EDID, &bounded_zstring(CLFM, EDID, &self.editor_id, MAX_EDITOR_ID_LEN)?)?;
        out.write_optional(FULL, &self.name)?;
        out.write_field(CNAM, &self.colour)?;
        out.write_field(FNAM, &self.playable_flags)?;
        Ok(())
    }

    fn editor_id(&self) -> Option<String> {
        Some(self.editor_id.clone())
    }
}
