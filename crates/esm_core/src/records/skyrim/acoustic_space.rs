use std::num::NonZeroU32;

use crate::codec::{LoadContext, RecordCodec};
use crate::cursor::SubRecordCursor;
use crate::dialect::{Dialect, LengthWidth};
use crate::error::{EsmError, Result};
use crate::field::{ZString, bounded_zstring, field_size, nonzero_u32, optional_size, set_once};
use crate::header::RecordHeader;
use crate::tag::Tag;
use crate::writer::SubRecordWriter;

use super::{EDID, MAX_EDITOR_ID_LEN, OBND};

pub const ASPC: Tag = Tag(*b"ASPC");
const SNAM: Tag = Tag(*b"SNAM");
const RDAT: Tag = Tag(*b"RDAT");
const BNAM: Tag = Tag(*b"BNAM");

const WIDTH: LengthWidth = LengthWidth::U16;

#[derive(Debug, Clone, PartialEq)]
pub struct AcousticSpaceRecord {
    pub header: RecordHeader,
    pub editor_id: String,
    pub bounds: [u8; 12],
    pub looping_sound: Option<NonZeroU32>,
    pub region: Option<NonZeroU32>,
    pub environment_type: Option<NonZeroU32>,
}

impl Default for AcousticSpaceRecord {
    fn default() -> Self {
        Self {
            header: RecordHeader::new(ASPC, Dialect::Skyrim),
            editor_id: String::new(),
            bounds: [0; 12],
            looping_sound: None,
            region: None,
            environment_type: None,
        }
    }
}

impl AcousticSpaceRecord {
    pub fn boxed() -> Box<dyn RecordCodec> {
        Box::new(Self::default())
    }
}

impl RecordCodec for AcousticSpaceRecord {
    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RecordHeader {
        &mut self.header
    }

    fn load_body(&mut self, cursor: &mut SubRecordCursor<'_>, _ctx: &LoadContext<'_>) -> Result<()> {
        self.editor_id = cursor.expect(EDID)?.as_zstring(MAX_EDITOR_ID_LEN)?;
        self.bounds = cursor.expect(OBND)?.as_array()?;

        let mut looping_sound = None;
        let mut region = None;
        let mut environment_type = None;
        while cursor.has_more() {
            let sub = cursor.next_sub_record()?;
            let slot = match sub.tag {
                SNAM => &mut looping_sound,
                RDAT => &mut region,
                BNAM => &mut environment_type,
                other => {
                    return Err(EsmError::UnknownSubRecord {
                        record: ASPC,
                        sub: other,
                    });
                }
            };
            set_once(slot, nonzero_u32(&sub)?, ASPC, sub.tag)?;
        }
        self.looping_sound = looping_sound;
        self.region = region;
        self.environment_type = environment_type;
        Ok(())
    }

    fn body_size(&self) -> u32 {
        field_size(WIDTH, &ZString(&self.editor_id))
            + field_size(WIDTH, &self.bounds)
            + optional_size(WIDTH, &self.looping_sound)
            + optional_size(WIDTH, &self.region)
            + optional_size(WIDTH, &self.environment_type)
    }

    fn write_body(&self, out: &mut SubRecordWriter<'_>) -> Result<()> {
        out.write_field(EDID, &bounded_zstring(ASPC, EDID, &self.editor_id, MAX_EDITOR_ID_LEN)?)?;
        out.write_field(OBND, &self.bounds)?;
        out.write_optional(SNAM, &self.looping_sound)?;
        out.write_optional(RDAT, &self.region)?;
        out.write_optional(BNAM, &self.environment_type)?;
        Ok(())
    }

    fn editor_id(&self) -> Option<String> {
        Some(self.editor_id.clone())
    }
}
