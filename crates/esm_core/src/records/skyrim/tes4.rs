use crate::codec::{LoadContext, RecordCodec};
use crate::cursor::SubRecordCursor;
use crate::dialect::{Dialect, LengthWidth};
use crate::error::{EsmError, Result};
use crate::field::{ZString, bounded_zstring, field_size, optional_size, require, set_once, sub_record_size};
use crate::header::RecordHeader;
use crate::tag::Tag;
use crate::writer::SubRecordWriter;

const HEDR: Tag = Tag(*b"HEDR");
const CNAM: Tag = Tag(*b"CNAM");
const SNAM: Tag = Tag(*b"SNAM");
const MAST: Tag = Tag(*b"MAST");
const DATA: Tag = Tag(*b"DATA");
const ONAM: Tag = Tag(*b"ONAM");
const INTV: Tag = Tag(*b"INTV");
const INCC: Tag = Tag(*b"INCC");

pub const FLAG_MASTER: u32 = 0x0000_0001;
pub const FLAG_LOCALIZED: u32 = 0x0000_0080;

const WIDTH: LengthWidth = LengthWidth::U16;
const MAX_TEXT_LEN: u32 = 511;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterFile {
    pub file_name: String,
    pub data: u64,
}

/// File header of a Skyrim plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct Tes4Record {
    pub header: RecordHeader,
    pub version: f32,
    pub num_records: u32,
    pub next_object_id: u32,
    pub author: String,
    pub summary: Option<String>,
    pub masters: Vec<MasterFile>,
    pub overridden_forms: Vec<u32>,
    pub internal_version: u32,
    pub incc: Option<u32>,
}

impl Default for Tes4Record {
    fn default() -> Self {
        Self {
            header: RecordHeader::new(Tag::TES4, Dialect::Skyrim),
            version: 1.7,
            num_records: 0,
            next_object_id: 0,
            author: String::new(),
            summary: None,
            masters: Vec::new(),
            overridden_forms: Vec::new(),
            internal_version: 0,
            incc: None,
        }
    }
}

impl Tes4Record {
    pub fn boxed() -> Box<dyn RecordCodec> {
        Box::new(Self::default())
    }

    pub fn is_master(&self) -> bool {
        self.header.flags & FLAG_MASTER != 0
    }

    pub fn is_localized(&self) -> bool {
        self.header.flags & FLAG_LOCALIZED != 0
    }

    fn hedr_payload(&self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..8].copy_from_slice(&self.num_records.to_le_bytes());
        out[8..].copy_from_slice(&self.next_object_id.to_le_bytes());
        out
    }
}

impl RecordCodec for Tes4Record {
    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RecordHeader {
        &mut self.header
    }

    fn load_body(&mut self, cursor: &mut SubRecordCursor<'_>, _ctx: &LoadContext<'_>) -> Result<()> {
        let hedr: [u8; 12] = cursor.expect(HEDR)?.as_array()?;
        self.version = f32::from_le_bytes([hedr[0], hedr[1], hedr[2], hedr[3]]);
        self.num_records = u32::from_le_bytes([hedr[4], hedr[5], hedr[6], hedr[7]]);
        self.next_object_id = u32::from_le_bytes([hedr[8], hedr[9], hedr[10], hedr[11]]);
        self.author = cursor.expect(CNAM)?.as_zstring(MAX_TEXT_LEN)?;

        let mut summary = None;
        let mut overridden = None;
        let mut internal_version = None;
        let mut incc = None;
        let mut masters = Vec::new();
        while cursor.has_more() {
            let sub = cursor.next_sub_record()?;
            match sub.tag {
                SNAM => set_once(&mut summary, sub.as_zstring(MAX_TEXT_LEN)?, Tag::TES4, SNAM)?,
                MAST => {
                    let file_name = sub.as_zstring(MAX_TEXT_LEN)?;
                    let data = cursor.expect(DATA)?.as_u64()?;
                    masters.push(MasterFile { file_name, data });
                }
                ONAM => {
                    if sub.is_empty() {
                        return Err(EsmError::InvalidLength {
                            record: Tag::TES4,
                            sub: ONAM,
                            expected: 4,
                            found: 0,
                        });
                    }
                    set_once(&mut overridden, sub.as_u32_vec()?, Tag::TES4, ONAM)?
                }
                INTV => set_once(&mut internal_version, sub.as_u32()?, Tag::TES4, INTV)?,
                INCC => set_once(&mut incc, sub.as_u32()?, Tag::TES4, INCC)?,
                other => {
                    return Err(EsmError::UnknownSubRecord {
                        record: Tag::TES4,
                        sub: other,
                    });
                }
            }
        }

        self.summary = summary;
        self.masters = masters;
        self.overridden_forms = overridden.unwrap_or_default();
        self.internal_version = require(internal_version, Tag::TES4, INTV)?;
        self.incc = incc;
        Ok(())
    }

    fn body_size(&self) -> u32 {
        let masters: u32 = self
            .masters
            .iter()
            .map(|m| field_size(WIDTH, &ZString(&m.file_name)) + field_size(WIDTH, &m.data))
            .sum();
        let onam = if self.overridden_forms.is_empty() {
            0
        } else {
            sub_record_size(WIDTH, self.overridden_forms.len() * 4)
        };
        sub_record_size(WIDTH, 12)
            + field_size(WIDTH, &ZString(&self.author))
            + optional_size(WIDTH, &self.summary)
            + masters
            + onam
            + field_size(WIDTH, &self.internal_version)
            + optional_size(WIDTH, &self.incc)
    }

    fn write_body(&self, out: &mut SubRecordWriter<'_>) -> Result<()> {
        out.write_field(HEDR, &self.hedr_payload())?;
        out.write_field(CNAM, &bounded_zstring(Tag::TES4, CNAM, &self.author, MAX_TEXT_LEN)?)?;
        if let Some(summary) = &self.summary {
            out.write_field(SNAM, &bounded_zstring(Tag::TES4, SNAM, summary, MAX_TEXT_LEN)?)?;
        }
        for master in &self.masters {
            let file_name = bounded_zstring(Tag::TES4, MAST, &master.file_name, MAX_TEXT_LEN)?;
            out.write_field(MAST, &file_name)?;
            out.write_field(DATA, &master.data)?;
        }
        if !self.overridden_forms.is_empty() {
            out.write_field(ONAM, &self.overridden_forms)?;
        }
        out.write_field(INTV, &self.internal_version)?;
        out.write_optional(INCC, &self.incc)?;
        Ok(())
    }
}
