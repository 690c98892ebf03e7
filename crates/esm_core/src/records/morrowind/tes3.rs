use crate::codec::{LoadContext, RecordCodec};
use crate::cursor::SubRecordCursor;
use crate::dialect::{Dialect, LengthWidth};
use crate::error::{EsmError, Result};
use crate::field::{ZString, bounded_zstring, field_size, sub_record_size};
use crate::header::RecordHeader;
use crate::strings::{decode_latin1, encode_latin1};
use crate::tag::Tag;
use crate::writer::SubRecordWriter;

use super::MAX_ID_LEN;

const HEDR: Tag = Tag(*b"HEDR");
const MAST: Tag = Tag(*b"MAST");
const DATA: Tag = Tag(*b"DATA");

const WIDTH: LengthWidth = LengthWidth::U32;
const COMPANY_LEN: usize = 32;
const DESCRIPTION_LEN: usize = 256;
const HEDR_LEN: usize = 4 + 4 + COMPANY_LEN + DESCRIPTION_LEN + 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    /// Size of the master file in bytes when the plugin was saved.
    pub size: u64,
}

/// File header of a Morrowind plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct Tes3Record {
    pub header: RecordHeader,
    pub version: f32,
    pub file_flag: u32,
    pub company: String,
    pub description: String,
    pub num_records: u32,
    pub dependencies: Vec<Dependency>,
}

impl Default for Tes3Record {
    fn default() -> Self {
        Self {
            header: RecordHeader::new(Tag::TES3, Dialect::Morrowind),
            version: 1.2,
            file_flag: 0,
            company: String::new(),
            description: String::new(),
            num_records: 0,
            dependencies: Vec::new(),
        }
    }
}

fn fixed_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    decode_latin1(&bytes[..end])
}

fn put_fixed_text(out: &mut Vec<u8>, text: &str, len: usize, what: &str) -> Result<()> {
    let bytes = encode_latin1(text)?;
    if bytes.len() > len {
        return Err(EsmError::InvalidValue(format!(
            "TES3 {what} is {} bytes long, field holds {len}",
            bytes.len()
        )));
    }
    out.extend_from_slice(&bytes);
    out.resize(out.len() + len - bytes.len(), 0);
    Ok(())
}

impl Tes3Record {
    pub fn boxed() -> Box<dyn RecordCodec> {
        Box::new(Self::default())
    }

    fn hedr_payload(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(HEDR_LEN);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.file_flag.to_le_bytes());
        put_fixed_text(&mut out, &self.company, COMPANY_LEN, "company name")?;
        put_fixed_text(&mut out, &self.description, DESCRIPTION_LEN, "description")?;
        out.extend_from_slice(&self.num_records.to_le_bytes());
        Ok(out)
    }
}

impl RecordCodec for Tes3Record {
    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RecordHeader {
        &mut self.header
    }

    fn load_body(&mut self, cursor: &mut SubRecordCursor<'_>, _ctx: &LoadContext<'_>) -> Result<()> {
        let hedr = cursor.expect(HEDR)?;
        hedr.expect_len(HEDR_LEN as u32)?;
        let d = hedr.data;
        self.version = f32::from_le_bytes([d[0], d[1], d[2], d[3]]);
        self.file_flag = u32::from_le_bytes([d[4], d[5], d[6], d[7]]);
        let company_end = 8 + COMPANY_LEN;
        let description_end = company_end + DESCRIPTION_LEN;
        self.company = fixed_text(&d[8..company_end]);
        self.description = fixed_text(&d[company_end..description_end]);
        self.num_records = u32::from_le_bytes([
            d[description_end],
            d[description_end + 1],
            d[description_end + 2],
            d[description_end + 3],
        ]);

        self.dependencies.clear();
        while cursor.has_more() {
            let sub = cursor.next_sub_record()?;
            if sub.tag != MAST {
                return Err(EsmError::UnknownSubRecord {
                    record: Tag::TES3,
                    sub: sub.tag,
                });
            }
            let name = sub.as_zstring(MAX_ID_LEN)?;
            let size = cursor.expect(DATA)?.as_u64()?;
            self.dependencies.push(Dependency { name, size });
        }
        Ok(())
    }

    fn body_size(&self) -> u32 {
        let deps: u32 = self
            .dependencies
            .iter()
            .map(|d| field_size(WIDTH, &ZString(&d.name)) + field_size(WIDTH, &d.size))
            .sum();
        sub_record_size(WIDTH, HEDR_LEN) + deps
    }

    fn write_body(&self, out: &mut SubRecordWriter<'_>) -> Result<()> {
        out.write_raw(HEDR, &self.hedr_payload()?)?;
        for dep in &self.dependencies {
            out.write_field(MAST, &bounded_zstring(Tag::TES3, MAST, &dep.name, MAX_ID_LEN)?)?;
            out.write_field(DATA, &dep.size)?;
        }
        Ok(())
    }
}
