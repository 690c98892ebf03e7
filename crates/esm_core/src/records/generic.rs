use std::io::{Read, Seek, Write};

use crate::codec::{LoadContext, RecordCodec, save_record};
use crate::cursor::SubRecordCursor;
use crate::dialect::Dialect;
use crate::error::{EsmError, Result};
use crate::header::RecordHeader;
use crate::reader::LittleEndianReader;
use crate::tag::Tag;
use crate::writer::SubRecordWriter;

const EDID: Tag = Tag(*b"EDID");
const NAME: Tag = Tag(*b"NAME");

/// Record of a type without a registered schema. The payload is kept
/// byte-for-byte, compressed or not, and written back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericRecord {
    header: RecordHeader,
    data: Vec<u8>,
    save_tag: Option<Tag>,
}

impl GenericRecord {
    pub fn new(tag: Tag, dialect: Dialect) -> Self {
        Self {
            header: RecordHeader::new(tag, dialect),
            data: Vec::new(),
            save_tag: None,
        }
    }

    /// Consumes exactly `header.declared_size` payload bytes. A Skyrim
    /// deleted record drops them.
    pub fn load<R: Read + Seek>(
        reader: &mut LittleEndianReader<R>,
        header: RecordHeader,
    ) -> Result<Self> {
        let mut data = reader.read_bytes(header.declared_size as usize)?;
        if header.is_header_only() {
            data.clear();
        }
        Ok(Self {
            header,
            data,
            save_tag: None,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
    }

    pub fn save_as(&self, out: &mut dyn Write, tag: Tag) -> Result<u64> {
        let mut retagged = self.clone();
        retagged.save_tag = Some(tag);
        save_record(&retagged, out)
    }

    /// Reads the leading editor id sub-record, if the payload is
    /// uncompressed and starts with one.
    fn leading_editor_id(&self) -> Option<String> {
        if self.header.is_compressed() || self.header.is_header_only() {
            return None;
        }
        let dialect = self.header.dialect();
        let mut cursor = SubRecordCursor::begin(self.header.tag, &self.data, dialect.length_width());
        let sub = cursor.next_sub_record().ok()?;
        let wanted = match dialect {
            Dialect::Morrowind => NAME,
            Dialect::Skyrim => EDID,
        };
        if sub.tag != wanted {
            return None;
        }
        sub.as_zstring(u32::MAX).ok()
    }
}

impl RecordCodec for GenericRecord {
    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RecordHeader {
        &mut self.header
    }

    fn load_body(&mut self, cursor: &mut SubRecordCursor<'_>, _ctx: &LoadContext<'_>) -> Result<()> {
        self.data = cursor.take_rest().to_vec();
        Ok(())
    }

    fn body_size(&self) -> u32 {
        u32::try_from(self.data.len()).unwrap_or(u32::MAX)
    }

    fn write_body(&self, out: &mut SubRecordWriter<'_>) -> Result<()> {
        if self.data.len() > u32::MAX as usize {
            return Err(EsmError::InvalidValue(format!(
                "record {} payload too large",
                self.header.tag
            )));
        }
        out.write_unframed(&self.data)
    }

    fn type_tag(&self) -> Tag {
        self.save_tag.unwrap_or(self.header.tag)
    }

    fn stores_raw_payload(&self) -> bool {
        true
    }

    fn editor_id(&self) -> Option<String> {
        self.leading_editor_id()
    }
}
