use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Seek};

use tracing::{debug, warn};

use crate::codec::{LoadContext, RecordCodec};
use crate::compression::decompress_payload;
use crate::config::ReadOptions;
use crate::cursor::SubRecordCursor;
use crate::dialect::Dialect;
use crate::error::{EsmError, Result};
use crate::header::RecordHeader;
use crate::reader::LittleEndianReader;
use crate::records::{GenericRecord, morrowind, skyrim};
use crate::tag::Tag;

pub type RecordFactory = fn() -> Box<dyn RecordCodec>;

#[derive(Debug)]
pub struct RecordRegistryBuilder {
    dialect: Dialect,
    factories: HashMap<Tag, RecordFactory>,
}

impl RecordRegistryBuilder {
    /// First registration of a tag wins; registering it again is an error.
    pub fn register(&mut self, tag: Tag, factory: RecordFactory) -> Result<&mut Self> {
        if self.factories.contains_key(&tag) {
            return Err(EsmError::DuplicateRegistration(tag));
        }
        self.factories.insert(tag, factory);
        Ok(self)
    }

    pub fn build(self) -> RecordRegistry {
        RecordRegistry {
            dialect: self.dialect,
            factories: self.factories,
        }
    }
}

/// Maps record tags to schemas for one dialect. Immutable once built.
pub struct RecordRegistry {
    dialect: Dialect,
    factories: HashMap<Tag, RecordFactory>,
}

impl fmt::Debug for RecordRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordRegistry")
            .field("dialect", &self.dialect)
            .field("tags", &self.tags())
            .finish()
    }
}

impl RecordRegistry {
    pub fn builder(dialect: Dialect) -> RecordRegistryBuilder {
        RecordRegistryBuilder {
            dialect,
            factories: HashMap::new(),
        }
    }

    /// Registry with the schemas bundled for `dialect`.
    pub fn with_builtin(dialect: Dialect) -> Result<Self> {
        let mut builder = Self::builder(dialect);
        match dialect {
            Dialect::Morrowind => morrowind::register(&mut builder)?,
            Dialect::Skyrim => skyrim::register(&mut builder)?,
        }
        Ok(builder.build())
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn is_registered(&self, tag: Tag) -> bool {
        self.factories.contains_key(&tag)
    }

    pub fn tags(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self.factories.keys().copied().collect();
        tags.sort();
        tags
    }

    /// Empty instance of the schema for `tag`, or the generic fallback.
    pub fn create(&self, tag: Tag) -> Box<dyn RecordCodec> {
        match self.factories.get(&tag) {
            Some(factory) => factory(),
            None => Box::new(GenericRecord::new(tag, self.dialect)),
        }
    }

    /// Reads the header and payload of the record whose tag was just read,
    /// then loads it with the matching schema.
    pub fn dispatch<R: Read + Seek>(
        &self,
        tag: Tag,
        reader: &mut LittleEndianReader<R>,
        ctx: &LoadContext<'_>,
        options: &ReadOptions,
    ) -> Result<Box<dyn RecordCodec>> {
        let header = RecordHeader::read(reader, self.dialect, tag)?;
        if header.declared_size > options.max_record_size {
            return Err(EsmError::OversizedRecord {
                record: tag,
                size: header.declared_size,
                limit: options.max_record_size,
            });
        }
        let payload = reader.read_bytes(header.declared_size as usize)?;
        self.load_record(header, &payload, ctx, options)
    }

    /// Loads a record from an already buffered payload.
    pub fn load_record(
        &self,
        header: RecordHeader,
        payload: &[u8],
        ctx: &LoadContext<'_>,
        options: &ReadOptions,
    ) -> Result<Box<dyn RecordCodec>> {
        let tag = header.tag;
        if header.is_deleted() {
            return Ok(self.load_deleted(header, payload));
        }
        let mut record = self.create(tag);
        *record.header_mut() = header;

        let width = self.dialect.length_width();
        if header.is_compressed() && !record.stores_raw_payload() {
            let body = decompress_payload(tag, payload, options.max_decompressed_size)?;
            let mut cursor = SubRecordCursor::begin(tag, &body, width);
            record.load_body(&mut cursor, ctx)?;
            cursor.finish()?;
        } else {
            let mut cursor = SubRecordCursor::begin(tag, payload, width);
            record.load_body(&mut cursor, ctx)?;
            cursor.finish()?;
        }
        debug!(
            record = %tag,
            form_id = ?header.form_id(),
            size = header.declared_size,
            generic = record.stores_raw_payload(),
            "loaded record"
        );
        Ok(record)
    }

    /// Skyrim tombstones keep only their header. Morrowind deleted records
    /// keep NAME and DELE, which no schema expects, so they stay verbatim.
    fn load_deleted(&self, header: RecordHeader, payload: &[u8]) -> Box<dyn RecordCodec> {
        let tag = header.tag;
        debug!(record = %tag, size = payload.len(), "deleted record");
        if header.is_header_only() {
            if !payload.is_empty() {
                warn!(
                    record = %tag,
                    declared = payload.len(),
                    "deleted record carries a payload; discarding it"
                );
            }
            let mut record = self.create(tag);
            *record.header_mut() = header;
            return record;
        }
        let mut record = GenericRecord::new(tag, self.dialect);
        *record.header_mut() = header;
        record.set_data(payload.to_vec());
        Box::new(record)
    }
}
