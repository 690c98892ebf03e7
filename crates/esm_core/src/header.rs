use std::io::{Read, Seek, Write};

use serde::Serialize;

use crate::dialect::Dialect;
use crate::error::Result;
use crate::reader::LittleEndianReader;
use crate::tag::Tag;
use crate::writer::LittleEndianWriter;

pub const FLAG_DELETED: u32 = 0x0000_0020;
pub const FLAG_IGNORED: u32 = 0x0000_1000;
/// Skyrim only: payload is a u32 decompressed size followed by a zlib stream.
pub const FLAG_COMPRESSED: u32 = 0x0004_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DialectFields {
    Morrowind {
        header_one: u32,
    },
    Skyrim {
        form_id: u32,
        revision: u32,
        version: u16,
        unknown5: u16,
    },
}

/// Fixed prefix of every record.
///
/// `declared_size` never includes the header bytes. In the Morrowind dialect
/// `flags` is the record's HeaderFlags field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordHeader {
    pub tag: Tag,
    pub declared_size: u32,
    pub flags: u32,
    pub fields: DialectFields,
}

impl RecordHeader {
    pub fn new(tag: Tag, dialect: Dialect) -> Self {
        let fields = match dialect {
            Dialect::Morrowind => DialectFields::Morrowind { header_one: 0 },
            Dialect::Skyrim => DialectFields::Skyrim {
                form_id: 0,
                revision: 0,
                version: 0,
                unknown5: 0,
            },
        };
        Self {
            tag,
            declared_size: 0,
            flags: 0,
            fields,
        }
    }

    /// Reads the size and dialect fields; the tag has already been consumed.
    pub fn read<R: Read + Seek>(
        reader: &mut LittleEndianReader<R>,
        dialect: Dialect,
        tag: Tag,
    ) -> Result<Self> {
        let declared_size = reader.read_u32()?;
        match dialect {
            Dialect::Morrowind => {
                let header_one = reader.read_u32()?;
                let flags = reader.read_u32()?;
                Ok(Self {
                    tag,
                    declared_size,
                    flags,
                    fields: DialectFields::Morrowind { header_one },
                })
            }
            Dialect::Skyrim => {
                let flags = reader.read_u32()?;
                let form_id = reader.read_u32()?;
                let revision = reader.read_u32()?;
                let version = reader.read_u16()?;
                let unknown5 = reader.read_u16()?;
                Ok(Self {
                    tag,
                    declared_size,
                    flags,
                    fields: DialectFields::Skyrim {
                        form_id,
                        revision,
                        version,
                        unknown5,
                    },
                })
            }
        }
    }

    pub fn read_tagged<R: Read + Seek>(
        reader: &mut LittleEndianReader<R>,
        dialect: Dialect,
    ) -> Result<Self> {
        let tag = reader.read_tag()?;
        Self::read(reader, dialect, tag)
    }

    /// Writes the header under `tag` with the given payload size.
    pub fn write<W: Write>(
        &self,
        writer: &mut LittleEndianWriter<W>,
        tag: Tag,
        declared_size: u32,
    ) -> Result<()> {
        writer.write_tag(tag)?;
        writer.write_u32(declared_size)?;
        match self.fields {
            DialectFields::Morrowind { header_one } => {
                writer.write_u32(header_one)?;
                writer.write_u32(self.flags)?;
            }
            DialectFields::Skyrim {
                form_id,
                revision,
                version,
                unknown5,
            } => {
                writer.write_u32(self.flags)?;
                writer.write_u32(form_id)?;
                writer.write_u32(revision)?;
                writer.write_u16(version)?;
                writer.write_u16(unknown5)?;
            }
        }
        Ok(())
    }

    pub fn dialect(&self) -> Dialect {
        match self.fields {
            DialectFields::Morrowind { .. } => Dialect::Morrowind,
            DialectFields::Skyrim { .. } => Dialect::Skyrim,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.flags & FLAG_DELETED != 0
    }

    /// Skyrim tombstones are written without a payload. Morrowind deleted
    /// records keep theirs (NAME plus DELE).
    pub fn is_header_only(&self) -> bool {
        self.is_deleted() && self.dialect() == Dialect::Skyrim
    }

    pub fn set_deleted(&mut self, deleted: bool) {
        self.set_flag(FLAG_DELETED, deleted);
    }

    pub fn is_ignored(&self) -> bool {
        self.flags & FLAG_IGNORED != 0
    }

    pub fn is_compressed(&self) -> bool {
        self.dialect() == Dialect::Skyrim && self.flags & FLAG_COMPRESSED != 0
    }

    pub fn set_compressed(&mut self, compressed: bool) {
        self.set_flag(FLAG_COMPRESSED, compressed);
    }

    fn set_flag(&mut self, flag: u32, on: bool) {
        if on {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }

    pub fn form_id(&self) -> Option<u32> {
        match self.fields {
            DialectFields::Skyrim { form_id, .. } => Some(form_id),
            DialectFields::Morrowind { .. } => None,
        }
    }

    pub fn header_len(&self) -> u32 {
        self.dialect().header_len()
    }
}
