//! File layer: the file header record, groups and the record sequence.

use std::io::{Cursor, Read, Seek, Write};

use serde::Serialize;
use tracing::debug;

use crate::codec::{LoadContext, RecordCodec};
use crate::config::ReadOptions;
use crate::dialect::Dialect;
use crate::error::{EsmError, Result};
use crate::layout::{ByteRange, FileLayout, SectionId, SectionLayout};
use crate::reader::LittleEndianReader;
use crate::records::morrowind::Tes3Record;
use crate::records::skyrim::{FLAG_LOCALIZED, Tes4Record};
use crate::registry::RecordRegistry;
use crate::strings::StringTable;
use crate::tag::Tag;
use crate::writer::LittleEndianWriter;

/// Header of a Skyrim group. `size` includes the 24 header bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupHeader {
    pub size: u32,
    pub label: Tag,
    pub group_type: i32,
    pub stamp: u32,
    pub unknown: u32,
}

impl GroupHeader {
    pub const LEN: u32 = 24;

    pub fn top_level(label: Tag) -> Self {
        Self {
            size: Self::LEN,
            label,
            group_type: 0,
            stamp: 0,
            unknown: 0,
        }
    }

    /// Top-level groups hold all records of the type named by their label.
    pub fn is_top_level(&self) -> bool {
        self.group_type == 0
    }

    /// Reads the fields after the `GRUP` tag.
    pub fn read<R: Read + Seek>(reader: &mut LittleEndianReader<R>) -> Result<Self> {
        let size = reader.read_u32()?;
        let label = reader.read_tag()?;
        let group_type = reader.read_i32()?;
        let stamp = reader.read_u32()?;
        let unknown = reader.read_u32()?;
        if size < Self::LEN {
            return Err(EsmError::InvalidValue(format!(
                "group {label} declares size {size}, smaller than its own header"
            )));
        }
        Ok(Self {
            size,
            label,
            group_type,
            stamp,
            unknown,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut LittleEndianWriter<W>, size: u32) -> Result<()> {
        writer.write_tag(Tag::GRUP)?;
        writer.write_u32(size)?;
        writer.write_tag(self.label)?;
        writer.write_i32(self.group_type)?;
        writer.write_u32(self.stamp)?;
        writer.write_u32(self.unknown)?;
        Ok(())
    }
}

/// Decides whether the driver parses a group's contents or keeps them raw.
pub trait GroupFilter {
    fn descend(&self, header: &GroupHeader) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DescendAll;

impl GroupFilter for DescendAll {
    fn descend(&self, _header: &GroupHeader) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub enum GroupContents {
    Entries(Vec<Entry>),
    /// Contents of a group that was not descended into, verbatim.
    Raw(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct Group {
    pub header: GroupHeader,
    pub contents: GroupContents,
}

#[derive(Debug, Clone)]
pub enum Entry {
    Record(Box<dyn RecordCodec>),
    Group(Group),
}

impl Group {
    pub fn new(header: GroupHeader) -> Self {
        Self {
            header,
            contents: GroupContents::Entries(Vec::new()),
        }
    }

    /// Writes header and contents; the size field is recomputed.
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut body = Vec::new();
        match &self.contents {
            GroupContents::Raw(raw) => body.extend_from_slice(raw),
            GroupContents::Entries(entries) => {
                for entry in entries {
                    write_entry(entry, &mut body)?;
                }
            }
        }
        let size = u32::try_from(body.len() + GroupHeader::LEN as usize).map_err(|_| {
            EsmError::InvalidValue(format!("group {} is too large", self.header.label))
        })?;
        let mut writer = LittleEndianWriter::new(out);
        self.header.write(&mut writer, size)?;
        writer.write_bytes(&body)?;
        Ok(())
    }
}

fn write_entry(entry: &Entry, out: &mut Vec<u8>) -> Result<()> {
    match entry {
        Entry::Record(record) => {
            record.save(out)?;
        }
        Entry::Group(group) => group.write(out)?,
    }
    Ok(())
}

struct Scanner<'a> {
    registry: &'a RecordRegistry,
    options: &'a ReadOptions,
    filter: &'a dyn GroupFilter,
    ctx: LoadContext<'a>,
}

impl Scanner<'_> {
    fn read_entry<R: Read + Seek>(&self, reader: &mut LittleEndianReader<R>) -> Result<Entry> {
        let start = reader.position()?;
        let tag = reader.read_tag()?;
        if tag == Tag::GRUP && self.registry.dialect() == Dialect::Skyrim {
            let header = GroupHeader::read(reader)?;
            return Ok(Entry::Group(self.read_group(reader, header, start)?));
        }
        let record = self.registry.dispatch(tag, reader, &self.ctx, self.options)?;
        Ok(Entry::Record(record))
    }

    fn read_group<R: Read + Seek>(
        &self,
        reader: &mut LittleEndianReader<R>,
        header: GroupHeader,
        start: u64,
    ) -> Result<Group> {
        let end = start + u64::from(header.size);
        if end > reader.len()? {
            return Err(EsmError::eof(format!(
                "group {} at offset {start} declaring {} bytes",
                header.label, header.size
            )));
        }

        if !self.filter.descend(&header) {
            debug!(label = %header.label, size = header.size, "keeping group contents raw");
            let raw = reader.read_bytes((header.size - GroupHeader::LEN) as usize)?;
            return Ok(Group {
                header,
                contents: GroupContents::Raw(raw),
            });
        }

        debug!(label = %header.label, group_type = header.group_type, size = header.size, "group");
        let mut entries = Vec::new();
        while reader.position()? < end {
            entries.push(self.read_entry(reader)?);
        }
        let pos = reader.position()?;
        if pos != end {
            return Err(EsmError::SizeMismatch {
                record: Tag::GRUP,
                declared: header.size,
                consumed: u32::try_from(pos - start).unwrap_or(u32::MAX),
            });
        }
        Ok(Group {
            header,
            contents: GroupContents::Entries(entries),
        })
    }
}

/// A parsed plugin: file header record plus the entries that follow it.
#[derive(Debug, Clone)]
pub struct Plugin {
    dialect: Dialect,
    header: Box<dyn RecordCodec>,
    entries: Vec<Entry>,
    localized: bool,
    layout: FileLayout,
}

impl Plugin {
    pub fn parse(
        bytes: &[u8],
        registry: &RecordRegistry,
        options: &ReadOptions,
        strings: Option<&StringTable>,
    ) -> Result<Self> {
        Self::parse_filtered(bytes, registry, options, strings, options)
    }

    pub fn parse_filtered(
        bytes: &[u8],
        registry: &RecordRegistry,
        options: &ReadOptions,
        strings: Option<&StringTable>,
        filter: &dyn GroupFilter,
    ) -> Result<Self> {
        let dialect = Dialect::detect(bytes).ok_or_else(|| {
            EsmError::InvalidValue("file does not start with a TES3 or TES4 record".to_string())
        })?;
        if dialect != registry.dialect() {
            return Err(EsmError::InvalidValue(format!(
                "{} file cannot be read with a {} registry",
                dialect.name(),
                registry.dialect().name()
            )));
        }

        let file_len = bytes.len();
        let mut reader = LittleEndianReader::new(Cursor::new(bytes));
        let tag = reader.read_tag()?;
        let header = registry.dispatch(tag, &mut reader, &LoadContext::plain(), options)?;
        let localized = options.localized.unwrap_or_else(|| {
            dialect == Dialect::Skyrim && header.header().flags & FLAG_LOCALIZED != 0
        });
        debug!(dialect = dialect.name(), localized, "file header read");

        let mut sections = vec![SectionLayout {
            id: SectionId::FileHeader(tag),
            range: ByteRange {
                start: 0,
                end: reader.position()? as usize,
            },
        }];

        let scanner = Scanner {
            registry,
            options,
            filter,
            ctx: LoadContext { localized, strings },
        };
        let mut entries = Vec::new();
        loop {
            let start = reader.position()?;
            if start >= file_len as u64 {
                break;
            }
            let entry = scanner.read_entry(&mut reader)?;
            let id = match &entry {
                Entry::Record(record) => SectionId::Record(record.header().tag),
                Entry::Group(group) => SectionId::Group(group.header.label),
            };
            sections.push(SectionLayout {
                id,
                range: ByteRange {
                    start: start as usize,
                    end: reader.position()? as usize,
                },
            });
            entries.push(entry);
        }

        let layout = FileLayout { file_len, sections };
        layout.validate()?;
        Ok(Self {
            dialect,
            header,
            entries,
            localized,
            layout,
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn header(&self) -> &dyn RecordCodec {
        self.header.as_ref()
    }

    pub fn header_mut(&mut self) -> &mut dyn RecordCodec {
        self.header.as_mut()
    }

    pub fn is_localized(&self) -> bool {
        self.localized
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut Vec<Entry> {
        &mut self.entries
    }

    /// Layout of the file as it was parsed.
    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }

    /// Master file names from the file header.
    pub fn masters(&self) -> Vec<String> {
        if let Some(tes4) = self.header.downcast_ref::<Tes4Record>() {
            return tes4.masters.iter().map(|m| m.file_name.clone()).collect();
        }
        if let Some(tes3) = self.header.downcast_ref::<Tes3Record>() {
            return tes3.dependencies.iter().map(|d| d.name.clone()).collect();
        }
        Vec::new()
    }

    /// Every record after the file header, depth first.
    pub fn records(&self) -> Vec<&dyn RecordCodec> {
        let mut out = Vec::new();
        collect_records(&self.entries, &mut out);
        out
    }

    pub fn records_mut(&mut self) -> Vec<&mut dyn RecordCodec> {
        let mut out = Vec::new();
        collect_records_mut(&mut self.entries, &mut out);
        out
    }

    pub fn records_with_tag(&self, tag: Tag) -> Vec<&dyn RecordCodec> {
        self.records()
            .into_iter()
            .filter(|record| record.header().tag == tag)
            .collect()
    }

    pub fn group_count(&self) -> usize {
        count_groups(&self.entries)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.header.save(&mut out)?;
        for entry in &self.entries {
            write_entry(entry, &mut out)?;
        }
        Ok(out)
    }
}

fn collect_records<'a>(entries: &'a [Entry], out: &mut Vec<&'a dyn RecordCodec>) {
    for entry in entries {
        match entry {
            Entry::Record(record) => out.push(record.as_ref()),
            Entry::Group(group) => {
                if let GroupContents::Entries(inner) = &group.contents {
                    collect_records(inner, out);
                }
            }
        }
    }
}

fn collect_records_mut<'a>(entries: &'a mut [Entry], out: &mut Vec<&'a mut dyn RecordCodec>) {
    for entry in entries.iter_mut() {
        match entry {
            Entry::Record(record) => out.push(record.as_mut()),
            Entry::Group(group) => {
                if let GroupContents::Entries(inner) = &mut group.contents {
                    collect_records_mut(inner, out);
                }
            }
        }
    }
}

fn count_groups(entries: &[Entry]) -> usize {
    entries
        .iter()
        .map(|entry| match entry {
            Entry::Record(_) => 0,
            Entry::Group(group) => {
                1 + match &group.contents {
                    GroupContents::Entries(inner) => count_groups(inner),
                    GroupContents::Raw(_) => 0,
                }
            }
        })
        .sum()
}
