//! String tables of localized plugins and the inline-or-indexed string value.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cursor::SubRecord;
use crate::error::{EsmError, Result};
use crate::field::FieldValue;
use crate::reader::LittleEndianReader;
use crate::writer::LittleEndianWriter;

/// Plugin text is 8-bit; each byte maps to the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

pub fn encode_latin1(text: &str) -> Result<Vec<u8>> {
    text.chars()
        .map(|c| {
            u8::try_from(u32::from(c)).map_err(|_| {
                EsmError::InvalidValue(format!(
                    "character {c:?} cannot be stored in an 8-bit plugin string"
                ))
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StringTableKind {
    /// NUL-terminated entries.
    Strings,
    /// Length-prefixed entries (dialogue).
    DlStrings,
    /// Length-prefixed entries (interface).
    IlStrings,
}

impl StringTableKind {
    pub const ALL: [StringTableKind; 3] = [Self::Strings, Self::DlStrings, Self::IlStrings];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Strings => "STRINGS",
            Self::DlStrings => "DLSTRINGS",
            Self::IlStrings => "ILSTRINGS",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ALL
            .into_iter()
            .find(|kind| kind.extension().eq_ignore_ascii_case(ext))
    }
}

/// Id to text map loaded from `.STRINGS`/`.DLSTRINGS`/`.ILSTRINGS` files.
/// Insertion order is kept so a loaded table writes back in file order.
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    entries: HashMap<u32, String>,
    order: Vec<u32>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry. Id 0 is reserved for "no string" and is ignored.
    pub fn add(&mut self, id: u32, text: impl Into<String>) {
        if id == 0 {
            return;
        }
        if self.entries.insert(id, text.into()).is_none() {
            self.order.push(id);
        }
    }

    pub fn get(&self, id: u32) -> Option<&str> {
        self.entries.get(&id).map(String::as_str)
    }

    pub fn has(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn remove(&mut self, id: u32) -> bool {
        if self.entries.remove(&id).is_none() {
            return false;
        }
        self.order.retain(|&other| other != id);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|s| (*id, s.as_str())))
    }

    /// Entries of `other` are added, replacing texts with the same id.
    pub fn merge(&mut self, other: StringTable) {
        let StringTable { mut entries, order } = other;
        for id in order {
            if let Some(text) = entries.remove(&id) {
                self.add(id, text);
            }
        }
    }

    pub fn read_from<R: Read + Seek>(
        reader: &mut LittleEndianReader<R>,
        kind: StringTableKind,
    ) -> Result<Self> {
        let count = reader.read_u32()?;
        let data_size = reader.read_u32()?;
        let available = reader.remaining()?;
        if u64::from(count) * 8 + u64::from(data_size) > available {
            return Err(EsmError::eof(format!(
                "string table with {count} entries and {data_size} data bytes"
            )));
        }

        let mut directory = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let id = reader.read_u32()?;
            let offset = reader.read_u32()?;
            directory.push((id, offset));
        }
        let data = reader.read_bytes(data_size as usize)?;

        let mut table = Self::new();
        for (id, offset) in directory {
            if id == 0 {
                warn!(offset, "string table entry with reserved id 0 ignored");
                continue;
            }
            if table.has(id) {
                return Err(EsmError::InvalidValue(format!(
                    "string table lists id {id:#010X} more than once"
                )));
            }
            let text = read_entry(&data, offset, kind)?;
            table.add(id, text);
        }
        Ok(table)
    }

    pub fn write_to<W: Write>(
        &self,
        writer: &mut LittleEndianWriter<W>,
        kind: StringTableKind,
    ) -> Result<()> {
        let mut data = Vec::new();
        let mut directory = Vec::with_capacity(self.len());
        for (id, text) in self.iter() {
            let offset = u32::try_from(data.len())
                .map_err(|_| EsmError::InvalidValue("string table data too large".to_string()))?;
            directory.push((id, offset));
            let bytes = encode_latin1(text)?;
            if kind != StringTableKind::Strings {
                let len = u32::try_from(bytes.len() + 1).map_err(|_| {
                    EsmError::InvalidValue(format!("string {id:#010X} too long"))
                })?;
                data.extend_from_slice(&len.to_le_bytes());
            }
            data.extend_from_slice(&bytes);
            data.push(0);
        }

        let count = u32::try_from(directory.len())
            .map_err(|_| EsmError::InvalidValue("too many strings".to_string()))?;
        let data_size = u32::try_from(data.len())
            .map_err(|_| EsmError::InvalidValue("string table data too large".to_string()))?;
        writer.write_u32(count)?;
        writer.write_u32(data_size)?;
        for (id, offset) in directory {
            writer.write_u32(id)?;
            writer.write_u32(offset)?;
        }
        writer.write_bytes(&data)?;
        Ok(())
    }

    pub fn read_file(path: &Path) -> Result<Self> {
        let kind = StringTableKind::from_path(path).ok_or_else(|| {
            EsmError::InvalidValue(format!(
                "{} is not a .STRINGS, .DLSTRINGS or .ILSTRINGS file",
                path.display()
            ))
        })?;
        let file = File::open(path).map_err(EsmError::Io)?;
        let mut reader = LittleEndianReader::new(BufReader::new(file));
        let table = Self::read_from(&mut reader, kind)?;
        debug!(path = %path.display(), entries = table.len(), "loaded string table");
        Ok(table)
    }

    pub fn write_file(&self, path: &Path) -> Result<()> {
        let kind = StringTableKind::from_path(path).ok_or_else(|| {
            EsmError::InvalidValue(format!("cannot infer string table kind of {}", path.display()))
        })?;
        let file = File::create(path).map_err(EsmError::Io)?;
        let mut writer = LittleEndianWriter::new(BufWriter::new(file));
        self.write_to(&mut writer, kind)?;
        writer.into_inner().flush()?;
        Ok(())
    }

    /// Paths of the three tables belonging to a plugin:
    /// `<dir>/Strings/<stem>_<language>.<KIND>`.
    pub fn associated_paths(plugin: &Path, language: &str) -> Vec<PathBuf> {
        let dir = plugin.parent().unwrap_or_else(|| Path::new(""));
        let stem = plugin
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        StringTableKind::ALL
            .into_iter()
            .map(|kind| {
                dir.join("Strings")
                    .join(format!("{stem}_{language}.{}", kind.extension()))
            })
            .collect()
    }

    /// Loads and merges every associated table that exists. Fails if none does.
    pub fn load_associated(plugin: &Path, language: &str) -> Result<Self> {
        let mut table = Self::new();
        let mut found = false;
        for path in Self::associated_paths(plugin, language) {
            if !path.is_file() {
                debug!(path = %path.display(), "string table not present");
                continue;
            }
            table.merge(Self::read_file(&path)?);
            found = true;
        }
        if !found {
            return Err(EsmError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "no string tables for {} in language {language}",
                    plugin.display()
                ),
            )));
        }
        Ok(table)
    }
}

fn read_entry(data: &[u8], offset: u32, kind: StringTableKind) -> Result<String> {
    let start = offset as usize;
    if start >= data.len() {
        return Err(EsmError::InvalidValue(format!(
            "string offset {offset} lies outside the {} byte data block",
            data.len()
        )));
    }
    match kind {
        StringTableKind::Strings => {
            let rest = &data[start..];
            let end = rest.iter().position(|&b| b == 0).ok_or_else(|| {
                EsmError::InvalidValue(format!("string at offset {offset} is not NUL-terminated"))
            })?;
            Ok(decode_latin1(&rest[..end]))
        }
        StringTableKind::DlStrings | StringTableKind::IlStrings => {
            let len_bytes = data.get(start..start + 4).ok_or_else(|| {
                EsmError::InvalidValue(format!("string length at offset {offset} is truncated"))
            })?;
            let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]])
                as usize;
            let body = data
                .get(start + 4..start + 4 + len)
                .ok_or_else(|| {
                    EsmError::InvalidValue(format!(
                        "string of {len} bytes at offset {offset} exceeds the data block"
                    ))
                })?;
            let (last, text) = body.split_last().ok_or_else(|| {
                EsmError::InvalidValue(format!("empty string entry at offset {offset}"))
            })?;
            if *last != 0 {
                return Err(EsmError::InvalidValue(format!(
                    "string at offset {offset} is not NUL-terminated"
                )));
            }
            Ok(decode_latin1(text))
        }
    }
}

impl PartialEq for StringTable {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for StringTable {}

/// A string sub-record value: inline text, or an index into the plugin's
/// string tables when the plugin is localized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LocalizedString {
    Index(u32),
    Inline(String),
}

impl Default for LocalizedString {
    fn default() -> Self {
        Self::Inline(String::new())
    }
}

impl PartialEq for LocalizedString {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Index(a), Self::Index(b)) => a == b,
            (Self::Inline(a), Self::Inline(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for LocalizedString {}

impl LocalizedString {
    pub const MAX_INLINE_LEN: u32 = 511;

    /// Decodes the payload in the representation the file uses. A nonzero
    /// index is checked against `table` when one is supplied.
    pub fn load(sub: &SubRecord<'_>, localized: bool, table: Option<&StringTable>) -> Result<Self> {
        if localized {
            let index = sub.as_u32()?;
            if index != 0 && table.is_some_and(|t| !t.has(index)) {
                return Err(EsmError::StringIndexNotFound { index });
            }
            Ok(Self::Index(index))
        } else {
            Ok(Self::Inline(sub.as_zstring(Self::MAX_INLINE_LEN)?))
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, Self::Index(_))
    }

    /// Effective text. Index 0 is the empty string without a lookup.
    pub fn resolve(&self, table: Option<&StringTable>) -> Result<String> {
        match self {
            Self::Inline(text) => Ok(text.clone()),
            Self::Index(0) => Ok(String::new()),
            Self::Index(index) => table
                .and_then(|t| t.get(*index))
                .map(str::to_owned)
                .ok_or(EsmError::StringIndexNotFound { index: *index }),
        }
    }
}

impl FieldValue for LocalizedString {
    fn payload_len(&self) -> usize {
        match self {
            Self::Index(_) => 4,
            Self::Inline(text) => text.payload_len(),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::Index(index) => index.encode(out),
            Self::Inline(text) => text.encode(out),
        }
    }
}

/// Effective string of a sub-record in either representation.
pub fn resolve(
    localized: bool,
    sub: &SubRecord<'_>,
    table: Option<&StringTable>,
) -> Result<String> {
    LocalizedString::load(sub, localized, table)?.resolve(table)
}
