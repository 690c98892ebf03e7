use std::collections::BTreeMap;
use std::path::Path;

use crate::codec::RecordCodec;
use crate::config::ReadOptions;
use crate::dialect::Dialect;
use crate::layout::FileLayout;
use crate::plugin::Plugin;
use crate::records::GenericRecord;
use crate::records::morrowind::Tes3Record;
use crate::records::skyrim::Tes4Record;
use crate::registry::RecordRegistry;
use crate::strings::StringTable;
use crate::tag::Tag;

use super::error::{CoreError, CoreErrorCode};
use super::types::{RecordSummary, RoundTripReport, Summary};

#[derive(Debug, Default, Clone)]
pub struct Engine {
    options: ReadOptions,
    strings: Option<StringTable>,
}

#[derive(Debug)]
pub struct Session {
    registry: RecordRegistry,
    plugin: Plugin,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: ReadOptions) -> Self {
        self.options = options;
        self
    }

    /// Table used to check localized string indices while loading.
    pub fn with_strings(mut self, strings: StringTable) -> Self {
        self.strings = Some(strings);
        self
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    pub fn open_bytes<B: AsRef<[u8]>>(
        &self,
        bytes: B,
        hint: Option<Dialect>,
    ) -> Result<Session, CoreError> {
        let bytes = bytes.as_ref();
        let detected = Dialect::detect(bytes).ok_or_else(|| {
            CoreError::new(
                CoreErrorCode::UnknownDialect,
                "input does not start with a TES3 or TES4 file header",
            )
        })?;
        if let Some(hint) = hint {
            if hint != detected {
                return Err(CoreError::new(
                    CoreErrorCode::Parse,
                    format!(
                        "input is a {} file, not {}",
                        detected.name(),
                        hint.name()
                    ),
                ));
            }
        }

        let registry = RecordRegistry::with_builtin(detected)?;
        let plugin = Plugin::parse(bytes, &registry, &self.options, self.strings.as_ref())
            .map_err(|e| {
                let code = CoreError::from(e);
                CoreError::new(
                    code.code,
                    format!("failed to parse as {}: {}", detected.name(), code.message),
                )
            })?;
        Ok(Session { registry, plugin })
    }

    pub fn open_path(&self, path: &Path, hint: Option<Dialect>) -> Result<Session, CoreError> {
        let bytes = std::fs::read(path).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Io,
                format!("failed to read {}: {e}", path.display()),
            )
        })?;
        self.open_bytes(bytes, hint)
    }
}

impl Session {
    pub fn dialect(&self) -> Dialect {
        self.plugin.dialect()
    }

    pub fn registry(&self) -> &RecordRegistry {
        &self.registry
    }

    pub fn plugin(&self) -> &Plugin {
        &self.plugin
    }

    pub fn plugin_mut(&mut self) -> &mut Plugin {
        &mut self.plugin
    }

    pub fn layout(&self) -> &FileLayout {
        self.plugin.layout()
    }

    pub fn summary(&self) -> Summary {
        let records = self.plugin.records();
        let mut records_by_tag = BTreeMap::new();
        for record in &records {
            *records_by_tag
                .entry(record.header().tag.to_string())
                .or_insert(0) += 1;
        }

        let header = self.plugin.header();
        let (file_version, author, description, is_master) =
            if let Some(tes4) = header.as_any().downcast_ref::<Tes4Record>() {
                (
                    tes4.version,
                    tes4.author.clone(),
                    tes4.summary.clone(),
                    tes4.is_master(),
                )
            } else if let Some(tes3) = header.as_any().downcast_ref::<Tes3Record>() {
                (
                    tes3.version,
                    tes3.company.clone(),
                    Some(tes3.description.clone()),
                    tes3.file_flag & 1 != 0,
                )
            } else {
                (0.0, String::new(), None, false)
            };

        Summary {
            dialect: self.dialect(),
            file_version,
            author,
            description,
            masters: self.plugin.masters(),
            is_master,
            localized: self.plugin.is_localized(),
            record_count: records.len(),
            group_count: self.plugin.group_count(),
            records_by_tag,
        }
    }

    /// Summaries of every record after the file header, optionally of one tag.
    pub fn records(&self, tag: Option<Tag>) -> Vec<RecordSummary> {
        self.plugin
            .records()
            .into_iter()
            .filter(|record| tag.is_none_or(|t| record.header().tag == t))
            .map(summarize_record)
            .collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        Ok(self.plugin.to_bytes()?)
    }

    /// Re-serializes the session and compares against `original`.
    pub fn round_trip(&self, original: &[u8]) -> Result<(Vec<u8>, RoundTripReport), CoreError> {
        let output = self.to_bytes()?;
        let report = RoundTripReport::compare(original, &output);
        Ok((output, report))
    }
}

fn summarize_record(record: &dyn RecordCodec) -> RecordSummary {
    let header = record.header();
    RecordSummary {
        tag: header.tag,
        form_id: header.form_id(),
        flags: header.flags,
        editor_id: record.editor_id(),
        size: record.written_size(),
        deleted: header.is_deleted(),
        compressed: header.is_compressed(),
        generic: record.as_any().is::<GenericRecord>(),
    }
}
