use std::any::Any;
use std::fmt;
use std::io::Write;

use crate::compression::compress_payload;
use crate::cursor::SubRecordCursor;
use crate::error::{EsmError, Result};
use crate::header::RecordHeader;
use crate::strings::StringTable;
use crate::tag::Tag;
use crate::writer::{LittleEndianWriter, SubRecordWriter};

/// Per-file state handed to every record load.
#[derive(Debug, Clone, Copy)]
pub struct LoadContext<'a> {
    pub localized: bool,
    pub strings: Option<&'a StringTable>,
}

impl<'a> LoadContext<'a> {
    pub fn plain() -> Self {
        Self {
            localized: false,
            strings: None,
        }
    }

    pub fn localized(strings: Option<&'a StringTable>) -> Self {
        Self {
            localized: true,
            strings,
        }
    }
}

/// Contract of every record schema.
///
/// The engine reads the header and hands the body to [`load_body`] through
/// a cursor bounded by the declared size; deleted records never reach it.
/// [`body_size`] must equal the bytes [`write_body`] emits for every field
/// combination, and [`save`] fails with `SizePrediction` otherwise.
///
/// [`load_body`]: RecordCodec::load_body
/// [`body_size`]: RecordCodec::body_size
/// [`write_body`]: RecordCodec::write_body
/// [`save`]: RecordCodec::save
pub trait RecordCodec: RecordAny + fmt::Debug + Send + Sync {
    fn header(&self) -> &RecordHeader;

    fn header_mut(&mut self) -> &mut RecordHeader;

    fn load_body(&mut self, cursor: &mut SubRecordCursor<'_>, ctx: &LoadContext<'_>) -> Result<()>;

    fn body_size(&self) -> u32;

    fn write_body(&self, out: &mut SubRecordWriter<'_>) -> Result<()>;

    /// Tag the record is saved under.
    fn type_tag(&self) -> Tag {
        self.header().tag
    }

    /// Payload bytes following the header; 0 for Skyrim deleted records.
    fn written_size(&self) -> u32 {
        if self.header().is_header_only() {
            0
        } else {
            self.body_size()
        }
    }

    /// True when the stored body is the payload exactly as read, so the
    /// engine must neither inflate it on load nor deflate it on save.
    fn stores_raw_payload(&self) -> bool {
        false
    }

    fn editor_id(&self) -> Option<String> {
        None
    }

    fn save(&self, out: &mut dyn Write) -> Result<u64> {
        save_record(self, out)
    }
}

/// Object-safe helpers implemented for every `Clone + PartialEq` codec.
pub trait RecordAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn clone_box(&self) -> Box<dyn RecordCodec>;
    fn eq_dyn(&self, other: &dyn RecordCodec) -> bool;
}

impl<T> RecordAny for T
where
    T: RecordCodec + Clone + PartialEq,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn RecordCodec> {
        Box::new(self.clone())
    }

    fn eq_dyn(&self, other: &dyn RecordCodec) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

impl dyn RecordCodec + '_ {
    pub fn downcast_ref<T: RecordCodec>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    pub fn downcast_mut<T: RecordCodec>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.save(&mut out)?;
        Ok(out)
    }
}

impl Clone for Box<dyn RecordCodec> {
    fn clone(&self) -> Self {
        (**self).clone_box()
    }
}

impl PartialEq for dyn RecordCodec + '_ {
    fn eq(&self, other: &Self) -> bool {
        self.eq_dyn(other)
    }
}

/// Header plus body, with the body size checked against the prediction.
/// Skyrim deleted records are written header-only with a declared size of 0.
pub fn save_record<C: RecordCodec + ?Sized>(codec: &C, out: &mut dyn Write) -> Result<u64> {
    let header = codec.header();
    let tag = codec.type_tag();
    let mut writer = LittleEndianWriter::new(out);
    if header.is_header_only() {
        header.write(&mut writer, tag, 0)?;
        return Ok(writer.written());
    }

    let predicted = codec.body_size();
    let mut body = Vec::with_capacity(predicted as usize);
    {
        let mut sub = SubRecordWriter::new(&mut body, header.dialect().length_width());
        codec.write_body(&mut sub)?;
    }
    if body.len() as u64 != u64::from(predicted) {
        return Err(EsmError::SizePrediction {
            record: tag,
            predicted: u64::from(predicted),
            written: body.len() as u64,
        });
    }

    let payload = if header.is_compressed() && !codec.stores_raw_payload() {
        compress_payload(tag, &body)?
    } else {
        body
    };
    let size = u32::try_from(payload.len()).map_err(|_| {
        EsmError::InvalidValue(format!("record {tag} payload of {} bytes is too large", payload.len()))
    })?;
    header.write(&mut writer, tag, size)?;
    writer.write_bytes(&payload)?;
    Ok(writer.written())
}
