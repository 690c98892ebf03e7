use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::dialect::LengthWidth;
use crate::error::{EsmError, Result};
use crate::field::FieldValue;
use crate::tag::Tag;

/// Little-endian writer that counts the bytes it has emitted.
pub struct LittleEndianWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> LittleEndianWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write_u8(&mut self, value: u8) -> io::Result<()> {
        self.inner.write_u8(value)?;
        self.written += 1;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> io::Result<()> {
        self.inner.write_u16::<LittleEndian>(value)?;
        self.written += 2;
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> io::Result<()> {
        self.inner.write_i32::<LittleEndian>(value)?;
        self.written += 4;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> io::Result<()> {
        self.inner.write_u32::<LittleEndian>(value)?;
        self.written += 4;
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> io::Result<()> {
        self.inner.write_f32::<LittleEndian>(value)?;
        self.written += 4;
        Ok(())
    }

    pub fn write_tag(&mut self, tag: Tag) -> io::Result<()> {
        self.write_bytes(tag.as_bytes())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }
}

/// Emits sub-records into a record body buffer using the dialect's length width.
pub struct SubRecordWriter<'a> {
    out: LittleEndianWriter<&'a mut Vec<u8>>,
    width: LengthWidth,
    scratch: Vec<u8>,
}

impl<'a> SubRecordWriter<'a> {
    pub fn new(out: &'a mut Vec<u8>, width: LengthWidth) -> Self {
        Self {
            out: LittleEndianWriter::new(out),
            width,
            scratch: Vec::new(),
        }
    }

    pub fn width(&self) -> LengthWidth {
        self.width
    }

    pub fn written(&self) -> u64 {
        self.out.written()
    }

    /// Writes a sub-record header. Payloads over 65535 bytes in a 16-bit
    /// dialect are announced through an `XXXX` prefix carrying the real size.
    pub fn write_sub_header(&mut self, tag: Tag, len: usize) -> Result<()> {
        let len32 = u32::try_from(len).map_err(|_| {
            EsmError::InvalidValue(format!("sub-record {tag} payload of {len} bytes is too large"))
        })?;
        match self.width {
            LengthWidth::U16 => match u16::try_from(len32) {
                Ok(short) => {
                    self.out.write_tag(tag)?;
                    self.out.write_u16(short)?;
                }
                Err(_) => {
                    self.out.write_tag(Tag::XXXX)?;
                    self.out.write_u16(4)?;
                    self.out.write_u32(len32)?;
                    self.out.write_tag(tag)?;
                    self.out.write_u16(0)?;
                }
            },
            LengthWidth::U32 => {
                self.out.write_tag(tag)?;
                self.out.write_u32(len32)?;
            }
        }
        Ok(())
    }

    pub fn write_raw(&mut self, tag: Tag, payload: &[u8]) -> Result<()> {
        self.write_sub_header(tag, payload.len())?;
        self.out.write_bytes(payload)?;
        Ok(())
    }

    /// Bytes appended without any sub-record framing.
    pub fn write_unframed(&mut self, bytes: &[u8]) -> Result<()> {
        self.out.write_bytes(bytes)?;
        Ok(())
    }

    pub fn write_field<T: FieldValue + ?Sized>(&mut self, tag: Tag, value: &T) -> Result<()> {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        value.encode(&mut scratch)?;
        let expected = value.payload_len();
        if scratch.len() != expected {
            return Err(EsmError::SizePrediction {
                record: tag,
                predicted: expected as u64,
                written: scratch.len() as u64,
            });
        }
        let result = self.write_raw(tag, &scratch);
        self.scratch = scratch;
        result
    }

    /// Writes the field only when it is present; pairs with
    /// [`crate::field::optional_size`] on the size path.
    pub fn write_optional<T: FieldValue>(&mut self, tag: Tag, value: &Option<T>) -> Result<()> {
        match value {
            Some(value) => self.write_field(tag, value),
            None => Ok(()),
        }
    }
}
