use crate::codec::{LoadContext, RecordCodec};
use crate::cursor::SubRecordCursor;
use crate::dialect::{Dialect, LengthWidth};
use crate::error::{EsmError, Result};
use crate::field::{FieldValue, ZString, bounded_zstring, field_size, optional_size, set_once};
use crate::header::RecordHeader;
use crate::tag::Tag;
use crate::writer::SubRecordWriter;

use super::{MAX_ID_LEN, NAME};

pub const CELL: Tag = Tag(*b"CELL");
const DATA: Tag = Tag(*b"DATA");
const RGNN: Tag = Tag(*b"RGNN");
const NAM5: Tag = Tag(*b"NAM5");
const INTV: Tag = Tag(*b"INTV");
const WHGT: Tag = Tag(*b"WHGT");
const AMBI: Tag = Tag(*b"AMBI");
const NAM0: Tag = Tag(*b"NAM0");
const FRMR: Tag = Tag(*b"FRMR");
const MVRF: Tag = Tag(*b"MVRF");

pub const CELL_FLAG_INTERIOR: u32 = 0x0000_0001;
pub const CELL_FLAG_HAS_WATER: u32 = 0x0000_0002;

const WIDTH: LengthWidth = LengthWidth::U32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ambience {
    pub ambient_colour: u32,
    pub sunlight_colour: u32,
    pub fog_colour: u32,
    pub fog_density: f32,
}

impl FieldValue for Ambience {
    fn payload_len(&self) -> usize {
        16
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.ambient_colour.to_le_bytes());
        out.extend_from_slice(&self.sunlight_colour.to_le_bytes());
        out.extend_from_slice(&self.fog_colour.to_le_bytes());
        out.extend_from_slice(&self.fog_density.to_le_bytes());
        Ok(())
    }
}

/// A Morrowind cell. Object references (everything from the first FRMR or
/// MVRF sub-record on) are kept as an opaque tail.
#[derive(Debug, Clone, PartialEq)]
pub struct CellRecord {
    pub header: RecordHeader,
    pub name: String,
    pub flags: u32,
    pub grid_x: i32,
    pub grid_y: i32,
    pub region: Option<String>,
    pub map_colour: Option<u32>,
    pub unknown_intv: Option<u32>,
    pub water_height: Option<f32>,
    pub ambience: Option<Ambience>,
    pub reference_count: Option<u32>,
    pub references: Vec<u8>,
}

impl Default for CellRecord {
    fn default() -> Self {
        Self {
            header: RecordHeader::new(CELL, Dialect::Morrowind),
            name: String::new(),
            flags: 0,
            grid_x: 0,
            grid_y: 0,
            region: None,
            map_colour: None,
            unknown_intv: None,
            water_height: None,
            ambience: None,
            reference_count: None,
            references: Vec::new(),
        }
    }
}

impl CellRecord {
    pub fn boxed() -> Box<dyn RecordCodec> {
        Box::new(Self::default())
    }

    pub fn is_interior(&self) -> bool {
        self.flags & CELL_FLAG_INTERIOR != 0
    }

    pub fn has_water(&self) -> bool {
        self.flags & CELL_FLAG_HAS_WATER != 0
    }

    /// Number of FRMR sub-records in the reference tail.
    pub fn count_references(&self) -> Result<usize> {
        let mut cursor = SubRecordCursor::begin(CELL, &self.references, WIDTH);
        let mut count = 0;
        while cursor.has_more() {
            if cursor.next_sub_record()?.tag == FRMR {
                count += 1;
            }
        }
        Ok(count)
    }

    fn data_payload(&self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[..4].copy_from_slice(&self.flags.to_le_bytes());
        out[4..8].copy_from_slice(&self.grid_x.to_le_bytes());
        out[8..].copy_from_slice(&self.grid_y.to_le_bytes());
        out
    }
}

impl RecordCodec for CellRecord {
    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RecordHeader {
        &mut self.header
    }

    fn load_body(&mut self, cursor: &mut SubRecordCursor<'_>, _ctx: &LoadContext<'_>) -> Result<()> {
        self.name = cursor.expect(NAME)?.as_zstring(MAX_ID_LEN)?;
        let data: [u8; 12] = cursor.expect(DATA)?.as_array()?;
        self.flags = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        self.grid_x = i32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        self.grid_y = i32::from_le_bytes([data[8], data[9], data[10], data[11]]);

        let mut region = None;
        let mut map_colour = None;
        let mut unknown_intv = None;
        let mut water_height = None;
        let mut ambience = None;
        let mut reference_count = None;
        self.references.clear();
        while cursor.has_more() {
            if matches!(cursor.peek_tag(), Some(FRMR | MVRF)) {
                self.references = cursor.take_rest().to_vec();
                break;
            }
            let sub = cursor.next_sub_record()?;
            match sub.tag {
                RGNN => set_once(&mut region, sub.as_zstring(MAX_ID_LEN)?, CELL, RGNN)?,
                NAM5 => set_once(&mut map_colour, sub.as_u32()?, CELL, NAM5)?,
                INTV => set_once(&mut unknown_intv, sub.as_u32()?, CELL, INTV)?,
                WHGT => set_once(&mut water_height, sub.as_f32()?, CELL, WHGT)?,
                AMBI => {
                    let raw: [u8; 16] = sub.as_array()?;
                    let word = |i: usize| [raw[i], raw[i + 1], raw[i + 2], raw[i + 3]];
                    let value = Ambience {
                        ambient_colour: u32::from_le_bytes(word(0)),
                        sunlight_colour: u32::from_le_bytes(word(4)),
                        fog_colour: u32::from_le_bytes(word(8)),
                        fog_density: f32::from_le_bytes(word(12)),
                    };
                    set_once(&mut ambience, value, CELL, AMBI)?;
                }
                NAM0 => set_once(&mut reference_count, sub.as_u32()?, CELL, NAM0)?,
                other => {
                    return Err(EsmError::UnknownSubRecord {
                        record: CELL,
                        sub: other,
                    });
                }
            }
        }
        self.region = region;
        self.map_colour = map_colour;
        self.unknown_intv = unknown_intv;
        self.water_height = water_height;
        self.ambience = ambience;
        self.reference_count = reference_count;
        Ok(())
    }

    fn body_size(&self) -> u32 {
        field_size(WIDTH, &ZString(&self.name))
            + field_size(WIDTH, &self.data_payload())
            + optional_size(WIDTH, &self.region)
            + optional_size(WIDTH, &self.map_colour)
            + optional_size(WIDTH, &self.unknown_intv)
            + optional_size(WIDTH, &self.water_height)
            + optional_size(WIDTH, &self.ambience)
            + optional_size(WIDTH, &self.reference_count)
            + u32::try_from(self.references.len()).unwrap_or(u32::MAX)
    }

    fn write_body(&self, out: &mut SubRecordWriter<'_>) -> Result<()> {
        out.write_field(NAME, &bounded_zstring(CELL, NAME, &self.name, MAX_ID_LEN)?)?;
        out.write_field(DATA, &self.data_payload())?;
        if let Some(region) = &self.region {
            out.write_field(RGNN, &bounded_zstring(CELL, RGNN, region, MAX_ID_LEN)?)?;
        }
        out.write_optional(NAM5, &self.map_colour)?;
        out.write_optional(INTV, &self.unknown_intv)?;
        out.write_optional(WHGT, &self.water_height)?;
        out.write_optional(AMBI, &self.ambience)?;
        out.write_optional(NAM0, &self.reference_count)?;
        out.write_unframed(&self.references)?;
        Ok(())
    }

    fn editor_id(&self) -> Option<String> {
        Some(self.name.clone())
    }
}
