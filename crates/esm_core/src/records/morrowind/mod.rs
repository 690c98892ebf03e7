//! Schemas of the Morrowind dialect.

mod cell;
mod global;
mod tes3;

pub use cell::{Ambience, CELL, CELL_FLAG_HAS_WATER, CELL_FLAG_INTERIOR, CellRecord};
pub use global::{GLOB, GlobalRecord, GlobalValue};
pub use tes3::{Dependency, Tes3Record};

use crate::error::Result;
use crate::registry::RecordRegistryBuilder;
use crate::tag::Tag;

pub(crate) const NAME: Tag = Tag(*b"NAME");

/// Declared length of an id string, terminator included.
pub(crate) const MAX_ID_LEN: u32 = 255;

pub fn register(builder: &mut RecordRegistryBuilder) -> Result<()> {
    builder
        .register(Tag::TES3, Tes3Record::boxed)?
        .register(GLOB, GlobalRecord::boxed)?
        .register(CELL, CellRecord::boxed)?;
    Ok(())
}
