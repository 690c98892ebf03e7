//! Schemas of the Skyrim dialect.

mod acoustic_space;
mod colour_form;
mod tes4;

pub use acoustic_space::{ASPC, AcousticSpaceRecord};
pub use colour_form::{CLFM, ColourFormRecord};
pub use tes4::{FLAG_LOCALIZED, FLAG_MASTER, MasterFile, Tes4Record};

use crate::error::Result;
use crate::registry::RecordRegistryBuilder;
use crate::tag::Tag;

pub(crate) const EDID: Tag = Tag(*b"EDID");
pub(crate) const FULL: Tag = Tag(*b"FULL");
pub(crate) const OBND: Tag = Tag(*b"OBND");

/// Declared length of an editor id, terminator included.
pub(crate) const MAX_EDITOR_ID_LEN: u32 = 511;

pub fn register(builder: &mut RecordRegistryBuilder) -> Result<()> {
    builder
        .register(Tag::TES4, Tes4Record::boxed)?
        .register(ASPC, AcousticSpaceRecord::boxed)?
        .register(CLFM, ColourFormRecord::boxed)?;
    Ok(())
}
