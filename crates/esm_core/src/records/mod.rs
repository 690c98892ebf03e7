//! Record schemas bundled with the engine and the generic fallback.

mod generic;
pub mod morrowind;
pub mod skyrim;

pub use generic::GenericRecord;
