pub mod blob;
pub mod codec;
pub mod compression;
pub mod config;
pub mod core_api;
pub mod cursor;
pub mod dialect;
pub mod error;
pub mod field;
pub mod header;
pub mod layout;
pub mod plugin;
pub mod reader;
pub mod records;
pub mod registry;
pub mod strings;
pub mod tag;
pub mod writer;

pub use codec::{LoadContext, RecordCodec};
pub use dialect::{Dialect, LengthWidth};
pub use error::{EsmError, EsmErrorKind, Result};
pub use header::RecordHeader;
pub use registry::RecordRegistry;
pub use tag::Tag;
