use std::io;

use thiserror::Error;

use crate::tag::Tag;

#[derive(Debug, Error)]
pub enum EsmError {
    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("unexpected end of data while reading {context}")]
    UnexpectedEof { context: String },

    #[error("{record}: expected sub-record {expected}, found {found}")]
    UnexpectedTag { record: Tag, expected: Tag, found: Tag },

    #[error("{record}: sub-record {sub} has length {found}, expected {expected}")]
    InvalidLength {
        record: Tag,
        sub: Tag,
        expected: u32,
        found: u32,
    },

    #[error("{record}: sub-record {sub} occurs more than once")]
    DuplicateSubRecord { record: Tag, sub: Tag },

    #[error("{record}: required sub-record {sub} is missing")]
    MissingRequiredSubRecord { record: Tag, sub: Tag },

    #[error("{record}: unknown sub-record {sub}")]
    UnknownSubRecord { record: Tag, sub: Tag },

    #[error("{record}: sub-record {sub} must not be zero")]
    ZeroSentinelViolation { record: Tag, sub: Tag },

    #[error("{record}: declared size {declared} but consumed {consumed} bytes")]
    SizeMismatch {
        record: Tag,
        declared: u32,
        consumed: u32,
    },

    #[error("{record}: string in {sub} has length {length}, limit is {max}")]
    StringTooLong {
        record: Tag,
        sub: Tag,
        length: u32,
        max: u32,
    },

    #[error("{record}: string in {sub} is not NUL-terminated")]
    MissingTerminator { record: Tag, sub: Tag },

    #[error("string table has no entry for index {index:#010X}")]
    StringIndexNotFound { index: u32 },

    #[error("{record}: declared size {size} exceeds limit of {limit} bytes")]
    OversizedRecord { record: Tag, size: u32, limit: u32 },

    #[error("record type {0} is already registered")]
    DuplicateRegistration(Tag),

    #[error("{record}: decompression failed: {message}")]
    Decompression { record: Tag, message: String },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("{record}: predicted {predicted} payload bytes but wrote {written}")]
    SizePrediction {
        record: Tag,
        predicted: u64,
        written: u64,
    },
}

/// Field-less mirror of [`EsmError`] for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EsmErrorKind {
    Io,
    UnexpectedEof,
    UnexpectedTag,
    InvalidLength,
    DuplicateSubRecord,
    MissingRequiredSubRecord,
    UnknownSubRecord,
    ZeroSentinelViolation,
    SizeMismatch,
    StringTooLong,
    MissingTerminator,
    StringIndexNotFound,
    OversizedRecord,
    DuplicateRegistration,
    Decompression,
    InvalidValue,
    SizePrediction,
}

impl EsmError {
    pub fn kind(&self) -> EsmErrorKind {
        match self {
            Self::Io(_) => EsmErrorKind::Io,
            Self::UnexpectedEof { .. } => EsmErrorKind::UnexpectedEof,
            Self::UnexpectedTag { .. } => EsmErrorKind::UnexpectedTag,
            Self::InvalidLength { .. } => EsmErrorKind::InvalidLength,
            Self::DuplicateSubRecord { .. } => EsmErrorKind::DuplicateSubRecord,
            Self::MissingRequiredSubRecord { .. } => EsmErrorKind::MissingRequiredSubRecord,
            Self::UnknownSubRecord { .. } => EsmErrorKind::UnknownSubRecord,
            Self::ZeroSentinelViolation { .. } => EsmErrorKind::ZeroSentinelViolation,
            Self::SizeMismatch { .. } => EsmErrorKind::SizeMismatch,
            Self::StringTooLong { .. } => EsmErrorKind::StringTooLong,
            Self::MissingTerminator { .. } => EsmErrorKind::MissingTerminator,
            Self::StringIndexNotFound { .. } => EsmErrorKind::StringIndexNotFound,
            Self::OversizedRecord { .. } => EsmErrorKind::OversizedRecord,
            Self::DuplicateRegistration(_) => EsmErrorKind::DuplicateRegistration,
            Self::Decompression { .. } => EsmErrorKind::Decompression,
            Self::InvalidValue(_) => EsmErrorKind::InvalidValue,
            Self::SizePrediction { .. } => EsmErrorKind::SizePrediction,
        }
    }

    pub(crate) fn eof(context: impl Into<String>) -> Self {
        Self::UnexpectedEof {
            context: context.into(),
        }
    }
}

impl From<io::Error> for EsmError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::eof("stream")
        } else {
            Self::Io(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, EsmError>;
