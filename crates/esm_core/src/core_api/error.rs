use std::error::Error;
use std::fmt;

use crate::error::{EsmError, EsmErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorCode {
    Io,
    Parse,
    UnknownDialect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreError {
    pub code: CoreErrorCode,
    pub message: String,
}

impl CoreError {
    pub fn new(code: CoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Error for CoreError {}

impl From<EsmError> for CoreError {
    fn from(err: EsmError) -> Self {
        let code = match err.kind() {
            EsmErrorKind::Io => CoreErrorCode::Io,
            _ => CoreErrorCode::Parse,
        };
        Self::new(code, err.to_string())
    }
}
