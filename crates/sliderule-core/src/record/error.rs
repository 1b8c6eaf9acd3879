//! Runtime record errors (spec §4.2.7): a single typed error surfaced from
//! field access and (de)serialization, as opposed to the registration-time
//! `RecordDefError` which is returned, not thrown.

use thiserror::Error;

use sliderule_membrane::{BitFieldError, PointerError};

use super::definition::RecordDefError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record type '{0}' is not registered")]
    DefinitionNotFound(String),
    #[error("buffer's record type '{found}' does not match expected '{expected}'")]
    DefinitionMismatch { expected: String, found: String },
    #[error("field '{0}' not found")]
    InvalidField(String),
    #[error("array index out of range: {index} >= {elements}")]
    OutOfRange { index: usize, elements: u32 },
    #[error("pointer field is null")]
    PointerNull,
    #[error("pointer target out of bounds: {0}")]
    PointerOutOfBounds(String),
    #[error("buffer too small: need {needed}, have {have}")]
    BufferTooSmall { needed: usize, have: usize },
    #[error("malformed record header: {0}")]
    MalformedHeader(String),
    #[error("cannot take ownership of aliased record memory")]
    CannotTakeOwnership,
    #[error("bit-field error: {0}")]
    BitField(#[from] BitFieldError),
    #[error("record definition error: {0}")]
    Definition(#[from] RecordDefError),
}

impl RecordError {
    /// The severity callers should log this at before deciding whether to
    /// propagate or continue (spec §4.2.7/§7).
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::OutOfRange { .. } | Self::PointerNull | Self::InvalidField(_) => {
                Severity::Warning
            }
            Self::DefinitionNotFound(_)
            | Self::DefinitionMismatch { .. }
            | Self::PointerOutOfBounds(_)
            | Self::BufferTooSmall { .. }
            | Self::MalformedHeader(_)
            | Self::CannotTakeOwnership
            | Self::BitField(_)
            | Self::Definition(_) => Severity::Critical,
        }
    }
}

impl From<PointerError> for RecordError {
    fn from(e: PointerError) -> Self {
        match e {
            PointerError::Null => Self::PointerNull,
            PointerError::OutOfBounds { .. } => Self::PointerOutOfBounds(e.to_string()),
        }
    }
}
