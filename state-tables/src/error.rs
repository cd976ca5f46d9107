//! Errors that occur while naming, decoding or encoding state tables

use crate::validate::ValidationReport;

/// A problem with the names assigned to states or classes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NameError {
    /// More classes than fit in a one-byte class index.
    TooManyClasses(usize),
    /// A reserved name was used for a slot past the reserved ones.
    ReservedName { name: String, index: usize },
    DuplicateName(String),
    /// A name that the registry does not contain.
    UnknownName(String),
}

/// A structural problem found while decoding binary data.
///
/// Decoding stops at the first of these; no partial table is produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes remained than a read required.
    InsufficientBytes {
        context: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },
    /// A header offset points outside the subtable.
    OffsetOutOfBounds {
        field: &'static str,
        offset: usize,
        len: usize,
    },
    TooFewClasses(u16),
    TooManyClasses(u16),
    InvalidClassTableFormat(u16),
    /// A class table segment whose last glyph precedes its first.
    InvalidSegment { first: u16, last: u16 },
    ClassIndexOutOfRange {
        glyph: u16,
        class: u16,
        num_classes: usize,
    },
    GlyphOutOfRange { glyph: u16, glyph_count: u16 },
    /// An entry's new state offset is not the start of a state array row.
    MisalignedStateOffset { entry: usize, offset: u16 },
    EntryIndexOutOfRange {
        state: usize,
        class: usize,
        index: u8,
        num_entries: usize,
    },
    EmptyEntryTable,
    /// An entry's payload offset does not land on a payload word.
    InvalidPayloadOffset { entry: usize, offset: u16 },
    /// A kerning value list ran past the value array without a terminator.
    MissingTerminator { offset: usize },
    InvalidNameStash(&'static str),
    Names(NameError),
}

/// An error that occurred while encoding a table.
#[derive(Debug)]
pub enum EncodeError {
    ValidationFailed(ValidationReport),
    /// A resolved offset did not fit in its field.
    OffsetOverflow { field: &'static str, value: usize },
    Names(NameError),
}

impl From<NameError> for DecodeError {
    fn from(value: NameError) -> Self {
        DecodeError::Names(value)
    }
}

impl From<NameError> for EncodeError {
    fn from(value: NameError) -> Self {
        EncodeError::Names(value)
    }
}

impl From<ValidationReport> for EncodeError {
    fn from(value: ValidationReport) -> Self {
        EncodeError::ValidationFailed(value)
    }
}

impl std::fmt::Display for NameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NameError::TooManyClasses(n) => {
                write!(f, "{n} classes declared, at most 256 are allowed")
            }
            NameError::ReservedName { name, index } => {
                write!(f, "reserved name '{name}' used for slot {index}")
            }
            NameError::DuplicateName(name) => write!(f, "name '{name}' declared twice"),
            NameError::UnknownName(name) => write!(f, "no index for name '{name}'"),
        }
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::InsufficientBytes {
                context,
                offset,
                needed,
                available,
            } => write!(
                f,
                "insufficient bytes reading {context} at offset {offset}: needed {needed}, {available} available"
            ),
            DecodeError::OffsetOutOfBounds { field, offset, len } => {
                write!(f, "{field} {offset} is outside the subtable ({len} bytes)")
            }
            DecodeError::TooFewClasses(n) => {
                write!(f, "{n} classes is fewer than the 4 reserved classes")
            }
            DecodeError::TooManyClasses(n) => write!(f, "{n} classes, at most 256 are allowed"),
            DecodeError::InvalidClassTableFormat(format) => {
                write!(f, "unknown class table format {format}")
            }
            DecodeError::InvalidSegment { first, last } => {
                write!(f, "class table segment {first}..={last} is reversed")
            }
            DecodeError::ClassIndexOutOfRange {
                glyph,
                class,
                num_classes,
            } => write!(
                f,
                "glyph {glyph} has class {class}, but there are only {num_classes} classes"
            ),
            DecodeError::GlyphOutOfRange { glyph, glyph_count } => {
                write!(f, "glyph {glyph} is not less than the glyph count {glyph_count}")
            }
            DecodeError::MisalignedStateOffset { entry, offset } => write!(
                f,
                "entry {entry} new state offset {offset} is not the start of a state"
            ),
            DecodeError::EntryIndexOutOfRange {
                state,
                class,
                index,
                num_entries,
            } => write!(
                f,
                "state {state} class {class} uses entry {index}, but there are only {num_entries} entries"
            ),
            DecodeError::EmptyEntryTable => write!(f, "the entry table is empty"),
            DecodeError::InvalidPayloadOffset { entry, offset } => {
                write!(f, "entry {entry} payload offset {offset} is invalid")
            }
            DecodeError::MissingTerminator { offset } => write!(
                f,
                "kerning value list at offset {offset} has no terminating value"
            ),
            DecodeError::InvalidNameStash(msg) => write!(f, "invalid name data: {msg}"),
            DecodeError::Names(err) => err.fmt(f),
        }
    }
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::ValidationFailed(report) => report.fmt(f),
            EncodeError::OffsetOverflow { field, value } => {
                write!(f, "{field} value {value} does not fit in its field")
            }
            EncodeError::Names(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for NameError {}
impl std::error::Error for DecodeError {}
impl std::error::Error for EncodeError {}
