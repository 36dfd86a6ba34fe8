//! Error types for codec operations

use crate::wire::WireType;
use thiserror::Error;

/// Error type for codec operations
#[derive(Error, Debug)]
pub enum Error {
    // Input ended early
    #[error("unexpected end of buffer")]
    Truncated,

    // Structurally invalid input
    #[error("extra data found: {0} bytes")]
    ExtraData(usize),
    #[error("invalid varint")]
    InvalidVarint,
    #[error("invalid tag: field number {0}")]
    InvalidTag(u64),
    #[error("invalid wire type: {0}")]
    InvalidWireType(u8),
    #[error("wire type mismatch for field {field}: expected {expected}, found {found}")]
    WireTypeMismatch {
        field: u32,
        expected: WireType,
        found: WireType,
    },
    #[error("invalid utf-8")]
    InvalidUtf8,
    #[error("unterminated group for field {0}")]
    UnterminatedGroup(u32),
    #[error("length exceeded: {0} > {1}")]
    LengthExceeded(usize, usize), // found, max
    #[error("recursion depth exceeded: {0}")]
    DepthExceeded(usize),
    #[error("unknown field {1} in {0}")]
    UnknownField(String, u32), // message, field number
    #[error("missing required field: {0}")]
    MissingRequired(String),

    // Schema definitions
    #[error("conflicting definition for {0}")]
    SchemaConflict(String),
    #[error("unknown schema: {0}")]
    UnknownSchema(String),
    #[error("invalid schema {0}: {1}")]
    InvalidSchema(String, String), // schema, reason

    // Values
    #[error("oneof violation in {0}: {1}")]
    OneofViolation(String, String), // message, group
    #[error("duplicate map key in {0}")]
    DuplicateMapKey(String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String), // context, message
}

impl Error {
    /// Returns true if the error describes structurally invalid wire input.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Error::ExtraData(_)
                | Error::InvalidVarint
                | Error::InvalidTag(_)
                | Error::InvalidWireType(_)
                | Error::WireTypeMismatch { .. }
                | Error::InvalidUtf8
                | Error::UnterminatedGroup(_)
                | Error::LengthExceeded(_, _)
                | Error::DepthExceeded(_)
                | Error::UnknownField(_, _)
                | Error::MissingRequired(_)
        )
    }
}
