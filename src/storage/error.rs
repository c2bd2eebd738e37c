//! Storage layer error types.

use crate::access::ValueType;
use thiserror::Error;

/// Errors that can occur while reading, writing or serializing tuples.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Unknown value type {value_type:?}: {message}")]
    UnknownType {
        value_type: ValueType,
        message: String,
    },

    #[error("Cannot cast {from:?} to {to:?}")]
    InvalidCast { from: ValueType, to: ValueType },

    #[error("Value out of range for {value_type:?}: {message}")]
    ValueOutOfRange {
        value_type: ValueType,
        message: String,
    },

    #[error("Object of {length} bytes exceeds the column limit of {max_length} bytes")]
    ObjectTooLong { length: usize, max_length: usize },

    #[error("Unexpected end of input: needed {needed} bytes but only {remaining} remain")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("Unknown type name: {0}")]
    UnknownTypeName(String),

    #[error("Invalid decimal: {0}")]
    InvalidDecimal(String),

    #[error("Column {column} is stored out of line and must be written with allocation")]
    OutOfLineWrite { column: usize },

    #[error("Column {column} has no out-of-line storage to deserialize into")]
    MissingStorage { column: usize },

    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
