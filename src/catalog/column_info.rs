//! Column information and metadata structures.

use crate::access::ValueType;
use crate::storage::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Variable-length columns declared at least this long are stored out of
/// line.
pub const UNINLINEABLE_OBJECT_LENGTH: u32 = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub column_type: ValueType,
    /// Fixed width for scalar types, maximum payload length for objects
    pub column_length: u32,
    pub allow_inlined: bool,
}

impl ColumnInfo {
    /// Fixed-width column.
    ///
    /// Panics for variable-length types, which need a declared length.
    pub fn new(column_name: impl Into<String>, column_type: ValueType) -> Self {
        let Some(length) = column_type.fixed_length() else {
            panic!("{:?} columns need a declared length", column_type);
        };
        Self {
            column_name: column_name.into(),
            column_type,
            column_length: length as u32,
            allow_inlined: true,
        }
    }

    /// Variable-length column holding at most `max_length` bytes.
    pub fn variable(column_name: impl Into<String>, column_type: ValueType, max_length: u32) -> Self {
        Self {
            column_name: column_name.into(),
            column_type,
            column_length: max_length,
            allow_inlined: true,
        }
    }

    /// Force out-of-line storage regardless of the declared length.
    pub fn uninlined(mut self) -> Self {
        self.allow_inlined = false;
        self
    }

    /// Whether values of this column live inside the tuple buffer.
    pub fn is_inlined(&self) -> bool {
        !self.column_type.is_variable_length()
            || (self.allow_inlined && self.column_length < UNINLINEABLE_OBJECT_LENGTH)
    }
}

impl FromStr for ColumnInfo {
    type Err = StorageError;

    /// Parse `name:type`, `name:type(length)` or `name:type(length)!`, the
    /// trailing `!` forcing out-of-line storage.
    fn from_str(s: &str) -> StorageResult<Self> {
        let invalid = || StorageError::UnknownTypeName(s.to_string());

        let (name, spec) = s.split_once(':').ok_or_else(invalid)?;
        let (spec, force_uninlined) = match spec.strip_suffix('!') {
            Some(rest) => (rest, true),
            None => (spec, false),
        };
        let (type_name, length) = match spec.split_once('(') {
            Some((type_name, rest)) => {
                let length = rest
                    .strip_suffix(')')
                    .and_then(|l| l.trim().parse::<u32>().ok())
                    .ok_or_else(invalid)?;
                (type_name, Some(length))
            }
            None => (spec, None),
        };

        let column_type: ValueType = type_name.trim().parse()?;
        let column = match (column_type.is_variable_length(), length) {
            (true, Some(length)) => ColumnInfo::variable(name.trim(), column_type, length),
            (false, None) => ColumnInfo::new(name.trim(), column_type),
            _ => return Err(invalid()),
        };

        Ok(if force_uninlined {
            column.uninlined()
        } else {
            column
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_rule() {
        assert!(ColumnInfo::new("id", ValueType::BigInt).is_inlined());
        assert!(ColumnInfo::variable("code", ValueType::Varchar, 63).is_inlined());
        assert!(!ColumnInfo::variable("body", ValueType::Varchar, 64).is_inlined());
        assert!(!ColumnInfo::variable("tag", ValueType::Varbinary, 8)
            .uninlined()
            .is_inlined());
        // Scalars ignore the hint
        assert!(ColumnInfo::new("n", ValueType::Integer).uninlined().is_inlined());
    }

    #[test]
    fn test_parse_column_spec() -> StorageResult<()> {
        let column: ColumnInfo = "id:integer".parse()?;
        assert_eq!(column, ColumnInfo::new("id", ValueType::Integer));

        let column: ColumnInfo = "name:varchar(32)".parse()?;
        assert_eq!(column.column_length, 32);
        assert!(column.is_inlined());

        let column: ColumnInfo = "blob:varbinary(16)!".parse()?;
        assert!(!column.is_inlined());

        assert!("id".parse::<ColumnInfo>().is_err());
        assert!("name:varchar".parse::<ColumnInfo>().is_err());
        assert!("id:integer(4)".parse::<ColumnInfo>().is_err());
        assert!("x:blob".parse::<ColumnInfo>().is_err());
        Ok(())
    }
}
