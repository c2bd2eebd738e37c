//! Tuple layout derived from a list of columns.

use crate::access::value::slot::{OBJECT_DESCRIPTOR_LENGTH, OBJECT_LENGTH_PREFIX};
use crate::access::ValueType;
use crate::catalog::column_info::ColumnInfo;
use crate::storage::error::StorageResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnLayout {
    value_type: ValueType,
    offset: usize,
    length: usize,
    variable_length: usize,
    is_inlined: bool,
}

/// Immutable description of a tuple shape: column types, slot offsets and
/// which columns are stored out of line.
///
/// Tuples borrow their schema, so one schema is shared by every tuple of a
/// table and must outlive them.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<ColumnInfo>,
    layout: Vec<ColumnLayout>,
    uninlined_columns: Vec<usize>,
    tuple_length: usize,
}

impl Schema {
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        let mut layout = Vec::with_capacity(columns.len());
        let mut uninlined_columns = Vec::new();
        let mut offset = 0;

        for (index, column) in columns.iter().enumerate() {
            let is_inlined = column.is_inlined();
            let declared = column.column_length as usize;
            let length = match column.column_type.fixed_length() {
                Some(fixed) => fixed,
                None if is_inlined => OBJECT_LENGTH_PREFIX + declared,
                None => OBJECT_DESCRIPTOR_LENGTH,
            };
            if !is_inlined {
                uninlined_columns.push(index);
            }

            layout.push(ColumnLayout {
                value_type: column.column_type,
                offset,
                length,
                variable_length: declared,
                is_inlined,
            });
            offset += length;
        }

        Self {
            columns,
            layout,
            uninlined_columns,
            tuple_length: offset,
        }
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn column(&self, column: usize) -> &ColumnInfo {
        &self.columns[column]
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn value_type(&self, column: usize) -> ValueType {
        self.layout[column].value_type
    }

    pub fn offset(&self, column: usize) -> usize {
        self.layout[column].offset
    }

    /// Bytes the column occupies inside the tuple buffer.
    pub fn length(&self, column: usize) -> usize {
        self.layout[column].length
    }

    /// Declared maximum payload length of a variable-length column; the
    /// fixed width for scalars.
    pub fn variable_length(&self, column: usize) -> usize {
        self.layout[column].variable_length
    }

    pub fn is_column_inlined(&self, column: usize) -> bool {
        self.layout[column].is_inlined
    }

    /// True when no column is stored out of line.
    pub fn is_inlined(&self) -> bool {
        self.uninlined_columns.is_empty()
    }

    pub fn uninlined_column_count(&self) -> usize {
        self.uninlined_columns.len()
    }

    pub fn uninlined_column_index(&self, index: usize) -> usize {
        self.uninlined_columns[index]
    }

    pub fn uninlined_columns(&self) -> &[usize] {
        &self.uninlined_columns
    }

    /// Total inline footprint of a tuple.
    pub fn tuple_length(&self) -> usize {
        self.tuple_length
    }

    /// Whether tuples of `other` have exactly the same byte layout.
    pub fn layout_eq(&self, other: &Schema) -> bool {
        self.layout == other.layout
    }

    pub fn to_bytes(&self) -> StorageResult<Vec<u8>> {
        Ok(bincode::serialize(&self.columns)?)
    }

    pub fn from_bytes(data: &[u8]) -> StorageResult<Self> {
        let columns: Vec<ColumnInfo> = bincode::deserialize(data)?;
        Ok(Schema::new(columns))
    }
}
