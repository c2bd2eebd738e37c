//! Export row framing.
//!
//! An export row is `[i32 row length][null bitmap][body]`, little-endian.
//! The bitmap has one bit per column, most significant bit first, and the
//! row length covers the bitmap and the body but not itself.

use crate::access::tuple::Tuple;
use crate::storage::error::StorageResult;
use crate::storage::stream::ExportSerializeOutput;

/// Bytes of null bitmap needed for `column_count` columns.
pub fn null_bitmap_length(column_count: usize) -> usize {
    column_count.div_ceil(8)
}

/// Append one framed export row for `tuple`. Returns the number of bytes
/// written, header included.
pub fn serialize_export_row(tuple: &Tuple<'_>, output: &mut ExportSerializeOutput) -> StorageResult<usize> {
    let start = output.position();
    let mut null_bitmap = vec![0u8; null_bitmap_length(tuple.column_count())];

    let mut body = ExportSerializeOutput::with_capacity(tuple.export_serialization_size()?);
    tuple.serialize_to_export(&mut body, 0, &mut null_bitmap)?;

    output.write_int((null_bitmap.len() + body.position()) as i32);
    output.write_bytes(&null_bitmap);
    output.write_bytes(body.data());
    Ok(output.position() - start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::value::{Value, ValueType};
    use crate::catalog::{ColumnInfo, Schema};
    use crate::storage::error::StorageError;
    use crate::storage::pool::Pool;

    #[test]
    fn test_bitmap_length() {
        assert_eq!(null_bitmap_length(0), 0);
        assert_eq!(null_bitmap_length(1), 1);
        assert_eq!(null_bitmap_length(8), 1);
        assert_eq!(null_bitmap_length(9), 2);
    }

    #[test]
    fn test_all_null_row() -> StorageResult<()> {
        let columns = (0..8)
            .map(|i| ColumnInfo::new(format!("c{}", i), ValueType::Integer))
            .collect();
        let schema = Schema::new(columns);
        let pool = Pool::new();
        let tuple = Tuple::new(&schema, &pool);

        let mut output = ExportSerializeOutput::new();
        let written = serialize_export_row(&tuple, &mut output)?;
        assert_eq!(written, 4 + 1);
        assert_eq!(output.data(), &[1, 0, 0, 0, 0xFF]);
        Ok(())
    }

    #[test]
    fn test_mixed_row() -> StorageResult<()> {
        let schema = Schema::new(vec![
            ColumnInfo::new("a", ValueType::SmallInt),
            ColumnInfo::new("b", ValueType::Integer),
            ColumnInfo::new("c", ValueType::Integer),
            ColumnInfo::variable("d", ValueType::Varchar, 80),
            ColumnInfo::new("e", ValueType::Double),
        ]);
        let pool = Pool::new();
        let mut tuple = Tuple::new(&schema, &pool);
        tuple.set_value(0, &Value::SmallInt(3))?;
        tuple.set_value(1, &Value::Integer(-1))?;
        tuple.set_value_allocate(3, &Value::varchar("hi"))?;
        tuple.set_value(4, &Value::Double(0.5))?;

        let mut output = ExportSerializeOutput::new();
        serialize_export_row(&tuple, &mut output)?;
        let data = output.data();

        let body_length = 8 + 8 + (4 + 2) + 8;
        assert_eq!(&data[..4], &((1 + body_length) as i32).to_le_bytes());
        // Only column 2 is null
        assert_eq!(data[4], 0x20);
        assert_eq!(&data[5..13], &3i64.to_le_bytes());
        assert_eq!(&data[13..21], &(-1i64).to_le_bytes());
        assert_eq!(&data[21..25], &2i32.to_le_bytes());
        assert_eq!(&data[25..27], b"hi");
        assert_eq!(&data[27..35], &0.5f64.to_le_bytes());
        assert_eq!(data.len(), 35);
        Ok(())
    }

    #[test]
    fn test_boolean_columns_cannot_export() {
        let schema = Schema::new(vec![ColumnInfo::new("flag", ValueType::Boolean)]);
        let pool = Pool::new();
        let tuple = Tuple::new(&schema, &pool);

        let mut output = ExportSerializeOutput::new();
        let err = serialize_export_row(&tuple, &mut output).unwrap_err();
        assert!(matches!(err, StorageError::UnknownType { .. }));
        assert_eq!(output.position(), 0);
    }
}
