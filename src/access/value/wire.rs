//! Stream encodings of a single value.
//!
//! Row-store (big-endian): TINYINT 1, SMALLINT 2, INTEGER 4, BIGINT and
//! TIMESTAMP 8, DOUBLE 8, DECIMAL 16, BOOLEAN 1, objects as `i32 length`
//! (-1 for null) followed by the payload. Null scalars are written as their
//! sentinel so the reader needs nothing but the column type.
//!
//! Export (little-endian): every integer type widened to 8 bytes, DOUBLE 8,
//! DECIMAL as length-prefixed ASCII, objects as length-prefixed bytes.
//! Nulls are not written at all; the export null bitmap carries them.

use crate::access::value::decimal::Decimal;
use crate::access::value::{
    Value, ValueType, BOOLEAN_NULL, DECIMAL_NULL, DOUBLE_NULL, INT16_NULL, INT32_NULL,
    INT64_NULL, INT8_NULL, OBJECT_NULL_LENGTH,
};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::stream::{ExportSerializeOutput, SerializeInput, SerializeOutput};
use bytes::Bytes;

fn write_i128(output: &mut SerializeOutput, value: i128) {
    output.write_long((value >> 64) as i64);
    output.write_long(value as i64);
}

fn read_i128(input: &mut SerializeInput<'_>) -> StorageResult<i128> {
    let high = input.read_long()?;
    let low = input.read_long()? as u64;
    Ok(((high as i128) << 64) | low as i128)
}

impl Value {
    pub fn serialize_to(&self, output: &mut SerializeOutput) {
        match self {
            Value::Null(value_type) => match value_type {
                ValueType::TinyInt => output.write_byte(INT8_NULL),
                ValueType::Boolean => output.write_byte(BOOLEAN_NULL),
                ValueType::SmallInt => output.write_short(INT16_NULL),
                ValueType::Integer => output.write_int(INT32_NULL),
                ValueType::BigInt | ValueType::Timestamp => output.write_long(INT64_NULL),
                ValueType::Double => output.write_double(DOUBLE_NULL),
                ValueType::Decimal => write_i128(output, DECIMAL_NULL),
                ValueType::Varchar | ValueType::Varbinary => output.write_int(OBJECT_NULL_LENGTH),
            },
            Value::TinyInt(v) => output.write_byte(*v),
            Value::Boolean(v) => output.write_byte(*v as i8),
            Value::SmallInt(v) => output.write_short(*v),
            Value::Integer(v) => output.write_int(*v),
            Value::BigInt(v) | Value::Timestamp(v) => output.write_long(*v),
            Value::Double(v) => output.write_double(*v),
            Value::Decimal(v) => write_i128(output, v.unscaled()),
            Value::Varchar(bytes) | Value::Varbinary(bytes) => {
                output.write_int(bytes.len() as i32);
                output.write_bytes(bytes);
            }
        }
    }

    /// Read one value of `value_type` written by [`Value::serialize_to`].
    pub fn deserialize_from(input: &mut SerializeInput<'_>, value_type: ValueType) -> StorageResult<Value> {
        let null = Value::Null(value_type);
        let value = match value_type {
            ValueType::TinyInt => match input.read_byte()? {
                INT8_NULL => null,
                v => Value::TinyInt(v),
            },
            ValueType::Boolean => match input.read_byte()? {
                BOOLEAN_NULL => null,
                v => Value::Boolean(v != 0),
            },
            ValueType::SmallInt => match input.read_short()? {
                INT16_NULL => null,
                v => Value::SmallInt(v),
            },
            ValueType::Integer => match input.read_int()? {
                INT32_NULL => null,
                v => Value::Integer(v),
            },
            ValueType::BigInt => match input.read_long()? {
                INT64_NULL => null,
                v => Value::BigInt(v),
            },
            ValueType::Timestamp => match input.read_long()? {
                INT64_NULL => null,
                v => Value::Timestamp(v),
            },
            ValueType::Double => {
                let v = input.read_double()?;
                if v <= DOUBLE_NULL {
                    null
                } else {
                    Value::Double(v)
                }
            }
            ValueType::Decimal => match read_i128(input)? {
                DECIMAL_NULL => null,
                v => Value::Decimal(Decimal::from_unscaled(v)?),
            },
            ValueType::Varchar | ValueType::Varbinary => {
                let length = input.read_int()?;
                if length < 0 {
                    null
                } else {
                    let bytes = Bytes::copy_from_slice(input.read_bytes(length as usize)?);
                    if value_type == ValueType::Varchar {
                        Value::Varchar(bytes)
                    } else {
                        Value::Varbinary(bytes)
                    }
                }
            }
        };
        Ok(value)
    }

    /// Write this value in export encoding. Nulls produce no bytes.
    pub fn serialize_to_export(&self, output: &mut ExportSerializeOutput) -> StorageResult<()> {
        if self.is_null() {
            return Ok(());
        }
        match self {
            Value::TinyInt(v) => output.write_long(*v as i64),
            Value::SmallInt(v) => output.write_long(*v as i64),
            Value::Integer(v) => output.write_long(*v as i64),
            Value::BigInt(v) | Value::Timestamp(v) => output.write_long(*v),
            Value::Double(v) => output.write_double(*v),
            Value::Decimal(v) => output.write_binary_string(v.to_string().as_bytes()),
            Value::Varchar(bytes) | Value::Varbinary(bytes) => output.write_binary_string(bytes),
            Value::Boolean(_) | Value::Null(_) => {
                return Err(StorageError::UnknownType {
                    value_type: self.value_type(),
                    message: "Unknown ValueType found during Export serialization.".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    fn round_trip(value: &Value) -> StorageResult<(Value, usize)> {
        let mut output = SerializeOutput::new();
        value.serialize_to(&mut output);
        let data = output.into_bytes();
        let mut input = SerializeInput::new(&data);
        let read = Value::deserialize_from(&mut input, value.value_type())?;
        assert!(!input.has_remaining());
        Ok((read, data.len()))
    }

    #[test]
    fn test_encoded_widths() -> StorageResult<()> {
        let cases = [
            (Value::TinyInt(1), 1),
            (Value::SmallInt(1), 2),
            (Value::Integer(1), 4),
            (Value::BigInt(1), 8),
            (Value::Timestamp(1), 8),
            (Value::Double(1.0), 8),
            (Value::Decimal(Decimal::from_i64(1)), 16),
            (Value::Boolean(false), 1),
            (Value::varchar("four"), 8),
            (Value::varbinary(b""), 4),
        ];
        for (value, width) in cases {
            let (read, written) = round_trip(&value)?;
            assert_eq!(written, width, "{:?}", value);
            assert_eq!(read.compare(&value), Ordering::Equal);
        }
        Ok(())
    }

    #[test]
    fn test_nulls_use_sentinels() -> StorageResult<()> {
        let mut output = SerializeOutput::new();
        Value::null_of(ValueType::Integer).serialize_to(&mut output);
        Value::null_of(ValueType::Varchar).serialize_to(&mut output);
        assert_eq!(output.data(), &[0x80, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF]);

        for value_type in [ValueType::Double, ValueType::Decimal, ValueType::Boolean] {
            let (read, _) = round_trip(&Value::null_of(value_type))?;
            assert!(read.is_null());
            assert_eq!(read.value_type(), value_type);
        }
        Ok(())
    }

    #[test]
    fn test_negative_decimal_round_trip() -> StorageResult<()> {
        let value = Value::Decimal("-12345.000000000001".parse()?);
        let (read, _) = round_trip(&value)?;
        assert_eq!(read.to_string(), "-12345.000000000001");
        Ok(())
    }

    #[test]
    fn test_truncated_object() {
        let mut output = SerializeOutput::new();
        output.write_int(10);
        output.write_bytes(b"short");
        let data = output.into_bytes();
        let mut input = SerializeInput::new(&data);
        assert!(Value::deserialize_from(&mut input, ValueType::Varchar).is_err());
    }

    #[test]
    fn test_export_encoding() -> StorageResult<()> {
        let mut output = ExportSerializeOutput::new();
        Value::SmallInt(-1).serialize_to_export(&mut output)?;
        assert_eq!(output.data(), &[0xFF; 8]);

        let mut output = ExportSerializeOutput::new();
        Value::Decimal("1.5".parse()?).serialize_to_export(&mut output)?;
        assert_eq!(&output.data()[..4], &14i32.to_le_bytes());
        assert_eq!(&output.data()[4..], b"1.500000000000");

        let mut output = ExportSerializeOutput::new();
        Value::null_of(ValueType::Varchar).serialize_to_export(&mut output)?;
        assert_eq!(output.position(), 0);

        let err = Value::Boolean(true)
            .serialize_to_export(&mut ExportSerializeOutput::new())
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownType { value_type: ValueType::Boolean, .. }));
        Ok(())
    }
}
