//! In-tuple slot layout.
//!
//! Fixed-width types occupy exactly `ValueType::fixed_length` bytes,
//! little-endian, with the type's null sentinel marking null.
//!
//! Variable-length types come in two shapes:
//!
//! - inline: `[i32 length][payload, zero padded to the slot end]`
//! - out-of-line: an 8 byte descriptor `[i32 length][u32 pool slot + 1]`,
//!   where 0 means no storage so a zeroed buffer owns nothing
//!
//! A length of -1 marks null in both shapes. An out-of-line descriptor
//! keeps referencing its pool slot while null, and later writes reuse that
//! slot instead of allocating again.

use crate::access::value::decimal::Decimal;
use crate::access::value::{
    Value, ValueType, BOOLEAN_NULL, DECIMAL_NULL, DOUBLE_NULL, INT16_NULL, INT32_NULL,
    INT64_NULL, INT8_NULL, OBJECT_NULL_LENGTH,
};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::pool::{Pool, VarlenRef};
use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;

/// Bytes taken by an out-of-line descriptor inside the tuple buffer.
pub const OBJECT_DESCRIPTOR_LENGTH: usize = 8;
/// Bytes taken by the length prefix of an inline object.
pub const OBJECT_LENGTH_PREFIX: usize = 4;

const NO_STORAGE: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ObjectDescriptor {
    length: i32,
    storage: Option<VarlenRef>,
}

fn read_descriptor(slot: &[u8]) -> ObjectDescriptor {
    let length = LittleEndian::read_i32(&slot[0..4]);
    let storage = match LittleEndian::read_u32(&slot[4..8]) {
        NO_STORAGE => None,
        index => Some(VarlenRef(index - 1)),
    };
    ObjectDescriptor { length, storage }
}

fn write_descriptor(slot: &mut [u8], descriptor: ObjectDescriptor) {
    LittleEndian::write_i32(&mut slot[0..4], descriptor.length);
    let storage = descriptor.storage.map_or(NO_STORAGE, |r| r.0 + 1);
    LittleEndian::write_u32(&mut slot[4..8], storage);
}

fn write_inline_object(slot: &mut [u8], payload: Option<&[u8]>) -> StorageResult<()> {
    let capacity = slot.len() - OBJECT_LENGTH_PREFIX;
    let (prefix, body) = slot.split_at_mut(OBJECT_LENGTH_PREFIX);
    match payload {
        Some(bytes) => {
            if bytes.len() > capacity {
                return Err(StorageError::ObjectTooLong {
                    length: bytes.len(),
                    max_length: capacity,
                });
            }
            LittleEndian::write_i32(prefix, bytes.len() as i32);
            body[..bytes.len()].copy_from_slice(bytes);
            body[bytes.len()..].fill(0);
        }
        None => {
            LittleEndian::write_i32(prefix, OBJECT_NULL_LENGTH);
            body.fill(0);
        }
    }
    Ok(())
}

impl Value {
    /// Write the null of `value_type` into a slot. Never allocates.
    pub(crate) fn write_null_to_slot(value_type: ValueType, slot: &mut [u8], is_inlined: bool) {
        match value_type {
            ValueType::TinyInt => slot[0] = INT8_NULL as u8,
            ValueType::Boolean => slot[0] = BOOLEAN_NULL as u8,
            ValueType::SmallInt => LittleEndian::write_i16(slot, INT16_NULL),
            ValueType::Integer => LittleEndian::write_i32(slot, INT32_NULL),
            ValueType::BigInt | ValueType::Timestamp => LittleEndian::write_i64(slot, INT64_NULL),
            ValueType::Double => LittleEndian::write_f64(slot, DOUBLE_NULL),
            ValueType::Decimal => LittleEndian::write_i128(slot, DECIMAL_NULL),
            ValueType::Varchar | ValueType::Varbinary => {
                if is_inlined {
                    // Nulls always fit
                    let _ = write_inline_object(slot, None);
                } else {
                    write_descriptor(
                        slot,
                        ObjectDescriptor {
                            length: OBJECT_NULL_LENGTH,
                            storage: None,
                        },
                    );
                }
            }
        }
    }

    /// Write a scalar into its inline slot. Returns false for objects.
    fn write_scalar_to_slot(&self, slot: &mut [u8]) -> bool {
        match self {
            Value::TinyInt(v) => slot[0] = *v as u8,
            Value::Boolean(v) => slot[0] = *v as u8,
            Value::SmallInt(v) => LittleEndian::write_i16(slot, *v),
            Value::Integer(v) => LittleEndian::write_i32(slot, *v),
            Value::BigInt(v) | Value::Timestamp(v) => LittleEndian::write_i64(slot, *v),
            Value::Double(v) => LittleEndian::write_f64(slot, *v),
            Value::Decimal(v) => LittleEndian::write_i128(slot, v.unscaled()),
            Value::Null(_) | Value::Varchar(_) | Value::Varbinary(_) => return false,
        }
        true
    }

    /// Write this value into a column slot, allocating out-of-line storage
    /// of `max_length` bytes from `pool` when the column is not inlined.
    ///
    /// The value must already have the column's type.
    pub fn serialize_with_allocation(
        &self,
        slot: &mut [u8],
        is_inlined: bool,
        max_length: usize,
        pool: &Pool,
    ) -> StorageResult<()> {
        if let Value::Null(value_type) = self {
            if is_inlined || !value_type.is_variable_length() {
                Value::write_null_to_slot(*value_type, slot, is_inlined);
            } else {
                let storage = read_descriptor(slot).storage;
                write_descriptor(
                    slot,
                    ObjectDescriptor {
                        length: OBJECT_NULL_LENGTH,
                        storage,
                    },
                );
            }
            return Ok(());
        }
        if self.write_scalar_to_slot(slot) {
            return Ok(());
        }

        let bytes = match self {
            Value::Varchar(bytes) | Value::Varbinary(bytes) => bytes,
            _ => unreachable!("scalars are written above"),
        };
        if is_inlined {
            return write_inline_object(slot, Some(&bytes[..]));
        }
        if bytes.len() > max_length {
            return Err(StorageError::ObjectTooLong {
                length: bytes.len(),
                max_length,
            });
        }

        // Reuse the slot this descriptor already owns
        let owned = read_descriptor(slot)
            .storage
            .and_then(|storage| pool.capacity(storage).map(|capacity| (storage, capacity)));
        let storage = match owned {
            Some((storage, capacity)) if capacity >= bytes.len() => storage,
            Some((storage, _)) => {
                pool.free(storage);
                pool.allocate(max_length)
            }
            None => pool.allocate(max_length),
        };
        pool.write(storage, bytes)?;
        write_descriptor(
            slot,
            ObjectDescriptor {
                length: bytes.len() as i32,
                storage: Some(storage),
            },
        );
        Ok(())
    }

    /// Write this value into a column slot without allocating. Out-of-line
    /// payloads go into the pool slot the existing descriptor references.
    ///
    /// Returns false when a non-null out-of-line value has no storage to
    /// land in.
    pub fn serialize_in_place(
        &self,
        slot: &mut [u8],
        is_inlined: bool,
        pool: &Pool,
    ) -> StorageResult<bool> {
        let is_object = self.value_type().is_variable_length();
        if is_inlined || !is_object {
            self.serialize_with_allocation(slot, is_inlined, 0, pool)?;
            return Ok(true);
        }

        let descriptor = read_descriptor(slot);
        let payload = match self {
            Value::Varchar(bytes) | Value::Varbinary(bytes) => Some(bytes),
            _ => None,
        };

        match (payload, descriptor.storage) {
            (None, storage) => {
                write_descriptor(
                    slot,
                    ObjectDescriptor {
                        length: OBJECT_NULL_LENGTH,
                        storage,
                    },
                );
                Ok(true)
            }
            (Some(_), None) => Ok(false),
            (Some(bytes), Some(storage)) => {
                pool.write(storage, bytes)?;
                write_descriptor(
                    slot,
                    ObjectDescriptor {
                        length: bytes.len() as i32,
                        storage: Some(storage),
                    },
                );
                Ok(true)
            }
        }
    }

    /// Decode the value stored in a column slot. Out-of-line payloads are
    /// returned as shared handles to the pool's bytes.
    ///
    /// Panics if an out-of-line descriptor references freed pool storage.
    pub fn read_from_slot(value_type: ValueType, slot: &[u8], is_inlined: bool, pool: &Pool) -> Value {
        let null = Value::Null(value_type);
        match value_type {
            ValueType::TinyInt => match slot[0] as i8 {
                INT8_NULL => null,
                v => Value::TinyInt(v),
            },
            ValueType::Boolean => match slot[0] as i8 {
                BOOLEAN_NULL => null,
                v => Value::Boolean(v != 0),
            },
            ValueType::SmallInt => match LittleEndian::read_i16(slot) {
                INT16_NULL => null,
                v => Value::SmallInt(v),
            },
            ValueType::Integer => match LittleEndian::read_i32(slot) {
                INT32_NULL => null,
                v => Value::Integer(v),
            },
            ValueType::BigInt => match LittleEndian::read_i64(slot) {
                INT64_NULL => null,
                v => Value::BigInt(v),
            },
            ValueType::Timestamp => match LittleEndian::read_i64(slot) {
                INT64_NULL => null,
                v => Value::Timestamp(v),
            },
            ValueType::Double => {
                let v = LittleEndian::read_f64(slot);
                if v <= DOUBLE_NULL {
                    null
                } else {
                    Value::Double(v)
                }
            }
            ValueType::Decimal => match LittleEndian::read_i128(slot) {
                DECIMAL_NULL => null,
                v => Value::Decimal(Decimal::from_unscaled_unchecked(v)),
            },
            ValueType::Varchar | ValueType::Varbinary => {
                let payload = if is_inlined {
                    read_inline_object(slot)
                } else {
                    read_out_of_line_object(slot, pool)
                };
                match (payload, value_type) {
                    (None, _) => null,
                    (Some(bytes), ValueType::Varchar) => Value::Varchar(bytes),
                    (Some(bytes), _) => Value::Varbinary(bytes),
                }
            }
        }
    }

    /// Release the pool storage referenced by an out-of-line slot and leave
    /// a null descriptor behind.
    pub fn free_uninlined_data(slot: &mut [u8], pool: &Pool) {
        let descriptor = read_descriptor(slot);
        if let Some(storage) = descriptor.storage {
            pool.free(storage);
        }
        write_descriptor(
            slot,
            ObjectDescriptor {
                length: OBJECT_NULL_LENGTH,
                storage: None,
            },
        );
    }

    /// Forget the pool slot of an out-of-line column without freeing it,
    /// leaving a null descriptor. Returns the slot it referenced.
    pub(crate) fn detach_storage(slot: &mut [u8]) -> Option<VarlenRef> {
        let storage = read_descriptor(slot).storage;
        write_descriptor(
            slot,
            ObjectDescriptor {
                length: OBJECT_NULL_LENGTH,
                storage: None,
            },
        );
        storage
    }

    /// Write a null descriptor that owns `storage`, so the next write to
    /// the column lands there.
    pub(crate) fn attach_storage(slot: &mut [u8], storage: Option<VarlenRef>) {
        write_descriptor(
            slot,
            ObjectDescriptor {
                length: OBJECT_NULL_LENGTH,
                storage,
            },
        );
    }
}

fn read_inline_object(slot: &[u8]) -> Option<Bytes> {
    let length = LittleEndian::read_i32(&slot[..OBJECT_LENGTH_PREFIX]);
    if length < 0 {
        return None;
    }
    let start = OBJECT_LENGTH_PREFIX;
    Some(Bytes::copy_from_slice(&slot[start..start + length as usize]))
}

fn read_out_of_line_object(slot: &[u8], pool: &Pool) -> Option<Bytes> {
    let descriptor = read_descriptor(slot);
    if descriptor.length < 0 {
        return None;
    }
    let Some(storage) = descriptor.storage else {
        panic!("non-null object descriptor without pool storage");
    };
    match pool.get(storage) {
        Some(bytes) => Some(bytes),
        None => panic!("object descriptor references freed pool slot {}", storage.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_round_trip() -> StorageResult<()> {
        let pool = Pool::new();
        let cases = [
            (ValueType::TinyInt, Value::TinyInt(-5)),
            (ValueType::SmallInt, Value::SmallInt(1234)),
            (ValueType::Integer, Value::Integer(-70000)),
            (ValueType::BigInt, Value::BigInt(1 << 40)),
            (ValueType::Timestamp, Value::Timestamp(1_700_000_000_000_000)),
            (ValueType::Double, Value::Double(-0.25)),
            (ValueType::Decimal, Value::Decimal("3.14".parse()?)),
            (ValueType::Boolean, Value::Boolean(true)),
        ];

        for (value_type, value) in cases {
            let length = value_type.fixed_length().unwrap();
            let mut slot = vec![0u8; length];
            value.serialize_with_allocation(&mut slot, true, length, &pool)?;
            let read = Value::read_from_slot(value_type, &slot, true, &pool);
            assert_eq!(read.compare(&value), std::cmp::Ordering::Equal, "{:?}", value_type);

            Value::write_null_to_slot(value_type, &mut slot, true);
            assert!(Value::read_from_slot(value_type, &slot, true, &pool).is_null());
        }
        assert_eq!(pool.live_allocations(), 0);
        Ok(())
    }

    #[test]
    fn test_inline_object() -> StorageResult<()> {
        let pool = Pool::new();
        let mut slot = vec![0xEEu8; OBJECT_LENGTH_PREFIX + 8];
        Value::varchar("abc").serialize_with_allocation(&mut slot, true, 8, &pool)?;

        assert_eq!(&slot[..4], &3i32.to_le_bytes());
        assert_eq!(&slot[4..], b"abc\0\0\0\0\0");
        match Value::read_from_slot(ValueType::Varchar, &slot, true, &pool) {
            Value::Varchar(bytes) => assert_eq!(&bytes[..], b"abc"),
            other => panic!("unexpected {:?}", other),
        }

        let err = Value::varchar("123456789")
            .serialize_with_allocation(&mut slot, true, 8, &pool)
            .unwrap_err();
        assert!(matches!(err, StorageError::ObjectTooLong { length: 9, max_length: 8 }));
        assert_eq!(pool.live_allocations(), 0);
        Ok(())
    }

    #[test]
    fn test_out_of_line_object_allocates_declared_length() -> StorageResult<()> {
        let pool = Pool::new();
        let mut slot = vec![0u8; OBJECT_DESCRIPTOR_LENGTH];
        Value::varbinary(b"\x01\x02").serialize_with_allocation(&mut slot, false, 100, &pool)?;

        assert_eq!(pool.allocated_bytes(), 100);
        match Value::read_from_slot(ValueType::Varbinary, &slot, false, &pool) {
            Value::Varbinary(bytes) => assert_eq!(&bytes[..], b"\x01\x02"),
            other => panic!("unexpected {:?}", other),
        }

        let err = Value::varbinary(&[0; 101])
            .serialize_with_allocation(&mut slot, false, 100, &pool)
            .unwrap_err();
        assert!(matches!(err, StorageError::ObjectTooLong { .. }));
        Ok(())
    }

    #[test]
    fn test_in_place_reuses_storage() -> StorageResult<()> {
        let pool = Pool::new();
        let mut slot = vec![0u8; OBJECT_DESCRIPTOR_LENGTH];
        Value::write_null_to_slot(ValueType::Varchar, &mut slot, false);
        assert!(!Value::varchar("x").serialize_in_place(&mut slot, false, &pool)?);

        Value::varchar("first").serialize_with_allocation(&mut slot, false, 16, &pool)?;
        Value::null_of(ValueType::Varchar).serialize_in_place(&mut slot, false, &pool)?;
        assert!(Value::read_from_slot(ValueType::Varchar, &slot, false, &pool).is_null());

        assert!(Value::varchar("second").serialize_in_place(&mut slot, false, &pool)?);
        assert_eq!(pool.live_allocations(), 1);
        assert_eq!(
            Value::read_from_slot(ValueType::Varchar, &slot, false, &pool).to_string(),
            "second"
        );
        Ok(())
    }

    #[test]
    fn test_overwrite_reuses_owned_slot() -> StorageResult<()> {
        let pool = Pool::new();
        let mut slot = vec![0u8; OBJECT_DESCRIPTOR_LENGTH];
        assert_eq!(read_descriptor(&slot).storage, None);

        for i in 0..100 {
            Value::varchar(&format!("value {}", i))
                .serialize_with_allocation(&mut slot, false, 32, &pool)?;
        }
        Value::null_of(ValueType::Varchar).serialize_with_allocation(&mut slot, false, 32, &pool)?;
        assert_eq!(pool.live_allocations(), 1);
        assert!(read_descriptor(&slot).storage.is_some());

        Value::free_uninlined_data(&mut slot, &pool);
        assert_eq!(pool.live_allocations(), 0);
        Ok(())
    }

    #[test]
    fn test_detach_and_attach() -> StorageResult<()> {
        let pool = Pool::new();
        let mut slot = vec![0u8; OBJECT_DESCRIPTOR_LENGTH];
        Value::varchar("kept").serialize_with_allocation(&mut slot, false, 8, &pool)?;

        let storage = Value::detach_storage(&mut slot);
        assert!(storage.is_some());
        assert!(Value::read_from_slot(ValueType::Varchar, &slot, false, &pool).is_null());
        assert_eq!(pool.live_allocations(), 1);

        Value::attach_storage(&mut slot, storage);
        Value::varchar("again").serialize_with_allocation(&mut slot, false, 8, &pool)?;
        assert_eq!(pool.live_allocations(), 1);
        assert_eq!(read_descriptor(&slot).storage, storage);
        Ok(())
    }

    #[test]
    fn test_free_uninlined_data() -> StorageResult<()> {
        let pool = Pool::new();
        let mut slot = vec![0u8; OBJECT_DESCRIPTOR_LENGTH];
        Value::varchar("gone").serialize_with_allocation(&mut slot, false, 8, &pool)?;
        assert_eq!(pool.live_allocations(), 1);

        Value::free_uninlined_data(&mut slot, &pool);
        assert_eq!(pool.live_allocations(), 0);
        assert!(Value::read_from_slot(ValueType::Varchar, &slot, false, &pool).is_null());

        // Freeing again is harmless
        Value::free_uninlined_data(&mut slot, &pool);
        Ok(())
    }
}
