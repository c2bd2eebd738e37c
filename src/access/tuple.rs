//! Schema-driven tuples over a fixed-layout byte buffer.
//!
//! A [`Tuple`] pairs a borrowed [`Schema`] with a buffer of exactly
//! `schema.tuple_length()` bytes. Inline columns live directly in the
//! buffer; out-of-line columns store a descriptor pointing into the tuple's
//! [`Pool`]. The tuple never frees pool memory on its own: call
//! [`Tuple::free_uninlined_data`] or reset the pool.

pub mod export;
pub mod key;

use crate::access::value::{Value, ValueType, MAX_DECIMAL_PRECISION};
use crate::catalog::Schema;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::pool::{Pool, VarlenRef};
use crate::storage::stream::{ExportSerializeOutput, SerializeInput, SerializeOutput};
use log::{debug, trace};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Deref, DerefMut, Range};

pub use export::serialize_export_row;
pub use key::{BuildTupleHasher, TupleHasher, TupleKey, TupleMap, TupleSet};

/// Backing storage of a bound tuple.
#[derive(Debug)]
pub enum TupleData<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a mut [u8]),
}

impl Deref for TupleData<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            TupleData::Owned(data) => data,
            TupleData::Borrowed(data) => data,
        }
    }
}

impl DerefMut for TupleData<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        match self {
            TupleData::Owned(data) => data,
            TupleData::Borrowed(data) => data,
        }
    }
}

#[derive(Debug)]
pub struct Tuple<'a> {
    schema: &'a Schema,
    pool: &'a Pool,
    data: Option<TupleData<'a>>,
}

impl<'a> Tuple<'a> {
    /// Owned tuple with every column set to null.
    pub fn new(schema: &'a Schema, pool: &'a Pool) -> Self {
        let mut tuple = Self {
            schema,
            pool,
            data: Some(TupleData::Owned(vec![0; schema.tuple_length()])),
        };
        tuple.set_all_nulls();
        tuple
    }

    /// Tuple with no buffer. Only `free_uninlined_data`, `is_bound` and
    /// rebinding through `move_to` are allowed on it.
    pub fn unbound(schema: &'a Schema, pool: &'a Pool) -> Self {
        Self {
            schema,
            pool,
            data: None,
        }
    }

    /// Owned tuple over raw inline bytes. Out-of-line descriptors in `data`
    /// must reference `pool`.
    pub fn from_bytes(schema: &'a Schema, pool: &'a Pool, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            schema.tuple_length(),
            "tuple buffer does not match the schema length"
        );
        Self {
            schema,
            pool,
            data: Some(TupleData::Owned(data)),
        }
    }

    /// Tuple viewing an externally owned buffer, e.g. a slice of a page.
    pub fn view(schema: &'a Schema, pool: &'a Pool, data: &'a mut [u8]) -> Self {
        let mut tuple = Self::unbound(schema, pool);
        tuple.move_to(data);
        tuple
    }

    /// Owned tuple read from a row-store stream.
    pub fn deserialize(
        schema: &'a Schema,
        pool: &'a Pool,
        input: &mut SerializeInput<'_>,
    ) -> StorageResult<Self> {
        let mut tuple = Self::new(schema, pool);
        tuple.deserialize_from(input)?;
        Ok(tuple)
    }

    /// Rebind this tuple to another buffer.
    pub fn move_to(&mut self, data: &'a mut [u8]) {
        assert_eq!(
            data.len(),
            self.schema.tuple_length(),
            "tuple buffer does not match the schema length"
        );
        self.data = Some(TupleData::Borrowed(data));
    }

    pub fn is_bound(&self) -> bool {
        self.data.is_some()
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn pool(&self) -> &'a Pool {
        self.pool
    }

    /// Address of the buffer, null when unbound.
    pub fn location(&self) -> *const u8 {
        self.data
            .as_deref()
            .map_or(std::ptr::null(), <[u8]>::as_ptr)
    }

    /// Raw inline bytes.
    pub fn data(&self) -> &[u8] {
        self.buffer()
    }

    pub fn column_count(&self) -> usize {
        self.schema.column_count()
    }

    pub fn value_type(&self, column: usize) -> ValueType {
        self.schema.value_type(column)
    }

    fn buffer(&self) -> &[u8] {
        match &self.data {
            Some(data) => data,
            None => panic!("tuple is not bound to a buffer"),
        }
    }

    fn buffer_mut(&mut self) -> &mut [u8] {
        match &mut self.data {
            Some(data) => data,
            None => panic!("tuple is not bound to a buffer"),
        }
    }

    /// Byte range of a column inside the buffer. Every slot access goes
    /// through here.
    fn column_slot(&self, column: usize) -> Range<usize> {
        let offset = self.schema.offset(column);
        offset..offset + self.schema.length(column)
    }

    fn slot(&self, column: usize) -> &[u8] {
        let range = self.column_slot(column);
        &self.buffer()[range]
    }

    fn slot_mut(&mut self, column: usize) -> &mut [u8] {
        let range = self.column_slot(column);
        &mut self.buffer_mut()[range]
    }

    pub fn get_value(&self, column: usize) -> Value {
        Value::read_from_slot(
            self.schema.value_type(column),
            self.slot(column),
            self.schema.is_column_inlined(column),
            self.pool,
        )
    }

    pub fn is_null(&self, column: usize) -> bool {
        self.get_value(column).is_null()
    }

    /// Write `value` into an inline column. Out-of-line columns only accept
    /// nulls here; use [`Tuple::set_value_allocate`] for their payloads.
    pub fn set_value(&mut self, column: usize, value: &Value) -> StorageResult<()> {
        let value = value.cast_as(self.schema.value_type(column))?;
        let is_inlined = self.schema.is_column_inlined(column);
        if !is_inlined && !value.is_null() {
            return Err(StorageError::OutOfLineWrite { column });
        }

        let length = self.schema.length(column);
        let pool = self.pool;
        value.serialize_with_allocation(self.slot_mut(column), is_inlined, length, pool)
    }

    /// Write `value` into any column, allocating pool storage sized to the
    /// column's declared maximum when it is stored out of line.
    pub fn set_value_allocate(&mut self, column: usize, value: &Value) -> StorageResult<()> {
        let schema = self.schema;
        let value = value.cast_as(schema.value_type(column))?;
        let is_inlined = schema.is_column_inlined(column);
        let length = if is_inlined {
            schema.length(column)
        } else {
            schema.variable_length(column)
        };

        let pool = self.pool;
        value.serialize_with_allocation(self.slot_mut(column), is_inlined, length, pool)
    }

    /// Deep copy of `source` into this tuple.
    ///
    /// The inline footprint is copied first, descriptors included. The
    /// copied descriptors still point at the source's out-of-line storage,
    /// so each one is swapped back for the slot this tuple owned before the
    /// copy (or none) and the payload re-read through the source is written
    /// there. Nothing may read this tuple between the two phases.
    ///
    /// Panics if the two schemas do not describe the same layout.
    pub fn copy_from(&mut self, source: &Tuple<'_>) -> StorageResult<()> {
        assert!(
            std::ptr::eq(self.schema, source.schema) || self.schema.layout_eq(source.schema),
            "copy between tuples of different schemas"
        );

        let owned = self.detach_uninlined();
        self.buffer_mut().copy_from_slice(source.buffer());
        if self.schema.is_inlined() {
            return Ok(());
        }

        let values = self
            .schema
            .uninlined_columns()
            .iter()
            .map(|&column| source.get_value(column))
            .collect();
        self.rematerialize_uninlined(owned, values)?;
        trace!(
            "Copied tuple with {} out-of-line columns",
            self.schema.uninlined_column_count()
        );
        Ok(())
    }

    /// Deep copy of raw inline bytes whose descriptors reference this
    /// tuple's pool. Same two phases as [`Tuple::copy_from`].
    pub fn copy_from_bytes(&mut self, source: &[u8]) -> StorageResult<()> {
        assert_eq!(
            source.len(),
            self.schema.tuple_length(),
            "source buffer does not match the schema length"
        );

        let owned = self.detach_uninlined();
        self.buffer_mut().copy_from_slice(source);
        let values = self
            .schema
            .uninlined_columns()
            .iter()
            .map(|&column| self.get_value(column))
            .collect();
        self.rematerialize_uninlined(owned, values)
    }

    /// Null out every out-of-line descriptor, returning the slots they
    /// owned without freeing them.
    fn detach_uninlined(&mut self) -> Vec<Option<VarlenRef>> {
        let schema = self.schema;
        schema
            .uninlined_columns()
            .iter()
            .map(|&column| Value::detach_storage(self.slot_mut(column)))
            .collect()
    }

    /// Give each out-of-line column back its own slot, then write `values`
    /// into them, allocating only where no slot was owned.
    fn rematerialize_uninlined(
        &mut self,
        owned: Vec<Option<VarlenRef>>,
        values: Vec<Value>,
    ) -> StorageResult<()> {
        let schema = self.schema;
        let columns = schema.uninlined_columns().iter();
        for ((&column, storage), value) in columns.zip(owned).zip(values) {
            Value::attach_storage(self.slot_mut(column), storage);
            self.set_value_allocate(column, &value)?;
        }
        Ok(())
    }

    fn serialize_columns(&self, output: &mut SerializeOutput) {
        for column in 0..self.column_count() {
            self.get_value(column).serialize_to(output);
        }
    }

    /// Write `[i32 length][columns...]`, reserving the length up front.
    pub fn serialize_to(&self, output: &mut SerializeOutput) {
        let start = output.reserve_bytes(4);
        self.serialize_columns(output);
        let size = output.position() - start - 4;
        output.write_int_at(start, size as i32);
    }

    /// Same format as [`Tuple::serialize_to`], writing a placeholder length
    /// and patching it afterwards.
    pub fn serialize_with_header_to(&self, output: &mut SerializeOutput) {
        let start = output.position();
        output.write_int(0);
        self.serialize_columns(output);
        let size = output.position() - start - 4;
        output.write_int_at(start, size as i32);
    }

    /// Read a row written by [`Tuple::serialize_to`], allocating fresh pool
    /// storage for out-of-line columns.
    pub fn deserialize_from(&mut self, input: &mut SerializeInput<'_>) -> StorageResult<()> {
        input.read_int()?;
        let schema = self.schema;
        let pool = self.pool;

        for column in 0..schema.column_count() {
            let value = Value::deserialize_from(input, schema.value_type(column))?;
            let is_inlined = schema.is_column_inlined(column);
            let length = if is_inlined {
                schema.length(column)
            } else {
                schema.variable_length(column)
            };
            value.serialize_with_allocation(self.slot_mut(column), is_inlined, length, pool)?;
        }
        Ok(())
    }

    /// Read a row into storage this tuple already references, without
    /// allocating. Returns the number of bytes consumed.
    pub fn deserialize_with_header_from(&mut self, input: &mut SerializeInput<'_>) -> StorageResult<usize> {
        input.read_int()?;
        let mut total_bytes = 4;
        let schema = self.schema;
        let pool = self.pool;

        for column in 0..schema.column_count() {
            let start = input.position();
            let value = Value::deserialize_from(input, schema.value_type(column))?;
            total_bytes += input.position() - start;

            let is_inlined = schema.is_column_inlined(column);
            if !value.serialize_in_place(self.slot_mut(column), is_inlined, pool)? {
                return Err(StorageError::MissingStorage { column });
            }
        }
        Ok(total_bytes)
    }

    /// Upper bound of the export body size, excluding the row header and
    /// null bitmap. Null columns of every type contribute nothing since the
    /// bitmap alone carries them. Consumers that budgeted 8 bytes for a null
    /// fixed-width column will see a smaller size here.
    pub fn export_serialization_size(&self) -> StorageResult<usize> {
        let mut bytes = 0;
        for column in 0..self.column_count() {
            let value_type = self.value_type(column);
            if value_type == ValueType::Boolean {
                return Err(StorageError::UnknownType {
                    value_type,
                    message: "Unknown ValueType found during Export serialization.".to_string(),
                });
            }

            let value = self.get_value(column);
            if value.is_null() {
                continue;
            }
            match value_type {
                ValueType::TinyInt
                | ValueType::SmallInt
                | ValueType::Integer
                | ValueType::BigInt
                | ValueType::Timestamp
                | ValueType::Double => bytes += std::mem::size_of::<i64>(),
                // length + max precision digits + radix point + sign
                ValueType::Decimal => bytes += std::mem::size_of::<i32>() + MAX_DECIMAL_PRECISION + 1 + 1,
                ValueType::Varchar | ValueType::Varbinary => {
                    bytes += std::mem::size_of::<i32>() + value.object_length().unwrap_or(0);
                }
                ValueType::Boolean => unreachable!("rejected above"),
            }
        }
        Ok(bytes)
    }

    /// Write the export body. Null columns write nothing and set bit
    /// `column_offset + column` of `null_bitmap`, most significant bit
    /// first within each byte.
    ///
    /// Panics if `null_bitmap` has fewer than `column_offset + column_count`
    /// bits.
    pub fn serialize_to_export(
        &self,
        output: &mut ExportSerializeOutput,
        column_offset: usize,
        null_bitmap: &mut [u8],
    ) -> StorageResult<()> {
        let bits_needed = column_offset + self.column_count();
        assert!(
            null_bitmap.len() * 8 >= bits_needed,
            "null bitmap of {} bytes cannot hold column_offset + column_count = {} bits",
            null_bitmap.len(),
            bits_needed
        );

        for column in 0..self.column_count() {
            let value = self.get_value(column);
            if value.is_null() {
                let index = column_offset + column;
                let byte = index >> 3;
                let bit = index % 8;
                let mask = 0x80u8 >> bit;
                null_bitmap[byte] |= mask;
                continue;
            }
            value.serialize_to_export(output)?;
        }
        Ok(())
    }

    /// Pool bytes referenced by non-null out-of-line objects, counting a
    /// 4-byte length for each.
    pub fn uninlined_memory_size(&self) -> usize {
        if self.schema.is_inlined() {
            return 0;
        }

        (0..self.column_count())
            .filter(|&column| {
                self.value_type(column).is_variable_length() && !self.schema.is_column_inlined(column)
            })
            .filter_map(|column| self.get_value(column).object_length())
            .map(|length| std::mem::size_of::<i32>() + length)
            .sum()
    }

    /// Column-wise equality, assuming `other` has a compatible schema.
    pub fn equals_no_schema_check(&self, other: &Tuple<'_>) -> bool {
        (0..self.column_count())
            .all(|column| self.get_value(column).compare(&other.get_value(column)) == Ordering::Equal)
    }

    /// Lexicographic comparison over columns in declaration order.
    pub fn compare(&self, other: &Tuple<'_>) -> Ordering {
        for column in 0..self.column_count() {
            let diff = self.get_value(column).compare(&other.get_value(column));
            if diff != Ordering::Equal {
                return diff;
            }
        }
        Ordering::Equal
    }

    pub fn hash_code_with_seed(&self, mut seed: u64) -> u64 {
        for column in 0..self.column_count() {
            self.get_value(column).hash_combine(&mut seed);
        }
        seed
    }

    pub fn hash_code(&self) -> u64 {
        self.hash_code_with_seed(0)
    }

    /// Reset every column to null. Out-of-line descriptors forget their
    /// pool slots without freeing them; call
    /// [`Tuple::free_uninlined_data`] first to release them.
    pub fn set_all_nulls(&mut self) {
        let schema = self.schema;
        for column in 0..schema.column_count() {
            let value_type = schema.value_type(column);
            let is_inlined = schema.is_column_inlined(column);
            Value::write_null_to_slot(value_type, self.slot_mut(column), is_inlined);
        }
    }

    /// Return the pool storage of every out-of-line column. The columns
    /// read as null afterwards.
    pub fn free_uninlined_data(&mut self) {
        if self.data.is_none() {
            return;
        }

        let schema = self.schema;
        let pool = self.pool;
        for &column in schema.uninlined_columns() {
            Value::free_uninlined_data(self.slot_mut(column), pool);
        }
        debug!(
            "Released out-of-line data of {} columns",
            schema.uninlined_column_count()
        );
    }
}

impl PartialEq for Tuple<'_> {
    fn eq(&self, other: &Self) -> bool {
        if !std::ptr::eq(self.schema, other.schema) {
            return false;
        }
        self.equals_no_schema_check(other)
    }
}

impl fmt::Display for Tuple<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " @{} ", self.location() as usize)?;
        if self.is_bound() {
            for column in 0..self.column_count() {
                let value = self.get_value(column);
                if value.is_null() {
                    write!(f, "(<NULL>)")?;
                } else {
                    write!(f, "({})", value)?;
                }
            }
        }
        writeln!(f)
    }
}
