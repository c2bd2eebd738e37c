//! Typed column values.
//!
//! A [`Value`] is the unit the tuple layer moves in and out of column slots.
//! Everything type-specific lives here: null sentinels, casting, ordering,
//! hashing and the per-value encodings (see the `slot` and `wire`
//! submodules).

pub mod decimal;
pub mod slot;
pub mod wire;

use crate::storage::error::{StorageError, StorageResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::Hasher;
use std::str::FromStr;

pub use decimal::{Decimal, MAX_DECIMAL_PRECISION, MAX_DECIMAL_SCALE};

// Null sentinels as stored in tuple slots and on the row-store wire.
pub const INT8_NULL: i8 = i8::MIN;
pub const INT16_NULL: i16 = i16::MIN;
pub const INT32_NULL: i32 = i32::MIN;
pub const INT64_NULL: i64 = i64::MIN;
pub const DOUBLE_NULL: f64 = f64::MIN;
pub const DECIMAL_NULL: i128 = i128::MIN;
pub const BOOLEAN_NULL: i8 = i8::MIN;
pub const OBJECT_NULL_LENGTH: i32 = -1;

/// Column types supported by the storage engine
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    TinyInt = 3,
    SmallInt = 4,
    Integer = 5,
    BigInt = 6,
    Double = 8,
    Varchar = 9,
    Timestamp = 11,
    Decimal = 22,
    Boolean = 23,
    Varbinary = 25,
}

impl ValueType {
    /// Size of the inline representation, `None` for variable-length types.
    pub fn fixed_length(&self) -> Option<usize> {
        match self {
            ValueType::TinyInt | ValueType::Boolean => Some(1),
            ValueType::SmallInt => Some(2),
            ValueType::Integer => Some(4),
            ValueType::BigInt | ValueType::Timestamp | ValueType::Double => Some(8),
            ValueType::Decimal => Some(16),
            ValueType::Varchar | ValueType::Varbinary => None,
        }
    }

    pub fn is_variable_length(&self) -> bool {
        self.fixed_length().is_none()
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValueType::TinyInt => "tinyint",
            ValueType::SmallInt => "smallint",
            ValueType::Integer => "integer",
            ValueType::BigInt => "bigint",
            ValueType::Double => "double",
            ValueType::Varchar => "varchar",
            ValueType::Timestamp => "timestamp",
            ValueType::Decimal => "decimal",
            ValueType::Boolean => "boolean",
            ValueType::Varbinary => "varbinary",
        }
    }
}

impl FromStr for ValueType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tinyint" => Ok(ValueType::TinyInt),
            "smallint" => Ok(ValueType::SmallInt),
            "integer" | "int" => Ok(ValueType::Integer),
            "bigint" => Ok(ValueType::BigInt),
            "double" | "float" => Ok(ValueType::Double),
            "varchar" | "text" => Ok(ValueType::Varchar),
            "timestamp" => Ok(ValueType::Timestamp),
            "decimal" => Ok(ValueType::Decimal),
            "boolean" | "bool" => Ok(ValueType::Boolean),
            "varbinary" => Ok(ValueType::Varbinary),
            _ => Err(StorageError::UnknownTypeName(s.to_string())),
        }
    }
}

/// A single column value
#[derive(Debug, Clone)]
pub enum Value {
    Null(ValueType),
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    /// Microseconds since the Unix epoch
    Timestamp(i64),
    Double(f64),
    Decimal(Decimal),
    Boolean(bool),
    Varchar(Bytes),
    Varbinary(Bytes),
}

enum Numeric {
    Int(i64),
    Float(f64),
    Dec(Decimal),
}

impl Value {
    pub fn varchar(s: &str) -> Self {
        Value::Varchar(Bytes::copy_from_slice(s.as_bytes()))
    }

    pub fn varbinary(bytes: &[u8]) -> Self {
        Value::Varbinary(Bytes::copy_from_slice(bytes))
    }

    /// The canonical null of `value_type`.
    pub fn null_of(value_type: ValueType) -> Self {
        Value::Null(value_type)
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null(value_type) => *value_type,
            Value::TinyInt(_) => ValueType::TinyInt,
            Value::SmallInt(_) => ValueType::SmallInt,
            Value::Integer(_) => ValueType::Integer,
            Value::BigInt(_) => ValueType::BigInt,
            Value::Timestamp(_) => ValueType::Timestamp,
            Value::Double(_) => ValueType::Double,
            Value::Decimal(_) => ValueType::Decimal,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Varchar(_) => ValueType::Varchar,
            Value::Varbinary(_) => ValueType::Varbinary,
        }
    }

    /// True for explicit nulls and for scalars holding their type's null
    /// sentinel.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null(_) => true,
            Value::TinyInt(v) => *v == INT8_NULL,
            Value::SmallInt(v) => *v == INT16_NULL,
            Value::Integer(v) => *v == INT32_NULL,
            Value::BigInt(v) | Value::Timestamp(v) => *v == INT64_NULL,
            Value::Double(v) => *v <= DOUBLE_NULL,
            Value::Decimal(_) | Value::Boolean(_) | Value::Varchar(_) | Value::Varbinary(_) => false,
        }
    }

    /// Length of a variable-length payload; `None` for nulls and scalars.
    pub fn object_length(&self) -> Option<usize> {
        match self {
            Value::Varchar(bytes) | Value::Varbinary(bytes) => Some(bytes.len()),
            _ => None,
        }
    }

    fn numeric(&self) -> Option<Numeric> {
        match self {
            Value::TinyInt(v) => Some(Numeric::Int(*v as i64)),
            Value::SmallInt(v) => Some(Numeric::Int(*v as i64)),
            Value::Integer(v) => Some(Numeric::Int(*v as i64)),
            Value::BigInt(v) | Value::Timestamp(v) => Some(Numeric::Int(*v)),
            Value::Double(v) => Some(Numeric::Float(*v)),
            Value::Decimal(v) => Some(Numeric::Dec(*v)),
            _ => None,
        }
    }

    fn text(&self) -> Option<&str> {
        match self {
            Value::Varchar(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    fn to_i64(&self, target: ValueType) -> StorageResult<i64> {
        let out_of_range = |message: String| StorageError::ValueOutOfRange {
            value_type: target,
            message,
        };
        match self.numeric() {
            Some(Numeric::Int(v)) => Ok(v),
            Some(Numeric::Float(v)) => {
                if v.is_finite() && v >= i64::MIN as f64 && v < i64::MAX as f64 {
                    Ok(v.trunc() as i64)
                } else {
                    Err(out_of_range(v.to_string()))
                }
            }
            Some(Numeric::Dec(v)) => v.trunc_to_i64().ok_or_else(|| out_of_range(v.to_string())),
            None => match self.text() {
                Some(text) => text.trim().parse().map_err(|_| StorageError::InvalidCast {
                    from: self.value_type(),
                    to: target,
                }),
                None => Err(StorageError::InvalidCast {
                    from: self.value_type(),
                    to: target,
                }),
            },
        }
    }

    fn to_f64(&self) -> StorageResult<f64> {
        match self.numeric() {
            Some(Numeric::Int(v)) => Ok(v as f64),
            Some(Numeric::Float(v)) => Ok(v),
            Some(Numeric::Dec(v)) => Ok(v.to_f64()),
            None => self
                .text()
                .and_then(|text| text.trim().parse().ok())
                .ok_or(StorageError::InvalidCast {
                    from: self.value_type(),
                    to: ValueType::Double,
                }),
        }
    }

    fn to_decimal(&self) -> StorageResult<Decimal> {
        match self.numeric() {
            Some(Numeric::Int(v)) => Ok(Decimal::from_i64(v)),
            Some(Numeric::Float(v)) => Decimal::from_f64(v),
            Some(Numeric::Dec(v)) => Ok(v),
            None => match self.text() {
                Some(text) => text.parse(),
                None => Err(StorageError::InvalidCast {
                    from: self.value_type(),
                    to: ValueType::Decimal,
                }),
            },
        }
    }

    /// Convert to `target`, failing on incompatible types or lossy
    /// narrowing. Nulls cast to the null of the target type.
    pub fn cast_as(&self, target: ValueType) -> StorageResult<Value> {
        if self.is_null() {
            return Ok(Value::Null(target));
        }
        if self.value_type() == target {
            return Ok(self.clone());
        }

        fn narrow<T: TryFrom<i64> + PartialEq>(v: i64, null: T, target: ValueType) -> StorageResult<T> {
            match T::try_from(v) {
                Ok(narrowed) if narrowed != null => Ok(narrowed),
                _ => Err(StorageError::ValueOutOfRange {
                    value_type: target,
                    message: v.to_string(),
                }),
            }
        }

        match target {
            ValueType::TinyInt => Ok(Value::TinyInt(narrow(self.to_i64(target)?, INT8_NULL, target)?)),
            ValueType::SmallInt => Ok(Value::SmallInt(narrow(self.to_i64(target)?, INT16_NULL, target)?)),
            ValueType::Integer => Ok(Value::Integer(narrow(self.to_i64(target)?, INT32_NULL, target)?)),
            ValueType::BigInt => Ok(Value::BigInt(narrow(self.to_i64(target)?, INT64_NULL, target)?)),
            ValueType::Timestamp => Ok(Value::Timestamp(narrow(self.to_i64(target)?, INT64_NULL, target)?)),
            ValueType::Double => Ok(Value::Double(self.to_f64()?)),
            ValueType::Decimal => Ok(Value::Decimal(self.to_decimal()?)),
            ValueType::Varchar => match self {
                Value::Varbinary(_) => Err(StorageError::InvalidCast {
                    from: ValueType::Varbinary,
                    to: target,
                }),
                other => Ok(Value::varchar(&other.to_string())),
            },
            ValueType::Boolean | ValueType::Varbinary => Err(StorageError::InvalidCast {
                from: self.value_type(),
                to: target,
            }),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Boolean(_) => 1,
            Value::Varchar(_) => 2,
            Value::Varbinary(_) => 3,
            _ => 0,
        }
    }

    /// Total ordering used for tuple comparison. Nulls sort first and equal
    /// each other; numeric types compare by value across widths.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }

        if let (Some(lhs), Some(rhs)) = (self.numeric(), other.numeric()) {
            return match (lhs, rhs) {
                (Numeric::Int(a), Numeric::Int(b)) => a.cmp(&b),
                (Numeric::Dec(a), Numeric::Dec(b)) => a.cmp(&b),
                (Numeric::Dec(a), Numeric::Int(b)) => a.cmp(&Decimal::from_i64(b)),
                (Numeric::Int(a), Numeric::Dec(b)) => Decimal::from_i64(a).cmp(&b),
                (a, b) => numeric_f64(&a).total_cmp(&numeric_f64(&b)),
            };
        }

        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Varchar(a), Value::Varchar(b)) | (Value::Varbinary(a), Value::Varbinary(b)) => {
                a.as_ref().cmp(b.as_ref())
            }
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    /// Fold this value into a running hash, boost `hash_combine` style.
    pub fn hash_combine(&self, seed: &mut u64) {
        let mut hasher = DefaultHasher::new();
        if self.is_null() {
            hasher.write_u8(0);
        } else if let Some(numeric) = self.numeric() {
            // Numbers that compare equal across types must hash alike
            match numeric_hash_key(&numeric) {
                NumericHashKey::Integral(v) => hasher.write_i64(v),
                NumericHashKey::Scaled(v) => hasher.write_i128(v),
                NumericHashKey::Bits(v) => hasher.write_u64(v),
            }
        } else {
            match self {
                Value::Boolean(v) => hasher.write_u8(*v as u8 + 1),
                Value::Varchar(bytes) | Value::Varbinary(bytes) => hasher.write(bytes),
                _ => unreachable!("nulls and numbers are hashed above"),
            }
        }

        let hash = hasher.finish();
        *seed ^= hash
            .wrapping_add(0x9e37_79b9)
            .wrapping_add(*seed << 6)
            .wrapping_add(*seed >> 2);
    }
}

enum NumericHashKey {
    Integral(i64),
    Scaled(i128),
    Bits(u64),
}

/// Integral values hash as `i64` whatever their type; fractional ones as
/// the unscaled decimal they round to.
fn numeric_hash_key(n: &Numeric) -> NumericHashKey {
    match n {
        Numeric::Int(v) => NumericHashKey::Integral(*v),
        Numeric::Dec(v) => match v.trunc_to_i64() {
            Some(integral) if v.is_integral() => NumericHashKey::Integral(integral),
            _ => NumericHashKey::Scaled(v.unscaled()),
        },
        Numeric::Float(v) => {
            if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64 {
                NumericHashKey::Integral(*v as i64)
            } else {
                match Decimal::from_f64(*v) {
                    Ok(decimal) => NumericHashKey::Scaled(decimal.unscaled()),
                    Err(_) => NumericHashKey::Bits(v.to_bits()),
                }
            }
        }
    }
}

fn numeric_f64(n: &Numeric) -> f64 {
    match n {
        Numeric::Int(v) => *v as f64,
        Numeric::Float(v) => *v,
        Numeric::Dec(v) => v.to_f64(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "NULL");
        }
        match self {
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) | Value::Timestamp(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Varchar(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            Value::Varbinary(bytes) => {
                for b in bytes.iter() {
                    write!(f, "{:02X}", b)?;
                }
                Ok(())
            }
            Value::Null(_) => unreachable!("nulls are rendered above"),
        }
    }
}
