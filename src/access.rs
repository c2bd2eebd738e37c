//! Access layer: values and the tuples built from them.
//!
//! - **Value**: typed column values with slot, row-store and export encodings
//! - **Tuple**: a schema-shaped row over a fixed-length buffer
//! - **TupleKey**: hash-container adapter for tuples

pub mod tuple;
pub mod value;

pub use tuple::{Tuple, TupleKey, TupleMap, TupleSet};
pub use value::{Decimal, Value, ValueType};
