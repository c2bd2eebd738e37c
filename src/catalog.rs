//! Schema catalog types.
//!
//! - **ColumnInfo**: a declared column (name, type, length, inline hint)
//! - **Schema**: the tuple layout computed from a list of columns

pub mod column_info;
pub mod schema;

pub use column_info::{ColumnInfo, UNINLINEABLE_OBJECT_LENGTH};
pub use schema::Schema;
