//! Storage plumbing shared by tuples.
//!
//! - **Pool**: arena holding the payloads of out-of-line columns
//! - **SerializeOutput / SerializeInput**: big-endian row-store streams
//! - **ExportSerializeOutput**: little-endian export stream
//! - **TableWriter / TableContents**: flat table files for the CLI

pub mod error;
pub mod pool;
pub mod stream;
pub mod table_file;

pub use error::{StorageError, StorageResult};
pub use pool::{Pool, VarlenRef};
pub use stream::{ExportSerializeOutput, SerializeInput, SerializeOutput};
pub use table_file::{TableContents, TableWriter};
