//! Flat table files used by the command line tool.
//!
//! Layout: `[u32 schema length][bincode schema][row-store tuples...]`, with
//! the schema length big-endian like the tuple stream that follows it.

use crate::access::tuple::Tuple;
use crate::catalog::Schema;
use crate::storage::pool::Pool;
use crate::storage::stream::{SerializeInput, SerializeOutput};
use anyhow::{bail, Context, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// Appends serialized tuples to a new table file.
pub struct TableWriter {
    file: BufWriter<File>,
    buffer: SerializeOutput,
    rows: usize,
}

impl TableWriter {
    pub fn create(path: &Path, schema: &Schema) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Failed to create table file: {:?}", path))?;
        let mut file = BufWriter::new(file);

        let schema_bytes = schema.to_bytes().context("Failed to encode schema")?;
        file.write_u32::<BigEndian>(schema_bytes.len() as u32)?;
        file.write_all(&schema_bytes)?;

        Ok(Self {
            file,
            buffer: SerializeOutput::new(),
            rows: 0,
        })
    }

    pub fn append(&mut self, tuple: &Tuple<'_>) -> Result<()> {
        tuple.serialize_to(&mut self.buffer);
        self.rows += 1;
        Ok(())
    }

    /// Flush buffered rows and return how many were written.
    pub fn finish(mut self) -> Result<usize> {
        self.file
            .write_all(self.buffer.data())
            .context("Failed to write rows")?;
        self.file.flush().context("Failed to flush table file")?;
        debug!("Wrote {} rows", self.rows);
        Ok(self.rows)
    }
}

/// Schema and raw row stream of a table file.
pub struct TableContents {
    schema: Schema,
    rows: Vec<u8>,
}

impl TableContents {
    pub fn open(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).with_context(|| format!("Failed to open table file: {:?}", path))?;

        let file_length = file.metadata()?.len();
        let schema_length = file
            .read_u32::<BigEndian>()
            .context("Failed to read schema header")? as u64;
        if schema_length > file_length.saturating_sub(4) {
            bail!(
                "Schema length {} exceeds the {} bytes of {:?}",
                schema_length,
                file_length,
                path
            );
        }

        let mut schema_bytes = Vec::new();
        (&mut file)
            .take(schema_length)
            .read_to_end(&mut schema_bytes)
            .context("Failed to read schema")?;
        if schema_bytes.len() as u64 != schema_length {
            bail!("Truncated schema in {:?}", path);
        }
        let schema = Schema::from_bytes(&schema_bytes).context("Failed to decode schema")?;
        if schema.column_count() == 0 {
            bail!("Table file {:?} has no columns", path);
        }

        let mut rows = Vec::new();
        file.read_to_end(&mut rows).context("Failed to read rows")?;
        Ok(Self { schema, rows })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Decode every row, allocating out-of-line payloads from `pool`.
    pub fn tuples<'a>(&'a self, pool: &'a Pool) -> Result<Vec<Tuple<'a>>> {
        let mut input = SerializeInput::new(&self.rows);
        let mut tuples = Vec::new();
        while input.has_remaining() {
            let tuple = Tuple::deserialize(&self.schema, pool, &mut input)
                .with_context(|| format!("Failed to decode row {}", tuples.len()))?;
            tuples.push(tuple);
        }
        Ok(tuples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::value::{Value, ValueType};
    use crate::catalog::ColumnInfo;
    use tempfile::tempdir;

    #[test]
    fn test_write_and_read_back() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("t.tbl");
        let schema = Schema::new(vec![
            ColumnInfo::new("id", ValueType::BigInt),
            ColumnInfo::variable("note", ValueType::Varchar, 128),
        ]);
        let pool = Pool::new();

        let mut writer = TableWriter::create(&path, &schema)?;
        for id in 0..3 {
            let mut tuple = Tuple::new(&schema, &pool);
            tuple.set_value(0, &Value::BigInt(id))?;
            tuple.set_value_allocate(1, &Value::varchar(&format!("row {}", id)))?;
            writer.append(&tuple)?;
        }
        assert_eq!(writer.finish()?, 3);

        let contents = TableContents::open(&path)?;
        assert!(contents.schema().layout_eq(&schema));
        let read_pool = Pool::new();
        let tuples = contents.tuples(&read_pool)?;
        assert_eq!(tuples.len(), 3);
        assert_eq!(tuples[2].get_value(1).to_string(), "row 2");
        assert_eq!(read_pool.live_allocations(), 3);
        Ok(())
    }

    #[test]
    fn test_truncated_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("bad.tbl");
        std::fs::write(&path, [0, 0, 1, 0, 7])?;
        assert!(TableContents::open(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_oversized_schema_header() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("huge.tbl");
        std::fs::write(&path, [0xFF, 0xFF, 0xFF, 0xFF, 1, 2, 3])?;

        let err = TableContents::open(&path).err().map(|e| e.to_string());
        assert!(matches!(err, Some(message) if message.contains("exceeds")));
        Ok(())
    }
}
