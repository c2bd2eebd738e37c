use anyhow::Result;
use std::cmp::Ordering;
use tempfile::tempdir;
use tupledb::access::tuple::serialize_export_row;
use tupledb::access::{Tuple, TupleKey, TupleSet, Value, ValueType};
use tupledb::catalog::{ColumnInfo, Schema};
use tupledb::storage::{
    ExportSerializeOutput, Pool, SerializeInput, SerializeOutput, StorageError, TableContents,
    TableWriter,
};

fn orders_schema() -> Result<Schema> {
    let columns = ["id:bigint", "sku:varchar(12)", "note:varchar(300)", "amount:decimal", "paid:boolean"]
        .iter()
        .map(|spec| spec.parse::<ColumnInfo>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Schema::new(columns))
}

fn order<'a>(schema: &'a Schema, pool: &'a Pool, id: i64, note: Option<&str>) -> Result<Tuple<'a>> {
    let mut tuple = Tuple::new(schema, pool);
    tuple.set_value(0, &Value::BigInt(id))?;
    tuple.set_value(1, &Value::varchar(&format!("SKU-{:04}", id)))?;
    if let Some(note) = note {
        tuple.set_value_allocate(2, &Value::varchar(note))?;
    }
    tuple.set_value(3, &Value::varchar("19.99"))?;
    tuple.set_value(4, &Value::Boolean(id % 2 == 0))?;
    Ok(tuple)
}

#[test]
fn test_stream_round_trip_with_nulls() -> Result<()> {
    let schema = orders_schema()?;
    let pool = Pool::new();
    let rows = vec![
        order(&schema, &pool, 1, Some("leave at the door"))?,
        order(&schema, &pool, 2, None)?,
        Tuple::new(&schema, &pool),
    ];

    let mut output = SerializeOutput::new();
    for tuple in &rows {
        tuple.serialize_to(&mut output);
    }
    let data = output.into_bytes();

    let mut input = SerializeInput::new(&data);
    for original in &rows {
        let restored = Tuple::deserialize(&schema, &pool, &mut input)?;
        assert!(restored == *original);
        for column in 0..schema.column_count() {
            assert_eq!(restored.is_null(column), original.is_null(column));
        }
    }
    assert!(!input.has_remaining());
    Ok(())
}

#[test]
fn test_copy_survives_source_release() -> Result<()> {
    let schema = orders_schema()?;
    let pool = Pool::new();
    let mut source = order(&schema, &pool, 10, Some("fragile"))?;

    let mut copy = Tuple::new(&schema, &pool);
    copy.copy_from(&source)?;
    source.free_uninlined_data();

    assert_eq!(copy.get_value(2).to_string(), "fragile");
    assert_eq!(copy.compare(&order(&schema, &pool, 10, Some("fragile"))?), Ordering::Equal);
    Ok(())
}

#[test]
fn test_tuples_over_shared_page() -> Result<()> {
    let schema = orders_schema()?;
    let pool = Pool::new();
    let mut page = vec![0u8; schema.tuple_length() * 4];

    for (i, chunk) in page.chunks_mut(schema.tuple_length()).enumerate() {
        let source = order(&schema, &pool, i as i64, Some("page row"))?;
        let mut view = Tuple::view(&schema, &pool, chunk);
        view.copy_from(&source)?;
    }

    let mut ids = Vec::new();
    for chunk in page.chunks_mut(schema.tuple_length()) {
        let view = Tuple::view(&schema, &pool, chunk);
        ids.push(view.get_value(0).to_string());
        assert_eq!(view.get_value(2).to_string(), "page row");
    }
    assert_eq!(ids, ["0", "1", "2", "3"]);
    Ok(())
}

#[test]
fn test_distinct_rows() -> Result<()> {
    let schema = orders_schema()?;
    let pool = Pool::new();
    let rows = vec![
        order(&schema, &pool, 1, Some("a"))?,
        order(&schema, &pool, 1, Some("a"))?,
        order(&schema, &pool, 1, None)?,
        order(&schema, &pool, 2, None)?,
    ];

    let distinct: TupleSet<'_, '_> = rows.iter().map(TupleKey).collect();
    assert_eq!(distinct.len(), 3);
    Ok(())
}

#[test]
fn test_table_file_and_export() -> Result<()> {
    let dir = tempdir()?;
    let table_path = dir.path().join("items.tbl");
    let schema = Schema::new(vec![
        ColumnInfo::new("id", ValueType::Integer),
        ColumnInfo::variable("name", ValueType::Varchar, 100),
        ColumnInfo::new("ts", ValueType::Timestamp),
    ]);
    let pool = Pool::new();

    let mut writer = TableWriter::create(&table_path, &schema)?;
    for id in 0..5 {
        let mut tuple = Tuple::new(&schema, &pool);
        tuple.set_value(0, &Value::Integer(id))?;
        if id != 3 {
            tuple.set_value_allocate(1, &Value::varchar(&format!("item-{}", id)))?;
        }
        tuple.set_value(2, &Value::Timestamp(1_000 * id as i64))?;
        writer.append(&tuple)?;
        tuple.free_uninlined_data();
    }
    writer.finish()?;
    assert_eq!(pool.live_allocations(), 0);

    let contents = TableContents::open(&table_path)?;
    let read_pool = Pool::new();
    let tuples = contents.tuples(&read_pool)?;
    assert_eq!(tuples.len(), 5);
    assert!(tuples[3].is_null(1));

    let mut export = ExportSerializeOutput::new();
    let mut total = 0;
    for tuple in &tuples {
        total += serialize_export_row(tuple, &mut export)?;
    }
    assert_eq!(total, export.position());

    // Row 3: header, bitmap with column 1 null, two widened integers
    let row3_offset = 3 * (4 + 1 + 8 + (4 + 6) + 8);
    let data = export.data();
    let row3 = &data[row3_offset..];
    assert_eq!(&row3[..4], &(1i32 + 16).to_le_bytes());
    assert_eq!(row3[4], 0x40);
    assert_eq!(&row3[5..13], &3i64.to_le_bytes());
    assert_eq!(&row3[13..21], &3_000i64.to_le_bytes());
    Ok(())
}

#[test]
fn test_boolean_rejected_by_export() -> Result<()> {
    let schema = orders_schema()?;
    let pool = Pool::new();
    let tuple = order(&schema, &pool, 1, None)?;

    let err = tuple.export_serialization_size().unwrap_err();
    assert!(matches!(err, StorageError::UnknownType { value_type: ValueType::Boolean, .. }));
    Ok(())
}
