//! tupledb - build, inspect and export flat tuple files

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tupledb::access::{Decimal, Tuple, Value, ValueType};
use tupledb::access::tuple::serialize_export_row;
use tupledb::catalog::{ColumnInfo, Schema};
use tupledb::storage::{ExportSerializeOutput, Pool, TableContents, TableWriter};

/// tupledb - fixed-layout tuple files
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a table file filled with random rows
    Generate {
        /// Output table file
        #[arg(short, long)]
        output: PathBuf,

        /// Column specs such as `id:bigint`, `name:varchar(32)` or
        /// `blob:varbinary(16)!` to force out-of-line storage
        #[arg(short, long = "column", required = true)]
        columns: Vec<ColumnInfo>,

        /// Number of rows to generate
        #[arg(short, long, default_value = "10")]
        rows: usize,

        /// Percentage of generated values that are null
        #[arg(long, default_value = "10")]
        null_percent: u32,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print every row of a table file
    Dump {
        /// Table file to read
        input: PathBuf,
    },

    /// Convert a table file to framed export rows
    Export {
        /// Table file to read
        input: PathBuf,

        /// Export file to write
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match args.command {
        Command::Generate {
            output,
            columns,
            rows,
            null_percent,
            seed,
        } => generate(output, columns, rows, null_percent, seed),
        Command::Dump { input } => dump(input),
        Command::Export { input, output } => export(input, output),
    }
}

fn generate(
    output: PathBuf,
    columns: Vec<ColumnInfo>,
    rows: usize,
    null_percent: u32,
    seed: Option<u64>,
) -> Result<()> {
    let schema = Schema::new(columns);
    let pool = Pool::with_capacity(schema.uninlined_column_count());
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut writer = TableWriter::create(&output, &schema)?;
    let mut tuple = Tuple::new(&schema, &pool);
    for row in 0..rows {
        for column in 0..schema.column_count() {
            let value = if rng.gen_range(0..100) < null_percent {
                Value::null_of(schema.value_type(column))
            } else {
                random_value(&mut rng, schema.column(column))?
            };
            tuple
                .set_value_allocate(column, &value)
                .with_context(|| format!("Failed to fill row {} column {}", row, column))?;
        }
        writer.append(&tuple)?;
    }
    tuple.free_uninlined_data();
    let written = writer.finish()?;

    info!(
        "Wrote {} rows of {} bytes to {}",
        written,
        schema.tuple_length(),
        output.display()
    );
    Ok(())
}

fn random_value(rng: &mut StdRng, column: &ColumnInfo) -> Result<Value> {
    let value = match column.column_type {
        ValueType::TinyInt => Value::TinyInt(rng.gen_range(-127..=i8::MAX)),
        ValueType::SmallInt => Value::SmallInt(rng.gen_range(-1000..=1000)),
        ValueType::Integer => Value::Integer(rng.gen_range(-1_000_000..=1_000_000)),
        ValueType::BigInt => Value::BigInt(rng.gen_range(0..i64::MAX)),
        ValueType::Timestamp => Value::Timestamp(rng.gen_range(0..4_102_444_800_000_000)),
        ValueType::Double => Value::Double(rng.gen_range(-1e6..1e6)),
        ValueType::Decimal => {
            // Two fractional digits, scaled up to the stored twelve
            let cents: i128 = rng.gen_range(-10_000_000..10_000_000);
            Value::Decimal(Decimal::from_unscaled(cents * 10_000_000_000)?)
        }
        ValueType::Boolean => Value::Boolean(rng.gen()),
        ValueType::Varchar => {
            let length = rng.gen_range(0..=column.column_length as usize);
            let text: String = (0..length)
                .map(|_| rng.sample(rand::distributions::Alphanumeric) as char)
                .collect();
            Value::varchar(&text)
        }
        ValueType::Varbinary => {
            let length = rng.gen_range(0..=column.column_length as usize);
            let bytes: Vec<u8> = (0..length).map(|_| rng.gen()).collect();
            Value::varbinary(&bytes)
        }
    };
    Ok(value)
}

fn dump(input: PathBuf) -> Result<()> {
    let contents = TableContents::open(&input)?;
    let schema = contents.schema();
    let header: Vec<String> = schema
        .columns()
        .iter()
        .map(|c| format!("{} {}", c.column_name, c.column_type.name()))
        .collect();
    println!("{}", header.join(", "));

    let pool = Pool::new();
    let tuples = contents.tuples(&pool)?;
    for tuple in &tuples {
        print!("{}", tuple);
    }
    info!(
        "{} rows, {} pool bytes",
        tuples.len(),
        pool.allocated_bytes()
    );
    Ok(())
}

fn export(input: PathBuf, output: PathBuf) -> Result<()> {
    let contents = TableContents::open(&input)?;
    let pool = Pool::new();
    let tuples = contents.tuples(&pool)?;

    let mut stream = ExportSerializeOutput::new();
    for (row, tuple) in tuples.iter().enumerate() {
        serialize_export_row(tuple, &mut stream)
            .with_context(|| format!("Failed to export row {}", row))?;
    }
    std::fs::write(&output, stream.data())
        .with_context(|| format!("Failed to write export file: {:?}", output))?;

    info!(
        "Exported {} rows ({} bytes) to {}",
        tuples.len(),
        stream.position(),
        output.display()
    );
    Ok(())
}
