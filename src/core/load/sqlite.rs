use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use arrow::datatypes::DataType;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;
use tracing::{debug, info};

use crate::core::frame::MovieFrame;
use crate::utils::{ensure_parent_dir, Error, ReelResult};

/// Column used as the table's primary key.
pub const KEY_COLUMN: &str = "id";

static IDENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Plain SQL identifier: a letter or underscore, then letters, digits or underscores.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENT_RE.is_match(name)
}

fn quote_ident(name: &str) -> ReelResult<String> {
    if !is_valid_identifier(name) {
        return Err(Error::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}

pub fn sqlite_type(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Boolean => "INTEGER",
        t if t.is_integer() => "INTEGER",
        t if t.is_floating() => "REAL",
        // SQLite has no date or array type: ISO text and JSON text
        _ => "TEXT",
    }
}

pub fn create_table_sql(frame: &MovieFrame, table: &str, key: &str) -> ReelResult<String> {
    let mut columns = Vec::with_capacity(frame.width());
    for field in frame.batch().schema().fields() {
        let mut def = format!("{} {}", quote_ident(field.name())?, sqlite_type(field.data_type()));
        if field.name() == key {
            def.push_str(" PRIMARY KEY");
        }
        columns.push(def);
    }
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
        quote_ident(table)?,
        columns.join(",\n    ")
    ))
}

fn insert_sql(frame: &MovieFrame, table: &str) -> ReelResult<String> {
    let names = frame
        .column_names()
        .iter()
        .map(|name| quote_ident(name))
        .collect::<ReelResult<Vec<_>>>()?;
    let placeholders = vec!["?"; names.len()].join(", ");
    Ok(format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
        quote_ident(table)?,
        names.join(", "),
        placeholders
    ))
}

fn to_sql(v: Option<&Value>) -> SqlValue {
    match v {
        None | Some(Value::Null) => SqlValue::Null,
        Some(Value::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map_or(SqlValue::Null, SqlValue::Real),
        },
        Some(Value::String(s)) => SqlValue::Text(s.clone()),
        Some(nested) => SqlValue::Text(nested.to_string()),
    }
}

/// Write every row into `table` with insert-or-replace, in one transaction.
/// Returns the number of rows written.
pub fn write_rows(conn: &mut Connection, frame: &MovieFrame, table: &str) -> ReelResult<usize> {
    let create = create_table_sql(frame, table, KEY_COLUMN)?;
    debug!(target: "reelpipe::load", sql = %create, "Creating table if missing");
    conn.execute_batch(&create)?;

    let insert = insert_sql(frame, table)?;
    let names = frame.column_names();
    // dates arrive as ISO text, lists as JSON arrays
    let rows = frame.to_json_rows()?;
    // Dropping the transaction without commit rolls it back.
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(&insert)?;
        for row in &rows {
            stmt.execute(params_from_iter(names.iter().map(|name| to_sql(row.get(name)))))?;
        }
    }
    tx.commit()?;
    Ok(rows.len())
}

pub fn load_sqlite(frame: &MovieFrame, db_path: &Path, table: &str) -> ReelResult<usize> {
    ensure_parent_dir(db_path)?;
    let mut conn = Connection::open(db_path)?;
    let written = write_rows(&mut conn, frame, table)?;
    info!(
        target: "reelpipe::load",
        db = %db_path.display(),
        table = %table,
        rows = written,
        "Loaded rows into SQLite"
    );
    Ok(written)
}
