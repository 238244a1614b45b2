//! INSERT generation.

use crate::ast::values::{Record, Value};
use crate::error::{QuarryError, Result};
use crate::parser;
use crate::transpiler::Compiler;

/// Build one INSERT statement over one or more rows.
///
/// The column list is the union of every row's keys in first-seen order;
/// a row missing a key present in another row binds NULL for that column.
/// Compound (`List`) values serialize to JSON text; the `[JSON]` key
/// suffix exists to request that encoding explicitly.
pub fn build_insert(c: &mut Compiler, table: &str, rows: &[Record]) -> Result<String> {
    if rows.is_empty() {
        return Err(QuarryError::Descriptor("insert with no rows".to_string()));
    }

    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(&key) {
                columns.push(key);
            }
        }
    }

    let mut fields = Vec::with_capacity(columns.len());
    let mut parsed_keys = Vec::with_capacity(columns.len());
    for key in &columns {
        let parsed = parser::data_key(key)?;
        if parsed.arithmetic.is_some() {
            return Err(QuarryError::Descriptor(format!(
                "arithmetic modifier on insert key '{}'",
                key
            )));
        }
        fields.push(c.column_quote(&parsed.column)?);
        parsed_keys.push(parsed);
    }

    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let mut values = Vec::with_capacity(columns.len());
        for (key, parsed) in columns.iter().zip(&parsed_keys) {
            // A key absent from this row binds NULL.
            let Some(value) = row.get(key) else {
                values.push(c.params.add(Value::Null));
                continue;
            };
            match value {
                Value::Raw(fragment) => values.push(c.build_raw(fragment)?),
                Value::List(_) => {
                    let encoded = serde_json::to_string(&value.to_json())
                        .unwrap_or_else(|_| "null".to_string());
                    values.push(c.params.add(Value::Text(encoded)));
                }
                other => {
                    let bound = if parsed.json {
                        let encoded = serde_json::to_string(&other.to_json())
                            .unwrap_or_else(|_| "null".to_string());
                        Value::Text(encoded)
                    } else {
                        other.clone()
                    };
                    values.push(c.params.add(bound));
                }
            }
        }
        tuples.push(format!("({})", values.join(", ")));
    }

    Ok(format!(
        "INSERT INTO {} ({}) VALUES {}",
        c.table_quote(table)?,
        fields.join(", "),
        tuples.join(", ")
    ))
}
