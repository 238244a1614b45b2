//! UPDATE and column-rewrite (REPLACE) generation.

use crate::ast::conditions::Criteria;
use crate::ast::values::{Record, Value};
use crate::error::{QuarryError, Result};
use crate::parser;
use crate::transpiler::clauses::where_clause;
use crate::transpiler::Compiler;

/// Build an UPDATE from a data record plus an optional criteria tail.
///
/// An arithmetic key like `score[+]` renders `score = score + :p` and
/// requires a numeric value; `[JSON]` keys and compound values encode to
/// JSON text.
pub fn build_update(
    c: &mut Compiler,
    table: &str,
    data: &Record,
    criteria: Option<&Criteria>,
) -> Result<String> {
    if data.is_empty() {
        return Err(QuarryError::Descriptor("update with no data".to_string()));
    }

    let mut assignments = Vec::with_capacity(data.fields.len());
    for (key, value) in &data.fields {
        let parsed = parser::data_key(key)?;
        let column = c.column_quote(&parsed.column)?;

        if let Some(op) = parsed.arithmetic {
            if !value.is_numeric() {
                return Err(QuarryError::Descriptor(format!(
                    "arithmetic update on '{}' needs a numeric value",
                    parsed.column
                )));
            }
            let key = c.params.add(value.clone());
            assignments.push(format!("{} = {} {} {}", column, column, op.symbol(), key));
            continue;
        }

        match value {
            Value::Raw(fragment) => {
                let raw = c.build_raw(fragment)?;
                assignments.push(format!("{} = {}", column, raw));
            }
            Value::List(_) => {
                let encoded = serde_json::to_string(&value.to_json())
                    .unwrap_or_else(|_| "null".to_string());
                let key = c.params.add(Value::Text(encoded));
                assignments.push(format!("{} = {}", column, key));
            }
            other => {
                let bound = if parsed.json {
                    let encoded = serde_json::to_string(&other.to_json())
                        .unwrap_or_else(|_| "null".to_string());
                    Value::Text(encoded)
                } else {
                    other.clone()
                };
                let key = c.params.add(bound);
                assignments.push(format!("{} = {}", column, key));
            }
        }
    }

    Ok(format!(
        "UPDATE {} SET {}{}",
        c.table_quote(table)?,
        assignments.join(", "),
        where_clause(c, criteria)?
    ))
}

/// Per-column substring substitutions for `build_replace`.
#[derive(Debug, Default, Clone)]
pub struct Replacement {
    pub columns: Vec<(String, Vec<(String, String)>)>,
}

impl Replacement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(
        mut self,
        column: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        let column = column.into();
        let pair = (from.into(), to.into());
        if let Some((_, pairs)) = self.columns.iter_mut().find(|(c, _)| *c == column) {
            pairs.push(pair);
        } else {
            self.columns.push((column, vec![pair]));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Build an UPDATE that rewrites substrings in place via SQL REPLACE().
pub fn build_replace(
    c: &mut Compiler,
    table: &str,
    replacement: &Replacement,
    criteria: Option<&Criteria>,
) -> Result<String> {
    if replacement.is_empty() {
        return Err(QuarryError::NoReplacementColumns);
    }

    let mut assignments = Vec::new();
    for (column, pairs) in &replacement.columns {
        let quoted = c.column_quote(column)?;
        for (from, to) in pairs {
            let base = c.params.reserve();
            let from_key = format!("{}a", base);
            let to_key = format!("{}b", base);
            c.params.insert(from_key.clone(), Value::Text(from.clone()));
            c.params.insert(to_key.clone(), Value::Text(to.clone()));
            assignments.push(format!(
                "{} = REPLACE({}, {}, {})",
                quoted, quoted, from_key, to_key
            ));
        }
    }

    Ok(format!(
        "UPDATE {} SET {}{}",
        c.table_quote(table)?,
        assignments.join(", "),
        where_clause(c, criteria)?
    ))
}
