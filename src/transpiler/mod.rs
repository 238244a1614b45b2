//! Descriptor-to-SQL compiler.
//!
//! A [`Compiler`] is built fresh for every statement: it owns the target
//! dialect, the configured table prefix, and the parameter context whose
//! monotonic counter keeps every generated placeholder name unique within
//! the statement.

pub mod clauses;
pub mod conditions;
pub mod dialect;
pub mod dml;
pub mod joins;

#[cfg(test)]
mod tests;

pub use conditions::ParamContext;
pub use dialect::Dialect;

use crate::ast::raw::RawFragment;
use crate::ast::values::Value;
use crate::error::Result;
use crate::parser;

/// Keywords that mark the `<name>` token following them as a table
/// reference inside a raw fragment.
const TABLE_MARKERS: &[&str] = &["FROM", "TABLE", "INTO", "UPDATE", "JOIN"];

/// Per-statement compilation context.
#[derive(Debug)]
pub struct Compiler {
    pub dialect: Dialect,
    pub prefix: String,
    pub params: ParamContext,
}

impl Compiler {
    pub fn new(dialect: Dialect, prefix: impl Into<String>) -> Self {
        Self {
            dialect,
            prefix: prefix.into(),
            params: ParamContext::new(),
        }
    }

    /// Validate, prefix, and quote a table name.
    pub fn table_quote(&self, table: &str) -> Result<String> {
        parser::validate_identifier(table)?;
        Ok(self
            .dialect
            .quote_identifier(&format!("{}{}", self.prefix, table)))
    }

    /// Validate and quote a column name. A dotted `table.column` form is
    /// quoted per segment, with the prefix applied to the table segment.
    pub fn column_quote(&self, column: &str) -> Result<String> {
        parser::validate_column(column)?;
        match column.split_once('.') {
            Some((table, col)) => Ok(format!(
                "{}.{}",
                self.dialect
                    .quote_identifier(&format!("{}{}", self.prefix, table)),
                self.dialect.quote_identifier(col)
            )),
            None => Ok(self.dialect.quote_identifier(column)),
        }
    }

    /// Resolve a raw fragment: substitute `<name>` identifier tokens and
    /// merge the fragment's parameters into the statement map.
    ///
    /// A token preceded by FROM/TABLE/INTO/UPDATE/JOIN resolves as a table
    /// reference, any other as a column. Tokens inside single-quoted text
    /// and tokens that are not valid identifiers pass through untouched.
    pub fn build_raw(&mut self, fragment: &RawFragment) -> Result<String> {
        let text = &fragment.text;
        let mut out = String::with_capacity(text.len());
        let mut rest = text.as_str();
        let mut in_quotes = false;

        while let Some(ch) = rest.chars().next() {
            if ch == '\'' {
                in_quotes = !in_quotes;
            }
            if ch != '<' || in_quotes {
                out.push(ch);
                rest = &rest[ch.len_utf8()..];
                continue;
            }
            // Candidate token: <ident> or <ident.ident>.
            let Some(end) = rest.find('>') else {
                out.push_str(rest);
                break;
            };
            let candidate = &rest[1..end];
            let marker = trailing_word(&out).to_uppercase();
            let resolved = if TABLE_MARKERS.contains(&marker.as_str()) {
                self.table_quote(candidate).ok()
            } else if parser::validate_column(candidate).is_ok() {
                self.column_quote(candidate).ok()
            } else {
                None
            };
            match resolved {
                Some(quoted) => out.push_str(&quoted),
                None => out.push_str(&rest[..=end]),
            }
            rest = &rest[end + 1..];
        }

        for (name, value) in &fragment.params {
            self.params.insert(name.clone(), value.clone());
        }
        Ok(out)
    }
}

/// The word immediately preceding the current write position, used to
/// decide whether a `<name>` token is a table or a column reference.
fn trailing_word(out: &str) -> &str {
    let trimmed = out.trim_end();
    let mut start = trimmed.len();
    for (idx, c) in trimmed.char_indices().rev() {
        if c.is_ascii_alphanumeric() || c == '_' {
            start = idx;
        } else {
            break;
        }
    }
    &trimmed[start..]
}

/// Rewrite named placeholders as driver positional placeholders, returning
/// the rewritten text and the values in placeholder order.
pub fn positional(
    sql: &str,
    params: &[(String, Value)],
    dialect: Dialect,
) -> (String, Vec<Value>) {
    let mut out = String::with_capacity(sql.len());
    let mut ordered = Vec::new();
    scan_placeholders(sql, |segment| match segment {
        Segment::Text(text) => out.push_str(text),
        Segment::Name(name) => match params.iter().find(|(n, _)| n == name) {
            Some((_, value)) => {
                ordered.push(value.clone());
                out.push_str(&dialect.placeholder(ordered.len()));
            }
            None => out.push_str(name),
        },
    });
    (out, ordered)
}

/// Interpolate bound values into the statement text as quoted literals.
/// Diagnostics only - the result is for humans, not for execution.
pub fn interpolate(sql: &str, params: &[(String, Value)], dialect: Dialect) -> String {
    let mut out = String::with_capacity(sql.len());
    scan_placeholders(sql, |segment| match segment {
        Segment::Text(text) => out.push_str(text),
        Segment::Name(name) => match params.iter().find(|(n, _)| n == name) {
            Some((_, value)) => out.push_str(&literal(value, dialect)),
            None => out.push_str(name),
        },
    });
    out
}

fn literal(value: &Value, dialect: Dialect) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => dialect.bool_literal(*b).to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(n) => n.to_string(),
        Value::Text(s) => dialect.quote_value(s),
        Value::Bytes(_) => "{BLOB}".to_string(),
        Value::List(_) | Value::Raw(_) => "NULL".to_string(),
    }
}

enum Segment<'a> {
    Text(&'a str),
    Name(&'a str),
}

/// Walk the statement text, yielding every `:name` token outside single
/// quotes and the text runs in between.
fn scan_placeholders(sql: &str, mut emit: impl FnMut(Segment<'_>)) {
    let bytes = sql.as_bytes();
    let mut i = 0;
    let mut start = 0;
    let mut in_quotes = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                in_quotes = !in_quotes;
                i += 1;
            }
            b':' if !in_quotes => {
                let mut end = i + 1;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                if end > i + 1 {
                    emit(Segment::Text(&sql[start..i]));
                    emit(Segment::Name(&sql[i..end]));
                    start = end;
                }
                i = end.max(i + 1);
            }
            _ => i += 1,
        }
    }
    emit(Segment::Text(&sql[start..]));
}
