//! Recursive condition-tree compilation.

use crate::ast::conditions::{Entry, LogicalOp, Operator};
use crate::ast::values::Value;
use crate::error::{QuarryError, Result};
use crate::parser;
use crate::transpiler::Compiler;

/// Parameter map under construction for one statement.
///
/// Placeholder names come from a monotonic counter, so the same column
/// appearing twice never collides; list elements and range bounds get a
/// per-element disambiguator appended to their base name.
#[derive(Debug, Default)]
pub struct ParamContext {
    index: usize,
    params: Vec<(String, Value)>,
}

impl ParamContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next base placeholder name without binding a value.
    pub fn reserve(&mut self) -> String {
        let key = format!(":qk{}", self.index);
        self.index += 1;
        key
    }

    /// Bind a value under a fresh placeholder name and return the name.
    pub fn add(&mut self, value: Value) -> String {
        let key = self.reserve();
        self.params.push((key.clone(), value));
        key
    }

    /// Bind a value under an explicit name (derived names, raw merges).
    pub fn insert(&mut self, name: String, value: Value) {
        self.params.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn into_vec(self) -> Vec<(String, Value)> {
        self.params
    }

    pub fn as_slice(&self) -> &[(String, Value)] {
        &self.params
    }
}

/// Compile sibling entries joined by `conj`.
pub fn build_entries(c: &mut Compiler, entries: &[Entry], conj: LogicalOp) -> Result<String> {
    let mut stack = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            Entry::Group { op, entries } => {
                stack.push(format!("({})", build_entries(c, entries, *op)?));
            }
            Entry::Raw(fragment) => stack.push(c.build_raw(fragment)?),
            Entry::Cond { key, value } => stack.push(build_condition(c, key, value)?),
        }
    }
    Ok(stack.join(&format!(" {} ", conj.keyword())))
}

fn build_condition(c: &mut Compiler, key: &str, value: &Value) -> Result<String> {
    let parsed = parser::condition_key(key)?;
    let column = c.column_quote(&parsed.column)?;
    let op = parsed.operator.unwrap_or(Operator::Eq);

    // Column-to-column comparison: `a.col[>=]b.col`.
    if let Some(rhs) = &parsed.rhs_column {
        if matches!(op, Operator::Eq | Operator::Ne) || op.is_ordering() {
            return Ok(format!(
                "{} {} {}",
                column,
                op.symbol(),
                c.column_quote(rhs)?
            ));
        }
        return Err(QuarryError::UnsupportedOperator {
            column: parsed.column,
            operator: op.symbol().to_string(),
        });
    }

    match op {
        Operator::Eq | Operator::Ne => build_equality(c, &column, op, value),
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            let sql = match value {
                Value::Raw(fragment) => c.build_raw(fragment)?,
                other => c.params.add(other.clone()),
            };
            Ok(format!("{} {} {}", column, op.symbol(), sql))
        }
        Operator::Like | Operator::NotLike => build_like(c, &column, op, value),
        Operator::Between | Operator::NotBetween => build_between(c, &column, op, value, &parsed.column),
        Operator::Regexp => {
            let key = c.params.add(Value::Text(value.to_text()));
            Ok(format!("{} REGEXP {}", column, key))
        }
    }
}

fn build_equality(c: &mut Compiler, column: &str, op: Operator, value: &Value) -> Result<String> {
    let negated = matches!(op, Operator::Ne);
    match value {
        Value::Null => Ok(format!(
            "{} IS{} NULL",
            column,
            if negated { " NOT" } else { "" }
        )),
        Value::List(items) => {
            let base = c.params.reserve();
            let mut placeholders = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let name = format!("{}_{}", base, i);
                placeholders.push(name.clone());
                c.params.insert(name, item.clone());
            }
            Ok(format!(
                "{}{} IN ({})",
                column,
                if negated { " NOT" } else { "" },
                placeholders.join(", ")
            ))
        }
        Value::Raw(fragment) => {
            let raw = c.build_raw(fragment)?;
            Ok(format!("{} {} {}", column, op.symbol(), raw))
        }
        scalar => {
            let key = c.params.add(scalar.clone());
            Ok(format!("{} {} {}", column, op.symbol(), key))
        }
    }
}

fn build_like(c: &mut Compiler, column: &str, op: Operator, value: &Value) -> Result<String> {
    let patterns: Vec<&Value> = match value {
        Value::List(items) => items.iter().collect(),
        other => vec![other],
    };
    let not = if matches!(op, Operator::NotLike) {
        " NOT"
    } else {
        ""
    };
    let base = c.params.reserve();
    let mut clauses = Vec::with_capacity(patterns.len());
    for (i, pattern) in patterns.iter().enumerate() {
        let mut text = pattern.to_text();
        if !has_wildcard(&text) {
            text = format!("%{}%", text);
        }
        let name = format!("{}L{}", base, i);
        clauses.push(format!("{}{} LIKE {}", column, not, name));
        c.params.insert(name, Value::Text(text));
    }
    Ok(format!("({})", clauses.join(" OR ")))
}

fn build_between(
    c: &mut Compiler,
    column: &str,
    op: Operator,
    value: &Value,
    column_name: &str,
) -> Result<String> {
    let Value::List(bounds) = value else {
        return Err(QuarryError::Descriptor(format!(
            "BETWEEN on '{}' needs a two-element list",
            column_name
        )));
    };
    if bounds.len() != 2 {
        return Err(QuarryError::Descriptor(format!(
            "BETWEEN on '{}' needs exactly two bounds, got {}",
            column_name,
            bounds.len()
        )));
    }
    let not = if matches!(op, Operator::NotBetween) {
        " NOT"
    } else {
        ""
    };
    if let (Some(low), Some(high)) = (bounds[0].as_raw(), bounds[1].as_raw()) {
        let low = low.clone();
        let high = high.clone();
        return Ok(format!(
            "({}{} BETWEEN {} AND {})",
            column,
            not,
            c.build_raw(&low)?,
            c.build_raw(&high)?
        ));
    }
    let base = c.params.reserve();
    let low_key = format!("{}a", base);
    let high_key = format!("{}b", base);
    c.params.insert(low_key.clone(), bounds[0].clone());
    c.params.insert(high_key.clone(), bounds[1].clone());
    Ok(format!(
        "({}{} BETWEEN {} AND {})",
        column, not, low_key, high_key
    ))
}

/// A bare LIKE value without wildcard or escape characters gets wrapped
/// in `%...%`. Backslash escapes a literal wildcard character.
fn has_wildcard(pattern: &str) -> bool {
    let mut escaped = false;
    for c in pattern.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '%' | '_' | '*' | '?' | '!' | '#' | '^' | '[' => return true,
            _ => {}
        }
    }
    false
}
