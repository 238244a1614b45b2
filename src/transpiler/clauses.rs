//! Clause assembly: table/projection handling and the statement tail
//! (WHERE, MATCH, GROUP BY, HAVING, ORDER BY, LIMIT).

use crate::ast::columns::{ProjItem, Projection};
use crate::ast::conditions::{Criteria, GroupBy, Having, LogicalOp, OrderItem};
use crate::ast::joins::JoinSpec;
use crate::ast::raw::RawFragment;
use crate::ast::values::Value;
use crate::error::{QuarryError, Result};
use crate::parser;
use crate::transpiler::conditions::build_entries;
use crate::transpiler::joins::build_join;
use crate::transpiler::Compiler;

/// What stands in projection position for probe/aggregate statements.
pub enum ColumnFn<'a> {
    /// Literal `1`, for EXISTS probes.
    One,
    /// An aggregate function wrapped around the projection.
    Aggregate(&'a str),
    /// A raw expression (e.g. the SQL Server `TOP 1 1` probe).
    Raw(&'a RawFragment),
}

/// Flatten a projection into a SQL column list.
pub fn build_projection(c: &mut Compiler, proj: &Projection, is_join: bool) -> Result<String> {
    match proj {
        Projection::All => Ok("*".to_string()),
        Projection::List(items) => {
            let mut stack = Vec::new();
            flatten_items(c, items, is_join, &mut stack)?;
            Ok(stack.join(","))
        }
        Projection::Grouped { key, items } => {
            // The grouping key follows the same token grammar the shaper
            // reads it with, so aliases and type hints are legal here.
            let parsed = parser::column_token(key)?;
            let mut key_sql = c.column_quote(&parsed.column)?;
            if let Some(alias) = &parsed.alias {
                key_sql = format!("{} AS {}", key_sql, c.column_quote(alias)?);
            }
            let mut stack = vec![key_sql];
            flatten_items(c, items, is_join, &mut stack)?;
            Ok(stack.join(","))
        }
    }
}

fn flatten_items(
    c: &mut Compiler,
    items: &[ProjItem],
    is_join: bool,
    stack: &mut Vec<String>,
) -> Result<()> {
    let mut has_distinct = stack.iter().any(|s| s.starts_with("DISTINCT "));
    for item in items {
        match item {
            ProjItem::Col(token) => {
                if is_join && token.contains('*') {
                    return Err(QuarryError::Descriptor(
                        "cannot use table.* to select all columns while joining".to_string(),
                    ));
                }
                let parsed = parser::column_token(token)?;
                let mut column_sql = c.column_quote(&parsed.column)?;
                if let Some(alias) = &parsed.alias {
                    column_sql = format!("{} AS {}", column_sql, c.column_quote(alias)?);
                }
                // Only one DISTINCT per statement; it must lead the list.
                if parsed.distinct && !has_distinct {
                    has_distinct = true;
                    stack.insert(0, format!("DISTINCT {}", column_sql));
                } else {
                    stack.push(column_sql);
                }
            }
            ProjItem::Raw { key, fragment } => {
                let parsed = parser::column_token(key)?;
                let raw = c.build_raw(fragment)?;
                stack.push(format!("{} AS {}", raw, c.column_quote(&parsed.column)?));
            }
            ProjItem::Nested { items, .. } => flatten_items(c, items, is_join, stack)?,
        }
    }
    Ok(())
}

/// Compile the statement tail from a criteria.
pub fn where_clause(c: &mut Compiler, criteria: Option<&Criteria>) -> Result<String> {
    let Some(criteria) = criteria else {
        return Ok(String::new());
    };
    let mut clause = String::new();

    if !criteria.entries.is_empty() {
        clause.push_str(" WHERE ");
        clause.push_str(&build_entries(c, &criteria.entries, LogicalOp::And)?);
    }

    if let Some(m) = &criteria.match_clause {
        if c.dialect.supports_match() {
            let mut columns = Vec::with_capacity(m.columns.len());
            for column in &m.columns {
                columns.push(c.column_quote(column)?);
            }
            let key = c.params.add(Value::Text(m.keyword.clone()));
            let mode = m
                .mode
                .map(|mode| format!(" {}", mode.keywords()))
                .unwrap_or_default();
            let connector = if clause.is_empty() { " WHERE" } else { " AND" };
            clause.push_str(&format!(
                "{} MATCH ({}) AGAINST ({}{})",
                connector,
                columns.join(", "),
                key,
                mode
            ));
        }
    }

    if let Some(group) = &criteria.group {
        clause.push_str(" GROUP BY ");
        match group {
            GroupBy::Columns(columns) => {
                let mut quoted = Vec::with_capacity(columns.len());
                for column in columns {
                    quoted.push(c.column_quote(column)?);
                }
                clause.push_str(&quoted.join(","));
            }
            GroupBy::Raw(fragment) => clause.push_str(&c.build_raw(fragment)?),
        }
    }

    if let Some(having) = &criteria.having {
        clause.push_str(" HAVING ");
        match having {
            Having::Entries(entries) => {
                clause.push_str(&build_entries(c, entries, LogicalOp::And)?)
            }
            Having::Raw(fragment) => clause.push_str(&c.build_raw(fragment)?),
        }
    }

    if !criteria.order.is_empty() {
        let mut stack = Vec::with_capacity(criteria.order.len());
        for item in &criteria.order {
            match item {
                OrderItem::Column { column, sort } => {
                    stack.push(format!("{} {}", c.column_quote(column)?, sort.keyword()));
                }
                OrderItem::Bare(column) => stack.push(c.column_quote(column)?),
                OrderItem::Field { column, values } => {
                    let literals: Vec<String> = values
                        .iter()
                        .map(|v| match v {
                            Value::Int(n) => n.to_string(),
                            Value::Float(n) => n.to_string(),
                            other => c.dialect.quote_value(&other.to_text()),
                        })
                        .collect();
                    stack.push(format!(
                        "FIELD({}, {})",
                        c.column_quote(column)?,
                        literals.join(",")
                    ));
                }
                OrderItem::Raw(fragment) => stack.push(c.build_raw(fragment)?),
            }
        }
        clause.push_str(" ORDER BY ");
        clause.push_str(&stack.join(","));
    }

    if let Some(limit) = &criteria.limit {
        clause.push_str(&c.dialect.limit_clause(limit, !criteria.order.is_empty()));
    }

    Ok(clause)
}

/// Assemble a full SELECT: table (with alias), joins, projection (or a
/// probe/aggregate stand-in), and the clause tail.
pub fn select_context(
    c: &mut Compiler,
    table: &str,
    joins: Option<&JoinSpec>,
    columns: Option<&Projection>,
    criteria: Option<&Criteria>,
    column_fn: Option<ColumnFn<'_>>,
) -> Result<String> {
    let (table_name, table_alias) = parser::table_ref(table)?;
    let table_sql = c.table_quote(&table_name)?;
    let (mut table_query, table_ref_sql) = match &table_alias {
        Some(alias) => {
            let alias_sql = c.table_quote(alias)?;
            (format!("{} AS {}", table_sql, alias_sql), alias_sql)
        }
        None => (table_sql.clone(), table_sql),
    };

    let is_join = joins.map(|j| !j.is_empty()).unwrap_or(false);
    if let Some(spec) = joins {
        if is_join {
            let join_sql = build_join(c, &table_ref_sql, spec)?;
            if !join_sql.is_empty() {
                table_query.push(' ');
                table_query.push_str(&join_sql);
            }
        }
    }

    let wildcard = Projection::All;
    let column_sql = match column_fn {
        Some(ColumnFn::One) => "1".to_string(),
        Some(ColumnFn::Raw(fragment)) => c.build_raw(fragment)?,
        Some(ColumnFn::Aggregate(func)) => {
            let proj = columns.unwrap_or(&wildcard);
            format!("{}({})", func, build_projection(c, proj, false)?)
        }
        None => build_projection(c, columns.unwrap_or(&wildcard), is_join)?,
    };

    Ok(format!(
        "SELECT {} FROM {}{}",
        column_sql,
        table_query,
        where_clause(c, criteria)?
    ))
}
