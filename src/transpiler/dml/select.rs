//! SELECT generation, including aggregate and existence probes.

use crate::ast::columns::Projection;
use crate::ast::conditions::Criteria;
use crate::ast::joins::JoinSpec;
use crate::ast::raw::RawFragment;
use crate::error::Result;
use crate::transpiler::clauses::{select_context, ColumnFn};
use crate::transpiler::Compiler;

pub fn build_select(
    c: &mut Compiler,
    table: &str,
    joins: Option<&JoinSpec>,
    columns: &Projection,
    criteria: Option<&Criteria>,
) -> Result<String> {
    select_context(c, table, joins, Some(columns), criteria, None)
}

/// `SELECT FN(cols) FROM ...` for COUNT/SUM/AVG/MIN/MAX.
pub fn build_aggregate(
    c: &mut Compiler,
    func: &str,
    table: &str,
    joins: Option<&JoinSpec>,
    columns: Option<&Projection>,
    criteria: Option<&Criteria>,
) -> Result<String> {
    select_context(
        c,
        table,
        joins,
        columns,
        criteria,
        Some(ColumnFn::Aggregate(func)),
    )
}

/// Existence probe: `SELECT EXISTS(SELECT 1 ...)`, or `SELECT TOP 1 1 ...`
/// on dialects that probe that way.
pub fn build_exists(
    c: &mut Compiler,
    table: &str,
    joins: Option<&JoinSpec>,
    criteria: Option<&Criteria>,
) -> Result<String> {
    if c.dialect.probes_with_top() {
        let probe = RawFragment::new("TOP 1 1");
        return select_context(c, table, joins, None, criteria, Some(ColumnFn::Raw(&probe)));
    }
    let inner = select_context(c, table, joins, None, criteria, Some(ColumnFn::One))?;
    Ok(format!("SELECT EXISTS({})", inner))
}
