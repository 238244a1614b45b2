//! DELETE generation.

use crate::ast::conditions::Criteria;
use crate::error::Result;
use crate::transpiler::clauses::where_clause;
use crate::transpiler::Compiler;

/// Build a DELETE. The criteria is required by the facade to guard
/// against accidental full-table deletes; an explicitly empty one still
/// compiles to an unfiltered statement.
pub fn build_delete(c: &mut Compiler, table: &str, criteria: &Criteria) -> Result<String> {
    let filter = if criteria.is_empty() {
        None
    } else {
        Some(criteria)
    };
    Ok(format!(
        "DELETE FROM {}{}",
        c.table_quote(table)?,
        where_clause(c, filter)?
    ))
}
