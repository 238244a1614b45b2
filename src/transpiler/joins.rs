//! Join-specification compilation.

use tracing::warn;

use crate::ast::conditions::LogicalOp;
use crate::ast::joins::{JoinRelation, JoinSpec};
use crate::error::Result;
use crate::parser;
use crate::transpiler::conditions::build_entries;
use crate::transpiler::Compiler;

/// Compile the join clause. `main_table` is the quoted name (or alias)
/// of the primary table, used as the implicit left side of ON pairs.
///
/// An entry whose key fails the `[dir]table(alias)` grammar is dropped
/// with a warning rather than failing the statement; dropping a join
/// changes the result set, so the warning matters.
pub fn build_join(c: &mut Compiler, main_table: &str, spec: &JoinSpec) -> Result<String> {
    let mut parts = Vec::with_capacity(spec.entries.len());
    for (key, relation) in &spec.entries {
        let Some(join) = parser::join_key(key) else {
            warn!(key = %key, "skipping join entry with unparseable key");
            continue;
        };
        let table_sql = c.table_quote(&join.table)?;
        let (target, target_ref) = match &join.alias {
            Some(alias) => {
                let alias_sql = c.table_quote(alias)?;
                (format!("{} AS {}", table_sql, alias_sql), alias_sql)
            }
            None => (table_sql.clone(), table_sql),
        };
        let relation_sql = match relation {
            JoinRelation::Using(columns) => {
                let mut quoted = Vec::with_capacity(columns.len());
                for column in columns {
                    quoted.push(c.column_quote(column)?);
                }
                format!("USING ({})", quoted.join(", "))
            }
            JoinRelation::On { pairs, extra } => {
                let mut conditions = Vec::with_capacity(pairs.len());
                for (left, right) in pairs {
                    // A dotted left side names its table explicitly, a
                    // bare one belongs to the main table.
                    let left_sql = if left.contains('.') {
                        c.column_quote(left)?
                    } else {
                        format!("{}.{}", main_table, c.column_quote(left)?)
                    };
                    conditions.push(format!(
                        "{} = {}.{}",
                        left_sql,
                        target_ref,
                        c.column_quote(right)?
                    ));
                }
                if !extra.is_empty() {
                    conditions.push(build_entries(c, extra, LogicalOp::And)?);
                }
                format!("ON {}", conditions.join(" AND "))
            }
            JoinRelation::Raw(fragment) => c.build_raw(fragment)?,
        };
        parts.push(format!(
            "{} JOIN {} {}",
            join.kind.keyword(),
            target,
            relation_sql
        ));
    }
    Ok(parts.join(" "))
}
