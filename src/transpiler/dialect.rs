use serde::{Deserialize, Serialize};

use crate::ast::conditions::Limit;

/// Supported SQL dialects.
///
/// SQL Server and Oracle are compile-time targets only (quoting, paging,
/// probe shape); execution runs against the MySQL / Postgres / SQLite
/// drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
    SqlServer,
    Oracle,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::MySql
    }
}

impl Dialect {
    /// Quote an already-validated identifier.
    pub fn quote_identifier(&self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
            _ => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Quote a string literal. Used only where the compiler inlines
    /// values (`FIELD(...)` lists, debug interpolation) - never for
    /// ordinary bindings.
    pub fn quote_value(&self, value: &str) -> String {
        match self {
            Dialect::MySql => format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'")),
            _ => format!("'{}'", value.replace('\'', "''")),
        }
    }

    pub fn bool_literal(&self, value: bool) -> &'static str {
        match self {
            Dialect::Postgres | Dialect::Sqlite => {
                if value {
                    "TRUE"
                } else {
                    "FALSE"
                }
            }
            _ => {
                if value {
                    "1"
                } else {
                    "0"
                }
            }
        }
    }

    /// The positional placeholder the backend driver expects.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            _ => "?".to_string(),
        }
    }

    /// `MATCH ... AGAINST` is a MySQL-family feature.
    pub fn supports_match(&self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Whether `has` probes with `SELECT TOP 1 1` instead of `EXISTS`.
    pub fn probes_with_top(&self) -> bool {
        matches!(self, Dialect::SqlServer)
    }

    pub fn random_function(&self) -> &'static str {
        match self {
            Dialect::MySql => "RAND()",
            Dialect::SqlServer => "NEWID()",
            _ => "RANDOM()",
        }
    }

    /// Render the paging clause. SQL Server requires an ORDER BY for
    /// OFFSET paging, so one is injected when the statement has none.
    pub fn limit_clause(&self, limit: &Limit, has_order: bool) -> String {
        match self {
            Dialect::Oracle | Dialect::SqlServer => {
                let mut clause = String::new();
                if matches!(self, Dialect::SqlServer) && !has_order {
                    clause.push_str(" ORDER BY (SELECT 0)");
                }
                let offset = limit.offset.unwrap_or(0);
                clause.push_str(&format!(
                    " OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                    offset, limit.count
                ));
                clause
            }
            _ => match limit.offset {
                Some(offset) => format!(" LIMIT {} OFFSET {}", limit.count, offset),
                None => format!(" LIMIT {}", limit.count),
            },
        }
    }

    /// Connection URL scheme for the runtime drivers.
    pub fn scheme(&self) -> Option<&'static str> {
        match self {
            Dialect::MySql => Some("mysql"),
            Dialect::Postgres => Some("postgres"),
            Dialect::Sqlite => Some("sqlite"),
            _ => None,
        }
    }
}
