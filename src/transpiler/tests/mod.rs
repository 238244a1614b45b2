//! Transpiler test modules.
//!
//! Tests are organized by category:
//! - `core`: Basic SELECT, INSERT, UPDATE, DELETE compilation
//! - `dialects`: Dialect-specific quoting, paging, and probes
//! - `features`: Joins, raw fragments, condition grammar, projections

mod features;

use super::{Compiler, Dialect};
use crate::ast::values::Value;

/// Compiler with the default dialect and no prefix.
fn compiler() -> Compiler {
    Compiler::new(Dialect::MySql, "")
}

fn compiler_for(dialect: Dialect) -> Compiler {
    Compiler::new(dialect, "")
}

fn param<'a>(c: &'a Compiler, name: &str) -> Option<&'a Value> {
    c.params.get(name)
}
