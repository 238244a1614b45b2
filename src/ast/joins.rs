use serde::{Deserialize, Serialize};

use crate::ast::conditions::Entry;
use crate::ast::raw::RawFragment;
use crate::ast::values::Value;

/// Join direction, keyed by the bracket token in a join key
/// (`[>]` LEFT, `[<]` RIGHT, `[<>]` FULL, `[><]` INNER).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Left,
    Right,
    Full,
    Inner,
}

impl JoinKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
            JoinKind::Full => "FULL",
            JoinKind::Inner => "INNER",
        }
    }
}

/// How a joined table relates to the main table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JoinRelation {
    /// `USING (col1, col2, ...)` - shared column names.
    Using(Vec<String>),
    /// `ON a.col = b.col [AND ...]` equality pairs, with optional extra
    /// condition entries recursing into the condition compiler.
    On {
        pairs: Vec<(String, String)>,
        extra: Vec<Entry>,
    },
    /// Literal relation text, spliced verbatim.
    Raw(RawFragment),
}

impl JoinRelation {
    pub fn using<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        JoinRelation::Using(columns.into_iter().map(Into::into).collect())
    }

    pub fn on<A: Into<String>, B: Into<String>>(
        pairs: impl IntoIterator<Item = (A, B)>,
    ) -> Self {
        JoinRelation::On {
            pairs: pairs
                .into_iter()
                .map(|(a, b)| (a.into(), b.into()))
                .collect(),
            extra: Vec::new(),
        }
    }

    /// Attach additional AND conditions to an ON relation.
    pub fn and(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let JoinRelation::On { extra, .. } = &mut self {
            extra.push(Entry::Cond {
                key: key.into(),
                value: value.into(),
            });
        }
        self
    }
}

/// A parsed join target - what a `[dir]table(alias)` key resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub alias: Option<String>,
}

/// Ordered join specification. Keys follow the `[dir]table(alias)`
/// micro-grammar; a key that fails to parse is skipped at compile time
/// with a warning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub entries: Vec<(String, JoinRelation)>,
}

impl JoinSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(mut self, key: impl Into<String>, relation: JoinRelation) -> Self {
        self.entries.push((key.into(), relation));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
