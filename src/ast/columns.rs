use serde::{Deserialize, Serialize};

use crate::ast::raw::RawFragment;

/// Output coercion hint carried by a column token (`col[Type]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeHint {
    Str,
    Bool,
    Int,
    Number,
    Object,
    Json,
}

impl TypeHint {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "String" => Some(TypeHint::Str),
            "Bool" => Some(TypeHint::Bool),
            "Int" => Some(TypeHint::Int),
            "Number" => Some(TypeHint::Number),
            "Object" => Some(TypeHint::Object),
            "JSON" => Some(TypeHint::Json),
            _ => None,
        }
    }
}

/// One item of a column projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProjItem {
    /// A column token: `table.column(alias)[Type]`, optionally prefixed
    /// with `@` for DISTINCT. Parsed at compile/shape time.
    Col(String),
    /// A raw expression selected `AS` the column named by `key`
    /// (which may itself carry a type hint).
    Raw { key: String, fragment: RawFragment },
    /// A named nested group; flattened for SQL, rebuilt when shaping.
    Nested { name: String, items: Vec<ProjItem> },
}

/// The column projection of a read descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// The literal wildcard - rows pass through unshaped.
    All,
    /// Flat or nested list of items; result is a list of shaped rows.
    List(Vec<ProjItem>),
    /// Single-root nested mapping: rows are grouped into a map keyed by
    /// the root column's value.
    Grouped { key: String, items: Vec<ProjItem> },
}

impl Projection {
    pub fn all() -> Self {
        Projection::All
    }

    pub fn cols<S: Into<String>>(tokens: impl IntoIterator<Item = S>) -> Self {
        Projection::List(tokens.into_iter().map(|t| ProjItem::Col(t.into())).collect())
    }

    /// Single-column projection, convenient for aggregates.
    pub fn col(token: impl Into<String>) -> Self {
        Projection::List(vec![ProjItem::Col(token.into())])
    }

    pub fn grouped<S: Into<String>>(
        key: impl Into<String>,
        tokens: impl IntoIterator<Item = S>,
    ) -> Self {
        Projection::Grouped {
            key: key.into(),
            items: tokens.into_iter().map(|t| ProjItem::Col(t.into())).collect(),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Projection::All)
    }
}

/// Append an item to a list-shaped projection (no-op on the wildcard).
impl Projection {
    pub fn push(mut self, item: ProjItem) -> Self {
        match &mut self {
            Projection::List(items) | Projection::Grouped { items, .. } => items.push(item),
            Projection::All => {}
        }
        self
    }

    pub fn push_raw(self, key: impl Into<String>, fragment: RawFragment) -> Self {
        self.push(ProjItem::Raw {
            key: key.into(),
            fragment,
        })
    }

    pub fn push_nested<S: Into<String>>(
        self,
        name: impl Into<String>,
        tokens: impl IntoIterator<Item = S>,
    ) -> Self {
        self.push(ProjItem::Nested {
            name: name.into(),
            items: tokens.into_iter().map(|t| ProjItem::Col(t.into())).collect(),
        })
    }
}
