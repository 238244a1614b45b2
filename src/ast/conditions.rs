use serde::{Deserialize, Serialize};

use crate::ast::raw::RawFragment;
use crate::ast::values::Value;

/// Comparison operator carried by a condition key (`col[op]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// `~` - LIKE
    Like,
    /// `!~` - NOT LIKE
    NotLike,
    /// `<>` - BETWEEN over a two-element list
    Between,
    /// `><` - NOT BETWEEN over a two-element list
    NotBetween,
    Regexp,
}

impl Operator {
    /// Parse the operator token between brackets. Returns `None` for
    /// unknown tokens so the caller can raise `UnsupportedOperator` with
    /// the offending column name attached.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "=" => Some(Operator::Eq),
            "!" | "!=" => Some(Operator::Ne),
            ">" => Some(Operator::Gt),
            ">=" => Some(Operator::Gte),
            "<" => Some(Operator::Lt),
            "<=" => Some(Operator::Lte),
            "~" => Some(Operator::Like),
            "!~" => Some(Operator::NotLike),
            "<>" => Some(Operator::Between),
            "><" => Some(Operator::NotBetween),
            "REGEXP" => Some(Operator::Regexp),
            _ => None,
        }
    }

    /// Whether the operator compares magnitudes (`>`, `>=`, `<`, `<=`).
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT BETWEEN",
            Operator::Regexp => "REGEXP",
        }
    }
}

/// Conjunction joining sibling conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn keyword(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}

/// A single node of the filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entry {
    /// `key` follows the condition micro-grammar (`col`, `col[op]`, or the
    /// list-form column comparison `col[op]other.col`); parsed at compile
    /// time.
    Cond { key: String, value: Value },
    /// Parenthesized sub-group joined with its own conjunction.
    Group { op: LogicalOp, entries: Vec<Entry> },
    /// Literal SQL spliced in place of a condition.
    Raw(RawFragment),
}

/// Sort direction for an ORDER BY column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sort {
    Asc,
    Desc,
}

impl Sort {
    pub fn keyword(&self) -> &'static str {
        match self {
            Sort::Asc => "ASC",
            Sort::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderItem {
    /// Plain column with explicit direction.
    Column { column: String, sort: Sort },
    /// Bare column, direction left to the backend default.
    Bare(String),
    /// `FIELD(col, v1, v2, ...)` ordinal ordering over an explicit value
    /// list; values are inlined as quoted literals.
    Field { column: String, values: Vec<Value> },
    Raw(RawFragment),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GroupBy {
    Columns(Vec<String>),
    Raw(RawFragment),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Having {
    Entries(Vec<Entry>),
    Raw(RawFragment),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limit {
    pub count: u64,
    pub offset: Option<u64>,
}

/// MySQL full-text search mode keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMode {
    Natural,
    NaturalQuery,
    Boolean,
    Query,
}

impl MatchMode {
    pub fn keywords(&self) -> &'static str {
        match self {
            MatchMode::Natural => "IN NATURAL LANGUAGE MODE",
            MatchMode::NaturalQuery => "IN NATURAL LANGUAGE MODE WITH QUERY EXPANSION",
            MatchMode::Boolean => "IN BOOLEAN MODE",
            MatchMode::Query => "WITH QUERY EXPANSION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchClause {
    pub columns: Vec<String>,
    pub keyword: String,
    pub mode: Option<MatchMode>,
}

/// The filter tree plus its clause modifiers - everything that follows
/// `FROM table [joins]` in a compiled statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    pub entries: Vec<Entry>,
    pub group: Option<GroupBy>,
    pub having: Option<Having>,
    pub order: Vec<OrderItem>,
    pub limit: Option<Limit>,
    pub match_clause: Option<MatchClause>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition; siblings at the root join with AND.
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push(Entry::Cond {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Nest a parenthesized group whose members join with AND.
    pub fn all(mut self, group: Criteria) -> Self {
        self.entries.push(Entry::Group {
            op: LogicalOp::And,
            entries: group.entries,
        });
        self
    }

    /// Nest a parenthesized group whose members join with OR.
    pub fn any(mut self, group: Criteria) -> Self {
        self.entries.push(Entry::Group {
            op: LogicalOp::Or,
            entries: group.entries,
        });
        self
    }

    /// Splice a raw fragment in condition position.
    pub fn raw_filter(mut self, fragment: RawFragment) -> Self {
        self.entries.push(Entry::Raw(fragment));
        self
    }

    pub fn group_by<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.group = Some(GroupBy::Columns(
            columns.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn group_by_raw(mut self, fragment: RawFragment) -> Self {
        self.group = Some(GroupBy::Raw(fragment));
        self
    }

    pub fn having(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let entry = Entry::Cond {
            key: key.into(),
            value: value.into(),
        };
        match &mut self.having {
            Some(Having::Entries(entries)) => entries.push(entry),
            _ => self.having = Some(Having::Entries(vec![entry])),
        }
        self
    }

    pub fn having_raw(mut self, fragment: RawFragment) -> Self {
        self.having = Some(Having::Raw(fragment));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, sort: Sort) -> Self {
        self.order.push(OrderItem::Column {
            column: column.into(),
            sort,
        });
        self
    }

    /// Ordinal ordering over an explicit value list (`FIELD(col, ...)`).
    pub fn order_field<V: Into<Value>>(
        mut self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.order.push(OrderItem::Field {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Bare ORDER BY column, direction left to the backend default.
    pub fn order_bare(mut self, column: impl Into<String>) -> Self {
        self.order.push(OrderItem::Bare(column.into()));
        self
    }

    pub fn order_raw(mut self, fragment: RawFragment) -> Self {
        self.order.push(OrderItem::Raw(fragment));
        self
    }

    pub fn limit(mut self, count: u64) -> Self {
        self.limit = Some(Limit {
            count,
            offset: None,
        });
        self
    }

    pub fn limit_offset(mut self, offset: u64, count: u64) -> Self {
        self.limit = Some(Limit {
            count,
            offset: Some(offset),
        });
        self
    }

    /// MySQL `MATCH (columns) AGAINST (keyword [mode])`; ignored by other
    /// dialects.
    pub fn match_against<S: Into<String>>(
        mut self,
        columns: impl IntoIterator<Item = S>,
        keyword: impl Into<String>,
        mode: Option<MatchMode>,
    ) -> Self {
        self.match_clause = Some(MatchClause {
            columns: columns.into_iter().map(Into::into).collect(),
            keyword: keyword.into(),
            mode,
        });
        self
    }

    /// Whether any clause at all was set. An empty criteria compiles to
    /// nothing, so `delete` with one wipes the table (no guard, as
    /// documented).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
            && self.group.is_none()
            && self.having.is_none()
            && self.order.is_empty()
            && self.limit.is_none()
            && self.match_clause.is_none()
    }
}
