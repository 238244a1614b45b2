//! nom parsers for the descriptor micro-grammar.
//!
//! The grammar is small and token-shaped rather than statement-shaped:
//! identifiers, `table.column(alias)[Type]` projection tokens,
//! `column[op]` condition keys, `[dir]table(alias)` join keys, and
//! `table(alias)` references. Each public function consumes its whole
//! input and maps failures onto the crate error taxonomy.

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1, take_while_m_n};
use nom::character::complete::{char, multispace0};
use nom::combinator::{all_consuming, opt, recognize};
use nom::sequence::{delimited, pair, preceded};
use nom::IResult;

use crate::ast::columns::TypeHint;
use crate::ast::joins::{Join, JoinKind};
use crate::ast::Operator;
use crate::error::{QuarryError, Result};

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '@' | '$' | '#' | '-' | '_')
}

/// `[letter_][letters digits @$#-_]*`
fn ident(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while_m_n(1, 1, is_ident_start),
        take_while(is_ident_char),
    ))(input)
}

/// `ident` or `ident.ident`
fn qualified(input: &str) -> IResult<&str, &str> {
    recognize(pair(ident, opt(pair(char('.'), ident))))(input)
}

fn alias(input: &str) -> IResult<&str, &str> {
    preceded(
        multispace0,
        delimited(char('('), ident, char(')')),
    )(input)
}

fn bracketed(input: &str) -> IResult<&str, &str> {
    preceded(
        multispace0,
        delimited(char('['), take_while1(|c| c != ']'), char(']')),
    )(input)
}

/// Validate a bare table or column name against the identifier grammar.
pub fn validate_identifier(name: &str) -> Result<()> {
    all_consuming(ident)(name)
        .map(|_| ())
        .map_err(|_: nom::Err<nom::error::Error<&str>>| {
            QuarryError::InvalidIdentifier(name.to_string())
        })
}

/// Validate a column name, which may carry a single `.` qualifier.
pub fn validate_column(name: &str) -> Result<()> {
    all_consuming(qualified)(name)
        .map(|_| ())
        .map_err(|_: nom::Err<nom::error::Error<&str>>| {
            QuarryError::InvalidIdentifier(name.to_string())
        })
}

/// A parsed projection token.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnToken {
    pub column: String,
    pub alias: Option<String>,
    pub hint: Option<TypeHint>,
    pub distinct: bool,
}

impl ColumnToken {
    /// The key this column appears under in a result row: the alias when
    /// present, otherwise the column name with any table qualifier
    /// stripped.
    pub fn row_key(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self
                .column
                .rsplit_once('.')
                .map(|(_, col)| col)
                .unwrap_or(&self.column),
        }
    }
}

/// `[@]table.column(alias)[Type]`
pub fn column_token(input: &str) -> Result<ColumnToken> {
    let parse = |i| -> IResult<&str, (bool, &str, Option<&str>, Option<&str>)> {
        let (i, distinct) = opt(char('@'))(i)?;
        let (i, column) = qualified(i)?;
        let (i, alias) = opt(alias)(i)?;
        let (i, hint) = opt(bracketed)(i)?;
        Ok((i, (distinct.is_some(), column, alias, hint)))
    };
    let (_, (distinct, column, alias, hint_raw)) = all_consuming(parse)(input)
        .map_err(|_| QuarryError::Descriptor(format!("bad column token '{input}'")))?;
    // An unknown bracketed word is a descriptor bug, not a silent no-hint.
    let hint = match hint_raw {
        Some(word) => Some(TypeHint::parse(word).ok_or_else(|| {
            QuarryError::Descriptor(format!(
                "unknown type hint '[{word}]' in column token '{input}'"
            ))
        })?),
        None => None,
    };
    Ok(ColumnToken {
        column: column.to_string(),
        alias: alias.map(str::to_string),
        hint,
        distinct,
    })
}

/// A parsed condition key.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionKey {
    pub column: String,
    pub operator: Option<Operator>,
    /// Right-hand column of a column-to-column comparison
    /// (`a.col[>=]b.col`).
    pub rhs_column: Option<String>,
}

/// `column`, `column[op]`, or `column[op]other.column`.
pub fn condition_key(input: &str) -> Result<ConditionKey> {
    let parse = |i| -> IResult<&str, (&str, Option<&str>, Option<&str>)> {
        let (i, column) = qualified(i)?;
        let (i, op) = opt(bracketed)(i)?;
        let (i, rhs) = opt(qualified)(i)?;
        Ok((i, (column, op, rhs)))
    };
    let (_, (column, op, rhs)) = all_consuming(parse)(input)
        .map_err(|_| QuarryError::Descriptor(format!("bad condition key '{input}'")))?;
    let operator = match op {
        Some(token) => Some(Operator::parse(token).ok_or_else(|| {
            QuarryError::UnsupportedOperator {
                column: column.to_string(),
                operator: token.to_string(),
            }
        })?),
        None => None,
    };
    Ok(ConditionKey {
        column: column.to_string(),
        operator,
        rhs_column: rhs.map(str::to_string),
    })
}

fn join_direction(input: &str) -> IResult<&str, JoinKind> {
    // Two-character tokens first: "><" and "<>" both start like their
    // one-character cousins.
    let (input, token) = alt((tag("><"), tag("<>"), tag(">"), tag("<")))(input)?;
    let kind = match token {
        ">" => JoinKind::Left,
        "<" => JoinKind::Right,
        "<>" => JoinKind::Full,
        _ => JoinKind::Inner,
    };
    Ok((input, kind))
}

/// `[dir]table(alias)`. Returns `None` on malformed keys; the join
/// compiler skips those (with a warning) instead of failing the whole
/// statement.
pub fn join_key(input: &str) -> Option<Join> {
    let parse = |i| -> IResult<&str, Join> {
        let (i, kind) = delimited(char('['), join_direction, char(']'))(i)?;
        let (i, table) = preceded(multispace0, ident)(i)?;
        let (i, alias) = opt(alias)(i)?;
        Ok((
            i,
            Join {
                kind,
                table: table.to_string(),
                alias: alias.map(str::to_string),
            },
        ))
    };
    all_consuming(parse)(input).ok().map(|(_, join)| join)
}

/// `table` or `table(alias)`.
pub fn table_ref(input: &str) -> Result<(String, Option<String>)> {
    let parse = |i| -> IResult<&str, (&str, Option<&str>)> {
        let (i, table) = ident(i)?;
        let (i, alias) = opt(alias)(i)?;
        Ok((i, (table, alias)))
    };
    let (_, (table, alias)) = all_consuming(parse)(input)
        .map_err(|_| QuarryError::InvalidIdentifier(input.to_string()))?;
    Ok((table.to_string(), alias.map(str::to_string)))
}

/// Arithmetic modifier on an update key (`col[+]` renders
/// `col = col + value`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl UpdateOp {
    pub fn symbol(&self) -> char {
        match self {
            UpdateOp::Add => '+',
            UpdateOp::Sub => '-',
            UpdateOp::Mul => '*',
            UpdateOp::Div => '/',
        }
    }
}

/// A parsed insert/update data key: `col`, `col[JSON]`, or `col[+|-|*|/]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataKey {
    pub column: String,
    pub json: bool,
    pub arithmetic: Option<UpdateOp>,
}

pub fn data_key(input: &str) -> Result<DataKey> {
    let parse = |i| -> IResult<&str, (&str, Option<&str>)> {
        let (i, column) = qualified(i)?;
        let (i, modifier) = opt(bracketed)(i)?;
        Ok((i, (column, modifier)))
    };
    let (_, (column, modifier)) = all_consuming(parse)(input)
        .map_err(|_| QuarryError::Descriptor(format!("bad data key '{input}'")))?;
    let mut json = false;
    let mut arithmetic = None;
    match modifier {
        None => {}
        Some("JSON") => json = true,
        Some("+") => arithmetic = Some(UpdateOp::Add),
        Some("-") => arithmetic = Some(UpdateOp::Sub),
        Some("*") => arithmetic = Some(UpdateOp::Mul),
        Some("/") => arithmetic = Some(UpdateOp::Div),
        Some(other) => {
            return Err(QuarryError::Descriptor(format!(
                "unknown data key modifier '[{other}]' on '{column}'"
            )))
        }
    }
    Ok(DataKey {
        column: column.to_string(),
        json,
        arithmetic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("_tmp$2").is_ok());
        assert!(validate_identifier("9lives").is_err());
        assert!(validate_identifier("users; DROP TABLE x").is_err());
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn test_validate_column_dotted() {
        assert!(validate_column("users.name").is_ok());
        assert!(validate_column("users.name.extra").is_err());
    }

    #[test]
    fn test_column_token_full() {
        let token = column_token("users.name(label)[String]").unwrap();
        assert_eq!(token.column, "users.name");
        assert_eq!(token.alias.as_deref(), Some("label"));
        assert_eq!(token.hint, Some(TypeHint::Str));
        assert!(!token.distinct);
        assert_eq!(token.row_key(), "label");
    }

    #[test]
    fn test_column_token_distinct_and_row_key() {
        let token = column_token("@users.email").unwrap();
        assert!(token.distinct);
        assert_eq!(token.row_key(), "email");
    }

    #[test]
    fn test_column_token_unknown_hint() {
        assert!(column_token("name[Float]").is_err());
    }

    #[test]
    fn test_condition_key_plain_and_operator() {
        let key = condition_key("age").unwrap();
        assert_eq!(key.operator, None);
        let key = condition_key("age[>=]").unwrap();
        assert_eq!(key.operator, Some(Operator::Gte));
    }

    #[test]
    fn test_condition_key_column_comparison() {
        let key = condition_key("posts.author_id[=]users.id").unwrap();
        assert_eq!(key.column, "posts.author_id");
        assert_eq!(key.rhs_column.as_deref(), Some("users.id"));
    }

    #[test]
    fn test_condition_key_unknown_operator() {
        let err = condition_key("age[=>]").unwrap_err();
        assert!(matches!(
            err,
            QuarryError::UnsupportedOperator { .. }
        ));
    }

    #[test]
    fn test_join_key_directions() {
        assert_eq!(join_key("[>]accounts").unwrap().kind, JoinKind::Left);
        assert_eq!(join_key("[<]accounts").unwrap().kind, JoinKind::Right);
        assert_eq!(join_key("[<>]accounts").unwrap().kind, JoinKind::Full);
        assert_eq!(join_key("[><]accounts").unwrap().kind, JoinKind::Inner);
    }

    #[test]
    fn test_join_key_alias_and_failure() {
        let join = join_key("[>]accounts(a)").unwrap();
        assert_eq!(join.table, "accounts");
        assert_eq!(join.alias.as_deref(), Some("a"));
        assert!(join_key("accounts").is_none());
        assert!(join_key("[?]accounts").is_none());
    }

    #[test]
    fn test_table_ref() {
        assert_eq!(
            table_ref("users(u)").unwrap(),
            ("users".to_string(), Some("u".to_string()))
        );
        assert!(table_ref("users u").is_err());
    }

    #[test]
    fn test_data_key() {
        let key = data_key("meta[JSON]").unwrap();
        assert!(key.json);
        let key = data_key("count[+]").unwrap();
        assert_eq!(key.arithmetic, Some(UpdateOp::Add));
        assert!(data_key("count[%]").is_err());
    }
}
