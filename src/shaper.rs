//! Result shaping: rebuild projection structure (aliases, nesting,
//! grouping) and apply type-hint coercions over raw result rows.

use std::collections::HashMap;

use serde_json::{Map, Value as Json};

use crate::ast::columns::{ProjItem, Projection, TypeHint};
use crate::error::{QuarryError, Result};
use crate::parser;

/// A raw row as fetched from the driver, keyed by result-set column name.
pub type Row = HashMap<String, Json>;

/// Shape a batch of rows according to the projection. `Projection::All`
/// passes rows through untouched; `Grouped` keys an object by the root
/// column's value, keeping the first row seen per key.
pub fn shape_rows(proj: &Projection, rows: Vec<Row>) -> Result<Json> {
    match proj {
        Projection::All => Ok(Json::Array(
            rows.into_iter()
                .map(|row| Json::Object(row.into_iter().collect()))
                .collect(),
        )),
        Projection::List(items) => {
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                out.push(shape_items(items, &row)?);
            }
            Ok(Json::Array(out))
        }
        Projection::Grouped { key, items } => {
            let token = parser::column_token(key)?;
            let mut out = Map::new();
            for row in rows {
                let group = row
                    .get(token.row_key())
                    .map(json_to_key)
                    .ok_or_else(|| {
                        QuarryError::Coercion {
                            column: key.clone(),
                            message: "grouping column missing from result row".to_string(),
                        }
                    })?;
                if !out.contains_key(&group) {
                    out.insert(group, shape_items(items, &row)?);
                }
            }
            Ok(Json::Object(out))
        }
    }
}

/// Shape a single row (the `get` path). Collapses to the bare value when
/// the projection is a single plain column.
pub fn shape_row(proj: &Projection, row: &Row) -> Result<Json> {
    match proj {
        Projection::All => Ok(Json::Object(row.clone().into_iter().collect())),
        Projection::List(items) => {
            if let [ProjItem::Col(token)] = items.as_slice() {
                let parsed = parser::column_token(token)?;
                let value = row.get(parsed.row_key()).cloned().unwrap_or(Json::Null);
                return coerce(&parsed.column, parsed.hint, value);
            }
            shape_items(items, row)
        }
        Projection::Grouped { key, items } => {
            let mut all = vec![ProjItem::Col(key.clone())];
            all.extend(items.iter().cloned());
            shape_items(&all, row)
        }
    }
}

fn shape_items(items: &[ProjItem], row: &Row) -> Result<Json> {
    let mut out = Map::new();
    for item in items {
        match item {
            ProjItem::Col(token) => {
                let parsed = parser::column_token(token)?;
                let value = row.get(parsed.row_key()).cloned().unwrap_or(Json::Null);
                out.insert(
                    parsed.row_key().to_string(),
                    coerce(&parsed.column, parsed.hint, value)?,
                );
            }
            ProjItem::Raw { key, .. } => {
                let parsed = parser::column_token(key)?;
                let value = row.get(parsed.row_key()).cloned().unwrap_or(Json::Null);
                // Raw expressions produce driver-native values; decoding
                // them as stored JSON text would be wrong.
                let hint = match parsed.hint {
                    Some(TypeHint::Object) | Some(TypeHint::Json) => None,
                    hint => hint,
                };
                out.insert(
                    parsed.row_key().to_string(),
                    coerce(&parsed.column, hint, value)?,
                );
            }
            ProjItem::Nested { name, items } => {
                out.insert(name.clone(), shape_items(items, row)?);
            }
        }
    }
    Ok(Json::Object(out))
}

/// Apply a type hint to one fetched value. NULL bypasses coercion.
fn coerce(column: &str, hint: Option<TypeHint>, value: Json) -> Result<Json> {
    let Some(hint) = hint else {
        return Ok(value);
    };
    if value.is_null() {
        return Ok(Json::Null);
    }
    let fail = |message: &str| QuarryError::Coercion {
        column: column.to_string(),
        message: message.to_string(),
    };
    match hint {
        TypeHint::Str => Ok(Json::String(json_to_key(&value))),
        TypeHint::Int => match &value {
            Json::Number(n) => n
                .as_i64()
                .map(Json::from)
                .ok_or_else(|| fail("value out of integer range")),
            Json::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Json::from)
                .map_err(|_| fail("cannot parse integer")),
            Json::Bool(b) => Ok(Json::from(*b as i64)),
            _ => Err(fail("cannot coerce to integer")),
        },
        TypeHint::Number => match &value {
            Json::Number(n) => n
                .as_f64()
                .and_then(serde_json::Number::from_f64)
                .map(Json::Number)
                .ok_or_else(|| fail("non-finite number")),
            Json::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Json::Number)
                .ok_or_else(|| fail("cannot parse number")),
            Json::Bool(b) => Ok(Json::from(*b as i64 as f64)),
            _ => Err(fail("cannot coerce to number")),
        },
        TypeHint::Bool => match &value {
            Json::Bool(b) => Ok(Json::Bool(*b)),
            Json::Number(n) => Ok(Json::Bool(n.as_f64().map(|f| f != 0.0).unwrap_or(true))),
            Json::String(s) => Ok(Json::Bool(!matches!(
                s.trim(),
                "" | "0" | "false" | "FALSE"
            ))),
            _ => Err(fail("cannot coerce to boolean")),
        },
        TypeHint::Object | TypeHint::Json => match &value {
            Json::String(s) => {
                serde_json::from_str(s).map_err(|e| fail(&format!("invalid JSON: {e}")))
            }
            other => Ok(other.clone()),
        },
    }
}

/// Render a value as a grouping key the way it prints in a result map.
fn json_to_key(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        Json::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn row(pairs: &[(&str, Json)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_shape_alias_and_hint() {
        let proj = Projection::cols(["id[Int]", "users.name(label)"]);
        let rows = vec![row(&[("id", json!("7")), ("label", json!("kim"))])];
        let shaped = shape_rows(&proj, rows).unwrap();
        assert_eq!(shaped, json!([{"id": 7, "label": "kim"}]));
    }

    #[test]
    fn test_shape_nested_group() {
        let proj =
            Projection::cols(["id"]).push_nested("profile", ["email", "city"]);
        let rows = vec![row(&[
            ("id", json!(1)),
            ("email", json!("a@b.c")),
            ("city", json!("Oslo")),
        ])];
        let shaped = shape_rows(&proj, rows).unwrap();
        assert_eq!(
            shaped,
            json!([{"id": 1, "profile": {"email": "a@b.c", "city": "Oslo"}}])
        );
    }

    #[test]
    fn test_shape_grouped_keeps_first() {
        let proj = Projection::grouped("id", ["name"]);
        let rows = vec![
            row(&[("id", json!(1)), ("name", json!("first"))]),
            row(&[("id", json!(1)), ("name", json!("dup"))]),
            row(&[("id", json!(2)), ("name", json!("second"))]),
        ];
        let shaped = shape_rows(&proj, rows).unwrap();
        assert_eq!(
            shaped,
            json!({"1": {"name": "first"}, "2": {"name": "second"}})
        );
    }

    #[test]
    fn test_single_column_get_collapses() {
        let proj = Projection::col("email");
        let shaped = shape_row(&proj, &row(&[("email", json!("a@b.c"))])).unwrap();
        assert_eq!(shaped, json!("a@b.c"));
    }

    #[test]
    fn test_json_hint_decodes_text() {
        let proj = Projection::col("meta[JSON]");
        let shaped =
            shape_row(&proj, &row(&[("meta", json!("{\"k\":[1,2]}"))])).unwrap();
        assert_eq!(shaped, json!({"k": [1, 2]}));
    }

    #[test]
    fn test_bool_hint_is_lenient() {
        let proj = Projection::col("active[Bool]");
        assert_eq!(
            shape_row(&proj, &row(&[("active", json!("0"))])).unwrap(),
            json!(false)
        );
        assert_eq!(
            shape_row(&proj, &row(&[("active", json!(1))])).unwrap(),
            json!(true)
        );
    }

    #[test]
    fn test_null_bypasses_coercion() {
        let proj = Projection::col("age[Int]");
        assert_eq!(
            shape_row(&proj, &row(&[("age", Json::Null)])).unwrap(),
            Json::Null
        );
    }

    #[test]
    fn test_bad_integer_reports_column() {
        let proj = Projection::col("age[Int]");
        let err = shape_row(&proj, &row(&[("age", json!("not a number"))])).unwrap_err();
        assert!(err.to_string().contains("age"));
    }
}
