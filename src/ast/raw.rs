use serde::{Deserialize, Serialize};

use crate::ast::values::Value;

/// An escape-hatch literal SQL fragment.
///
/// The text may reference tables and columns as `<name>` tokens, which the
/// compiler resolves into quoted, prefixed identifiers. Parameters carried
/// by the fragment are merged into the enclosing statement's parameter
/// map.
///
/// This is a deliberate trust boundary: the text itself is spliced into
/// the statement verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFragment {
    pub text: String,
    pub params: Vec<(String, Value)>,
}

impl RawFragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    /// Attach a named parameter referenced by the fragment text.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}

/// Shorthand constructor, mirroring the facade-level `raw(...)` helper.
pub fn raw(text: impl Into<String>) -> RawFragment {
    RawFragment::new(text)
}
