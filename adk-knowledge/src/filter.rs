//! Compiles field constraints into the engine's filter expressions.
//!
//! A [`Filters`] map is turned into a [`FilterExpression`]: a conjunction of
//! equality and membership predicates. The expression renders into the
//! engine's native syntax through [`Display`](std::fmt::Display)
//! (`field:=value && field:=[a,b]`) and can also be evaluated structurally
//! by in-process engines.
//!
//! Field names are passed through as given. Whether a field exists is for
//! the engine to decide at query time.

use std::fmt;

use serde_json::Value;

/// Field constraints: scalar values mean equality, arrays mean membership.
pub type Filters = serde_json::Map<String, Value>;

/// A single constraint on one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// The field equals the value.
    Equals { field: String, value: Value },
    /// The field equals one of the values. An empty list matches nothing.
    In { field: String, values: Vec<Value> },
}

impl Predicate {
    /// The constrained field name.
    pub fn field(&self) -> &str {
        match self {
            Self::Equals { field, .. } | Self::In { field, .. } => field,
        }
    }

    /// Whether a field value satisfies this predicate.
    ///
    /// Array-valued fields match when any element does.
    pub fn accepts(&self, actual: &Value) -> bool {
        if let Value::Array(items) = actual {
            return items.iter().any(|item| self.accepts(item));
        }
        match self {
            Self::Equals { value, .. } => values_equal(value, actual),
            Self::In { values, .. } => values.iter().any(|v| values_equal(v, actual)),
        }
    }
}

/// Numbers compare by value so that `1` matches a stored `1.0`.
fn values_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => expected == actual,
    }
}

/// A conjunction of predicates, evaluated server-side.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpression {
    predicates: Vec<Predicate>,
}

impl FilterExpression {
    /// The ANDed predicates, in compilation order.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Whether some predicate is an empty membership list, so no document
    /// can match.
    pub fn matches_nothing(&self) -> bool {
        self.predicates
            .iter()
            .any(|p| matches!(p, Predicate::In { values, .. } if values.is_empty()))
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, predicate) in self.predicates.iter().enumerate() {
            if i > 0 {
                f.write_str(" && ")?;
            }
            match predicate {
                Predicate::Equals { field, value } => {
                    write!(f, "{field}:={}", render_value(value))?;
                }
                Predicate::In { field, values } => {
                    let rendered: Vec<String> = values.iter().map(render_value).collect();
                    write!(f, "{field}:=[{}]", rendered.join(","))?;
                }
            }
        }
        Ok(())
    }
}

/// Render a value as a filter literal. Strings that contain anything beyond
/// `[A-Za-z0-9_.-]` are wrapped in backticks.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => {
            let bare = !s.is_empty()
                && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
            if bare { s.clone() } else { quote(s) }
        }
        Value::Object(_) | Value::Array(_) => quote(&value.to_string()),
        other => other.to_string(),
    }
}

/// Wrap in backticks, escaping embedded backticks and backslashes.
fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('`');
    for c in s.chars() {
        if matches!(c, '`' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('`');
    quoted
}

/// Compile a filter map into an expression.
///
/// Returns `None` when there is nothing to filter on, so no filter clause is
/// sent at all.
pub fn compile_filters(filters: Option<&Filters>) -> Option<FilterExpression> {
    let filters = filters.filter(|f| !f.is_empty())?;
    let predicates = filters
        .iter()
        .map(|(field, value)| match value {
            Value::Array(values) => Predicate::In { field: field.clone(), values: values.clone() },
            scalar => Predicate::Equals { field: field.clone(), value: scalar.clone() },
        })
        .collect();
    Some(FilterExpression { predicates })
}
