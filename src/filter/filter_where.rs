use std::cmp::Ordering;

use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterOp, WhereClause};

pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self { param_values: vec![], param_index: starting_param_index }
    }

    /// Normalize the `filters` member of a request.
    ///
    /// Each entry is `[column, op, value]`, `[column, value]` (equality) or
    /// `{ "column": .., "operator": .., "value": .. }`.
    pub fn validate_and_parse(filters: &Value) -> Result<Vec<WhereClause>, FilterError> {
        match filters {
            Value::Null => Ok(vec![]),
            Value::Array(entries) => entries.iter().map(Self::parse_entry).collect(),
            other => Err(FilterError::InvalidFilter(format!("filters must be an array, got {}", other))),
        }
    }

    fn parse_entry(entry: &Value) -> Result<WhereClause, FilterError> {
        match entry {
            Value::Array(items) => match items.as_slice() {
                [Value::String(column), value] => Ok(WhereClause::eq(Self::column(column)?, value.clone())),
                [Value::String(column), Value::String(op), value] => {
                    Self::clause(column, op, value.clone())
                }
                _ => Err(FilterError::InvalidFilter(format!(
                    "expected [column, operator, value], got {}",
                    entry
                ))),
            },
            Value::Object(obj) => {
                let column = obj
                    .get("column")
                    .and_then(Value::as_str)
                    .ok_or_else(|| FilterError::InvalidFilter(format!("filter is missing a column: {}", entry)))?;
                let op = obj.get("operator").and_then(Value::as_str).unwrap_or("=");
                let value = obj.get("value").cloned().unwrap_or(Value::Null);
                Self::clause(column, op, value)
            }
            other => Err(FilterError::InvalidFilter(format!("unsupported filter entry: {}", other))),
        }
    }

    fn clause(column: &str, op: &str, value: Value) -> Result<WhereClause, FilterError> {
        let operator = FilterOp::parse(op)?;
        if operator == FilterOp::In && !value.is_array() {
            return Err(FilterError::InvalidOperatorData(format!("$in on '{}' requires an array", column)));
        }
        Ok(WhereClause::new(Self::column(column)?, operator, value))
    }

    fn column(name: &str) -> Result<String, FilterError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(FilterError::InvalidColumn("Column name cannot be empty".to_string()));
        }
        Ok(trimmed.to_string())
    }

    /// Render clauses as an AND-joined SQL predicate with `$n` placeholders
    pub fn generate(clauses: &[WhereClause], starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        let mut sql_conditions = Vec::with_capacity(clauses.len());
        for clause in clauses {
            sql_conditions.push(filter_where.build_sql_condition(clause)?);
        }
        let where_clause = if sql_conditions.is_empty() { "1=1".to_string() } else { sql_conditions.join(" AND ") };
        Ok((where_clause, filter_where.param_values))
    }

    fn build_sql_condition(&mut self, condition: &WhereClause) -> Result<String, FilterError> {
        let quoted_column = quote_column(&condition.column)?;
        let data = &condition.value;
        Ok(match condition.operator {
            FilterOp::Eq if data.is_null() => format!("{} IS NULL", quoted_column),
            FilterOp::Eq => format!("{} = {}", quoted_column, self.param(data.clone())),
            FilterOp::Neq if data.is_null() => format!("{} IS NOT NULL", quoted_column),
            FilterOp::Neq => format!("{} <> {}", quoted_column, self.param(data.clone())),
            FilterOp::Gt => format!("{} > {}", quoted_column, self.param(data.clone())),
            FilterOp::Gte => format!("{} >= {}", quoted_column, self.param(data.clone())),
            FilterOp::Lt => format!("{} < {}", quoted_column, self.param(data.clone())),
            FilterOp::Lte => format!("{} <= {}", quoted_column, self.param(data.clone())),
            FilterOp::Like => format!("{} LIKE {}", quoted_column, self.param(data.clone())),
            FilterOp::ILike => format!("{} ILIKE {}", quoted_column, self.param(data.clone())),
            FilterOp::In => match data {
                Value::Array(values) if values.is_empty() => "1=0".to_string(),
                Value::Array(values) => {
                    let params: Vec<String> = values.iter().map(|v| self.param(v.clone())).collect();
                    format!("{} IN ({})", quoted_column, params.join(", "))
                }
                _ => return Err(FilterError::InvalidOperatorData("$in requires an array".to_string())),
            },
        })
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }

    /// Evaluate a clause against an in-memory field value
    pub fn evaluate(condition: &WhereClause, field: Option<&Value>) -> bool {
        let field = field.unwrap_or(&Value::Null);
        let data = &condition.value;
        match condition.operator {
            FilterOp::Eq => loose_eq(field, data),
            FilterOp::Neq => !loose_eq(field, data),
            FilterOp::Gt => !field.is_null() && compare_values(field, data) == Ordering::Greater,
            FilterOp::Gte => !field.is_null() && compare_values(field, data) != Ordering::Less,
            FilterOp::Lt => !field.is_null() && compare_values(field, data) == Ordering::Less,
            FilterOp::Lte => !field.is_null() && compare_values(field, data) != Ordering::Greater,
            FilterOp::Like => match (field.as_str(), data.as_str()) {
                (Some(text), Some(pattern)) => like_match(text, pattern),
                _ => false,
            },
            FilterOp::ILike => match (field.as_str(), data.as_str()) {
                (Some(text), Some(pattern)) => like_match(&text.to_lowercase(), &pattern.to_lowercase()),
                _ => false,
            },
            FilterOp::In => data
                .as_array()
                .map(|values| values.iter().any(|v| loose_eq(field, v)))
                .unwrap_or(false),
        }
    }
}

/// Quote a possibly table-qualified column: `posts.id` -> `"posts"."id"`
pub fn quote_column(column: &str) -> Result<String, FilterError> {
    column
        .split('.')
        .map(|part| {
            validate_identifier(part).map_err(|_| FilterError::InvalidColumn(format!("Invalid column name format: {}", column)))?;
            Ok(format!("\"{}\"", part))
        })
        .collect::<Result<Vec<_>, FilterError>>()
        .map(|parts| parts.join("."))
}

pub fn validate_identifier(name: &str) -> Result<(), FilterError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => (first.is_alphabetic() || first == '_') && chars.all(|c| c.is_alphanumeric() || c == '_'),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(FilterError::InvalidTableName(format!("Invalid identifier format: {}", name)))
    }
}

/// Total order over JSON values: null < bool < number < string < array < object
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Ordering::Equal,
        _ => a == b,
    }
}

/// SQL LIKE semantics: `%` any run, `_` any single character
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == '%')
}
