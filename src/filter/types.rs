use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::FilterError;

/// Comparison operators accepted in filter clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$ne")] Neq,
    #[serde(rename = "$gt")] Gt,
    #[serde(rename = "$gte")] Gte,
    #[serde(rename = "$lt")] Lt,
    #[serde(rename = "$lte")] Lte,
    #[serde(rename = "$like")] Like,
    #[serde(rename = "$ilike")] ILike,
    #[serde(rename = "$in")] In,
}

impl FilterOp {
    /// Map both the SQL-ish (`=`, `<>`) and the `$op` spellings
    pub fn parse(op: &str) -> Result<Self, FilterError> {
        Ok(match op.to_ascii_lowercase().as_str() {
            "=" | "==" | "$eq" => FilterOp::Eq,
            "!=" | "<>" | "$ne" | "$neq" => FilterOp::Neq,
            ">" | "$gt" => FilterOp::Gt,
            ">=" | "$gte" => FilterOp::Gte,
            "<" | "$lt" => FilterOp::Lt,
            "<=" | "$lte" => FilterOp::Lte,
            "like" | "$like" => FilterOp::Like,
            "ilike" | "$ilike" => FilterOp::ILike,
            "in" | "$in" => FilterOp::In,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }
}

/// A single `column <op> value` predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereClause {
    pub column: String,
    pub operator: FilterOp,
    pub value: Value,
}

impl WhereClause {
    pub fn new(column: impl Into<String>, operator: FilterOp, value: impl Into<Value>) -> Self {
        Self { column: column.into(), operator, value: value.into() }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, value)
    }

    /// Copy of this clause with the column prefixed by `table.`
    ///
    /// Already-qualified columns are left alone.
    pub fn qualified(&self, table: &str) -> Self {
        Self {
            column: qualify(table, &self.column),
            operator: self.operator,
            value: self.value.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(direction: &str) -> Result<Self, FilterError> {
        if direction.eq_ignore_ascii_case("asc") {
            Ok(SortDirection::Asc)
        } else if direction.eq_ignore_ascii_case("desc") {
            Ok(SortDirection::Desc)
        } else {
            Err(FilterError::InvalidDirection(direction.to_string()))
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    pub attribute: String,
    pub direction: SortDirection,
}

impl OrderSpec {
    pub fn new(attribute: impl Into<String>, direction: SortDirection) -> Self {
        Self { attribute: attribute.into(), direction }
    }
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}

pub fn qualify(table: &str, column: &str) -> String {
    if column.contains('.') {
        column.to_string()
    } else {
        format!("{}.{}", table, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_both_operator_spellings() {
        assert_eq!(FilterOp::parse("=").unwrap(), FilterOp::Eq);
        assert_eq!(FilterOp::parse("$eq").unwrap(), FilterOp::Eq);
        assert_eq!(FilterOp::parse("<>").unwrap(), FilterOp::Neq);
        assert_eq!(FilterOp::parse("LIKE").unwrap(), FilterOp::Like);
        assert!(FilterOp::parse("~=").is_err());
    }

    #[test]
    fn qualifies_bare_columns_only() {
        let clause = WhereClause::eq("id", json!(1));
        assert_eq!(clause.qualified("posts").column, "posts.id");

        let already = WhereClause::eq("users.id", json!(1));
        assert_eq!(already.qualified("posts").column, "users.id");
    }

    #[test]
    fn direction_is_case_insensitive() {
        assert_eq!(SortDirection::parse("DESC").unwrap(), SortDirection::Desc);
        assert_eq!(SortDirection::parse("asc").unwrap(), SortDirection::Asc);
        assert!(SortDirection::parse("up").is_err());
    }
}
