use serde_json::Value;

use super::error::FilterError;
use super::types::{OrderSpec, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Normalize the `order` member of a request into order specs.
    ///
    /// Accepted shapes:
    /// - `"name"` ascending by name
    /// - `["name", "desc"]` a single pair
    /// - `[["name", "asc"], ["age", "desc"]]` a list of pairs (a one-element
    ///   inner array defaults to ascending)
    pub fn validate_and_parse(order: &Value) -> Result<Vec<OrderSpec>, FilterError> {
        match order {
            Value::Null => Ok(vec![]),
            Value::String(s) => Ok(vec![OrderSpec::new(Self::attribute(s)?, SortDirection::Asc)]),
            Value::Array(arr) if arr.is_empty() => Ok(vec![]),
            Value::Array(arr) if arr.iter().all(Value::is_array) => {
                arr.iter().map(Self::parse_pair).collect()
            }
            Value::Array(arr) if arr.iter().all(Value::is_string) => {
                if arr.len() != 2 {
                    return Err(FilterError::InvalidOrder(format!(
                        "expected [attribute, direction], got {} strings",
                        arr.len()
                    )));
                }
                Ok(vec![Self::parse_pair(order)?])
            }
            Value::Array(_) => Err(FilterError::InvalidOrder(
                "order array mixes pairs and bare values".to_string(),
            )),
            other => Err(FilterError::InvalidOrder(format!("unsupported order value: {}", other))),
        }
    }

    fn parse_pair(pair: &Value) -> Result<OrderSpec, FilterError> {
        let items = pair
            .as_array()
            .ok_or_else(|| FilterError::InvalidOrder(format!("expected array, got {}", pair)))?;

        match items.as_slice() {
            [Value::String(attribute)] => Ok(OrderSpec::new(Self::attribute(attribute)?, SortDirection::Asc)),
            [Value::String(attribute), Value::String(direction)] => Ok(OrderSpec::new(
                Self::attribute(attribute)?,
                SortDirection::parse(direction)?,
            )),
            _ => Err(FilterError::InvalidOrder(format!(
                "expected [attribute, direction], got {}",
                pair
            ))),
        }
    }

    fn attribute(name: &str) -> Result<String, FilterError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(FilterError::InvalidOrder("order attribute cannot be empty".to_string()));
        }
        Ok(trimmed.to_string())
    }
}
