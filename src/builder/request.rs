use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::CONFIG;
use crate::filter::{FilterError, FilterOrder, FilterWhere, OrderSpec, WhereClause};

/// The wire shape a transport layer hands to the request builder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclarativeRequest {
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub relations: Vec<String>,
    /// `"name"`, `["name", "desc"]` or `[["name", "asc"], ["age", "desc"]]`
    #[serde(default)]
    pub order: Option<Value>,
    #[serde(default)]
    pub filters: Option<Value>,
}

/// A declarative request after shape validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRequest {
    pub attributes: Vec<String>,
    pub relations: Vec<String>,
    pub orders: Vec<OrderSpec>,
    pub filters: Vec<WhereClause>,
}

impl DeclarativeRequest {
    pub fn from_json(value: Value) -> Result<Self, FilterError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Validate shapes and limits. No whitelist checks happen here; unknown
    /// names survive until the builder drops them.
    pub fn normalize(&self) -> Result<NormalizedRequest, FilterError> {
        let limits = &CONFIG.request;
        check_limit("attributes", self.attributes.len(), limits.max_attributes)?;
        check_limit("relations", self.relations.len(), limits.max_relations)?;

        for attribute in &self.attributes {
            AttributePath::parse(attribute)?;
        }

        let orders = match &self.order {
            Some(order) => FilterOrder::validate_and_parse(order)?,
            None => vec![],
        };
        check_limit("orders", orders.len(), limits.max_orders)?;

        let filters = match &self.filters {
            Some(filters) => FilterWhere::validate_and_parse(filters)?,
            None => vec![],
        };
        check_limit("filters", filters.len(), limits.max_filters)?;

        Ok(NormalizedRequest {
            attributes: self.attributes.clone(),
            relations: self.relations.clone(),
            orders,
            filters,
        })
    }
}

fn check_limit(what: &str, count: usize, max: usize) -> Result<(), FilterError> {
    if count > max {
        return Err(FilterError::LimitExceeded(format!("{} {} requested, at most {} allowed", count, what, max)));
    }
    Ok(())
}

/// A requested attribute: plain, or one level into a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributePath<'a> {
    Direct(&'a str),
    Related { relation: &'a str, attribute: &'a str },
}

impl<'a> AttributePath<'a> {
    /// Split `relation.attribute`. Deeper paths and empty segments are rejected.
    pub fn parse(path: &'a str) -> Result<Self, FilterError> {
        if path.is_empty() {
            return Err(FilterError::InvalidAttributePath("attribute name cannot be empty".to_string()));
        }
        match path.split_once('.') {
            None => Ok(AttributePath::Direct(path)),
            Some((relation, attribute))
                if !relation.is_empty() && !attribute.is_empty() && !attribute.contains('.') =>
            {
                Ok(AttributePath::Related { relation, attribute })
            }
            Some(_) => Err(FilterError::InvalidAttributePath(format!(
                "'{}' must be 'attribute' or 'relation.attribute'",
                path
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SortDirection;
    use serde_json::json;

    #[test]
    fn deserializes_with_defaults() {
        let request = DeclarativeRequest::from_json(json!({"attributes": ["id"]})).unwrap();
        assert_eq!(request.attributes, vec!["id"]);
        assert!(request.relations.is_empty());
        assert!(request.order.is_none());
    }

    #[test]
    fn normalizes_order_and_filters() {
        let request = DeclarativeRequest::from_json(json!({
            "attributes": ["id", "comments.body"],
            "relations": ["comments"],
            "order": [["title", "desc"], ["id", "asc"]],
            "filters": [["published", "=", true]]
        }))
        .unwrap();

        let normalized = request.normalize().unwrap();
        assert_eq!(
            normalized.orders,
            vec![OrderSpec::new("title", SortDirection::Desc), OrderSpec::new("id", SortDirection::Asc)]
        );
        assert_eq!(normalized.filters, vec![WhereClause::eq("published", json!(true))]);
        assert_eq!(normalized.attributes, vec!["id", "comments.body"]);
    }

    #[test]
    fn rejects_malformed_order() {
        let request = DeclarativeRequest { order: Some(json!(["title", "sideways"])), ..Default::default() };
        assert!(matches!(request.normalize(), Err(FilterError::InvalidDirection(_))));
    }

    #[test]
    fn rejects_wrong_wire_types() {
        assert!(DeclarativeRequest::from_json(json!({"attributes": "id"})).is_err());
    }

    #[test]
    fn parses_attribute_paths() {
        assert_eq!(AttributePath::parse("title").unwrap(), AttributePath::Direct("title"));
        assert_eq!(
            AttributePath::parse("comments.body").unwrap(),
            AttributePath::Related { relation: "comments", attribute: "body" }
        );
        assert!(AttributePath::parse("comments.author.name").is_err());
        assert!(AttributePath::parse(".body").is_err());
        assert!(AttributePath::parse("comments.").is_err());
        assert!(AttributePath::parse("").is_err());
    }

    #[test]
    fn enforces_configured_limits() {
        let max = CONFIG.request.max_orders;
        let pairs: Vec<Value> = (0..=max).map(|i| json!([format!("c{}", i), "asc"])).collect();
        let request = DeclarativeRequest { order: Some(Value::Array(pairs)), ..Default::default() };
        assert!(matches!(request.normalize(), Err(FilterError::LimitExceeded(_))));
    }
}
