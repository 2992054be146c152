//! Postgres `Queryable` backed by sqlx.
//!
//! Queries compile to a single parameterized SELECT; relations are loaded with
//! one extra `IN (...)` query each and stitched onto the parent rows.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Column, PgPool, Row, TypeInfo};

use crate::config::CONFIG;
use crate::database::error::StorageError;
use crate::database::query::{Queryable, RelationLoad};
use crate::database::record::Record;
use crate::filter::filter_where::{quote_column, validate_identifier, FilterWhere};
use crate::filter::{qualify, FilterError, FilterOp, SortDirection, SqlResult, WhereClause};

#[derive(Debug, Clone)]
enum PgOrder {
    Column(String, SortDirection),
    Raw(String, SortDirection),
}

#[derive(Debug, Clone)]
pub struct PgQuery {
    pool: PgPool,
    table: String,
    selects: Vec<(String, String)>,
    joins: Vec<String>,
    wheres: Vec<WhereClause>,
    orders: Vec<PgOrder>,
    relations: Vec<RelationLoad>,
}

impl PgQuery {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self, StorageError> {
        let table = table.into();
        validate_identifier(&table)?;
        Ok(Self {
            pool,
            table,
            selects: Vec::new(),
            joins: Vec::new(),
            wheres: Vec::new(),
            orders: Vec::new(),
            relations: Vec::new(),
        })
    }

    /// Add `(expression) AS "alias"` to the select list.
    ///
    /// The expression is trusted SQL written by a repository, never client input.
    pub fn select_raw(&mut self, alias: impl Into<String>, expression: impl Into<String>) -> &mut Self {
        self.selects.push((alias.into(), expression.into()));
        self
    }

    /// Append a trusted JOIN clause, e.g. `LEFT JOIN "users" ON ...`
    pub fn join_raw(&mut self, clause: impl Into<String>) -> &mut Self {
        self.joins.push(clause.into());
        self
    }

    /// Order by a trusted expression
    pub fn order_by_raw(&mut self, expression: impl Into<String>, direction: SortDirection) -> &mut Self {
        self.orders.push(PgOrder::Raw(expression.into(), direction));
        self
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let table = quote_column(&self.table)?;

        let mut select = vec![format!("{}.*", table)];
        for (alias, expression) in &self.selects {
            validate_identifier(alias)?;
            select.push(format!("({}) AS \"{}\"", expression, alias));
        }

        let (where_clause, params) = FilterWhere::generate(&self.wheres, 0)?;
        let order_clause = Self::order_clause(&self.orders)?;

        let query = [
            format!("SELECT {}", select.join(", ")),
            format!("FROM {}", table),
            self.joins.join(" "),
            format!("WHERE {}", where_clause),
            order_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params })
    }

    /// SQL fetching the related rows for a set of parent key values
    pub fn relation_sql(load: &RelationLoad, keys: &[Value]) -> Result<SqlResult, FilterError> {
        let table = quote_column(&load.table)?;

        let mut clauses = vec![WhereClause::new(
            qualify(&load.table, &load.foreign_key),
            FilterOp::In,
            Value::Array(keys.to_vec()),
        )];
        clauses.extend(load.wheres.iter().map(|c| c.qualified(&load.table)));
        let (where_clause, params) = FilterWhere::generate(&clauses, 0)?;

        let orders: Vec<PgOrder> = load
            .orders
            .iter()
            .map(|(column, direction)| PgOrder::Column(qualify(&load.table, column), *direction))
            .collect();
        let order_clause = Self::order_clause(&orders)?;

        let mut query = format!("SELECT {}.* FROM {} WHERE {}", table, table, where_clause);
        if !order_clause.is_empty() {
            query.push(' ');
            query.push_str(&order_clause);
        }
        Ok(SqlResult { query, params })
    }

    fn order_clause(orders: &[PgOrder]) -> Result<String, FilterError> {
        if orders.is_empty() {
            return Ok(String::new());
        }
        let parts = orders
            .iter()
            .map(|order| match order {
                PgOrder::Column(column, direction) => Ok(format!("{} {}", quote_column(column)?, direction.to_sql())),
                PgOrder::Raw(expression, direction) => Ok(format!("{} {}", expression, direction.to_sql())),
            })
            .collect::<Result<Vec<_>, FilterError>>()?;
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }

    async fn fetch(&self, sql: &SqlResult) -> Result<Vec<Map<String, Value>>, StorageError> {
        let config = &CONFIG.database;
        if config.enable_query_logging {
            tracing::debug!("SQL: {} -- params: {:?}", sql.query, sql.params);
        }

        let started = Instant::now();
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p);
        }
        let rows = q.fetch_all(&self.pool).await?;

        let elapsed = started.elapsed();
        if config.enable_slow_query_warning && elapsed.as_millis() >= u128::from(config.slow_query_threshold_ms) {
            tracing::warn!("Slow query ({} ms): {}", elapsed.as_millis(), sql.query);
        }

        rows.iter().map(row_to_map).collect()
    }

    async fn load_relation(&self, load: &RelationLoad, records: &mut [Record]) -> Result<(), StorageError> {
        let mut keys: Vec<Value> = Vec::new();
        for record in records.iter() {
            match record.get(&load.local_key) {
                None | Some(Value::Null) => {}
                Some(key) if keys.contains(key) => {}
                Some(key) => keys.push(key.clone()),
            }
        }

        let related = if keys.is_empty() {
            Vec::new()
        } else {
            self.fetch(&Self::relation_sql(load, &keys)?).await?
        };

        for record in records.iter_mut() {
            let children = match record.get(&load.local_key) {
                None | Some(Value::Null) => Vec::new(),
                Some(key) => related
                    .iter()
                    .filter(|row| row.get(&load.foreign_key) == Some(key))
                    .cloned()
                    .map(Record::from_map)
                    .collect(),
            };
            record.attach_relation(load.name.clone(), children);
        }
        Ok(())
    }
}

#[async_trait]
impl Queryable for PgQuery {
    fn table(&self) -> &str {
        &self.table
    }

    fn filter(&mut self, clause: WhereClause) {
        self.wheres.push(clause);
    }

    fn order_by(&mut self, column: &str, direction: SortDirection) {
        self.orders.push(PgOrder::Column(column.to_string(), direction));
    }

    fn with_relation(&mut self, relation: RelationLoad) {
        self.relations.retain(|r| r.name != relation.name);
        self.relations.push(relation);
    }

    async fn execute(&self) -> Result<Vec<Record>, StorageError> {
        let sql = self.to_sql()?;
        let mut records: Vec<Record> = self.fetch(&sql).await?.into_iter().map(Record::from_map).collect();
        for load in &self.relations {
            self.load_relation(load, &mut records).await?;
        }
        Ok(records)
    }
}

/// Convert a row to a JSON map
fn row_to_map(row: &PgRow) -> Result<Map<String, Value>, StorageError> {
    let mut map = Map::new();
    for i in 0..row.len() {
        map.insert(row.column(i).name().to_string(), decode_column(row, i)?);
    }
    Ok(map)
}

/// Postgres column types the read path knows how to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Json,
    Text,
    Uuid,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Bool,
    Numeric,
    Timestamptz,
    Timestamp,
    Date,
    Time,
}

impl ColumnKind {
    fn from_type_name(type_name: &str) -> Option<Self> {
        Some(match type_name {
            "JSON" | "JSONB" => ColumnKind::Json,
            "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" => ColumnKind::Text,
            "UUID" => ColumnKind::Uuid,
            "INT2" => ColumnKind::Int2,
            "INT4" => ColumnKind::Int4,
            "INT8" => ColumnKind::Int8,
            "FLOAT4" => ColumnKind::Float4,
            "FLOAT8" => ColumnKind::Float8,
            "BOOL" => ColumnKind::Bool,
            "NUMERIC" => ColumnKind::Numeric,
            "TIMESTAMPTZ" => ColumnKind::Timestamptz,
            "TIMESTAMP" => ColumnKind::Timestamp,
            "DATE" => ColumnKind::Date,
            "TIME" => ColumnKind::Time,
            _ => return None,
        })
    }
}

/// Decode one column. Unknown types are an error rather than a silent null.
fn decode_column(row: &PgRow, i: usize) -> Result<Value, StorageError> {
    let column = row.column(i);
    let type_name = column.type_info().name();
    let kind = ColumnKind::from_type_name(type_name).ok_or_else(|| {
        StorageError::QueryError(format!("unsupported PostgreSQL type {} for column '{}'", type_name, column.name()))
    })?;

    let value = match kind {
        ColumnKind::Json => row.try_get::<Option<Value>, _>(i)?,
        ColumnKind::Text => row.try_get::<Option<String>, _>(i)?.map(Value::String),
        ColumnKind::Uuid => row.try_get::<Option<uuid::Uuid>, _>(i)?.map(|u| Value::String(u.to_string())),
        ColumnKind::Int2 => row.try_get::<Option<i16>, _>(i)?.map(Value::from),
        ColumnKind::Int4 => row.try_get::<Option<i32>, _>(i)?.map(Value::from),
        ColumnKind::Int8 => row.try_get::<Option<i64>, _>(i)?.map(Value::from),
        ColumnKind::Float4 => row.try_get::<Option<f32>, _>(i)?.map(|f| float_value(f64::from(f))),
        ColumnKind::Float8 => row.try_get::<Option<f64>, _>(i)?.map(float_value),
        ColumnKind::Bool => row.try_get::<Option<bool>, _>(i)?.map(Value::Bool),
        ColumnKind::Numeric => row.try_get::<Option<Decimal>, _>(i)?.map(decimal_value),
        ColumnKind::Timestamptz => row.try_get::<Option<DateTime<Utc>>, _>(i)?.map(|t| Value::String(t.to_rfc3339())),
        ColumnKind::Timestamp => row.try_get::<Option<NaiveDateTime>, _>(i)?.map(naive_timestamp_value),
        ColumnKind::Date => row.try_get::<Option<NaiveDate>, _>(i)?.map(|d| Value::String(d.to_string())),
        ColumnKind::Time => row.try_get::<Option<NaiveTime>, _>(i)?.map(|t| Value::String(t.to_string())),
    };
    Ok(value.unwrap_or(Value::Null))
}

// NaN and infinities have no JSON number form
fn float_value(f: f64) -> Value {
    serde_json::Number::from_f64(f).map(Value::Number).unwrap_or_else(|| Value::String(f.to_string()))
}

// Exact decimal text; a JSON float would round
fn decimal_value(d: Decimal) -> Value {
    Value::String(d.to_string())
}

fn naive_timestamp_value(t: NaiveDateTime) -> Value {
    Value::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}
