//! In-memory record store.
//!
//! Tables are vectors of JSON objects. Queries support qualified filters,
//! column and key-function ordering, computed columns and eager relation
//! loading, which is everything the request builder asks of a `Queryable`.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::database::error::StorageError;
use crate::database::query::{Queryable, RelationLoad};
use crate::database::record::Record;
use crate::filter::filter_where::{compare_values, FilterWhere};
use crate::filter::{SortDirection, WhereClause};

type Row = Map<String, Value>;

/// Derives a value from a stored row
pub type ComputeFn = Arc<dyn Fn(&Row) -> Value + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, Vec<Row>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_table(&self, table: impl Into<String>) {
        self.tables.write().await.entry(table.into()).or_default();
    }

    /// Append a row, creating the table on first use
    pub async fn insert(&self, table: &str, row: Value) -> Result<(), StorageError> {
        let Value::Object(row) = row else {
            return Err(StorageError::QueryError(format!("rows for '{}' must be JSON objects", table)));
        };
        self.tables.write().await.entry(table.to_string()).or_default().push(row);
        Ok(())
    }

    pub async fn insert_many(&self, table: &str, rows: impl IntoIterator<Item = Value>) -> Result<(), StorageError> {
        for row in rows {
            self.insert(table, row).await?;
        }
        Ok(())
    }

    pub async fn count(&self, table: &str) -> usize {
        self.tables.read().await.get(table).map(Vec::len).unwrap_or(0)
    }

    pub fn query(&self, table: impl Into<String>) -> MemoryQuery {
        MemoryQuery {
            store: self.clone(),
            table: table.into(),
            wheres: Vec::new(),
            computed: Vec::new(),
            orders: Vec::new(),
            relations: Vec::new(),
        }
    }
}

enum MemoryOrder {
    Column(String, SortDirection),
    Key(ComputeFn, SortDirection),
}

pub struct MemoryQuery {
    store: MemoryStore,
    table: String,
    wheres: Vec<WhereClause>,
    computed: Vec<(String, ComputeFn)>,
    orders: Vec<MemoryOrder>,
    relations: Vec<RelationLoad>,
}

impl MemoryQuery {
    /// Add a computed column; it replaces a stored column of the same name
    pub fn with_computed<F>(&mut self, alias: impl Into<String>, compute: F) -> &mut Self
    where
        F: Fn(&Row) -> Value + Send + Sync + 'static,
    {
        self.computed.push((alias.into(), Arc::new(compute)));
        self
    }

    /// Order by a derived key instead of a stored column
    pub fn order_by_key<F>(&mut self, key: F, direction: SortDirection) -> &mut Self
    where
        F: Fn(&Row) -> Value + Send + Sync + 'static,
    {
        self.orders.push(MemoryOrder::Key(Arc::new(key), direction));
        self
    }

    pub fn clauses(&self) -> &[WhereClause] {
        &self.wheres
    }

    pub fn relation_loads(&self) -> &[RelationLoad] {
        &self.relations
    }

    /// Ordered `(column, direction)` pairs; key-function orders show as `None`
    pub fn order_columns(&self) -> Vec<(Option<String>, SortDirection)> {
        self.orders
            .iter()
            .map(|o| match o {
                MemoryOrder::Column(c, d) => (Some(c.clone()), *d),
                MemoryOrder::Key(_, d) => (None, *d),
            })
            .collect()
    }

    fn local_column(table: &str, column: &str) -> Result<String, StorageError> {
        match column.split_once('.') {
            Some((owner, name)) if owner == table => Ok(name.to_string()),
            Some(_) => Err(StorageError::ForeignColumn { column: column.to_string(), table: table.to_string() }),
            None => Ok(column.to_string()),
        }
    }

    fn retain_matching(table: &str, rows: &mut Vec<Row>, clauses: &[WhereClause]) -> Result<(), StorageError> {
        for clause in clauses {
            let column = Self::local_column(table, &clause.column)?;
            rows.retain(|row| FilterWhere::evaluate(clause, row.get(&column)));
        }
        Ok(())
    }

    fn load_relation(
        &self,
        tables: &HashMap<String, Vec<Row>>,
        load: &RelationLoad,
        records: &mut [Record],
    ) -> Result<(), StorageError> {
        let mut candidates = tables
            .get(&load.table)
            .cloned()
            .ok_or_else(|| StorageError::UnknownTable(load.table.clone()))?;
        Self::retain_matching(&load.table, &mut candidates, &load.wheres)?;

        let orders = load
            .orders
            .iter()
            .map(|(c, d)| Ok(MemoryOrder::Column(Self::local_column(&load.table, c)?, *d)))
            .collect::<Result<Vec<_>, StorageError>>()?;
        sort_rows(&mut candidates, &orders);

        let foreign_key = Self::local_column(&load.table, &load.foreign_key)?;
        for record in records.iter_mut() {
            let related = match record.get(&load.local_key) {
                None | Some(Value::Null) => Vec::new(),
                Some(key) => {
                    let join = WhereClause::eq(foreign_key.clone(), key.clone());
                    candidates
                        .iter()
                        .filter(|row| FilterWhere::evaluate(&join, row.get(&foreign_key)))
                        .cloned()
                        .map(Record::from_map)
                        .collect()
                }
            };
            record.attach_relation(load.name.clone(), related);
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryQuery")
            .field("table", &self.table)
            .field("wheres", &self.wheres)
            .field("computed", &self.computed.iter().map(|(alias, _)| alias).collect::<Vec<_>>())
            .field("orders", &self.order_columns())
            .field("relations", &self.relations)
            .finish()
    }
}

fn sort_rows(rows: &mut [Row], orders: &[MemoryOrder]) {
    if orders.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for order in orders {
            let (ordering, direction) = match order {
                MemoryOrder::Column(column, direction) => (
                    compare_values(a.get(column).unwrap_or(&Value::Null), b.get(column).unwrap_or(&Value::Null)),
                    direction,
                ),
                MemoryOrder::Key(key, direction) => (compare_values(&key(a), &key(b)), direction),
            };
            let ordering = match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

#[async_trait]
impl Queryable for MemoryQuery {
    fn table(&self) -> &str {
        &self.table
    }

    fn filter(&mut self, clause: WhereClause) {
        self.wheres.push(clause);
    }

    fn order_by(&mut self, column: &str, direction: SortDirection) {
        self.orders.push(MemoryOrder::Column(column.to_string(), direction));
    }

    fn with_relation(&mut self, relation: RelationLoad) {
        self.relations.retain(|r| r.name != relation.name);
        self.relations.push(relation);
    }

    async fn execute(&self) -> Result<Vec<Record>, StorageError> {
        let tables = self.store.tables.read().await;
        let mut rows = tables
            .get(&self.table)
            .cloned()
            .ok_or_else(|| StorageError::UnknownTable(self.table.clone()))?;

        for row in rows.iter_mut() {
            let values: Vec<(String, Value)> =
                self.computed.iter().map(|(alias, compute)| (alias.clone(), compute(row))).collect();
            row.extend(values);
        }

        Self::retain_matching(&self.table, &mut rows, &self.wheres)?;

        let orders = self
            .orders
            .iter()
            .map(|o| match o {
                MemoryOrder::Column(c, d) => Ok(MemoryOrder::Column(Self::local_column(&self.table, c)?, *d)),
                MemoryOrder::Key(k, d) => Ok(MemoryOrder::Key(Arc::clone(k), *d)),
            })
            .collect::<Result<Vec<_>, StorageError>>()?;
        sort_rows(&mut rows, &orders);

        let mut records: Vec<Record> = rows.into_iter().map(Record::from_map).collect();
        for load in &self.relations {
            self.load_relation(&tables, load, &mut records)?;
        }

        tracing::trace!("Memory query on '{}' returned {} records", self.table, records.len());
        Ok(records)
    }
}
