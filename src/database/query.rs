use async_trait::async_trait;

use crate::database::error::StorageError;
use crate::database::record::Record;
use crate::filter::{SortDirection, WhereClause};

/// Eager-load description for a named relation.
///
/// Related rows come from `table` where `table.foreign_key` equals the parent
/// row's `local_key`. A has-many relation is `("comments", "comments",
/// "post_id", "id")`; a belongs-to relation flips the keys, e.g.
/// `("author", "users", "id", "author_id")`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationLoad {
    pub name: String,
    pub table: String,
    pub foreign_key: String,
    pub local_key: String,
    pub wheres: Vec<WhereClause>,
    pub orders: Vec<(String, SortDirection)>,
}

impl RelationLoad {
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        foreign_key: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            foreign_key: foreign_key.into(),
            local_key: local_key.into(),
            wheres: Vec::new(),
            orders: Vec::new(),
        }
    }

    /// Constrain the related rows (column is relative to the related table)
    pub fn filter(mut self, clause: WhereClause) -> Self {
        self.wheres.push(clause);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.orders.push((column.into(), direction));
        self
    }
}

/// The storage seam: everything the request builder needs from a query.
///
/// Implementations are plain values owned by one request. Column names handed
/// to `filter` and `order_by` arrive qualified with the entity table.
#[async_trait]
pub trait Queryable: Send + Sync + 'static {
    /// Table the query selects from
    fn table(&self) -> &str;

    fn filter(&mut self, clause: WhereClause);

    fn order_by(&mut self, column: &str, direction: SortDirection);

    /// Attach a relation sub-collection to every fetched row
    fn with_relation(&mut self, relation: RelationLoad);

    /// Run the query. Records come back with an empty field mask.
    async fn execute(&self) -> Result<Vec<Record>, StorageError>;
}
