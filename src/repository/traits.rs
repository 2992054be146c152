use crate::database::{Queryable, Record};
use crate::repository::{AttributeSet, Context, RelationSet};

/// Per-entity policy: query scope, whitelists and authorization.
///
/// Repositories are stateless and shared read-only; every hook they declare is
/// expected to be a pure function of its (context, record) arguments, with no
/// side effects beyond building the query or annotating the record.
pub trait Repository: Send + Sync {
    type Query: Queryable;

    /// Entity type token
    fn identity(&self) -> &'static str;

    /// Table used to qualify filter and order columns
    fn table(&self) -> &'static str {
        self.identity()
    }

    /// Fresh query for this entity. May read `context.parent()` to scope rows
    /// under a parent record.
    fn base_query(&self, context: &Context) -> Self::Query;

    /// Attach this entity to another entity's query as relation `relation`
    fn extend_query(&self, _context: &Context, _query: &mut Self::Query, _relation: &str) {}

    /// Attribute whitelist
    fn attributes(&self) -> &AttributeSet<Self::Query>;

    /// Relation whitelist
    fn relations(&self) -> &RelationSet<Self::Query>;

    /// Whether records of this type may be listed at all in `context`
    fn authorize_all(&self, _context: &Context) -> bool {
        false
    }

    /// Whether one already fetched record may be exposed in `context`
    fn authorize_single(&self, _context: &Context, _record: &Record) -> bool {
        false
    }
}
