//! Policy-driven data access.
//!
//! Repositories declare which attributes and relations of an entity may be
//! exposed and under what authorization; a [`RequestBuilder`] turns a caller's
//! request into one query against a [`Queryable`] and masks every fetched
//! record down to what the caller may see.

pub mod builder;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod repository;

pub use builder::{DeclarativeRequest, RequestBuilder};
pub use database::{MemoryQuery, MemoryStore, PgQuery, Queryable, Record, RelationLoad, StorageError};
pub use error::GatewayError;
pub use filter::{FilterOp, SortDirection, WhereClause};
pub use repository::{Attribute, AttributeSet, Context, Principal, RelationSet, Repository, RepositoryRelation};
