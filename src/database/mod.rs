pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod record;

pub use error::StorageError;
pub use memory::{MemoryQuery, MemoryStore};
pub use postgres::PgQuery;
pub use query::{Queryable, RelationLoad};
pub use record::{FieldMask, Record, RecordError, RecordVecExt};
