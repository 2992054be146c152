pub mod attribute;
pub mod context;
pub mod relation;
pub mod traits;

pub use attribute::{Attribute, AttributeSet};
pub use context::{Context, Principal};
pub use relation::{BoxedRepository, RelationFactory, RelationSet, RepositoryRelation};
pub use traits::Repository;
