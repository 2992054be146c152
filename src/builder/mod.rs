pub mod request;
pub mod request_builder;
pub mod visibility;

pub use request::{AttributePath, DeclarativeRequest, NormalizedRequest};
pub use request_builder::RequestBuilder;
pub use visibility::{AttributePlan, Exposure, RelationPlan};
