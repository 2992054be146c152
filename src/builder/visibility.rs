//! Per-record visibility plans.
//!
//! Plans are resolved once per request, before the query runs, and then
//! replayed against every fetched record. Nothing here touches shared state:
//! each record carries its own field mask.

use crate::database::{Queryable, Record};
use crate::repository::{Attribute, AttributeSet, BoxedRepository, Context};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exposure {
    /// `authorize_all` passed; visible on every record
    All,
    /// Decided per record by `authorize_single`
    PerRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePlan {
    pub name: String,
    pub exposure: Exposure,
}

impl AttributePlan {
    pub fn resolve<Q>(attribute: &Attribute<Q>, context: &Context) -> Self {
        let exposure = if attribute.authorizes_all(context) { Exposure::All } else { Exposure::PerRecord };
        Self { name: attribute.name().to_string(), exposure }
    }

    /// Expose and enrich the attribute on `record` when allowed.
    /// Returns whether the attribute became visible.
    pub fn apply<Q>(&self, attributes: &AttributeSet<Q>, context: &Context, record: &mut Record) -> bool {
        let Some(attribute) = attributes.get(&self.name) else {
            return false;
        };
        if self.exposure == Exposure::PerRecord && !attribute.authorizes_single(context, record) {
            return false;
        }
        record.make_visible(self.name.clone());
        attribute.enrich_record(context, record);
        true
    }
}

/// A requested relation that passed `authorize_all`
pub struct RelationPlan<Q: Queryable> {
    pub name: String,
    pub repository: BoxedRepository<Q>,
    pub context: Context,
    pub attributes: Vec<AttributePlan>,
}

impl<Q: Queryable> RelationPlan<Q> {
    /// Expose the relation on `record` and run the sub-attribute pipeline on
    /// each related record. Relations the query never loaded stay hidden.
    pub fn apply(&self, record: &mut Record) {
        let layout: Vec<String> = self.attributes.iter().map(|plan| plan.name.clone()).collect();
        let Some(related) = record.relation_mut(&self.name) else {
            return;
        };
        for child in related.iter_mut() {
            child.reset_visibility();
            for plan in &self.attributes {
                plan.apply(self.repository.attributes(), &self.context, child);
            }
            child.arrange(&layout);
        }
        record.make_visible(self.name.clone());
    }
}

impl<Q: Queryable> std::fmt::Debug for RelationPlan<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationPlan")
            .field("name", &self.name)
            .field("repository", &self.repository.identity())
            .field("attributes", &self.attributes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        Record::from_json(value).unwrap()
    }

    #[test]
    fn request_wide_attribute_is_visible_and_enriched() {
        let attributes: AttributeSet<()> = AttributeSet::new().with(Attribute::new("title").enrich(|_, r| {
            r.set("title", "enriched");
        }));
        let ctx = Context::anonymous();
        let plan = AttributePlan::resolve(attributes.get("title").unwrap(), &ctx);
        assert_eq!(plan.exposure, Exposure::All);

        let mut row = record(json!({"title": "raw"}));
        assert!(plan.apply(&attributes, &ctx, &mut row));
        assert_eq!(row.to_json(), json!({"title": "enriched"}));
    }

    #[test]
    fn per_record_attribute_checks_each_record() {
        let attributes: AttributeSet<()> = AttributeSet::new().with(
            Attribute::new("email")
                .authorize_all(|_| false)
                .authorize_single(|_, r| r.get("public") == Some(&json!(true))),
        );
        let ctx = Context::anonymous();
        let plan = AttributePlan::resolve(attributes.get("email").unwrap(), &ctx);
        assert_eq!(plan.exposure, Exposure::PerRecord);

        let mut open = record(json!({"email": "a@x", "public": true}));
        let mut closed = record(json!({"email": "b@x", "public": false}));
        assert!(plan.apply(&attributes, &ctx, &mut open));
        assert!(!plan.apply(&attributes, &ctx, &mut closed));
        assert_eq!(open.to_json(), json!({"email": "a@x"}));
        assert_eq!(closed.to_json(), json!({}));
    }
}
