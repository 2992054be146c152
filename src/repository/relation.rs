use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::builder::RequestBuilder;
use crate::database::Queryable;
use crate::error::GatewayError;
use crate::filter::{qualify, WhereClause};
use crate::repository::{Context, Repository};

pub type BoxedRepository<Q> = Box<dyn Repository<Query = Q>>;

/// Builds the repository behind a relation on demand
pub type RelationFactory<Q> = Arc<dyn Fn() -> BoxedRepository<Q> + Send + Sync>;

/// Ordered relation whitelist: relation name -> repository factory
pub struct RelationSet<Q: Queryable> {
    relations: Vec<(String, RelationFactory<Q>)>,
}

impl<Q: Queryable> RelationSet<Q> {
    pub fn new() -> Self {
        Self { relations: Vec::new() }
    }

    pub fn relation<R, F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        R: Repository<Query = Q> + 'static,
        F: Fn() -> R + Send + Sync + 'static,
    {
        let name = name.into();
        let factory: RelationFactory<Q> = Arc::new(move || Box::new(factory()) as BoxedRepository<Q>);
        self.relations.retain(|(n, _)| *n != name);
        self.relations.push((name, factory));
        self
    }

    pub fn get(&self, name: &str) -> Option<&RelationFactory<Q>> {
        self.relations.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// Instantiate the repository behind `name`
    pub fn build(&self, name: &str) -> Option<BoxedRepository<Q>> {
        self.get(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.relations.iter().map(|(n, _)| n.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

impl<Q: Queryable> Default for RelationSet<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q: Queryable> Clone for RelationSet<Q> {
    fn clone(&self) -> Self {
        Self { relations: self.relations.clone() }
    }
}

impl<Q: Queryable> std::fmt::Debug for RelationSet<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.relations.iter().map(|(n, _)| n)).finish()
    }
}

/// A repository reached through a parent entity
#[async_trait]
pub trait RepositoryRelation: Repository {
    /// Query for this entity as seen through its relation, used to resolve
    /// records by id before descending further
    fn relation_query(&self, context: &Context) -> Self::Query;

    /// Resolve record `id`, then open relation `relation` underneath it.
    ///
    /// Fails with NotFound when the id does not match exactly one exposable
    /// record or when `relation` is not whitelisted.
    async fn get_relation(
        &self,
        context: &Context,
        id: Value,
        relation: &str,
    ) -> Result<RequestBuilder<Self::Query>, GatewayError> {
        let mut query = self.relation_query(context);
        query.filter(WhereClause::eq(qualify(self.table(), "id"), id));

        let mut matches = query.execute().await?;
        if matches.len() != 1 {
            return Err(GatewayError::not_found(format!("The {} record was not found.", self.identity())));
        }
        let parent = matches.remove(0);
        if !self.authorize_all(context) && !self.authorize_single(context, &parent) {
            return Err(GatewayError::not_found(format!("The {} record was not found.", self.identity())));
        }

        let child_context = context.descend(parent);
        let repository = self
            .relations()
            .build(relation)
            .ok_or_else(|| GatewayError::not_found(format!("The relation '{}' was not found.", relation)))?;

        Ok(RequestBuilder::from_boxed(repository, child_context))
    }
}
