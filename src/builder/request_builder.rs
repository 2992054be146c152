use serde_json::Value;

use crate::builder::request::{AttributePath, DeclarativeRequest};
use crate::builder::visibility::{AttributePlan, RelationPlan};
use crate::config::CONFIG;
use crate::database::{Queryable, Record};
use crate::error::GatewayError;
use crate::filter::{qualify, FilterOp, OrderSpec, SortDirection, WhereClause};
use crate::repository::{Attribute, BoxedRepository, Context, Repository};

/// Request-scoped composer: accumulates what the caller asked for, then
/// turns it into one query and a set of masked records.
pub struct RequestBuilder<Q: Queryable> {
    repository: BoxedRepository<Q>,
    context: Context,
    attributes: Vec<String>,
    relations: Vec<String>,
    /// Programmatic filters, applied as given
    wheres: Vec<WhereClause>,
    /// Filters from a declarative request; only applied to whitelisted
    /// attributes the caller may see on every record
    request_filters: Vec<WhereClause>,
    orders: Vec<OrderSpec>,
}

impl<Q: Queryable> RequestBuilder<Q> {
    pub fn new<R>(repository: R, context: Context) -> Self
    where
        R: Repository<Query = Q> + 'static,
    {
        Self::from_boxed(Box::new(repository), context)
    }

    pub fn from_boxed(repository: BoxedRepository<Q>, context: Context) -> Self {
        Self {
            repository,
            context,
            attributes: Vec::new(),
            relations: Vec::new(),
            wheres: Vec::new(),
            request_filters: Vec::new(),
            orders: Vec::new(),
        }
    }

    pub fn repository(&self) -> &dyn Repository<Query = Q> {
        self.repository.as_ref()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn requested_attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn requested_relations(&self) -> &[String] {
        &self.relations
    }

    pub fn orders(&self) -> &[OrderSpec] {
        &self.orders
    }

    // ========================================
    // Accumulators
    // ========================================

    /// Replace the requested attributes
    pub fn with_attributes<I, S>(&mut self, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the requested relations
    pub fn with_relations<I, S>(&mut self, relations: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relations = relations.into_iter().map(Into::into).collect();
        self
    }

    pub fn order_by(&mut self, attribute: impl Into<String>, direction: SortDirection) -> &mut Self {
        self.orders.push(OrderSpec::new(attribute, direction));
        self
    }

    pub fn where_clause(&mut self, column: impl Into<String>, operator: FilterOp, value: impl Into<Value>) -> &mut Self {
        self.wheres.push(WhereClause::new(column, operator, value));
        self
    }

    /// Load a declarative request. Nothing is changed when it fails to
    /// normalize; otherwise attributes, relations, orders and request
    /// filters are all replaced.
    pub fn for_request(&mut self, request: &DeclarativeRequest) -> Result<&mut Self, GatewayError> {
        let normalized = request.normalize()?;
        self.attributes = normalized.attributes;
        self.relations = normalized.relations;
        self.orders = normalized.orders;
        self.request_filters = normalized.filters;
        Ok(self)
    }

    /// Builder for relation `relation` of the record `parent_id`, with
    /// `request` applied to it.
    ///
    /// The parent is resolved through this builder's filters with only `id`
    /// requested, so it must be exposable here. Fails with NotFound when it is not, or when the relation is not
    /// whitelisted.
    pub async fn for_relation_request(
        &self,
        request: &DeclarativeRequest,
        parent_id: impl Into<Value>,
        relation: &str,
    ) -> Result<RequestBuilder<Q>, GatewayError> {
        request.normalize()?;
        let parent_id = parent_id.into();

        let by_id = WhereClause::eq("id", parent_id.clone());
        let mut matches = self
            .fetch_records(&[String::from("id")], &[], std::slice::from_ref(&by_id))
            .await?;
        if matches.len() != 1 {
            return Err(GatewayError::not_found(format!(
                "The {} record {} was not found.",
                self.repository.identity(),
                parent_id
            )));
        }
        let parent = matches.remove(0);

        let repository = self
            .repository
            .relations()
            .build(relation)
            .ok_or_else(|| GatewayError::not_found(format!("The relation '{}' was not found.", relation)))?;

        let mut child = RequestBuilder::from_boxed(repository, self.context.descend(parent));
        child.for_request(request)?;
        Ok(child)
    }

    // ========================================
    // Execution
    // ========================================

    pub async fn get_all(&self) -> Result<Vec<Record>, GatewayError> {
        self.fetch_records(&self.attributes, &self.relations, &[]).await
    }

    /// The record with `id`; `None` unless exactly one exposable record matches
    pub async fn get_single(&self, id: impl Into<Value>) -> Result<Option<Record>, GatewayError> {
        let by_id = WhereClause::eq("id", id);
        let mut records = self
            .fetch_records(&self.attributes, &self.relations, std::slice::from_ref(&by_id))
            .await?;
        if records.len() != 1 {
            return Ok(None);
        }
        Ok(records.pop())
    }

    /// The repository's base query, untouched by anything requested here
    pub fn get_query(&self) -> Q {
        self.repository.base_query(&self.context)
    }

    async fn fetch_records(
        &self,
        attributes: &[String],
        relations: &[String],
        extra: &[WhereClause],
    ) -> Result<Vec<Record>, GatewayError> {
        let repository = self.repository.as_ref();
        let table = repository.table();
        let whitelist = repository.attributes();

        // Requested attributes, split into own and relation.attribute
        let mut direct: Vec<&Attribute<Q>> = Vec::new();
        let mut related: Vec<(&str, &str)> = Vec::new();
        for name in attributes {
            match AttributePath::parse(name) {
                Ok(AttributePath::Direct(name)) => match whitelist.get(name) {
                    Some(attribute) => {
                        if !direct.iter().any(|a| a.name() == name) {
                            direct.push(attribute);
                        }
                    }
                    None => self.dropped("attribute", name),
                },
                Ok(AttributePath::Related { relation, attribute }) => {
                    if !related.contains(&(relation, attribute)) {
                        related.push((relation, attribute));
                    }
                }
                Err(_) => self.dropped("attribute", name),
            }
        }

        let mut relation_names: Vec<&str> = Vec::new();
        for name in relations {
            if !repository.relations().contains(name) {
                self.dropped("relation", name);
            } else if !relation_names.contains(&name.as_str()) {
                relation_names.push(name);
            }
        }

        let mut query = repository.base_query(&self.context);

        for clause in self.wheres.iter().chain(extra) {
            query.filter(clause.qualified(table));
        }
        for clause in &self.request_filters {
            let column = clause.column.strip_prefix(&format!("{}.", table)).unwrap_or(clause.column.as_str());
            match whitelist.get(column) {
                Some(attribute) if attribute.authorizes_all(&self.context) => {
                    query.filter(WhereClause::new(qualify(table, column), clause.operator, clause.value.clone()));
                }
                _ => self.dropped("filter", &clause.column),
            }
        }

        for attribute in &direct {
            attribute.apply_query(&self.context, &mut query);
        }

        // Related records are listed without a parent in scope
        let relation_context = self.context.detached();
        let mut relation_plans: Vec<RelationPlan<Q>> = Vec::new();
        for name in &relation_names {
            let Some(relation_repository) = repository.relations().build(name) else {
                continue;
            };
            if !relation_repository.authorize_all(&relation_context) {
                self.dropped("relation", name);
                continue;
            }
            relation_repository.extend_query(&relation_context, &mut query, name);

            let sub_whitelist = relation_repository.attributes();
            let mut attributes = Vec::new();
            for (_, attribute) in related.iter().filter(|(relation, _)| relation == name) {
                match sub_whitelist.get(attribute) {
                    Some(attribute) => attributes.push(AttributePlan::resolve(attribute, &relation_context)),
                    None => self.dropped("attribute", &format!("{}.{}", name, attribute)),
                }
            }

            relation_plans.push(RelationPlan {
                name: name.to_string(),
                repository: relation_repository,
                context: relation_context.clone(),
                attributes,
            });
        }

        // Sorting on an attribute hidden from some records would leak it
        for order in &self.orders {
            match whitelist.get(&order.attribute) {
                Some(attribute) if attribute.authorizes_all(&self.context) => {
                    if !attribute.apply_order(&self.context, &mut query, order.direction) {
                        query.order_by(&qualify(table, &order.attribute), order.direction);
                    }
                }
                _ => self.dropped("order", &order.attribute),
            }
        }

        let attribute_plans: Vec<AttributePlan> =
            direct.iter().map(|attribute| AttributePlan::resolve(*attribute, &self.context)).collect();

        let mut records = query.execute().await?;

        if !repository.authorize_all(&self.context) {
            records.retain(|record| repository.authorize_single(&self.context, record));
        }

        for record in records.iter_mut() {
            record.reset_visibility();
        }
        for plan in &attribute_plans {
            for record in records.iter_mut() {
                plan.apply(whitelist, &self.context, record);
            }
        }
        for plan in &relation_plans {
            for record in records.iter_mut() {
                plan.apply(record);
            }
        }

        let layout: Vec<String> = attribute_plans
            .iter()
            .map(|plan| plan.name.clone())
            .chain(relation_plans.iter().map(|plan| plan.name.clone()))
            .collect();
        for record in records.iter_mut() {
            record.arrange(&layout);
        }

        tracing::debug!(
            "{}: {} records, {} attributes, {} relations",
            repository.identity(),
            records.len(),
            attribute_plans.len(),
            relation_plans.len()
        );
        Ok(records)
    }

    fn dropped(&self, kind: &str, name: &str) {
        if CONFIG.request.debug_logging {
            tracing::debug!("{}: dropping {} '{}'", self.repository.identity(), kind, name);
        }
    }
}

impl<Q: Queryable> std::fmt::Debug for RequestBuilder<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("repository", &self.repository.identity())
            .field("context", &self.context)
            .field("attributes", &self.attributes)
            .field("relations", &self.relations)
            .field("wheres", &self.wheres)
            .field("request_filters", &self.request_filters)
            .field("orders", &self.orders)
            .finish()
    }
}
