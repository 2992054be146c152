//! Per-attribute descriptors.
//!
//! Each exposable attribute is declared once, with optional hook slots. A
//! missing hook means "use the default policy": no query changes, plain column
//! ordering, allowed, allowed, no enrichment.

use std::sync::Arc;

use crate::database::Record;
use crate::filter::SortDirection;
use crate::repository::Context;

pub type QueryHook<Q> = Arc<dyn Fn(&Context, &mut Q) + Send + Sync>;
pub type OrderHook<Q> = Arc<dyn Fn(&Context, &mut Q, SortDirection) + Send + Sync>;
pub type AuthorizeAllHook = Arc<dyn Fn(&Context) -> bool + Send + Sync>;
pub type AuthorizeSingleHook = Arc<dyn Fn(&Context, &Record) -> bool + Send + Sync>;
pub type EnrichHook = Arc<dyn Fn(&Context, &mut Record) + Send + Sync>;

pub struct Attribute<Q> {
    name: String,
    query: Option<QueryHook<Q>>,
    order: Option<OrderHook<Q>>,
    authorize_all: Option<AuthorizeAllHook>,
    authorize_single: Option<AuthorizeSingleHook>,
    enrich: Option<EnrichHook>,
}

impl<Q> Attribute<Q> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: None,
            order: None,
            authorize_all: None,
            authorize_single: None,
            enrich: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach query-level logic needed to materialize the attribute
    pub fn query<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Context, &mut Q) + Send + Sync + 'static,
    {
        self.query = Some(Arc::new(hook));
        self
    }

    /// Replace plain column ordering for this attribute
    pub fn order<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Context, &mut Q, SortDirection) + Send + Sync + 'static,
    {
        self.order = Some(Arc::new(hook));
        self
    }

    /// Request-wide check; when it fails the per-record check decides
    pub fn authorize_all<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.authorize_all = Some(Arc::new(hook));
        self
    }

    pub fn authorize_single<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Context, &Record) -> bool + Send + Sync + 'static,
    {
        self.authorize_single = Some(Arc::new(hook));
        self
    }

    /// Post-fetch mutation, run once per record where the attribute is visible
    pub fn enrich<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Context, &mut Record) + Send + Sync + 'static,
    {
        self.enrich = Some(Arc::new(hook));
        self
    }

    /// Run the query hook; false when none is declared
    pub fn apply_query(&self, context: &Context, query: &mut Q) -> bool {
        match &self.query {
            Some(hook) => {
                hook(context, query);
                true
            }
            None => false,
        }
    }

    /// Run the order hook; false when none is declared
    pub fn apply_order(&self, context: &Context, query: &mut Q, direction: SortDirection) -> bool {
        match &self.order {
            Some(hook) => {
                hook(context, query, direction);
                true
            }
            None => false,
        }
    }

    pub fn authorizes_all(&self, context: &Context) -> bool {
        self.authorize_all.as_ref().map_or(true, |hook| hook(context))
    }

    pub fn authorizes_single(&self, context: &Context, record: &Record) -> bool {
        self.authorize_single.as_ref().map_or(true, |hook| hook(context, record))
    }

    pub fn has_enrich_hook(&self) -> bool {
        self.enrich.is_some()
    }

    pub fn enrich_record(&self, context: &Context, record: &mut Record) {
        if let Some(hook) = &self.enrich {
            hook(context, record);
        }
    }
}

impl<Q> Clone for Attribute<Q> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            query: self.query.clone(),
            order: self.order.clone(),
            authorize_all: self.authorize_all.clone(),
            authorize_single: self.authorize_single.clone(),
            enrich: self.enrich.clone(),
        }
    }
}

impl<Q> std::fmt::Debug for Attribute<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("query", &self.query.is_some())
            .field("order", &self.order.is_some())
            .field("authorize_all", &self.authorize_all.is_some())
            .field("authorize_single", &self.authorize_single.is_some())
            .field("enrich", &self.enrich.is_some())
            .finish()
    }
}

/// Ordered attribute whitelist
pub struct AttributeSet<Q> {
    attributes: Vec<Attribute<Q>>,
}

impl<Q> AttributeSet<Q> {
    pub fn new() -> Self {
        Self { attributes: Vec::new() }
    }

    /// Whitelist plain attributes with no hooks
    pub fn of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().fold(Self::new(), |set, name| set.attribute(name))
    }

    pub fn attribute(self, name: impl Into<String>) -> Self {
        self.with(Attribute::new(name))
    }

    /// Add a descriptor; a later declaration replaces an earlier one of the same name
    pub fn with(mut self, attribute: Attribute<Q>) -> Self {
        match self.attributes.iter_mut().find(|a| a.name == attribute.name) {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute<Q>> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute<Q>> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl<Q> Default for AttributeSet<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q> Clone for AttributeSet<Q> {
    fn clone(&self) -> Self {
        Self { attributes: self.attributes.clone() }
    }
}

impl<Q> std::fmt::Debug for AttributeSet<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.attributes.iter()).finish()
    }
}
