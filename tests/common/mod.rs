#![allow(dead_code)]

use std::sync::Once;

use anyhow::Result;
use serde_json::{json, Value};
use uuid::Uuid;

use repository_gateway::database::{MemoryQuery, MemoryStore, Queryable, RelationLoad};
use repository_gateway::filter::{FilterOp, SortDirection, WhereClause};
use repository_gateway::repository::{Attribute, AttributeSet, Context, Principal, RelationSet, Repository, RepositoryRelation};
use repository_gateway::Record;

static TRACING: Once = Once::new();

pub const ADA: Uuid = Uuid::from_u128(0xada);
pub const BOB: Uuid = Uuid::from_u128(0xb0b);

/// Route library logs through RUST_LOG, once per test binary
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Three posts (one draft), three comments and two users
pub async fn seeded_store() -> Result<MemoryStore> {
    init_tracing();
    let store = MemoryStore::new();
    store
        .insert_many("users", vec![
            json!({"id": 1, "name": "Ada", "email": "ada@example.com", "account": ADA.to_string()}),
            json!({"id": 2, "name": "Bob", "email": "bob@example.com", "account": BOB.to_string()}),
        ])
        .await?;
    store
        .insert_many("posts", vec![
            json!({"id": 1, "title": "Hello", "body": "first body", "author_id": 1, "published": true, "secret": "s1"}),
            json!({"id": 2, "title": "A longer title", "body": "second body", "author_id": 2, "published": true, "secret": "s2"}),
            json!({"id": 3, "title": "Draft", "body": "draft body", "author_id": 1, "published": false, "secret": "s3"}),
        ])
        .await?;
    store
        .insert_many("comments", vec![
            json!({"id": 10, "post_id": 1, "author_id": 2, "body": "nice"}),
            json!({"id": 11, "post_id": 1, "author_id": 1, "body": "thanks"}),
            json!({"id": 12, "post_id": 2, "author_id": 1, "body": "hm"}),
        ])
        .await?;
    Ok(store)
}

pub fn anonymous() -> Context {
    Context::anonymous()
}

pub fn ada() -> Context {
    Context::for_principal(Principal::new(ADA))
}

pub fn bob() -> Context {
    Context::for_principal(Principal::new(BOB))
}

pub fn editor() -> Context {
    Context::for_principal(Principal::new(Uuid::from_u128(0xed)).with_role("editor"))
}

pub fn admin() -> Context {
    Context::for_principal(Principal::new(Uuid::from_u128(0xad)).with_role("admin"))
}

pub fn ids(records: &[Record]) -> Vec<i64> {
    records.iter().filter_map(|r| r.id().and_then(Value::as_i64)).collect()
}

pub fn to_json(records: &[Record]) -> Value {
    Record::to_json_array(records)
}

// ========================================
// Posts
// ========================================

/// Editors list everything; everyone else only sees published posts.
/// `body` is readable request-wide by authenticated callers, and per record
/// on published posts otherwise. `secret` is stored but never whitelisted.
pub struct PostsRepository {
    store: MemoryStore,
    attributes: AttributeSet<MemoryQuery>,
    relations: RelationSet<MemoryQuery>,
}

impl PostsRepository {
    pub fn new(store: MemoryStore) -> Self {
        let attributes = AttributeSet::of(["id", "title", "author_id", "published"])
            .with(
                Attribute::new("body")
                    .authorize_all(|ctx| ctx.is_authenticated())
                    .authorize_single(|_, post| post.get("published") == Some(&json!(true))),
            )
            .with(
                Attribute::new("title_length")
                    .query(|_, query: &mut MemoryQuery| {
                        query.with_computed("title_length", |row| {
                            json!(row.get("title").and_then(Value::as_str).map_or(0, str::len))
                        });
                    })
                    .order(|_, query: &mut MemoryQuery, direction| {
                        query.order_by_key(
                            |row| json!(row.get("title").and_then(Value::as_str).map_or(0, str::len)),
                            direction,
                        );
                    }),
            )
            .with(Attribute::new("headline").enrich(|_, post| {
                let headline = post.get("title").and_then(Value::as_str).unwrap_or_default().to_uppercase();
                post.set("headline", headline);
            }))
            .with(Attribute::new("slug").enrich(|_, post| {
                let slug = post.get("title").and_then(Value::as_str).unwrap_or_default().to_lowercase().replace(' ', "-");
                post.set("slug", slug);
            }))
            // Reads `slug`, so it only sees it when slug was requested first
            .with(Attribute::new("permalink").enrich(|_, post| {
                let slug = post.get("slug").and_then(Value::as_str).unwrap_or("unknown").to_string();
                post.set("permalink", format!("/posts/{}", slug));
            }));

        let comments_store = store.clone();
        let author_store = store.clone();
        let relations = RelationSet::new()
            .relation("comments", move || CommentsRepository::new(comments_store.clone()))
            .relation("author", move || UsersRepository::new(author_store.clone()));

        Self { store, attributes, relations }
    }
}

impl Repository for PostsRepository {
    type Query = MemoryQuery;

    fn identity(&self) -> &'static str {
        "posts"
    }

    fn base_query(&self, _context: &Context) -> MemoryQuery {
        self.store.query("posts")
    }

    fn attributes(&self) -> &AttributeSet<MemoryQuery> {
        &self.attributes
    }

    fn relations(&self) -> &RelationSet<MemoryQuery> {
        &self.relations
    }

    fn authorize_all(&self, context: &Context) -> bool {
        context.has_role("editor")
    }

    fn authorize_single(&self, _context: &Context, post: &Record) -> bool {
        post.get("published") == Some(&json!(true))
    }
}

#[async_trait::async_trait]
impl RepositoryRelation for PostsRepository {
    fn relation_query(&self, context: &Context) -> MemoryQuery {
        self.base_query(context)
    }
}

// ========================================
// Comments
// ========================================

/// Listed by authenticated callers only. `body` is stored but not whitelisted.
pub struct CommentsRepository {
    store: MemoryStore,
    attributes: AttributeSet<MemoryQuery>,
    relations: RelationSet<MemoryQuery>,
}

impl CommentsRepository {
    pub fn new(store: MemoryStore) -> Self {
        let author_store = store.clone();
        Self {
            store,
            attributes: AttributeSet::of(["id", "post_id", "author_id"]),
            relations: RelationSet::new().relation("author", move || UsersRepository::new(author_store.clone())),
        }
    }
}

impl Repository for CommentsRepository {
    type Query = MemoryQuery;

    fn identity(&self) -> &'static str {
        "comments"
    }

    fn base_query(&self, context: &Context) -> MemoryQuery {
        let mut query = self.store.query("comments");
        if let Some(post) = context.parent() {
            query.filter(WhereClause::eq("comments.post_id", post.id().cloned().unwrap_or(Value::Null)));
        }
        query
    }

    fn extend_query(&self, _context: &Context, query: &mut MemoryQuery, relation: &str) {
        query.with_relation(RelationLoad::new(relation, "comments", "post_id", "id").order_by("id", SortDirection::Asc));
    }

    fn attributes(&self) -> &AttributeSet<MemoryQuery> {
        &self.attributes
    }

    fn relations(&self) -> &RelationSet<MemoryQuery> {
        &self.relations
    }

    fn authorize_all(&self, context: &Context) -> bool {
        context.is_authenticated()
    }
}

#[async_trait::async_trait]
impl RepositoryRelation for CommentsRepository {
    fn relation_query(&self, context: &Context) -> MemoryQuery {
        self.base_query(context)
    }
}

// ========================================
// Users
// ========================================

/// Public profiles. `email` is visible to admins, and to each user on their
/// own record.
pub struct UsersRepository {
    store: MemoryStore,
    attributes: AttributeSet<MemoryQuery>,
    relations: RelationSet<MemoryQuery>,
}

impl UsersRepository {
    pub fn new(store: MemoryStore) -> Self {
        let attributes = AttributeSet::of(["id", "name"]).with(
            Attribute::new("email")
                .authorize_all(|ctx| ctx.has_role("admin"))
                .authorize_single(|ctx, user| {
                    let account = user.get("account").and_then(Value::as_str);
                    ctx.principal_id().map(|id| id.to_string()).as_deref() == account
                }),
        );
        Self { store, attributes, relations: RelationSet::new() }
    }
}

impl Repository for UsersRepository {
    type Query = MemoryQuery;

    fn identity(&self) -> &'static str {
        "users"
    }

    fn base_query(&self, _context: &Context) -> MemoryQuery {
        self.store.query("users")
    }

    fn extend_query(&self, _context: &Context, query: &mut MemoryQuery, relation: &str) {
        query.with_relation(RelationLoad::new(relation, "users", "id", "author_id"));
    }

    fn attributes(&self) -> &AttributeSet<MemoryQuery> {
        &self.attributes
    }

    fn relations(&self) -> &RelationSet<MemoryQuery> {
        &self.relations
    }

    fn authorize_all(&self, _context: &Context) -> bool {
        true
    }
}

// ========================================
// Broken
// ========================================

/// Points at a table that does not exist
pub struct MissingTableRepository {
    store: MemoryStore,
    attributes: AttributeSet<MemoryQuery>,
    relations: RelationSet<MemoryQuery>,
}

impl MissingTableRepository {
    pub fn new(store: MemoryStore) -> Self {
        Self { store, attributes: AttributeSet::of(["id"]), relations: RelationSet::new() }
    }
}

impl Repository for MissingTableRepository {
    type Query = MemoryQuery;

    fn identity(&self) -> &'static str {
        "ghosts"
    }

    fn base_query(&self, _context: &Context) -> MemoryQuery {
        self.store.query("ghosts")
    }

    fn attributes(&self) -> &AttributeSet<MemoryQuery> {
        &self.attributes
    }

    fn relations(&self) -> &RelationSet<MemoryQuery> {
        &self.relations
    }

    fn authorize_all(&self, _context: &Context) -> bool {
        true
    }
}

/// `[column, op, value]` filter shorthand for declarative requests
pub fn filter(column: &str, operator: FilterOp, value: Value) -> Value {
    let op = serde_json::to_value(operator).unwrap_or(Value::Null);
    json!([column, op, value])
}
