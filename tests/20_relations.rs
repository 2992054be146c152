mod common;

use anyhow::Result;
use serde_json::json;

use common::PostsRepository;
use repository_gateway::RequestBuilder;

#[tokio::test]
async fn only_whitelisted_relations_are_loaded() -> Result<()> {
    let store = common::seeded_store().await?;
    let mut builder = RequestBuilder::new(PostsRepository::new(store), common::ada());
    builder.with_attributes(["id", "comments.id"]).with_relations(["comments", "bogus"]);

    let records = builder.get_all().await?;

    assert_eq!(
        common::to_json(&records),
        json!([
            {"id": 1, "comments": [{"id": 10}, {"id": 11}]},
            {"id": 2, "comments": [{"id": 12}]},
        ])
    );
    Ok(())
}

#[tokio::test]
async fn relation_without_sub_attributes_exposes_empty_records() -> Result<()> {
    let store = common::seeded_store().await?;
    let mut builder = RequestBuilder::new(PostsRepository::new(store), common::ada());
    builder.with_attributes(["id"]).with_relations(["comments"]);

    let records = builder.get_all().await?;

    assert_eq!(common::to_json(&records)[0], json!({"id": 1, "comments": [{}, {}]}));
    Ok(())
}

#[tokio::test]
async fn unauthorized_relation_is_omitted_for_every_record() -> Result<()> {
    let store = common::seeded_store().await?;
    let mut builder = RequestBuilder::new(PostsRepository::new(store), common::anonymous());
    builder.with_attributes(["id", "comments.id"]).with_relations(["comments"]);

    let records = builder.get_all().await?;

    assert_eq!(records.len(), 2);
    for record in &records {
        assert!(!record.is_visible("comments"));
        assert!(record.relation("comments").is_none(), "relation should not even be loaded");
    }
    assert_eq!(common::to_json(&records), json!([{"id": 1}, {"id": 2}]));
    Ok(())
}

#[tokio::test]
async fn sub_attributes_outside_the_relation_whitelist_are_dropped() -> Result<()> {
    let store = common::seeded_store().await?;
    let mut builder = RequestBuilder::new(PostsRepository::new(store), common::ada());
    builder
        .with_attributes(["id", "comments.id", "comments.body"])
        .with_relations(["comments"]);

    let records = builder.get_all().await?;

    let comments = &common::to_json(&records)[0]["comments"];
    assert_eq!(comments, &json!([{"id": 10}, {"id": 11}]));
    assert!(comments[0].get("body").is_none());
    Ok(())
}

#[tokio::test]
async fn dotted_attributes_need_the_relation_requested() -> Result<()> {
    let store = common::seeded_store().await?;
    let mut builder = RequestBuilder::new(PostsRepository::new(store), common::ada());
    builder.with_attributes(["id", "comments.id"]);

    let records = builder.get_all().await?;

    assert_eq!(common::to_json(&records), json!([{"id": 1}, {"id": 2}]));
    Ok(())
}

#[tokio::test]
async fn sub_attributes_use_the_related_authorization() -> Result<()> {
    let store = common::seeded_store().await?;
    let mut builder = RequestBuilder::new(PostsRepository::new(store), common::ada());
    builder
        .with_attributes(["id", "author.name", "author.email"])
        .with_relations(["author"]);

    let records = builder.get_all().await?;

    assert_eq!(
        common::to_json(&records),
        json!([
            {"id": 1, "author": [{"name": "Ada", "email": "ada@example.com"}]},
            {"id": 2, "author": [{"name": "Bob"}]},
        ])
    );
    Ok(())
}

#[tokio::test]
async fn relations_follow_attributes_in_output() -> Result<()> {
    let store = common::seeded_store().await?;
    let mut builder = RequestBuilder::new(PostsRepository::new(store), common::ada());
    builder
        .with_relations(["author", "comments"])
        .with_attributes(["title", "author.name"]);

    let records = builder.get_all().await?;

    assert_eq!(
        serde_json::to_string(&records[1])?,
        r#"{"title":"A longer title","author":[{"name":"Bob"}],"comments":[{}]}"#
    );
    Ok(())
}
