mod common;

use common::{driver, User};
use docstore::expr::{eq, field, gt};
use docstore::{Collection, CollectionOptions, DataFormat, Driver, IndexOptions, SqlValue};
use serde_json::json;

#[tokio::test]
async fn jsonb_round_trips_structurally() -> anyhow::Result<()> {
    let options = CollectionOptions::new().data_format(DataFormat::Jsonb);
    let col = Collection::create(driver().await, "binary_docs", options).await?;

    let doc = json!({ "foo": 42, "nested": { "list": [1, 2, 3] }, "s": "text" });
    let id = col.insert(&doc).await?;
    assert_eq!(col.get::<serde_json::Value>(id).await?, Some(doc));
    Ok(())
}

#[tokio::test]
async fn jsonb_column_stores_binary_not_text() -> anyhow::Result<()> {
    let driver = driver().await;
    let options = CollectionOptions::new().data_format(DataFormat::Jsonb);
    let col = Collection::create(driver.clone(), "binary_docs", options).await?;
    col.set(1, &json!({ "foo": 42 })).await?;

    let row = driver.get(r#"SELECT typeof("data") AS t FROM "binary_docs" WHERE "id" = 1"#, vec![]).await?.unwrap();
    assert_eq!(row.get("t"), Some(&SqlValue::Text("blob".to_owned())));
    Ok(())
}

#[tokio::test]
async fn jsonb_filters_through_jsonb_extract() -> anyhow::Result<()> {
    let options = CollectionOptions::new().data_format(DataFormat::Jsonb);
    let col = Collection::create(driver().await, "binary_docs", options).await?;
    for i in 1..=5 {
        col.set(i, &User { name: format!("user-{}", i), value: i }).await?;
    }

    let (sql, _) = col.find(eq(field("value"), 3)).to_sql()?;
    assert_eq!(sql, r#"SELECT json("data") AS "data" FROM "binary_docs" WHERE jsonb_extract("data", '$.value') = ?"#);

    let results = col.find(eq(field("value"), 3)).all::<User>().await?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].value, 3);
    Ok(())
}

#[tokio::test]
async fn json_and_jsonb_collections_agree_on_results() -> anyhow::Result<()> {
    let driver = driver().await;
    let textual = Collection::create(driver.clone(), "docs_text", CollectionOptions::new()).await?;
    let binary = Collection::create(driver, "docs_blob", CollectionOptions::new().data_format(DataFormat::Jsonb)).await?;

    for col in [&textual, &binary] {
        for i in 1..=10 {
            col.set(i, &User { name: format!("user-{}", i), value: i }).await?;
        }
    }

    let filter = || gt(field("value"), 6);
    let mut from_text: Vec<i64> = textual.find(filter()).all::<User>().await?.into_iter().map(|u| u.value).collect();
    let mut from_blob: Vec<i64> = binary.find(filter()).all::<User>().await?.into_iter().map(|u| u.value).collect();
    from_text.sort();
    from_blob.sort();
    assert_eq!(from_text, from_blob);
    assert_eq!(from_text, vec![7, 8, 9, 10]);
    Ok(())
}

#[tokio::test]
async fn jsonb_index_compiles_with_jsonb_extract() -> anyhow::Result<()> {
    let options = CollectionOptions::new().data_format(DataFormat::Jsonb);
    let col = Collection::create(driver().await, "binary_docs", options).await?;
    col.index("idx_foo", "foo", IndexOptions::default()).await?;
    col.index("idx_foo", "foo", IndexOptions::default()).await?;
    Ok(())
}

#[tokio::test]
async fn jsonb_batch_get_and_count() -> anyhow::Result<()> {
    let options = CollectionOptions::new().data_format(DataFormat::Jsonb);
    let col = Collection::create(driver().await, "binary_docs", options).await?;

    let alice = User { name: "Alice".into(), value: 1 };
    let bob = User { name: "Bob".into(), value: 2 };
    col.set(1, &alice).await?;
    col.set(2, &bob).await?;

    assert_eq!(col.get_many::<User, _, _>([2, 1, 99]).await?, vec![Some(bob), Some(alice), None]);
    assert_eq!(col.find(None).count().await?, 2);
    Ok(())
}
