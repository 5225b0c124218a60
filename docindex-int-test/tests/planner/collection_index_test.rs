use docindex::common::Value;
use docindex::errors::{ErrorKind, IndexResult};
use docindex::index::CollectionExtraction;
use docindex::planner::IndexLookup;
use docindex::query::{and, field};
use docindex::schema::PropertyType;
use docindex::{doc, IndexKind};
use docindex_int_test::test_util::{cleanup, create_test_context, run_test, TestContext};

fn create_item_context() -> IndexResult<TestContext> {
    let ctx = create_test_context()?;
    let db = ctx.db();
    db.create_class("Item", None)?;
    db.create_property("Item", "name", PropertyType::String, None)?;
    db.create_property("Item", "tags", PropertyType::EmbeddedList, Some(PropertyType::String))?;
    db.create_property("Item", "attrs", PropertyType::EmbeddedMap, Some(PropertyType::Integer))?;
    db.create_property("Item", "notes", PropertyType::EmbeddedList, None)?;
    Ok(ctx)
}

#[test]
fn test_list_elements_are_indexed_separately() {
    run_test(
        create_item_context,
        |ctx| {
            let db = ctx.db();
            let index = db.create_index("Item", "Item.tags", IndexKind::NOT_UNIQUE, &["tags"])?;
            assert_eq!(
                index.definition().field_specs()[0].extraction(),
                CollectionExtraction::Elements
            );

            let first = db.insert("Item", doc! { name: "first", tags: ["red", "blue"] })?;
            db.insert("Item", doc! { name: "second", tags: ["blue"] })?;
            db.insert("Item", doc! { name: "third", tags: [] })?;
            assert_eq!(index.size(), 3);
            assert_eq!(index.key_count(), 2);

            let result = db.query("Item", &field("tags").contains("blue"))?;
            assert_eq!(result.len(), 2);
            assert_eq!(result.used_indexes(), vec!["Item.tags"]);
            assert!(matches!(
                result.plan().branches()[0].accesses()[0].lookup(),
                IndexLookup::Points(_)
            ));

            db.update(first, doc! { name: "first", tags: ["green", "blue"] })?;
            assert!(db.query("Item", &field("tags").contains("red"))?.is_empty());
            assert_eq!(db.query("Item", &field("tags").contains("green"))?.ids(), vec![first]);
            assert_eq!(index.size(), 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_map_by_key_and_by_value() {
    run_test(
        create_item_context,
        |ctx| {
            let db = ctx.db();
            let by_key = db.create_index("Item", "Item.attrKeys", IndexKind::NOT_UNIQUE, &["attrs by key"])?;
            let by_value =
                db.create_index("Item", "Item.attrValues", IndexKind::NOT_UNIQUE, &["attrs by value"])?;
            assert_eq!(
                by_key.definition().field_specs()[0].extraction(),
                CollectionExtraction::ByKey
            );
            assert_eq!(
                by_value.definition().field_specs()[0].extraction(),
                CollectionExtraction::ByValue
            );

            db.insert("Item", doc! { name: "first", attrs: { color: 1, size: 2 } })?;
            db.insert("Item", doc! { name: "second", attrs: { color: 3 } })?;

            let result = db.query("Item", &field("attrs").contains_key("color"))?;
            assert_eq!(result.len(), 2);
            assert_eq!(result.used_indexes(), vec!["Item.attrKeys"]);

            let result = db.query("Item", &field("attrs").contains_key("size"))?;
            assert_eq!(result.len(), 1);

            let result = db.query("Item", &field("attrs").contains_value(3))?;
            assert_eq!(result.len(), 1);
            assert_eq!(result.used_indexes(), vec!["Item.attrValues"]);
            assert_eq!(
                result.documents()[0].get("name"),
                Some(&Value::from("second"))
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_map_without_modifier_defaults_to_keys() {
    run_test(
        create_item_context,
        |ctx| {
            let db = ctx.db();
            let index = db.create_index("Item", "Item.attrs", IndexKind::NOT_UNIQUE, &["attrs"])?;
            assert_eq!(
                index.definition().field_specs()[0].extraction(),
                CollectionExtraction::ByKey
            );
            assert_eq!(index.definition().field_specs()[0].declared_type(), PropertyType::String);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_composite_key_with_collection_field() {
    run_test(
        create_item_context,
        |ctx| {
            let db = ctx.db();
            let index =
                db.create_index("Item", "Item.name_tags", IndexKind::UNIQUE, &["name", "tags"])?;
            db.insert("Item", doc! { name: "a", tags: ["x", "y"] })?;
            db.insert("Item", doc! { name: "b", tags: ["x"] })?;
            assert_eq!(index.size(), 3);

            let result = db.query(
                "Item",
                &and(vec![field("name").eq("a"), field("tags").contains("x")]),
            )?;
            assert_eq!(result.len(), 1);
            assert_eq!(result.plan().branches()[0].accesses()[0].depth(), 2);

            let err = db.insert("Item", doc! { name: "b", tags: ["z", "x"] }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);
            assert_eq!(index.size(), 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_hash_index_serves_collection_point_lookup() {
    run_test(
        create_item_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("Item", "Item.tags", IndexKind::NOT_UNIQUE_HASH, &["tags"])?;
            db.insert("Item", doc! { tags: ["red", "blue"] })?;
            db.insert("Item", doc! { tags: ["red"] })?;

            let result = db.query("Item", &field("tags").contains("red"))?;
            assert_eq!(result.len(), 2);
            assert_eq!(result.used_indexes(), vec!["Item.tags"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_invalid_collection_definitions() {
    run_test(
        create_item_context,
        |ctx| {
            let db = ctx.db();

            let err = db
                .create_index("Item", "Item.bad1", IndexKind::NOT_UNIQUE, &["name by key"])
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidFieldName);

            let err = db
                .create_index("Item", "Item.bad2", IndexKind::NOT_UNIQUE, &["tags", "attrs"])
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidIndexType);

            let err = db
                .create_index("Item", "Item.bad3", IndexKind::NOT_UNIQUE, &["notes"])
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::LinkedTypeMissing);

            let err = db
                .create_index("Item", "Item.bad4", IndexKind::NOT_UNIQUE, &["missing"])
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::FieldNotFound);

            assert!(db.index_names().is_empty());
            Ok(())
        },
        cleanup,
    )
}
