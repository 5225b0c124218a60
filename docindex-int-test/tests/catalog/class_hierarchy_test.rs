use docindex::errors::{ErrorKind, IndexResult};
use docindex::planner::PlanOutcome;
use docindex::query::{and, field};
use docindex::schema::PropertyType;
use docindex::{doc, IndexKind};
use docindex_int_test::test_util::{cleanup, create_t_context, insert_grid, run_test, TestContext};

fn create_hierarchy_context() -> IndexResult<TestContext> {
    let ctx = create_t_context()?;
    let db = ctx.db();
    db.create_class("Sub", Some("T"))?;
    db.create_property("Sub", "c", PropertyType::Integer, None)?;
    db.create_class("Other", None)?;
    db.create_property("Other", "a", PropertyType::Integer, None)?;
    Ok(ctx)
}

#[test]
fn test_index_on_superclass_serves_subclass_queries() {
    run_test(
        create_hierarchy_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("T", "T.a", IndexKind::NOT_UNIQUE, &["a"])?;
            insert_grid(&db, "T", 20)?;
            insert_grid(&db, "Sub", 20)?;
            db.insert("Other", doc! { a: 1 })?;

            let index = db.get_index("T.a").expect("index T.a");
            assert_eq!(index.size(), 40);

            let sub = db.query("Sub", &field("a").eq(1))?;
            assert_eq!(sub.used_indexes(), vec!["T.a"]);
            assert_eq!(sub.len(), 10);

            let base = db.query("T", &field("a").eq(1))?;
            assert_eq!(base.len(), 20);

            let other = db.query("Other", &field("a").eq(1))?;
            assert_eq!(other.plan().outcome(), PlanOutcome::NoUsableIndex);
            assert_eq!(other.len(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_subclass_index_is_invisible_from_superclass() {
    run_test(
        create_hierarchy_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("Sub", "Sub.c", IndexKind::NOT_UNIQUE, &["c"])?;
            db.insert("Sub", doc! { a: 1, c: 5 })?;
            db.insert("T", doc! { a: 2 })?;

            assert!(db.get_indexes("T")?.is_empty());
            assert_eq!(db.get_indexes("Sub")?.len(), 1);
            assert!(!db.are_indexed("T", &["c"])?);
            assert!(db.are_indexed("Sub", &["c"])?);

            let result = db.query("Sub", &field("c").eq(5))?;
            assert_eq!(result.used_indexes(), vec!["Sub.c"]);
            assert_eq!(result.len(), 1);

            let result = db.query("T", &field("c").eq(5))?;
            assert_eq!(result.plan().outcome(), PlanOutcome::NoUsableIndex);
            assert_eq!(result.len(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_catalog_lookups() {
    run_test(
        create_hierarchy_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("T", "T.ab", IndexKind::UNIQUE, &["a", "b"])?;
            db.create_index("Sub", "Sub.ca", IndexKind::NOT_UNIQUE, &["c", "a"])?;

            assert!(db.are_indexed("T", &["a"])?);
            assert!(db.are_indexed("T", &["a", "b"])?);
            assert!(!db.are_indexed("T", &["b"])?);
            assert!(!db.are_indexed("T", &["b", "a"])?);
            assert!(db.are_indexed("Sub", &["a", "b"])?);
            assert!(db.are_indexed("Sub", &["c"])?);

            assert_eq!(db.get_class_indexes("Sub").len(), 1);
            assert_eq!(db.get_indexes("Sub")?.len(), 2);
            assert_eq!(db.get_involved_indexes("Sub", &["a"])?.len(), 1);
            assert!(db.get_class_involved_indexes("Sub", &["a"]).is_empty());

            assert!(db.get_class_index("T", "T.ab").is_some());
            assert!(db.get_class_index("Sub", "T.ab").is_none());
            assert_eq!(db.index_names(), vec!["T.ab", "Sub.ca"]);

            let err = db.get_indexes("Missing").unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ClassNotFound);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_drop_class_removes_records_from_inherited_indexes() {
    run_test(
        create_hierarchy_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("T", "T.a", IndexKind::NOT_UNIQUE, &["a"])?;
            db.create_index("Sub", "Sub.c", IndexKind::NOT_UNIQUE, &["c"])?;
            insert_grid(&db, "T", 10)?;
            db.insert("Sub", doc! { a: 0, c: 1 })?;
            db.insert("Sub", doc! { a: 0, c: 2 })?;
            assert_eq!(db.count("T")?, 12);

            let err = db.drop_class("T").unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

            db.drop_class("Sub")?;
            assert!(db.get_index("Sub.c").is_none());
            assert_eq!(db.get_index("T.a").map(|i| i.size()), Some(10));
            assert_eq!(db.count("T")?, 10);

            let result = db.query("T", &and(vec![field("a").eq(0), field("b").lt(5)]))?;
            assert_eq!(result.len(), 5);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_property_in_use_by_subclass_index() {
    run_test(
        create_hierarchy_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("Sub", "Sub.a", IndexKind::NOT_UNIQUE, &["a"])?;

            let err = db.drop_property("T", "a").unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::PropertyInUse);

            db.drop_index("Sub.a")?;
            db.drop_property("T", "a")?;
            Ok(())
        },
        cleanup,
    )
}
