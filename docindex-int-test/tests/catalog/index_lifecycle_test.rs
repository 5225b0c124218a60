use docindex::common::Value;
use docindex::errors::{ErrorKind, IndexError};
use docindex::index::{CompositeKey, ProgressCallback, ProgressEvent};
use docindex::planner::PlanOutcome;
use docindex::query::{and, field};
use docindex::schema::PropertyType;
use docindex::{doc, Database, IndexKind};
use docindex_int_test::test_util::{
    cleanup, create_t_context, insert_grid, run_test, TestContext,
};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

#[test]
fn test_index_kind_names() {
    assert_eq!(IndexKind::parse("unique").unwrap(), IndexKind::UNIQUE);
    assert_eq!(IndexKind::parse("NOTUNIQUE").unwrap(), IndexKind::NOT_UNIQUE);
    assert_eq!(
        IndexKind::from_str("NOTUNIQUE_HASH_INDEX").unwrap(),
        IndexKind::NOT_UNIQUE_HASH
    );
    assert_eq!(IndexKind::UNIQUE_HASH.to_string(), "UNIQUE_HASH_INDEX");

    let err = IndexKind::parse("PROXY").unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::InvalidIndexType);
    let err = IndexKind::parse("SPATIAL").unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::InvalidIndexType);
}

#[test]
fn test_index_name_rules() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("T", "T.a", IndexKind::NOT_UNIQUE, &["a"])?;

            let err = db
                .create_index("T", "t.A", IndexKind::UNIQUE, &["b"])
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IndexAlreadyExists);

            let err = db
                .create_index("T", "bad name", IndexKind::UNIQUE, &["b"])
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidIndexName);

            let err = db.create_index("T", "T.none", IndexKind::UNIQUE, &[]).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::EmptyFieldList);

            let err = db.drop_index("T.missing").unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IndexNotFound);

            assert_eq!(db.index_names(), vec!["T.a"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unique_build_over_duplicates_leaves_no_index() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            insert_grid(&db, "T", 30)?;

            let err = db
                .create_index("T", "T.a", IndexKind::UNIQUE, &["a"])
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IndexBuildFailed);
            assert!(db.get_index("T.a").is_none());

            db.create_index("T", "T.a", IndexKind::NOT_UNIQUE, &["a"])?;
            assert_eq!(db.query("T", &field("a").eq(2))?.len(), 10);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_build_reports_progress() {
    run_test(
        || {
            let db = Database::builder().progress_step(4).open()?;
            db.create_class("T", None)?;
            db.create_property("T", "a", PropertyType::Integer, None)?;
            db.create_property("T", "b", PropertyType::Integer, None)?;
            Ok(TestContext::new(db))
        },
        |ctx| {
            let db = ctx.db();
            insert_grid(&db, "T", 10)?;

            let events = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&events);
            let listener = ProgressCallback::new(move |event: ProgressEvent| {
                if let Ok(mut events) = sink.lock() {
                    events.push(event);
                }
                Ok(())
            });
            db.create_index_with_listener("T", "T.b", IndexKind::NOT_UNIQUE, &["b"], &listener)?;

            let events = events.lock().map(|e| e.clone()).unwrap_or_default();
            let progress: Vec<usize> = events
                .iter()
                .filter_map(|event| match event {
                    ProgressEvent::Progress { done, .. } => Some(*done),
                    _ => None,
                })
                .collect();
            assert_eq!(progress, vec![4, 8, 10]);
            assert_eq!(
                events.first(),
                Some(&ProgressEvent::Begin {
                    index_name: "T.b".to_string(),
                    total: 10
                })
            );
            assert_eq!(
                events.last(),
                Some(&ProgressEvent::Completion {
                    index_name: "T.b".to_string(),
                    success: true
                })
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_listener_error_aborts_build() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            insert_grid(&db, "T", 5)?;

            let listener = ProgressCallback::new(|event: ProgressEvent| match event {
                ProgressEvent::Progress { .. } => Err(IndexError::new(
                    "cancelled by caller",
                    ErrorKind::InvalidOperation,
                )),
                _ => Ok(()),
            });
            let err = db
                .create_index_with_listener("T", "T.a", IndexKind::NOT_UNIQUE, &["a"], &listener)
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IndexBuildFailed);
            assert!(db.get_index("T.a").is_none());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_rebuild_preserves_results() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("T", "T.ab", IndexKind::UNIQUE, &["a", "b"])?;
            insert_grid(&db, "T", 50)?;
            let before = db.query("T", &field("a").eq(3))?.ids();

            db.rebuild_index("T.ab")?;
            let after = db.query("T", &field("a").eq(3))?;
            assert_eq!(after.ids(), before);
            assert_eq!(after.used_indexes(), vec!["T.ab"]);
            assert_eq!(db.get_index("T.ab").map(|i| i.size()), Some(50));

            let err = db.rebuild_index("T.missing").unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IndexNotFound);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_full_text_index_is_never_planned() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            db.create_property("T", "body", PropertyType::String, None)?;
            let index = db.create_index("T", "T.body", IndexKind::FULL_TEXT, &["body"])?;
            db.insert("T", doc! { body: "The quick brown fox" })?;
            db.insert("T", doc! { body: "a lazy dog" })?;
            assert_eq!(index.size(), 7);
            assert_eq!(
                index.get(&CompositeKey::single(Value::from("quick")))?.len(),
                1
            );

            let result = db.query("T", &field("body").eq("a lazy dog"))?;
            assert_eq!(result.plan().outcome(), PlanOutcome::NoUsableIndex);
            assert_eq!(result.len(), 1);

            let err = db
                .create_index("T", "T.body2", IndexKind::FULL_TEXT, &["body", "a"])
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidIndexType);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_dictionary_index_keeps_last_writer() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            let index = db.create_index("T", "T.a", IndexKind::DICTIONARY, &["a"])?;
            let first = db.insert("T", doc! { a: 1, b: 1 })?;
            let second = db.insert("T", doc! { a: 1, b: 2 })?;
            assert_ne!(first, second);

            assert_eq!(index.get(&CompositeKey::single(Value::from(1)))?, vec![second]);
            assert_eq!(db.query("T", &field("a").eq(1))?.ids(), vec![second]);
            assert_eq!(db.count("T")?, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_null_values_are_indexed_on_request() {
    run_test(
        || {
            let db = Database::builder().ignore_null_values(false).open()?;
            db.create_class("T", None)?;
            db.create_property("T", "a", PropertyType::Integer, None)?;
            db.create_property("T", "b", PropertyType::Integer, None)?;
            Ok(TestContext::new(db))
        },
        |ctx| {
            let db = ctx.db();
            let index = db.create_index("T", "T.a", IndexKind::NOT_UNIQUE, &["a"])?;
            db.insert("T", doc! { b: 1 })?;
            db.insert("T", doc! { a: 2, b: 2 })?;
            assert_eq!(index.size(), 2);
            assert_eq!(index.get(&CompositeKey::single(Value::Null))?.len(), 1);

            let result = db.query("T", &and(vec![field("a").eq(2), field("b").eq(2)]))?;
            assert_eq!(result.len(), 1);
            Ok(())
        },
        cleanup,
    )
}
