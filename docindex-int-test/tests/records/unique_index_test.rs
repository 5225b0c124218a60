use docindex::common::Value;
use docindex::errors::ErrorKind;
use docindex::index::CompositeKey;
use docindex::query::{and, field};
use docindex::{doc, IndexKind};
use docindex_int_test::test_util::{cleanup, create_t_context, insert_grid, run_test};

#[test]
fn test_duplicate_insert_is_rejected_and_rolled_back() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            let unique = db.create_index("T", "T.ab", IndexKind::UNIQUE, &["a", "b"])?;
            let by_a = db.create_index("T", "T.a", IndexKind::NOT_UNIQUE, &["a"])?;
            let existing = db.insert("T", doc! { a: 1, b: 2 })?;

            let err = db.insert("T", doc! { a: 1, b: 2 }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);
            let duplicate = err.duplicate().expect("duplicate key details");
            assert_eq!(duplicate.index_name, "T.ab");
            assert_eq!(duplicate.existing, existing);
            assert!(err.message().contains("T.ab"));

            assert_eq!(unique.size(), 1);
            assert_eq!(by_a.size(), 1);
            assert_eq!(db.count("T")?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_update_moves_only_changed_entries() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            let index = db.create_index("T", "T.ab", IndexKind::UNIQUE, &["a", "b"])?;
            let ids = insert_grid(&db, "T", 20)?;

            db.update(ids[0], doc! { a: 5, b: 5 })?;
            assert_eq!(index.size(), 20);
            assert!(db
                .query("T", &and(vec![field("a").eq(0), field("b").eq(0)]))?
                .is_empty());
            assert_eq!(
                db.query("T", &and(vec![field("a").eq(5), field("b").eq(5)]))?.ids(),
                vec![ids[0]]
            );

            // record 1 already holds (0, 1)
            let err = db.update(ids[2], doc! { a: 0, b: 1 }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);
            assert_eq!(
                db.load(ids[2])?.and_then(|d| d.get("b").and_then(|v| v.as_i64())),
                Some(2)
            );
            let key = CompositeKey::new(vec![Value::Int(0), Value::Int(2)]);
            assert_eq!(index.get(&key)?, vec![ids[2]]);

            // same keys again is a no-op for the index
            db.update(ids[3], doc! { a: 0, b: 3 })?;
            assert_eq!(index.size(), 20);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_delete_frees_unique_key() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("T", "T.a", IndexKind::UNIQUE_HASH, &["a"])?;
            let id = db.insert("T", doc! { a: 7 })?;
            assert!(db.insert("T", doc! { a: 7 }).is_err());

            let removed = db.delete(id)?;
            assert_eq!(removed.get("a").and_then(|v| v.as_i64()), Some(7));
            assert!(db.load(id)?.is_none());

            db.insert("T", doc! { a: 7 })?;
            assert_eq!(db.query("T", &field("a").eq(7))?.len(), 1);

            let err = db.delete(id).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::RecordNotFound);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_type_mismatch_is_rejected_before_indexing() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            let index = db.create_index("T", "T.a", IndexKind::NOT_UNIQUE, &["a"])?;

            let err = db.insert("T", doc! { a: "one" }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ValidationError);
            assert_eq!(index.size(), 0);

            let err = db.insert("Missing", doc! { a: 1 }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ClassNotFound);

            // undeclared fields are stored but not validated
            db.insert("T", doc! { a: 1, extra: "free" })?;
            assert_eq!(index.size(), 1);
            Ok(())
        },
        cleanup,
    )
}
