use docindex::errors::{ErrorKind, IndexResult};
use docindex::planner::PlanOutcome;
use docindex::query::{and, expr, field, or, Condition, Expr, OrderBy};
use docindex::schema::PropertyType;
use docindex::{doc, Database, IndexKind};
use docindex_int_test::test_util::{
    cleanup, create_t_context, insert_grid, run_test, TestContext,
};

#[test]
fn test_composite_unique_index_end_to_end() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("T", "T.ab", IndexKind::UNIQUE, &["a", "b"])?;
            insert_grid(&db, "T", 100)?;

            let result = db.query("T", &and(vec![field("a").eq(1), field("b").eq(2)]))?;
            assert_eq!(result.len(), 1);
            assert_eq!(result.used_indexes(), vec!["T.ab"]);
            let doc = result.documents()[0];
            assert_eq!(doc.get("a").and_then(|v| v.as_i64()), Some(1));
            assert_eq!(doc.get("b").and_then(|v| v.as_i64()), Some(2));

            let result = db.query("T", &field("a").eq(1))?;
            assert_eq!(result.len(), 10);
            assert_eq!(result.used_indexes(), vec!["T.ab"]);
            assert!(result
                .documents()
                .iter()
                .all(|doc| doc.get("a").and_then(|v| v.as_i64()) == Some(1)));

            let err = db.drop_property("T", "a").unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::PropertyInUse);
            assert!(db.schema().get_property("T", "a")?.is_some());

            db.drop_index("T.ab")?;
            db.drop_property("T", "a")?;
            assert!(db.schema().get_property("T", "a")?.is_none());
            assert!(db.get_index("T.ab").is_none());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_deeper_index_supersedes_shorter_one() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            db.create_property("T", "c", PropertyType::Integer, None)?;
            db.create_index("T", "T.a", IndexKind::NOT_UNIQUE, &["a"])?;
            db.create_index("T", "T.abc", IndexKind::NOT_UNIQUE, &["a", "b", "c"])?;
            for i in 0..50i64 {
                db.insert("T", docindex::doc! { a: (i % 5), b: (i % 3), c: (i % 2) })?;
            }

            let condition = and(vec![field("a").eq(1), field("b").eq(2), field("c").eq(1)]);
            let result = db.query("T", &condition)?;
            assert_eq!(result.used_indexes(), vec!["T.abc"]);
            assert_eq!(result.plan().branches()[0].accesses()[0].depth(), 3);
            assert!(result.plan().branches()[0].residual().is_empty());

            // i = 11, 41 satisfy i%5=1, i%3=2, i%2=1
            assert_eq!(result.len(), 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_non_prefix_predicate_falls_back_to_scan() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("T", "T.ab", IndexKind::UNIQUE, &["a", "b"])?;
            insert_grid(&db, "T", 100)?;

            let plan = db.explain("T", &field("b").eq(2))?;
            assert_eq!(plan.outcome(), PlanOutcome::NoUsableIndex);
            assert!(plan.to_string().contains("full scan"));

            let result = db.query("T", &field("b").eq(2))?;
            assert_eq!(result.len(), 10);
            assert!(result.used_indexes().is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_hash_index_needs_every_field_bound() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("T", "T.ab", IndexKind::NOT_UNIQUE_HASH, &["a", "b"])?;
            insert_grid(&db, "T", 100)?;

            let full = db.query("T", &and(vec![field("a").eq(1), field("b").eq(2)]))?;
            assert_eq!(full.used_indexes(), vec!["T.ab"]);
            assert_eq!(full.len(), 1);

            let prefix = db.query("T", &field("a").eq(1))?;
            assert_eq!(prefix.plan().outcome(), PlanOutcome::NoUsableIndex);
            assert_eq!(prefix.len(), 10);

            let ranged = db.query("T", &and(vec![field("a").eq(1), field("b").gt(5)]))?;
            assert_eq!(ranged.plan().outcome(), PlanOutcome::NoUsableIndex);
            assert_eq!(ranged.len(), 4);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_range_predicates_on_sorted_index() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("T", "T.a", IndexKind::NOT_UNIQUE, &["a"])?;
            insert_grid(&db, "T", 100)?;

            let between = db.query("T", &field("a").between(2, 3))?;
            assert_eq!(between.len(), 20);
            assert_eq!(between.used_indexes(), vec!["T.a"]);

            assert_eq!(db.query("T", &field("a").gte(8))?.len(), 20);
            assert_eq!(db.query("T", &field("a").gt(8))?.len(), 10);
            assert_eq!(db.query("T", &field("a").lt(1))?.len(), 10);
            assert_eq!(db.query("T", &field("a").lte(1))?.len(), 20);
            assert!(db.query("T", &field("a").gt(9))?.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_composite_prefix_with_range_terminal() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("T", "T.ab", IndexKind::UNIQUE, &["a", "b"])?;
            insert_grid(&db, "T", 100)?;

            let result = db.query("T", &and(vec![field("a").eq(4), field("b").gte(7)]))?;
            assert_eq!(result.len(), 3);
            assert_eq!(result.candidate_count(), 3);
            assert_eq!(result.plan().branches()[0].accesses()[0].depth(), 2);

            let result = db.query("T", &field("a").in_list(vec![1, 3]))?;
            assert_eq!(result.len(), 20);
            assert_eq!(result.used_indexes(), vec!["T.ab"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_disjoint_indexes_are_intersected() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("T", "T.a", IndexKind::NOT_UNIQUE, &["a"])?;
            db.create_index("T", "T.b", IndexKind::NOT_UNIQUE_HASH, &["b"])?;
            insert_grid(&db, "T", 100)?;

            let result = db.query("T", &and(vec![field("a").eq(1), field("b").eq(2)]))?;
            assert_eq!(result.used_indexes(), vec!["T.a", "T.b"]);
            assert_eq!(result.len(), 1);
            assert_eq!(result.candidate_count(), 20);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_or_branches_are_planned_separately() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("T", "T.a", IndexKind::NOT_UNIQUE, &["a"])?;
            insert_grid(&db, "T", 100)?;

            let result = db.query("T", &or(vec![field("a").eq(0), field("b").eq(9)]))?;
            let plan = result.plan();
            assert_eq!(plan.outcome(), PlanOutcome::Indexed);
            assert!(!plan.branches()[0].is_full_scan());
            assert!(plan.branches()[1].is_full_scan());
            // i = 9 matches both branches
            assert_eq!(result.len(), 19);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_opaque_predicates_stay_residual() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("T", "T.a", IndexKind::NOT_UNIQUE, &["a"])?;
            insert_grid(&db, "T", 100)?;

            let condition = and(vec![
                field("a").eq(1),
                expr(Expr::field("b").plus(1)).eq(3),
                field("b").ne(5),
            ]);
            let result = db.query("T", &condition)?;
            assert_eq!(result.used_indexes(), vec!["T.a"]);
            assert_eq!(result.plan().branches()[0].residual().len(), 2);
            assert_eq!(result.len(), 1);
            assert_eq!(
                result.documents()[0].get("b").and_then(|v| v.as_i64()),
                Some(2)
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_explain_reports_chosen_index() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("T", "T.ab", IndexKind::UNIQUE, &["a", "b"])?;

            let plan = db.explain("T", &and(vec![field("a").eq(1), field("b").eq(2)]))?;
            assert_eq!(plan.used_indexes(), vec!["T.ab"]);
            assert!(plan.to_string().contains("index T.ab depth 2/2"));

            let err = db.explain("Missing", &field("a").eq(1)).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ClassNotFound);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_prefix_query_keeps_records_with_null_trailing_fields() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            let partial = db.insert("T", doc! { a: 1 })?;
            let full = db.insert("T", doc! { a: 1, b: 2 })?;
            db.insert("T", doc! { b: 2 })?;

            let scanned = db.query("T", &field("a").eq(1))?;
            assert_eq!(scanned.plan().outcome(), PlanOutcome::NoUsableIndex);
            assert_eq!(scanned.ids(), vec![partial, full]);

            db.create_index("T", "T.ab", IndexKind::UNIQUE, &["a", "b"])?;
            let indexed = db.query("T", &field("a").eq(1))?;
            assert_eq!(indexed.used_indexes(), vec!["T.ab"]);
            assert_eq!(indexed.ids(), scanned.ids());

            assert_eq!(db.query("T", &field("a").gte(1))?.len(), 2);
            let exact = db.query("T", &and(vec![field("a").eq(1), field("b").eq(2)]))?;
            assert_eq!(exact.ids(), vec![full]);

            // records cut before a null never collide in a unique index
            db.insert("T", doc! { a: 1 })?;
            assert_eq!(db.query("T", &field("a").eq(1))?.len(), 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_repeated_query_is_stable_across_unrelated_writes() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("T", "T.ab", IndexKind::UNIQUE, &["a", "b"])?;
            db.create_index("T", "T.b", IndexKind::NOT_UNIQUE, &["b"])?;
            insert_grid(&db, "T", 100)?;
            let condition = and(vec![field("a").eq(3), field("b").gt(4)]);

            let first = db.query("T", &condition)?;
            db.insert("T", doc! { a: 42, b: 42 })?;
            let second = db.query("T", &condition)?;

            assert_eq!(first.len(), 5);
            assert_eq!(second.ids(), first.ids());
            assert_eq!(second.used_indexes(), first.used_indexes());
            assert_eq!(second.plan().to_string(), first.plan().to_string());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_is_null_uses_indexes_that_keep_nulls() {
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
            db.create_index("T", "T.ab", IndexKind::NOT_UNIQUE, &["a", "b"])?;
            let partial = db.insert("T", doc! { a: 1 })?;
            let full = db.insert("T", doc! { a: 1, b: 2 })?;
            let headless = db.insert("T", doc! { b: 3 })?;

            let result = db.query("T", &and(vec![field("a").eq(1), field("b").is_null()]))?;
            assert_eq!(result.ids(), vec![partial]);
            assert_eq!(result.plan().branches()[0].accesses()[0].depth(), 2);

            let result = db.query("T", &field("a").is_null())?;
            assert_eq!(result.ids(), vec![headless]);
            assert_eq!(result.used_indexes(), vec!["T.ab"]);

            let result = db.query("T", &and(vec![field("a").eq(1), field("b").is_not_null()]))?;
            assert_eq!(result.ids(), vec![full]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_is_null_is_residual_when_nulls_are_ignored() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("T", "T.ab", IndexKind::NOT_UNIQUE, &["a", "b"])?;
            let partial = db.insert("T", doc! { a: 1 })?;
            db.insert("T", doc! { a: 1, b: 2 })?;

            let result = db.query("T", &and(vec![field("a").eq(1), field("b").is_null()]))?;
            assert_eq!(result.ids(), vec![partial]);
            let branch = &result.plan().branches()[0];
            assert_eq!(branch.accesses()[0].depth(), 1);
            assert_eq!(branch.residual().len(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_ordered_query_reads_index_order() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            insert_grid(&db, "T", 100)?;
            let b_values = |condition: &Condition, order_by: &[OrderBy]| -> IndexResult<Vec<i64>> {
                let result = db.query_ordered("T", condition, order_by)?;
                Ok(result
                    .documents()
                    .iter()
                    .filter_map(|doc| doc.get("b").and_then(|v| v.as_i64()))
                    .collect())
            };
            let condition = field("a").eq(2);
            let expected: Vec<i64> = (0..10).rev().collect();
            assert_eq!(b_values(&condition, &[OrderBy::desc("b")])?, expected);

            db.create_index("T", "T.ab", IndexKind::UNIQUE, &["a", "b"])?;
            db.create_index("T", "T.ba", IndexKind::UNIQUE, &["b", "a"])?;
            let plan = db.explain_ordered("T", &condition, &[OrderBy::desc("b")])?;
            assert!(plan.is_ordered_by_index());
            assert_eq!(plan.used_indexes(), vec!["T.ab"]);
            assert_eq!(b_values(&condition, &[OrderBy::desc("b")])?, expected);

            let result = db.query_ordered("T", &field("b").eq(7), &[OrderBy::asc("a")])?;
            assert!(result.plan().is_ordered_by_index());
            assert_eq!(result.used_indexes(), vec!["T.ba"]);
            let a_values: Vec<i64> = result
                .documents()
                .iter()
                .filter_map(|doc| doc.get("a").and_then(|v| v.as_i64()))
                .collect();
            assert_eq!(a_values, (0..10).collect::<Vec<i64>>());
            Ok(())
        },
        cleanup,
    )
}
