use docindex::errors::ErrorKind;
use docindex::query::field;
use docindex::{doc, IndexKind};
use docindex_int_test::test_util::{cleanup, create_t_context, insert_grid, run_test};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn test_concurrent_duplicate_inserts_admit_one() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("T", "T.ab", IndexKind::UNIQUE, &["a", "b"])?;

            let num_threads = 8;
            let barrier = Arc::new(Barrier::new(num_threads));
            let accepted = Arc::new(AtomicUsize::new(0));
            let rejected = Arc::new(AtomicUsize::new(0));
            let mut handles = vec![];

            for _ in 0..num_threads {
                let db = db.clone();
                let barrier = Arc::clone(&barrier);
                let accepted = Arc::clone(&accepted);
                let rejected = Arc::clone(&rejected);
                handles.push(thread::spawn(move || {
                    barrier.wait();
                    match db.insert("T", doc! { a: 1, b: 1 }) {
                        Ok(_) => accepted.fetch_add(1, Ordering::SeqCst),
                        Err(e) if e.kind() == &ErrorKind::UniqueConstraintViolation => {
                            rejected.fetch_add(1, Ordering::SeqCst)
                        }
                        Err(e) => panic!("unexpected error: {}", e),
                    };
                }));
            }
            for handle in handles {
                let _ = handle.join();
            }

            assert_eq!(accepted.load(Ordering::SeqCst), 1);
            assert_eq!(rejected.load(Ordering::SeqCst), num_threads - 1);
            assert_eq!(db.count("T")?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_writers_and_index_creation_interleave() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            insert_grid(&db, "T", 200)?;

            let num_threads = 4;
            let completed = Arc::new(AtomicUsize::new(0));
            let mut handles = vec![];
            for thread_id in 0..num_threads {
                let db = db.clone();
                let completed = Arc::clone(&completed);
                handles.push(thread::spawn(move || {
                    let mut rng = rand::rng();
                    for i in 0..50i64 {
                        let a = 100 + thread_id as i64;
                        let _ = db.insert("T", doc! { a: a, b: i });
                        if rng.random_bool(0.2) {
                            let _ = db.query("T", &field("a").eq(a));
                        }
                    }
                    completed.fetch_add(1, Ordering::SeqCst);
                }));
            }

            db.create_index("T", "T.a", IndexKind::NOT_UNIQUE, &["a"])?;
            db.create_index("T", "T.b", IndexKind::NOT_UNIQUE_HASH, &["b"])?;

            let done = Arc::clone(&completed);
            awaitility::at_most(Duration::from_secs(10))
                .until(move || done.load(Ordering::SeqCst) == num_threads);
            for handle in handles {
                let _ = handle.join();
            }

            assert_eq!(db.count("T")?, 400);
            for thread_id in 0..num_threads {
                let result = db.query("T", &field("a").eq(100 + thread_id as i64))?;
                assert_eq!(result.len(), 50);
                assert_eq!(result.used_indexes(), vec!["T.a"]);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_queries_survive_concurrent_rebuilds() {
    run_test(
        create_t_context,
        |ctx| {
            let db = ctx.db();
            db.create_index("T", "T.ab", IndexKind::UNIQUE, &["a", "b"])?;
            insert_grid(&db, "T", 100)?;

            let stop = Arc::new(AtomicBool::new(false));
            let failures = Arc::new(AtomicUsize::new(0));
            let mut readers = vec![];
            for _ in 0..3 {
                let db = db.clone();
                let stop = Arc::clone(&stop);
                let failures = Arc::clone(&failures);
                readers.push(thread::spawn(move || {
                    while !stop.load(Ordering::SeqCst) {
                        match db.query("T", &field("a").eq(4)) {
                            Ok(result) if result.len() == 10 => {}
                            _ => {
                                failures.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                    }
                }));
            }

            for _ in 0..5 {
                db.rebuild_index("T.ab")?;
            }
            stop.store(true, Ordering::SeqCst);
            for reader in readers {
                let _ = reader.join();
            }

            assert_eq!(failures.load(Ordering::SeqCst), 0);
            Ok(())
        },
        cleanup,
    )
}
