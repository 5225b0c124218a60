use anyhow::{ensure, Context};
use docindex::query::{and, field};
use docindex::schema::PropertyType;
use docindex::{doc, Database, ErrorKind, IndexKind};
use docindex_int_test::test_util::{cleanup, TestContext};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

const THREADS: usize = 8;
const OPERATIONS_PER_THREAD: usize = 500;
const KEY_SPACE: i64 = 500;

fn main() -> anyhow::Result<()> {
    println!("Starting index stress test...");
    let db = Database::builder().progress_step(1_000).open()?;
    db.create_class("Account", None)?;
    db.create_property("Account", "code", PropertyType::Integer, None)?;
    db.create_property("Account", "region", PropertyType::Integer, None)?;
    db.create_index("Account", "Account.code", IndexKind::UNIQUE, &["code"])?;
    db.create_index("Account", "Account.region", IndexKind::NOT_UNIQUE_HASH, &["region"])?;

    let start = Instant::now();
    let barrier = Arc::new(Barrier::new(THREADS));
    let violations = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::with_capacity(THREADS);

    for _ in 0..THREADS {
        let db = db.clone();
        let barrier = Arc::clone(&barrier);
        let violations = Arc::clone(&violations);
        handles.push(thread::spawn(move || -> anyhow::Result<()> {
            let mut rng = rand::rng();
            barrier.wait();
            for _ in 0..OPERATIONS_PER_THREAD {
                let code = rng.random_range(0..KEY_SPACE);
                let region = rng.random_range(0..8i64);
                match db.insert("Account", doc! { code: code, region: region }) {
                    Ok(id) => {
                        if rng.random_bool(0.3) {
                            db.delete(id)?;
                        }
                    }
                    Err(e) if e.kind() == &ErrorKind::UniqueConstraintViolation => {
                        violations.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(())
        }));
    }

    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("stress thread panicked"))??;
    }

    let total = db.count("Account")?;
    ensure!(total as i64 <= KEY_SPACE, "unique index admitted {} records", total);
    for code in 0..KEY_SPACE {
        let found = db.query("Account", &field("code").eq(code))?;
        ensure!(found.len() <= 1, "code {} is held by {} records", code, found.len());
    }

    let region = db.query(
        "Account",
        &and(vec![field("region").eq(3), field("code").lt(100)]),
    )?;
    println!(
        "Region 3 below code 100: {} records via {:?}",
        region.len(),
        region.used_indexes()
    );

    cleanup(TestContext::new(db)).context("index consistency check failed")?;
    println!(
        "Finished in {:?}: {} live records, {} rejected duplicates",
        start.elapsed(),
        total,
        violations.load(Ordering::Relaxed)
    );
    Ok(())
}
