use docindex::common::{Document, RecordId};
use docindex::errors::{ErrorKind, IndexError, IndexResult};
use docindex::index::Uniqueness;
use docindex::query::and;
use docindex::schema::PropertyType;
use docindex::{doc, Database};
use std::backtrace::Backtrace;
use std::time::Instant;

/// Runs a test between a setup and a teardown step.
///
/// The teardown runs even when the test fails, so its consistency checks
/// never hide the original error.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> IndexResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> IndexResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> IndexResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let start_time = Instant::now();
    let result = std::panic::catch_unwind(|| {
        let backtrace = Backtrace::capture();
        match before() {
            Ok(ctx) => match test(ctx.clone()) {
                Ok(_) => after(ctx)
                    .map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                Err(e) => {
                    let _ = after(ctx);
                    Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                }
            },
            Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
        }
    });

    let (error, backtrace) = match result {
        Ok(Ok(_)) => return,
        Ok(Err((error, backtrace))) => (error, backtrace),
        Err(panic_err) => {
            let message = if let Some(s) = panic_err.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            (format!("Panic: {}", message), String::new())
        }
    };

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {:?}", start_time.elapsed());
    eprintln!("Error: {}", error);
    if !backtrace.is_empty() && !backtrace.contains("disabled") {
        eprintln!("\nBacktrace:\n{}", backtrace);
    }
    eprintln!("=====================================================\n");
    panic!("Test failed. Error: {}", error);
}

#[derive(Clone)]
pub struct TestContext {
    db: Database,
}

impl TestContext {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn db(&self) -> Database {
        self.db.clone()
    }
}

/// Opens an empty in-memory database.
pub fn create_test_context() -> IndexResult<TestContext> {
    let db = Database::builder().open()?;
    Ok(TestContext::new(db))
}

/// Opens a database with class `T` declaring integer properties `a` and `b`.
pub fn create_t_context() -> IndexResult<TestContext> {
    let ctx = create_test_context()?;
    let db = ctx.db();
    db.create_class("T", None)?;
    db.create_property("T", "a", PropertyType::Integer, None)?;
    db.create_property("T", "b", PropertyType::Integer, None)?;
    Ok(ctx)
}

/// Inserts `count` records of class `class_name` with `a = i / 10` and
/// `b = i % 10`.
pub fn insert_grid(db: &Database, class_name: &str, count: i64) -> IndexResult<Vec<RecordId>> {
    let mut ids = Vec::with_capacity(count as usize);
    for i in 0..count {
        ids.push(db.insert(class_name, doc! { a: (i / 10), b: (i % 10) })?);
    }
    Ok(ids)
}

/// All records of a class and its subclasses, in id order.
pub fn all_records(db: &Database, class_name: &str) -> IndexResult<Vec<(RecordId, Document)>> {
    Ok(db.query(class_name, &and(vec![]))?.records().to_vec())
}

/// Verifies that every index holds exactly the entries its records derive.
///
/// Dictionary indexes are skipped since a later writer displaces the
/// entry of an earlier one.
pub fn cleanup(ctx: TestContext) -> IndexResult<()> {
    let db = ctx.db();
    for name in db.index_names() {
        let index = match db.get_index(&name) {
            Some(index) => index,
            None => continue,
        };
        if index.kind().uniqueness() == Uniqueness::Dictionary {
            continue;
        }

        let mut expected = 0;
        for (id, document) in all_records(&db, index.class_name())? {
            for key in index.keys_for(&document) {
                expected += 1;
                if !index.get(&key)?.contains(&id) {
                    return Err(IndexError::new(
                        &format!("Index {} misses key {} of record {}", name, key, id),
                        ErrorKind::InternalError,
                    ));
                }
            }
        }
        if index.size() != expected {
            return Err(IndexError::new(
                &format!(
                    "Index {} holds {} entries but its records derive {}",
                    name,
                    index.size(),
                    expected
                ),
                ErrorKind::InternalError,
            ));
        }
    }
    Ok(())
}
