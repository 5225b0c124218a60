//! # docindex - Secondary Indexes for an Embedded Document Database
//!
//! `docindex` is the indexing layer of a document database whose records
//! belong to classes arranged in a single-inheritance tree. It keeps
//! secondary indexes in step with record writes and picks the best index
//! for each branch of a query.
//!
//! ## Key Features
//!
//! - **Composite indexes**: keys over one or more fields, ordered
//!   lexicographically field by field
//! - **Collection indexes**: list elements, map keys or map values each
//!   become a separate entry
//! - **Unique, non-unique, full-text and dictionary kinds** over sorted
//!   or hash storage
//! - **Inherited visibility**: indexes on a class serve queries on its
//!   subclasses, and the most specific class wins
//! - **Index selection**: deepest usable prefix wins, with residual
//!   filtering of whatever no index covers
//! - **Online build**: bulk index creation with progress callbacks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docindex::{doc, Database, IndexKind};
//! use docindex::query::{and, field};
//! use docindex::schema::PropertyType;
//!
//! let db = Database::builder().open()?;
//! db.create_class("T", None)?;
//! db.create_property("T", "a", PropertyType::Integer, None)?;
//! db.create_property("T", "b", PropertyType::Integer, None)?;
//! db.create_index("T", "T.ab", IndexKind::UNIQUE, &["a", "b"])?;
//!
//! for i in 0..100 {
//!     db.insert("T", doc! { a: (i / 10), b: (i % 10) })?;
//! }
//!
//! let result = db.query("T", &and(vec![field("a").eq(1), field("b").eq(2)]))?;
//! assert_eq!(result.len(), 1);
//! assert_eq!(result.used_indexes(), vec!["T.ab"]);
//! ```
//!
//! ## Module Organization
//!
//! - [`catalog`] - Index registry and the writer applying record changes
//! - [`common`] - Values, documents, record ids, field paths and latches
//! - [`database`] - The facade tying schema, store, catalog and planner
//! - [`database_builder`] - Builder for opening a [`Database`]
//! - [`database_config`] - Database configuration
//! - [`errors`] - Error types and result definitions
//! - [`index`] - Definitions, keys, kinds and storage engines
//! - [`planner`] - Index selection and plan execution
//! - [`query`] - Conditions and their normalized predicate form
//! - [`schema`] - Class tree and typed properties
//! - [`store`] - Record storage abstraction and the in-memory store

pub mod catalog;
pub mod common;
pub mod database;
pub mod database_builder;
pub mod database_config;
pub mod errors;
pub mod index;
pub mod planner;
pub mod query;
pub mod schema;
pub mod store;

pub use database::Database;
pub use database_builder::DatabaseBuilder;
pub use database_config::DatabaseConfig;
pub use errors::{ErrorKind, IndexError, IndexResult};
pub use index::{Index, IndexKind};

#[cfg(test)]
#[ctor::ctor]
fn init() {
    colog::init();
}
