//! Index definitions, keys, kinds, storage engines and the [`Index`] type.
//!
//! An index is created from an [`IndexDefinition`] (ordered field specs
//! validated against the schema) and an [`IndexKind`] (uniqueness × storage
//! family). Its engine stores one entry per `(key, record)` pair, so
//! collection fields contribute several entries per record.

mod definition;
pub mod engine;
#[allow(clippy::module_inception)]
mod index;
mod key;
mod kind;
mod progress;

pub use definition::*;
pub use index::*;
pub use key::*;
pub use kind::*;
pub use progress::*;
