//! Index registry and the writer that keeps indexes in step with records.

#[allow(clippy::module_inception)]
mod catalog;
mod index_writer;

pub use catalog::*;
pub(crate) use index_writer::*;
