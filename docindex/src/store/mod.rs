//! Record storage the index layer reads back for residual filtering.

mod memory;
mod record_store;

pub use memory::*;
pub use record_store::*;
