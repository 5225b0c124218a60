mod constants;
mod document;
mod field_path;
mod latch;
mod record_id;
mod type_utils;
mod value;

pub use constants::*;
pub use document::*;
pub use field_path::*;
pub use latch::*;
pub use record_id::*;
pub use type_utils::*;
pub use value::*;
