//! Schema service: the class tree and typed properties the index layer
//! validates field specs against and walks for inherited index visibility.

mod property;
#[allow(clippy::module_inception)]
mod schema;

pub use property::*;
pub use schema::*;
