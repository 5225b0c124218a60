//! Index selection and plan execution.
//!
//! [`IndexSelector`] turns a [`QueryFilter`](crate::query::QueryFilter)
//! into a [`QueryPlan`]; the executor reads the chosen indexes, falls back
//! to scanning for branches no index serves and re-checks every candidate.

mod executor;
mod plan;
mod selector;

pub use executor::QueryResult;
pub(crate) use executor::PlanExecutor;
pub use plan::*;
pub use selector::*;
