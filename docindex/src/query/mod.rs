//! Query conditions and their normalized predicate form.
//!
//! A [`Condition`] tree plays the role of a parsed WHERE clause. The
//! planner consumes it as a [`QueryFilter`]: branches in disjunctive normal
//! form whose conjuncts are [`Predicate`]s, indexable or opaque.
//! [`OrderBy`] terms sort the result.

mod condition;
mod expression;
mod filter;
mod order;
mod predicate;

pub use condition::*;
pub use expression::*;
pub use filter::*;
pub use order::*;
pub use predicate::*;
