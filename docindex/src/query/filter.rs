use std::fmt::{Display, Formatter};

use smallvec::{smallvec, SmallVec};

use super::{Condition, Predicate};
use crate::common::{Document, MAX_FILTER_BRANCHES};

/// Predicates of one branch; most branches hold only a few.
pub type Predicates = SmallVec<[Predicate; 4]>;

/// A conjunction of predicates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Branch {
    predicates: Predicates,
}

impl Branch {
    pub fn new(predicates: Predicates) -> Self {
        Branch { predicates }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Whether the record satisfies every predicate.
    pub fn matches(&self, document: &Document) -> bool {
        self.predicates.iter().all(|p| p.matches(document))
    }
}

impl Display for Branch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.predicates.is_empty() {
            return write!(f, "TRUE");
        }
        for (i, predicate) in self.predicates.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{}", predicate)?;
        }
        Ok(())
    }
}

/// A condition lowered to disjunctive normal form: branches are OR-ed,
/// the predicates inside a branch are AND-ed.
///
/// A filter without branches matches nothing; a single empty branch
/// matches everything.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryFilter {
    branches: Vec<Branch>,
}

impl QueryFilter {
    /// Matches every record.
    pub fn all() -> Self {
        QueryFilter {
            branches: vec![Branch::default()],
        }
    }

    /// Lowers a condition tree, distributing AND over OR.
    ///
    /// When the expansion would exceed [`MAX_FILTER_BRANCHES`] branches the
    /// whole condition becomes one opaque predicate and is scanned.
    pub fn from_condition(condition: &Condition) -> Self {
        let branches = match Self::normalize(condition) {
            Some(conjunctions) => conjunctions
                .into_iter()
                .map(|conjuncts| {
                    Branch::new(conjuncts.iter().map(|c| Predicate::lower(c)).collect())
                })
                .collect(),
            None => {
                log::warn!(
                    "Condition expands past {} branches, falling back to a scan",
                    MAX_FILTER_BRANCHES
                );
                vec![Branch::new(smallvec![Predicate::opaque(condition.clone())])]
            }
        };
        QueryFilter { branches }
    }

    fn normalize(condition: &Condition) -> Option<Vec<Vec<Condition>>> {
        let conjunctions = match condition {
            Condition::And(children) => {
                let mut product: Vec<Vec<Condition>> = vec![Vec::new()];
                for child in children {
                    let alternatives = Self::normalize(child)?;
                    if product.len() * alternatives.len() > MAX_FILTER_BRANCHES {
                        return None;
                    }
                    let mut next = Vec::with_capacity(product.len() * alternatives.len());
                    for prefix in &product {
                        for alternative in &alternatives {
                            let mut conjuncts = prefix.clone();
                            conjuncts.extend(alternative.iter().cloned());
                            next.push(conjuncts);
                        }
                    }
                    product = next;
                }
                product
            }
            Condition::Or(children) => {
                let mut branches = Vec::new();
                for child in children {
                    branches.extend(Self::normalize(child)?);
                }
                branches
            }
            atom => vec![vec![atom.clone()]],
        };
        (conjunctions.len() <= MAX_FILTER_BRANCHES).then_some(conjunctions)
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Whether some branch accepts the record.
    pub fn matches(&self, document: &Document) -> bool {
        self.branches.iter().any(|b| b.matches(document))
    }
}

impl Display for QueryFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.branches.is_empty() {
            return write!(f, "FALSE");
        }
        for (i, branch) in self.branches.iter().enumerate() {
            if i > 0 {
                write!(f, " OR ")?;
            }
            write!(f, "({})", branch)?;
        }
        Ok(())
    }
}

impl From<&Condition> for QueryFilter {
    fn from(condition: &Condition) -> Self {
        QueryFilter::from_condition(condition)
    }
}
