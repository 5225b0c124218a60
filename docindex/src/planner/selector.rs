use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::Arc;

use indexmap::IndexMap;
use itertools::Itertools;

use super::{BranchAccess, BranchPlan, IndexAccess, IndexLookup, QueryPlan};
use crate::catalog::IndexCatalog;
use crate::common::Value;
use crate::errors::IndexResult;
use crate::index::{CollectionExtraction, CompositeKey, Index, KeyRange, MatchStyle};
use crate::query::{Branch, Operator, OrderBy, Predicate, QueryFilter};
use crate::schema::Schema;

/// Chooses the indexes that serve each branch of a query.
///
/// For every index visible from the queried class the selector walks the
/// index fields in order and binds them to the branch's predicates:
///
/// * an EQ or IN predicate binds the field and the walk continues;
/// * a range, BETWEEN or CONTAINS-style predicate binds the field as the
///   terminal condition and ends the walk;
/// * anything else ends the walk.
///
/// Hash indexes qualify only when every field is bound and no range is
/// involved. The deepest match wins; equal depths prefer the index with
/// fewer fields, then one whose scan already yields the requested order,
/// then the older index. Remaining indexes whose bound predicates are
/// disjoint from the ones already served are added and their results
/// intersected.
#[derive(Clone)]
pub struct IndexSelector {
    inner: Arc<IndexSelectorInner>,
}

impl IndexSelector {
    pub fn new(catalog: IndexCatalog) -> Self {
        IndexSelector {
            inner: Arc::new(IndexSelectorInner { catalog }),
        }
    }

    /// Plans a filter over a class and its subclasses.
    ///
    /// # Errors
    /// Returns `ClassNotFound` for an unknown class. A filter no index
    /// can serve is not an error; the plan's outcome reports it.
    pub fn create_plan(
        &self,
        schema: &Schema,
        class_name: &str,
        filter: &QueryFilter,
    ) -> IndexResult<QueryPlan> {
        self.inner.create_plan(schema, class_name, filter, &[])
    }

    /// Plans a filter whose result is sorted by `order_by`.
    ///
    /// The plan is marked as ordered by index when its single branch reads
    /// one sorted index whose fields after the equality prefix are the
    /// order terms; otherwise the executor sorts the matched records.
    pub fn create_ordered_plan(
        &self,
        schema: &Schema,
        class_name: &str,
        filter: &QueryFilter,
        order_by: &[OrderBy],
    ) -> IndexResult<QueryPlan> {
        self.inner.create_plan(schema, class_name, filter, order_by)
    }
}

struct IndexSelectorInner {
    catalog: IndexCatalog,
}

/// How a predicate binds an index field.
enum Binding {
    Equality(Vec<Value>),
    Point(Value),
    Range(Bound<Value>, Bound<Value>),
}

enum Terminal {
    Point(Value),
    Range(Bound<Value>, Bound<Value>),
}

struct Candidate {
    index: Index,
    position: usize,
    field_count: usize,
    equalities: Vec<Vec<Value>>,
    terminal: Option<Terminal>,
    covered: Vec<usize>,
    serves_order: bool,
}

impl Candidate {
    fn depth(&self) -> usize {
        self.equalities.len() + usize::from(self.terminal.is_some())
    }

    fn rank(&self, other: &Candidate) -> Ordering {
        other
            .depth()
            .cmp(&self.depth())
            .then(self.field_count.cmp(&other.field_count))
            .then(other.serves_order.cmp(&self.serves_order))
            .then(self.position.cmp(&other.position))
    }

    /// Whether one scan of this candidate returns records sorted by
    /// `order_by`: a sorted index, single-valued equalities, and the next
    /// scalar fields naming the order terms in one direction.
    fn orders_by(&self, order_by: &[OrderBy]) -> bool {
        let Some(first) = order_by.first() else {
            return false;
        };
        if self.index.capabilities().match_style != MatchStyle::Ordered
            || order_by.iter().any(|term| term.order() != first.order())
            || self.equalities.iter().any(|values| values.len() != 1)
            || matches!(self.terminal, Some(Terminal::Point(_)))
        {
            return false;
        }
        let remaining = &self.index.definition().field_specs()[self.equalities.len()..];
        order_by.len() <= remaining.len()
            && order_by.iter().zip(remaining).all(|(term, spec)| {
                spec.extraction() == CollectionExtraction::None
                    && spec.name() == term.field().as_str()
            })
    }

    fn into_access(self) -> IndexAccess {
        let depth = self.depth();
        let prefixes: Vec<Vec<Value>> = if self.equalities.is_empty() {
            vec![Vec::new()]
        } else {
            self.equalities
                .iter()
                .map(|values| values.iter().cloned())
                .multi_cartesian_product()
                .collect()
        };

        let lookup = match self.terminal {
            Some(Terminal::Range(lower, upper)) => IndexLookup::Ranges(
                prefixes
                    .into_iter()
                    .map(|prefix| KeyRange::new(prefix, lower.clone(), upper.clone()))
                    .collect(),
            ),
            terminal => {
                let prefixes: Vec<Vec<Value>> = match terminal {
                    Some(Terminal::Point(value)) => prefixes
                        .into_iter()
                        .map(|mut prefix| {
                            prefix.push(value.clone());
                            prefix
                        })
                        .collect(),
                    _ => prefixes,
                };
                if depth == self.field_count {
                    let keys: BTreeSet<CompositeKey> =
                        prefixes.into_iter().map(CompositeKey::new).collect();
                    IndexLookup::Points(keys.into_iter().collect())
                } else {
                    IndexLookup::Ranges(prefixes.into_iter().map(KeyRange::prefix).collect())
                }
            }
        };
        IndexAccess::new(self.index, depth, lookup, self.covered)
    }
}

impl IndexSelectorInner {
    fn create_plan(
        &self,
        schema: &Schema,
        class_name: &str,
        filter: &QueryFilter,
        order_by: &[OrderBy],
    ) -> IndexResult<QueryPlan> {
        let classes = schema.subtree(class_name)?;
        let indexes: Vec<Index> = self
            .catalog
            .get_indexes(schema, class_name)?
            .into_iter()
            .filter(|index| !index.is_dropped())
            .filter(|index| index.capabilities().match_style != MatchStyle::Text)
            .collect();

        let mut branches = Vec::with_capacity(filter.branches().len());
        let mut ordered_by_index = false;
        for branch in filter.branches() {
            let (plan, ordered) = self.plan_branch(&indexes, branch, order_by);
            ordered_by_index = ordered;
            branches.push(plan);
        }
        let ordered_by_index = ordered_by_index && branches.len() == 1;
        let plan = QueryPlan::new(class_name, classes, branches)
            .with_order(order_by.to_vec(), ordered_by_index);
        log::debug!("Planned {}", plan);
        Ok(plan)
    }

    /// Plans one branch; the flag tells whether its only access already
    /// yields `order_by`.
    fn plan_branch(
        &self,
        indexes: &[Index],
        branch: &Branch,
        order_by: &[OrderBy],
    ) -> (BranchPlan, bool) {
        let field_map = Self::field_map(branch);
        let mut candidates: Vec<Candidate> = indexes
            .iter()
            .enumerate()
            .filter_map(|(position, index)| Self::match_index(position, index, branch, &field_map))
            .map(|mut candidate| {
                candidate.serves_order = candidate.orders_by(order_by);
                candidate
            })
            .collect();
        candidates.sort_by(|a, b| a.rank(b));

        let mut covered: BTreeSet<usize> = BTreeSet::new();
        let mut accesses = Vec::new();
        let mut ordered = false;
        for candidate in candidates {
            if candidate.covered.iter().any(|p| covered.contains(p)) {
                continue;
            }
            covered.extend(candidate.covered.iter().copied());
            if accesses.is_empty() {
                ordered = candidate.serves_order;
            }
            accesses.push(candidate.into_access());
        }
        let ordered = ordered && accesses.len() == 1;

        let residual: Vec<usize> = (0..branch.predicates().len())
            .filter(|p| !covered.contains(p))
            .collect();
        let access = if accesses.is_empty() {
            BranchAccess::FullScan
        } else {
            BranchAccess::Indexed(accesses)
        };
        (BranchPlan::new(branch.clone(), access, residual), ordered)
    }

    /// Field name to the position of its first indexable predicate.
    fn field_map(branch: &Branch) -> IndexMap<String, usize> {
        let mut map = IndexMap::new();
        for (position, predicate) in branch.predicates().iter().enumerate() {
            if !predicate.is_indexable() {
                continue;
            }
            if let Some(field) = predicate.field() {
                map.entry(field.as_str().to_string()).or_insert(position);
            }
        }
        map
    }

    fn match_index(
        position: usize,
        index: &Index,
        branch: &Branch,
        field_map: &IndexMap<String, usize>,
    ) -> Option<Candidate> {
        let capabilities = index.capabilities();
        let specs = index.definition().field_specs();
        let mut candidate = Candidate {
            index: index.clone(),
            position,
            field_count: specs.len(),
            equalities: Vec::new(),
            terminal: None,
            covered: Vec::new(),
            serves_order: false,
        };

        for spec in specs {
            let Some(&predicate_position) = field_map.get(spec.name()) else {
                break;
            };
            let predicate = &branch.predicates()[predicate_position];
            match Self::bind(spec.extraction(), predicate, !index.ignore_null_values()) {
                Some(Binding::Equality(values)) => {
                    candidate.equalities.push(values);
                    candidate.covered.push(predicate_position);
                }
                Some(Binding::Point(value)) => {
                    candidate.terminal = Some(Terminal::Point(value));
                    candidate.covered.push(predicate_position);
                    break;
                }
                Some(Binding::Range(lower, upper)) if capabilities.supports_range => {
                    candidate.terminal = Some(Terminal::Range(lower, upper));
                    candidate.covered.push(predicate_position);
                    break;
                }
                _ => break,
            }
        }

        let depth = candidate.depth();
        if depth == 0 {
            return None;
        }
        if capabilities.match_style == MatchStyle::Exact && depth != candidate.field_count {
            return None;
        }
        Some(candidate)
    }

    fn bind(
        extraction: CollectionExtraction,
        predicate: &Predicate,
        keeps_nulls: bool,
    ) -> Option<Binding> {
        let first = predicate.operands().first().cloned();
        match (extraction, predicate.operator()) {
            (CollectionExtraction::None, Operator::Eq) => first.map(|v| Binding::Equality(vec![v])),
            (CollectionExtraction::None, Operator::IsNull) if keeps_nulls => {
                Some(Binding::Equality(vec![Value::Null]))
            }
            (CollectionExtraction::None, Operator::In) => {
                Some(Binding::Equality(predicate.operands().to_vec()))
            }
            (CollectionExtraction::None, op) if op.is_range() => {
                let (lower, upper) = predicate.bounds();
                Some(Binding::Range(lower, upper))
            }
            (CollectionExtraction::Elements, Operator::Contains)
            | (CollectionExtraction::ByKey, Operator::ContainsKey)
            | (CollectionExtraction::ByValue, Operator::ContainsValue) => first.map(Binding::Point),
            _ => None,
        }
    }
}
