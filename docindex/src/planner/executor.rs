use std::collections::BTreeSet;
use std::sync::Arc;

use super::{BranchAccess, BranchPlan, IndexAccess, QueryPlan};
use crate::common::{Document, RecordId};
use crate::errors::IndexResult;
use crate::query::{compare_by, SortOrder};
use crate::store::{RecordStore, StoredRecord};

/// Records a query returned, with the plan that produced them.
#[derive(Clone, Debug)]
pub struct QueryResult {
    plan: QueryPlan,
    records: Vec<(RecordId, Document)>,
    candidate_count: usize,
}

impl QueryResult {
    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    /// Matching records, in the plan's order or else in id order.
    pub fn records(&self) -> &[(RecordId, Document)] {
        &self.records
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.records.iter().map(|(id, _)| *id).collect()
    }

    pub fn documents(&self) -> Vec<&Document> {
        self.records.iter().map(|(_, doc)| doc).collect()
    }

    /// Index entries fetched plus records scanned, before filtering.
    pub fn candidate_count(&self) -> usize {
        self.candidate_count
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn used_indexes(&self) -> Vec<String> {
        self.plan.used_indexes()
    }
}

/// Runs query plans against the indexes and the record store.
///
/// Index results only narrow the candidates. Every candidate is loaded and
/// re-checked against its whole branch and the queried class subtree, so
/// indexes read at different instants never leak a stale match.
#[derive(Clone)]
pub(crate) struct PlanExecutor {
    inner: Arc<PlanExecutorInner>,
}

impl PlanExecutor {
    pub fn new(store: RecordStore) -> Self {
        PlanExecutor {
            inner: Arc::new(PlanExecutorInner { store }),
        }
    }

    /// Executes a plan, unioning the records of its branches.
    ///
    /// # Errors
    /// `ConcurrencyConflict` when a consulted index was swapped by a
    /// rebuild or dropped mid-read; the caller may re-plan and retry.
    pub fn execute(&self, plan: QueryPlan) -> IndexResult<QueryResult> {
        self.inner.execute(plan)
    }
}

struct PlanExecutorInner {
    store: RecordStore,
}

impl PlanExecutorInner {
    fn execute(&self, plan: QueryPlan) -> IndexResult<QueryResult> {
        let mut seen: BTreeSet<RecordId> = BTreeSet::new();
        let mut matched: Vec<(RecordId, Document)> = Vec::new();
        let mut candidate_count = 0;

        for branch_plan in plan.branches() {
            let candidates = self.candidates(&plan, branch_plan, &mut candidate_count)?;
            for (id, record) in candidates {
                if seen.contains(&id) || !plan.includes_class(record.class_name()) {
                    continue;
                }
                if branch_plan.branch().matches(record.document()) {
                    seen.insert(id);
                    matched.push((id, record.into_document()));
                }
            }
        }
        Self::sort(&plan, &mut matched);

        log::debug!(
            "Query on {} matched {} of {} candidates using {:?}",
            plan.class_name(),
            matched.len(),
            candidate_count,
            plan.used_indexes()
        );
        Ok(QueryResult {
            plan,
            records: matched,
            candidate_count,
        })
    }

    fn sort(plan: &QueryPlan, matched: &mut [(RecordId, Document)]) {
        let order_by = plan.order_by();
        if plan.is_ordered_by_index() {
            if order_by.first().map(|term| term.order()) == Some(SortOrder::Descending) {
                matched.reverse();
            }
            return;
        }
        matched.sort_by_key(|(id, _)| *id);
        if !order_by.is_empty() {
            matched.sort_by(|(_, left), (_, right)| compare_by(order_by, left, right));
        }
    }

    fn candidates(
        &self,
        plan: &QueryPlan,
        branch_plan: &BranchPlan,
        candidate_count: &mut usize,
    ) -> IndexResult<Vec<(RecordId, StoredRecord)>> {
        match branch_plan.access() {
            BranchAccess::FullScan => {
                let records = self.store.scan(plan.classes())?;
                *candidate_count += records.len();
                Ok(records)
            }
            BranchAccess::Indexed(accesses) => {
                let ids = Self::intersect(accesses, candidate_count)?;
                let mut records = Vec::with_capacity(ids.len());
                for id in ids {
                    // deleted since the index was read
                    if let Some(record) = self.store.get(id)? {
                        records.push((id, record));
                    }
                }
                Ok(records)
            }
        }
    }

    /// Ids every access returned, in the first access's order.
    fn intersect(
        accesses: &[IndexAccess],
        candidate_count: &mut usize,
    ) -> IndexResult<Vec<RecordId>> {
        let mut result: Option<Vec<RecordId>> = None;
        for access in accesses {
            let (ids, fetched) = access.fetch()?;
            *candidate_count += fetched;
            let narrowed = match result {
                None => ids,
                Some(mut previous) => {
                    let ids: BTreeSet<RecordId> = ids.into_iter().collect();
                    previous.retain(|id| ids.contains(id));
                    previous
                }
            };
            if narrowed.is_empty() {
                return Ok(narrowed);
            }
            result = Some(narrowed);
        }
        Ok(result.unwrap_or_default())
    }
}
