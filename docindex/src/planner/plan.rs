use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use crate::common::RecordId;
use crate::errors::IndexResult;
use crate::index::{CompositeKey, Index, KeyRange};
use crate::query::{Branch, OrderBy, Predicate};

/// How an index is read.
#[derive(Clone, Debug, PartialEq)]
pub enum IndexLookup {
    /// Exact keys covering every field of the index.
    Points(Vec<CompositeKey>),
    /// Prefix or bounded scans of a sorted index.
    Ranges(Vec<KeyRange>),
}

impl IndexLookup {
    /// Number of distinct engine calls the lookup makes.
    pub fn len(&self) -> usize {
        match self {
            IndexLookup::Points(keys) => keys.len(),
            IndexLookup::Ranges(ranges) => ranges.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Display for IndexLookup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let (label, parts): (&str, Vec<String>) = match self {
            IndexLookup::Points(keys) => ("points", keys.iter().map(|k| k.to_string()).collect()),
            IndexLookup::Ranges(ranges) => {
                ("ranges", ranges.iter().map(|r| r.to_string()).collect())
            }
        };
        write!(f, "{} {}", label, parts.join(" | "))
    }
}

/// One index consulted by a branch.
#[derive(Clone, Debug)]
pub struct IndexAccess {
    index: Index,
    depth: usize,
    lookup: IndexLookup,
    covered: Vec<usize>,
}

impl IndexAccess {
    pub(crate) fn new(index: Index, depth: usize, lookup: IndexLookup, covered: Vec<usize>) -> Self {
        IndexAccess {
            index,
            depth,
            lookup,
            covered,
        }
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn index_name(&self) -> &str {
        self.index.name()
    }

    /// Number of leading index fields bound by the branch.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn lookup(&self) -> &IndexLookup {
        &self.lookup
    }

    /// Positions, within the branch, of the predicates this access serves.
    pub fn covered(&self) -> &[usize] {
        &self.covered
    }

    /// Reads the candidate records in index order, each once. Also returns
    /// how many entries were fetched before deduplication.
    pub(crate) fn fetch(&self) -> IndexResult<(Vec<RecordId>, usize)> {
        let mut found = Vec::new();
        match &self.lookup {
            IndexLookup::Points(keys) => {
                for key in keys {
                    found.extend(self.index.get(key)?);
                }
            }
            IndexLookup::Ranges(ranges) => {
                for range in ranges {
                    found.extend(self.index.range(range)?);
                }
            }
        }
        let fetched = found.len();
        let mut seen = BTreeSet::new();
        found.retain(|id| seen.insert(*id));
        Ok((found, fetched))
    }
}

impl Display for IndexAccess {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "index {} depth {}/{}, {}",
            self.index.name(),
            self.depth,
            self.index.definition().param_count(),
            self.lookup
        )
    }
}

/// Candidate source of one branch.
#[derive(Clone, Debug)]
pub enum BranchAccess {
    /// Indexes whose results are intersected, most specific first.
    Indexed(Vec<IndexAccess>),
    FullScan,
}

/// Plan of one OR branch.
#[derive(Clone, Debug)]
pub struct BranchPlan {
    branch: Branch,
    access: BranchAccess,
    residual: Vec<usize>,
}

impl BranchPlan {
    pub(crate) fn new(branch: Branch, access: BranchAccess, residual: Vec<usize>) -> Self {
        BranchPlan {
            branch,
            access,
            residual,
        }
    }

    pub fn branch(&self) -> &Branch {
        &self.branch
    }

    pub fn access(&self) -> &BranchAccess {
        &self.access
    }

    /// Consulted indexes; empty for a full scan.
    pub fn accesses(&self) -> &[IndexAccess] {
        match &self.access {
            BranchAccess::Indexed(accesses) => accesses,
            BranchAccess::FullScan => &[],
        }
    }

    pub fn is_full_scan(&self) -> bool {
        matches!(self.access, BranchAccess::FullScan)
    }

    /// Predicates no index serves.
    pub fn residual(&self) -> Vec<&Predicate> {
        self.residual
            .iter()
            .filter_map(|&position| self.branch.predicates().get(position))
            .collect()
    }
}

/// Whether any branch of a plan reads an index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanOutcome {
    Indexed,
    /// No branch can use an index; the caller has to scan.
    NoUsableIndex,
}

/// Execution plan of a query over a class and its subclasses.
#[derive(Clone, Debug)]
pub struct QueryPlan {
    class_name: String,
    classes: Vec<String>,
    branches: Vec<BranchPlan>,
    order_by: Vec<OrderBy>,
    ordered_by_index: bool,
}

impl QueryPlan {
    pub(crate) fn new(class_name: &str, classes: Vec<String>, branches: Vec<BranchPlan>) -> Self {
        QueryPlan {
            class_name: class_name.to_string(),
            classes,
            branches,
            order_by: Vec::new(),
            ordered_by_index: false,
        }
    }

    pub(crate) fn with_order(mut self, order_by: Vec<OrderBy>, ordered_by_index: bool) -> Self {
        self.order_by = order_by;
        self.ordered_by_index = ordered_by_index;
        self
    }

    pub fn order_by(&self) -> &[OrderBy] {
        &self.order_by
    }

    /// Whether the single index read already yields the requested order,
    /// so no sort is needed.
    pub fn is_ordered_by_index(&self) -> bool {
        self.ordered_by_index
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The queried class and every subclass.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn includes_class(&self, class_name: &str) -> bool {
        self.classes.iter().any(|c| c.eq_ignore_ascii_case(class_name))
    }

    pub fn branches(&self) -> &[BranchPlan] {
        &self.branches
    }

    pub fn outcome(&self) -> PlanOutcome {
        if self.branches.iter().any(|b| !b.is_full_scan()) {
            PlanOutcome::Indexed
        } else {
            PlanOutcome::NoUsableIndex
        }
    }

    /// Names of every consulted index, each branch's winner before the
    /// indexes intersected with it.
    pub fn used_indexes(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for access in self.branches.iter().flat_map(|b| b.accesses()) {
            if !names.iter().any(|n| n == access.index_name()) {
                names.push(access.index_name().to_string());
            }
        }
        names
    }
}

impl Display for QueryPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "query {}", self.class_name)?;
        if self.branches.is_empty() {
            return write!(f, "\n  no branch can match");
        }
        for (i, plan) in self.branches.iter().enumerate() {
            write!(f, "\n  branch {}: {}", i, plan.branch)?;
            match &plan.access {
                BranchAccess::FullScan => write!(f, "\n    full scan")?,
                BranchAccess::Indexed(accesses) => {
                    for access in accesses {
                        write!(f, "\n    {}", access)?;
                    }
                }
            }
            let residual = plan.residual();
            if !residual.is_empty() {
                let rendered: Vec<String> = residual.iter().map(|p| p.to_string()).collect();
                write!(f, "\n    residual {}", rendered.join(" AND "))?;
            }
        }
        if !self.order_by.is_empty() {
            let terms: Vec<String> = self.order_by.iter().map(|t| t.to_string()).collect();
            let source = if self.ordered_by_index { "index order" } else { "sort" };
            write!(f, "\n  order by {} ({})", terms.join(", "), source)?;
        }
        Ok(())
    }
}
