use std::collections::BTreeSet;
use std::fmt;

use crate::document::{FieldPath, Value};
use crate::index::IndexEngine;
use crate::query::predicate::Predicate;
use crate::types::Key;

/// How a predicate's candidate keys are found.
///
/// Only the candidate set comes from the plan. Every candidate is still
/// tested against the full predicate, so a plan can narrow the work but
/// never change the result.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Test every document.
    FullScan,
    /// Union of the index buckets for `values` at `path`.
    IndexLookup {
        path: FieldPath,
        values: Vec<Value>,
        estimate: usize,
    },
    /// Intersection of index-backed children, smallest estimate first.
    Intersect(Vec<Plan>),
    /// Union of index-backed children.
    Union(Vec<Plan>),
}

impl Plan {
    /// Upper bound on the number of candidate keys.
    pub fn estimate(&self) -> Option<usize> {
        match self {
            Plan::FullScan => None,
            Plan::IndexLookup { estimate, .. } => Some(*estimate),
            Plan::Intersect(children) => children.iter().filter_map(Plan::estimate).min(),
            Plan::Union(children) => children.iter().map(Plan::estimate).sum(),
        }
    }

    pub fn uses_index(&self) -> bool {
        !matches!(self, Plan::FullScan)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plan::FullScan => write!(f, "FullScan"),
            Plan::IndexLookup { path, values, estimate } => {
                write!(f, "IndexLookup({path}, {} values, ~{estimate})", values.len())
            }
            Plan::Intersect(children) | Plan::Union(children) => {
                let op = if matches!(self, Plan::Intersect(_)) { "Intersect" } else { "Union" };
                write!(f, "{op}[")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Choose a plan for `predicate` given the indexes in `engine`.
///
/// - `Eq`/`In` on an indexed path become index lookups.
/// - `And` intersects whichever children are index-backed, cheapest first;
///   the other children are left to the final filter.
/// - `Or` unions its children only if every one of them is index-backed.
/// - Everything else scans.
pub fn plan(predicate: &Predicate, engine: &IndexEngine) -> Plan {
    match predicate {
        Predicate::Eq(path, value) => lookup(engine, path, std::slice::from_ref(value)),
        Predicate::In(path, values) => lookup(engine, path, values),
        Predicate::And(children) => {
            let mut indexed: Vec<Plan> = children
                .iter()
                .map(|child| plan(child, engine))
                .filter(Plan::uses_index)
                .collect();
            indexed.sort_by_key(|p| p.estimate().unwrap_or(usize::MAX));
            match indexed.len() {
                0 => Plan::FullScan,
                1 => indexed.remove(0),
                _ => Plan::Intersect(indexed),
            }
        }
        Predicate::Or(children) if !children.is_empty() => {
            let plans: Vec<Plan> = children.iter().map(|child| plan(child, engine)).collect();
            if plans.iter().all(Plan::uses_index) {
                Plan::Union(plans)
            } else {
                Plan::FullScan
            }
        }
        _ => Plan::FullScan,
    }
}

fn lookup(engine: &IndexEngine, path: &FieldPath, values: &[Value]) -> Plan {
    let Some(index) = engine.index(path) else {
        return Plan::FullScan;
    };
    Plan::IndexLookup {
        path: path.clone(),
        values: values.to_vec(),
        estimate: values.iter().map(|v| index.estimate(v)).sum(),
    }
}

/// Candidate keys for an index-backed plan; `None` for a full scan.
pub fn candidates(plan: &Plan, engine: &IndexEngine) -> Option<BTreeSet<Key>> {
    match plan {
        Plan::FullScan => None,
        Plan::IndexLookup { path, values, .. } => {
            let mut keys = BTreeSet::new();
            for value in values {
                keys.extend(engine.lookup(path, value)?);
            }
            Some(keys)
        }
        Plan::Intersect(children) => {
            let mut iter = children.iter();
            let mut keys = candidates(iter.next()?, engine)?;
            for child in iter {
                if keys.is_empty() {
                    break;
                }
                let other = candidates(child, engine)?;
                keys.retain(|k| other.contains(k));
            }
            Some(keys)
        }
        Plan::Union(children) => {
            let mut keys = BTreeSet::new();
            for child in children {
                keys.extend(candidates(child, engine)?);
            }
            Some(keys)
        }
    }
}
