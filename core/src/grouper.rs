//! Group-by strategies.
//!
//! RULE: The builder and roll-up never group by hand. They hand
//! `(Coords, Measures)` pairs to a `Grouper` and get back rows sorted by
//! coordinates, one per distinct key.

use crate::{
    config::GrouperKind,
    error::{CubeError, CubeResult},
    types::{Coords, CubeRow, Measures},
};
use std::collections::hash_map::{Entry, HashMap};

/// The contract every grouping strategy must fulfill.
pub trait Grouper: Send + Sync {
    /// Unique stable name for this strategy.
    fn name(&self) -> &'static str;

    /// Sum the measures of equal keys. Output is sorted by `Coords` and holds
    /// exactly one row per distinct key. A sum that does not fit fails the
    /// whole grouping.
    fn group(&self, entries: Vec<(Coords, Measures)>) -> CubeResult<Vec<CubeRow>>;
}

fn overflow(key: &Coords) -> CubeError {
    CubeError::MeasureOverflow { key: format!("{key:?}") }
}

pub fn grouper_for(kind: GrouperKind) -> Box<dyn Grouper> {
    match kind {
        GrouperKind::Hash => Box::new(HashGrouper),
        GrouperKind::Sort => Box::new(SortGrouper),
    }
}

/// One pass into a hash map, then a sort of the distinct keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashGrouper;

impl Grouper for HashGrouper {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn group(&self, entries: Vec<(Coords, Measures)>) -> CubeResult<Vec<CubeRow>> {
        let mut groups: HashMap<Coords, Measures> = HashMap::new();
        for (coords, measures) in entries {
            match groups.entry(coords) {
                Entry::Occupied(mut slot) => {
                    let sum = slot.get().checked_add(measures).ok_or_else(|| overflow(slot.key()))?;
                    *slot.get_mut() = sum;
                }
                Entry::Vacant(slot) => {
                    slot.insert(measures);
                }
            }
        }
        let mut rows: Vec<CubeRow> = groups
            .into_iter()
            .map(|(coords, measures)| CubeRow { coords, measures })
            .collect();
        rows.sort_by(|a, b| a.coords.cmp(&b.coords));
        Ok(rows)
    }
}

/// Sort the input by key and fold adjacent runs. Memory use is dominated by
/// the sort, so this is the shape to move onto an external merge sort once
/// facts no longer fit in memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortGrouper;

impl Grouper for SortGrouper {
    fn name(&self) -> &'static str {
        "sort"
    }

    fn group(&self, mut entries: Vec<(Coords, Measures)>) -> CubeResult<Vec<CubeRow>> {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let mut rows: Vec<CubeRow> = Vec::new();
        for (coords, measures) in entries {
            match rows.last_mut() {
                Some(last) if last.coords == coords => {
                    last.measures = last.measures.checked_add(measures).ok_or_else(|| overflow(&coords))?;
                }
                _ => rows.push(CubeRow { coords, measures }),
            }
        }
        Ok(rows)
    }
}
