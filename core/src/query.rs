//! Cube query engine: slice, dice, roll-up, drilldown and top-N.
//!
//! RULE: Queries read only the materialized cube, never the warehouse.
//! Every operation returns a new value; the source cube is untouched.

use crate::{
    cube::Cube,
    dimension::Period,
    error::{CubeError, CubeResult},
    grouper::{Grouper, HashGrouper},
    types::{Coords, CubeRow, Dimension, Grain, Measures, Member},
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Fixed value per dimension. Dimensions not named are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slice(BTreeMap<Dimension, Member>);

impl Slice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, dim: Dimension, value: impl Into<Member>) -> Self {
        self.0.insert(dim, value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn dimensions(&self) -> impl Iterator<Item = Dimension> + '_ {
        self.0.keys().copied()
    }

    pub fn matches(&self, coords: &Coords) -> bool {
        self.0.iter().all(|(dim, value)| coords.matches(*dim, value))
    }
}

/// Allowed values per dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dice(BTreeMap<Dimension, BTreeSet<Member>>);

impl Dice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<I, M>(mut self, dim: Dimension, values: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Member>,
    {
        self.0
            .entry(dim)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, coords: &Coords) -> bool {
        self.0
            .iter()
            .all(|(dim, allowed)| allowed.iter().any(|v| coords.matches(*dim, v)))
    }
}

impl From<&Slice> for Dice {
    fn from(slice: &Slice) -> Self {
        Dice(
            slice
                .0
                .iter()
                .map(|(dim, v)| (*dim, BTreeSet::from([v.clone()])))
                .collect(),
        )
    }
}

impl Cube {
    fn filtered(&self, keep: impl Fn(&CubeRow) -> bool) -> Cube {
        let rows = self.iter().filter(|r| keep(*r)).cloned().collect();
        Cube::new(self.grain().clone(), rows)
    }

    fn require(&self, dim: Dimension) -> CubeResult<()> {
        if self.grain().contains(dim) {
            Ok(())
        } else {
            Err(CubeError::MissingDimension(dim))
        }
    }

    /// Rows matching every fixed dimension exactly. An empty slice returns
    /// the cube unchanged.
    pub fn slice(&self, slice: &Slice) -> Cube {
        if slice.is_empty() {
            return self.clone();
        }
        self.filtered(|r| slice.matches(&r.coords))
    }

    /// Rows whose value is in the allowed set for every constrained dimension.
    pub fn dice(&self, dice: &Dice) -> Cube {
        if dice.is_empty() {
            return self.clone();
        }
        self.filtered(|r| dice.matches(&r.coords))
    }

    /// Re-aggregate at a coarser grain by re-summing the additive measures.
    pub fn rollup(&self, to: &Grain) -> CubeResult<Cube> {
        self.rollup_with(to, &HashGrouper)
    }

    pub fn rollup_with(&self, to: &Grain, grouper: &dyn Grouper) -> CubeResult<Cube> {
        if !to.is_subset_of(self.grain()) {
            return Err(CubeError::InvalidGrain {
                from: self.grain().to_string(),
                to:   to.to_string(),
            });
        }
        if to == self.grain() {
            return Ok(self.clone());
        }
        let entries: Vec<(Coords, Measures)> = self
            .iter()
            .map(|r| (r.coords.project(to), r.measures))
            .collect();
        Ok(Cube::new(to.clone(), grouper.group(entries)?))
    }

    /// Fix a coarse selection, then present it at a finer grain; e.g. select
    /// `year = 2024` and show `{year, month}`. Only slicing and projection are
    /// involved since the cube is already stored finer than any request.
    pub fn drilldown(&self, selection: &Slice, to: &Grain) -> CubeResult<Cube> {
        for dim in selection.dimensions() {
            self.require(dim)?;
        }
        self.slice(selection).rollup(to)
    }

    /// The best `n` values of `ranked` inside each value of `partition`.
    ///
    /// Rows are rolled up to `{partition, ranked}` first. Ranking is by
    /// `total_sales` desc, then `transaction_count` desc, then the ranked
    /// value asc. Output is ordered by partition, then rank.
    pub fn top_n(&self, partition: Dimension, ranked: Dimension, n: usize) -> CubeResult<Vec<CubeRow>> {
        self.require(partition)?;
        self.require(ranked)?;
        let rolled = self.rollup(&Grain::of(&[partition, ranked]))?;

        let mut partitions: BTreeMap<Option<Member>, Vec<CubeRow>> = BTreeMap::new();
        for row in rolled.iter() {
            partitions
                .entry(row.coords.member(partition))
                .or_default()
                .push(row.clone());
        }

        let mut out = Vec::new();
        for (_, mut rows) in partitions {
            rows.sort_by(|a, b| rank_order(a, b, ranked));
            out.extend(rows.into_iter().take(n));
        }
        Ok(out)
    }

    /// Rows in the last `months` months ending at the cube's latest period,
    /// across year boundaries. Needs year and month in the grain.
    pub fn trailing_months(&self, months: u32) -> CubeResult<Cube> {
        self.require(Dimension::Year)?;
        self.require(Dimension::Month)?;
        let Some(latest) = self.latest_period() else {
            return Ok(self.clone());
        };
        if months == 0 {
            return Ok(Cube::empty(self.grain().clone()));
        }
        let first = latest.shift(-(i64::from(months) - 1));
        Ok(self.filtered(|r| match (r.coords.year, r.coords.month) {
            (Some(y), Some(m)) => Period { year: y, month: m } >= first,
            _ => false,
        }))
    }
}

fn rank_order(a: &CubeRow, b: &CubeRow, ranked: Dimension) -> Ordering {
    b.measures
        .total_sales
        .cmp(&a.measures.total_sales)
        .then_with(|| b.measures.transaction_count.cmp(&a.measures.transaction_count))
        .then_with(|| a.coords.member(ranked).cmp(&b.coords.member(ranked)))
}
