//! Cube builder — joins the warehouse relations, derives the calendar,
//! and groups the surviving facts into additive measures.
//!
//! STEPS (fixed):
//!   1. Inner-join each sale to its customer and product.
//!   2. Derive (year, month) from the sale date.
//!   3. Project onto the configured grain.
//!   4. Group and sum `sale_amount` / count rows.
//!
//! Sales that fail step 1 or 2, or carry no usable amount or payment type,
//! are excluded and counted. Dropping unjoinable facts is deliberate: the
//! cube only answers for sales with a known region and category, and the
//! rejects list is what accounts for the rest.

use crate::{
    config::CubeConfig,
    dimension::{DimensionIndex, FactRow, Period, RejectReason, Rejection},
    error::{CubeError, CubeResult},
    grouper::{grouper_for, Grouper},
    types::{Coords, CubeRow, Dimension, Grain, Measures},
    warehouse::{Customer, Product, SaleRecord, Warehouse},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ── Cube ─────────────────────────────────────────────────────────────────────

/// A materialized cube. Rows are sorted by coordinates and never change
/// after construction, so clones share storage and any number of threads
/// may query one cube at once.
#[derive(Debug, Clone)]
pub struct Cube {
    grain: Grain,
    rows:  Arc<[CubeRow]>,
}

impl Cube {
    pub fn new(grain: Grain, mut rows: Vec<CubeRow>) -> Self {
        rows.sort_by(|a, b| a.coords.cmp(&b.coords));
        Self { grain, rows: rows.into() }
    }

    pub fn empty(grain: Grain) -> Self {
        Self::new(grain, Vec::new())
    }

    /// Build a cube from persisted rows, inferring the grain from which
    /// dimensions are populated. An empty row set is taken as finest grain.
    pub fn from_rows(rows: Vec<CubeRow>) -> Self {
        if rows.is_empty() {
            return Self::empty(Grain::finest());
        }
        let dims: Vec<Dimension> = Dimension::ALL
            .into_iter()
            .filter(|d| rows.iter().any(|r| r.coords.member(*d).is_some()))
            .collect();
        Self::new(Grain::of(&dims), rows)
    }

    pub fn grain(&self) -> &Grain {
        &self.grain
    }

    pub fn rows(&self) -> &[CubeRow] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &CubeRow> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Grand total over every row.
    pub fn totals(&self) -> CubeResult<Measures> {
        self.rows.iter().try_fold(Measures::default(), |acc, r| {
            acc.checked_add(r.measures)
                .ok_or_else(|| CubeError::MeasureOverflow { key: "grand total".into() })
        })
    }

    /// Latest (year, month) present, if the grain carries both.
    pub fn latest_period(&self) -> Option<Period> {
        self.rows
            .iter()
            .filter_map(|r| Period::new(r.coords.year?, r.coords.month?))
            .max()
    }
}

impl PartialEq for Cube {
    fn eq(&self, other: &Self) -> bool {
        self.grain == other.grain && self.rows == other.rows
    }
}

impl Eq for Cube {}

// ── Build report ─────────────────────────────────────────────────────────────

/// Counts of what happened to every sale read from the warehouse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub facts_read:           u64,
    pub facts_aggregated:     u64,
    pub unknown_customer:     u64,
    pub unknown_product:      u64,
    pub malformed_date:       u64,
    pub missing_amount:       u64,
    pub malformed_amount:     u64,
    pub missing_payment_type: u64,
    /// Aggregated sales with a negative amount (refunds). Counted, not excluded.
    pub negative_amounts:     u64,
}

impl BuildReport {
    fn record(&mut self, reason: &RejectReason) {
        match reason {
            RejectReason::UnknownCustomer(_) => self.unknown_customer += 1,
            RejectReason::UnknownProduct(_)  => self.unknown_product += 1,
            RejectReason::MalformedDate(_)   => self.malformed_date += 1,
            RejectReason::MissingAmount      => self.missing_amount += 1,
            RejectReason::MalformedAmount(_) => self.malformed_amount += 1,
            RejectReason::MissingPaymentType => self.missing_payment_type += 1,
        }
    }

    pub fn join_failures(&self) -> u64 {
        self.unknown_customer + self.unknown_product
    }

    pub fn data_quality_failures(&self) -> u64 {
        self.malformed_date + self.missing_amount + self.malformed_amount + self.missing_payment_type
    }

    pub fn excluded(&self) -> u64 {
        self.join_failures() + self.data_quality_failures()
    }
}

/// Output of one build: the cube, its report, and every excluded sale.
#[derive(Debug, Clone)]
pub struct CubeBuild {
    pub cube:    Cube,
    pub report:  BuildReport,
    pub rejects: Vec<Rejection>,
}

// ── Builder ──────────────────────────────────────────────────────────────────

pub struct CubeBuilder {
    grain:   Grain,
    grouper: Box<dyn Grouper>,
}

impl CubeBuilder {
    pub fn new(config: &CubeConfig) -> Self {
        Self::with_grouper(config.grain(), grouper_for(config.grouper))
    }

    pub fn with_grouper(grain: Grain, grouper: Box<dyn Grouper>) -> Self {
        Self { grain, grouper }
    }

    pub fn grain(&self) -> &Grain {
        &self.grain
    }

    pub fn grouper_name(&self) -> &'static str {
        self.grouper.name()
    }

    /// Read the three relations and build. Database errors and measure
    /// overflow are fatal; bad rows are not.
    pub fn build_from(&self, warehouse: &Warehouse) -> CubeResult<CubeBuild> {
        log::info!("reading warehouse relations");
        let customers = warehouse.customers()?;
        let products = warehouse.products()?;
        let sales = warehouse.sales()?;
        log::info!(
            "read {} customers, {} products, {} sales",
            customers.len(),
            products.len(),
            sales.len()
        );
        self.build_cube(&sales, &customers, &products)
    }

    pub fn build_cube(
        &self,
        sales: &[SaleRecord],
        customers: &[Customer],
        products: &[Product],
    ) -> CubeResult<CubeBuild> {
        let index = DimensionIndex::new(customers, products);
        let mut report = BuildReport { facts_read: sales.len() as u64, ..Default::default() };
        let mut rejects = Vec::new();
        let mut facts = Vec::with_capacity(sales.len());

        for sale in sales {
            match index.derive(sale) {
                Ok(fact) => {
                    if fact.sale_amount < Decimal::ZERO {
                        report.negative_amounts += 1;
                    }
                    facts.push(fact);
                }
                Err(rejection) => {
                    log::debug!(
                        "excluded sale {}: {} {}",
                        rejection.transaction_id,
                        rejection.reason.code(),
                        rejection.reason.detail().unwrap_or_default()
                    );
                    report.record(&rejection.reason);
                    rejects.push(rejection);
                }
            }
        }
        report.facts_aggregated = facts.len() as u64;

        if report.join_failures() > 0 {
            log::warn!(
                "excluded {} sales failing the join ({} unknown customer, {} unknown product)",
                report.join_failures(),
                report.unknown_customer,
                report.unknown_product
            );
        }
        if report.data_quality_failures() > 0 {
            log::warn!(
                "excluded {} sales with bad values ({} date, {} missing amount, {} bad amount, {} payment type)",
                report.data_quality_failures(),
                report.malformed_date,
                report.missing_amount,
                report.malformed_amount,
                report.missing_payment_type
            );
        }

        if report.negative_amounts > 0 {
            log::warn!("aggregated {} sales with a negative amount", report.negative_amounts);
        }

        let cube = self.aggregate(&facts)?;
        log::info!(
            "cube built with {} grouper: {} rows at grain {} from {} facts",
            self.grouper.name(),
            cube.len(),
            self.grain,
            report.facts_aggregated
        );
        Ok(CubeBuild { cube, report, rejects })
    }

    /// Group already-derived facts at the builder's grain.
    pub fn aggregate(&self, facts: &[FactRow]) -> CubeResult<Cube> {
        let entries: Vec<(Coords, Measures)> = facts
            .iter()
            .map(|f| (f.coords().project(&self.grain), Measures::single(f.sale_amount)))
            .collect();
        Ok(Cube::new(self.grain.clone(), self.grouper.group(entries)?))
    }
}
