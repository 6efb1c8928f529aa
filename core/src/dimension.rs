//! Dimension deriver: resolves each sale's foreign keys into region and
//! category, and its date into a calendar period.
//!
//! Every function here is pure. A sale that cannot be resolved becomes a
//! `Rejection`; nothing is defaulted or coerced.

use crate::{
    types::{Coords, CustomerId, ProductId, TransactionId},
    warehouse::{Customer, Product, SaleRecord},
};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ── Calendar ─────────────────────────────────────────────────────────────────

/// A calendar month. Orders numerically by year, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year:  i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    /// Months since year 0, for arithmetic across year boundaries.
    pub fn ordinal(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    pub fn from_ordinal(ordinal: i64) -> Self {
        Self {
            year:  ordinal.div_euclid(12) as i32,
            month: ordinal.rem_euclid(12) as u32 + 1,
        }
    }

    /// Move `months` forward (or backward when negative).
    pub fn shift(&self, months: i64) -> Self {
        Self::from_ordinal(self.ordinal() + months)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a warehouse `sale_date`. Accepts ISO dates, the timestamp form the
/// loader writes, and the raw `MM/DD/YYYY` form.
pub fn parse_sale_date(raw: &str) -> Result<NaiveDate, RejectReason> {
    let s = raw.trim();
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    Err(RejectReason::MalformedDate(raw.to_string()))
}

/// `(year, month)` of a sale date string.
pub fn derive_period(raw: &str) -> Result<Period, RejectReason> {
    parse_sale_date(raw).map(Period::from_date)
}

fn parse_amount(raw: &str) -> Result<Decimal, RejectReason> {
    let s = raw.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|_| RejectReason::MalformedAmount(raw.to_string()))
}

// ── Rejections ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum RejectReason {
    UnknownCustomer(Option<CustomerId>),
    UnknownProduct(Option<ProductId>),
    MalformedDate(String),
    MissingAmount,
    MalformedAmount(String),
    MissingPaymentType,
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::UnknownCustomer(_)  => "unknown_customer",
            RejectReason::UnknownProduct(_)   => "unknown_product",
            RejectReason::MalformedDate(_)    => "malformed_date",
            RejectReason::MissingAmount       => "missing_amount",
            RejectReason::MalformedAmount(_)  => "malformed_amount",
            RejectReason::MissingPaymentType  => "missing_payment_type",
        }
    }

    pub fn detail(&self) -> Option<String> {
        match self {
            RejectReason::UnknownCustomer(id) | RejectReason::UnknownProduct(id) => {
                Some(id.map_or_else(|| "NULL".to_string(), |v| v.to_string()))
            }
            RejectReason::MalformedDate(raw) | RejectReason::MalformedAmount(raw) => Some(raw.clone()),
            RejectReason::MissingAmount | RejectReason::MissingPaymentType => None,
        }
    }
}

/// A sale excluded from the cube, kept for the build report and quarantine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub transaction_id: TransactionId,
    #[serde(flatten)]
    pub reason: RejectReason,
}

// ── Facts ────────────────────────────────────────────────────────────────────

/// A sale after joining and derivation: every field is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactRow {
    pub transaction_id: TransactionId,
    pub period:         Period,
    pub region:         String,
    pub category:       String,
    pub payment_type:   String,
    pub sale_amount:    Decimal,
}

impl FactRow {
    /// Coordinates at the finest grain.
    pub fn coords(&self) -> Coords {
        Coords {
            year:         Some(self.period.year),
            month:        Some(self.period.month),
            region:       Some(self.region.clone()),
            category:     Some(self.category.clone()),
            payment_type: Some(self.payment_type.clone()),
        }
    }
}

/// Lookup tables for the customer and product dimensions.
#[derive(Debug, Clone, Default)]
pub struct DimensionIndex {
    regions:    HashMap<CustomerId, String>,
    categories: HashMap<ProductId, String>,
}

impl DimensionIndex {
    pub fn new(customers: &[Customer], products: &[Product]) -> Self {
        Self {
            regions: customers
                .iter()
                .map(|c| (c.customer_id, c.region.clone()))
                .collect(),
            categories: products
                .iter()
                .map(|p| (p.product_id, p.category.clone()))
                .collect(),
        }
    }

    pub fn region(&self, customer_id: CustomerId) -> Option<&str> {
        self.regions.get(&customer_id).map(String::as_str)
    }

    pub fn category(&self, product_id: ProductId) -> Option<&str> {
        self.categories.get(&product_id).map(String::as_str)
    }

    /// Join then derive. Checked in order: customer, product, date,
    /// amount, payment type. The first failure wins.
    pub fn derive(&self, sale: &SaleRecord) -> Result<FactRow, Rejection> {
        let reject = |reason| Rejection { transaction_id: sale.transaction_id, reason };

        let region = sale
            .customer_id
            .and_then(|id| self.region(id))
            .ok_or_else(|| reject(RejectReason::UnknownCustomer(sale.customer_id)))?;
        let category = sale
            .product_id
            .and_then(|id| self.category(id))
            .ok_or_else(|| reject(RejectReason::UnknownProduct(sale.product_id)))?;

        let period = match sale.sale_date.as_deref() {
            Some(raw) => derive_period(raw).map_err(reject)?,
            None => return Err(reject(RejectReason::MalformedDate("NULL".into()))),
        };

        let sale_amount = match sale.sale_amount.as_deref() {
            Some(raw) => parse_amount(raw).map_err(reject)?,
            None => return Err(reject(RejectReason::MissingAmount)),
        };

        let payment_type = match sale.payment_type.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => return Err(reject(RejectReason::MissingPaymentType)),
        };

        Ok(FactRow {
            transaction_id: sale.transaction_id,
            period,
            region: region.to_string(),
            category: category.to_string(),
            payment_type,
            sale_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_supported_date_form() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        for raw in ["2024-03-09", "2024-03-09 00:00:00", "2024-03-09T13:45:00", "03/09/2024"] {
            assert_eq!(parse_sale_date(raw).unwrap(), expected, "form {raw}");
        }
    }

    #[test]
    fn unparsable_date_is_rejected_not_defaulted() {
        assert_eq!(
            parse_sale_date("2024-13-01"),
            Err(RejectReason::MalformedDate("2024-13-01".into()))
        );
        assert!(parse_sale_date("yesterday").is_err());
    }

    #[test]
    fn periods_order_numerically_across_year_boundaries() {
        let mut periods = vec![
            Period::new(2024, 10).unwrap(),
            Period::new(2025, 1).unwrap(),
            Period::new(2024, 2).unwrap(),
        ];
        periods.sort();
        let labels: Vec<String> = periods.iter().map(Period::to_string).collect();
        assert_eq!(labels, ["2024-02", "2024-10", "2025-01"]);
    }

    #[test]
    fn shift_wraps_years() {
        let jan = Period::new(2025, 1).unwrap();
        assert_eq!(jan.shift(-1), Period::new(2024, 12).unwrap());
        assert_eq!(jan.shift(-11), Period::new(2024, 2).unwrap());
        assert_eq!(jan.shift(12), Period::new(2026, 1).unwrap());
    }

    #[test]
    fn amount_accepts_scientific_text() {
        assert_eq!(parse_amount("1.5e2").unwrap(), Decimal::from(150));
        assert!(parse_amount("twelve").is_err());
    }
}
