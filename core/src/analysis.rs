//! The fixed reporting questions answered from the cube.
//!
//! Each function takes whatever window the caller has already applied
//! (usually `Cube::trailing_months(12)`) and returns rows ready to chart.

use crate::{
    cube::Cube,
    error::{CubeError, CubeResult},
    query::Slice,
    types::{CubeRow, Dimension, Grain},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The best-selling category in each region.
pub fn top_category_by_region(cube: &Cube) -> CubeResult<Vec<CubeRow>> {
    cube.top_n(Dimension::Region, Dimension::Category, 1)
}

/// Sales per category per region.
pub fn sales_by_category_and_region(cube: &Cube) -> CubeResult<Cube> {
    cube.rollup(&Grain::of(&[Dimension::Region, Dimension::Category]))
}

/// Contribution of one payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentShare {
    pub payment_type:      String,
    pub total_sales:       Decimal,
    pub transaction_count: u64,
    /// Percent of all sales in the input, computed from the sums.
    pub share_of_sales:    Decimal,
}

pub fn payment_method_mix(cube: &Cube) -> CubeResult<Vec<PaymentShare>> {
    let by_payment = cube.rollup(&Grain::of(&[Dimension::PaymentType]))?;
    let grand_total = by_payment.totals()?.total_sales;

    by_payment
        .iter()
        .map(|row| {
            let share_of_sales = if grand_total.is_zero() {
                Decimal::ZERO
            } else {
                row.measures
                    .total_sales
                    .checked_div(grand_total)
                    .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                    .ok_or_else(|| CubeError::MeasureOverflow { key: "payment share".into() })?
                    .round_dp(2)
            };
            Ok(PaymentShare {
                payment_type:      row.coords.payment_type.clone().unwrap_or_default(),
                total_sales:       row.measures.total_sales,
                transaction_count: row.measures.transaction_count,
                share_of_sales,
            })
        })
        .collect()
}

/// Top of the year → month drilldown.
pub fn sales_by_year(cube: &Cube) -> CubeResult<Cube> {
    cube.rollup(&Grain::of(&[Dimension::Year]))
}

/// Monthly totals, optionally drilled into a single year.
pub fn sales_by_month(cube: &Cube, year: Option<i32>) -> CubeResult<Cube> {
    let selection = match year {
        Some(y) => Slice::new().with(Dimension::Year, y),
        None => Slice::new(),
    };
    cube.drilldown(&selection, &Grain::of(&[Dimension::Year, Dimension::Month]))
}
