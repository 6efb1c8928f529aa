use super::{Warehouse, CUBE_SCHEMA};
use crate::{
    cube::Cube,
    dimension::Rejection,
    error::{CubeError, CubeResult},
    types::{Coords, CubeRow, Measures},
};
use rusqlite::params;
use rust_decimal::Decimal;
use std::str::FromStr;

impl Warehouse {
    // ── Cube write-back ───────────────────────────────────────────

    /// Replace `sales_cube` and `sales_cube_rejects`, creating them first if
    /// the warehouse has never held a cube. Everything runs in one
    /// transaction, so readers see either the old outputs or the new ones.
    pub fn replace_cube_tables(&self, cube: &Cube, rejects: &[Rejection]) -> CubeResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(CUBE_SCHEMA)?;

        tx.execute("DELETE FROM sales_cube", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sales_cube (
                    year, month, region, category, payment_type, total_sales, transaction_count
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for row in cube.rows() {
                let c = &row.coords;
                stmt.execute(params![
                    c.year,
                    c.month,
                    &c.region,
                    &c.category,
                    &c.payment_type,
                    row.measures.total_sales.to_string(),
                    row.measures.transaction_count as i64,
                ])?;
            }
        }

        tx.execute("DELETE FROM sales_cube_rejects", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sales_cube_rejects (transaction_id, reason, detail)
                 VALUES (?1, ?2, ?3)",
            )?;
            for r in rejects {
                stmt.execute(params![r.transaction_id, r.reason.code(), r.reason.detail()])?;
            }
        }

        tx.commit()?;
        log::info!(
            "sales_cube tables replaced: {} rows, {} rejects",
            cube.len(),
            rejects.len()
        );
        Ok(())
    }

    /// Read the materialized cube back from `sales_cube`.
    pub fn load_cube_table(&self) -> CubeResult<Cube> {
        let mut stmt = self.conn.prepare(
            "SELECT year, month, region, category, payment_type,
                    CAST(total_sales AS TEXT), transaction_count
             FROM sales_cube",
        )?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    Coords {
                        year:         row.get(0)?,
                        month:        row.get(1)?,
                        region:       row.get(2)?,
                        category:     row.get(3)?,
                        payment_type: row.get(4)?,
                    },
                    row.get::<_, String>(5)?,
                    row.get::<_, i64>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::with_capacity(raw.len());
        for (i, (coords, sales, count)) in raw.into_iter().enumerate() {
            let total_sales = Decimal::from_str(&sales).map_err(|e| CubeError::CorruptCube {
                line: i as u64 + 1,
                reason: format!("total_sales '{sales}': {e}"),
            })?;
            rows.push(CubeRow {
                coords,
                measures: Measures {
                    total_sales,
                    transaction_count: count.max(0) as u64,
                },
            });
        }
        Ok(Cube::from_rows(rows))
    }

    pub fn cube_table_count(&self) -> CubeResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM sales_cube", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn rejects_table_count(&self) -> CubeResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM sales_cube_rejects", [], |row| row.get(0))?;
        Ok(count)
    }
}
