use super::{Customer, Product, SaleRecord, Warehouse};
use crate::error::CubeResult;

impl Warehouse {
    // ── Dimension tables ──────────────────────────────────────────

    /// Customers with a usable region. A NULL region cannot join.
    pub fn customers(&self) -> CubeResult<Vec<Customer>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, region FROM customers
             WHERE region IS NOT NULL
             ORDER BY customer_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Customer {
                customer_id: row.get(0)?,
                region:      row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Products with a usable category.
    pub fn products(&self) -> CubeResult<Vec<Product>> {
        let mut stmt = self.conn.prepare(
            "SELECT product_id, category FROM products
             WHERE category IS NOT NULL
             ORDER BY product_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Product {
                product_id: row.get(0)?,
                category:   row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Facts ─────────────────────────────────────────────────────

    pub fn sales(&self) -> CubeResult<Vec<SaleRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT transaction_id,
                    CAST(sale_date AS TEXT),
                    customer_id,
                    product_id,
                    CAST(sale_amount AS TEXT),
                    payment_type
             FROM sales
             ORDER BY transaction_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SaleRecord {
                transaction_id: row.get(0)?,
                sale_date:      row.get(1)?,
                customer_id:    row.get(2)?,
                product_id:     row.get(3)?,
                sale_amount:    row.get(4)?,
                payment_type:   row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
