//! SQLite warehouse access.
//!
//! RULE: Only the warehouse module talks to the database.
//! The builder and query engine work on typed records and never execute SQL.
//! The warehouse is opened read-only unless the run writes the cube tables.

use crate::{
    error::{CubeError, CubeResult},
    types::{CustomerId, ProductId, TransactionId},
};
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod cube;
mod sales;

/// Tables this crate owns. Created on demand, since the loader that fills
/// the warehouse only writes the three source relations.
const CUBE_SCHEMA: &str = include_str!("../../migrations/002_cube.sql");

/// Customer dimension row. Only the columns the cube needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: CustomerId,
    pub region:      String,
}

/// Product dimension row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    pub category:   String,
}

/// A sales row as stored. Nothing is validated yet: the dimension deriver
/// decides whether the row can join and aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub transaction_id: TransactionId,
    pub sale_date:      Option<String>,
    pub customer_id:    Option<CustomerId>,
    pub product_id:     Option<ProductId>,
    /// Decimal text, read through `CAST(sale_amount AS TEXT)`.
    pub sale_amount:    Option<String>,
    pub payment_type:   Option<String>,
}

pub struct Warehouse {
    conn: Connection,
}

impl Warehouse {
    /// Open an existing warehouse for reading. A missing file is an I/O
    /// error rather than a silently created empty database.
    pub fn open(path: impl AsRef<Path>) -> CubeResult<Self> {
        Self::open_with(path.as_ref(), OpenFlags::SQLITE_OPEN_READ_ONLY)
    }

    /// Open an existing warehouse for the cube table write-back.
    pub fn open_writable(path: impl AsRef<Path>) -> CubeResult<Self> {
        Self::open_with(path.as_ref(), OpenFlags::SQLITE_OPEN_READ_WRITE)
    }

    fn open_with(path: &Path, mode: OpenFlags) -> CubeResult<Self> {
        if !path.exists() {
            return Err(CubeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Database file not found at {}", path.display()),
            )));
        }
        let conn = Connection::open_with_flags(path, mode | OpenFlags::SQLITE_OPEN_URI)?;
        Ok(Self { conn })
    }

    /// Open (or create) a warehouse file. Used by loaders and fixtures.
    pub fn create(path: impl AsRef<Path>) -> CubeResult<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> CubeResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Create the source relations, as the loader lays them out.
    pub fn migrate(&self) -> CubeResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_warehouse.sql"))?;
        Ok(())
    }

    // ── Fixture loading ────────────────────────────────────────

    pub fn insert_customer(&self, customer_id: CustomerId, region: Option<&str>) -> CubeResult<()> {
        self.conn.execute(
            "INSERT INTO customers (customer_id, region) VALUES (?1, ?2)",
            params![customer_id, region],
        )?;
        Ok(())
    }

    pub fn insert_product(&self, product_id: ProductId, category: Option<&str>) -> CubeResult<()> {
        self.conn.execute(
            "INSERT INTO products (product_id, category) VALUES (?1, ?2)",
            params![product_id, category],
        )?;
        Ok(())
    }

    pub fn insert_sale(&self, sale: &SaleRecord) -> CubeResult<()> {
        self.conn.execute(
            "INSERT INTO sales (
                transaction_id, sale_date, customer_id, product_id, sale_amount, payment_type
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                sale.transaction_id,
                &sale.sale_date,
                sale.customer_id,
                sale.product_id,
                &sale.sale_amount,
                &sale.payment_type,
            ],
        )?;
        Ok(())
    }
}
