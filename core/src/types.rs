//! Shared primitive types used across the cube engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Surrogate key of a customer row in the warehouse.
pub type CustomerId = i64;

/// Surrogate key of a product row in the warehouse.
pub type ProductId = i64;

/// Surrogate key of a sales row in the warehouse.
pub type TransactionId = i64;

// ── Dimensions ─────────────────────────────────────────────────

/// The fixed set of cube dimensions. Declaration order is the sort order
/// of cube rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Year,
    Month,
    Region,
    Category,
    PaymentType,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Year,
        Dimension::Month,
        Dimension::Region,
        Dimension::Category,
        Dimension::PaymentType,
    ];

    /// Column name used in the persisted cube.
    pub fn column(&self) -> &'static str {
        match self {
            Dimension::Year        => "year",
            Dimension::Month       => "month",
            Dimension::Region      => "region",
            Dimension::Category    => "category",
            Dimension::PaymentType => "payment_type",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "year"                      => Ok(Dimension::Year),
            "month"                     => Ok(Dimension::Month),
            "region"                    => Ok(Dimension::Region),
            "category" | "product_category" => Ok(Dimension::Category),
            "payment_type" | "payment"  => Ok(Dimension::PaymentType),
            other => Err(format!("unknown dimension '{other}'")),
        }
    }
}

/// The set of dimensions a cube (or query result) is aggregated over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grain(BTreeSet<Dimension>);

impl Grain {
    /// All five dimensions: the grain the cube is stored at.
    pub fn finest() -> Self {
        Self(Dimension::ALL.into_iter().collect())
    }

    pub fn of(dims: &[Dimension]) -> Self {
        Self(dims.iter().copied().collect())
    }

    pub fn contains(&self, dim: Dimension) -> bool {
        self.0.contains(&dim)
    }

    pub fn is_subset_of(&self, other: &Grain) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn without(&self, dim: Dimension) -> Self {
        let mut dims = self.0.clone();
        dims.remove(&dim);
        Self(dims)
    }

    pub fn dimensions(&self) -> impl Iterator<Item = Dimension> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Grain {
    fn default() -> Self {
        Self::finest()
    }
}

impl fmt::Display for Grain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(Dimension::column).collect();
        write!(f, "({})", names.join(", "))
    }
}

/// A single dimension value used in slice and dice filters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Member {
    Int(i64),
    Text(String),
}

impl From<i32> for Member {
    fn from(v: i32) -> Self { Member::Int(v.into()) }
}

impl From<u32> for Member {
    fn from(v: u32) -> Self { Member::Int(v.into()) }
}

impl From<i64> for Member {
    fn from(v: i64) -> Self { Member::Int(v) }
}

impl From<&str> for Member {
    fn from(v: &str) -> Self { Member::Text(v.to_string()) }
}

impl From<String> for Member {
    fn from(v: String) -> Self { Member::Text(v) }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Int(v)  => write!(f, "{v}"),
            Member::Text(v) => f.write_str(v),
        }
    }
}

// ── Coordinates ────────────────────────────────────────────────

/// Position of a cube row in dimension space. A dimension outside the
/// cube's grain is `None`. Field order defines row order, so years and
/// months sort numerically.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coords {
    pub year:         Option<i32>,
    pub month:        Option<u32>,
    pub region:       Option<String>,
    pub category:     Option<String>,
    pub payment_type: Option<String>,
}

impl Coords {
    /// Keep only the dimensions in `grain`.
    pub fn project(&self, grain: &Grain) -> Coords {
        Coords {
            year:         self.year.filter(|_| grain.contains(Dimension::Year)),
            month:        self.month.filter(|_| grain.contains(Dimension::Month)),
            region:       self.region.clone().filter(|_| grain.contains(Dimension::Region)),
            category:     self.category.clone().filter(|_| grain.contains(Dimension::Category)),
            payment_type: self.payment_type.clone().filter(|_| grain.contains(Dimension::PaymentType)),
        }
    }

    pub fn member(&self, dim: Dimension) -> Option<Member> {
        match dim {
            Dimension::Year        => self.year.map(Member::from),
            Dimension::Month       => self.month.map(Member::from),
            Dimension::Region      => self.region.clone().map(Member::Text),
            Dimension::Category    => self.category.clone().map(Member::Text),
            Dimension::PaymentType => self.payment_type.clone().map(Member::Text),
        }
    }

    /// True when this row's value for `dim` equals `value`. Rows that do not
    /// carry `dim` never match.
    pub fn matches(&self, dim: Dimension, value: &Member) -> bool {
        match (dim, value) {
            (Dimension::Year, Member::Int(v))         => self.year.map(i64::from) == Some(*v),
            (Dimension::Month, Member::Int(v))        => self.month.map(i64::from) == Some(*v),
            (Dimension::Region, Member::Text(v))      => self.region.as_deref() == Some(v.as_str()),
            (Dimension::Category, Member::Text(v))    => self.category.as_deref() == Some(v.as_str()),
            (Dimension::PaymentType, Member::Text(v)) => self.payment_type.as_deref() == Some(v.as_str()),
            _ => false,
        }
    }
}

// ── Measures ───────────────────────────────────────────────────

/// The additive measures carried by every cube row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measures {
    pub total_sales:       Decimal,
    pub transaction_count: u64,
}

impl Measures {
    /// Measures contributed by one fact row.
    pub fn single(sale_amount: Decimal) -> Self {
        Self { total_sales: sale_amount, transaction_count: 1 }
    }

    /// Average sale amount, recomputed from the additive sums. Never roll
    /// this value up directly.
    pub fn average_sale(&self) -> Option<Decimal> {
        if self.transaction_count == 0 {
            return None;
        }
        Some(self.total_sales / Decimal::from(self.transaction_count))
    }

    /// Sum both measures. `None` when either total would overflow.
    pub fn checked_add(&self, rhs: Measures) -> Option<Measures> {
        Some(Self {
            total_sales:       self.total_sales.checked_add(rhs.total_sales)?,
            transaction_count: self.transaction_count.checked_add(rhs.transaction_count)?,
        })
    }
}

/// One row of the cube: a coordinate plus its aggregated measures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CubeRow {
    #[serde(flatten)]
    pub coords:   Coords,
    #[serde(flatten)]
    pub measures: Measures,
}
