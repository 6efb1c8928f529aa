//! Cube persistence as CSV.
//!
//! RULE: Nothing is written in place. Each artifact goes to a temporary file
//! in the destination directory and is renamed over the target only after
//! the last record is flushed and synced. Callers that produce several
//! artifacts stage them all first and commit once every step has succeeded.

use crate::{
    cube::Cube,
    dimension::{Period, Rejection},
    error::{CubeError, CubeResult},
    types::{Coords, CubeRow, Measures},
};
use rust_decimal::Decimal;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;

pub const CUBE_HEADER: [&str; 7] = [
    "year",
    "month",
    "region",
    "category",
    "payment_type",
    "total_sales",
    "transaction_count",
];

const REJECTS_HEADER: [&str; 3] = ["transaction_id", "reason", "detail"];

/// A fully written artifact held in a temp file beside its target.
/// Dropping it without `commit` removes the temp file and leaves the
/// target as it was.
#[derive(Debug)]
pub struct StagedFile {
    tmp:    NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the temp file over the target.
    pub fn commit(self) -> CubeResult<()> {
        self.tmp.persist(&self.target)?;
        Ok(())
    }
}

fn stage<F>(path: &Path, write: F) -> CubeResult<StagedFile>
where
    F: FnOnce(&mut csv::Writer<&mut NamedTempFile>) -> CubeResult<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut tmp);
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;
    Ok(StagedFile { tmp, target: path.to_path_buf() })
}

fn opt<T: ToString>(v: &Option<T>) -> String {
    v.as_ref().map(ToString::to_string).unwrap_or_default()
}

pub fn stage_cube_csv(cube: &Cube, path: impl AsRef<Path>) -> CubeResult<StagedFile> {
    stage(path.as_ref(), |w| {
        w.write_record(CUBE_HEADER)?;
        for row in cube.rows() {
            let c = &row.coords;
            w.write_record([
                opt(&c.year),
                opt(&c.month),
                opt(&c.region),
                opt(&c.category),
                opt(&c.payment_type),
                row.measures.total_sales.to_string(),
                row.measures.transaction_count.to_string(),
            ])?;
        }
        Ok(())
    })
}

pub fn stage_rejects_csv(rejects: &[Rejection], path: impl AsRef<Path>) -> CubeResult<StagedFile> {
    stage(path.as_ref(), |w| {
        w.write_record(REJECTS_HEADER)?;
        for r in rejects {
            w.write_record([
                r.transaction_id.to_string(),
                r.reason.code().to_string(),
                r.reason.detail().unwrap_or_default(),
            ])?;
        }
        Ok(())
    })
}

pub fn write_cube_csv(cube: &Cube, path: impl AsRef<Path>) -> CubeResult<()> {
    let path = path.as_ref();
    stage_cube_csv(cube, path)?.commit()?;
    log::info!("saved {} cube rows to {}", cube.len(), path.display());
    Ok(())
}

pub fn write_rejects_csv(rejects: &[Rejection], path: impl AsRef<Path>) -> CubeResult<()> {
    let path = path.as_ref();
    stage_rejects_csv(rejects, path)?.commit()?;
    log::info!("saved {} rejected sales to {}", rejects.len(), path.display());
    Ok(())
}

// ── Reading ──────────────────────────────────────────────────────────────────

/// Column positions found in a cube header.
struct Columns {
    year:              Option<usize>,
    month:             Option<usize>,
    region:            Option<usize>,
    category:          Option<usize>,
    payment_type:      Option<usize>,
    total_sales:       usize,
    transaction_count: usize,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> CubeResult<Self> {
        let find = |names: &[&str]| headers.iter().position(|h| names.contains(&h.trim()));
        let required = |name: &str| {
            find(&[name]).ok_or_else(|| CubeError::CorruptCube {
                line:   1,
                reason: format!("missing column '{name}'"),
            })
        };
        Ok(Self {
            year:              find(&["year"]),
            month:             find(&["month"]),
            region:            find(&["region"]),
            category:          find(&["category", "product_category"]),
            payment_type:      find(&["payment_type"]),
            total_sales:       required("total_sales")?,
            transaction_count: required("transaction_count")?,
        })
    }
}

fn field(record: &csv::StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_field<T: FromStr>(raw: &str, name: &str, line: u64) -> CubeResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| CubeError::CorruptCube {
        line,
        reason: format!("{name} '{raw}': {e}"),
    })
}

/// Parse the `month` column. A `YYYY-MM` value (the older single-column
/// layout) also supplies the year.
fn parse_month(raw: &str, line: u64) -> CubeResult<(Option<i32>, u32)> {
    let (year, month) = match raw.split_once('-') {
        Some((y, m)) => (Some(parse_field::<i32>(y, "month", line)?), parse_field::<u32>(m, "month", line)?),
        None => (None, parse_field::<u32>(raw, "month", line)?),
    };
    if Period::new(year.unwrap_or(0), month).is_none() {
        return Err(CubeError::CorruptCube { line, reason: format!("month '{raw}' out of range") });
    }
    Ok((year, month))
}

/// Load a persisted cube. Any malformed row fails the whole read.
pub fn read_cube_csv(path: impl AsRef<Path>) -> CubeResult<Cube> {
    let path = path.as_ref();
    log::info!("loading sales cube from {}", path.display());
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let cols = Columns::locate(reader.headers()?)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());

        let mut coords = Coords {
            year:         field(&record, cols.year).map(|y| parse_field(y, "year", line)).transpose()?,
            month:        None,
            region:       field(&record, cols.region).map(str::to_string),
            category:     field(&record, cols.category).map(str::to_string),
            payment_type: field(&record, cols.payment_type).map(str::to_string),
        };
        if let Some(raw) = field(&record, cols.month) {
            let (year, month) = parse_month(raw, line)?;
            coords.month = Some(month);
            coords.year = coords.year.or(year);
        }

        let sales = field(&record, Some(cols.total_sales)).unwrap_or("0");
        let total_sales = Decimal::from_str(sales)
            .or_else(|_| Decimal::from_scientific(sales))
            .map_err(|e| CubeError::CorruptCube { line, reason: format!("total_sales '{sales}': {e}") })?;
        let count = field(&record, Some(cols.transaction_count)).unwrap_or("0");
        let transaction_count = parse_field::<u64>(count, "transaction_count", line)?;

        rows.push(CubeRow {
            coords,
            measures: Measures { total_sales, transaction_count },
        });
    }
    Ok(Cube::from_rows(rows))
}
