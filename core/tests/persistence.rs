//! Integration tests for cube persistence and the batch pipeline.
//!
//! Tests verify:
//! 1. A cube survives a CSV write and read unchanged
//! 2. The older `YYYY-MM` single-column layout still loads
//! 3. A full run writes the cube, rejects and warehouse tables, creating
//!    the tables in a warehouse that only holds the source relations
//! 4. A failed run leaves no output behind and earlier outputs intact
//! 5. The warehouse is only writable when asked for

use rust_decimal::Decimal;
use salescube_core::{
    config::{CubeConfig, GrouperKind},
    cube::Cube,
    error::CubeError,
    output::{read_cube_csv, write_cube_csv, write_rejects_csv},
    pipeline,
    types::{Coords, CubeRow, Dimension, Grain, Measures},
    warehouse::{SaleRecord, Warehouse},
};
use std::fs;
use std::path::Path;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn row(year: i32, month: u32, region: &str, category: &str, payment: &str, sales: &str, count: u64) -> CubeRow {
    CubeRow {
        coords: Coords {
            year:         Some(year),
            month:        Some(month),
            region:       Some(region.into()),
            category:     Some(category.into()),
            payment_type: Some(payment.into()),
        },
        measures: Measures { total_sales: sales.parse().unwrap(), transaction_count: count },
    }
}

fn sale(id: i64, date: &str, customer: i64, product: i64, amount: &str, payment: &str) -> SaleRecord {
    SaleRecord {
        transaction_id: id,
        sale_date:      Some(date.into()),
        customer_id:    Some(customer),
        product_id:     Some(product),
        sale_amount:    Some(amount.into()),
        payment_type:   Some(payment.into()),
    }
}

fn seed_warehouse(path: &Path) {
    let wh = Warehouse::create(path).unwrap();
    wh.migrate().unwrap();
    wh.insert_customer(1, Some("East")).unwrap();
    wh.insert_customer(2, Some("West")).unwrap();
    wh.insert_product(10, Some("Electronics")).unwrap();
    wh.insert_product(11, Some("Clothing")).unwrap();
    wh.insert_sale(&sale(1, "2024-01-10 00:00:00", 1, 10, "100.00", "Card")).unwrap();
    wh.insert_sale(&sale(2, "2024-01-20 00:00:00", 1, 10, "50.00", "Card")).unwrap();
    wh.insert_sale(&sale(3, "2024-02-03 00:00:00", 2, 11, "200.00", "Cash")).unwrap();
    wh.insert_sale(&sale(4, "2024-02-04 00:00:00", 2, 99, "12.00", "Cash")).unwrap();
    wh.insert_sale(&sale(5, "not a date", 2, 11, "8.00", "Cash")).unwrap();
}

// ── CSV ──────────────────────────────────────────────────────────────────────

#[test]
fn cube_survives_csv_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/cube/sales_cube.csv");
    let cube = Cube::new(
        Grain::finest(),
        vec![
            row(2024, 10, "West", "Sports", "Cash", "0.10", 1),
            row(2024, 2, "East, North", "Electronics", "Card", "1234.5678", 7),
        ],
    );

    write_cube_csv(&cube, &path).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("year,month,region,category,payment_type,total_sales,transaction_count\n"));

    let loaded = read_cube_csv(&path).unwrap();
    assert_eq!(loaded, cube);
}

#[test]
fn coarse_cube_reloads_with_its_grain() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("yearly.csv");
    let cube = Cube::new(
        Grain::finest(),
        vec![row(2024, 1, "East", "Toys", "Card", "5", 1), row(2024, 2, "East", "Toys", "Card", "6", 2)],
    )
    .rollup(&Grain::of(&[Dimension::Year, Dimension::Region]))
    .unwrap();

    write_cube_csv(&cube, &path).unwrap();
    let loaded = read_cube_csv(&path).unwrap();
    assert_eq!(loaded.grain(), &Grain::of(&[Dimension::Year, Dimension::Region]));
    assert_eq!(loaded.rows()[0].measures.total_sales, Decimal::from(11));
}

#[test]
fn single_month_column_layout_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.csv");
    fs::write(
        &path,
        "month,region,product_category,payment_type,total_sales,transaction_count\n\
         2024-11,East,Electronics,Card,150.0,2\n\
         2023-02,West,Clothing,Cash,20.5,1\n",
    )
    .unwrap();

    let cube = read_cube_csv(&path).unwrap();
    assert_eq!(cube.grain(), &Grain::finest());
    assert_eq!(cube.rows()[0].coords.year, Some(2023));
    assert_eq!(cube.rows()[1].coords.month, Some(11));
    assert_eq!(cube.rows()[1].coords.category.as_deref(), Some("Electronics"));
}

#[test]
fn corrupt_cube_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    fs::write(
        &path,
        "year,month,region,category,payment_type,total_sales,transaction_count\n\
         2024,13,East,Toys,Card,1.00,1\n",
    )
    .unwrap();
    assert!(matches!(read_cube_csv(&path), Err(CubeError::CorruptCube { line: 2, .. })));

    fs::write(&path, "year,month,region\n2024,1,East\n").unwrap();
    assert!(matches!(read_cube_csv(&path), Err(CubeError::CorruptCube { line: 1, .. })));
}

#[test]
fn rewrite_replaces_previous_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cube.csv");
    let first = Cube::new(Grain::finest(), vec![row(2024, 1, "East", "Toys", "Card", "5", 1)]);
    let second = Cube::empty(Grain::finest());

    write_cube_csv(&first, &path).unwrap();
    write_cube_csv(&second, &path).unwrap();
    assert!(read_cube_csv(&path).unwrap().is_empty());
    // Only the artifact remains; no temp files are left behind.
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

#[test]
fn pipeline_writes_cube_rejects_and_tables() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("smart_sales.db");
    seed_warehouse(&db);

    let config = CubeConfig {
        warehouse_path: db.clone(),
        cube_path:      dir.path().join("cube/sales_cube.csv"),
        rejects_path:   Some(dir.path().join("cube/rejects.csv")),
        write_tables:   true,
        grouper:        GrouperKind::Sort,
        ..CubeConfig::default()
    };
    let summary = pipeline::run(&config).unwrap();

    assert_eq!(summary.cube_rows, 2);
    assert_eq!(summary.grouper, "sort");
    assert_eq!(summary.report.facts_read, 5);
    assert_eq!(summary.report.unknown_product, 1);
    assert_eq!(summary.report.malformed_date, 1);

    let cube = read_cube_csv(&config.cube_path).unwrap();
    assert_eq!(cube.totals().unwrap().total_sales, Decimal::from(350));
    assert_eq!(cube.totals().unwrap().transaction_count, 3);

    let rejects = fs::read_to_string(dir.path().join("cube/rejects.csv")).unwrap();
    assert!(rejects.contains("4,unknown_product,99"));
    assert!(rejects.contains("5,malformed_date,not a date"));

    // The seeded warehouse had no cube tables; the run created them.
    let wh = Warehouse::open(&db).unwrap();
    assert_eq!(wh.cube_table_count().unwrap(), 2);
    assert_eq!(wh.rejects_table_count().unwrap(), 2);
    assert_eq!(wh.load_cube_table().unwrap(), cube);
}

#[test]
fn missing_warehouse_aborts_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = CubeConfig {
        warehouse_path: dir.path().join("absent.db"),
        cube_path:      dir.path().join("cube.csv"),
        ..CubeConfig::default()
    };

    let err = pipeline::run(&config).unwrap_err();
    assert!(matches!(err, CubeError::Io(_)));
    assert!(!config.cube_path.exists());
}

#[test]
fn failed_table_write_leaves_no_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("smart_sales.db");
    seed_warehouse(&db);
    // A `sales_cube` left by another tool, in a layout this crate cannot fill.
    rusqlite::Connection::open(&db)
        .unwrap()
        .execute_batch("CREATE TABLE sales_cube (month TEXT, total REAL);")
        .unwrap();

    let out = dir.path().join("cube");
    let config = CubeConfig {
        warehouse_path: db.clone(),
        cube_path:      out.join("sales_cube.csv"),
        rejects_path:   Some(out.join("rejects.csv")),
        write_tables:   true,
        ..CubeConfig::default()
    };

    let err = pipeline::run(&config).unwrap_err();
    assert!(matches!(err, CubeError::Database(_)));
    assert!(!config.cube_path.exists());
    assert!(!out.join("rejects.csv").exists());

    let previous = Cube::new(Grain::finest(), vec![row(2023, 1, "East", "Toys", "Card", "5", 1)]);
    write_cube_csv(&previous, &config.cube_path).unwrap();
    assert!(pipeline::run(&config).is_err());
    assert_eq!(read_cube_csv(&config.cube_path).unwrap(), previous);
    // Only the earlier artifact; staged temp files are gone.
    assert_eq!(fs::read_dir(&out).unwrap().count(), 1);
    // The rejects table would have been created in the rolled-back transaction.
    assert!(Warehouse::open(&db).unwrap().rejects_table_count().is_err());
}

#[test]
fn warehouse_is_read_only_unless_opened_for_writing() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("smart_sales.db");
    seed_warehouse(&db);
    let cube = Cube::new(Grain::finest(), vec![row(2024, 1, "East", "Toys", "Card", "5", 1)]);

    let reader = Warehouse::open(&db).unwrap();
    assert!(matches!(reader.replace_cube_tables(&cube, &[]), Err(CubeError::Database(_))));
    assert_eq!(reader.sales().unwrap().len(), 5);

    let writer = Warehouse::open_writable(&db).unwrap();
    writer.replace_cube_tables(&cube, &[]).unwrap();
    assert_eq!(writer.load_cube_table().unwrap(), cube);
    assert_eq!(writer.rejects_table_count().unwrap(), 0);
}

#[test]
fn config_loads_from_json_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cube.json");
    fs::write(&path, r#"{ "cube_path": "out/cube.csv", "dimensions": ["year", "region"], "grouper": "sort" }"#)
        .unwrap();

    let config = CubeConfig::load(&path).unwrap();
    assert_eq!(config.cube_path, Path::new("out/cube.csv"));
    assert_eq!(config.warehouse_path, Path::new("data/dw/smart_sales.db"));
    assert_eq!(config.grain(), Grain::of(&[Dimension::Year, Dimension::Region]));
    assert_eq!(config.grouper, GrouperKind::Sort);

    let rejects = dir.path().join("r.csv");
    write_rejects_csv(&[], &rejects).unwrap();
    assert_eq!(fs::read_to_string(&rejects).unwrap(), "transaction_id,reason,detail\n");
}
