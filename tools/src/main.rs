//! cube-runner: headless batch runner for the sales cube.
//!
//! Usage:
//!   cube-runner build  --db data/dw/smart_sales.db --out data/cube/sales_cube.csv
//!   cube-runner build  --config cube.json --rejects data/cube/rejects.csv --write-table
//!   cube-runner report --cube data/cube/sales_cube.csv --months 12 --year 2024
//!   cube-runner report --cube data/cube/sales_cube.csv --json

use anyhow::{bail, Result};
use rust_decimal::Decimal;
use salescube_core::{
    analysis::{self, PaymentShare},
    config::GrouperKind,
    output::read_cube_csv,
    pipeline, Cube, CubeConfig, CubeRow,
};
use std::env;
use std::path::PathBuf;

#[derive(serde::Serialize)]
struct Report {
    window_months:   Option<u32>,
    top_categories:  Vec<CubeRow>,
    payment_mix:     Vec<PaymentShare>,
    sales_by_year:   Vec<CubeRow>,
    sales_by_month:  Vec<CubeRow>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("build") | None => run_build(&args),
        Some("report") => run_report(&args),
        Some(other) => bail!("unknown command '{other}' (expected build or report)"),
    }
}

fn run_build(args: &[String]) -> Result<()> {
    let mut config = match flag_value(args, "--config") {
        Some(path) => CubeConfig::load(path)?,
        None => CubeConfig::default(),
    };
    if let Some(db) = flag_value(args, "--db") {
        config.warehouse_path = PathBuf::from(db);
    }
    if let Some(out) = flag_value(args, "--out") {
        config.cube_path = PathBuf::from(out);
    }
    if let Some(rejects) = flag_value(args, "--rejects") {
        config.rejects_path = Some(PathBuf::from(rejects));
    }
    if let Some(grouper) = flag_value(args, "--grouper") {
        config.grouper = grouper.parse::<GrouperKind>().map_err(anyhow::Error::msg)?;
    }
    if args.iter().any(|a| a == "--write-table") {
        config.write_tables = true;
    }

    println!("Sales cube - cube-runner");
    println!("  warehouse: {}", config.warehouse_path.display());
    println!("  cube:      {}", config.cube_path.display());
    println!("  grouper:   {:?}", config.grouper);
    println!();

    let summary = pipeline::run(&config)?;
    let r = &summary.report;

    println!("=== BUILD SUMMARY ===");
    println!("  cube rows:         {}", summary.cube_rows);
    println!("  sales read:        {}", r.facts_read);
    println!("  sales aggregated:  {}", r.facts_aggregated);
    println!("  unknown customer:  {}", r.unknown_customer);
    println!("  unknown product:   {}", r.unknown_product);
    println!("  malformed date:    {}", r.malformed_date);
    println!("  missing amount:    {}", r.missing_amount);
    println!("  malformed amount:  {}", r.malformed_amount);
    println!("  no payment type:   {}", r.missing_payment_type);
    println!("  negative amounts:  {}", r.negative_amounts);
    if let Some(path) = &summary.rejects_path {
        println!("  rejects:           {}", path.display());
    }
    Ok(())
}

fn run_report(args: &[String]) -> Result<()> {
    let cube_path = flag_value(args, "--cube").unwrap_or("data/cube/sales_cube.csv");
    let months = parse_arg(args, "--months", 12u32);
    let year: Option<i32> = flag_value(args, "--year").and_then(|y| y.parse().ok());
    let json = args.iter().any(|a| a == "--json");

    let cube = read_cube_csv(cube_path)?;
    let window = if months > 0 { cube.trailing_months(months)? } else { cube.clone() };
    log::info!("report window holds {} of {} cube rows", window.len(), cube.len());

    let report = Report {
        window_months:  (months > 0).then_some(months),
        top_categories: analysis::top_category_by_region(&window)?,
        payment_mix:    analysis::payment_method_mix(&window)?,
        sales_by_year:  analysis::sales_by_year(&cube)?.rows().to_vec(),
        sales_by_month: analysis::sales_by_month(&cube, year)?.rows().to_vec(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&cube, &report)?;
    }
    Ok(())
}

fn print_report(cube: &Cube, report: &Report) -> Result<()> {
    let window = report
        .window_months
        .map_or_else(|| "all data".to_string(), |m| format!("last {m} months"));

    println!("=== CUBE ===");
    println!("  rows:   {}", cube.len());
    println!("  grain:  {}", cube.grain());
    println!("  total:  {}", cube.totals()?.total_sales);
    println!();

    println!("=== TOP CATEGORY BY REGION ({window}) ===");
    for row in &report.top_categories {
        println!(
            "  {:<12} {:<16} {:>14}",
            row.coords.region.as_deref().unwrap_or("-"),
            row.coords.category.as_deref().unwrap_or("-"),
            row.measures.total_sales.round_dp(2)
        );
    }
    println!();

    println!("=== PAYMENT METHODS ({window}) ===");
    for p in &report.payment_mix {
        println!(
            "  {:<12} {:>14} {:>8} txns {:>7}%",
            p.payment_type,
            p.total_sales.round_dp(2),
            p.transaction_count,
            p.share_of_sales
        );
    }
    println!();

    println!("=== SALES BY YEAR ===");
    for row in &report.sales_by_year {
        println!("  {} {:>14}", row.coords.year.unwrap_or_default(), row.measures.total_sales.round_dp(2));
    }
    println!();

    println!("=== SALES BY MONTH ===");
    for row in &report.sales_by_month {
        println!(
            "  {:04}-{:02} {:>14} {:>8} txns  avg {}",
            row.coords.year.unwrap_or_default(),
            row.coords.month.unwrap_or_default(),
            row.measures.total_sales.round_dp(2),
            row.measures.transaction_count,
            row.measures.average_sale().unwrap_or(Decimal::ZERO).round_dp(2)
        );
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
