//! One batch run: warehouse in, cube artifact out.
//!
//! EXECUTION ORDER (fixed):
//!   1. Open the warehouse (read-only unless tables are written).
//!   2. Build the cube (exclusions are counted, never fatal).
//!   3. Stage the cube CSV, and the rejects CSV if configured.
//!   4. Replace the warehouse tables in one transaction, if configured.
//!   5. Commit the staged files over their targets.
//!
//! Any error before step 5 aborts the run with every previous output left
//! as it was.

use crate::{
    config::CubeConfig,
    cube::{BuildReport, CubeBuilder},
    error::CubeResult,
    output::{stage_cube_csv, stage_rejects_csv},
    warehouse::Warehouse,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub cube_path:    PathBuf,
    pub rejects_path: Option<PathBuf>,
    pub grouper:      &'static str,
    pub cube_rows:    usize,
    pub report:       BuildReport,
}

pub fn run(config: &CubeConfig) -> CubeResult<RunSummary> {
    config.validate()?;
    log::info!("starting cube build from {}", config.warehouse_path.display());

    let warehouse = if config.write_tables {
        Warehouse::open_writable(&config.warehouse_path)?
    } else {
        Warehouse::open(&config.warehouse_path)?
    };
    let builder = CubeBuilder::new(config);
    let build = builder.build_from(&warehouse)?;

    let mut staged = vec![stage_cube_csv(&build.cube, &config.cube_path)?];
    if let Some(path) = &config.rejects_path {
        staged.push(stage_rejects_csv(&build.rejects, path)?);
    }
    if config.write_tables {
        warehouse.replace_cube_tables(&build.cube, &build.rejects)?;
    }
    for file in staged {
        let target = file.target().to_path_buf();
        file.commit()?;
        log::info!("saved {}", target.display());
    }

    log::info!(
        "cube build completed: {} rows, {} of {} sales excluded",
        build.cube.len(),
        build.report.excluded(),
        build.report.facts_read
    );

    Ok(RunSummary {
        cube_path:    config.cube_path.clone(),
        rejects_path: config.rejects_path.clone(),
        grouper:      builder.grouper_name(),
        cube_rows:    build.cube.len(),
        report:       build.report,
    })
}
