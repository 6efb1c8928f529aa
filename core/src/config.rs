use crate::{
    error::{CubeError, CubeResult},
    types::{Dimension, Grain},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which group-by strategy the builder uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrouperKind {
    /// In-memory hash group-by.
    #[default]
    Hash,
    /// Sort then merge adjacent keys.
    Sort,
}

impl FromStr for GrouperKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hash" => Ok(GrouperKind::Hash),
            "sort" => Ok(GrouperKind::Sort),
            other  => Err(format!("unknown grouper '{other}' (expected hash or sort)")),
        }
    }
}

/// Everything one cube run needs. Passed explicitly to the builder and the
/// pipeline; nothing reads process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CubeConfig {
    /// SQLite warehouse holding `customers`, `products` and `sales`.
    pub warehouse_path: PathBuf,
    /// Destination of the persisted cube CSV.
    pub cube_path: PathBuf,
    /// Optional CSV quarantine of excluded sales rows.
    pub rejects_path: Option<PathBuf>,
    /// Also write `sales_cube` (and `sales_cube_rejects`) back into the warehouse.
    pub write_tables: bool,
    /// Dimensions the cube is grouped by.
    pub dimensions: Vec<Dimension>,
    pub grouper: GrouperKind,
}

impl Default for CubeConfig {
    fn default() -> Self {
        Self {
            warehouse_path: PathBuf::from("data/dw/smart_sales.db"),
            cube_path:      PathBuf::from("data/cube/sales_cube.csv"),
            rejects_path:   None,
            write_tables:   false,
            dimensions:     Dimension::ALL.to_vec(),
            grouper:        GrouperKind::Hash,
        }
    }
}

impl CubeConfig {
    /// Load from a JSON file. Missing fields fall back to the defaults.
    /// In tests, build the struct directly.
    pub fn load(path: impl AsRef<Path>) -> CubeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CubeError::Config(format!("Cannot read {}: {e}", path.display())))?;
        let config: CubeConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CubeResult<()> {
        if self.dimensions.is_empty() {
            return Err(CubeError::Config("at least one dimension is required".into()));
        }
        if self.dimensions.contains(&Dimension::Month) && !self.dimensions.contains(&Dimension::Year) {
            return Err(CubeError::Config("month requires year in the grouping dimensions".into()));
        }
        Ok(())
    }

    pub fn grain(&self) -> Grain {
        Grain::of(&self.dimensions)
    }
}
