//! Sales cube engine.
//!
//! Builds a pre-aggregated cube over the retail warehouse at grain
//! `(year, month, region, category, payment_type)` and answers slice,
//! dice, roll-up, drilldown and top-N queries from the cube alone.

pub mod analysis;
pub mod config;
pub mod cube;
pub mod dimension;
pub mod error;
pub mod grouper;
pub mod output;
pub mod pipeline;
pub mod query;
pub mod types;
pub mod warehouse;

pub use config::CubeConfig;
pub use cube::{BuildReport, Cube, CubeBuild, CubeBuilder};
pub use error::{CubeError, CubeResult};
pub use query::{Dice, Slice};
pub use types::{Coords, CubeRow, Dimension, Grain, Measures, Member};
