//! Input data: deposition grids, glacier inventories, albedo series and fire
//! detections, with their file loaders and a seeded synthetic generator.
pub mod albedo;
pub mod errors;
pub mod fire;
pub mod glacier;
pub mod grid;
pub mod loader;
#[cfg(feature = "netcdf")]
pub mod netcdf_reader;
pub mod series;
pub mod synthetic;

pub use self::errors::{DataError, DataResult};
pub use self::glacier::{GlacierInventory, GlacierSelection, GlacierSite, InventoryFilter};
pub use self::grid::{BoundingBox, DepositionField, GridSlice};
pub use self::series::TimeSeries;
