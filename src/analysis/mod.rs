//! analysis — configuration, per-glacier pipeline and result export.
//!
//! Purpose
//! -------
//! Turn loaded inputs into the per-glacier result tables: load and check
//! an [`AnalysisConfig`], restrict the inputs with
//! [`AnalysisInputs::prepare`], run [`run_batch`], and write the CSV
//! tables with [`write_batch_outputs`].
//!
//! Key behaviors
//! -------------
//! - Configuration problems surface as [`ConfigError`] before any glacier
//!   is analysed.
//! - Per-glacier failures are [`AnalysisError`] values recorded in the
//!   [`BatchReport`]; the batch itself always completes.
//!
//! Downstream usage
//! ----------------
//! ```rust,ignore
//! use raqdps_albedo::analysis::prelude::*;
//!
//! let config = AnalysisConfig::from_file(path)?;
//! config.validate()?;
//! let inputs = AnalysisInputs::from(SyntheticScenario::default().generate()?).prepare(&config)?;
//! let report = run_batch(&inputs, &config);
//! write_batch_outputs(&config.output_dir, &report, &config)?;
//! ```

pub mod config;
pub mod errors;
pub mod export;
pub mod pipeline;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::config::{
    AnalysisConfig, ExtractionSettings, ExtremeSettings, FireSettings, LagSettings,
    RegressionSettings,
};
pub use self::errors::{AnalysisError, AnalysisResult, ConfigError, ConfigResult};
pub use self::export::{write_batch_outputs, write_site_outputs};
pub use self::pipeline::{
    AnalysisInputs, BatchReport, DepositionTable, SiteAnalysis, SiteOutcome, VariableAnalysis,
    analyze_site, run_batch,
};

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::config::AnalysisConfig;
    pub use super::errors::{AnalysisError, AnalysisResult, ConfigError};
    pub use super::export::write_batch_outputs;
    pub use super::pipeline::{AnalysisInputs, BatchReport, analyze_site, run_batch};
    pub use crate::data::synthetic::SyntheticScenario;
}
